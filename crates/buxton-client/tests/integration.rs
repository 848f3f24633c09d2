//! `buxton-client` against a real `buxtond` — SPEC_FULL.md §2/§8: the
//! client half of the socket round-trip, exercising concerns that live
//! in this crate rather than the daemon's: concurrent callers sharing one
//! `Client`, and `ClientError::Closed` once the daemon goes away.

use std::path::PathBuf;
use std::process::{Child, Command};
use std::time::Duration;

use buxton_client::{Client, ClientError};
use buxton_wire::{Key, TypeTag, Value};

struct DaemonProcess {
    child: Child,
    socket_path: PathBuf,
}

impl DaemonProcess {
    fn spawn(name: &str) -> Self {
        let base = std::env::temp_dir().join(format!("buxton-client-it-{name}-{}", std::process::id()));
        let _ = std::fs::remove_dir_all(&base);
        std::fs::create_dir_all(&base).expect("create test scratch dir");
        let socket_path = base.join("buxtond.socket");
        let db_path = base.join("db");
        let mac_rules = base.join("mac").join("rules.load2");

        let conf_file = base.join("buxton.conf");
        std::fs::write(
            &conf_file,
            "[base]\ntype = System\nbackend = memory\npriority = 0\ndescription = test layer\n",
        )
        .expect("write test conf file");

        let child = Command::new(env!("CARGO_BIN_EXE_buxtond"))
            .arg("--config-file")
            .arg(&conf_file)
            .arg("--socket-path")
            .arg(&socket_path)
            .arg("--db-path")
            .arg(&db_path)
            .arg("--smack-load-file")
            .arg(&mac_rules)
            .env("RUST_LOG", "error")
            .spawn()
            .expect("spawn buxtond");

        for _ in 0..200 {
            if socket_path.exists() {
                break;
            }
            std::thread::sleep(Duration::from_millis(20));
        }

        DaemonProcess { child, socket_path }
    }
}

impl Drop for DaemonProcess {
    fn drop(&mut self) {
        let _ = self.child.kill();
        let _ = self.child.wait();
    }
}

/// `Client` is `Clone`, and both clones share one socket and one pending-
/// call table keyed by message id — concurrent callers must each get
/// their own reply back, never another caller's.
#[tokio::test]
async fn cloned_clients_correlate_concurrent_calls_independently() {
    let daemon = DaemonProcess::spawn("concurrent");
    let client = Client::open(&daemon.socket_path).await.expect("connect");
    client.create_group("base", "demo").await.expect("create_group");

    let a = Key::new("demo").unwrap().with_name("a").with_layer("base");
    let b = Key::new("demo").unwrap().with_name("b").with_layer("base");
    client.set(&a, Value::Int32(1)).await.expect("set a");
    client.set(&b, Value::Int32(2)).await.expect("set b");

    let reader_a = client.clone();
    let reader_b = client.clone();
    let bare_a = Key::new("demo").unwrap().with_name("a");
    let bare_b = Key::new("demo").unwrap().with_name("b");

    let (got_a, got_b) = tokio::join!(
        reader_a.get(&bare_a, Some(TypeTag::Int32)),
        reader_b.get(&bare_b, Some(TypeTag::Int32)),
    );

    assert_eq!(got_a.expect("get a"), Value::Int32(1));
    assert_eq!(got_b.expect("get b"), Value::Int32(2));
}

/// Once the daemon process exits, any in-flight or subsequent call on
/// that `Client` must fail with `ClientError::Closed`, not hang.
#[tokio::test]
async fn calls_fail_closed_after_the_daemon_exits() {
    let mut daemon = DaemonProcess::spawn("closed");
    let client = Client::open(&daemon.socket_path).await.expect("connect");
    client.create_group("base", "demo").await.expect("create_group");

    daemon.child.kill().expect("kill daemon");
    let _ = daemon.child.wait();

    let key = Key::new("demo").unwrap().with_name("a").with_layer("base");
    let err = client.set(&key, Value::Int32(1)).await.expect_err("daemon is gone");
    assert!(matches!(err, ClientError::Closed | ClientError::Io(_)));
}

//! `buxtond`: the Buxton configuration daemon — spec.md §4.7, SPEC_FULL.md
//! §4.7.
//!
//! Single OS thread, cooperative scheduling over `tokio::task::LocalSet`:
//! the accept loop, every session's read/write loop, and the MAC-rules
//! file watcher all run as `LocalSet`-spawned tasks sharing one
//! `Rc<RefCell<DaemonState>>`. No `Arc`, no `Mutex` — spec §5's "no
//! background threads, no shared mutable state, no locks" is true of the
//! async tasks too, since `LocalSet` never moves a task to another thread.

use std::cell::RefCell;
use std::os::unix::io::{AsRawFd, BorrowedFd, RawFd};
use std::rc::Rc;

use clap::Parser;
use nix::sys::socket::{getsockopt, sockopt::PeerCredentials};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::UnixStream;
use tokio::sync::mpsc;
use tokio::task::LocalSet;
use tracing::{debug, info, warn};

use buxton_daemon::config::{CliOverrides, DaemonConfig};
use buxton_daemon::dispatch::{dispatch, DispatchResult, Fired};
use buxton_daemon::session::{PeerCreds, Session};
use buxton_daemon::state::DaemonState;
use buxton_daemon::listener;
use buxton_wire::{Frame, OpCode, Param};

/// Command-line overrides — spec.md §6: "cli > env var > config file value
/// > compiled default." Mirrors `buxton-cli`'s own override flags so both
/// binaries agree on names.
#[derive(Parser, Debug)]
#[command(name = "buxtond", about = "Buxton configuration daemon")]
struct Args {
    #[arg(long)]
    config_file: Option<String>,
    #[arg(long)]
    module_dir: Option<String>,
    #[arg(long)]
    db_path: Option<String>,
    #[arg(long)]
    smack_load_file: Option<String>,
    #[arg(long)]
    socket_path: Option<String>,
}

impl From<Args> for CliOverrides {
    fn from(args: Args) -> Self {
        CliOverrides {
            conf_file: args.config_file,
            module_dir: args.module_dir,
            db_path: args.db_path,
            smack_load_file: args.smack_load_file,
            socket_path: args.socket_path,
        }
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env().add_directive("buxton=info".parse()?),
        )
        .init();

    let args = Args::parse();
    let config = DaemonConfig::load(args.into());
    info!(socket = %config.socket_path.display(), db = %config.db_path.display(), "buxtond starting");

    std::fs::create_dir_all(&config.db_path).ok();

    let state = Rc::new(RefCell::new(DaemonState::new(&config)));
    let listener = listener::bind_or_inherit(&config.socket_path)?;

    let policy_rx = spawn_policy_watcher(&state)?;

    let local = LocalSet::new();
    local.run_until(run(state, listener, policy_rx)).await
}

/// Bridges `buxton_policy::PolicyWatcher`'s blocking `std::sync::mpsc`
/// channel into the async world with one dedicated OS thread — the only
/// thread in the process besides the main one, and it never touches
/// `DaemonState`. Fatal per spec §7 ("inotify initialization failure when
/// MAC is enabled") only when the engine is *not* already bypassed.
fn spawn_policy_watcher(state: &Rc<RefCell<DaemonState>>) -> anyhow::Result<mpsc::UnboundedReceiver<()>> {
    let (tx, rx) = mpsc::unbounded_channel();
    if state.borrow().policy.bypassed() {
        // No watcher thread will ever send on `tx`; leak it rather than
        // let it drop here, or `rx.recv()` would immediately and
        // permanently resolve to `None`, spinning the select loop.
        std::mem::forget(tx);
        return Ok(rx);
    }
    let path = state.borrow().policy.rules_path().to_path_buf();
    let watcher = buxton_policy::PolicyWatcher::watch(&path)
        .map_err(|err| anyhow::anyhow!("failed to watch MAC rules file {}: {err}", path.display()))?;
    std::thread::spawn(move || {
        while let Ok(event) = watcher.events.recv() {
            if event.is_ok() && tx.send(()).is_err() {
                break;
            }
        }
    });
    Ok(rx)
}

async fn run(
    state: Rc<RefCell<DaemonState>>,
    listener: tokio::net::UnixListener,
    mut policy_rx: mpsc::UnboundedReceiver<()>,
) -> anyhow::Result<()> {
    // Once the watcher channel closes for good, stop polling it — an
    // always-ready `None` would otherwise spin this loop.
    let mut policy_watch_open = true;
    loop {
        tokio::select! {
            accepted = listener.accept() => {
                match accepted {
                    Ok((stream, _addr)) => {
                        let state = state.clone();
                        tokio::task::spawn_local(async move {
                            run_session(state, stream).await;
                        });
                    }
                    Err(err) => warn!(%err, "accept failed"),
                }
            }
            result = policy_rx.recv(), if policy_watch_open => {
                match result {
                    Some(()) => state.borrow_mut().policy.reload(),
                    None => policy_watch_open = false,
                }
            }
            _ = tokio::signal::ctrl_c() => {
                info!("shutdown signal received");
                break;
            }
        }
    }
    Ok(())
}

fn peer_creds(fd: RawFd) -> PeerCreds {
    let borrowed = unsafe { BorrowedFd::borrow_raw(fd) };
    match getsockopt(&borrowed, PeerCredentials) {
        Ok(creds) => PeerCreds { uid: creds.uid(), pid: creds.pid() },
        Err(err) => {
            warn!(%err, "SO_PEERCRED failed; treating peer as uid 0");
            PeerCreds { uid: 0, pid: 0 }
        }
    }
}

/// One connection's lifetime, spec.md §4.6/§4.7/§5: accept, establish
/// identity once, service frames until EOF/error/malformed input, then
/// tear down unconditionally.
async fn run_session(state: Rc<RefCell<DaemonState>>, stream: UnixStream) {
    let fd = stream.as_raw_fd();
    let peer = peer_creds(fd);
    let label = buxton_policy::peer_label(fd);

    let session_id = state.borrow_mut().next_session_id();
    let mut session = Session::new(session_id, peer, label);
    debug!(session = session_id, uid = peer.uid, pid = peer.pid, "session accepted");

    let (outbound_tx, mut outbound_rx) = mpsc::unbounded_channel::<Vec<u8>>();
    state.borrow_mut().register_session(session_id, outbound_tx);

    let (mut read_half, mut write_half) = stream.into_split();
    let mut read_buf = vec![0u8; 4096];

    'session: loop {
        tokio::select! {
            read_result = read_half.read(&mut read_buf) => {
                let n = match read_result {
                    Ok(0) => break 'session,
                    Ok(n) => n,
                    Err(err) => {
                        debug!(session = session_id, %err, "read error");
                        break 'session;
                    }
                };
                let frames = match session.feed(&read_buf[..n]) {
                    Ok(frames) => frames,
                    Err(err) => {
                        debug!(session = session_id, %err, "malformed frame; terminating session");
                        break 'session;
                    }
                };
                for frame in frames {
                    let DispatchResult { reply, fired } = {
                        let mut state_mut = state.borrow_mut();
                        dispatch(&mut state_mut, &mut session, frame)
                    };
                    if write_half.write_all(&reply.encode()).await.is_err() {
                        break 'session;
                    }
                    // Per-session FIFO replies before any CHANGED this SET
                    // produced (spec.md §4.7: "A CHANGED frame for a given
                    // subscriber is emitted strictly after the STATUS
                    // reply of the SET that triggered it").
                    route_fired(&state, fired);
                }
            }
            Some(bytes) = outbound_rx.recv() => {
                if write_half.write_all(&bytes).await.is_err() {
                    break 'session;
                }
            }
        }
    }

    state.borrow_mut().remove_session(session_id);
    debug!(session = session_id, "session terminated");
}

/// Encode and route each `Fired` notification to its subscriber's
/// outbound channel. Best-effort: `DaemonState::send_to_session` silently
/// drops delivery to an already-gone session (spec.md §4.5).
fn route_fired(state: &Rc<RefCell<DaemonState>>, fired: Vec<Fired>) {
    for Fired { session_id, key, value } in fired {
        let mut params = key.to_params();
        params.push(Param::from_value(&value));
        let frame = Frame::new(OpCode::Changed, 0, params);
        state.borrow().send_to_session(session_id, frame.encode());
    }
}

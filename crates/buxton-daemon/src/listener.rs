//! Binding the client-facing listening socket — spec.md §6, §4.7.
//!
//! Prefers a supervisor-activated descriptor (the systemd `LISTEN_FDS`/
//! `LISTEN_PID` convention — spec: "Host-supervisor-supplied pre-opened
//! descriptors are accepted in preference to the manually bound path")
//! and only binds the configured path itself when none was handed down.

use std::os::unix::fs::PermissionsExt;
use std::os::unix::io::{FromRawFd, RawFd};
use std::os::unix::net::UnixListener as StdUnixListener;
use std::path::Path;

use anyhow::{Context, Result};
use tokio::net::UnixListener;
use tracing::info;

/// First inherited descriptor under the systemd activation protocol.
const SD_LISTEN_FDS_START: RawFd = 3;

/// Inspect `LISTEN_PID`/`LISTEN_FDS` and, if they name descriptors meant
/// for this process, return them as raw fds in order. Matches systemd's
/// `sd_listen_fds(3)` contract closely enough for a single expected
/// socket: `LISTEN_PID` must equal our pid (the variables are meant for
/// exactly one direct child), `LISTEN_FDS` is the count starting at fd 3.
fn inherited_fds() -> Vec<RawFd> {
    let Ok(pid_var) = std::env::var("LISTEN_PID") else {
        return Vec::new();
    };
    let Ok(pid) = pid_var.parse::<u32>() else {
        return Vec::new();
    };
    if pid != std::process::id() {
        return Vec::new();
    }
    let Ok(count) = std::env::var("LISTEN_FDS").unwrap_or_default().parse::<i32>() else {
        return Vec::new();
    };
    (0..count).map(|i| SD_LISTEN_FDS_START + i).collect()
}

/// Bind (or inherit) the daemon's client-facing listening socket.
pub fn bind_or_inherit(socket_path: &Path) -> Result<UnixListener> {
    if let Some(&fd) = inherited_fds().first() {
        info!(fd, "using socket-activated listening descriptor");
        // Safety: the supervisor guarantees this fd is an open, bound,
        // listening socket handed to us for exactly this purpose.
        let std_listener = unsafe { StdUnixListener::from_raw_fd(fd) };
        std_listener.set_nonblocking(true)?;
        return UnixListener::from_std(std_listener).context("adopting activated socket into tokio");
    }

    let _ = std::fs::remove_file(socket_path);
    if let Some(parent) = socket_path.parent() {
        std::fs::create_dir_all(parent).ok();
    }
    let listener = UnixListener::bind(socket_path)
        .with_context(|| format!("binding buxton socket at {}", socket_path.display()))?;
    // World-writable so unprivileged clients can connect; MAC labels, not
    // file permissions, are the real access control (spec.md §6).
    let perms = std::fs::Permissions::from_mode(0o777);
    std::fs::set_permissions(socket_path, perms)
        .with_context(|| format!("setting permissions on {}", socket_path.display()))?;
    info!(path = %socket_path.display(), "listening for buxton clients");
    Ok(listener)
}

#[cfg(test)]
mod tests {
    use super::*;

    // A single test function: `LISTEN_PID`/`LISTEN_FDS` are process-global,
    // so exercising each case in its own #[test] would race against the
    // others under cargo's default multi-threaded test runner.
    #[test]
    fn activation_env_var_handling() {
        std::env::remove_var("LISTEN_PID");
        std::env::remove_var("LISTEN_FDS");
        assert!(inherited_fds().is_empty());

        std::env::set_var("LISTEN_PID", "1");
        std::env::set_var("LISTEN_FDS", "1");
        assert!(inherited_fds().is_empty());

        std::env::set_var("LISTEN_PID", std::process::id().to_string());
        std::env::set_var("LISTEN_FDS", "2");
        assert_eq!(inherited_fds(), vec![3, 4]);

        std::env::remove_var("LISTEN_PID");
        std::env::remove_var("LISTEN_FDS");
    }
}

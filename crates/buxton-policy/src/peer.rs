//! Reading a connected peer's MAC label off its socket — spec.md §4.6,
//! grounded on `original_source/src/core/daemon.c::handle_smack_label`'s
//! `getsockopt(SOL_SOCKET, SO_PEERSEC, ...)` two-call size-then-fill
//! pattern (the kernel reports the needed buffer length on the first
//! call, `ERANGE` included, exactly as libsmack itself tolerates).

use std::os::unix::io::RawFd;

/// Label assigned to a peer when the kernel has no label to offer
/// (`SO_PEERSEC` returns `ENOPROTOOPT`, i.e. the MAC module isn't loaded).
/// `"_"` is the floor label — spec §4.3 built-in rule 5 grants it READ
/// universally, which is the least-surprising default for an unlabeled
/// peer on a MAC-less host (the engine is already in bypass mode in that
/// case, so this value is never actually consulted).
pub const UNLABELED: &str = "_";

/// Read the Smack-equivalent label off a connected socket's peer via
/// `SO_PEERSEC`. Returns [`UNLABELED`] if the kernel has no label to
/// offer; never panics on a disconnected or invalid fd, since this is
/// called from the accept path on every new connection.
pub fn peer_label(fd: RawFd) -> String {
    let mut len: libc::socklen_t = 0;
    // First call with a null buffer: the kernel reports the label's
    // length. libsmack ignores a non-zero ERANGE return here, so we do
    // the same (the length is still filled in on ERANGE).
    let rc = unsafe {
        libc::getsockopt(
            fd,
            libc::SOL_SOCKET,
            libc::SO_PEERSEC,
            std::ptr::null_mut(),
            &mut len,
        )
    };
    if rc < 0 {
        let err = std::io::Error::last_os_error();
        if err.raw_os_error() != Some(libc::ERANGE) {
            return UNLABELED.to_string();
        }
    }
    if len == 0 {
        return UNLABELED.to_string();
    }

    let mut buf = vec![0u8; len as usize];
    let rc = unsafe {
        libc::getsockopt(
            fd,
            libc::SOL_SOCKET,
            libc::SO_PEERSEC,
            buf.as_mut_ptr() as *mut libc::c_void,
            &mut len,
        )
    };
    if rc < 0 {
        return UNLABELED.to_string();
    }
    buf.truncate(len as usize);
    // Labels are never expected to carry embedded NULs; trim a trailing
    // one if the kernel included the terminator in `len`.
    if let Some(&0) = buf.last() {
        buf.pop();
    }
    String::from_utf8(buf).unwrap_or_else(|_| UNLABELED.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invalid_fd_falls_back_to_unlabeled() {
        assert_eq!(peer_label(-1), UNLABELED);
    }
}

//! One client connection's framing state and identity — spec.md §4.6.
//!
//! [`Session::feed`] is a pure function over the accumulated read buffer,
//! so the two-phase read (accumulate header, then accumulate payload) is
//! unit-testable without ever opening a socket — the same split
//! `ochra-transport` uses for its envelope `validate`/`decode` pair.

use std::collections::HashSet;

use buxton_wire::{decode_frame, decode_header, Frame, WireError, HEADER_LEN};

/// Credentials obtained once at connect time via `SO_PEERCRED` (spec.md
/// §4.6) and never re-checked — a session's label is fixed for its
/// lifetime.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PeerCreds {
    pub uid: u32,
    pub pid: i32,
}

/// A single client connection's state — everything the dispatcher needs
/// that isn't global daemon state.
pub struct Session {
    pub id: u64,
    pub peer: PeerCreds,
    pub label: String,
    read_buf: Vec<u8>,
    /// Fully-qualified `"{group}.{name}"` keys this session is subscribed
    /// to — used to unregister everything on disconnect (spec.md §5).
    pub notify_keys: HashSet<String>,
}

impl Session {
    pub fn new(id: u64, peer: PeerCreds, label: String) -> Self {
        Session { id, peer, label, read_buf: Vec::new(), notify_keys: HashSet::new() }
    }

    /// Append newly-read bytes and drain every frame now fully buffered.
    /// On a decode error the caller must drop the connection — the
    /// buffer's byte alignment can no longer be trusted past the bad
    /// frame (spec.md §4.1: "no partial state committed").
    pub fn feed(&mut self, bytes: &[u8]) -> Result<Vec<Frame>, WireError> {
        self.read_buf.extend_from_slice(bytes);
        let mut frames = Vec::new();
        loop {
            if self.read_buf.len() < HEADER_LEN {
                break;
            }
            let header = decode_header(&self.read_buf[..HEADER_LEN])?;
            let total = header.total_len();
            if self.read_buf.len() < total {
                break;
            }
            let frame = decode_frame(&self.read_buf[..total])?;
            self.read_buf.drain(..total);
            frames.push(frame);
        }
        Ok(frames)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use buxton_wire::{OpCode, Param, Value};

    fn session() -> Session {
        Session::new(1, PeerCreds { uid: 1000, pid: 42 }, "guest".to_string())
    }

    #[test]
    fn waits_for_full_header_before_decoding() {
        let mut s = session();
        let frame = Frame::new(OpCode::Get, 1, vec![Param::from_value(&Value::Str("base".into()))]);
        let encoded = frame.encode();
        let frames = s.feed(&encoded[..4]).unwrap();
        assert!(frames.is_empty());
        let frames = s.feed(&encoded[4..]).unwrap();
        assert_eq!(frames, vec![frame]);
    }

    #[test]
    fn two_frames_in_one_read_both_decode() {
        let mut s = session();
        let a = Frame::new(OpCode::List, 1, vec![Param::from_value(&Value::Str("base".into()))]);
        let b = Frame::new(OpCode::List, 2, vec![Param::from_value(&Value::Str("override".into()))]);
        let mut bytes = a.encode();
        bytes.extend(b.encode());
        let frames = s.feed(&bytes).unwrap();
        assert_eq!(frames, vec![a, b]);
    }

    #[test]
    fn bad_magic_is_an_error() {
        let mut s = session();
        let frame = Frame::new(OpCode::Get, 1, vec![]);
        let mut bytes = frame.encode();
        bytes[0] ^= 0xff;
        assert!(s.feed(&bytes).is_err());
    }

    #[test]
    fn partial_payload_waits_for_more() {
        let mut s = session();
        let frame = Frame::new(OpCode::Set, 1, vec![Param::from_value(&Value::Int32(9))]);
        let encoded = frame.encode();
        let (head, tail) = encoded.split_at(HEADER_LEN + 2);
        assert!(s.feed(head).unwrap().is_empty());
        let frames = s.feed(tail).unwrap();
        assert_eq!(frames, vec![frame]);
    }
}

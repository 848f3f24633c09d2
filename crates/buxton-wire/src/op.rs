//! Wire operation codes — spec.md §4.1.

use crate::error::{Result, WireError};

/// One of the eleven request ops plus the server-originated `Changed` push.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u16)]
pub enum OpCode {
    Set = 0,
    SetLabel = 1,
    CreateGroup = 2,
    RemoveGroup = 3,
    Get = 4,
    GetType = 5,
    Unset = 6,
    List = 7,
    Status = 8,
    Notify = 9,
    Unnotify = 10,
    Changed = 11,
}

impl OpCode {
    pub fn from_wire(op: u16) -> Result<Self> {
        Ok(match op {
            0 => OpCode::Set,
            1 => OpCode::SetLabel,
            2 => OpCode::CreateGroup,
            3 => OpCode::RemoveGroup,
            4 => OpCode::Get,
            5 => OpCode::GetType,
            6 => OpCode::Unset,
            7 => OpCode::List,
            8 => OpCode::Status,
            9 => OpCode::Notify,
            10 => OpCode::Unnotify,
            11 => OpCode::Changed,
            other => return Err(WireError::UnknownOp(other)),
        })
    }

    pub fn to_wire(self) -> u16 {
        self as u16
    }

    /// `true` for ops that carry a key (group/name/layer triple) as their
    /// first three parameters — spec.md §4.1.
    pub fn carries_key(self) -> bool {
        !matches!(self, OpCode::List | OpCode::Status)
    }
}

/// Result code carried as the first `STATUS` parameter — spec.md §7.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u32)]
pub enum StatusCode {
    Ok = 0,
    Denied = 1,
    NotFound = 2,
    TypeMismatch = 3,
    Invalid = 4,
    Backend = 5,
}

impl StatusCode {
    pub fn from_wire(code: u32) -> Result<Self> {
        Ok(match code {
            0 => StatusCode::Ok,
            1 => StatusCode::Denied,
            2 => StatusCode::NotFound,
            3 => StatusCode::TypeMismatch,
            4 => StatusCode::Invalid,
            5 => StatusCode::Backend,
            other => return Err(WireError::UnknownType(other)),
        })
    }

    pub fn to_wire(self) -> u32 {
        self as u32
    }

    pub fn is_ok(self) -> bool {
        matches!(self, StatusCode::Ok)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn op_roundtrips() {
        for op in [
            OpCode::Set,
            OpCode::SetLabel,
            OpCode::CreateGroup,
            OpCode::RemoveGroup,
            OpCode::Get,
            OpCode::GetType,
            OpCode::Unset,
            OpCode::List,
            OpCode::Status,
            OpCode::Notify,
            OpCode::Unnotify,
            OpCode::Changed,
        ] {
            assert_eq!(OpCode::from_wire(op.to_wire()).unwrap(), op);
        }
    }

    #[test]
    fn unknown_op_rejected() {
        assert!(OpCode::from_wire(0xffff).is_err());
    }

    #[test]
    fn status_roundtrips() {
        for code in [
            StatusCode::Ok,
            StatusCode::Denied,
            StatusCode::NotFound,
            StatusCode::TypeMismatch,
            StatusCode::Invalid,
            StatusCode::Backend,
        ] {
            assert_eq!(StatusCode::from_wire(code.to_wire()).unwrap(), code);
        }
    }
}

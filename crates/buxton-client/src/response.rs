//! The decoded reply to a single call, before the caller's typed helper
//! (`get`, `get_type`, `list_keys`, ...) interprets its trailing
//! parameters — spec.md §4.1/§4.8. Kept op-agnostic on purpose: a `STATUS`
//! frame's shape alone can't tell a `GET` of a `Uint32` value apart from a
//! `GET_TYPE` reply, so interpretation is left to whichever typed helper
//! issued the request and therefore knows what it's holding.

use buxton_wire::{Frame, Param, StatusCode, TypeTag, Value};

use crate::error::{ClientError, Result};

#[derive(Debug, Clone)]
pub struct Response {
    pub status: StatusCode,
    pub params: Vec<Param>,
}

impl Response {
    pub fn from_status_frame(frame: &Frame) -> Result<Self> {
        let (code_param, rest) = frame
            .params
            .split_first()
            .ok_or_else(|| ClientError::Invalid("STATUS frame missing status code".into()))?;
        let Value::Uint32(code) = code_param.into_value()? else {
            return Err(ClientError::Invalid("STATUS code parameter must be Uint32".into()));
        };
        Ok(Response { status: StatusCode::from_wire(code)?, params: rest.to_vec() })
    }

    fn ok_or_status(&self) -> Result<()> {
        if self.status.is_ok() {
            Ok(())
        } else {
            Err(ClientError::Status(self.status))
        }
    }

    pub fn into_status(self) -> Result<()> {
        self.ok_or_status()
    }

    pub fn into_value(self) -> Result<Value> {
        self.ok_or_status()?;
        let param = self.params.first().ok_or_else(|| ClientError::Invalid("reply carried no value".into()))?;
        Ok(param.into_value()?)
    }

    pub fn into_type_tag(self) -> Result<TypeTag> {
        self.ok_or_status()?;
        let param = self.params.first().ok_or_else(|| ClientError::Invalid("reply carried no type tag".into()))?;
        let Value::Uint32(tag) = param.into_value()? else {
            return Err(ClientError::Invalid("type-tag parameter must be Uint32".into()));
        };
        Ok(TypeTag::from_wire(tag)?)
    }

    pub fn into_keys(self) -> Result<Vec<String>> {
        self.ok_or_status()?;
        self.params
            .iter()
            .map(|param| match param.into_value()? {
                Value::Str(s) => Ok(s),
                _ => Err(ClientError::Invalid("LIST reply key parameter must be a string".into())),
            })
            .collect()
    }
}

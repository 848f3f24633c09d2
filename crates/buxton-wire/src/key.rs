//! Key identity: `(group, name, layer)` — spec.md §3.

use crate::error::{Result, WireError};
use crate::frame::Param;
use crate::value::Value;

/// Identifies a key within the layer stack. `name: None` denotes the group
/// entry itself; `layer: None` means "resolve across all layers by
/// priority" (spec.md §3, §4.4).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Key {
    pub group: String,
    pub name: Option<String>,
    pub layer: Option<String>,
}

impl Key {
    pub fn new(group: impl Into<String>) -> Result<Self> {
        let group = group.into();
        if group.is_empty() {
            return Err(WireError::InvalidKey("group name must be non-empty".into()));
        }
        Ok(Key {
            group,
            name: None,
            layer: None,
        })
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn with_layer(mut self, layer: impl Into<String>) -> Self {
        self.layer = Some(layer.into());
        self
    }

    /// `true` if this key denotes a bare group (no name component).
    pub fn is_group_key(&self) -> bool {
        self.name.is_none()
    }

    /// The fully-qualified text used to address notification registrations
    /// (spec.md §3: "addressed by the key's fully qualified (group, name)
    /// text"). The layer is deliberately not part of this text.
    pub fn notification_text(&self) -> String {
        match &self.name {
            Some(name) => format!("{}.{}", self.group, name),
            None => self.group.clone(),
        }
    }

    /// The `group\0name` byte key used by backend storage (spec.md §6).
    pub fn storage_key(&self) -> Vec<u8> {
        let mut buf = self.group.clone().into_bytes();
        buf.push(0);
        if let Some(name) = &self.name {
            buf.extend_from_slice(name.as_bytes());
        }
        buf
    }

    /// Encode as the three leading wire parameters every key-bearing op
    /// carries (spec.md §4.1): `group`, `name` (empty = absent), `layer`
    /// (empty = all-layers).
    pub fn to_params(&self) -> Vec<Param> {
        vec![
            Param::from_value(&Value::Str(self.group.clone())),
            Param::from_value(&Value::Str(self.name.clone().unwrap_or_default())),
            Param::from_value(&Value::Str(self.layer.clone().unwrap_or_default())),
        ]
    }

    /// Parse the three leading key parameters of a key-bearing frame.
    pub fn from_params(params: &[Param]) -> Result<Self> {
        if params.len() < 3 {
            return Err(WireError::InvalidKey("missing key parameters".into()));
        }
        let group = as_str(&params[0])?;
        let name = as_str(&params[1])?;
        let layer = as_str(&params[2])?;
        let mut key = Key::new(group)?;
        if !name.is_empty() {
            key = key.with_name(name);
        }
        if !layer.is_empty() {
            key = key.with_layer(layer);
        }
        Ok(key)
    }
}

fn as_str(param: &Param) -> Result<String> {
    match param.into_value()? {
        Value::Str(s) => Ok(s),
        other => Err(WireError::InvalidKey(format!(
            "expected string key parameter, got {:?}",
            other.type_tag()
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_empty_group() {
        assert!(Key::new("").is_err());
    }

    #[test]
    fn notification_text_omits_layer() {
        let k = Key::new("base").unwrap().with_name("count").with_layer("system");
        assert_eq!(k.notification_text(), "base.count");
    }

    #[test]
    fn group_key_has_no_name() {
        let k = Key::new("demo").unwrap();
        assert!(k.is_group_key());
        assert_eq!(k.notification_text(), "demo");
    }

    #[test]
    fn storage_key_embeds_nul_separator() {
        let k = Key::new("base").unwrap().with_name("count");
        assert_eq!(k.storage_key(), b"base\0count".to_vec());
    }

    #[test]
    fn params_roundtrip_full_key() {
        let k = Key::new("base").unwrap().with_name("count").with_layer("system");
        let parsed = Key::from_params(&k.to_params()).unwrap();
        assert_eq!(parsed, k);
    }

    #[test]
    fn params_roundtrip_bare_group() {
        let k = Key::new("base").unwrap();
        let parsed = Key::from_params(&k.to_params()).unwrap();
        assert_eq!(parsed, k);
    }
}

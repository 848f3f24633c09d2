//! Backend identity and filename rules — spec.md §4.2, §6.

/// Identifies one backend instance: a system layer has a single shared
/// store; a user layer has one store per uid, so two clients at different
/// uids see disjoint files through the same layer name (spec.md §5).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum BackendKey {
    System(String),
    User(String, u32),
}

impl BackendKey {
    /// The deterministic on-disk filename for this backend instance —
    /// spec.md §4.2: `<name>.db` for system layers, `user-<uid>.db` for
    /// user layers.
    pub fn db_filename(&self) -> String {
        match self {
            BackendKey::System(name) => format!("{name}.db"),
            BackendKey::User(_, uid) => format!("user-{uid}.db"),
        }
    }
}

/// The `group\0name` byte key shared by both backend implementations and
/// the on-disk layout (spec.md §6). `name: None` addresses the group entry.
pub fn compose_key(group: &str, name: Option<&str>) -> Vec<u8> {
    let mut buf = group.as_bytes().to_vec();
    buf.push(0);
    if let Some(name) = name {
        buf.extend_from_slice(name.as_bytes());
    }
    buf
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn system_filename() {
        assert_eq!(BackendKey::System("base".into()).db_filename(), "base.db");
    }

    #[test]
    fn user_filename_keyed_by_uid() {
        assert_eq!(BackendKey::User("base".into(), 1000).db_filename(), "user-1000.db");
        assert_ne!(
            BackendKey::User("base".into(), 1000).db_filename(),
            BackendKey::User("base".into(), 1001).db_filename()
        );
    }

    #[test]
    fn compose_key_embeds_separator() {
        assert_eq!(compose_key("base", Some("count")), b"base\0count".to_vec());
        assert_eq!(compose_key("base", None), b"base\0".to_vec());
    }
}

//! Per-key, per-subscriber change notification — spec.md §4.5.

use std::collections::HashMap;

use buxton_wire::{values_equal_for_notification, Value};

/// One subscriber's registration for a single fully-qualified key.
#[derive(Debug, Clone)]
struct Registration {
    session_id: u64,
    last_value: Value,
}

/// `"{group}.{name}" -> [registrations]`, exactly spec.md §4.5: "layer is
/// not part of the registration key."
#[derive(Debug, Default)]
pub struct NotificationRegistry {
    registrations: HashMap<String, Vec<Registration>>,
}

impl NotificationRegistry {
    pub fn new() -> Self {
        NotificationRegistry { registrations: HashMap::new() }
    }

    /// Register `session_id` for `key_text`, seeding the dedup baseline
    /// with `current_value` — spec invariant 4: "the current value is
    /// captured to seed dedup." Callers must have already confirmed the
    /// key exists (and is readable) before calling this.
    pub fn register(&mut self, key_text: &str, session_id: u64, current_value: Value) {
        let list = self.registrations.entry(key_text.to_string()).or_default();
        list.retain(|r| r.session_id != session_id);
        list.push(Registration { session_id, last_value: current_value });
    }

    /// Remove `session_id`'s registration for `key_text`. When the list
    /// becomes empty the mapping itself is removed (spec.md §4.5).
    pub fn unregister(&mut self, key_text: &str, session_id: u64) {
        if let Some(list) = self.registrations.get_mut(key_text) {
            list.retain(|r| r.session_id != session_id);
            if list.is_empty() {
                self.registrations.remove(key_text);
            }
        }
    }

    /// Remove every registration owned by `session_id`, across all keys —
    /// used when a session terminates (spec.md §5: "notifications
    /// unsubscribed" as part of session cleanup).
    pub fn unregister_session(&mut self, session_id: u64) {
        self.registrations.retain(|_, list| {
            list.retain(|r| r.session_id != session_id);
            !list.is_empty()
        });
    }

    /// Called after a successful SET. Returns the `(session_id, new_value)`
    /// pairs that should actually receive a CHANGED frame — only
    /// subscribers whose observed value differs (spec.md §4.5: "per-
    /// subscriber dedup — two subscribers can legitimately be in
    /// different states"), updating each survivor's baseline in place.
    pub fn on_set(&mut self, key_text: &str, new_value: &Value) -> Vec<(u64, Value)> {
        let Some(list) = self.registrations.get_mut(key_text) else {
            return Vec::new();
        };
        let mut fired = Vec::new();
        for reg in list.iter_mut() {
            if !values_equal_for_notification(&reg.last_value, new_value) {
                reg.last_value = new_value.clone();
                fired.push((reg.session_id, new_value.clone()));
            }
        }
        fired
    }
}

//! Daemon-wide shared state — spec.md §5: "the layer map, the notification
//! map, and the backend handles are process-wide and mutated only from the
//! event loop thread; no synchronization primitives are needed." Held by
//! `main` in `Rc<RefCell<DaemonState>>`, never `Arc<Mutex<..>>` (see
//! DESIGN.md's concurrency resolution).

use std::collections::HashMap;

use tokio::sync::mpsc::UnboundedSender;

use buxton_core::{BackendRegistry, LayerTable, NotificationRegistry};
use buxton_policy::PolicyEngine;

use crate::config::DaemonConfig;

pub struct DaemonState {
    pub layers: LayerTable,
    pub registry: BackendRegistry,
    pub policy: PolicyEngine,
    pub notifications: NotificationRegistry,
    next_session_id: u64,
    /// Each live session's outbound channel — the notifier's fan-out
    /// writes `CHANGED` frame bytes here; the session's own task owns the
    /// receiving half and the actual socket write (spec.md §4.5: "writes
    /// to subscriber sockets are best-effort from the notifier's point of
    /// view").
    outbound: HashMap<u64, UnboundedSender<Vec<u8>>>,
}

impl DaemonState {
    pub fn new(config: &DaemonConfig) -> Self {
        let layers = config.load_layers();
        let registry = BackendRegistry::new(config.db_path.clone());
        let policy = PolicyEngine::load(config.smack_load_file.clone());
        DaemonState {
            layers,
            registry,
            policy,
            notifications: NotificationRegistry::new(),
            next_session_id: 0,
            outbound: HashMap::new(),
        }
    }

    pub fn next_session_id(&mut self) -> u64 {
        self.next_session_id += 1;
        self.next_session_id
    }

    /// Register a freshly accepted session's outbound channel.
    pub fn register_session(&mut self, session_id: u64, sender: UnboundedSender<Vec<u8>>) {
        self.outbound.insert(session_id, sender);
    }

    /// Drop a session's outbound channel and its notification
    /// registrations — spec.md §5: "Termination is immediate and
    /// idempotent: ... notifications unsubscribed."
    pub fn remove_session(&mut self, session_id: u64) {
        self.outbound.remove(&session_id);
        self.notifications.unregister_session(session_id);
    }

    /// Best-effort delivery of pre-encoded frame bytes to another live
    /// session. A missing or closed channel (the session has already
    /// disconnected) is silently dropped — spec.md §4.5: a failed
    /// subscriber write "does not abort the triggering SET."
    pub fn send_to_session(&self, session_id: u64, bytes: Vec<u8>) {
        if let Some(sender) = self.outbound.get(&session_id) {
            let _ = sender.send(bytes);
        }
    }
}

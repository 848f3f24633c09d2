//! # buxton-policy
//!
//! The mandatory-access-control gate (spec.md §4.3): built-in rules
//! checked before a loaded `(subject, object)` table, with a bypass mode
//! recorded once at startup when the kernel MAC is unavailable.

pub mod error;
pub mod peer;
pub mod rules;
pub mod watch;

pub use error::{PolicyError, Result};
pub use peer::peer_label;
pub use rules::{Access, AccessBits, RuleTable};
pub use watch::PolicyWatcher;

use std::path::{Path, PathBuf};

use tracing::warn;

/// The access gate invoked at every GET/SET/UNSET/NOTIFY — spec.md §4.3.
pub struct PolicyEngine {
    rules_path: PathBuf,
    table: RuleTable,
    bypassed: bool,
}

impl PolicyEngine {
    /// Load the rule table. If `rules_path`'s parent directory does not
    /// exist, the runtime has no kernel MAC available (the spec's "kernel
    /// MAC is unavailable" condition) and the engine enters bypass mode:
    /// every check is granted, and this is logged once here, matching
    /// spec §4.3: "this fact is recorded at startup."
    pub fn load(rules_path: impl Into<PathBuf>) -> Self {
        let rules_path = rules_path.into();
        let mount_present = rules_path
            .parent()
            .map(|dir| dir.is_dir())
            .unwrap_or(false);
        if !mount_present {
            warn!(path = %rules_path.display(), "MAC rules directory not present; bypassing access control");
            return PolicyEngine { rules_path, table: RuleTable::default(), bypassed: true };
        }
        let table = RuleTable::load(&rules_path).unwrap_or_else(|err| {
            warn!(%err, "failed to load MAC rules; starting with an empty table");
            RuleTable::default()
        });
        PolicyEngine { rules_path, table, bypassed: false }
    }

    /// `true` when the kernel MAC is unavailable and every check is
    /// granted unconditionally.
    pub fn bypassed(&self) -> bool {
        self.bypassed
    }

    pub fn rules_path(&self) -> &Path {
        &self.rules_path
    }

    /// Reload the table from disk. A failure retains the old table and
    /// logs a warning rather than panicking (spec §7: "MAC-rule reload
    /// failures: old rules retained").
    pub fn reload(&mut self) {
        if self.bypassed {
            return;
        }
        match RuleTable::load(&self.rules_path) {
            Ok(table) => {
                self.table = table;
                tracing::info!(path = %self.rules_path.display(), "reloaded MAC rules");
            }
            Err(err) => {
                warn!(%err, "MAC rule reload failed; retaining previous table");
            }
        }
    }

    /// Decide whether `subject` may exercise `access` on an object labeled
    /// `object` — spec.md §4.3's exact built-in precedence, then the
    /// loaded table, exact-match only; absence denies.
    pub fn check(&self, subject: &str, object: &str, access: Access) -> bool {
        if self.bypassed {
            return true;
        }

        // 1. Subject `*` -> denied.
        if subject == "*" {
            return false;
        }
        // 2. Subject or object `@` -> granted.
        if subject == "@" || object == "@" {
            return true;
        }
        // 3. Object `*` -> granted.
        if object == "*" {
            return true;
        }
        // 4. subject == object -> granted.
        if subject == object {
            return true;
        }
        // 5. Read-only: object `_` or subject `^` -> granted.
        if access == Access::Read && (object == "_" || subject == "^") {
            return true;
        }
        // 6. Table lookup; absence denies.
        self.table
            .lookup(subject, object)
            .map(|bits| bits.allows(access))
            .unwrap_or(false)
    }
}

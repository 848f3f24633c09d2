//! Filesystem watch on the rules file — stands in for spec.md's inotify
//! descriptor in the event loop's poll set (§4.3/§4.7), using the `notify`
//! crate rather than hand-rolled `inotify_init1`/`inotify_add_watch`.

use std::path::{Path, PathBuf};
use std::sync::mpsc;

use notify::{Event, RecommendedWatcher, RecursiveMode, Watcher};

use crate::error::{PolicyError, Result};

/// Watches one file for close-after-write events and hands them back on a
/// plain `std::sync::mpsc` channel; the daemon bridges this into its own
/// async loop (spec.md §4.7: "a second task polling a `notify` channel").
pub struct PolicyWatcher {
    // Kept alive only to keep the OS-level watch registered; never read.
    _watcher: RecommendedWatcher,
    pub events: mpsc::Receiver<notify::Result<Event>>,
    pub path: PathBuf,
}

impl PolicyWatcher {
    pub fn watch(path: &Path) -> Result<Self> {
        let (tx, rx) = mpsc::channel();
        let mut watcher = notify::recommended_watcher(move |res| {
            let _ = tx.send(res);
        })
        .map_err(PolicyError::Watch)?;
        watcher
            .watch(path, RecursiveMode::NonRecursive)
            .map_err(PolicyError::Watch)?;
        Ok(PolicyWatcher { _watcher: watcher, events: rx, path: path.to_path_buf() })
    }
}

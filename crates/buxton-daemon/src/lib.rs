//! Library surface for `buxtond`.
//!
//! Exists so `buxton-cli`'s `--direct` mode can reuse the daemon's own
//! config loader and layer/backend setup (`config::DaemonConfig`) instead
//! of re-parsing the INI file a second, possibly divergent, way — spec.md
//! §6: "`--direct` routes through `buxton-core::Resolver` in process."
//! `main.rs` is a thin binary over these same modules.

pub mod config;
pub mod dispatch;
pub mod listener;
pub mod session;
pub mod state;

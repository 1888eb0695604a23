//! mini_cbt — chat-driven CBT training demo core.
//!
//! This library crate re-exports modules so integration tests
//! (under `tests/`) can access them.

pub mod cli;
pub mod comm;
pub mod config;
pub mod dialogue;
pub mod events;
pub mod session;
pub mod trainer;
pub mod utils;

/// Return the cogni home directory.
///
/// Resolution order:
/// 1. `COGNI_HOME` environment variable
/// 2. `$HOME/.cogni`
pub fn cogni_home() -> std::path::PathBuf {
    if let Ok(p) = std::env::var("COGNI_HOME") {
        std::path::PathBuf::from(p)
    } else {
        dirs::home_dir()
            .unwrap_or_else(|| std::path::PathBuf::from("."))
            .join(".cogni")
    }
}

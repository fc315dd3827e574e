//! Session orchestration
//!
//! `SessionManager` is the crate's front door: submit an upload, poll
//! status, fetch artifacts. `CleanupSweeper` expires old sessions in the
//! background. The per-session pipeline itself lives in the runner.

pub mod manager;
mod runner;
pub mod sweeper;

pub use manager::SessionManager;
pub use sweeper::CleanupSweeper;

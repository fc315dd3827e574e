//! # VM Inventory Assessment Pipeline
//!
//! Turns a virtualization inventory export (a ZIP of delimited sheets)
//! into a costed cloud bill of materials: parse the archive into VM
//! records, map each VM onto a catalog compute shape, price the
//! allocation, and render the merged result as spreadsheet, CSV, text,
//! and JSON reports.
//!
//! **Entry point:** [`SessionManager`]: submit an upload, poll status,
//! fetch artifacts. Each submission runs asynchronously through
//! `CREATED → PARSING → SIZING → PRICING → COMPLETED`, with `ERROR` on
//! batch-fatal failures and `EXPIRED` once the cleanup sweeper reclaims
//! a finished session.
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use vmbom::artifacts::MemoryArtifactStore;
//! use vmbom::catalog::{PricingCatalog, ShapeCatalog};
//! use vmbom::config::PipelineConfig;
//! use vmbom::reports::ReportFormat;
//! use vmbom::SessionManager;
//!
//! # async fn demo(upload: Vec<u8>) -> vmbom::Result<()> {
//! let manager = Arc::new(SessionManager::new(
//!     PipelineConfig::default(),
//!     ShapeCatalog::default(),
//!     PricingCatalog::default(),
//!     Arc::new(MemoryArtifactStore::new()),
//! )?);
//! let session_id = manager
//!     .submit("inventory.zip", upload, &[ReportFormat::Spreadsheet])
//!     .await?;
//! let status = manager.get_status(session_id).await?;
//! println!("{}: {}%", status.state, status.percent);
//! # Ok(())
//! # }
//! ```

pub mod artifacts;
pub mod catalog;
pub mod config;
pub mod error;
pub mod events;
pub mod inventory;
pub mod models;
pub mod pricing;
pub mod reports;
pub mod sessions;
pub mod sizing;

pub use config::PipelineConfig;
pub use error::{Error, Result};
pub use sessions::{CleanupSweeper, SessionManager};

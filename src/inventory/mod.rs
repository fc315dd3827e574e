//! Inventory archive decoding and VM record extraction

pub mod archive;
pub mod columns;
pub mod parser;

pub use archive::{open_archive, Sheet, SheetSet};
pub use columns::{ColumnMap, Field};
pub use parser::{InventoryParser, ParsedInventory};

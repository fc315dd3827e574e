//! Inventory archive decoding
//!
//! The upload is a ZIP containing one `;`-delimited sheet per file.
//! Sheet files are located by case-insensitive name patterns; the cpu,
//! memory and disk sheets are required, the info sheet is optional.
//! Name matching scans the archive listing in sorted order so repeated
//! decodes of one archive always pick the same files.

use std::io::{Cursor, Read};

use tracing::debug;
use zip::ZipArchive;

use crate::error::FormatError;
use crate::inventory::columns::ColumnMap;

pub const CPU_SHEET: &str = "vcpu";
pub const MEMORY_SHEET: &str = "vmemory";
pub const DISK_SHEET: &str = "vdisk";
pub const INFO_SHEET: &str = "vinfo";

/// One decoded sheet: header row plus data rows
#[derive(Debug, Clone)]
pub struct Sheet {
    /// File name inside the archive
    pub name: String,
    pub headers: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl Sheet {
    pub fn columns(&self) -> ColumnMap {
        ColumnMap::resolve(&self.headers)
    }
}

/// The sheets one assessment needs
#[derive(Debug, Clone)]
pub struct SheetSet {
    pub cpu: Sheet,
    pub memory: Sheet,
    pub disk: Sheet,
    pub info: Option<Sheet>,
}

/// Decode an inventory archive into its sheets
pub fn open_archive(bytes: &[u8]) -> Result<SheetSet, FormatError> {
    let mut zip = ZipArchive::new(Cursor::new(bytes))
        .map_err(|e| FormatError::UnreadableArchive(e.to_string()))?;

    let mut names: Vec<String> = zip
        .file_names()
        .filter(|n| !n.ends_with('/'))
        .map(String::from)
        .collect();
    names.sort();
    debug!(files = names.len(), "opened inventory archive");

    let cpu = read_required(&mut zip, &names, CPU_SHEET)?;
    let memory = read_required(&mut zip, &names, MEMORY_SHEET)?;
    let disk = read_required(&mut zip, &names, DISK_SHEET)?;
    let info = match find_sheet(&names, INFO_SHEET) {
        Some(name) => Some(read_sheet(&mut zip, &name)?),
        None => None,
    };

    Ok(SheetSet {
        cpu,
        memory,
        disk,
        info,
    })
}

fn find_sheet(names: &[String], pattern: &str) -> Option<String> {
    names
        .iter()
        .find(|n| n.to_lowercase().contains(pattern))
        .cloned()
}

fn read_required(
    zip: &mut ZipArchive<Cursor<&[u8]>>,
    names: &[String],
    pattern: &'static str,
) -> Result<Sheet, FormatError> {
    let name = find_sheet(names, pattern).ok_or(FormatError::MissingSheet(pattern))?;
    read_sheet(zip, &name)
}

fn read_sheet(zip: &mut ZipArchive<Cursor<&[u8]>>, name: &str) -> Result<Sheet, FormatError> {
    let mut file = zip.by_name(name).map_err(|e| FormatError::UnreadableSheet {
        sheet: name.to_string(),
        reason: e.to_string(),
    })?;
    let mut raw = Vec::new();
    file.read_to_end(&mut raw)
        .map_err(|e| FormatError::UnreadableSheet {
            sheet: name.to_string(),
            reason: e.to_string(),
        })?;
    // Export tools emit various single-byte encodings; lossy decoding
    // keeps every row alive and only mangles exotic glyphs in labels.
    let text = String::from_utf8_lossy(&raw);

    let mut reader = csv::ReaderBuilder::new()
        .delimiter(b';')
        .has_headers(false)
        .flexible(true)
        .from_reader(text.as_bytes());

    let mut records = reader.records();
    let headers = match records.next() {
        Some(Ok(record)) => record.iter().map(|s| s.trim().to_string()).collect(),
        Some(Err(e)) => {
            return Err(FormatError::UnreadableSheet {
                sheet: name.to_string(),
                reason: e.to_string(),
            })
        }
        None => {
            return Err(FormatError::EmptySheet {
                sheet: name.to_string(),
            })
        }
    };

    let mut rows = Vec::new();
    for record in records {
        let record = record.map_err(|e| FormatError::UnreadableSheet {
            sheet: name.to_string(),
            reason: e.to_string(),
        })?;
        let row: Vec<String> = record.iter().map(|s| s.to_string()).collect();
        // Fully blank rows are padding, not data
        if row.iter().any(|cell| !cell.trim().is_empty()) {
            rows.push(row);
        }
    }

    debug!(sheet = %name, rows = rows.len(), "decoded sheet");
    Ok(Sheet {
        name: name.to_string(),
        headers,
        rows,
    })
}

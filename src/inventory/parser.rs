//! Inventory parser
//!
//! Joins the cpu, memory and disk sheets of an inventory archive into
//! `VMRecord`s. The cpu sheet is authoritative: it defines which VMs
//! exist and their output order (first appearance). Rows are joined by
//! the VM identifier column, falling back to the VM name where the
//! identifier is absent or blank.
//!
//! Row-level problems never abort the batch. A VM with an unparseable
//! numeric field is kept as an invalid record (visible in reports,
//! excluded from sizing) and the problem is recorded as a warning.
//! Archive-level problems are `FormatError`s and abort the session.

use std::collections::{HashMap, HashSet};

use tracing::{info, warn};

use crate::error::FormatError;
use crate::inventory::archive::{self, Sheet, SheetSet};
use crate::inventory::columns::{ColumnMap, Field};
use crate::models::{DiskAllocation, OsFamily, PowerState, VMRecord};

/// Parsed batch: records in cpu-sheet order plus row-level warnings
#[derive(Debug, Clone, Default)]
pub struct ParsedInventory {
    pub records: Vec<VMRecord>,
    pub warnings: Vec<String>,
}

/// Decodes inventory archives into VM records
#[derive(Debug, Clone, Default)]
pub struct InventoryParser;

impl InventoryParser {
    pub fn new() -> Self {
        Self
    }

    /// Parse a raw archive into VM records
    pub fn parse(&self, bytes: &[u8]) -> Result<ParsedInventory, FormatError> {
        let sheets = archive::open_archive(bytes)?;
        let mut warnings = Vec::new();

        let cpu_columns = sheets.cpu.columns();
        require(&sheets.cpu, &cpu_columns, Field::VmName)?;
        require(&sheets.cpu, &cpu_columns, Field::Cpus)?;

        let memory = index_memory(&sheets, &mut warnings)?;
        let disks = index_disks(&sheets, &mut warnings);
        let info = sheets.info.as_ref().map(index_info).unwrap_or_default();

        let mut records = Vec::new();
        let mut seen = HashSet::new();
        for row in &sheets.cpu.rows {
            let Some(key) = row_key(&cpu_columns, row) else {
                warnings.push(String::from(
                    "cpu sheet row with no VM name or identifier skipped",
                ));
                continue;
            };
            if !seen.insert(key.clone()) {
                warnings.push(format!("duplicate cpu sheet row for '{key}' ignored"));
                continue;
            }

            let name = cpu_columns
                .get(Field::VmName, row)
                .unwrap_or(key.as_str())
                .to_string();
            let id = cpu_columns
                .get(Field::VmId, row)
                .unwrap_or(name.as_str())
                .to_string();
            let vm_info = info.get(&key);

            let mut invalid_reason = None;
            let vcpus = match cpu_columns.parse_count(Field::Cpus, row) {
                Some(0) => {
                    note_invalid(
                        &mut invalid_reason,
                        &mut warnings,
                        &name,
                        "reports zero vCPUs",
                    );
                    0
                }
                Some(n) => n,
                None => {
                    let raw = cpu_columns.get(Field::Cpus, row).unwrap_or("");
                    note_invalid(
                        &mut invalid_reason,
                        &mut warnings,
                        &name,
                        format!("CPU count '{raw}' is not numeric"),
                    );
                    0
                }
            };

            let memory_mib = match memory.get(&key) {
                Some(MemoryCell::Mib(mib)) => *mib,
                Some(MemoryCell::Invalid(raw)) => {
                    note_invalid(
                        &mut invalid_reason,
                        &mut warnings,
                        &name,
                        format!("memory size '{raw}' is not numeric"),
                    );
                    0
                }
                None => {
                    note_invalid(
                        &mut invalid_reason,
                        &mut warnings,
                        &name,
                        "has no memory sheet row",
                    );
                    0
                }
            };

            let vm_disks = match disks.get(&key) {
                Some(entry) => {
                    if let Some(raw) = &entry.invalid {
                        note_invalid(
                            &mut invalid_reason,
                            &mut warnings,
                            &name,
                            format!("disk capacity '{raw}' is not numeric"),
                        );
                    }
                    entry.disks.clone()
                }
                None => Vec::new(),
            };

            // Prefer the cpu sheet's own columns, then the info sheet
            let os_edition = cpu_columns
                .get(Field::OsConfig, row)
                .or(vm_info.and_then(|i| i.os.as_deref()))
                .unwrap_or("")
                .to_string();
            let power_state = cpu_columns
                .get(Field::PowerState, row)
                .or(vm_info.and_then(|i| i.power.as_deref()))
                .map(PowerState::detect)
                // Exports without power information predate that column;
                // treat their VMs as running, as the vendor tool does
                .unwrap_or(PowerState::On);
            let cluster = cpu_columns
                .get(Field::Cluster, row)
                .or(vm_info.and_then(|i| i.cluster.as_deref()))
                .map(String::from);
            let host = cpu_columns
                .get(Field::Host, row)
                .or(vm_info.and_then(|i| i.host.as_deref()))
                .map(String::from);

            records.push(VMRecord {
                id,
                name,
                vcpus,
                memory_mib,
                disks: vm_disks,
                os_family: OsFamily::detect(&os_edition),
                os_edition,
                power_state,
                cluster,
                host,
                invalid_reason,
            });
        }

        if records.is_empty() {
            return Err(FormatError::NoRecords);
        }

        let orphaned_memory = memory.keys().filter(|k| !seen.contains(*k)).count();
        if orphaned_memory > 0 {
            warnings.push(format!(
                "memory sheet references {orphaned_memory} VM(s) not present in the cpu sheet"
            ));
        }
        let orphaned_disks = disks.keys().filter(|k| !seen.contains(*k)).count();
        if orphaned_disks > 0 {
            warnings.push(format!(
                "disk sheet references {orphaned_disks} VM(s) not present in the cpu sheet"
            ));
        }

        info!(
            records = records.len(),
            warnings = warnings.len(),
            "parsed inventory archive"
        );
        Ok(ParsedInventory { records, warnings })
    }
}

/// Join key for a row: identifier cell, falling back to the name cell
fn row_key(columns: &ColumnMap, row: &[String]) -> Option<String> {
    columns
        .get(Field::VmId, row)
        .or_else(|| columns.get(Field::VmName, row))
        .map(String::from)
}

fn require(sheet: &Sheet, columns: &ColumnMap, field: Field) -> Result<(), FormatError> {
    if columns.has(field) {
        Ok(())
    } else {
        Err(FormatError::MissingColumn {
            sheet: sheet.name.clone(),
            column: field.describe(),
        })
    }
}

enum MemoryCell {
    Mib(u64),
    /// Raw cell text kept for the warning message
    Invalid(String),
}

fn index_memory(
    sheets: &SheetSet,
    warnings: &mut Vec<String>,
) -> Result<HashMap<String, MemoryCell>, FormatError> {
    let columns = sheets.memory.columns();
    require(&sheets.memory, &columns, Field::MemoryMib)?;

    let mut map: HashMap<String, MemoryCell> = HashMap::new();
    for row in &sheets.memory.rows {
        let Some(key) = row_key(&columns, row) else {
            continue;
        };
        if map.contains_key(&key) {
            warnings.push(format!("duplicate memory sheet row for '{key}' ignored"));
            continue;
        }
        let cell = match columns.parse_mib(Field::MemoryMib, row) {
            Some(mib) => MemoryCell::Mib(mib),
            None => {
                MemoryCell::Invalid(columns.get(Field::MemoryMib, row).unwrap_or("").to_string())
            }
        };
        map.insert(key, cell);
    }
    Ok(map)
}

#[derive(Default)]
struct DiskEntry {
    disks: Vec<DiskAllocation>,
    /// First unparseable capacity cell, if any
    invalid: Option<String>,
}

fn index_disks(sheets: &SheetSet, warnings: &mut Vec<String>) -> HashMap<String, DiskEntry> {
    let columns = sheets.disk.columns();
    if !columns.has(Field::DiskCapacityMib) {
        // A disk sheet without capacities contributes nothing; VMs are
        // still assessable as compute-only
        warnings.push(format!(
            "disk sheet '{}' has no '{}' column; storage sizing skipped",
            sheets.disk.name,
            Field::DiskCapacityMib.describe()
        ));
        return HashMap::new();
    }

    let mut map: HashMap<String, DiskEntry> = HashMap::new();
    for row in &sheets.disk.rows {
        let Some(key) = row_key(&columns, row) else {
            continue;
        };
        let entry = map.entry(key).or_default();
        let label = match columns.get(Field::DiskLabel, row) {
            Some(label) => label.to_string(),
            None => format!("disk {}", entry.disks.len() + 1),
        };
        match columns.parse_mib(Field::DiskCapacityMib, row) {
            Some(mib) => entry.disks.push(DiskAllocation {
                label,
                capacity_gib: mib as f64 / 1024.0,
            }),
            None => {
                let raw = columns
                    .get(Field::DiskCapacityMib, row)
                    .unwrap_or("")
                    .to_string();
                warn!(disk = %label, value = %raw, "unparseable disk capacity");
                entry.invalid.get_or_insert(raw);
            }
        }
    }
    map
}

#[derive(Default)]
struct InfoCells {
    os: Option<String>,
    power: Option<String>,
    cluster: Option<String>,
    host: Option<String>,
}

fn index_info(sheet: &Sheet) -> HashMap<String, InfoCells> {
    let columns = sheet.columns();
    let mut map: HashMap<String, InfoCells> = HashMap::new();
    for row in &sheet.rows {
        let Some(key) = row_key(&columns, row) else {
            continue;
        };
        map.entry(key).or_insert_with(|| InfoCells {
            os: columns.get(Field::OsConfig, row).map(String::from),
            power: columns.get(Field::PowerState, row).map(String::from),
            cluster: columns.get(Field::Cluster, row).map(String::from),
            host: columns.get(Field::Host, row).map(String::from),
        });
    }
    map
}

fn note_invalid(
    invalid_reason: &mut Option<String>,
    warnings: &mut Vec<String>,
    vm_name: &str,
    reason: impl Into<String>,
) {
    let reason = reason.into();
    warnings.push(format!("VM '{vm_name}': {reason}"));
    if invalid_reason.is_none() {
        *invalid_reason = Some(reason);
    }
}

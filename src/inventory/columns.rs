//! Column resolution for inventory sheets
//!
//! Export tools are not consistent about header spelling across
//! versions and locales, so each logical field carries an alias table
//! and sheets are resolved header-by-header. Matching is
//! case-insensitive with whitespace collapsed.

use std::collections::BTreeMap;

/// Logical fields the parser reads from inventory sheets
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Field {
    VmId,
    VmName,
    OsConfig,
    Cpus,
    MemoryMib,
    DiskCapacityMib,
    DiskLabel,
    PowerState,
    Cluster,
    Host,
}

impl Field {
    /// Accepted header spellings, normalized form
    fn aliases(self) -> &'static [&'static str] {
        match self {
            Field::VmId => &["vm uuid", "vm id", "uuid", "smbios uuid"],
            Field::VmName => &["vm", "vm name", "vmname", "name", "virtual machine"],
            Field::OsConfig => &[
                "os according to the configuration file",
                "os according to the vmware tools",
                "os",
                "operating system",
                "guest os",
            ],
            Field::Cpus => &["cpus", "cpu", "vcpu", "vcpus", "num cpu"],
            Field::MemoryMib => &[
                "size mib",
                "size mb",
                "memory",
                "memory mib",
                "memory mb",
                "ram",
            ],
            Field::DiskCapacityMib => &[
                "capacity mib",
                "capacity mb",
                "capacity",
                "disk capacity mib",
                "provisioned mib",
                "provisioned mb",
            ],
            Field::DiskLabel => &["disk", "disk key"],
            Field::PowerState => &["powerstate", "power state", "power"],
            Field::Cluster => &["cluster", "cluster name"],
            Field::Host => &["host", "esx host", "host name"],
        }
    }

    /// Canonical header name, used in missing-column errors
    pub fn describe(self) -> &'static str {
        match self {
            Field::VmId => "VM UUID",
            Field::VmName => "VM",
            Field::OsConfig => "OS according to the configuration file",
            Field::Cpus => "CPUs",
            Field::MemoryMib => "Size MiB",
            Field::DiskCapacityMib => "Capacity MiB",
            Field::DiskLabel => "Disk",
            Field::PowerState => "Powerstate",
            Field::Cluster => "Cluster",
            Field::Host => "Host",
        }
    }
}

const ALL_FIELDS: [Field; 10] = [
    Field::VmId,
    Field::VmName,
    Field::OsConfig,
    Field::Cpus,
    Field::MemoryMib,
    Field::DiskCapacityMib,
    Field::DiskLabel,
    Field::PowerState,
    Field::Cluster,
    Field::Host,
];

fn normalize(header: &str) -> String {
    header
        .trim()
        .to_lowercase()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

/// Resolved field -> column index mapping for one sheet
#[derive(Debug, Clone, Default)]
pub struct ColumnMap {
    indices: BTreeMap<Field, usize>,
}

impl ColumnMap {
    /// Resolve a header row. Unknown headers are ignored; the first
    /// matching column wins when a field appears twice.
    pub fn resolve(headers: &[String]) -> Self {
        let normalized: Vec<String> = headers.iter().map(|h| normalize(h)).collect();
        let mut indices = BTreeMap::new();
        for field in ALL_FIELDS {
            for alias in field.aliases() {
                if let Some(idx) = normalized.iter().position(|h| h == alias) {
                    indices.entry(field).or_insert(idx);
                    break;
                }
            }
        }
        Self { indices }
    }

    pub fn has(&self, field: Field) -> bool {
        self.indices.contains_key(&field)
    }

    /// Cell for `field` in `row`, trimmed; `None` when the column is
    /// unmapped, the row is short, or the cell is blank.
    pub fn get<'a>(&self, field: Field, row: &'a [String]) -> Option<&'a str> {
        let idx = *self.indices.get(&field)?;
        let cell = row.get(idx)?.trim();
        if cell.is_empty() {
            None
        } else {
            Some(cell)
        }
    }

    /// Parse a small count (vCPU) cell
    pub fn parse_count(&self, field: Field, row: &[String]) -> Option<u32> {
        let value = parse_numeric(self.get(field, row)?)?;
        if value > f64::from(u32::MAX) {
            return None;
        }
        Some(value.round() as u32)
    }

    /// Parse a MiB-sized cell
    pub fn parse_mib(&self, field: Field, row: &[String]) -> Option<u64> {
        let value = parse_numeric(self.get(field, row)?)?;
        if value > u64::MAX as f64 {
            return None;
        }
        Some(value.round() as u64)
    }
}

/// Tolerant numeric parse: strips thousands separators, accepts
/// integer and decimal spellings, rejects everything else.
fn parse_numeric(cell: &str) -> Option<f64> {
    let cleaned: String = cell
        .chars()
        .filter(|c| !matches!(c, ',' | ' ' | '\u{a0}'))
        .collect();
    let value: f64 = cleaned.parse().ok()?;
    if !value.is_finite() || value < 0.0 {
        return None;
    }
    Some(value)
}

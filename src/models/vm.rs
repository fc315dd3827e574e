//! Per-VM inventory record
//!
//! One `VMRecord` per inventory row, built by the inventory parser and
//! immutable afterwards. A record with an unmet invariant (vCPU >= 1,
//! memory >= 1 MiB, all numeric fields parseable) carries an
//! `invalid_reason` instead of being dropped: it is excluded from sizing
//! but retained for reporting and audit.

use serde::{Deserialize, Serialize};

/// Operating system family detected from the configured OS string
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum OsFamily {
    Windows,
    Linux,
    Other,
}

impl OsFamily {
    /// Detect the family from a vendor OS description, e.g.
    /// "Microsoft Windows Server 2019 (64-bit)" or "Ubuntu Linux (64-bit)".
    pub fn detect(os: &str) -> Self {
        let lower = os.to_lowercase();
        const WINDOWS_MARKERS: [&str; 2] = ["windows", "microsoft"];
        const LINUX_MARKERS: [&str; 13] = [
            "linux", "ubuntu", "centos", "red hat", "rhel", "debian", "suse", "oracle", "unix",
            "aix", "solaris", "bsd", "fedora",
        ];

        if WINDOWS_MARKERS.iter().any(|m| lower.contains(m)) {
            OsFamily::Windows
        } else if LINUX_MARKERS.iter().any(|m| lower.contains(m)) {
            OsFamily::Linux
        } else {
            OsFamily::Other
        }
    }
}

impl std::fmt::Display for OsFamily {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OsFamily::Windows => write!(f, "Windows"),
            OsFamily::Linux => write!(f, "Linux"),
            OsFamily::Other => write!(f, "Other"),
        }
    }
}

/// Power state reported by the hypervisor
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PowerState {
    #[serde(rename = "poweredOn")]
    On,
    #[serde(rename = "poweredOff")]
    Off,
    #[serde(rename = "suspended")]
    Suspended,
    #[serde(rename = "unknown")]
    Unknown,
}

impl PowerState {
    /// Detect the state from a vendor power-state string.
    ///
    /// Match order matters: "poweredOn" and "poweredOff" both contain "o",
    /// so the on-markers are checked before the off-markers.
    pub fn detect(raw: &str) -> Self {
        let lower = raw.to_lowercase();
        if lower.contains("on") || lower.contains("running") {
            PowerState::On
        } else if lower.contains("off") || lower.contains("stopped") {
            PowerState::Off
        } else if lower.contains("suspend") {
            PowerState::Suspended
        } else {
            PowerState::Unknown
        }
    }

    /// True only for running VMs; suspended VMs are treated as dormant
    pub fn is_on(&self) -> bool {
        matches!(self, PowerState::On)
    }
}

impl std::fmt::Display for PowerState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PowerState::On => write!(f, "poweredOn"),
            PowerState::Off => write!(f, "poweredOff"),
            PowerState::Suspended => write!(f, "suspended"),
            PowerState::Unknown => write!(f, "unknown"),
        }
    }
}

/// One source virtual disk, kept separate through sizing (disks are never
/// merged or split)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiskAllocation {
    /// Label from the inventory, e.g. "Hard disk 1"
    pub label: String,
    /// Allocated capacity in GiB
    pub capacity_gib: f64,
}

/// One inventory row, joined across the cpu/memory/disk sheets
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VMRecord {
    /// Stable identifier: the inventory's VM UUID, or the VM name when the
    /// export carries no UUID column
    pub id: String,
    pub name: String,
    pub vcpus: u32,
    pub memory_mib: u64,
    /// Source disks in sheet order
    pub disks: Vec<DiskAllocation>,
    pub os_family: OsFamily,
    /// Raw OS string from the export, kept for license lookup and reports
    pub os_edition: String,
    pub power_state: PowerState,
    pub cluster: Option<String>,
    pub host: Option<String>,
    /// Present when the record failed validation; such records are excluded
    /// from sizing but still appear in reports
    pub invalid_reason: Option<String>,
}

impl VMRecord {
    pub fn is_valid(&self) -> bool {
        self.invalid_reason.is_none()
    }

    pub fn memory_gib(&self) -> f64 {
        self.memory_mib as f64 / 1024.0
    }

    /// Memory requirement rounded up to whole GiB
    pub fn memory_gib_ceil(&self) -> u64 {
        self.memory_mib.div_ceil(1024)
    }

    pub fn total_disk_gib(&self) -> f64 {
        self.disks.iter().map(|d| d.capacity_gib).sum()
    }

    /// License class for sizing floors and license pricing.
    /// Windows guests need a Windows Server license; Linux and unrecognized
    /// guests carry no license uplift.
    pub fn license_class(&self) -> Option<&'static str> {
        match self.os_family {
            OsFamily::Windows => Some("windows_server"),
            OsFamily::Linux | OsFamily::Other => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn os_family_detection() {
        assert_eq!(
            OsFamily::detect("Microsoft Windows Server 2019 (64-bit)"),
            OsFamily::Windows
        );
        assert_eq!(OsFamily::detect("Ubuntu Linux (64-bit)"), OsFamily::Linux);
        assert_eq!(OsFamily::detect("Red Hat Enterprise Linux 8"), OsFamily::Linux);
        assert_eq!(OsFamily::detect("Oracle Solaris 11"), OsFamily::Linux);
        assert_eq!(OsFamily::detect("FreeDOS"), OsFamily::Other);
        assert_eq!(OsFamily::detect(""), OsFamily::Other);
    }

    #[test]
    fn power_state_detection() {
        assert_eq!(PowerState::detect("poweredOn"), PowerState::On);
        assert_eq!(PowerState::detect("poweredOff"), PowerState::Off);
        assert_eq!(PowerState::detect("Running"), PowerState::On);
        assert_eq!(PowerState::detect("stopped"), PowerState::Off);
        assert_eq!(PowerState::detect("Suspended"), PowerState::Suspended);
        assert_eq!(PowerState::detect("???"), PowerState::Unknown);
    }

    #[test]
    fn memory_ceil_rounds_partial_gib_up() {
        let record = VMRecord {
            id: "u-1".into(),
            name: "vm-1".into(),
            vcpus: 2,
            memory_mib: 1536,
            disks: Vec::new(),
            os_family: OsFamily::Linux,
            os_edition: "Ubuntu Linux (64-bit)".into(),
            power_state: PowerState::On,
            cluster: None,
            host: None,
            invalid_reason: None,
        };
        assert_eq!(record.memory_gib_ceil(), 2);
        assert!((record.memory_gib() - 1.5).abs() < f64::EPSILON);
    }

    #[test]
    fn license_class_only_for_windows() {
        let mut record = VMRecord {
            id: "u-1".into(),
            name: "vm-1".into(),
            vcpus: 2,
            memory_mib: 4096,
            disks: Vec::new(),
            os_family: OsFamily::Windows,
            os_edition: "Microsoft Windows Server 2022".into(),
            power_state: PowerState::On,
            cluster: None,
            host: None,
            invalid_reason: None,
        };
        assert_eq!(record.license_class(), Some("windows_server"));
        record.os_family = OsFamily::Linux;
        assert_eq!(record.license_class(), None);
    }
}

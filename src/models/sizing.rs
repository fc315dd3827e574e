//! Sizing recommendation types
//!
//! One `SizingRecommendation` per valid VM record, produced by the sizing
//! engine and immutable afterwards. Allocated OCPU, memory, and storage are
//! always at or above the source requirement.

use serde::{Deserialize, Serialize};

/// Block volume performance tier
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VolumeTier {
    Balanced,
    HigherPerformance,
}

impl std::fmt::Display for VolumeTier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            VolumeTier::Balanced => write!(f, "Balanced"),
            VolumeTier::HigherPerformance => write!(f, "Higher Performance"),
        }
    }
}

/// One block volume, mapped 1:1 from a source disk
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VolumeRecommendation {
    /// Source disk label
    pub label: String,
    /// Allocated size in whole GiB, >= the source disk capacity
    pub size_gib: u64,
    pub tier: VolumeTier,
}

/// Chosen cloud shape and storage layout for one VM
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SizingRecommendation {
    pub vm_id: String,
    /// Catalog shape name, e.g. "VM.Standard.E4.Flex"
    pub shape: String,
    pub ocpus: u32,
    /// Memory allocated on the shape, whole GiB
    pub memory_gib: u64,
    /// One volume per source disk, in source order
    pub volumes: Vec<VolumeRecommendation>,
    /// Human-readable audit trail of the sizing rules that changed the
    /// outcome, e.g. "license minimum of 2 OCPUs applied (windows_server)"
    pub rules_applied: Vec<String>,
}

impl SizingRecommendation {
    pub fn total_storage_gib(&self) -> u64 {
        self.volumes.iter().map(|v| v.size_gib).sum()
    }

    /// vCPU capacity of the allocation (2 vCPUs per OCPU)
    pub fn vcpu_capacity(&self) -> u32 {
        self.ocpus * 2
    }
}

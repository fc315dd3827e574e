//! Compute shape catalog
//!
//! Describes the target cloud's flexible compute shapes (OCPU range,
//! granularity, per-OCPU memory limits) plus the block-volume sizing
//! knobs the sizing engine needs. Loaded from JSON or built from the
//! built-in defaults.

use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::models::VolumeTier;

/// One flexible compute shape
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComputeShape {
    pub name: String,
    /// Smallest OCPU allocation the shape supports
    pub ocpu_min: u32,
    /// Largest OCPU allocation the shape supports
    pub ocpu_max: u32,
    /// OCPU granularity; allocations grow from `ocpu_min` in this step
    pub ocpu_step: u32,
    /// Memory floor in GiB per allocated OCPU
    pub memory_min_gib_per_ocpu: u32,
    /// Memory ceiling in GiB per allocated OCPU
    pub memory_max_gib_per_ocpu: u32,
}

impl ComputeShape {
    /// Smallest OCPU count whose memory ceiling covers `memory_gib`
    pub fn min_ocpus_for_memory(&self, memory_gib: u64) -> u32 {
        let per_ocpu = u64::from(self.memory_max_gib_per_ocpu);
        let needed = memory_gib.div_ceil(per_ocpu);
        u32::try_from(needed).unwrap_or(u32::MAX)
    }

    /// Round `ocpus` up to the next allocation the shape actually offers
    pub fn round_up_to_step(&self, ocpus: u32) -> u32 {
        if ocpus <= self.ocpu_min {
            return self.ocpu_min;
        }
        let above_min = ocpus - self.ocpu_min;
        let steps = above_min.div_ceil(self.ocpu_step);
        self.ocpu_min.saturating_add(steps.saturating_mul(self.ocpu_step))
    }

    /// Memory the shape allocates at minimum for `ocpus`
    pub fn min_memory_gib(&self, ocpus: u32) -> u64 {
        u64::from(ocpus) * u64::from(self.memory_min_gib_per_ocpu)
    }
}

fn default_min_volume_gib() -> u64 {
    50
}

fn default_performance_volume_max_gib() -> u64 {
    200
}

/// Shape catalog plus block-volume sizing knobs
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShapeCatalog {
    pub version: String,
    pub shapes: Vec<ComputeShape>,
    /// Per-license-class OCPU floor applied after vCPU conversion
    #[serde(default)]
    pub license_min_ocpus: BTreeMap<String, u32>,
    /// Block volumes are never provisioned below this size
    #[serde(default = "default_min_volume_gib")]
    pub min_volume_gib: u64,
    /// Volumes at or below this size get the higher-performance tier
    #[serde(default = "default_performance_volume_max_gib")]
    pub performance_volume_max_gib: u64,
}

impl Default for ShapeCatalog {
    fn default() -> Self {
        Self {
            version: String::from("built-in"),
            shapes: vec![ComputeShape {
                name: String::from("VM.Standard.E4.Flex"),
                ocpu_min: 1,
                ocpu_max: 64,
                ocpu_step: 1,
                memory_min_gib_per_ocpu: 1,
                memory_max_gib_per_ocpu: 64,
            }],
            license_min_ocpus: BTreeMap::new(),
            min_volume_gib: default_min_volume_gib(),
            performance_volume_max_gib: default_performance_volume_max_gib(),
        }
    }
}

impl ShapeCatalog {
    /// Parse and validate a catalog from JSON text
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let catalog: Self = serde_json::from_str(json)?;
        catalog.validate()?;
        Ok(catalog)
    }

    /// Load and validate a catalog from a JSON file
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json(&json)
    }

    pub fn shape(&self, name: &str) -> Option<&ComputeShape> {
        self.shapes.iter().find(|s| s.name == name)
    }

    /// Performance tier for a volume of the given size
    pub fn tier_for(&self, size_gib: u64) -> VolumeTier {
        if size_gib <= self.performance_volume_max_gib {
            VolumeTier::HigherPerformance
        } else {
            VolumeTier::Balanced
        }
    }

    /// OCPU floor for a license class, if the catalog declares one
    pub fn license_floor(&self, license_class: &str) -> Option<u32> {
        self.license_min_ocpus.get(license_class).copied()
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.version.trim().is_empty() {
            return Err(ConfigError::invalid("shape catalog", "version must not be empty"));
        }
        if self.shapes.is_empty() {
            return Err(ConfigError::invalid(
                "shape catalog",
                "catalog must declare at least one shape",
            ));
        }
        let mut seen = std::collections::BTreeSet::new();
        for shape in &self.shapes {
            if shape.name.trim().is_empty() {
                return Err(ConfigError::invalid("shape catalog", "shape name must not be empty"));
            }
            if !seen.insert(shape.name.as_str()) {
                return Err(ConfigError::invalid(
                    "shape catalog",
                    format!("duplicate shape '{}'", shape.name),
                ));
            }
            if shape.ocpu_min == 0 || shape.ocpu_step == 0 {
                return Err(ConfigError::invalid(
                    "shape catalog",
                    format!("shape '{}' must have ocpu_min >= 1 and ocpu_step >= 1", shape.name),
                ));
            }
            if shape.ocpu_min > shape.ocpu_max {
                return Err(ConfigError::invalid(
                    "shape catalog",
                    format!("shape '{}' has ocpu_min above ocpu_max", shape.name),
                ));
            }
            if shape.memory_max_gib_per_ocpu == 0 {
                return Err(ConfigError::invalid(
                    "shape catalog",
                    format!("shape '{}' must allow at least 1 GiB per OCPU", shape.name),
                ));
            }
            if shape.memory_min_gib_per_ocpu > shape.memory_max_gib_per_ocpu {
                return Err(ConfigError::invalid(
                    "shape catalog",
                    format!("shape '{}' has memory floor above memory ceiling", shape.name),
                ));
            }
        }
        for (class, floor) in &self.license_min_ocpus {
            if *floor == 0 {
                return Err(ConfigError::invalid(
                    "shape catalog",
                    format!("license class '{class}' has a zero OCPU floor"),
                ));
            }
        }
        if self.min_volume_gib == 0 {
            return Err(ConfigError::invalid(
                "shape catalog",
                "min_volume_gib must be at least 1",
            ));
        }
        Ok(())
    }
}

//! Sizing engine
//!
//! Maps one source VM onto the cheapest catalog shape that covers its
//! CPU and memory requirement, and maps each source disk onto a block
//! volume. Pure and deterministic: same record + same catalogs = same
//! recommendation. Every adjustment rule that changes an allocation is
//! recorded on the recommendation for the technical report.

use std::sync::Arc;

use rust_decimal::Decimal;
use tracing::warn;

use crate::catalog::{ComputeShape, PricingCatalog, ShapeCatalog};
use crate::error::SizingError;
use crate::models::{SizingRecommendation, VMRecord, VolumeRecommendation};

/// vCPU per OCPU conversion factor
const VCPUS_PER_OCPU: u32 = 2;

#[derive(Debug, Clone)]
pub struct SizingEngine {
    shapes: Arc<ShapeCatalog>,
    /// Rate card used only to rank feasible shapes by cost
    pricing: Arc<PricingCatalog>,
}

/// One feasible (shape, allocation) pair with its ranking keys
struct Candidate<'a> {
    index: usize,
    shape: &'a ComputeShape,
    ocpus: u32,
    /// OCPU requirement before shape-minimum and granularity rounding
    before_rounding: u32,
    memory_raised_ocpus: bool,
    allocated_memory_gib: u64,
    /// Hourly compute + memory cost, the primary ranking key
    extended_cost: Decimal,
    unit_price_sum: Decimal,
}

impl SizingEngine {
    pub fn new(shapes: Arc<ShapeCatalog>, pricing: Arc<PricingCatalog>) -> Self {
        Self { shapes, pricing }
    }

    /// Produce a sizing recommendation for one VM record
    pub fn size(&self, record: &VMRecord) -> Result<SizingRecommendation, SizingError> {
        if let Some(reason) = &record.invalid_reason {
            return Err(SizingError::InvalidRecord(reason.clone()));
        }

        let mut rules = Vec::new();

        // 1 OCPU = 2 vCPU, rounded up to a whole OCPU
        let mut required_ocpus = record.vcpus.div_ceil(VCPUS_PER_OCPU).max(1);
        if record.vcpus % VCPUS_PER_OCPU != 0 {
            rules.push(format!(
                "rounded {} vCPU up to {} OCPU",
                record.vcpus, required_ocpus
            ));
        }

        if let Some(class) = record.license_class() {
            if let Some(floor) = self.shapes.license_floor(class) {
                if floor > required_ocpus {
                    required_ocpus = floor;
                    rules.push(format!("license minimum of {floor} OCPUs applied ({class})"));
                }
            }
        }

        let required_memory_gib = record.memory_gib_ceil();

        let candidate = self
            .shapes
            .shapes
            .iter()
            .enumerate()
            .filter_map(|(index, shape)| {
                self.candidate(index, shape, required_ocpus, required_memory_gib)
            })
            .min_by(|a, b| {
                a.extended_cost
                    .cmp(&b.extended_cost)
                    .then(a.unit_price_sum.cmp(&b.unit_price_sum))
                    .then(a.ocpus.cmp(&b.ocpus))
                    .then(a.index.cmp(&b.index))
            })
            .ok_or(SizingError::NoShapeFits {
                ocpus: required_ocpus,
                memory_gib: required_memory_gib,
            })?;

        if candidate.memory_raised_ocpus {
            rules.push(format!(
                "OCPU raised to {} to reach {} GiB memory",
                candidate.before_rounding, required_memory_gib
            ));
        }
        if candidate.before_rounding < candidate.shape.ocpu_min {
            rules.push(format!(
                "raised to shape minimum of {} OCPUs",
                candidate.shape.ocpu_min
            ));
        } else if candidate.ocpus > candidate.before_rounding {
            rules.push(format!(
                "rounded up to shape granularity of {}",
                candidate.shape.ocpu_step
            ));
        }
        if candidate.allocated_memory_gib > required_memory_gib {
            rules.push(format!(
                "memory raised to shape minimum of {} GiB",
                candidate.allocated_memory_gib
            ));
        }

        let volumes = self.volumes(record, &mut rules);

        Ok(SizingRecommendation {
            vm_id: record.id.clone(),
            shape: candidate.shape.name.clone(),
            ocpus: candidate.ocpus,
            memory_gib: candidate.allocated_memory_gib,
            volumes,
            rules_applied: rules,
        })
    }

    /// Allocation this shape would need, or `None` when it cannot cover
    /// the requirement
    fn candidate<'a>(
        &self,
        index: usize,
        shape: &'a ComputeShape,
        required_ocpus: u32,
        required_memory_gib: u64,
    ) -> Option<Candidate<'a>> {
        let Some(rate) = self.pricing.compute_rate(&shape.name) else {
            // validate_catalogs refuses unrated shapes up front
            warn!(shape = %shape.name, "shape has no compute rate, skipped");
            return None;
        };

        let memory_floor = shape.min_ocpus_for_memory(required_memory_gib);
        let memory_raised_ocpus = memory_floor > required_ocpus;
        let before_rounding = required_ocpus.max(memory_floor);
        let ocpus = shape.round_up_to_step(before_rounding);
        if ocpus > shape.ocpu_max {
            return None;
        }
        let allocated_memory_gib = required_memory_gib.max(shape.min_memory_gib(ocpus));

        let memory_rate = rate.memory_gib_hourly.unwrap_or(Decimal::ZERO);
        let extended_cost = Decimal::from(ocpus) * rate.ocpu_hourly
            + Decimal::from(allocated_memory_gib) * memory_rate;

        Some(Candidate {
            index,
            shape,
            ocpus,
            before_rounding,
            memory_raised_ocpus,
            allocated_memory_gib,
            extended_cost,
            unit_price_sum: rate.ocpu_hourly + memory_rate,
        })
    }

    /// One block volume per source disk, raised to the catalog minimum
    fn volumes(&self, record: &VMRecord, rules: &mut Vec<String>) -> Vec<VolumeRecommendation> {
        record
            .disks
            .iter()
            .map(|disk| {
                let exact = disk.capacity_gib.ceil() as u64;
                let size_gib = exact.max(self.shapes.min_volume_gib);
                if size_gib > exact {
                    rules.push(format!(
                        "volume '{}' raised to minimum {} GiB",
                        disk.label, self.shapes.min_volume_gib
                    ));
                }
                VolumeRecommendation {
                    label: disk.label.clone(),
                    size_gib,
                    tier: self.shapes.tier_for(size_gib),
                }
            })
            .collect()
    }
}

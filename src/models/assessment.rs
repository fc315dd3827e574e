//! Assessment result: the merged output of parsing, sizing, and pricing
//!
//! Built once per session run and never mutated afterwards; every report
//! format renders from the same instance. The generation timestamp is
//! captured here so all artifacts of one run carry the same stamp.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::cost::CostBreakdown;
use super::sizing::SizingRecommendation;
use super::vm::VMRecord;

/// Pipeline stage a per-VM failure was recorded in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureStage {
    Sizing,
    Pricing,
}

impl std::fmt::Display for FailureStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FailureStage::Sizing => write!(f, "sizing"),
            FailureStage::Pricing => write!(f, "pricing"),
        }
    }
}

/// A per-VM failure absorbed into the result instead of aborting the batch
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssessmentFailure {
    pub vm_id: String,
    pub vm_name: String,
    pub stage: FailureStage,
    pub reason: String,
}

/// One VM's slice of the result. `sizing`/`cost` are absent for invalid
/// records and for VMs that failed a stage.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VmAssessment {
    pub record: VMRecord,
    pub sizing: Option<SizingRecommendation>,
    pub cost: Option<CostBreakdown>,
}

impl VmAssessment {
    /// True when the VM made it through both sizing and pricing
    pub fn is_assessed(&self) -> bool {
        self.cost.is_some()
    }
}

/// Aggregate totals over the whole fleet
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssessmentTotals {
    pub vm_count: usize,
    pub powered_on: usize,
    pub powered_off: usize,
    /// VMs with a complete cost breakdown
    pub assessed: usize,
    /// VMs with a recorded sizing or pricing failure
    pub failed: usize,
    pub source_vcpus: u64,
    pub source_memory_gib: f64,
    pub total_ocpus: u64,
    pub total_storage_gib: u64,
    pub monthly_cost: Decimal,
    pub annual_cost: Decimal,
}

/// The immutable merge of all per-VM outputs plus run metadata
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssessmentResult {
    /// Upload filename the inventory came from
    pub source_name: String,
    pub shape_catalog_version: String,
    pub pricing_catalog_version: String,
    pub currency: String,
    pub generated_at: DateTime<Utc>,
    /// Per-VM assessments in original inventory row order
    pub vms: Vec<VmAssessment>,
    /// Row-level parse warnings, in encounter order
    pub warnings: Vec<String>,
    /// Per-VM sizing/pricing failures, in encounter order
    pub failures: Vec<AssessmentFailure>,
    pub totals: AssessmentTotals,
    /// OS family name -> VM count
    pub os_distribution: BTreeMap<String, usize>,
}

impl AssessmentResult {
    /// Merge per-VM outputs into one result and compute the aggregates.
    /// The generation timestamp is taken once, here.
    pub fn new(
        source_name: impl Into<String>,
        shape_catalog_version: impl Into<String>,
        pricing_catalog_version: impl Into<String>,
        currency: impl Into<String>,
        vms: Vec<VmAssessment>,
        warnings: Vec<String>,
        failures: Vec<AssessmentFailure>,
    ) -> Self {
        let mut os_distribution: BTreeMap<String, usize> = BTreeMap::new();
        for vm in &vms {
            *os_distribution
                .entry(vm.record.os_family.to_string())
                .or_insert(0) += 1;
        }

        let monthly_cost: Decimal = vms
            .iter()
            .filter_map(|v| v.cost.as_ref())
            .map(|c| c.monthly_total)
            .sum();

        let totals = AssessmentTotals {
            vm_count: vms.len(),
            powered_on: vms.iter().filter(|v| v.record.power_state.is_on()).count(),
            powered_off: vms.iter().filter(|v| !v.record.power_state.is_on()).count(),
            assessed: vms.iter().filter(|v| v.is_assessed()).count(),
            failed: failures.len(),
            source_vcpus: vms.iter().map(|v| v.record.vcpus as u64).sum(),
            source_memory_gib: vms.iter().map(|v| v.record.memory_gib()).sum(),
            total_ocpus: vms
                .iter()
                .filter_map(|v| v.sizing.as_ref())
                .map(|s| s.ocpus as u64)
                .sum(),
            total_storage_gib: vms
                .iter()
                .filter_map(|v| v.sizing.as_ref())
                .map(|s| s.total_storage_gib())
                .sum(),
            monthly_cost,
            annual_cost: monthly_cost * Decimal::from(12u32),
        };

        Self {
            source_name: source_name.into(),
            shape_catalog_version: shape_catalog_version.into(),
            pricing_catalog_version: pricing_catalog_version.into(),
            currency: currency.into(),
            generated_at: Utc::now(),
            vms,
            warnings,
            failures,
            totals,
            os_distribution,
        }
    }

    /// Recorded failure reason for a VM, if any. For invalid records the
    /// record's own reason takes precedence.
    pub fn failure_reason<'a>(&'a self, vm: &'a VmAssessment) -> Option<&'a str> {
        vm.record.invalid_reason.as_deref().or_else(|| {
            self.failures
                .iter()
                .find(|f| f.vm_id == vm.record.id)
                .map(|f| f.reason.as_str())
        })
    }

    /// Condensed view for the status/summary interface
    pub fn summary(&self) -> AssessmentSummary {
        AssessmentSummary {
            source_name: self.source_name.clone(),
            generated_at: self.generated_at,
            currency: self.currency.clone(),
            vm_count: self.totals.vm_count,
            powered_on: self.totals.powered_on,
            powered_off: self.totals.powered_off,
            assessed: self.totals.assessed,
            failed: self.totals.failed,
            total_ocpus: self.totals.total_ocpus,
            total_storage_gib: self.totals.total_storage_gib,
            monthly_cost: self.totals.monthly_cost,
            annual_cost: self.totals.annual_cost,
            warning_count: self.warnings.len(),
        }
    }
}

/// Caller-facing summary derived from a completed result
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssessmentSummary {
    pub source_name: String,
    pub generated_at: DateTime<Utc>,
    pub currency: String,
    pub vm_count: usize,
    pub powered_on: usize,
    pub powered_off: usize,
    pub assessed: usize,
    pub failed: usize,
    pub total_ocpus: u64,
    pub total_storage_gib: u64,
    pub monthly_cost: Decimal,
    pub annual_cost: Decimal,
    pub warning_count: usize,
}

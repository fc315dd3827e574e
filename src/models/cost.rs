//! Cost breakdown types
//!
//! All monetary amounts are fixed-point decimals. Intermediate values keep
//! full precision; rounding to currency-minor-unit precision happens only
//! when a report renders the number.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Cost line component
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CostComponent {
    Compute,
    Memory,
    Storage,
    License,
}

impl std::fmt::Display for CostComponent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CostComponent::Compute => write!(f, "Compute"),
            CostComponent::Memory => write!(f, "Memory"),
            CostComponent::Storage => write!(f, "Storage"),
            CostComponent::License => write!(f, "OS License"),
        }
    }
}

/// One line item of a VM's monthly cost
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CostLine {
    pub component: CostComponent,
    pub description: String,
    pub quantity: Decimal,
    /// Unit the quantity and unit price are expressed in, e.g. "OCPU-hour"
    pub unit: String,
    pub unit_price: Decimal,
    pub monthly_cost: Decimal,
    /// Attached when the line needs explanation, e.g. memory bundled into
    /// the OCPU rate
    pub note: Option<String>,
}

/// Monthly cost of one VM. The total is computed from the lines at
/// construction and never drifts from their sum.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CostBreakdown {
    pub vm_id: String,
    pub currency: String,
    pub lines: Vec<CostLine>,
    pub monthly_total: Decimal,
    /// Breakdown-level notes, e.g. a powered-off VM excluded from cost
    pub notes: Vec<String>,
}

impl CostBreakdown {
    /// Build a breakdown whose total is the exact sum of its line items
    pub fn new(
        vm_id: impl Into<String>,
        currency: impl Into<String>,
        lines: Vec<CostLine>,
        notes: Vec<String>,
    ) -> Self {
        let monthly_total = lines.iter().map(|l| l.monthly_cost).sum();
        Self {
            vm_id: vm_id.into(),
            currency: currency.into(),
            lines,
            monthly_total,
            notes,
        }
    }

    /// Zero-cost breakdown for a VM excluded from pricing (powered off or
    /// suspended)
    pub fn zeroed(vm_id: impl Into<String>, currency: impl Into<String>, note: String) -> Self {
        Self::new(vm_id, currency, Vec::new(), vec![note])
    }

    pub fn annual_total(&self) -> Decimal {
        self.monthly_total * Decimal::from(12u32)
    }
}

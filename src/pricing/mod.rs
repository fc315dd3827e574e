//! Pricing engine
//!
//! Turns a sizing recommendation into a monthly cost breakdown using
//! the pricing catalog. Line items follow the rate card's convention:
//! `unit_price` is the monthly price per unit and `monthly_cost` is
//! exactly `quantity * unit_price`, so the breakdown total is the exact
//! sum of its lines. All arithmetic is `Decimal`; rounding happens in
//! the renderers only.

pub mod currency;

use std::sync::Arc;

use rust_decimal::Decimal;

use crate::catalog::{LicenseRate, PricingCatalog};
use crate::error::PricingError;
use crate::models::{CostBreakdown, CostComponent, CostLine, SizingRecommendation, VMRecord};

#[derive(Debug, Clone)]
pub struct PricingEngine {
    catalog: Arc<PricingCatalog>,
}

impl PricingEngine {
    pub fn new(catalog: Arc<PricingCatalog>) -> Self {
        Self { catalog }
    }

    pub fn currency(&self) -> &str {
        &self.catalog.currency
    }

    /// Price one sized VM
    pub fn price(
        &self,
        record: &VMRecord,
        sizing: &SizingRecommendation,
    ) -> Result<CostBreakdown, PricingError> {
        // Dormant VMs stay in the report at zero cost
        if !record.power_state.is_on() {
            return Ok(CostBreakdown::zeroed(
                record.id.clone(),
                self.catalog.currency.clone(),
                format!(
                    "VM is {}; excluded from monthly cost",
                    record.power_state
                ),
            ));
        }

        let hours = self.catalog.monthly_hours();
        let rate = self
            .catalog
            .compute_rate(&sizing.shape)
            .ok_or_else(|| PricingError::MissingShapeRate(sizing.shape.clone()))?;

        let mut lines = Vec::new();

        let ocpu_monthly = rate.ocpu_hourly * hours;
        let ocpu_quantity = Decimal::from(sizing.ocpus);
        lines.push(CostLine {
            component: CostComponent::Compute,
            description: format!(
                "{} OCPU for {} vCPU on {}",
                sizing.ocpus, record.vcpus, sizing.shape
            ),
            quantity: ocpu_quantity,
            unit: String::from("OCPU"),
            unit_price: ocpu_monthly,
            monthly_cost: ocpu_quantity * ocpu_monthly,
            note: None,
        });

        let memory_quantity = Decimal::from(sizing.memory_gib);
        match rate.memory_gib_hourly {
            Some(memory_hourly) => {
                let memory_monthly = memory_hourly * hours;
                lines.push(CostLine {
                    component: CostComponent::Memory,
                    description: format!("Memory ({} GiB)", sizing.memory_gib),
                    quantity: memory_quantity,
                    unit: String::from("GiB"),
                    unit_price: memory_monthly,
                    monthly_cost: memory_quantity * memory_monthly,
                    note: None,
                });
            }
            None => {
                lines.push(CostLine {
                    component: CostComponent::Memory,
                    description: format!("Memory ({} GiB)", sizing.memory_gib),
                    quantity: memory_quantity,
                    unit: String::from("GiB"),
                    unit_price: Decimal::ZERO,
                    monthly_cost: Decimal::ZERO,
                    note: Some(String::from("bundled into the OCPU rate")),
                });
            }
        }

        for volume in &sizing.volumes {
            let tier_monthly = self
                .catalog
                .storage_rate(volume.tier)
                .ok_or_else(|| PricingError::MissingStorageRate(volume.tier.to_string()))?;
            let volume_quantity = Decimal::from(volume.size_gib);
            lines.push(CostLine {
                component: CostComponent::Storage,
                description: format!(
                    "Block volume '{}' ({} GiB, {})",
                    volume.label, volume.size_gib, volume.tier
                ),
                quantity: volume_quantity,
                unit: String::from("GiB"),
                unit_price: tier_monthly,
                monthly_cost: volume_quantity * tier_monthly,
                note: None,
            });
        }

        if let Some(class) = record.license_class() {
            let license = self
                .catalog
                .license_rate(class)
                .ok_or_else(|| PricingError::MissingLicenseRate(class.to_string()))?;
            let display = display_license_class(class);
            match license {
                LicenseRate::PerOcpuHourly(hourly) => {
                    let license_monthly = *hourly * hours;
                    lines.push(CostLine {
                        component: CostComponent::License,
                        description: format!("{} license ({} OCPU)", display, sizing.ocpus),
                        quantity: ocpu_quantity,
                        unit: String::from("OCPU"),
                        unit_price: license_monthly,
                        monthly_cost: ocpu_quantity * license_monthly,
                        note: None,
                    });
                }
                LicenseRate::FlatMonthly(fee) => {
                    lines.push(CostLine {
                        component: CostComponent::License,
                        description: format!("{display} license (flat fee)"),
                        quantity: Decimal::ONE,
                        unit: String::from("month"),
                        unit_price: *fee,
                        monthly_cost: *fee,
                        note: None,
                    });
                }
            }
        }

        Ok(CostBreakdown::new(
            record.id.clone(),
            self.catalog.currency.clone(),
            lines,
            Vec::new(),
        ))
    }
}

/// "windows_server" -> "Windows Server"
fn display_license_class(class: &str) -> String {
    class
        .split('_')
        .filter(|part| !part.is_empty())
        .map(|part| {
            let mut chars = part.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

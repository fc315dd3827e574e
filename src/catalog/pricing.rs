//! Pricing catalog
//!
//! Rate card for the target cloud: per-shape compute rates, per-tier
//! block-volume rates and the license table, all in one currency.
//! Compute and per-OCPU license rates are hourly; storage rates and
//! flat license fees are monthly. The pricing engine converts hourly
//! rates to monthly unit prices with `hours_per_month`.

use std::collections::BTreeMap;
use std::path::Path;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::models::VolumeTier;

/// Hourly compute rates for one shape
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComputeRate {
    pub ocpu_hourly: Decimal,
    /// Absent when the shape bundles memory into the OCPU rate
    #[serde(default)]
    pub memory_gib_hourly: Option<Decimal>,
}

/// License pricing model for one license class
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LicenseRate {
    /// Hourly uplift per allocated OCPU
    PerOcpuHourly(Decimal),
    /// Flat monthly fee per VM
    FlatMonthly(Decimal),
}

/// Full rate card
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PricingCatalog {
    pub version: String,
    /// ISO 4217 currency code all rates are denominated in
    pub currency: String,
    /// Billing hours per month (744 = 31 days, the list-price convention)
    pub hours_per_month: u32,
    /// Shape name -> compute rates
    pub compute: BTreeMap<String, ComputeRate>,
    /// Volume tier -> GiB-month rate
    pub storage: BTreeMap<VolumeTier, Decimal>,
    /// License class -> license pricing model
    #[serde(default)]
    pub licenses: BTreeMap<String, LicenseRate>,
}

impl Default for PricingCatalog {
    fn default() -> Self {
        let mut compute = BTreeMap::new();
        compute.insert(
            String::from("VM.Standard.E4.Flex"),
            ComputeRate {
                ocpu_hourly: Decimal::new(279, 4),             // 0.0279
                memory_gib_hourly: Some(Decimal::new(186, 5)), // 0.00186
            },
        );
        let mut storage = BTreeMap::new();
        // Base GiB rate plus 10 or 20 performance units at 0.001581
        storage.insert(VolumeTier::Balanced, Decimal::new(39525, 6)); // 0.039525
        storage.insert(VolumeTier::HigherPerformance, Decimal::new(55335, 6)); // 0.055335
        let mut licenses = BTreeMap::new();
        licenses.insert(
            String::from("windows_server"),
            LicenseRate::PerOcpuHourly(Decimal::new(8556, 5)), // 0.08556
        );
        Self {
            version: String::from("built-in"),
            currency: String::from("EUR"),
            hours_per_month: 744,
            compute,
            storage,
            licenses,
        }
    }
}

impl PricingCatalog {
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

    pub fn compute_rate(&self, shape: &str) -> Option<&ComputeRate> {
        self.compute.get(shape)
    }

    pub fn storage_rate(&self, tier: VolumeTier) -> Option<Decimal> {
        self.storage.get(&tier).copied()
    }

    pub fn license_rate(&self, license_class: &str) -> Option<&LicenseRate> {
        self.licenses.get(license_class)
    }

    pub fn monthly_hours(&self) -> Decimal {
        Decimal::from(self.hours_per_month)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.version.trim().is_empty() {
            return Err(ConfigError::invalid("pricing catalog", "version must not be empty"));
        }
        if self.currency.len() != 3 || !self.currency.chars().all(|c| c.is_ascii_uppercase()) {
            return Err(ConfigError::invalid(
                "pricing catalog",
                format!("currency '{}' is not a three-letter code", self.currency),
            ));
        }
        if self.hours_per_month == 0 || self.hours_per_month > 744 {
            return Err(ConfigError::invalid(
                "pricing catalog",
                format!("hours_per_month {} is outside 1..=744", self.hours_per_month),
            ));
        }
        if self.compute.is_empty() {
            return Err(ConfigError::invalid(
                "pricing catalog",
                "catalog must declare at least one compute rate",
            ));
        }
        for (shape, rate) in &self.compute {
            if rate.ocpu_hourly < Decimal::ZERO {
                return Err(ConfigError::invalid(
                    "pricing catalog",
                    format!("shape '{shape}' has a negative OCPU rate"),
                ));
            }
            if matches!(rate.memory_gib_hourly, Some(r) if r < Decimal::ZERO) {
                return Err(ConfigError::invalid(
                    "pricing catalog",
                    format!("shape '{shape}' has a negative memory rate"),
                ));
            }
        }
        for tier in [VolumeTier::Balanced, VolumeTier::HigherPerformance] {
            match self.storage.get(&tier) {
                None => {
                    return Err(ConfigError::invalid(
                        "pricing catalog",
                        format!("missing storage rate for tier '{tier}'"),
                    ));
                }
                Some(rate) if *rate < Decimal::ZERO => {
                    return Err(ConfigError::invalid(
                        "pricing catalog",
                        format!("tier '{tier}' has a negative storage rate"),
                    ));
                }
                Some(_) => {}
            }
        }
        for (class, rate) in &self.licenses {
            let value = match rate {
                LicenseRate::PerOcpuHourly(v) | LicenseRate::FlatMonthly(v) => *v,
            };
            if value < Decimal::ZERO {
                return Err(ConfigError::invalid(
                    "pricing catalog",
                    format!("license class '{class}' has a negative rate"),
                ));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_catalog_validates() {
        let catalog = PricingCatalog::default();
        assert!(catalog.validate().is_ok());
        assert_eq!(catalog.currency, "EUR");
        assert_eq!(catalog.hours_per_month, 744);
        let rate = catalog.compute_rate("VM.Standard.E4.Flex").unwrap();
        assert_eq!(rate.ocpu_hourly, "0.0279".parse().unwrap());
        assert_eq!(rate.memory_gib_hourly, Some("0.00186".parse().unwrap()));
        assert_eq!(
            catalog.storage_rate(VolumeTier::Balanced),
            Some("0.039525".parse().unwrap())
        );
    }

    #[test]
    fn from_json_round_trip() {
        let json = r#"{
            "version": "test-1",
            "currency": "USD",
            "hours_per_month": 744,
            "compute": {
                "VM.Flex": {"ocpu_hourly": "0.05"}
            },
            "storage": {
                "balanced": "0.04",
                "higher_performance": "0.06"
            },
            "licenses": {
                "windows_server": {"per_ocpu_hourly": "0.09"},
                "rhel": {"flat_monthly": "42"}
            }
        }"#;
        let catalog = PricingCatalog::from_json(json).unwrap();
        assert_eq!(catalog.currency, "USD");
        let rate = catalog.compute_rate("VM.Flex").unwrap();
        assert_eq!(rate.memory_gib_hourly, None);
        assert_eq!(
            catalog.license_rate("rhel"),
            Some(&LicenseRate::FlatMonthly(Decimal::from(42)))
        );
    }

    #[test]
    fn rejects_missing_storage_tier() {
        let mut catalog = PricingCatalog::default();
        catalog.storage.remove(&VolumeTier::HigherPerformance);
        assert!(catalog.validate().is_err());
    }

    #[test]
    fn rejects_lowercase_currency() {
        let mut catalog = PricingCatalog::default();
        catalog.currency = String::from("eur");
        assert!(catalog.validate().is_err());
    }

    #[test]
    fn rejects_negative_rate() {
        let mut catalog = PricingCatalog::default();
        catalog
            .storage
            .insert(VolumeTier::Balanced, Decimal::new(-1, 2));
        assert!(catalog.validate().is_err());
    }
}

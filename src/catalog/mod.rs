//! Shape and pricing catalogs
//!
//! Both catalogs validate themselves on load; `validate_catalogs`
//! additionally cross-checks that every shape and license class the
//! shape catalog mentions carries a rate, so a missing rate surfaces
//! at construction instead of as per-VM pricing failures.

pub mod pricing;
pub mod shapes;

pub use pricing::{ComputeRate, LicenseRate, PricingCatalog};
pub use shapes::{ComputeShape, ShapeCatalog};

use crate::error::ConfigError;

/// Cross-check a shape catalog against a pricing catalog
pub fn validate_catalogs(
    shapes: &ShapeCatalog,
    pricing: &PricingCatalog,
) -> Result<(), ConfigError> {
    for shape in &shapes.shapes {
        if pricing.compute_rate(&shape.name).is_none() {
            return Err(ConfigError::invalid(
                "pricing catalog",
                format!("no compute rate for shape '{}'", shape.name),
            ));
        }
    }
    for class in shapes.license_min_ocpus.keys() {
        if pricing.license_rate(class).is_none() {
            return Err(ConfigError::invalid(
                "pricing catalog",
                format!("no license rate for class '{class}'"),
            ));
        }
    }
    Ok(())
}

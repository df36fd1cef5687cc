//! Usage accounting and provider cost models.
//!
//! Providers report the units they consumed (tokens, API credits, result
//! pages) as [`Usage`]. A [`CostModel`] turns units into a currency amount.
//!
//! # Examples
//!
//! ```
//! use switchyard::usage::{CostModel, Usage};
//!
//! let usage = Usage::new(1_500);
//! let model = CostModel::new(0.001, 0.002); // $0.001/request, $0.002/1k units
//! let cost = model.cost_for(usage.units);
//! assert!((cost - 0.004).abs() < 1e-9);
//! ```

use serde::{Deserialize, Serialize};

/// Units consumed by one provider invocation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Usage {
    /// Billable units (tokens, credits, pages; the adapter decides).
    pub units: u64,
}

impl Usage {
    /// Create a usage record.
    pub fn new(units: u64) -> Self {
        Self { units }
    }

    /// Accumulate units from another usage record.
    pub fn add(&mut self, other: &Usage) {
        self.units = self.units.saturating_add(other.units);
    }
}

/// Pricing for a provider.
///
/// Cost of one request consuming `units`:
///
/// ```text
/// per_request + units * per_1k_units / 1000
/// ```
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct CostModel {
    /// Flat fee charged for every request.
    pub per_request: f64,
    /// Price per 1000 units.
    pub per_1k_units: f64,
}

impl CostModel {
    /// Create a cost model.
    pub fn new(per_request: f64, per_1k_units: f64) -> Self {
        Self {
            per_request,
            per_1k_units,
        }
    }

    /// A model that charges nothing.
    pub fn free() -> Self {
        Self::default()
    }

    /// Cost of a single request consuming `units`.
    pub fn cost_for(&self, units: u64) -> f64 {
        // Multiply before dividing to preserve floating-point precision
        self.per_request + (units as f64 * self.per_1k_units) / 1_000.0
    }

    /// Whether both rates are finite and non-negative.
    pub fn is_valid(&self) -> bool {
        self.per_request.is_finite()
            && self.per_1k_units.is_finite()
            && self.per_request >= 0.0
            && self.per_1k_units >= 0.0
    }
}

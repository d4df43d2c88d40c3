// src/reshape/mod.rs
pub mod drilldown;
pub mod pivot;

pub use drilldown::{rank_rows, ReferencePeriod};
pub use pivot::{PivotMatrix, PivotRow};

use tracing::debug;

use crate::types::{DateRange, FlowType, Observation, Unit};

/// Barrels per cubic metre.
pub const BARREL_CONVERSION: f64 = 6.29287;

/// Per-render reshaping parameters.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ReshapeOptions {
    pub range: DateRange,
    pub unit: Unit,
    pub barrel_conversion: f64,
    /// Whether level rows are converted along with flows
    pub convert_levels: bool,
}

impl ReshapeOptions {
    pub fn new(range: DateRange, unit: Unit) -> Self {
        Self {
            range,
            unit,
            barrel_conversion: BARREL_CONVERSION,
            convert_levels: true,
        }
    }

    /// Daily-rate, unit-converted value of one observation. Flows are divided
    /// by their month's length first, then the unit factor is applied once.
    pub fn normalize(&self, obs: &Observation) -> Option<f64> {
        let month = obs.date?;
        let value = obs.value?;
        let daily = match obs.kind {
            FlowType::Flow => value / month.days() as f64,
            FlowType::Level => value,
        };
        let converts = obs.kind == FlowType::Flow || self.convert_levels;
        let factor = if converts {
            self.unit.factor(self.barrel_conversion)
        } else {
            1.0
        };
        Some(daily * factor)
    }
}

/// Filter, normalise, convert and pivot one render's worth of observations.
/// Months present in range become columns even when every value in them is
/// null; a null value never creates a cell, and is recorded so averages can
/// leave it out of their denominator.
pub fn reshape(observations: &[Observation], opts: &ReshapeOptions) -> PivotMatrix {
    let mut matrix = PivotMatrix::new();
    let mut kept = 0usize;
    for obs in observations {
        let Some(month) = obs.date else { continue };
        if !opts.range.contains(month) {
            continue;
        }
        kept += 1;
        matrix.add_month(month);
        match opts.normalize(obs) {
            Some(value) => matrix.add(&obs.label, month, value),
            None => matrix.add_null(&obs.label, month),
        }
    }
    debug!(
        kept,
        rows = matrix.rows().len(),
        months = matrix.month_count(),
        unit = ?opts.unit,
        "reshaped"
    );
    matrix
}

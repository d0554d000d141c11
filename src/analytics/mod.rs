//! Financial metric engine
//!
//! Pure functions computing leverage, profitability and distress metrics
//! from a record's reported figures. No I/O and no shared state.

mod metrics;
mod risk;

pub use metrics::{compute_metrics, FinancialMetrics, MetricInputs};
pub use risk::{compute_risk_score, risk_score_from_metrics};

use crate::models::{DerivedFields, FinancialRecord};

/// Compute every derived field for a stored record
pub fn derive_fields(record: &FinancialRecord) -> DerivedFields {
    let inputs = MetricInputs::from(record);
    let metrics = compute_metrics(&inputs);

    DerivedFields {
        debt_to_equity_ratio: Some(metrics.debt_to_equity_ratio),
        operating_margin: Some(metrics.operating_margin),
        return_on_equity: Some(metrics.return_on_equity),
        z_score: Some(metrics.z_score),
        risk_score: Some(risk_score_from_metrics(&metrics)),
    }
}

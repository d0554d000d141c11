//! Bounded risk score

use super::metrics::{compute_metrics, FinancialMetrics, MetricInputs};

const BASE_SCORE: i64 = 100;

/// Risk score in `[0, 100]` for a record's reported figures
pub fn compute_risk_score(inputs: &MetricInputs) -> i64 {
    risk_score_from_metrics(&compute_metrics(inputs))
}

/// Apply the penalty ladders to already computed metrics.
///
/// Each factor contributes at most one penalty. Comparisons against a NaN
/// Z-score are false, so an undefined score adds no distress penalty.
pub fn risk_score_from_metrics(metrics: &FinancialMetrics) -> i64 {
    let mut score = BASE_SCORE;

    if metrics.debt_to_equity_ratio > 1.5 {
        score -= 20;
    } else if metrics.debt_to_equity_ratio > 1.0 {
        score -= 10;
    }

    if metrics.operating_margin < 10.0 {
        score -= 15;
    } else if metrics.operating_margin < 20.0 {
        score -= 5;
    }

    if metrics.z_score < 1.8 {
        score -= 30;
    } else if metrics.z_score < 2.5 {
        score -= 10;
    }

    score.clamp(0, 100)
}

//! Ratio and Altman Z-score computation

use crate::models::{FinancialRecord, FinancialRecordInput};
use serde::{Deserialize, Serialize};

/// Reported figures the metric engine reads
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MetricInputs {
    pub total_assets: f64,
    pub total_liabilities: f64,
    pub revenue: f64,
    pub net_profit: f64,
}

impl From<&FinancialRecord> for MetricInputs {
    fn from(record: &FinancialRecord) -> Self {
        Self {
            total_assets: record.total_assets,
            total_liabilities: record.total_liabilities,
            revenue: record.revenue,
            net_profit: record.net_profit,
        }
    }
}

impl From<&FinancialRecordInput> for MetricInputs {
    fn from(record: &FinancialRecordInput) -> Self {
        Self {
            total_assets: record.total_assets,
            total_liabilities: record.total_liabilities,
            revenue: record.revenue,
            net_profit: record.net_profit,
        }
    }
}

/// Derived financial metrics
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FinancialMetrics {
    pub debt_to_equity_ratio: f64,
    /// Percent
    pub operating_margin: f64,
    /// Percent
    pub return_on_equity: f64,
    /// Not guarded: non-finite when assets or liabilities are zero
    pub z_score: f64,
}

/// Compute leverage, margin, return and Z-score metrics.
///
/// A zero equity reports zero leverage and zero return, and a zero revenue
/// reports a zero margin. The Z-score has no guard and comes back as
/// infinity or NaN when total assets or total liabilities are zero;
/// callers must check `is_finite()`.
pub fn compute_metrics(inputs: &MetricInputs) -> FinancialMetrics {
    let MetricInputs {
        total_assets,
        total_liabilities,
        revenue,
        net_profit,
    } = *inputs;

    let equity = total_assets - total_liabilities;

    let debt_to_equity_ratio = if equity != 0.0 {
        total_liabilities / equity
    } else {
        0.0
    };

    let operating_margin = if revenue != 0.0 {
        (net_profit / revenue) * 100.0
    } else {
        0.0
    };

    let return_on_equity = if equity != 0.0 {
        (net_profit / equity) * 100.0
    } else {
        0.0
    };

    // Altman Z-score
    let z_score = 3.3 * (net_profit / total_assets)
        + 0.6 * (equity / total_liabilities)
        + 1.0 * (revenue / total_assets);

    FinancialMetrics {
        debt_to_equity_ratio,
        operating_margin,
        return_on_equity,
        z_score,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn inputs(assets: f64, liabilities: f64, revenue: f64, profit: f64) -> MetricInputs {
        MetricInputs {
            total_assets: assets,
            total_liabilities: liabilities,
            revenue,
            net_profit: profit,
        }
    }

    #[test]
    fn test_reference_record() {
        let m = compute_metrics(&inputs(5_000_000.0, 2_000_000.0, 1_500_000.0, 300_000.0));

        assert!((m.debt_to_equity_ratio - 2.0 / 3.0).abs() < 1e-9);
        assert!((m.operating_margin - 20.0).abs() < 1e-9);
        assert!((m.return_on_equity - 10.0).abs() < 1e-9);
        assert!((m.z_score - 1.398).abs() < 1e-9);
    }

    #[test]
    fn test_zero_equity_guards() {
        for value in [0.0, 1.0, 250_000.0, 9_999_999.0] {
            let m = compute_metrics(&inputs(value, value, 100.0, 10.0));
            assert_eq!(m.debt_to_equity_ratio, 0.0);
            assert_eq!(m.return_on_equity, 0.0);
        }
    }

    #[test]
    fn test_zero_revenue_guard() {
        let m = compute_metrics(&inputs(1_000.0, 400.0, 0.0, -50.0));
        assert_eq!(m.operating_margin, 0.0);
    }

    #[test]
    fn test_zero_liabilities_z_score_is_non_finite() {
        let m = compute_metrics(&inputs(1_000.0, 0.0, 500.0, 100.0));
        assert!(!m.z_score.is_finite());
        assert_eq!(m.debt_to_equity_ratio, 0.0);
    }

    #[test]
    fn test_zero_assets_z_score_is_non_finite() {
        let m = compute_metrics(&inputs(0.0, 100.0, 500.0, 100.0));
        assert!(!m.z_score.is_finite());
    }

    #[test]
    fn test_negative_equity() {
        let m = compute_metrics(&inputs(1_000.0, 1_500.0, 800.0, -100.0));
        assert!((m.debt_to_equity_ratio - (-3.0)).abs() < 1e-9);
        assert!((m.return_on_equity - 20.0).abs() < 1e-9);
    }
}

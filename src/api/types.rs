//! REST API request types
//!
//! Query values arrive as strings; blank values are treated as absent.

use crate::error::{AppError, Result};
use crate::models::RecordFilter;
use serde::Deserialize;

/// Query string of `GET /api/getRiskAssessment`
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RiskAssessmentQuery {
    pub company_id: Option<String>,
    pub reporting_period: Option<String>,
    pub industry_sector: Option<String>,
    pub page: Option<String>,
    pub limit: Option<String>,
}

impl RiskAssessmentQuery {
    pub fn filter(&self) -> RecordFilter {
        RecordFilter::new(
            self.company_id.clone(),
            self.reporting_period.clone(),
            self.industry_sector.clone(),
        )
    }

    /// Requested page, 1 when absent
    pub fn page(&self) -> Result<u32> {
        Ok(parse_positive("page", self.page.as_deref())?.unwrap_or(1))
    }

    /// Requested page size, if any
    pub fn limit(&self) -> Result<Option<u32>> {
        parse_positive("limit", self.limit.as_deref())
    }
}

/// Query string of `GET /api/queue/exhausted`
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ExhaustedJobsQuery {
    pub limit: Option<String>,
}

impl ExhaustedJobsQuery {
    pub const DEFAULT_LIMIT: u32 = 50;
    pub const MAX_LIMIT: u32 = 500;

    pub fn limit(&self) -> Result<u32> {
        let limit = parse_positive("limit", self.limit.as_deref())?.unwrap_or(Self::DEFAULT_LIMIT);
        Ok(limit.min(Self::MAX_LIMIT))
    }
}

fn parse_positive(name: &str, raw: Option<&str>) -> Result<Option<u32>> {
    let Some(raw) = raw.map(str::trim).filter(|s| !s.is_empty()) else {
        return Ok(None);
    };

    match raw.parse::<u32>() {
        Ok(value) if value > 0 => Ok(Some(value)),
        _ => Err(AppError::Validation(format!(
            "{} must be a positive integer",
            name
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let query = RiskAssessmentQuery::default();
        assert_eq!(query.page().unwrap(), 1);
        assert_eq!(query.limit().unwrap(), None);
        assert_eq!(query.filter(), RecordFilter::default());
    }

    #[test]
    fn test_parses_values() {
        let query = RiskAssessmentQuery {
            company_id: Some("C1001".into()),
            industry_sector: Some("".into()),
            page: Some("3".into()),
            limit: Some(" 25 ".into()),
            ..RiskAssessmentQuery::default()
        };
        assert_eq!(query.page().unwrap(), 3);
        assert_eq!(query.limit().unwrap(), Some(25));
        assert_eq!(query.filter().company_id.as_deref(), Some("C1001"));
        assert_eq!(query.filter().industry_sector, None);
    }

    #[test]
    fn test_rejects_bad_numbers() {
        for bad in ["0", "-1", "abc", "1.5"] {
            let query = RiskAssessmentQuery {
                page: Some(bad.into()),
                ..RiskAssessmentQuery::default()
            };
            assert!(matches!(query.page(), Err(AppError::Validation(_))), "{}", bad);
        }
    }

    #[test]
    fn test_exhausted_limit_is_capped() {
        let query = ExhaustedJobsQuery {
            limit: Some("10000".into()),
        };
        assert_eq!(query.limit().unwrap(), 500);
        assert_eq!(ExhaustedJobsQuery::default().limit().unwrap(), 50);
    }
}

//! Deterministic cache keys for risk assessment queries

use crate::models::RecordFilter;
use serde_json::json;
use sha2::{Digest, Sha256};

const KEY_PREFIX: &str = "riskAssessment";

/// Cache key for a filtered page.
///
/// Filter fields are serialized in sorted order and blank filters are
/// dropped, so equivalent queries always share a key.
pub fn fingerprint(filter: &RecordFilter, page: u32, page_size: u32) -> String {
    let canonical = json!({
        "filter": filter.fields(),
        "page": page,
        "limit": page_size,
    });

    let digest = Sha256::digest(canonical.to_string().as_bytes());
    format!("{}:{}", KEY_PREFIX, hex::encode(digest))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_equivalent_filters_share_a_key() {
        let a = RecordFilter::new(Some("C1".into()), None, Some("Technology".into()));
        let b = RecordFilter {
            industry_sector: Some("Technology".into()),
            company_id: Some("C1".into()),
            reporting_period: None,
        };
        let c = RecordFilter::new(Some("C1".into()), Some("  ".into()), Some("Technology".into()));

        assert_eq!(fingerprint(&a, 1, 10), fingerprint(&b, 1, 10));
        assert_eq!(fingerprint(&a, 1, 10), fingerprint(&c, 1, 10));
    }

    #[test]
    fn test_pagination_changes_the_key() {
        let filter = RecordFilter::default();
        assert_ne!(fingerprint(&filter, 1, 10), fingerprint(&filter, 2, 10));
        assert_ne!(fingerprint(&filter, 1, 10), fingerprint(&filter, 1, 20));
    }

    #[test]
    fn test_distinct_filters_differ() {
        let a = RecordFilter::new(Some("C1".into()), None, None);
        let b = RecordFilter::new(None, None, Some("C1".into()));
        assert_ne!(fingerprint(&a, 1, 10), fingerprint(&b, 1, 10));
    }

    #[test]
    fn test_key_shape() {
        let key = fingerprint(&RecordFilter::default(), 1, 10);
        assert!(key.starts_with("riskAssessment:"));
        assert_eq!(key.len(), "riskAssessment:".len() + 64);
    }
}

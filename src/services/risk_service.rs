//! Risk Assessment Service
//!
//! Read-through cached, paginated risk assessments. On a cache miss the
//! matching page is read from the store, every record is run through the
//! metric engine, and the assembled page is cached for the configured TTL.

use crate::analytics::derive_fields;
use crate::cache::{fingerprint, ResponseCache};
use crate::config::RiskConfig;
use crate::error::{AppError, Result};
use crate::models::{DerivedFields, FinancialRecord, RecordFilter};
use crate::store::RecordStore;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// One record as served to clients, with freshly computed metrics
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssessedRecord {
    pub id: i64,
    pub company_id: String,
    pub company_name: String,
    pub reporting_period: String,
    pub industry_sector: String,
    pub total_assets: f64,
    pub total_liabilities: f64,
    pub revenue: f64,
    pub net_profit: f64,
    pub cash_flow: f64,
    pub interest_coverage_ratio: f64,
    pub debt_to_equity_ratio: Option<f64>,
    pub operating_margin: Option<f64>,
    pub return_on_equity: Option<f64>,
    pub z_score: Option<f64>,
    pub risk_score: Option<i64>,
    pub created_at: String,
    pub updated_at: String,
}

impl AssessedRecord {
    /// Build the output view of `record` carrying `derived` metrics.
    ///
    /// `None` leaves every derived field null. Non-finite values are
    /// nulled as well, since JSON has no representation for them.
    pub fn build(record: &FinancialRecord, derived: Option<&DerivedFields>) -> Self {
        let derived = derived.copied().unwrap_or_default();
        let finite = |v: Option<f64>| v.filter(|v| v.is_finite());

        Self {
            id: record.id,
            company_id: record.company_id.clone(),
            company_name: record.company_name.clone(),
            reporting_period: record.reporting_period.clone(),
            industry_sector: record.industry_sector.clone(),
            total_assets: record.total_assets,
            total_liabilities: record.total_liabilities,
            revenue: record.revenue,
            net_profit: record.net_profit,
            cash_flow: record.cash_flow,
            interest_coverage_ratio: record.interest_coverage_ratio,
            debt_to_equity_ratio: finite(derived.debt_to_equity_ratio),
            operating_margin: finite(derived.operating_margin),
            return_on_equity: finite(derived.return_on_equity),
            z_score: finite(derived.z_score),
            risk_score: derived.risk_score,
            created_at: record.created_at.clone(),
            updated_at: record.updated_at.clone(),
        }
    }
}

/// A page of assessed records
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RiskAssessmentPage {
    pub current_page: u32,
    pub total_pages: u64,
    pub total_records: u64,
    pub data: Vec<AssessedRecord>,
}

/// Serialized page plus where it came from
#[derive(Debug, Clone)]
pub struct RiskAssessmentBody {
    pub json: String,
    pub from_cache: bool,
}

/// Risk assessment service
pub struct RiskService {
    store: Arc<dyn RecordStore>,
    cache: Arc<ResponseCache>,
    config: RiskConfig,
}

impl RiskService {
    pub fn new(store: Arc<dyn RecordStore>, cache: Arc<ResponseCache>, config: RiskConfig) -> Self {
        Self {
            store,
            cache,
            config,
        }
    }

    /// Clamp the requested page size, falling back to the default
    pub fn page_size(&self, requested: Option<u32>) -> Result<u32> {
        match requested {
            None => Ok(self.config.default_page_size),
            Some(0) => Err(AppError::Validation("limit must be at least 1".to_string())),
            Some(limit) => Ok(limit.min(self.config.max_page_size)),
        }
    }

    /// Get one page of risk assessments as serialized JSON.
    ///
    /// A cache hit is returned byte for byte without touching the store.
    pub async fn get_risk_assessment(
        &self,
        filter: &RecordFilter,
        page: u32,
        page_size: u32,
    ) -> Result<RiskAssessmentBody> {
        if page == 0 {
            return Err(AppError::Validation("page must be at least 1".to_string()));
        }
        if page_size == 0 {
            return Err(AppError::Validation("limit must be at least 1".to_string()));
        }

        let key = fingerprint(filter, page, page_size);
        if let Some(json) = self.cache.lookup(&key).await {
            debug!(key = %key, "Serving risk assessment from cache");
            return Ok(RiskAssessmentBody {
                json,
                from_cache: true,
            });
        }

        let page = self.assess(filter, page, page_size).await?;
        let json = serde_json::to_string(&page)?;
        self.cache.store(&key, json.clone()).await;

        Ok(RiskAssessmentBody {
            json,
            from_cache: false,
        })
    }

    /// Read and assess a page straight from the store
    pub async fn assess(
        &self,
        filter: &RecordFilter,
        page: u32,
        page_size: u32,
    ) -> Result<RiskAssessmentPage> {
        let limit = u64::from(page_size.max(1));
        let offset = u64::from(page.saturating_sub(1)) * limit;

        let total_records = self.store.count(filter).await?;
        let total_pages = total_records.div_ceil(limit);
        let records = self.store.find(filter, offset, limit).await?;

        let mut data = Vec::with_capacity(records.len());
        for record in &records {
            data.push(self.assess_record(record).await);
        }

        info!(
            page,
            page_size,
            total_records,
            returned = data.len(),
            "Risk assessment computed"
        );

        Ok(RiskAssessmentPage {
            current_page: page,
            total_pages,
            total_records,
            data,
        })
    }

    async fn assess_record(&self, record: &FinancialRecord) -> AssessedRecord {
        if record.natural_key().is_none() {
            warn!(id = record.id, "Record is missing natural key fields, skipping metrics");
            return AssessedRecord::build(record, None);
        }

        let derived = derive_fields(record);
        if self.config.persist_derived {
            self.persist_derived(record, derived).await;
        }

        AssessedRecord::build(record, Some(&derived))
    }

    async fn persist_derived(&self, record: &FinancialRecord, derived: DerivedFields) {
        if let Err(e) = self.store.update_derived(record, &derived).await {
            warn!(
                company_id = %record.company_id,
                reporting_period = %record.reporting_period,
                error = %e,
                "Failed to persist derived metrics"
            );
        }
    }
}

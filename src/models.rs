//! Financial record domain types

use crate::error::{AppError, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// Natural key of a financial record
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct NaturalKey {
    pub company_id: String,
    pub reporting_period: String,
    pub industry_sector: String,
}

/// Derived fields, nullable until computed
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct DerivedFields {
    pub debt_to_equity_ratio: Option<f64>,
    pub operating_margin: Option<f64>,
    pub return_on_equity: Option<f64>,
    pub z_score: Option<f64>,
    pub risk_score: Option<i64>,
}

/// A record as submitted for ingestion, validated and ready to upsert
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FinancialRecordInput {
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
    #[serde(default)]
    pub debt_to_equity_ratio: Option<f64>,
    #[serde(default)]
    pub operating_margin: Option<f64>,
    #[serde(default)]
    pub return_on_equity: Option<f64>,
    #[serde(default)]
    pub z_score: Option<f64>,
    #[serde(default)]
    pub risk_score: Option<i64>,
}

impl FinancialRecordInput {
    /// Parse and validate one raw submission from an ingestion batch.
    ///
    /// Every required field must be present and non-null, strings must not be
    /// blank and numbers must be finite. Failures are `RecordPersist` errors
    /// since they only ever disqualify the one record.
    pub fn from_raw(raw: &Value) -> Result<Self> {
        if !raw.is_object() {
            return Err(AppError::RecordPersist(
                "record is not a JSON object".to_string(),
            ));
        }

        let input: FinancialRecordInput = serde_json::from_value(raw.clone())
            .map_err(|e| AppError::RecordPersist(format!("malformed record: {}", e)))?;
        input.validate()?;
        Ok(input)
    }

    fn validate(&self) -> Result<()> {
        let strings = [
            ("company_id", &self.company_id),
            ("company_name", &self.company_name),
            ("reporting_period", &self.reporting_period),
            ("industry_sector", &self.industry_sector),
        ];
        for (name, value) in strings {
            if value.trim().is_empty() {
                return Err(AppError::RecordPersist(format!("{} must not be blank", name)));
            }
        }

        let numbers = [
            ("total_assets", self.total_assets),
            ("total_liabilities", self.total_liabilities),
            ("revenue", self.revenue),
            ("net_profit", self.net_profit),
            ("cash_flow", self.cash_flow),
            ("interest_coverage_ratio", self.interest_coverage_ratio),
        ];
        for (name, value) in numbers {
            if !value.is_finite() {
                return Err(AppError::RecordPersist(format!("{} must be a finite number", name)));
            }
        }

        Ok(())
    }

    pub fn natural_key(&self) -> NaturalKey {
        NaturalKey {
            company_id: self.company_id.clone(),
            reporting_period: self.reporting_period.clone(),
            industry_sector: self.industry_sector.clone(),
        }
    }
}

/// A persisted financial record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FinancialRecord {
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

impl FinancialRecord {
    /// Natural key, or `None` when any key field is blank
    pub fn natural_key(&self) -> Option<NaturalKey> {
        let blank = self.company_id.trim().is_empty()
            || self.reporting_period.trim().is_empty()
            || self.industry_sector.trim().is_empty();
        if blank {
            return None;
        }
        Some(NaturalKey {
            company_id: self.company_id.clone(),
            reporting_period: self.reporting_period.clone(),
            industry_sector: self.industry_sector.clone(),
        })
    }
}

/// Optional equality filters for record queries
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordFilter {
    pub company_id: Option<String>,
    pub reporting_period: Option<String>,
    pub industry_sector: Option<String>,
}

impl RecordFilter {
    /// Blank values count as "not filtered"
    pub fn new(
        company_id: Option<String>,
        reporting_period: Option<String>,
        industry_sector: Option<String>,
    ) -> Self {
        let clean = |v: Option<String>| v.filter(|s| !s.trim().is_empty());
        Self {
            company_id: clean(company_id),
            reporting_period: clean(reporting_period),
            industry_sector: clean(industry_sector),
        }
    }

    /// Active filter fields keyed by column name, in sorted order
    pub fn fields(&self) -> BTreeMap<&'static str, &str> {
        let mut fields = BTreeMap::new();
        if let Some(v) = &self.company_id {
            fields.insert("company_id", v.as_str());
        }
        if let Some(v) = &self.reporting_period {
            fields.insert("reporting_period", v.as_str());
        }
        if let Some(v) = &self.industry_sector {
            fields.insert("industry_sector", v.as_str());
        }
        fields
    }
}

//! Financial record storage keyed by (company_id, reporting_period, industry_sector)

use crate::models::{DerivedFields, FinancialRecord, FinancialRecordInput, NaturalKey, RecordFilter};
use crate::store::UpsertOutcome;
use rusqlite::types::Value as SqlValue;
use rusqlite::{params, params_from_iter, Connection, OptionalExtension, Result, Row};

const RECORD_COLUMNS: &str = "id, company_id, company_name, reporting_period, industry_sector,
     total_assets, total_liabilities, revenue, net_profit, cash_flow, interest_coverage_ratio,
     debt_to_equity_ratio, operating_margin, return_on_equity, z_score, risk_score,
     created_at, updated_at";

/// Insert or overwrite the record sharing this natural key.
///
/// The conflict branch only fires when some column actually differs, so an
/// identical resubmission leaves the row untouched, `updated_at` included.
pub fn upsert_record(conn: &Connection, record: &FinancialRecordInput) -> Result<UpsertOutcome> {
    let existed: bool = conn.query_row(
        "SELECT EXISTS(SELECT 1 FROM financial_records
         WHERE company_id = ?1 AND reporting_period = ?2 AND industry_sector = ?3)",
        params![record.company_id, record.reporting_period, record.industry_sector],
        |row| row.get(0),
    )?;

    let changed = conn.execute(
        r#"
        INSERT INTO financial_records (
            company_id, company_name, reporting_period, industry_sector,
            total_assets, total_liabilities, revenue, net_profit, cash_flow,
            interest_coverage_ratio, debt_to_equity_ratio, operating_margin,
            return_on_equity, z_score, risk_score
        )
        VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15)
        ON CONFLICT(company_id, reporting_period, industry_sector) DO UPDATE SET
            company_name = excluded.company_name,
            total_assets = excluded.total_assets,
            total_liabilities = excluded.total_liabilities,
            revenue = excluded.revenue,
            net_profit = excluded.net_profit,
            cash_flow = excluded.cash_flow,
            interest_coverage_ratio = excluded.interest_coverage_ratio,
            debt_to_equity_ratio = excluded.debt_to_equity_ratio,
            operating_margin = excluded.operating_margin,
            return_on_equity = excluded.return_on_equity,
            z_score = excluded.z_score,
            risk_score = excluded.risk_score,
            updated_at = datetime('now')
        WHERE company_name IS NOT excluded.company_name
           OR total_assets IS NOT excluded.total_assets
           OR total_liabilities IS NOT excluded.total_liabilities
           OR revenue IS NOT excluded.revenue
           OR net_profit IS NOT excluded.net_profit
           OR cash_flow IS NOT excluded.cash_flow
           OR interest_coverage_ratio IS NOT excluded.interest_coverage_ratio
           OR debt_to_equity_ratio IS NOT excluded.debt_to_equity_ratio
           OR operating_margin IS NOT excluded.operating_margin
           OR return_on_equity IS NOT excluded.return_on_equity
           OR z_score IS NOT excluded.z_score
           OR risk_score IS NOT excluded.risk_score
        "#,
        params![
            record.company_id,
            record.company_name,
            record.reporting_period,
            record.industry_sector,
            record.total_assets,
            record.total_liabilities,
            record.revenue,
            record.net_profit,
            record.cash_flow,
            record.interest_coverage_ratio,
            finite(record.debt_to_equity_ratio),
            finite(record.operating_margin),
            finite(record.return_on_equity),
            finite(record.z_score),
            record.risk_score,
        ],
    )?;

    Ok(match (existed, changed) {
        (false, _) => UpsertOutcome::Inserted,
        (true, 0) => UpsertOutcome::Unchanged,
        (true, _) => UpsertOutcome::Updated,
    })
}

/// Write derived metrics onto a stored record.
///
/// Only the derived columns are touched, and only while the row still holds
/// the reported figures in `record`. Returns whether a row changed.
pub fn update_derived(
    conn: &Connection,
    record: &FinancialRecord,
    derived: &DerivedFields,
) -> Result<bool> {
    let changed = conn.execute(
        r#"
        UPDATE financial_records SET
            debt_to_equity_ratio = ?1,
            operating_margin = ?2,
            return_on_equity = ?3,
            z_score = ?4,
            risk_score = ?5,
            updated_at = datetime('now')
        WHERE company_id = ?6 AND reporting_period = ?7 AND industry_sector = ?8
          AND total_assets = ?9
          AND total_liabilities = ?10
          AND revenue = ?11
          AND net_profit = ?12
          AND cash_flow = ?13
          AND interest_coverage_ratio = ?14
          AND (debt_to_equity_ratio IS NOT ?1
            OR operating_margin IS NOT ?2
            OR return_on_equity IS NOT ?3
            OR z_score IS NOT ?4
            OR risk_score IS NOT ?5)
        "#,
        params![
            finite(derived.debt_to_equity_ratio),
            finite(derived.operating_margin),
            finite(derived.return_on_equity),
            finite(derived.z_score),
            derived.risk_score,
            record.company_id,
            record.reporting_period,
            record.industry_sector,
            record.total_assets,
            record.total_liabilities,
            record.revenue,
            record.net_profit,
            record.cash_flow,
            record.interest_coverage_ratio,
        ],
    )?;
    Ok(changed > 0)
}

/// Page of records matching the filter, in insertion order
pub fn find_records(
    conn: &Connection,
    filter: &RecordFilter,
    offset: u64,
    limit: u64,
) -> Result<Vec<FinancialRecord>> {
    let (where_clause, mut values) = filter_clause(filter);
    let sql = format!(
        "SELECT {} FROM financial_records{} ORDER BY id LIMIT ? OFFSET ?",
        RECORD_COLUMNS, where_clause
    );
    values.push(SqlValue::Integer(clamp_i64(limit)));
    values.push(SqlValue::Integer(clamp_i64(offset)));

    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map(params_from_iter(values.iter()), map_record)?;
    rows.collect()
}

/// Count records matching the filter
pub fn count_records(conn: &Connection, filter: &RecordFilter) -> Result<u64> {
    let (where_clause, values) = filter_clause(filter);
    let sql = format!("SELECT COUNT(*) FROM financial_records{}", where_clause);
    let count: i64 = conn.query_row(&sql, params_from_iter(values.iter()), |row| row.get(0))?;
    Ok(count.max(0) as u64)
}

/// Get a record by natural key
pub fn get_record(conn: &Connection, key: &NaturalKey) -> Result<Option<FinancialRecord>> {
    let sql = format!(
        "SELECT {} FROM financial_records
         WHERE company_id = ?1 AND reporting_period = ?2 AND industry_sector = ?3",
        RECORD_COLUMNS
    );
    conn.query_row(
        &sql,
        params![key.company_id, key.reporting_period, key.industry_sector],
        map_record,
    )
    .optional()
}

fn filter_clause(filter: &RecordFilter) -> (String, Vec<SqlValue>) {
    let fields = filter.fields();
    if fields.is_empty() {
        return (String::new(), Vec::new());
    }

    let clauses: Vec<String> = fields.keys().map(|column| format!("{} = ?", column)).collect();
    let values = fields
        .values()
        .map(|value| SqlValue::Text(value.to_string()))
        .collect();

    (format!(" WHERE {}", clauses.join(" AND ")), values)
}

fn map_record(row: &Row<'_>) -> Result<FinancialRecord> {
    Ok(FinancialRecord {
        id: row.get(0)?,
        company_id: row.get(1)?,
        company_name: row.get(2)?,
        reporting_period: row.get(3)?,
        industry_sector: row.get(4)?,
        total_assets: row.get(5)?,
        total_liabilities: row.get(6)?,
        revenue: row.get(7)?,
        net_profit: row.get(8)?,
        cash_flow: row.get(9)?,
        interest_coverage_ratio: row.get(10)?,
        debt_to_equity_ratio: row.get(11)?,
        operating_margin: row.get(12)?,
        return_on_equity: row.get(13)?,
        z_score: row.get(14)?,
        risk_score: row.get(15)?,
        created_at: row.get(16)?,
        updated_at: row.get(17)?,
    })
}

/// Non-finite derived values are stored as NULL
fn finite(value: Option<f64>) -> Option<f64> {
    value.filter(|v| v.is_finite())
}

fn clamp_i64(value: u64) -> i64 {
    i64::try_from(value).unwrap_or(i64::MAX)
}

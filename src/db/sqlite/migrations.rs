//! SQLite database migrations

use crate::error::Result;
use rusqlite::Connection;

/// Run all database migrations
pub fn run_migrations(conn: &Connection) -> Result<()> {
    // Create migrations table
    conn.execute(
        "CREATE TABLE IF NOT EXISTS migrations (
            id INTEGER PRIMARY KEY,
            name TEXT NOT NULL UNIQUE,
            applied_at TEXT NOT NULL DEFAULT (datetime('now'))
        )",
        [],
    )?;

    run_migration(conn, "001_financial_records", CREATE_FINANCIAL_RECORDS_TABLE)?;
    run_migration(conn, "002_ingestion_jobs", CREATE_INGESTION_JOBS_TABLE)?;
    run_migration(conn, "003_api_keys", CREATE_API_KEYS_TABLE)?;

    tracing::info!("Database migrations completed");
    Ok(())
}

fn run_migration(conn: &Connection, name: &str, sql: &str) -> Result<()> {
    // Check if migration already applied
    let exists: bool = conn.query_row(
        "SELECT EXISTS(SELECT 1 FROM migrations WHERE name = ?)",
        [name],
        |row| row.get(0),
    )?;

    if !exists {
        tracing::info!("Running migration: {}", name);
        conn.execute_batch(sql)?;
        conn.execute("INSERT INTO migrations (name) VALUES (?)", [name])?;
    }

    Ok(())
}

const CREATE_FINANCIAL_RECORDS_TABLE: &str = r#"
CREATE TABLE financial_records (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    company_id TEXT NOT NULL,
    company_name TEXT NOT NULL,
    reporting_period TEXT NOT NULL,
    industry_sector TEXT NOT NULL,
    total_assets REAL NOT NULL,
    total_liabilities REAL NOT NULL,
    revenue REAL NOT NULL,
    net_profit REAL NOT NULL,
    cash_flow REAL NOT NULL,
    interest_coverage_ratio REAL NOT NULL,
    debt_to_equity_ratio REAL,
    operating_margin REAL,
    return_on_equity REAL,
    z_score REAL,
    risk_score INTEGER,
    created_at TEXT NOT NULL DEFAULT (datetime('now')),
    updated_at TEXT NOT NULL DEFAULT (datetime('now')),
    UNIQUE(company_id, reporting_period, industry_sector)
);
CREATE INDEX IF NOT EXISTS idx_financial_records_company ON financial_records(company_id);
CREATE INDEX IF NOT EXISTS idx_financial_records_period ON financial_records(reporting_period);
CREATE INDEX IF NOT EXISTS idx_financial_records_sector ON financial_records(industry_sector);
"#;

const CREATE_INGESTION_JOBS_TABLE: &str = r#"
CREATE TABLE ingestion_jobs (
    seq INTEGER PRIMARY KEY AUTOINCREMENT,
    id TEXT NOT NULL UNIQUE,
    payload TEXT NOT NULL,
    record_count INTEGER NOT NULL,
    state TEXT NOT NULL DEFAULT 'waiting',
    attempts_made INTEGER NOT NULL DEFAULT 0,
    max_attempts INTEGER NOT NULL,
    backoff_ms INTEGER NOT NULL,
    run_at INTEGER NOT NULL,
    lease_until INTEGER,
    last_error TEXT,
    created_at TEXT NOT NULL DEFAULT (datetime('now')),
    updated_at TEXT NOT NULL DEFAULT (datetime('now'))
);
CREATE INDEX IF NOT EXISTS idx_ingestion_jobs_state_run_at ON ingestion_jobs(state, run_at);
"#;

const CREATE_API_KEYS_TABLE: &str = r#"
CREATE TABLE api_keys (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    name TEXT NOT NULL UNIQUE,
    key_hash TEXT NOT NULL UNIQUE,
    created_at TEXT NOT NULL DEFAULT (datetime('now')),
    last_used_at TEXT
);
"#;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_migrations_are_idempotent() {
        let conn = Connection::open_in_memory().unwrap();
        run_migrations(&conn).unwrap();
        run_migrations(&conn).unwrap();

        let applied: i64 = conn
            .query_row("SELECT COUNT(*) FROM migrations", [], |row| row.get(0))
            .unwrap();
        assert_eq!(applied, 3);
    }

    #[test]
    fn test_filter_indexes_exist() {
        let conn = Connection::open_in_memory().unwrap();
        run_migrations(&conn).unwrap();

        let indexes: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM sqlite_master
                 WHERE type = 'index' AND tbl_name = 'financial_records'
                 AND name LIKE 'idx_financial_records_%'",
                [],
                |row| row.get(0),
            )
            .unwrap();
        assert_eq!(indexes, 3);
    }
}

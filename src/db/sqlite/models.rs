//! SQLite database models

use serde::{Deserialize, Serialize};

/// API key record (the key itself is never stored)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiKey {
    pub id: i64,
    pub name: String,
    pub created_at: String,
    pub last_used_at: Option<String>,
}

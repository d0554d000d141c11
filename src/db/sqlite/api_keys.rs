//! API key management
//!
//! Keys are stored only as SHA-256 digests; the plaintext is shown once at
//! creation time.

use super::models::ApiKey;
use crate::error::{AppError, Result};
use rusqlite::{params, Connection, OptionalExtension};
use sha2::{Digest, Sha256};

/// Generate a random 64-character hex API key
pub fn generate_api_key() -> String {
    use rand::RngCore;
    let mut bytes = [0u8; 32];
    rand::thread_rng().fill_bytes(&mut bytes);
    hex::encode(bytes)
}

/// Hex SHA-256 digest of an API key
pub fn hash_api_key(key: &str) -> String {
    hex::encode(Sha256::digest(key.as_bytes()))
}

/// Mask API key for display (show first 8 and last 4 chars)
pub fn mask_api_key(key: &str) -> String {
    let chars: Vec<char> = key.chars().collect();
    if chars.len() <= 12 {
        "*".repeat(chars.len())
    } else {
        let head: String = chars[..8].iter().collect();
        let tail: String = chars[chars.len() - 4..].iter().collect();
        format!("{}...{}", head, tail)
    }
}

/// Create a new API key. Returns the id and the plaintext key.
pub fn create_api_key(conn: &Connection, name: &str) -> Result<(i64, String)> {
    let exists: bool = conn.query_row(
        "SELECT EXISTS(SELECT 1 FROM api_keys WHERE name = ?1)",
        params![name],
        |row| row.get(0),
    )?;

    if exists {
        return Err(AppError::Validation(format!(
            "API key with name '{}' already exists",
            name
        )));
    }

    let api_key = generate_api_key();
    conn.execute(
        "INSERT INTO api_keys (name, key_hash) VALUES (?1, ?2)",
        params![name, hash_api_key(&api_key)],
    )?;

    let id = conn.last_insert_rowid();
    tracing::info!("Created API key '{}' with id {}", name, id);

    Ok((id, api_key))
}

/// Store a caller-provided key under `name`, replacing any previous key
/// with that name
pub fn seed_api_key(conn: &Connection, name: &str, api_key: &str) -> Result<()> {
    if api_key.trim().is_empty() {
        return Err(AppError::Validation("API key must not be blank".to_string()));
    }

    conn.execute(
        "INSERT INTO api_keys (name, key_hash) VALUES (?1, ?2)
         ON CONFLICT(name) DO UPDATE SET key_hash = excluded.key_hash",
        params![name, hash_api_key(api_key)],
    )?;

    tracing::info!("Seeded API key '{}' ({})", name, mask_api_key(api_key));
    Ok(())
}

/// Validate an API key and return its record
pub fn validate_api_key(conn: &Connection, api_key: &str) -> Result<ApiKey> {
    let key = conn
        .query_row(
            "SELECT id, name, created_at, last_used_at FROM api_keys WHERE key_hash = ?1",
            params![hash_api_key(api_key)],
            |row| {
                Ok(ApiKey {
                    id: row.get(0)?,
                    name: row.get(1)?,
                    created_at: row.get(2)?,
                    last_used_at: row.get(3)?,
                })
            },
        )
        .optional()?;

    match key {
        Some(key) => {
            let _ = conn.execute(
                "UPDATE api_keys SET last_used_at = datetime('now') WHERE id = ?1",
                params![key.id],
            );
            tracing::debug!("API key '{}' validated successfully", key.name);
            Ok(key)
        }
        None => Err(AppError::Auth("Token is invalid".to_string())),
    }
}

/// Check if any API keys exist
pub fn has_api_key(conn: &Connection) -> Result<bool> {
    let count: i64 = conn.query_row("SELECT COUNT(*) FROM api_keys", [], |row| row.get(0))?;
    Ok(count > 0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::sqlite::migrations::run_migrations;

    fn create_test_db() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        run_migrations(&conn).unwrap();
        conn
    }

    #[test]
    fn test_generate_api_key() {
        let key = generate_api_key();
        assert_eq!(key.len(), 64);
        assert!(key.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn test_mask_api_key() {
        let key = "abcdef0123456789abcdef0123456789";
        let masked = mask_api_key(key);
        assert!(masked.starts_with("abcdef01"));
        assert!(masked.ends_with("6789"));
        assert!(masked.contains("..."));
        assert_eq!(mask_api_key("short"), "*****");
    }

    #[test]
    fn test_mask_and_seed_non_ascii_key() {
        let key = "ключ-доступа-финрис";
        assert_eq!(mask_api_key(key), "ключ-дос...нрис");

        let conn = create_test_db();
        seed_api_key(&conn, "bootstrap", key).unwrap();
        assert_eq!(validate_api_key(&conn, key).unwrap().name, "bootstrap");
    }

    #[test]
    fn test_create_and_validate_api_key() {
        let conn = create_test_db();

        let (id, api_key) = create_api_key(&conn, "analyst").unwrap();
        assert!(id > 0);
        assert!(has_api_key(&conn).unwrap());

        let validated = validate_api_key(&conn, &api_key).unwrap();
        assert_eq!(validated.name, "analyst");

        let invalid = validate_api_key(&conn, "not-a-key");
        assert!(matches!(invalid, Err(AppError::Auth(_))));
    }

    #[test]
    fn test_duplicate_name_rejected() {
        let conn = create_test_db();
        create_api_key(&conn, "analyst").unwrap();
        assert!(matches!(
            create_api_key(&conn, "analyst"),
            Err(AppError::Validation(_))
        ));
    }

    #[test]
    fn test_seed_replaces_key() {
        let conn = create_test_db();
        seed_api_key(&conn, "bootstrap", "first-secret-key").unwrap();
        seed_api_key(&conn, "bootstrap", "second-secret-key").unwrap();

        assert!(validate_api_key(&conn, "first-secret-key").is_err());
        assert_eq!(
            validate_api_key(&conn, "second-secret-key").unwrap().name,
            "bootstrap"
        );
    }

    #[test]
    fn test_plaintext_is_not_stored() {
        let conn = create_test_db();
        let (_, api_key) = create_api_key(&conn, "analyst").unwrap();
        let stored: String = conn
            .query_row("SELECT key_hash FROM api_keys", [], |row| row.get(0))
            .unwrap();
        assert_ne!(stored, api_key);
        assert_eq!(stored, hash_api_key(&api_key));
    }
}

//! Test utilities for database and state-token testing.
//!
//! Provides an in-memory SQLite database with migrations applied, fixture
//! helpers for users, and a state-token signer matching the production
//! wire format.

use anyhow::Result;
use channels::migration::{Migrator, MigratorTrait};
use hmac::{Hmac, Mac};
use sea_orm::{ConnectionTrait, Database, DatabaseConnection, Statement};
use sha2::Sha256;

pub const TEST_SIGNING_SECRET: &[u8] = b"test-signing-secret";

/// Sets up an in-memory SQLite database with all migrations applied.
pub async fn setup_test_db() -> Result<DatabaseConnection> {
    let db = Database::connect("sqlite::memory:").await?;
    Migrator::up(&db, None).await?;
    Ok(db)
}

/// Inserts a user row; everything beyond the id takes its column default.
#[allow(dead_code)]
pub async fn insert_user(db: &DatabaseConnection, user_id: &str) -> Result<()> {
    let stmt = Statement::from_string(
        db.get_database_backend(),
        format!("INSERT INTO users (id) VALUES ('{}')", user_id),
    );
    db.execute(stmt).await?;
    Ok(())
}

/// Signs a state token the way the service does:
/// `base64url(payload_json) + "." + base64url(hmac_sha256(payload_json))`.
/// Taking the timestamp as a parameter lets tests mint stale tokens.
#[allow(dead_code)]
pub fn sign_state(secret: &[u8], user_id: &str, platform: &str, timestamp_ms: i64) -> String {
    let payload = serde_json::json!({
        "userId": user_id,
        "platform": platform,
        "timestamp": timestamp_ms,
    });
    let payload_json = serde_json::to_vec(&payload).unwrap();

    let mut mac = Hmac::<Sha256>::new_from_slice(secret).unwrap();
    mac.update(&payload_json);
    let mac = mac.finalize().into_bytes();

    format!(
        "{}.{}",
        base64_url::encode(&payload_json),
        base64_url::encode(mac.as_slice())
    )
}

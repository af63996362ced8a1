//! Database schema migrations for SQLite.
//!
//! We use a simple versioned migration system. Each migration is a SQL string
//! that transforms the schema from version N to N+1.

use rusqlite::Connection;

use file_grants_core::now_millis;

use crate::error::{Result, StoreError};

/// Current schema version.
pub const CURRENT_VERSION: u32 = 1;

/// Initialize or migrate the database schema.
///
/// This function is idempotent - it can be called multiple times safely.
pub fn migrate(conn: &mut Connection) -> Result<()> {
    // Create migrations table if it doesn't exist
    conn.execute(
        "CREATE TABLE IF NOT EXISTS schema_migrations (
            version INTEGER PRIMARY KEY,
            applied_at INTEGER NOT NULL
        )",
        [],
    )?;

    // Get current version
    let current: u32 = conn.query_row(
        "SELECT COALESCE(MAX(version), 0) FROM schema_migrations",
        [],
        |row| row.get(0),
    )?;

    // Refuse to downgrade a database written by a newer build
    if current > CURRENT_VERSION {
        return Err(StoreError::Migration(format!(
            "database schema version {} is newer than supported version {}",
            current, CURRENT_VERSION
        )));
    }

    // Apply migrations
    if current < CURRENT_VERSION {
        let tx = conn.transaction()?;

        for version in (current + 1)..=CURRENT_VERSION {
            apply_migration(&tx, version)?;

            tx.execute(
                "INSERT INTO schema_migrations (version, applied_at) VALUES (?1, ?2)",
                rusqlite::params![version, now_millis()],
            )?;
        }

        tx.commit()?;
        tracing::info!(from = current, to = CURRENT_VERSION, "grant store schema migrated");
    }

    Ok(())
}

/// Apply a specific migration version.
fn apply_migration(conn: &Connection, version: u32) -> Result<()> {
    match version {
        1 => apply_v1(conn),
        _ => Err(StoreError::Migration(format!(
            "unknown migration version: {}",
            version
        ))),
    }
}

/// Migration v1: Initial schema.
fn apply_v1(conn: &Connection) -> Result<()> {
    // Grant records and retired keys
    conn.execute_batch(
        r#"
        -- One row per live (non-destroyed) grant
        CREATE TABLE grants (
            grant_key BLOB PRIMARY KEY,           -- 32 random bytes
            origin TEXT NOT NULL,                 -- owning site origin
            identity BLOB NOT NULL,               -- CBOR FileIdentity, immutable
            location BLOB NOT NULL,               -- CBOR FileLocation, refreshed on rename
            mode INTEGER NOT NULL,                -- 0=read-only, 1=read-write
            last_known_signature BLOB NOT NULL,   -- CBOR FileSignature
            dirty INTEGER NOT NULL DEFAULT 0,
            state INTEGER NOT NULL DEFAULT 0,     -- 0=active, 1=revoked, 2=invalid
            access_count INTEGER NOT NULL DEFAULT 0,
            created_at INTEGER NOT NULL,
            state_changed_at INTEGER              -- set when leaving active
        );

        -- Keys of destroyed grants; never handed out again
        CREATE TABLE retired_keys (
            grant_key BLOB PRIMARY KEY,
            retired_at INTEGER NOT NULL
        );

        -- Indexes for per-origin listing and garbage collection
        CREATE INDEX idx_grants_origin ON grants(origin, grant_key);
        CREATE INDEX idx_grants_terminal ON grants(state, state_changed_at);
        "#,
    )?;

    Ok(())
}

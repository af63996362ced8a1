//! SQLite implementation of the GrantStore trait.
//!
//! This is the durable backend. It uses rusqlite with bundled SQLite,
//! wrapped in async via tokio::spawn_blocking. The connection mutex is held
//! only for single statements or short transactions; per-key atomicity comes
//! from [`KeyLocks`], not from the connection.

use std::path::Path;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use rusqlite::{params, Connection, OptionalExtension, Transaction};
use serde::{de::DeserializeOwned, Serialize};

use file_grants_core::{
    now_millis, AccessMode, Grant, GrantKey, GrantState, NewGrant, Origin,
};

use crate::error::{Result, StoreError};
use crate::locks::{KeyGuard, KeyLocks};
use crate::migration;
use crate::traits::{check_mutation, GrantStore, KEY_ATTEMPTS};

const GRANT_COLUMNS: &str = "grant_key, origin, identity, location, mode, \
     last_known_signature, dirty, state, access_count, created_at, state_changed_at";

/// SQLite-based store implementation.
pub struct SqliteGrantStore {
    /// The SQLite connection, protected by a mutex.
    conn: Arc<Mutex<Connection>>,
    locks: KeyLocks,
}

impl SqliteGrantStore {
    /// Open a SQLite database at the given path.
    ///
    /// Creates the file and runs migrations if it doesn't exist. Existing
    /// grants are available immediately after this returns.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let mut conn = Connection::open(path)?;
        configure(&conn)?;
        migration::migrate(&mut conn)?;
        Ok(Self::from_connection(conn))
    }

    /// Open an in-memory SQLite database.
    ///
    /// Useful for testing.
    pub fn open_memory() -> Result<Self> {
        let mut conn = Connection::open_in_memory()?;
        configure(&conn)?;
        migration::migrate(&mut conn)?;
        Ok(Self::from_connection(conn))
    }

    fn from_connection(conn: Connection) -> Self {
        Self {
            conn: Arc::new(Mutex::new(conn)),
            locks: KeyLocks::new(),
        }
    }

    /// Run `f` against the connection on the blocking pool.
    async fn blocking<F, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&mut Connection) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let conn = Arc::clone(&self.conn);

        tokio::task::spawn_blocking(move || {
            let mut conn = conn
                .lock()
                .map_err(|e| StoreError::Internal(format!("mutex poisoned: {}", e)))?;
            f(&mut conn)
        })
        .await
        .map_err(|e| StoreError::Internal(format!("spawn_blocking failed: {}", e)))?
    }

    async fn load(&self, key: GrantKey) -> Result<Option<Grant>> {
        self.blocking(move |conn| load_grant(conn, &key)).await
    }
}

/// Durability settings: WAL journal, fsync on every commit.
fn configure(conn: &Connection) -> Result<()> {
    let _mode: String = conn.query_row("PRAGMA journal_mode = WAL", [], |row| row.get(0))?;
    conn.execute_batch("PRAGMA synchronous = FULL;")?;
    Ok(())
}

fn to_cbor<T: Serialize>(value: &T) -> Result<Vec<u8>> {
    let mut buf = Vec::new();
    ciborium::into_writer(value, &mut buf)
        .map_err(|e| StoreError::Serialization(e.to_string()))?;
    Ok(buf)
}

fn from_cbor<T: DeserializeOwned>(bytes: &[u8]) -> Result<T> {
    ciborium::from_reader(bytes).map_err(|e| StoreError::Serialization(e.to_string()))
}

/// A `grants` row as stored, before decoding.
struct GrantRow {
    key: Vec<u8>,
    origin: String,
    identity: Vec<u8>,
    location: Vec<u8>,
    mode: u8,
    signature: Vec<u8>,
    dirty: bool,
    state: u8,
    access_count: i64,
    created_at: i64,
    state_changed_at: Option<i64>,
}

impl GrantRow {
    fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            key: row.get("grant_key")?,
            origin: row.get("origin")?,
            identity: row.get("identity")?,
            location: row.get("location")?,
            mode: row.get("mode")?,
            signature: row.get("last_known_signature")?,
            dirty: row.get("dirty")?,
            state: row.get("state")?,
            access_count: row.get("access_count")?,
            created_at: row.get("created_at")?,
            state_changed_at: row.get("state_changed_at")?,
        })
    }

    fn into_grant(self) -> Result<Grant> {
        let key = GrantKey::try_from(self.key.as_slice())
            .map_err(|_| StoreError::Serialization("grant_key is not 32 bytes".into()))?;

        Ok(Grant {
            key,
            origin: Origin::new(self.origin)?,
            identity: from_cbor(&self.identity)?,
            location: from_cbor(&self.location)?,
            mode: AccessMode::from_u8(self.mode)?,
            last_known_signature: from_cbor(&self.signature)?,
            dirty: self.dirty,
            state: GrantState::from_u8(self.state)?,
            access_count: self.access_count.max(0) as u64,
            created_at: self.created_at,
            state_changed_at: self.state_changed_at,
        })
    }
}

fn load_grant(conn: &Connection, key: &GrantKey) -> Result<Option<Grant>> {
    let sql = format!("SELECT {} FROM grants WHERE grant_key = ?1", GRANT_COLUMNS);
    conn.query_row(&sql, params![key.as_bytes().as_slice()], GrantRow::from_row)
        .optional()?
        .map(GrantRow::into_grant)
        .transpose()
}

fn key_taken(tx: &Transaction<'_>, key: &GrantKey) -> Result<bool> {
    let taken: bool = tx.query_row(
        "SELECT EXISTS(SELECT 1 FROM grants WHERE grant_key = ?1)
             OR EXISTS(SELECT 1 FROM retired_keys WHERE grant_key = ?1)",
        params![key.as_bytes().as_slice()],
        |row| row.get(0),
    )?;
    Ok(taken)
}

fn insert_grant(tx: &Transaction<'_>, grant: &Grant) -> Result<()> {
    tx.execute(
        "INSERT INTO grants (
            grant_key, origin, identity, location, mode, last_known_signature,
            dirty, state, access_count, created_at, state_changed_at
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
        params![
            grant.key.as_bytes().as_slice(),
            grant.origin.as_str(),
            to_cbor(&grant.identity)?,
            to_cbor(&grant.location)?,
            grant.mode.as_u8(),
            to_cbor(&grant.last_known_signature)?,
            grant.dirty,
            grant.state.as_u8(),
            grant.access_count as i64,
            grant.created_at,
            grant.state_changed_at,
        ],
    )?;
    Ok(())
}

fn write_mutable_fields(tx: &Transaction<'_>, grant: &Grant) -> Result<usize> {
    let changed = tx.execute(
        "UPDATE grants SET
            location = ?2,
            mode = ?3,
            last_known_signature = ?4,
            dirty = ?5,
            state = ?6,
            access_count = ?7,
            state_changed_at = ?8
         WHERE grant_key = ?1",
        params![
            grant.key.as_bytes().as_slice(),
            to_cbor(&grant.location)?,
            grant.mode.as_u8(),
            to_cbor(&grant.last_known_signature)?,
            grant.dirty,
            grant.state.as_u8(),
            grant.access_count as i64,
            grant.state_changed_at,
        ],
    )?;
    Ok(changed)
}

/// Delete a grant and retire its key. Returns whether a row was deleted.
fn destroy(tx: &Transaction<'_>, key: &GrantKey, now: i64) -> Result<bool> {
    let deleted = tx.execute(
        "DELETE FROM grants WHERE grant_key = ?1",
        params![key.as_bytes().as_slice()],
    )?;
    if deleted > 0 {
        tx.execute(
            "INSERT OR IGNORE INTO retired_keys (grant_key, retired_at) VALUES (?1, ?2)",
            params![key.as_bytes().as_slice(), now],
        )?;
    }
    Ok(deleted > 0)
}

fn select_keys(conn: &Connection, sql: &str, param: impl rusqlite::ToSql) -> Result<Vec<GrantKey>> {
    let mut stmt = conn.prepare(sql)?;
    let raw: Vec<Vec<u8>> = stmt
        .query_map(params![param], |row| row.get(0))?
        .collect::<rusqlite::Result<Vec<_>>>()?;

    raw.iter()
        .map(|bytes| {
            GrantKey::try_from(bytes.as_slice())
                .map_err(|_| StoreError::Serialization("grant_key is not 32 bytes".into()))
        })
        .collect()
}

#[async_trait]
impl GrantStore for SqliteGrantStore {
    async fn create(&self, new: NewGrant, now: i64) -> Result<GrantKey> {
        let key = self
            .blocking(move |conn| {
                let tx = conn.transaction()?;

                let mut allocated = None;
                for _ in 0..KEY_ATTEMPTS {
                    let candidate = GrantKey::generate();
                    if !key_taken(&tx, &candidate)? {
                        allocated = Some(candidate);
                        break;
                    }
                }
                let key = allocated.ok_or(StoreError::KeyExhausted)?;

                insert_grant(&tx, &Grant::from_new(key, new, now))?;
                tx.commit()?;
                Ok(key)
            })
            .await?;

        tracing::debug!(?key, "grant created");
        Ok(key)
    }

    async fn remove(&self, key: &GrantKey) -> Result<bool> {
        let _guard = self.locks.lock(*key).await;
        let key = *key;

        self.blocking(move |conn| {
            let tx = conn.transaction()?;
            let removed = destroy(&tx, &key, now_millis())?;
            tx.commit()?;
            Ok(removed)
        })
        .await
    }

    async fn purge(&self, origin: &Origin) -> Result<usize> {
        let owner = origin.as_str().to_string();
        let keys = self
            .blocking(move |conn| {
                select_keys(conn, "SELECT grant_key FROM grants WHERE origin = ?1", owner)
            })
            .await?;

        let _guards = self.locks.lock_all(&keys).await;

        let owner = origin.as_str().to_string();
        let removed = self
            .blocking(move |conn| {
                let tx = conn.transaction()?;
                let now = now_millis();
                let mut removed = 0;
                for key in &keys {
                    let owned: bool = tx.query_row(
                        "SELECT EXISTS(SELECT 1 FROM grants WHERE grant_key = ?1 AND origin = ?2)",
                        params![key.as_bytes().as_slice(), owner],
                        |row| row.get(0),
                    )?;
                    if owned && destroy(&tx, key, now)? {
                        removed += 1;
                    }
                }
                tx.commit()?;
                Ok(removed)
            })
            .await?;

        tracing::info!(origin = %origin, removed, "purged grants for origin");
        Ok(removed)
    }

    async fn collect_garbage(&self, cutoff: i64) -> Result<usize> {
        let keys = self
            .blocking(move |conn| {
                select_keys(
                    conn,
                    "SELECT grant_key FROM grants
                     WHERE state != 0 AND state_changed_at IS NOT NULL AND state_changed_at <= ?1",
                    cutoff,
                )
            })
            .await?;

        if keys.is_empty() {
            return Ok(0);
        }

        let _guards = self.locks.lock_all(&keys).await;

        let removed = self
            .blocking(move |conn| {
                let tx = conn.transaction()?;
                let now = now_millis();
                let mut removed = 0;
                for key in &keys {
                    let still_collectable = load_grant(&tx, key)?
                        .is_some_and(|g| g.is_collectable(cutoff));
                    if still_collectable && destroy(&tx, key, now)? {
                        removed += 1;
                    }
                }
                tx.commit()?;
                Ok(removed)
            })
            .await?;

        tracing::debug!(removed, cutoff, "collected terminal grants");
        Ok(removed)
    }

    async fn flush(&self) -> Result<()> {
        self.blocking(|conn| {
            conn.query_row("PRAGMA wal_checkpoint(TRUNCATE)", [], |_| Ok(()))?;
            Ok(())
        })
        .await
    }

    async fn lookup(&self, origin: &Origin, key: &GrantKey) -> Result<Option<Grant>> {
        Ok(self.load(*key).await?.filter(|g| g.owned_by(origin)))
    }

    async fn list_page(
        &self,
        origin: &Origin,
        after: Option<GrantKey>,
        limit: usize,
    ) -> Result<Vec<Grant>> {
        let owner = origin.as_str().to_string();
        let after = after.map(|k| k.as_bytes().to_vec()).unwrap_or_default();
        let limit = i64::try_from(limit).unwrap_or(i64::MAX);

        self.blocking(move |conn| {
            let sql = format!(
                "SELECT {} FROM grants
                 WHERE origin = ?1 AND grant_key > ?2
                 ORDER BY grant_key
                 LIMIT ?3",
                GRANT_COLUMNS
            );
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt
                .query_map(params![owner, after, limit], GrantRow::from_row)?
                .collect::<rusqlite::Result<Vec<_>>>()?;

            rows.into_iter().map(GrantRow::into_grant).collect()
        })
        .await
    }

    async fn is_retired(&self, key: &GrantKey) -> Result<bool> {
        let key = *key;
        self.blocking(move |conn| {
            let retired: bool = conn.query_row(
                "SELECT EXISTS(SELECT 1 FROM retired_keys WHERE grant_key = ?1)",
                params![key.as_bytes().as_slice()],
                |row| row.get(0),
            )?;
            Ok(retired)
        })
        .await
    }

    async fn count(&self) -> Result<usize> {
        self.blocking(|conn| {
            let count: i64 = conn.query_row("SELECT COUNT(*) FROM grants", [], |row| row.get(0))?;
            Ok(count.max(0) as usize)
        })
        .await
    }

    async fn lock(&self, key: &GrantKey) -> KeyGuard {
        self.locks.lock(*key).await
    }

    async fn load_locked(&self, guard: &KeyGuard) -> Result<Option<Grant>> {
        self.load(*guard.key()).await
    }

    async fn update_locked<F, T>(&self, guard: &KeyGuard, mutator: F) -> Result<Option<T>>
    where
        F: FnOnce(&mut Grant) -> T + Send,
        T: Send,
    {
        let Some(before) = self.load(*guard.key()).await? else {
            return Ok(None);
        };

        let mut after = before.clone();
        let output = mutator(&mut after);

        if after != before {
            check_mutation(&before, &after)?;
            self.blocking(move |conn| {
                let tx = conn.transaction()?;
                write_mutable_fields(&tx, &after)?;
                tx.commit()?;
                Ok(())
            })
            .await?;
        }

        Ok(Some(output))
    }
}

//! # File Grants Store
//!
//! Durable storage for grant records. Provides a trait-based interface with
//! SQLite and in-memory implementations.
//!
//! ## Overview
//!
//! The [`GrantStore`] trait is the only writer-facing surface for grants.
//! [`SqliteGrantStore`] is the durable backend; [`MemoryGrantStore`] has the
//! same semantics without persistence and is used in tests.
//!
//! ## Key Types
//!
//! - [`GrantStore`] - the async trait for all grant storage operations
//! - [`GrantStoreExt`] - state transitions built on [`GrantStore::update`]
//! - [`SqliteGrantStore`] - SQLite-based persistent storage
//! - [`MemoryGrantStore`] - in-memory storage for tests
//! - [`KeyLocks`], [`KeyGuard`] - per-key async locks backing atomic updates
//!
//! ## Usage
//!
//! ```rust,no_run
//! use file_grants_store::{SqliteGrantStore, GrantStore};
//!
//! async fn example() {
//!     // Open a database file (created and migrated on first use)
//!     let store = SqliteGrantStore::open("grants.db").unwrap();
//!
//!     // Or an in-memory database for tests
//!     let store = SqliteGrantStore::open_memory().unwrap();
//!
//!     // let key = store.create(new_grant, now).await.unwrap();
//! }
//! ```
//!
//! ## Design Notes
//!
//! - **Per-key atomicity**: `update` holds the key's lock across read,
//!   mutate, and durable write. Unrelated keys never contend.
//! - **Durable before return**: SQLite writes commit with
//!   `synchronous = FULL` before the call resolves.
//! - **No key reuse**: destroyed keys are retired and never handed out again.

pub mod error;
pub mod locks;
pub mod memory;
pub mod migration;
pub mod sqlite;
pub mod traits;

pub use error::{Result, StoreError};
pub use locks::{KeyGuard, KeyLocks};
pub use memory::MemoryGrantStore;
pub use sqlite::SqliteGrantStore;
pub use traits::{GrantStore, GrantStoreExt};

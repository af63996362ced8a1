//! # File Grants
//!
//! Capability-based access from web origins to files on the local disk.
//!
//! ## Overview
//!
//! When a user picks a file for a site, the site receives an opaque grant
//! key. Every later read or write presents that key and is validated here:
//!
//! - **Grants**: bind one origin to one file identity with a fixed mode
//! - **Validation**: every access re-checks ownership, state, mode and
//!   freshness; denials are values, never panics or errors
//! - **Dirty tracking**: external modifications are detected by comparing
//!   file signatures under a configurable policy
//! - **Revocation**: user revocation, moves, and storage clears are
//!   monotonic; a grant never becomes active again
//!
//! ## Usage
//!
//! ```rust,no_run
//! use file_grants::{FileGrants, GrantsConfig};
//! use file_grants::core::{AccessMode, Origin};
//!
//! async fn example() -> file_grants::Result<()> {
//!     let grants = FileGrants::open_local("grants.db", GrantsConfig::default())?;
//!     let origin = Origin::new("https://editor.example")?;
//!
//!     let key = grants
//!         .create_grant(&origin, "/home/me/notes.md", AccessMode::ReadWrite)
//!         .await?;
//!
//!     if let Some(ticket) = grants.validate_write(&origin, &key, false).await?.into_ticket() {
//!         std::fs::write(ticket.path(), b"new contents").ok();
//!         grants.finish_write(ticket).await?;
//!     }
//!
//!     grants.close().await
//! }
//! ```
//!
//! ## Re-exports
//!
//! - `file_grants::core` - Core types (Grant, GrantKey, Origin, etc.)
//! - `file_grants::store` - Storage abstraction, SQLite and in-memory stores

pub mod config;
pub mod dirty;
pub mod error;
pub mod grants;
pub mod listing;
#[cfg(unix)]
pub mod local_fs;
pub mod revocation;
pub mod validator;

// Re-export component crates
pub use file_grants_core as core;
pub use file_grants_store as store;

// Re-export main types for convenience
pub use config::GrantsConfig;
pub use dirty::{DirtyTracker, Observation, Refresh};
pub use error::{GrantsError, Result};
pub use grants::FileGrants;
pub use listing::GrantListing;
#[cfg(unix)]
pub use local_fs::LocalFileSystem;
pub use revocation::RevocationManager;
pub use validator::{AccessTicket, AccessValidator, Decision};

// Re-export commonly used core types
pub use file_grants_core::{
    AccessMode, DenyReason, DirtyPolicy, FileSystem, GrantKey, GrantState, GrantSummary, Origin,
};

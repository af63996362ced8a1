//! # File Grants Core
//!
//! Pure data types for capability-based file access grants.
//!
//! This crate contains no storage and no policy engine. It defines the values
//! every other crate passes around: the opaque [`GrantKey`], the owning
//! [`Origin`], the [`FileIdentity`] of a target file, the [`FileSignature`]
//! used for change detection, and the [`Grant`] record itself.
//!
//! ## Key Types
//!
//! - [`GrantKey`] - 256-bit random capability token, never derived from a path
//! - [`Origin`] - the site that owns a grant
//! - [`FileIdentity`] - "same underlying file" token, stable across renames
//! - [`FileSignature`] - content fingerprint (mtime + length, optional digest)
//! - [`Grant`] - the persisted grant record
//! - [`DirtyPolicy`] - pluggable strategy for flagging external changes
//! - [`DenyReason`] - structured reason for a denied access
//!
//! ## File System Boundary
//!
//! The [`FileSystem`] trait is the seam to the host file system. The core
//! never touches the disk itself; implementations live in the engine crate
//! and the testkit.

pub mod clock;
pub mod decision;
pub mod error;
pub mod fs;
pub mod grant;
pub mod identity;
pub mod key;
pub mod policy;

pub use clock::now_millis;
pub use decision::{DenyReason, Operation};
pub use error::{CoreError, Result};
pub use fs::{FileSystem, FsError, IdentifiedFile, Resolution};
pub use grant::{AccessMode, Grant, GrantState, GrantSummary, NewGrant};
pub use identity::{Blake3Hash, FileIdentity, FileLocation, FileSignature};
pub use key::{GrantKey, Origin};
pub use policy::DirtyPolicy;

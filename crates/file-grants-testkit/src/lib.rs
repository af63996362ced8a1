//! # File Grants Testkit
//!
//! Testing utilities for file grants.
//!
//! ## Overview
//!
//! This crate provides:
//!
//! - **MemoryFileSystem**: A scriptable fake disk for driving external edits,
//!   renames, moves and deletions between grant operations
//! - **Generators**: Proptest strategies for property-based testing
//! - **Fixtures**: Helper structs for setting up test scenarios
//!
//! ## Test Fixtures
//!
//! ```rust
//! use file_grants_testkit::fixtures::{origin, TestGrants};
//! use file_grants::core::AccessMode;
//!
//! # tokio_test_block(async {
//! let fixture = TestGrants::new();
//! let site = origin("editor.example");
//! let key = fixture
//!     .grant_file(&site, "/docs/a.txt", b"hello", AccessMode::ReadWrite)
//!     .await;
//!
//! fixture.fs.write("/docs/a.txt", b"edited elsewhere").unwrap();
//! let decision = fixture.grants.validate_read(&site, &key, false).await.unwrap();
//! assert!(!decision.is_allowed());
//! # });
//! # fn tokio_test_block<F: std::future::Future>(f: F) -> F::Output {
//! #     tokio::runtime::Builder::new_current_thread().build().unwrap().block_on(f)
//! # }
//! ```
//!
//! ## Property Testing
//!
//! ```rust,ignore
//! use proptest::prelude::*;
//! use file_grants_testkit::generators::{access_mode, origin};
//!
//! proptest! {
//!     #[test]
//!     fn origins_parse(origin in origin()) {
//!         prop_assert!(!origin.as_str().is_empty());
//!     }
//! }
//! ```

pub mod fixtures;
pub mod generators;
pub mod memory_fs;

pub use fixtures::{origin, origins, MemoryGrants, TestGrants};
pub use memory_fs::MemoryFileSystem;

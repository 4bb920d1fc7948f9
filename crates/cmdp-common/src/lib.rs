//! CMD Publishing Common Library
#![deny(clippy::unwrap_used, clippy::expect_used)]
//!
//! Shared types, utilities, and error handling for the CMD publishing tools.
//!
//! # Overview
//!
//! This crate provides common functionality used across all workspace members:
//!
//! - **Error Handling**: Custom error types and result types
//! - **Chunking**: Byte-range planning for resumable uploads
//! - **Types**: Wire types of the publishing platform (recipes, jobs, instances)
//! - **Logging**: Centralized `tracing` setup
//!
//! # Example
//!
//! ```no_run
//! use cmdp_common::chunking::{ChunkPlan, DEFAULT_CHUNK_SIZE};
//!
//! fn describe(total: u64) -> cmdp_common::Result<()> {
//!     let plan = ChunkPlan::new(total, DEFAULT_CHUNK_SIZE)?;
//!     println!("{} chunks", plan.chunk_count());
//!     Ok(())
//! }
//! ```

pub mod chunking;
pub mod error;
pub mod logging;
pub mod types;

// Re-export commonly used types
pub use error::{CommonError, Result};

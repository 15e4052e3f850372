//! AirQ Common Library
#![deny(clippy::unwrap_used, clippy::expect_used)]
//!
//! Shared types, logging, and error handling for the AirQ pipeline.
//!
//! # Overview
//!
//! This crate provides common functionality used across the AirQ workspace members:
//!
//! - **Error Handling**: Custom error types and result types
//! - **Logging**: `tracing` subscriber setup driven by environment variables
//! - **Types**: The pollutant vocabulary, measurement units, and object references
//!
//! # Example
//!
//! ```no_run
//! use airq_common::types::{Parameter, Unit};
//!
//! fn describe(parameter: &str, unit: &str) -> airq_common::Result<String> {
//!     let parameter: Parameter = parameter.parse()?;
//!     let unit: Unit = unit.parse()?;
//!     Ok(format!("{} in {}", parameter, unit))
//! }
//! ```

pub mod error;
pub mod logging;
pub mod types;

// Re-export commonly used types
pub use error::{CommonError, Result};

//! Starline Common Library
//!
//! Shared plumbing for the Starline warehouse pipeline crates.
//!
//! - **Logging**: tracing subscriber setup shared by every stage binary
//! - **Checksums**: SHA-256 digests recorded for staged artifacts
//! - **Errors**: the error type for the helpers above
//!
//! # Example
//!
//! ```no_run
//! use starline_common::logging::{init_logging, LogConfig};
//!
//! fn main() -> starline_common::Result<()> {
//!     let config = LogConfig::from_env()?;
//!     init_logging(&config)?;
//!     tracing::info!("extract stage starting");
//!     Ok(())
//! }
//! ```

#![deny(clippy::unwrap_used, clippy::expect_used)]

pub mod checksum;
pub mod error;
pub mod logging;

pub use error::{CommonError, Result};

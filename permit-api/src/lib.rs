//! Client for the Permit.io policy and facts REST API.
//!
//! [`PermitApi`] is the seam the processors are written against;
//! [`HttpPermitClient`] is the reqwest implementation used by the CLI.

pub mod client;
pub mod config;
pub mod error;
pub mod models;
#[cfg(any(test, feature = "test-utils"))]
pub mod testing;

pub use client::{HttpPermitClient, PermitApi, PAGE_SIZE};
pub use config::{ClientConfig, DEFAULT_API_URL};
pub use error::{ApiError, ApiResult};

//! Shared types for the Robinhood Crypto REST client
//!
//! This crate provides the I/O-free building blocks used by the other crates
//! in the workspace. It has minimal dependencies and can be used independently.
//!
//! # Key Types
//!
//! - [`TokenBucket`], [`TokenBucketConfig`] - Client-side rate limiting arithmetic
//! - [`ApiError`], [`ErrorDetail`] - Structured error responses
//! - [`PageResponse`], [`extract_cursor`] - Cursor pagination

pub mod error;
pub mod pagination;
pub mod rate_limit;

// Re-export commonly used types
pub use error::*;
pub use pagination::*;
pub use rate_limit::*;

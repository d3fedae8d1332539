//! Error types for the pincache library.
//!
//! The cache itself surfaces no recoverable errors: operations either
//! succeed or the process aborts, and precondition violations are caller
//! bugs caught by debug assertions. The two types here cover the edges of
//! that model:
//!
//! - [`ConfigError`]: returned when construction parameters are invalid
//!   (e.g. an out-of-range shard count in the builder).
//! - [`InvariantError`]: returned by the debug/test-only invariant walkers
//!   when the internal structure is inconsistent.
//!
//! ## Example Usage
//!
//! ```
//! use pincache::builder::CacheBuilder;
//! use pincache::error::ConfigError;
//! use pincache::ShardedLruCache;
//!
//! // Fallible constructor for user-configurable parameters
//! let cache: Result<ShardedLruCache<u64>, ConfigError> =
//!     CacheBuilder::new(1024).shard_bits(6).try_build();
//! assert!(cache.is_ok());
//!
//! // Invalid shard count is caught without panicking
//! let bad = CacheBuilder::new(1024).shard_bits(16).try_build::<u64>();
//! assert!(bad.is_err());
//! ```

use std::fmt;

// ---------------------------------------------------------------------------
// InvariantError
// ---------------------------------------------------------------------------

/// Error returned when internal cache invariants are violated.
///
/// Produced by the debug-only invariant walkers on the shard engine.
/// Carries a human-readable description of which invariant failed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvariantError(String);

impl InvariantError {
    /// Creates a new `InvariantError` with the given description.
    #[inline]
    pub fn new(msg: impl Into<String>) -> Self {
        Self(msg.into())
    }

    /// Returns the error description.
    #[inline]
    pub fn message(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for InvariantError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl std::error::Error for InvariantError {}

// ---------------------------------------------------------------------------
// ConfigError
// ---------------------------------------------------------------------------

/// Error returned when cache configuration parameters are invalid.
///
/// Produced by [`CacheBuilder::try_build`](crate::builder::CacheBuilder::try_build).
/// Carries a human-readable description of which parameter failed
/// validation.
///
/// # Example
///
/// ```
/// use pincache::builder::CacheBuilder;
///
/// let err = CacheBuilder::new(100).shard_bits(99).try_build::<u64>().unwrap_err();
/// assert!(err.to_string().contains("shard_bits"));
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigError(String);

impl ConfigError {
    /// Creates a new `ConfigError` with the given description.
    #[inline]
    pub fn new(msg: impl Into<String>) -> Self {
        Self(msg.into())
    }

    /// Returns the error description.
    #[inline]
    pub fn message(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl std::error::Error for ConfigError {}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

//! Error types for the tinyslru library.
//!
//! ## Key Components
//!
//! - [`InvariantError`]: Returned when internal data-structure invariants are
//!   violated (debug-only `check_invariants` methods).
//! - [`ConfigError`]: Returned when engine configuration parameters are invalid
//!   (e.g. zero capacity, sketch dimensions of zero, out-of-range theta).
//! - [`CodecError`]: Returned when a control payload cannot be decoded. The
//!   whole payload is discarded; nothing is partially applied.
//!
//! ## Example Usage
//!
//! ```
//! use tinyslru::error::ConfigError;
//! use tinyslru::policy::slru::SegmentedCache;
//!
//! // Fallible constructor for user-configurable parameters
//! let cache: Result<SegmentedCache<String, i32>, ConfigError> =
//!     SegmentedCache::try_new(2, 2);
//! assert!(cache.is_ok());
//!
//! // Zero total capacity is caught without panicking
//! let bad = SegmentedCache::<String, i32>::try_new(0, 0);
//! assert!(bad.is_err());
//! ```

use std::fmt;

// ---------------------------------------------------------------------------
// InvariantError
// ---------------------------------------------------------------------------

/// Error returned when internal cache invariants are violated.
///
/// Produced by debug-only `check_invariants` methods
/// (e.g. [`SegmentedCache::check_invariants`](crate::policy::slru::SegmentedCache::check_invariants)).
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

/// Error returned when configuration parameters are invalid.
///
/// Produced by fallible constructors such as
/// [`FrequencySketch::try_new`](crate::ds::FrequencySketch::try_new) and
/// [`EngineBuilder::try_build`](crate::engine::EngineBuilder::try_build).
///
/// # Example
///
/// ```
/// use tinyslru::ds::FrequencySketch;
///
/// let err = FrequencySketch::try_new(0, 2048).unwrap_err();
/// assert!(err.to_string().contains("depth"));
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
// CodecError
// ---------------------------------------------------------------------------

/// Error returned when a TLV control payload is malformed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CodecError {
    /// Input ended before a complete element could be read.
    Truncated {
        /// What was being read when the input ran out.
        context: &'static str,
    },
    /// An element had a different type than the one required at this position.
    UnexpectedType {
        /// Required TLV type.
        expected: u64,
        /// TLV type actually found.
        found: u64,
    },
    /// Bytes remained after the outer container.
    TrailingBytes(usize),
    /// An integer element had a width other than 1, 2, 4 or 8 bytes.
    InvalidIntegerLength(usize),
    /// A pair element lacked one of its mandatory fields.
    MissingField(&'static str),
}

impl fmt::Display for CodecError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CodecError::Truncated { context } => write!(f, "truncated input while reading {}", context),
            CodecError::UnexpectedType { expected, found } => {
                write!(f, "unexpected TLV type {:#x}, expected {:#x}", found, expected)
            },
            CodecError::TrailingBytes(n) => write!(f, "{} trailing bytes after outer TLV", n),
            CodecError::InvalidIntegerLength(n) => {
                write!(f, "integer TLV must be 1, 2, 4 or 8 bytes, got {}", n)
            },
            CodecError::MissingField(field) => write!(f, "missing mandatory field: {}", field),
        }
    }
}

impl std::error::Error for CodecError {}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

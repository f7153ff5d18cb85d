//! Error types for geotrie operations.

use thiserror::Error;

/// Enum with all errors in this crate.
#[derive(Error, Debug)]
pub enum GeotrieError {
    /// A hash contained characters outside the base-32 alphabet, exceeded
    /// the maximum resolution, or was empty where a point hash is required.
    #[error("invalid geohash: {0}")]
    InvalidHash(String),

    /// A coordinate or value fell outside its permitted range.
    #[error("value out of range: {0}")]
    OutOfRange(String),

    /// A schema lookup by name or position missed.
    #[error("dimension not found: {0}")]
    DimensionNotFound(String),

    /// Malformed input: bad XML, a binary header mismatch, or trailing
    /// bytes after a complete tree.
    #[error("invalid format: {0}")]
    InvalidFormat(String),

    /// The serialized tree was produced by a format version this build
    /// does not recognize.
    #[error("unsupported format version {0}")]
    UnsupportedVersion(u8),

    /// A type name string did not match any of the supported primitives.
    #[error("unsupported type: {0}")]
    UnsupportedType(String),

    /// The input ended before a complete tree could be decoded.
    #[error("unexpected end of input at offset {0}")]
    UnexpectedEof(u64),

    /// An underlying file operation failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Generic invariant violation.
    #[error("{0}")]
    Other(String),
}

pub type Result<T> = std::result::Result<T, GeotrieError>;

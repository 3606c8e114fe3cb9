//! Crate-wide error taxonomy.
//!
//! One enum, used everywhere a fallible operation in this crate can
//! fail, rather than a single ad-hoc `io::Error` wrapped in strings.
//! Callers match on failure kind (an aligner pipeline cares whether a
//! record was truncated vs. malformed), so every kind is a distinct
//! variant rather than a formatted message.

use std::io;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    /// The stream ended inside a known-length field.
    #[error("truncated while reading {0}")]
    Truncated(&'static str),

    /// A file signature did not match the expected magic.
    #[error("bad magic number")]
    BadMagic,

    /// A known format carried an unknown version byte.
    #[error("unsupported format version {0}")]
    UnsupportedVersion(u32),

    /// Structurally recognisable input violating an invariant.
    #[error("malformed {0}")]
    Malformed(&'static str),

    /// A numeric value fell outside its representable domain.
    #[error("value out of range: {0}")]
    OutOfRange(&'static str),

    /// An insertion violated the required reference/position sort order.
    #[error("out-of-order insert: {0}")]
    OrderError(&'static str),

    /// The entity already belongs to a header.
    #[error("entity is already owned by a header")]
    AlreadyOwned,

    /// An insert's key collides with an entity already present.
    #[error("duplicate {0}")]
    DuplicateKey(&'static str),

    /// Removal was attempted from a header that does not own the entity.
    #[error("entity is not owned by this header")]
    NotOwned,

    /// An I/O error surfaced unchanged from the virtual stream.
    #[error(transparent)]
    Io(#[from] io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;

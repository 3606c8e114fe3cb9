//! # A SAM/BAM/CRAM-family alignment record and index library
//!
//! Three tightly coupled subsystems:
//! - the binary alignment record codec ([`codec`]) — a bit-exact
//!   reader/writer for BAM's record layout, packed sequence, CIGAR, and
//!   typed aux tags;
//! - the hierarchical binning index ([`index`]) — BAI (fixed six-level
//!   tree over `2^29`) and CSI (parameterised `(min_shift, depth)`), with
//!   build, query, merge, and on-disk serialization;
//! - the virtual-offset model and chunk algebra ([`vpos`]) — a 48:16
//!   packed coordinate and the chunk-interval merge strategies that glue
//!   the codec to the index.
//!
//! The block-compressed stream itself, SAM text parsing, and CRAM
//! container/slice decoding are external collaborators; this crate
//! consumes only the narrow interfaces described in [`stream`].

pub mod bin;
pub mod codec;
pub mod error;
pub mod header;
pub mod index;
pub mod reader;
pub mod record;
pub mod stream;
pub mod vpos;
pub mod writer;

pub use error::{Error, Result};
pub use header::{GroupOrder, Header, HeaderId, Program, ReadGroup, Reference, SortOrder};
pub use index::{CsiParams, Index, Stats};
pub use reader::Reader;
pub use record::{Flags, Record};
pub use stream::{FileStream, MemoryStream, VirtualStream};
pub use vpos::{Chunk, VirtualPosition};
pub use writer::Writer;

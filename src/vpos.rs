//! Virtual offsets and chunks — the coordinate system shared by the BAM
//! record codec and the binning indices.
//!
//! # Virtual offset
//!
//! A virtual offset packs a position inside a block-compressed stream into
//! a single `u64`:
//!
//! ```text
//!   bit 63                              bit 16 15        bit 0
//!   |-------------------------------------|------------------|
//!   |     file-byte position (48 bits)     | block-local (16) |
//! ```
//!
//! `file` is the byte offset of the compressed block's header in the
//! underlying file; `block` is the byte offset *within* that block's
//! decompressed payload. The virtual stream collaborator owns the actual compression; this crate only ever
//! stores and orders the packed coordinate.
//!
//! Zero is a distinguished "unset" value — never a valid offset produced by
//! a real read or write, since the first byte of the first block is
//! `(file=0, block=0)` only before anything has been read from it.

use std::cmp::Ordering;
use std::io::{self, Read, Write};

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};

/// A packed (file position, block-local position) coordinate.
///
/// Ordered as an unsigned 64-bit integer: `(file << 16) | block`. This
/// matches on-disk BAI/CSI chunk fields, which store virtual offsets as a
/// bare little-endian `u64`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct VirtualPosition(pub u64);

/// The distinguished "unset" virtual offset.
pub const UNSET: VirtualPosition = VirtualPosition(0);

impl VirtualPosition {
    /// Pack a (compressed) file position and a block-local position.
    ///
    /// `block` is truncated to 16 bits — callers must ensure the
    /// decompressed cursor within the current block never exceeds
    /// `u16::MAX`, which the block-compression collaborator guarantees by
    /// construction (its blocks are bounded well under 64 KiB).
    #[inline]
    pub fn new(file: u64, block: u16) -> Self {
        Self((file << 16) | block as u64)
    }

    /// The 48-bit compressed file-byte position.
    #[inline]
    pub fn file_offset(self) -> u64 {
        self.0 >> 16
    }

    /// The 16-bit block-local byte position.
    #[inline]
    pub fn block_offset(self) -> u16 {
        (self.0 & 0xffff) as u16
    }

    #[inline]
    pub fn is_unset(self) -> bool {
        self.0 == 0
    }

    pub fn read<R: Read>(mut r: R) -> io::Result<Self> {
        Ok(Self(r.read_u64::<LittleEndian>()?))
    }

    pub fn write<W: Write>(self, mut w: W) -> io::Result<()> {
        w.write_u64::<LittleEndian>(self.0)
    }
}

impl From<u64> for VirtualPosition {
    fn from(v: u64) -> Self {
        Self(v)
    }
}

impl From<VirtualPosition> for u64 {
    fn from(v: VirtualPosition) -> Self {
        v.0
    }
}

/// `compare(a, b)`: total order on virtual offsets.
///
/// `VirtualPosition` already derives `Ord` over its packed representation,
/// which is exactly this comparison (lexicographic on (file, block)) since
/// `file` occupies the high 48 bits; this free function exists for call
/// sites that want the comparator as a value (e.g. `sort_by`).
pub fn compare(a: VirtualPosition, b: VirtualPosition) -> Ordering {
    a.cmp(&b)
}

// ── Chunk ────────────────────────────────────────────────────────────────────

/// A half-open virtual-offset interval `[begin, end)` covering one or more
/// consecutive alignment records in the stream.
///
/// Invariant: `begin <= end`. Constructors enforce this by swapping rather
/// than rejecting — a chunk is always a valid (possibly empty) interval.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Chunk {
    pub begin: VirtualPosition,
    pub end: VirtualPosition,
}

impl Chunk {
    pub fn new(begin: VirtualPosition, end: VirtualPosition) -> Self {
        if begin <= end {
            Self { begin, end }
        } else {
            Self {
                begin: end,
                end: begin,
            }
        }
    }

    /// Two chunks overlap or touch when one's end reaches into the other's
    /// begin, in either direction.
    pub fn intersects(&self, other: &Chunk) -> bool {
        self.begin <= other.end && other.begin <= self.end
    }
}

impl PartialOrd for Chunk {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Chunk {
    fn cmp(&self, other: &Self) -> Ordering {
        self.begin.cmp(&other.begin).then(self.end.cmp(&other.end))
    }
}

// ── Merge strategies ─────────────────────────────────────────────────────────

/// A pluggable policy for collapsing a sorted chunk list — merging is
/// explicitly non-canonical, so callers choose a strategy rather than
/// relying on one built-in answer. `chunks` is assumed sorted by `begin`
/// on entry; the three canonical strategies all preserve that order on
/// exit.
pub trait MergeStrategy {
    fn merge(&self, chunks: &[Chunk]) -> Vec<Chunk>;
}

/// Emit the input unchanged (no merging).
#[derive(Debug, Clone, Copy, Default)]
pub struct Identity;

impl MergeStrategy for Identity {
    fn merge(&self, chunks: &[Chunk]) -> Vec<Chunk> {
        chunks.to_vec()
    }
}

/// Fuse any two chunks whose intervals overlap or touch
/// (`end_of_a >= begin_of_b`), keeping `(min begin, max end)`. This is the
/// default query-time strategy.
#[derive(Debug, Clone, Copy, Default)]
pub struct FullyMergeOverlaps;

impl MergeStrategy for FullyMergeOverlaps {
    fn merge(&self, chunks: &[Chunk]) -> Vec<Chunk> {
        fuse_where(chunks, |prev, next| next.begin <= prev.end)
    }
}

/// Fuse chunks whose file parts fall within `n` blocks of each other, even
/// if they don't strictly overlap. This is the legacy BAI-reader heuristic
/// generalised to a configurable distance.
#[derive(Debug, Clone, Copy)]
pub struct FuseAdjacentWithinBlocks(pub u64);

impl MergeStrategy for FuseAdjacentWithinBlocks {
    fn merge(&self, chunks: &[Chunk]) -> Vec<Chunk> {
        let n = self.0;
        fuse_where(chunks, |prev, next| {
            next.begin.file_offset().saturating_sub(prev.end.file_offset()) <= n
        })
    }
}

fn fuse_where(chunks: &[Chunk], should_fuse: impl Fn(&Chunk, &Chunk) -> bool) -> Vec<Chunk> {
    let mut out: Vec<Chunk> = Vec::with_capacity(chunks.len());
    for &c in chunks {
        match out.last_mut() {
            Some(prev) if should_fuse(prev, &c) => {
                if c.end > prev.end {
                    prev.end = c.end;
                }
            }
            _ => out.push(c),
        }
    }
    out
}

/// `adjacent(chunks)`: merge pairs whose gap is smaller than the "touching"
/// threshold — i.e. [`FullyMergeOverlaps`] applied once. This is kept
/// distinct from the pluggable [`MergeStrategy`]; it is the default,
/// always-available coalescing pass used after any strategy to pick up
/// newly-adjacent pairs the strategy didn't know to fuse.
pub fn adjacent(chunks: &[Chunk]) -> Vec<Chunk> {
    FullyMergeOverlaps.merge(chunks)
}

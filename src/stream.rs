//! The virtual-stream collaborator interface.
//!
//! The block-compressed stream itself is explicitly out of scope; this module only defines the narrow trait the codec and index
//! consume, plus two conformers simple enough to stand in for it in
//! tests: [`MemoryStream`] (no block boundaries at all — virtual offsets
//! degenerate to `(0, byte_position)`) and [`FileStream`] (wraps any
//! `Read + Write + Seek`, virtual offsets degenerate to `(file_position,
//! 0)`). Neither performs real BGZF-style block compression; that
//! remains an external collaborator's responsibility.

use std::io::{self, Cursor, Read, Seek, SeekFrom, Write};

use crate::vpos::{Chunk, VirtualPosition};

/// Sequential reads/writes, seek-to-virtual-offset, and a "last chunk"
/// query — the complete surface this crate requires of the
/// block-compressed stream layer.
pub trait VirtualStream {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize>;
    fn write(&mut self, buf: &[u8]) -> io::Result<()>;
    fn seek(&mut self, pos: VirtualPosition) -> io::Result<()>;

    /// The virtual begin/end offsets spanned by the most recently
    /// completed read or write.
    fn last_chunk(&self) -> Chunk;
}

/// A stream with no block structure at all: every byte is its own block,
/// so virtual offsets are just `(byte_position, 0)`. Useful for testing
/// the record codec without any compression layer at all.
pub struct MemoryStream {
    cursor: Cursor<Vec<u8>>,
    last_begin: VirtualPosition,
    last_end: VirtualPosition,
}

impl MemoryStream {
    pub fn new() -> Self {
        Self {
            cursor: Cursor::new(Vec::new()),
            last_begin: VirtualPosition::default(),
            last_end: VirtualPosition::default(),
        }
    }

    pub fn from_bytes(bytes: Vec<u8>) -> Self {
        Self {
            cursor: Cursor::new(bytes),
            last_begin: VirtualPosition::default(),
            last_end: VirtualPosition::default(),
        }
    }

    pub fn into_inner(self) -> Vec<u8> {
        self.cursor.into_inner()
    }

    pub fn position(&self) -> u64 {
        self.cursor.position()
    }
}

impl Default for MemoryStream {
    fn default() -> Self {
        Self::new()
    }
}

impl VirtualStream for MemoryStream {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.last_begin = VirtualPosition::new(self.cursor.position(), 0);
        let n = self.cursor.read(buf)?;
        self.last_end = VirtualPosition::new(self.cursor.position(), 0);
        Ok(n)
    }

    fn write(&mut self, buf: &[u8]) -> io::Result<()> {
        self.last_begin = VirtualPosition::new(self.cursor.position(), 0);
        self.cursor.write_all(buf)?;
        self.last_end = VirtualPosition::new(self.cursor.position(), 0);
        Ok(())
    }

    fn seek(&mut self, pos: VirtualPosition) -> io::Result<()> {
        self.cursor.seek(SeekFrom::Start(pos.file_offset()))?;
        Ok(())
    }

    fn last_chunk(&self) -> Chunk {
        Chunk::new(self.last_begin, self.last_end)
    }
}

/// A thin adapter over any `Read + Write + Seek`, for real files without a
/// block-compression layer. Virtual offsets degenerate to `(file_position,
/// 0)`, matching [`MemoryStream`]'s convention.
pub struct FileStream<S> {
    inner: S,
    last_begin: VirtualPosition,
    last_end: VirtualPosition,
}

impl<S: Read + Write + Seek> FileStream<S> {
    pub fn new(inner: S) -> Self {
        Self {
            inner,
            last_begin: VirtualPosition::default(),
            last_end: VirtualPosition::default(),
        }
    }

    pub fn into_inner(self) -> S {
        self.inner
    }
}

impl<S: Read + Write + Seek> VirtualStream for FileStream<S> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let start = self.inner.stream_position()?;
        self.last_begin = VirtualPosition::new(start, 0);
        let n = self.inner.read(buf)?;
        self.last_end = VirtualPosition::new(start + n as u64, 0);
        Ok(n)
    }

    fn write(&mut self, buf: &[u8]) -> io::Result<()> {
        let start = self.inner.stream_position()?;
        self.last_begin = VirtualPosition::new(start, 0);
        self.inner.write_all(buf)?;
        let end = self.inner.stream_position()?;
        self.last_end = VirtualPosition::new(end, 0);
        Ok(())
    }

    fn seek(&mut self, pos: VirtualPosition) -> io::Result<()> {
        self.inner.seek(SeekFrom::Start(pos.file_offset()))?;
        Ok(())
    }

    fn last_chunk(&self) -> Chunk {
        Chunk::new(self.last_begin, self.last_end)
    }
}

//! BAI on-disk serialization.

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use std::io::{Read, Write};

use crate::bin::STATS_BIN;
use crate::error::{Error, Result};
use crate::vpos::{Chunk, VirtualPosition};

use super::{Bin, Index, ReferenceIndex, Regime, Stats};

const MAGIC: [u8; 4] = *b"BAI\x01";

pub fn write<W: Write>(w: &mut W, index: &Index) -> Result<()> {
    w.write_all(&MAGIC)?;
    w.write_i32::<LittleEndian>(index.reference_count() as i32)?;
    for i in 0..index.reference_count() {
        let r = index.reference_at(i).expect("index in range");
        write_reference(w, r)?;
    }
    if let (count, true) = index.unmapped() {
        w.write_u64::<LittleEndian>(count)?;
    }
    Ok(())
}

fn write_reference<W: Write>(w: &mut W, r: &ReferenceIndex) -> Result<()> {
    let n_bin = r.bins().len() + r.stats().is_some() as usize;
    w.write_i32::<LittleEndian>(n_bin as i32)?;
    for bin in r.bins() {
        write_bin(w, bin.id, &bin.chunks)?;
    }
    if let Some(stats) = r.stats() {
        write_stats_bin(w, stats)?;
    }
    w.write_i32::<LittleEndian>(r.intervals().len() as i32)?;
    for &tile in r.intervals() {
        w.write_u64::<LittleEndian>(tile.0)?;
    }
    Ok(())
}

fn write_bin<W: Write>(w: &mut W, id: u32, chunks: &[Chunk]) -> Result<()> {
    w.write_u32::<LittleEndian>(id)?;
    w.write_i32::<LittleEndian>(chunks.len() as i32)?;
    for chunk in chunks {
        w.write_u64::<LittleEndian>(chunk.begin.0)?;
        w.write_u64::<LittleEndian>(chunk.end.0)?;
    }
    Ok(())
}

fn write_stats_bin<W: Write>(w: &mut W, stats: Stats) -> Result<()> {
    w.write_u32::<LittleEndian>(STATS_BIN)?;
    w.write_i32::<LittleEndian>(2)?;
    w.write_u64::<LittleEndian>(stats.chunk.begin.0)?;
    w.write_u64::<LittleEndian>(stats.chunk.end.0)?;
    w.write_u64::<LittleEndian>(stats.mapped)?;
    w.write_u64::<LittleEndian>(stats.unmapped)?;
    Ok(())
}

pub fn read<R: Read>(r: &mut R) -> Result<Index> {
    let mut magic = [0u8; 4];
    r.read_exact(&mut magic).map_err(|_| Error::Truncated("BAI magic"))?;
    if magic != MAGIC {
        return Err(Error::BadMagic);
    }
    let n_ref = r.read_i32::<LittleEndian>().map_err(|_| Error::Truncated("n_ref"))?;
    if n_ref < 0 {
        return Err(Error::OutOfRange("n_ref"));
    }
    let mut references = Vec::with_capacity(n_ref as usize);
    for _ in 0..n_ref {
        references.push(read_reference(r)?);
    }
    let unmapped_file_count = match r.read_u64::<LittleEndian>() {
        Ok(n) => Some(n),
        Err(_) => None,
    };
    Ok(Index::from_parts(Regime::Bai, references, unmapped_file_count))
}

fn read_reference<R: Read>(r: &mut R) -> Result<ReferenceIndex> {
    let n_bin = r.read_i32::<LittleEndian>().map_err(|_| Error::Truncated("n_bin"))?;
    if n_bin < 0 {
        return Err(Error::OutOfRange("n_bin"));
    }
    let mut bins = Vec::new();
    let mut stats = None;
    for _ in 0..n_bin {
        let id = r.read_u32::<LittleEndian>().map_err(|_| Error::Truncated("bin_id"))?;
        let n_chunk = r.read_i32::<LittleEndian>().map_err(|_| Error::Truncated("n_chunk"))?;
        if id == STATS_BIN {
            if n_chunk != 2 {
                return Err(Error::Malformed("sentinel bin chunk count"));
            }
            let begin = VirtualPosition(r.read_u64::<LittleEndian>().map_err(|_| Error::Truncated("stats chunk"))?);
            let end = VirtualPosition(r.read_u64::<LittleEndian>().map_err(|_| Error::Truncated("stats chunk"))?);
            let mapped = r.read_u64::<LittleEndian>().map_err(|_| Error::Truncated("mapped"))?;
            let unmapped = r.read_u64::<LittleEndian>().map_err(|_| Error::Truncated("unmapped"))?;
            stats = Some(Stats {
                chunk: Chunk::new(begin, end),
                mapped,
                unmapped,
            });
        } else {
            if n_chunk < 0 {
                return Err(Error::OutOfRange("n_chunk"));
            }
            let mut chunks = Vec::with_capacity(n_chunk as usize);
            for _ in 0..n_chunk {
                let begin = VirtualPosition(r.read_u64::<LittleEndian>().map_err(|_| Error::Truncated("chunk_begin"))?);
                let end = VirtualPosition(r.read_u64::<LittleEndian>().map_err(|_| Error::Truncated("chunk_end"))?);
                chunks.push(Chunk::new(begin, end));
            }
            let left_offset = chunks.first().map(|c| c.begin).unwrap_or_default();
            bins.push(Bin {
                id,
                record_count: chunks.len() as u64,
                chunks,
                left_offset,
            });
        }
    }
    let n_intervals = r
        .read_i32::<LittleEndian>()
        .map_err(|_| Error::Truncated("n_intervals"))?;
    if n_intervals < 0 {
        return Err(Error::OutOfRange("n_intervals"));
    }
    let mut intervals = Vec::with_capacity(n_intervals as usize);
    for _ in 0..n_intervals {
        intervals.push(VirtualPosition(
            r.read_u64::<LittleEndian>().map_err(|_| Error::Truncated("tile_begin"))?,
        ));
    }
    Ok(ReferenceIndex::new(bins, intervals, stats))
}

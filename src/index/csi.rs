//! CSI on-disk serialization, versions 1 and 2.

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use std::io::{Read, Write};

use crate::bin::STATS_BIN;
use crate::error::{Error, Result};
use crate::vpos::{Chunk, VirtualPosition};

use super::{Bin, CsiParams, Index, ReferenceIndex, Regime, Stats};

const MAGIC: [u8; 3] = *b"CSI";

/// Writes a CSI index. `version` must be 1 or 2; `aux` is the opaque
/// auxiliary blob round-tripped verbatim between the depth field and the
/// per-reference data.
pub fn write<W: Write>(w: &mut W, index: &Index, version: u8, aux: &[u8]) -> Result<()> {
    if version != 1 && version != 2 {
        return Err(Error::UnsupportedVersion(version as u32));
    }
    let params = match index.regime() {
        Regime::Csi(p) => p,
        Regime::Bai => return Err(Error::Malformed("not a CSI index")),
    };
    w.write_all(&MAGIC)?;
    w.write_u8(version)?;
    w.write_i32::<LittleEndian>(params.min_shift as i32)?;
    w.write_i32::<LittleEndian>(params.depth as i32)?;
    w.write_i32::<LittleEndian>(aux.len() as i32)?;
    w.write_all(aux)?;
    w.write_i32::<LittleEndian>(index.reference_count() as i32)?;
    for i in 0..index.reference_count() {
        let r = index.reference_at(i).expect("index in range");
        write_reference(w, r, version)?;
    }
    if let (count, true) = index.unmapped() {
        w.write_u64::<LittleEndian>(count)?;
    }
    Ok(())
}

fn write_reference<W: Write>(w: &mut W, r: &ReferenceIndex, version: u8) -> Result<()> {
    let n_bin = r.bins().len() + r.stats().is_some() as usize;
    w.write_i32::<LittleEndian>(n_bin as i32)?;
    for bin in r.bins() {
        w.write_u32::<LittleEndian>(bin.id)?;
        w.write_u64::<LittleEndian>(bin.left_offset.0)?;
        if version == 2 {
            w.write_u64::<LittleEndian>(bin.record_count)?;
        }
        w.write_i32::<LittleEndian>(bin.chunks.len() as i32)?;
        for chunk in &bin.chunks {
            w.write_u64::<LittleEndian>(chunk.begin.0)?;
            w.write_u64::<LittleEndian>(chunk.end.0)?;
        }
    }
    if let Some(stats) = r.stats() {
        write_stats_bin(w, stats, version)?;
    }
    Ok(())
}

fn write_stats_bin<W: Write>(w: &mut W, stats: Stats, version: u8) -> Result<()> {
    w.write_u32::<LittleEndian>(STATS_BIN)?;
    w.write_u64::<LittleEndian>(0)?; // left_offset is meaningless for the sentinel bin.
    if version == 2 {
        w.write_u64::<LittleEndian>(0)?;
    }
    w.write_i32::<LittleEndian>(2)?;
    w.write_u64::<LittleEndian>(stats.chunk.begin.0)?;
    w.write_u64::<LittleEndian>(stats.chunk.end.0)?;
    w.write_u64::<LittleEndian>(stats.mapped)?;
    w.write_u64::<LittleEndian>(stats.unmapped)?;
    Ok(())
}

/// Reads a CSI index of either version, rejecting any other version byte.
pub fn read<R: Read>(r: &mut R) -> Result<(Index, u8, Vec<u8>)> {
    let mut magic = [0u8; 3];
    r.read_exact(&mut magic).map_err(|_| Error::Truncated("CSI magic"))?;
    if magic != MAGIC {
        return Err(Error::BadMagic);
    }
    let version = r.read_u8().map_err(|_| Error::Truncated("CSI version"))?;
    if version != 1 && version != 2 {
        return Err(Error::UnsupportedVersion(version as u32));
    }
    let min_shift = r.read_i32::<LittleEndian>().map_err(|_| Error::Truncated("min_shift"))?;
    let depth = r.read_i32::<LittleEndian>().map_err(|_| Error::Truncated("depth"))?;
    let l_aux = r.read_i32::<LittleEndian>().map_err(|_| Error::Truncated("l_aux"))?;
    if l_aux < 0 {
        return Err(Error::OutOfRange("l_aux"));
    }
    let mut aux = vec![0u8; l_aux as usize];
    r.read_exact(&mut aux).map_err(|_| Error::Truncated("aux"))?;

    let n_ref = r.read_i32::<LittleEndian>().map_err(|_| Error::Truncated("n_ref"))?;
    if n_ref < 0 {
        return Err(Error::OutOfRange("n_ref"));
    }
    let mut references = Vec::with_capacity(n_ref as usize);
    for _ in 0..n_ref {
        references.push(read_reference(r, version)?);
    }
    let unmapped_file_count = r.read_u64::<LittleEndian>().ok();

    let params = CsiParams {
        min_shift: min_shift as u32,
        depth: depth as u32,
    };
    let index = Index::from_parts(Regime::Csi(params), references, unmapped_file_count);
    Ok((index, version, aux))
}

fn read_reference<R: Read>(r: &mut R, version: u8) -> Result<ReferenceIndex> {
    let n_bin = r.read_i32::<LittleEndian>().map_err(|_| Error::Truncated("n_bin"))?;
    if n_bin < 0 {
        return Err(Error::OutOfRange("n_bin"));
    }
    let mut bins = Vec::new();
    let mut stats = None;
    for _ in 0..n_bin {
        let id = r.read_u32::<LittleEndian>().map_err(|_| Error::Truncated("bin_id"))?;
        let left_offset = VirtualPosition(
            r.read_u64::<LittleEndian>().map_err(|_| Error::Truncated("left_offset"))?,
        );
        let record_count = if version == 2 {
            r.read_u64::<LittleEndian>().map_err(|_| Error::Truncated("record_count"))?
        } else {
            0
        };
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
            bins.push(Bin {
                id,
                chunks,
                left_offset,
                record_count,
            });
        }
    }
    Ok(ReferenceIndex::new(bins, Vec::new(), stats))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::cigar::{Cigar, Kind, Op};
    use crate::record::{Flags, Record, Sequence, NO_REFERENCE};
    use std::io::Cursor;

    fn placed_record(pos: i32, len: u32) -> Record {
        Record {
            name: "r".into(),
            ref_id: 0,
            pos,
            mapq: 40,
            cigar: Cigar::new(vec![Op::new(len, Kind::Match)]),
            flags: Flags::default(),
            next_ref_id: NO_REFERENCE,
            next_pos: -1,
            tlen: 0,
            seq: Sequence::default(),
            qual: None,
            aux: Vec::new(),
        }
    }

    #[test]
    fn csi_v2_round_trips_with_aux_blob() {
        let mut idx = Index::new_csi(CsiParams::default());
        idx.add(
            &placed_record(62914560, 6291456),
            Chunk::new(VirtualPosition::new(100, 0), VirtualPosition::new(228, 0)),
        )
        .unwrap();

        let mut buf = Vec::new();
        write(&mut buf, &idx, 2, b"opaque").unwrap();

        let mut cur = Cursor::new(buf);
        let (mut decoded, version, aux) = read(&mut cur).unwrap();
        assert_eq!(version, 2);
        assert_eq!(aux, b"opaque");
        assert!(!decoded.chunks(0, 62914560, 62914560 + 6291456).is_empty());
    }

    #[test]
    fn unknown_version_is_rejected() {
        let idx = Index::new_csi(CsiParams::default());
        assert!(matches!(
            write(&mut Vec::new(), &idx, 3, b""),
            Err(Error::UnsupportedVersion(3))
        ));
    }

    #[test]
    fn bad_magic_is_rejected() {
        let mut cur = Cursor::new(b"NOPE".to_vec());
        assert!(matches!(read(&mut cur), Err(Error::BadMagic)));
    }
}

//! Bit-exact BAM record decode/encode.
//!
//! Matches the BAM wire layout field-for-field, the same fixed 32-byte
//! prefix `noodles-bam`'s `writer::record` module emits via
//! `byteorder::{LittleEndian, WriteBytesExt}` before the variable-length
//! name/cigar/seq/qual/aux regions.

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use std::io::{Cursor, Read, Seek, SeekFrom, Write};

use crate::error::{Error, Result};
use crate::header::Header;
use crate::record::cigar::{Cigar, Op};
use crate::record::data::Field;
use crate::record::{Flags, Record, Sequence, NO_REFERENCE};

const FIXED_FIELDS_LEN: usize = 32;

fn check_ref_id(ref_id: i32, header: &Header) -> Result<()> {
    if ref_id == NO_REFERENCE {
        return Ok(());
    }
    if ref_id < 0 || ref_id as usize >= header.refs().len() {
        return Err(Error::OutOfRange("refID"));
    }
    Ok(())
}

/// Categories of variable-length record payload that a streaming reader
/// may skip decoding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Omit(pub u8);

impl Omit {
    pub const NONE: Omit = Omit(0);
    pub const NAME: u8 = 0x1;
    pub const CIGAR: u8 = 0x2;
    pub const SEQ: u8 = 0x4;
    pub const QUAL: u8 = 0x8;
    pub const AUX: u8 = 0x10;

    pub fn has(self, bit: u8) -> bool {
        self.0 & bit != 0
    }
}

/// Attempts to read just the leading `block_size` word. Any failure here
/// — including a clean end of stream — is reported to callers as `None`
/// rather than an error, since an empty read is not distinguishable from
/// a truncated one at this boundary and streaming readers treat "nothing
/// left to pull" as their own sentinel.
pub fn try_read_block_size<R: Read>(r: &mut R) -> Option<u32> {
    r.read_u32::<LittleEndian>().ok()
}

/// Reads one record, preceded by its `block_size` prefix, validating
/// reference pointers against `header`.
pub fn read_record<R: Read>(r: &mut R, header: &Header) -> Result<Record> {
    let block_size = r
        .read_u32::<LittleEndian>()
        .map_err(|_| Error::Truncated("block_size"))?;
    read_record_body(r, header, block_size, Omit::NONE)
}

/// Reads one record body (the bytes after `block_size`), honouring
/// `omit` by skipping allocation of the corresponding fields.
pub fn read_record_body<R: Read>(r: &mut R, header: &Header, block_size: u32, omit: Omit) -> Result<Record> {
    let mut body = vec![0u8; block_size as usize];
    r.read_exact(&mut body).map_err(|_| Error::Truncated("record body"))?;
    let mut cur = Cursor::new(body);

    let ref_id = cur.read_i32::<LittleEndian>().map_err(|_| Error::Truncated("refID"))?;
    let pos = cur.read_i32::<LittleEndian>().map_err(|_| Error::Truncated("pos"))?;
    let name_len = cur.read_u8().map_err(|_| Error::Truncated("name_len"))?;
    let mapq = cur.read_u8().map_err(|_| Error::Truncated("mapQ"))?;
    let _bin = cur.read_u16::<LittleEndian>().map_err(|_| Error::Truncated("bin"))?;
    let n_cigar = cur.read_u16::<LittleEndian>().map_err(|_| Error::Truncated("n_cigar"))?;
    let flags = cur.read_u16::<LittleEndian>().map_err(|_| Error::Truncated("flags"))?;
    let l_seq = cur.read_u32::<LittleEndian>().map_err(|_| Error::Truncated("l_seq"))?;
    let next_ref_id = cur
        .read_i32::<LittleEndian>()
        .map_err(|_| Error::Truncated("next_refID"))?;
    let next_pos = cur
        .read_i32::<LittleEndian>()
        .map_err(|_| Error::Truncated("next_pos"))?;
    let tlen = cur.read_i32::<LittleEndian>().map_err(|_| Error::Truncated("tlen"))?;

    check_ref_id(ref_id, header)?;
    check_ref_id(next_ref_id, header)?;

    if name_len == 0 {
        return Err(Error::Malformed("empty read name"));
    }
    let name = if omit.has(Omit::NAME) {
        cur.seek(SeekFrom::Current(name_len as i64))
            .map_err(|_| Error::Truncated("read_name"))?;
        String::new()
    } else {
        let mut name_bytes = vec![0u8; name_len as usize];
        cur.read_exact(&mut name_bytes).map_err(|_| Error::Truncated("read_name"))?;
        if name_bytes.pop() != Some(0) {
            return Err(Error::Malformed("read name not null-terminated"));
        }
        if name_bytes.is_empty() {
            return Err(Error::Malformed("empty read name"));
        }
        String::from_utf8(name_bytes).map_err(|_| Error::Malformed("read name not ascii"))?
    };

    let ops = if omit.has(Omit::CIGAR) {
        cur.seek(SeekFrom::Current(4 * n_cigar as i64))
            .map_err(|_| Error::Truncated("cigar"))?;
        Vec::new()
    } else {
        let mut ops = Vec::with_capacity(n_cigar as usize);
        for _ in 0..n_cigar {
            let word = cur
                .read_u32::<LittleEndian>()
                .map_err(|_| Error::Truncated("cigar"))?;
            ops.push(Op::decode(word)?);
        }
        ops
    };

    let packed_len = (l_seq as usize).div_ceil(2);
    let seq = if omit.has(Omit::SEQ) {
        cur.seek(SeekFrom::Current(packed_len as i64))
            .map_err(|_| Error::Truncated("seq"))?;
        Sequence::from_packed(l_seq as usize, Vec::new())
    } else {
        let mut packed = vec![0u8; packed_len];
        cur.read_exact(&mut packed).map_err(|_| Error::Truncated("seq"))?;
        Sequence::from_packed(l_seq as usize, packed)
    };

    let qual = if omit.has(Omit::QUAL) {
        cur.seek(SeekFrom::Current(l_seq as i64))
            .map_err(|_| Error::Truncated("qual"))?;
        None
    } else {
        let mut qual_bytes = vec![0u8; l_seq as usize];
        cur.read_exact(&mut qual_bytes).map_err(|_| Error::Truncated("qual"))?;
        if l_seq > 0 && !qual_bytes.iter().all(|&b| b == 0xff) {
            Some(qual_bytes)
        } else {
            None
        }
    };

    let consumed = cur.position() as usize;
    let aux_bytes = cur.into_inner();
    let aux = if omit.has(Omit::AUX) {
        Vec::new()
    } else {
        parse_aux(&aux_bytes[consumed..])?
    };

    Ok(Record {
        name,
        ref_id,
        pos,
        mapq,
        cigar: Cigar::new(ops),
        flags: Flags(flags),
        next_ref_id,
        next_pos,
        tlen,
        seq,
        qual,
        aux,
    })
}

fn aux_field_len(kind: u8, bytes: &[u8]) -> Result<usize> {
    Ok(match kind {
        b'A' | b'c' | b'C' => 1,
        b's' | b'S' => 2,
        b'i' | b'I' | b'f' => 4,
        b'Z' | b'H' => bytes
            .iter()
            .position(|&b| b == 0)
            .map(|p| p + 1)
            .ok_or(Error::Malformed("aux text missing terminator"))?,
        b'B' => {
            if bytes.len() < 5 {
                return Err(Error::Malformed("aux array header truncated"));
            }
            let subtype = bytes[0];
            let count = u32::from_le_bytes([bytes[1], bytes[2], bytes[3], bytes[4]]) as usize;
            let elem = match subtype {
                b'c' | b'C' => 1,
                b's' | b'S' => 2,
                b'i' | b'I' | b'f' => 4,
                _ => return Err(Error::Malformed("unknown aux array subtype")),
            };
            5 + count * elem
        }
        _ => return Err(Error::Malformed("unknown aux type code")),
    })
}

fn parse_aux(bytes: &[u8]) -> Result<Vec<Field>> {
    let mut fields = Vec::new();
    let mut i = 0;
    while i < bytes.len() {
        if bytes.len() - i < 3 {
            return Err(Error::Malformed("aux field header truncated"));
        }
        let kind = bytes[i + 2];
        let payload_len = aux_field_len(kind, &bytes[i + 3..])?;
        let end = i + 3 + payload_len;
        if end > bytes.len() {
            return Err(Error::Malformed("aux field payload exceeds buffer"));
        }
        fields.push(Field::from_bytes(bytes[i..end].to_vec()));
        i = end;
    }
    Ok(fields)
}

/// Encodes one record, writing its `block_size` prefix followed by the
/// fixed and variable-length regions in wire order.
pub fn write_record<W: Write>(w: &mut W, record: &Record, header: &Header) -> Result<()> {
    if record.name.is_empty() || record.name.len() > 254 {
        return Err(Error::OutOfRange("name length"));
    }
    if let Some(qual) = &record.qual {
        if !qual.is_empty() && qual.len() != record.seq.len() {
            return Err(Error::Malformed("quality length mismatch"));
        }
    }
    check_ref_id(record.ref_id, header)?;
    check_ref_id(record.next_ref_id, header)?;

    let mut body = Vec::with_capacity(FIXED_FIELDS_LEN + record.name.len() + 1);
    body.write_i32::<LittleEndian>(record.ref_id).expect("vec write");
    body.write_i32::<LittleEndian>(record.pos).expect("vec write");
    body.push(record.name.len() as u8 + 1);
    body.push(record.mapq);
    body.write_u16::<LittleEndian>(record.bin() as u16).expect("vec write");
    body.write_u16::<LittleEndian>(record.cigar.ops().len() as u16)
        .expect("vec write");
    body.write_u16::<LittleEndian>(record.flags.0).expect("vec write");
    body.write_u32::<LittleEndian>(record.seq.len() as u32)
        .expect("vec write");
    body.write_i32::<LittleEndian>(record.next_ref_id).expect("vec write");
    body.write_i32::<LittleEndian>(record.next_pos).expect("vec write");
    body.write_i32::<LittleEndian>(record.tlen).expect("vec write");
    body.extend_from_slice(record.name.as_bytes());
    body.push(0);
    for op in record.cigar.ops() {
        body.write_u32::<LittleEndian>(op.encode()).expect("vec write");
    }
    body.extend_from_slice(record.seq.packed_bytes());
    match &record.qual {
        Some(qual) if !qual.is_empty() => body.extend_from_slice(qual),
        _ => body.extend(std::iter::repeat(0xffu8).take(record.seq.len())),
    }
    for field in &record.aux {
        body.extend_from_slice(field.as_bytes());
    }

    let mut framed = Vec::with_capacity(4 + body.len());
    framed.write_u32::<LittleEndian>(body.len() as u32).expect("vec write");
    framed.extend_from_slice(&body);
    w.write_all(&framed)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::header::Reference;
    use crate::record::cigar::Kind;

    fn header_with_one_ref() -> Header {
        let mut h = Header::new();
        h.add_reference(Reference::new("chr1", 1000)).unwrap();
        h
    }

    fn sample_record() -> Record {
        Record {
            name: "read1".into(),
            ref_id: 0,
            pos: 100,
            mapq: 40,
            cigar: Cigar::new(vec![Op::new(5, Kind::Match)]),
            flags: Flags::default(),
            next_ref_id: NO_REFERENCE,
            next_pos: -1,
            tlen: 0,
            seq: Sequence::pack(b"ACGTA"),
            qual: Some(vec![30, 31, 32, 33, 34]),
            aux: vec![Field::new([b'N', b'M'], crate::record::data::Input::Int(0)).unwrap()],
        }
    }

    #[test]
    fn record_round_trips() {
        let header = header_with_one_ref();
        let record = sample_record();
        let mut buf = Vec::new();
        write_record(&mut buf, &record, &header).unwrap();

        let mut cur = Cursor::new(buf);
        let decoded = read_record(&mut cur, &header).unwrap();
        assert_eq!(decoded.name, record.name);
        assert_eq!(decoded.pos, record.pos);
        assert_eq!(decoded.seq.expand(), record.seq.expand());
        assert_eq!(decoded.qual, record.qual);
        assert_eq!(decoded.aux.len(), 1);
        assert_eq!(decoded.aux[0].tag(), [b'N', b'M']);
    }

    #[test]
    fn absent_quality_round_trips_as_0xff_fill() {
        let header = header_with_one_ref();
        let mut record = sample_record();
        record.qual = None;
        let mut buf = Vec::new();
        write_record(&mut buf, &record, &header).unwrap();

        let mut cur = Cursor::new(buf);
        let decoded = read_record(&mut cur, &header).unwrap();
        assert_eq!(decoded.qual, None);
    }

    #[test]
    fn out_of_range_ref_id_is_rejected_on_write() {
        let header = header_with_one_ref();
        let mut record = sample_record();
        record.ref_id = 5;
        assert!(matches!(
            write_record(&mut Vec::new(), &record, &header),
            Err(Error::OutOfRange(_))
        ));
    }

    #[test]
    fn empty_name_is_rejected_on_write() {
        let header = header_with_one_ref();
        let mut record = sample_record();
        record.name = String::new();
        assert!(matches!(
            write_record(&mut Vec::new(), &record, &header),
            Err(Error::OutOfRange(_))
        ));
    }

    #[test]
    fn omitted_fields_decode_to_defaults() {
        let header = header_with_one_ref();
        let record = sample_record();
        let mut buf = Vec::new();
        write_record(&mut buf, &record, &header).unwrap();

        let mut cur = Cursor::new(buf);
        let block_size = try_read_block_size(&mut cur).unwrap();
        let decoded =
            read_record_body(&mut cur, &header, block_size, Omit(Omit::NAME | Omit::AUX)).unwrap();
        assert_eq!(decoded.name, "");
        assert!(decoded.aux.is_empty());
        assert_eq!(decoded.pos, record.pos);
        assert_eq!(decoded.cigar.ops(), record.cigar.ops());
    }

    #[test]
    fn truncated_block_is_reported() {
        let header = header_with_one_ref();
        let mut cur = Cursor::new(vec![10, 0, 0, 0, 1, 2]);
        assert!(matches!(
            read_record(&mut cur, &header),
            Err(Error::Truncated(_))
        ));
    }
}

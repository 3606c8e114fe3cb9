//! Streaming reader: pull-next-record-with-chunk and seek-to-chunk.

use crate::codec::{read_record_body, try_read_block_size, Omit};
use crate::error::Result;
use crate::header::Header;
use crate::record::Record;
use crate::stream::VirtualStream;
use crate::vpos::Chunk;

/// Adapts any [`VirtualStream`] to `std::io::Read` — the two signatures
/// already coincide.
struct Adapter<'a, S>(&'a mut S);

impl<'a, S: VirtualStream> std::io::Read for Adapter<'a, S> {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        self.0.read(buf)
    }
}

/// Reads BAM records one at a time from a [`VirtualStream`], reporting
/// each record's spanning [`Chunk`] alongside it.
pub struct Reader<S> {
    stream: S,
    header: Header,
    omit: Omit,
}

impl<S: VirtualStream> Reader<S> {
    pub fn new(stream: S, header: Header) -> Self {
        Self {
            stream,
            header,
            omit: Omit::NONE,
        }
    }

    pub fn with_omit(mut self, omit: Omit) -> Self {
        self.omit = omit;
        self
    }

    pub fn header(&self) -> &Header {
        &self.header
    }

    pub fn into_inner(self) -> S {
        self.stream
    }

    /// Pulls the next record and its chunk, or `None` at a clean end of
    /// stream.
    pub fn next_record(&mut self) -> Result<Option<(Record, Chunk)>> {
        let block_size = {
            let mut adapter = Adapter(&mut self.stream);
            match try_read_block_size(&mut adapter) {
                Some(size) => size,
                None => return Ok(None),
            }
        };
        let record = {
            let mut adapter = Adapter(&mut self.stream);
            read_record_body(&mut adapter, &self.header, block_size, self.omit)?
        };
        Ok(Some((record, self.stream.last_chunk())))
    }

    /// Seeks to `chunk.begin` and reads records until one whose span
    /// reaches `chunk.end`.
    pub fn read_chunk(&mut self, chunk: Chunk) -> Result<Vec<Record>> {
        self.stream.seek(chunk.begin)?;
        let mut records = Vec::new();
        while let Some((record, span)) = self.next_record()? {
            records.push(record);
            if span.end >= chunk.end {
                break;
            }
        }
        Ok(records)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::write_record;
    use crate::header::Reference;
    use crate::record::cigar::{Cigar, Kind, Op};
    use crate::record::{Flags, Sequence, NO_REFERENCE};
    use crate::stream::MemoryStream;

    fn sample_header() -> Header {
        let mut h = Header::new();
        h.add_reference(Reference::new("chr1", 1000)).unwrap();
        h
    }

    fn sample_record(name: &str, pos: i32) -> Record {
        Record {
            name: name.into(),
            ref_id: 0,
            pos,
            mapq: 40,
            cigar: Cigar::new(vec![Op::new(4, Kind::Match)]),
            flags: Flags::default(),
            next_ref_id: NO_REFERENCE,
            next_pos: -1,
            tlen: 0,
            seq: Sequence::pack(b"ACGT"),
            qual: None,
            aux: Vec::new(),
        }
    }

    #[test]
    fn pulls_records_in_order_and_then_ends() {
        let header = sample_header();
        let mut buf = Vec::new();
        write_record(&mut buf, &sample_record("r1", 10), &header).unwrap();
        write_record(&mut buf, &sample_record("r2", 20), &header).unwrap();

        let mut reader = Reader::new(MemoryStream::from_bytes(buf), header);
        let (r1, _) = reader.next_record().unwrap().unwrap();
        assert_eq!(r1.name, "r1");
        let (r2, _) = reader.next_record().unwrap().unwrap();
        assert_eq!(r2.name, "r2");
        assert!(reader.next_record().unwrap().is_none());
    }

    #[test]
    fn omit_produces_empty_name_and_aux() {
        let header = sample_header();
        let mut buf = Vec::new();
        write_record(&mut buf, &sample_record("r1", 10), &header).unwrap();

        let mut reader =
            Reader::new(MemoryStream::from_bytes(buf), header).with_omit(Omit(Omit::NAME));
        let (record, _) = reader.next_record().unwrap().unwrap();
        assert_eq!(record.name, "");
        assert_eq!(record.pos, 10);
    }
}

//! Streaming writer: serializes the header once, then records one at a
//! time, reporting each record's observed chunk.

use crate::codec::{write_header, write_record};
use crate::error::Result;
use crate::header::Header;
use crate::record::Record;
use crate::stream::VirtualStream;
use crate::vpos::Chunk;

struct Adapter<'a, S>(&'a mut S);

impl<'a, S: VirtualStream> std::io::Write for Adapter<'a, S> {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.0.write(buf)?;
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

pub struct Writer<S> {
    stream: S,
    header: Header,
}

impl<S: VirtualStream> Writer<S> {
    /// Writes the BAM header framing immediately, then returns a writer
    /// ready to accept records.
    pub fn new(mut stream: S, header: Header, text: &str) -> Result<Self> {
        {
            let mut adapter = Adapter(&mut stream);
            write_header(&mut adapter, text, &header)?;
        }
        Ok(Self { stream, header })
    }

    pub fn header(&self) -> &Header {
        &self.header
    }

    pub fn into_inner(self) -> S {
        self.stream
    }

    /// Serializes one record and returns the chunk the stream reports for
    /// it.
    pub fn write_record(&mut self, record: &Record) -> Result<Chunk> {
        let mut adapter = Adapter(&mut self.stream);
        write_record(&mut adapter, record, &self.header)?;
        Ok(self.stream.last_chunk())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::header::Reference;
    use crate::reader::Reader;
    use crate::record::cigar::{Cigar, Kind, Op};
    use crate::record::{Flags, Sequence, NO_REFERENCE};
    use crate::stream::MemoryStream;

    #[test]
    fn writer_then_reader_round_trips_through_header() {
        let mut header = Header::new();
        header.add_reference(Reference::new("chr1", 1000)).unwrap();

        let mut writer = Writer::new(MemoryStream::new(), header, "@HD\tVN:1.6\n").unwrap();
        let record = Record {
            name: "r1".into(),
            ref_id: 0,
            pos: 5,
            mapq: 30,
            cigar: Cigar::new(vec![Op::new(4, Kind::Match)]),
            flags: Flags::default(),
            next_ref_id: NO_REFERENCE,
            next_pos: -1,
            tlen: 0,
            seq: Sequence::pack(b"ACGT"),
            qual: None,
            aux: Vec::new(),
        };
        let chunk = writer.write_record(&record).unwrap();
        assert!(chunk.begin < chunk.end);

        let bytes = writer.into_inner().into_inner();
        let mut cur = std::io::Cursor::new(bytes);
        let (_, header) = crate::codec::read_header(&mut cur).unwrap();
        let mut reader = Reader::new(MemoryStream::from_bytes({
            let mut rest = Vec::new();
            std::io::Read::read_to_end(&mut cur, &mut rest).unwrap();
            rest
        }), header);
        let (decoded, _) = reader.next_record().unwrap().unwrap();
        assert_eq!(decoded.name, "r1");
    }

    fn sample_record(name: &str, pos: i32) -> Record {
        Record {
            name: name.into(),
            ref_id: 0,
            pos,
            mapq: 30,
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
    fn write_record_reports_a_chunk_starting_at_the_record_itself() {
        let mut header = Header::new();
        header.add_reference(Reference::new("chr1", 1000)).unwrap();
        let header_len = {
            let mut probe = Vec::new();
            crate::codec::write_header(&mut probe, "@HD\tVN:1.6\n", &header).unwrap();
            probe.len() as u64
        };

        let mut writer = Writer::new(MemoryStream::new(), header, "@HD\tVN:1.6\n").unwrap();
        let chunk = writer.write_record(&sample_record("r1", 5)).unwrap();

        assert_eq!(chunk.begin.file_offset(), header_len);
    }

    #[test]
    fn read_chunk_recovers_the_second_of_two_records() {
        let mut header = Header::new();
        header.add_reference(Reference::new("chr1", 1000)).unwrap();

        let mut writer = Writer::new(MemoryStream::new(), header, "@HD\tVN:1.6\n").unwrap();
        let _ = writer.write_record(&sample_record("r1", 5)).unwrap();
        let second_chunk = writer.write_record(&sample_record("r2", 9)).unwrap();

        let header = writer.header().clone();
        let stream = writer.into_inner();
        let mut reader = Reader::new(stream, header);
        let records = reader.read_chunk(second_chunk).unwrap();

        assert_eq!(records.len(), 1);
        assert_eq!(records[0].name, "r2");
    }
}

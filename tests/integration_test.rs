use bamidx::header::Reference;
use bamidx::index::{CsiParams, Index};
use bamidx::record::cigar::{Cigar, Kind, Op};
use bamidx::record::{Flags, Record, Sequence, NO_REFERENCE};
use bamidx::{Chunk, FileStream, Header, MemoryStream, Reader, VirtualPosition, Writer};
use std::io::{Cursor, Seek, SeekFrom};

fn placed_record(name: &str, pos: i32, len: u32) -> Record {
    Record {
        name: name.into(),
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
fn writer_reader_and_index_round_trip_a_small_stream() {
    let mut header = Header::new();
    header.add_reference(Reference::new("chr1", 248_956_422)).unwrap();

    let mut writer = Writer::new(MemoryStream::new(), header, "@HD\tVN:1.6\tSO:coordinate\n").unwrap();

    let mut index = Index::new_bai();
    for (name, pos, len) in [("r1", 100, 50u32), ("r2", 200, 50u32), ("r3", 500, 50u32)] {
        let record = placed_record(name, pos, len);
        let chunk = writer.write_record(&record).unwrap();
        index.add(&record, chunk).unwrap();
    }

    let bytes = writer.into_inner().into_inner();
    let mut cur = Cursor::new(bytes);
    let (_text, header) = bamidx::codec::read_header(&mut cur).unwrap();
    let mut rest = Vec::new();
    std::io::Read::read_to_end(&mut cur, &mut rest).unwrap();

    let mut reader = Reader::new(MemoryStream::from_bytes(rest), header);
    let mut names = Vec::new();
    while let Some((record, _)) = reader.next_record().unwrap() {
        names.push(record.name);
    }
    assert_eq!(names, vec!["r1", "r2", "r3"]);

    let chunks = index.chunks(0, 190, 260);
    assert!(!chunks.is_empty());
    let stats = index.reference_stats(0).unwrap();
    assert_eq!(stats.mapped, 3);
}

#[test]
fn conceptual_csi_example_matches_published_scenario() {
    let mut index = Index::new_csi(CsiParams { min_shift: 14, depth: 5 });

    let positions = [62_914_560i32, 73_400_320, 76_546_048];
    let len = 6_291_456u32;
    let mut expected_chunk = None;
    for (i, &pos) in positions.iter().enumerate() {
        let record = placed_record(&format!("r{i}"), pos, len);
        let begin = VirtualPosition::new(101, 0);
        let end = VirtualPosition::new(228, 0);
        let chunk = Chunk::new(begin, end);
        index.add(&record, chunk).unwrap();
        expected_chunk = Some(chunk);
    }

    let chunks = index.chunks(0, 77_594_624, 80_740_352);
    assert_eq!(chunks.len(), 1);
    assert_eq!(chunks[0], expected_chunk.unwrap());

    let stats = index.reference_stats(0).unwrap();
    assert_eq!(stats.mapped, 3);
    assert_eq!(stats.unmapped, 0);

    // No unplaced or unmapped record was ever fed in, so the file-level
    // unmapped count is still unknown rather than zero.
    assert_eq!(index.unmapped(), (0, false));
}

#[test]
fn bai_serialization_preserves_query_results_across_reload() {
    let mut index = Index::new_bai();
    let record = placed_record("r1", 1000, 100);
    index
        .add(&record, Chunk::new(VirtualPosition::new(0, 0), VirtualPosition::new(50, 0)))
        .unwrap();

    let mut buf = Vec::new();
    bamidx::index::bai::write(&mut buf, &index).unwrap();

    let mut cur = Cursor::new(buf);
    let mut reloaded = bamidx::index::bai::read(&mut cur).unwrap();
    assert_eq!(index.chunks(0, 1000, 1100), reloaded.chunks(0, 1000, 1100));
}

#[test]
fn unmapped_records_bypass_order_enforcement() {
    let mut index = Index::new_bai();
    let placed = placed_record("r1", 1000, 10);
    index
        .add(&placed, Chunk::new(VirtualPosition::new(0, 0), VirtualPosition::new(10, 0)))
        .unwrap();

    let mut unmapped = placed_record("r2", -1, 0);
    unmapped.ref_id = NO_REFERENCE;
    unmapped.flags.set(Flags::UNMAPPED, true);
    let result = index.add(
        &unmapped,
        Chunk::new(VirtualPosition::new(10, 0), VirtualPosition::new(20, 0)),
    );
    assert!(result.is_ok());

    let (count, _) = index.unmapped();
    assert_eq!(count, 1);
}

#[test]
fn records_round_trip_through_a_real_seekable_file() {
    let mut header = Header::new();
    header.add_reference(Reference::new("chr1", 1000)).unwrap();

    let file = tempfile::tempfile().unwrap();
    let mut writer = Writer::new(FileStream::new(file), header, "@HD\tVN:1.6\n").unwrap();

    let r1 = placed_record("a", 10, 20);
    let r2 = placed_record("b", 40, 20);
    let c1 = writer.write_record(&r1).unwrap();
    let c2 = writer.write_record(&r2).unwrap();
    assert!(c2.begin >= c1.end);

    let mut file = writer.into_inner().into_inner();
    file.seek(SeekFrom::Start(0)).unwrap();
    let (_text, header) = bamidx::codec::read_header(&mut file).unwrap();

    let mut reader = Reader::new(FileStream::new(file), header);
    let (got1, _) = reader.next_record().unwrap().unwrap();
    let (got2, _) = reader.next_record().unwrap().unwrap();
    assert_eq!(got1.name, "a");
    assert_eq!(got2.name, "b");
    assert!(reader.next_record().unwrap().is_none());
}

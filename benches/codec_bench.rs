use bamidx::header::Reference;
use bamidx::index::Index;
use bamidx::record::cigar::{Cigar, Kind, Op};
use bamidx::record::{Flags, Record, Sequence, NO_REFERENCE};
use bamidx::{Chunk, Header, VirtualPosition};
use criterion::{black_box, criterion_group, criterion_main, Criterion};

fn sample_header() -> Header {
    let mut h = Header::new();
    h.add_reference(Reference::new("chr1", 248_956_422)).unwrap();
    h
}

fn sample_record(pos: i32) -> Record {
    Record {
        name: "read".into(),
        ref_id: 0,
        pos,
        mapq: 40,
        cigar: Cigar::new(vec![Op::new(100, Kind::Match)]),
        flags: Flags::default(),
        next_ref_id: NO_REFERENCE,
        next_pos: -1,
        tlen: 0,
        seq: Sequence::pack(&b"ACGT".repeat(25)),
        qual: Some(vec![30; 100]),
        aux: Vec::new(),
    }
}

fn bench_record_codec(c: &mut Criterion) {
    let header = sample_header();
    let record = sample_record(1000);
    let mut buf = Vec::new();
    bamidx::codec::write_record(&mut buf, &record, &header).unwrap();

    c.bench_function("write_record", |b| {
        b.iter(|| {
            let mut out = Vec::new();
            bamidx::codec::write_record(&mut out, black_box(&record), &header).unwrap();
            out
        })
    });

    c.bench_function("read_record", |b| {
        b.iter(|| {
            let mut cur = std::io::Cursor::new(black_box(buf.clone()));
            bamidx::codec::read_record(&mut cur, &header).unwrap()
        })
    });
}

fn bench_index_query(c: &mut Criterion) {
    let mut index = Index::new_bai();
    for i in 0..10_000u32 {
        let pos = (i * 150) as i32;
        let record = sample_record(pos);
        let chunk = Chunk::new(
            VirtualPosition::new((i as u64) * 200, 0),
            VirtualPosition::new((i as u64) * 200 + 150, 0),
        );
        index.add(&record, chunk).unwrap();
    }

    c.bench_function("bai_chunks_query", |b| {
        b.iter(|| index.chunks(black_box(0), black_box(500_000), black_box(505_000)))
    });
}

criterion_group!(benches, bench_record_codec, bench_index_query);
criterion_main!(benches);

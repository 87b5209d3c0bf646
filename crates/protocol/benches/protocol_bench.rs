use bytes::{Bytes, BytesMut};
use criterion::{Criterion, black_box, criterion_group, criterion_main};

use filadb_protocol::{Command, Frame};

fn encode(frame: &Frame) -> Bytes {
    let mut buf = BytesMut::new();
    frame.encode(&mut buf);
    buf.freeze()
}

fn bench_decode_bulk_1kb(c: &mut Criterion) {
    let encoded = encode(&Frame::Bulk(Bytes::from(vec![b'x'; 1024])));

    c.bench_function("decode_bulk_1kb", |b| {
        b.iter(|| Frame::decode(black_box(encoded.as_ref())).unwrap())
    });
}

fn bench_encode_bulk_1kb(c: &mut Criterion) {
    let frame = Frame::Bulk(Bytes::from(vec![b'x'; 1024]));

    c.bench_function("encode_bulk_1kb", |b| {
        b.iter(|| {
            let mut buf = BytesMut::with_capacity(2048);
            black_box(&frame).encode(&mut buf);
            buf
        })
    });
}

fn bench_parse_qpush_command(c: &mut Criterion) {
    let values: Vec<String> = (0..16).map(|i| format!("item:{i}")).collect();
    let mut args = vec!["QPUSH", "jobs"];
    args.extend(values.iter().map(|s| s.as_str()));
    let encoded = encode(&Frame::array_from_strs(&args));

    c.bench_function("parse_qpush_16_values", |b| {
        b.iter(|| {
            let (frame, _) = Frame::decode(black_box(encoded.as_ref())).unwrap().unwrap();
            Command::from_frame(frame).unwrap()
        })
    });
}

fn bench_parse_bqpop_command(c: &mut Criterion) {
    let encoded = encode(&Frame::array_from_strs(&["BQPOP", "jobs", "2.5"]));

    c.bench_function("parse_bqpop", |b| {
        b.iter(|| {
            let (frame, _) = Frame::decode(black_box(encoded.as_ref())).unwrap().unwrap();
            Command::from_frame(frame).unwrap()
        })
    });
}

criterion_group!(
    benches,
    bench_decode_bulk_1kb,
    bench_encode_bulk_1kb,
    bench_parse_qpush_command,
    bench_parse_bqpop_command,
);
criterion_main!(benches);

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use squish::{huffman, rle};

fn sample_text(len: usize) -> Vec<u8> {
    b"Lorem ipsum dolor sit amet, consectetur adipiscing elit, sed do eiusmod tempor \
      incididunt ut labore et dolore magna aliqua. "
        .iter()
        .copied()
        .cycle()
        .take(len)
        .collect()
}

fn sample_runs(len: usize) -> Vec<u8> {
    (0..len).map(|i| (i / 97 % 7) as u8).collect()
}

fn huffman_encode(c: &mut Criterion) {
    let input = sample_text(64 * 1024);

    c.bench_function("huffman encode", |b| {
        b.iter(|| huffman::encode(black_box(&input)))
    });
}

fn huffman_decode(c: &mut Criterion) {
    let input = sample_text(64 * 1024);
    let (codes, payload) = huffman::encode(&input).unwrap();

    c.bench_function("huffman decode", |b| {
        b.iter(|| huffman::decode_exact(black_box(&codes), black_box(&payload), input.len()))
    });
}

fn rle_round_trip(c: &mut Criterion) {
    let input = sample_runs(64 * 1024);
    let encoded = rle::encode(&input);

    c.bench_function("rle encode", |b| b.iter(|| rle::encode(black_box(&input))));
    c.bench_function("rle decode", |b| {
        b.iter(|| rle::decode(black_box(&encoded)))
    });
}

criterion_group!(benches, huffman_encode, huffman_decode, rle_round_trip);
criterion_main!(benches);

//! Criterion benchmark untuk ByteQueue
//!
//! Run dengan: cargo bench

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use circq::core::ByteQueue;
use circq::protocol::{Decoder, Encoder};

fn bench_enqueue_dequeue(c: &mut Criterion) {
    let mut group = c.benchmark_group("byte_queue");

    for size in [1usize, 64, 4096].iter() {
        group.throughput(Throughput::Bytes(*size as u64));
        group.bench_with_input(BenchmarkId::new("cycle", size), size, |b, &size| {
            let queue = ByteQueue::new();
            queue.configure(64 * 1024).unwrap();
            let chunk = vec![0x42u8; size];
            b.iter(|| {
                queue.enqueue(black_box(&chunk)).unwrap();
                black_box(queue.dequeue(size).unwrap());
            });
        });
    }

    // Wraparound di setiap iterasi: kapasitas bukan kelipatan chunk
    group.bench_function("wrapping_cycle", |b| {
        let queue = ByteQueue::new();
        queue.configure(1000).unwrap();
        let chunk = [7u8; 96];
        b.iter(|| {
            queue.enqueue(black_box(&chunk)).unwrap();
            black_box(queue.dequeue(chunk.len()).unwrap());
        });
    });

    group.finish();
}

fn bench_protocol(c: &mut Criterion) {
    let mut group = c.benchmark_group("protocol");
    let payload = vec![0u8; 64];

    group.throughput(Throughput::Elements(1));
    group.bench_function("encode_request", |b| {
        let mut encoder = Encoder::new(4096);
        let mut seq = 0u64;
        b.iter(|| {
            encoder.reset();
            seq = seq.wrapping_add(1);
            black_box(encoder.encode_request(2, seq, 64, &payload).unwrap().len());
        });
    });

    let mut encoder = Encoder::new(1024 * 1024);
    for i in 0..1000 {
        encoder.encode_request(2, i, 64, &payload).unwrap();
    }
    let encoded = encoder.as_bytes().to_vec();

    group.throughput(Throughput::Elements(1000));
    group.bench_function("decode_1000", |b| {
        b.iter(|| {
            let mut decoder = Decoder::new(black_box(&encoded));
            while let Ok(Some(frame)) = decoder.next() {
                black_box(frame);
            }
        });
    });

    group.finish();
}

criterion_group!(benches, bench_enqueue_dequeue, bench_protocol);
criterion_main!(benches);

//! circq - demo & benchmark in-process
//!
//! Menjalankan skenario dasar queue lalu mengukur throughput
//! producer/consumer melalui dequeue yang blocking.

use std::thread;
use std::time::Instant;

use circq::core::ByteQueue;
use circq::error::QueueError;
use circq::trace::init_tracing;
use tracing::{error, info};

fn main() {
    init_tracing();

    println!("🚀 circq - Resizable Circular Byte Queue");
    println!("========================================\n");

    if let Err(e) = walkthrough() {
        error!(error = %e, "walkthrough failed");
        std::process::exit(1);
    }

    if let Err(e) = benchmark_pipeline() {
        error!(error = %e, "benchmark failed");
        std::process::exit(1);
    }

    println!("\n✅ Done!");
    println!("\nTo start server: cargo run --release --bin circq_server -- --bind 127.0.0.1:7878");
}

fn walkthrough() -> Result<(), QueueError> {
    println!("📋 Walkthrough");
    println!("--------------");

    let queue = ByteQueue::new();

    match queue.configure(0) {
        Err(e) => println!("  configure(0)        -> {}", e),
        Ok(()) => println!("  configure(0)        -> ok (unexpected)"),
    }

    queue.configure(5)?;
    println!("  configure(5)        -> ok");

    queue.enqueue(&[1, 2, 3])?;
    println!("  enqueue([1,2,3])    -> ok, count={}", queue.snapshot().count);

    match queue.enqueue(&[4, 5, 6]) {
        Err(e) => println!("  enqueue([4,5,6])    -> {}, count={}", e, queue.snapshot().count),
        Ok(()) => println!("  enqueue([4,5,6])    -> ok (unexpected)"),
    }

    let data = queue.dequeue(3)?;
    println!("  dequeue(3)          -> {:?}, count={}", data, queue.snapshot().count);

    // Dequeue blocking sampai producer mengisi
    let consumer = {
        let queue = queue.clone();
        thread::spawn(move || queue.dequeue(1))
    };
    while queue.waiters() == 0 {
        thread::yield_now();
    }
    queue.enqueue(&[9])?;
    let data = consumer.join().unwrap_or(Err(QueueError::Canceled))?;
    println!("  blocked dequeue(1)  -> {:?}\n", data);

    Ok(())
}

fn benchmark_pipeline() -> Result<(), QueueError> {
    println!("📊 Producer/Consumer Benchmark (Mutex + Condvar)");
    println!("------------------------------------------------");

    const CAPACITY: i64 = 64 * 1024;
    const CHUNK: usize = 256;
    const CHUNKS: usize = 200_000;

    let queue = ByteQueue::new();
    queue.configure(CAPACITY)?;

    let producer = {
        let queue = queue.clone();
        thread::spawn(move || -> Result<(), QueueError> {
            let chunk = [0x5Au8; CHUNK];
            let mut sent = 0;
            while sent < CHUNKS {
                match queue.enqueue(&chunk) {
                    Ok(()) => sent += 1,
                    // Backpressure: queue penuh, beri kesempatan consumer
                    Err(QueueError::ResourceExhausted) => thread::yield_now(),
                    Err(e) => return Err(e),
                }
            }
            Ok(())
        })
    };

    let start = Instant::now();
    let mut received = 0usize;
    for _ in 0..CHUNKS {
        received += queue.dequeue(CHUNK)?.len();
    }
    let duration = start.elapsed();

    producer.join().unwrap_or(Err(QueueError::Canceled))?;

    let per_chunk_ns = duration.as_nanos() as f64 / CHUNKS as f64;
    info!(bytes = received, "pipeline finished");

    println!("  Chunk size:   {} bytes", CHUNK);
    println!("  Chunks:       {}", CHUNKS);
    println!(
        "  Latency:      {:.2} ns/chunk ({:.3} μs/chunk)",
        per_chunk_ns,
        per_chunk_ns / 1000.0
    );
    println!(
        "  Throughput:   {:.2} MB/sec",
        received as f64 / duration.as_secs_f64() / 1_000_000.0
    );

    Ok(())
}

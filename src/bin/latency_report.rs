//! Percentile latency report over the unlocked single-threaded path.

use densebook::{AddOrder, BookConfig, Command, Engine, Side};
use hdrhistogram::Histogram;
use std::time::Instant;

const ITERATIONS: u64 = 1_000_000;
const BUFFER_SIZE: usize = 10_000;

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .init();

    let mut engine = Engine::new(BookConfig::sized(1 << 17, 1 << 16));
    engine.book.set_benchmark_mode(true);
    engine.warm_up();

    let mut histogram = match Histogram::<u64>::new_with_bounds(1, 100_000, 3) {
        Ok(h) => h,
        Err(e) => {
            eprintln!("histogram setup failed: {:?}", e);
            return;
        }
    };

    // Pre-generate commands so RNG and allocation stay out of the
    // measured section; alternate sides around a stable spread.
    println!("Pre-generating {} commands...", BUFFER_SIZE);
    let mut commands = Vec::with_capacity(BUFFER_SIZE);
    for i in 0..BUFFER_SIZE {
        let order_id = (i + 1) as u64;
        let side = if i % 2 == 0 { Side::Buy } else { Side::Sell };
        let price = if i % 2 == 0 {
            9_000 + (order_id % 100) as i64
        } else {
            11_000 + (order_id % 100) as i64
        };
        commands.push(Command::Add(AddOrder {
            order_id,
            user_id: 1,
            side,
            price,
            quantity: 10,
        }));
    }

    // Train the branch predictor before measuring.
    println!("Warming up ({} ops)...", BUFFER_SIZE);
    for cmd in &commands {
        std::hint::black_box(engine.apply(0, *cmd));
    }

    println!("Running {} iterations...", ITERATIONS);
    let mut total = std::time::Duration::ZERO;
    let mut cycle = commands.iter().cycle();

    for ts in 0..ITERATIONS {
        let cmd = match cycle.next() {
            Some(c) => *c,
            None => break,
        };

        let start = Instant::now();
        std::hint::black_box(engine.apply(ts, cmd));
        let elapsed = start.elapsed();

        let _ = histogram.record(elapsed.as_nanos() as u64);
        total += elapsed;
    }

    println!("\n=== Latency Report (ns) ===");
    println!("Total ops:  {}", ITERATIONS);
    println!(
        "Throughput: {:.2} ops/sec",
        ITERATIONS as f64 / total.as_secs_f64()
    );
    println!("---------------------------");
    println!("Min:    {:6} ns", histogram.min());
    println!("P50:    {:6} ns", histogram.value_at_quantile(0.50));
    println!("P90:    {:6} ns", histogram.value_at_quantile(0.90));
    println!("P99:    {:6} ns", histogram.value_at_quantile(0.99));
    println!("P99.9:  {:6} ns", histogram.value_at_quantile(0.999));
    println!("Max:    {:6} ns", histogram.max());
    println!("---------------------------");
    println!("Trades executed: {}", engine.book.trades_executed());
    println!("Open orders:     {}", engine.book.order_count());
    println!("Top bids: {:?}", engine.book.bids_snapshot().iter().take(5).collect::<Vec<_>>());
    println!("Top asks: {:?}", engine.book.asks_snapshot().iter().take(5).collect::<Vec<_>>());
}

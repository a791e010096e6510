//! Times and memory-profiles Fibonacci implementations.
//!
//! Run with:
//!
//! ```sh
//! cargo run -q -p demos --bin fib -- --repeat 10
//! cargo run -q -p demos --bin fib -- --repeat 10 --out target/stint/fib.csv
//! ```

use std::hint::black_box;

use stint::{AllocProfiler, Config, Profiler, Subject};
use tracing_subscriber::EnvFilter;

#[global_allocator]
static ALLOC: AllocProfiler = AllocProfiler::system();

fn fib_recursive(n: u64) -> u64 {
    if n <= 1 {
        1
    } else {
        fib_recursive(n - 2) + fib_recursive(n - 1)
    }
}

fn fib_memo(n: u64) -> Vec<u64> {
    let mut memo = vec![1, 1];
    for i in 2..=n as usize {
        let next = memo[i - 2] + memo[i - 1];
        memo.push(next);
    }
    memo
}

fn main() -> stint::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let config = Config::from_args();
    let n = 25;

    let value = Profiler::time()
        .config(&config)
        .subject(Subject::new("fib_recursive").arg("n", n))
        .run(|| fib_recursive(black_box(n)))?;
    println!("fib_recursive({n}) = {value}");

    let memo = Profiler::memory()
        .config(&config)
        .subject(Subject::new("fib_memo").arg("n", n))
        .run(|| fib_memo(black_box(n)))?;
    println!("fib_memo({n}) kept {} values", memo.len());

    let scope = Profiler::time().subject(Subject::new("fib_memo")).start();
    black_box(fib_memo(black_box(80)));
    scope.finish()?;

    Ok(())
}

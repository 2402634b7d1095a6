//! Benchmarks for the loop-side engine.

mod dispatch;
mod practice;

pub use dispatch::bench_dispatch;
pub use practice::bench_practice;

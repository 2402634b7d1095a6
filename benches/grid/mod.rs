//! Benchmarks for grid arithmetic.

mod bridge;
mod quantize;

pub use bridge::bench_bridge;
pub use quantize::bench_quantize;

//! Network throughput and latency measurement against a pool of remote
//! test servers: proximity ranking, latency-based selection, saturation
//! warmup and escalating-size transfer benchmarks.

pub mod benchmark;
pub mod config;
pub mod error;
pub mod geo;
pub mod latency;
pub mod logging;
pub mod server;
pub mod stats;
pub mod transfer;
pub mod warmup;

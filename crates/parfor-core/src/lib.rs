//! Core library for parfor: parallel range execution, result locking, serialized
//! console output, and the demo workloads.
//! Used by the CLI binary; can be reused by other tools.

pub mod config;
pub mod console;
pub mod executor;
pub mod workload;

// Re-export main API for CLI
pub use config::{default_threads, is_quiet, threads_from_env};
pub use console::{console_lock, log, write, ConsoleGuard};
pub use executor::{ParallelExecutor, ResultCell};
pub use workload::{
    generate_inputs, parallel_bench, parallel_sweep, serial_bench, serial_sweep, BenchReport,
};

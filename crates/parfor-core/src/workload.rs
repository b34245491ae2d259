//! Demo workloads for the executor, plus the benchmark report.
//!
//! Neither computation is useful on its own; they exist to exercise nested
//! parallel loops, the result lock, and serialized console output against a
//! serial reference.

use std::fs;
use std::io::Write;
use std::path::Path;
use std::sync::Mutex;

use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::executor::{ParallelExecutor, ResultCell};

/// Random input values in `[0, 32768)`.
pub fn generate_inputs(len: usize) -> Vec<f64> {
    let mut rng = rand::thread_rng();
    (0..len).map(|_| rng.gen_range(0.0..32768.0)).collect()
}

fn bench_term(input: &[f64], i: usize, j: usize) -> f64 {
    (input[i].powi(3).sqrt() * (j as f64).sin() + (j as f64).cos() * (i as f64).cos()).log10()
}

/// Serial reference for the benchmark workload: per index, accumulate a
/// term over the whole input and keep the sum when it truncates to an even
/// integer.
pub fn serial_bench(input: &[f64], quiet: bool) -> Vec<f64> {
    assert!(!input.is_empty(), "no input values given");
    let denom = (input.len() - 1).max(1) as f64;

    let mut kept = Vec::new();
    for i in 0..input.len() {
        let mut value = 0.0;
        for j in 0..input.len() {
            value += bench_term(input, i, j);
        }
        if value as i64 % 2 == 0 {
            kept.push(value);
        }
        if !quiet && i % 1000 == 0 {
            println!("progress {:.3}", i as f64 / denom);
        }
    }
    kept
}

/// Parallel benchmark workload. The outer loop runs at the executor default;
/// the inner accumulation runs on two threads purely to demonstrate nesting.
/// Kept values go through the result lock; progress lines go through the
/// console lock. The kept order is scheduler-dependent.
pub fn parallel_bench(input: &[f64], pe: &ParallelExecutor, quiet: bool) -> Vec<f64> {
    assert!(!input.is_empty(), "no input values given");
    let denom = (input.len() - 1).max(1) as f64;

    let kept = ResultCell::new(Vec::new());
    pe.parallel_for(0, input.len() - 1, |i| {
        // Local per-index accumulator; not shared beyond the inner loop, so it
        // carries its own lock instead of the executor's.
        let sum = Mutex::new(0.0f64);
        pe.parallel_for_with(0, input.len() - 1, 2, |j| {
            *sum.lock().unwrap() += bench_term(input, i, j);
        });
        let value = sum.into_inner().unwrap();

        if value as i64 % 2 == 0 {
            pe.with_result_lock(|| {
                // Serialized by the result lock.
                unsafe { kept.get_mut() }.push(value);
            });
        }
        if !quiet && i % 1000 == 0 {
            pe.write(&format!("progress {:.3}", i as f64 / denom));
        }
    });
    kept.into_inner()
}

/// Serial reference for the sweep workload: `iterations` passes adding
/// `(a[j] + b[j]) / (i + j + 1)` into slot `j`.
pub fn serial_sweep(a: &[f64], b: &[f64], iterations: usize) -> Vec<f64> {
    assert_eq!(a.len(), b.len(), "both inputs need to have the same size");
    assert!(!a.is_empty(), "no input values given");
    assert!(iterations > 0, "no iterations given");

    let mut result = vec![0.0; a.len()];
    for i in 0..iterations {
        for j in 0..result.len() {
            result[j] += (a[j] + b[j]) / (i + j + 1) as f64;
        }
    }
    result
}

/// Parallel sweep workload: outer loop over the passes, inner loop over the
/// elements on two threads. Different passes hit the same slot, so every
/// update goes through the result lock; the per-pass line goes out as one
/// block through the scoped console guard.
pub fn parallel_sweep(
    a: &[f64],
    b: &[f64],
    iterations: usize,
    pe: &ParallelExecutor,
    quiet: bool,
) -> Vec<f64> {
    assert_eq!(a.len(), b.len(), "both inputs need to have the same size");
    assert!(!a.is_empty(), "no input values given");
    assert!(iterations > 0, "no iterations given");

    let result = ResultCell::new(vec![0.0; a.len()]);
    pe.parallel_for(0, iterations - 1, |i| {
        pe.parallel_for_with(0, a.len() - 1, 2, |j| {
            let next = (a[j] + b[j]) / (i + j + 1) as f64;
            pe.with_result_lock(|| {
                // Serialized by the result lock.
                (unsafe { result.get_mut() })[j] += next;
            });
        });
        if !quiet {
            let mut out = pe.console();
            let _ = writeln!(out, "Iteration {} done", i);
        }
    });
    result.into_inner()
}

/// Benchmark summary, printable and writable as JSON.
#[derive(Debug, Serialize, Deserialize)]
pub struct BenchReport {
    pub input_len: usize,
    pub threads: usize,
    pub serial_secs: f64,
    pub parallel_secs: f64,
    pub speedup: f64,
    pub serial_kept: usize,
    pub parallel_kept: usize,
}

impl BenchReport {
    pub fn to_json(&self) -> Result<String, String> {
        serde_json::to_string_pretty(self).map_err(|e| e.to_string())
    }

    pub fn write_json(&self, path: &Path) -> Result<(), String> {
        let json = self.to_json()?;
        fs::write(path, json + "\n").map_err(|e| format!("Failed to write {}: {}", path.display(), e))
    }
}

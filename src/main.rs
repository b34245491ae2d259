//! Thin CLI layer: parse args, styled output, and call into parfor-core.
//! Crash-proof: panic caught and reported; all errors return Result.

use clap::{Arg, ArgAction, Command};
use colored::Colorize;
use indicatif::{ProgressBar, ProgressStyle};
use std::env;
use std::io::IsTerminal;
use std::path::Path;
use std::sync::{mpsc, Arc};
use std::thread;
use std::time::{Duration, Instant};

use parfor_core::{
    config, generate_inputs, parallel_bench, parallel_sweep, serial_bench, serial_sweep,
    BenchReport, ParallelExecutor,
};

// ---- UI helpers (no-op when stdout isn't a TTY) ----

fn use_color() -> bool {
    std::io::stdout().is_terminal() && env::var("NO_COLOR").unwrap_or_default().is_empty()
}

fn success(msg: &str) {
    if use_color() {
        println!("{}", msg.green());
    } else {
        println!("{}", msg);
    }
}

fn error(msg: &str) {
    if use_color() {
        eprintln!("{}", msg.red());
    } else {
        eprintln!("{}", msg);
    }
}

fn info(msg: &str) {
    if use_color() {
        println!("{}", msg.cyan());
    } else {
        println!("{}", msg);
    }
}

fn dim(msg: &str) {
    if use_color() {
        println!("{}", msg.dimmed());
    } else {
        println!("{}", msg);
    }
}

/// Run a long-running pass; in quiet mode show a spinner until done.
fn run_with_spinner<T, F>(message: &str, quiet: bool, f: F) -> Result<T, String>
where
    T: Send + 'static,
    F: FnOnce() -> T + Send + 'static,
{
    if !quiet {
        return Ok(f());
    }
    let (tx, rx) = mpsc::channel();
    thread::spawn(move || {
        let _ = tx.send(f());
    });
    let spinner = ProgressBar::new_spinner();
    spinner.set_style(
        ProgressStyle::default_spinner()
            .tick_chars("⠁⠂⠄⠈⠐⠠⠰⠸⠹")
            .template("{spinner:.dim} {msg}")
            .unwrap(),
    );
    spinner.set_message(message.to_string());
    let tick = Duration::from_millis(80);
    loop {
        match rx.try_recv() {
            Ok(value) => {
                spinner.finish_and_clear();
                return Ok(value);
            }
            Err(mpsc::TryRecvError::Disconnected) => {
                spinner.finish_and_clear();
                return Err("Worker pass failed.".to_string());
            }
            Err(mpsc::TryRecvError::Empty) => {}
        }
        spinner.tick();
        thread::sleep(tick);
    }
}

fn cmd_bench(
    size: usize,
    threads: usize,
    quiet: bool,
    json: bool,
    out: Option<String>,
) -> Result<(), String> {
    if size == 0 {
        return Err("--size must be at least 1".to_string());
    }

    let input = Arc::new(generate_inputs(size));
    if !quiet && !json {
        info(&format!(
            "benchmarking {} elements on {} threads",
            size, threads
        ));
    }

    let (serial_kept, serial_secs) = run_with_spinner("serial pass …", quiet, {
        let input = Arc::clone(&input);
        move || {
            let started = Instant::now();
            let kept = serial_bench(&input, quiet);
            (kept.len(), started.elapsed().as_secs_f64())
        }
    })?;

    let (parallel_kept, parallel_secs) = run_with_spinner("parallel pass …", quiet, {
        let input = Arc::clone(&input);
        move || {
            let pe = ParallelExecutor::with_threads(threads);
            let started = Instant::now();
            let kept = parallel_bench(&input, &pe, quiet);
            (kept.len(), started.elapsed().as_secs_f64())
        }
    })?;

    let report = BenchReport {
        input_len: size,
        threads,
        serial_secs,
        parallel_secs,
        speedup: if parallel_secs > 0.0 {
            serial_secs / parallel_secs
        } else {
            0.0
        },
        serial_kept,
        parallel_kept,
    };

    if json {
        println!("{}", report.to_json()?);
    } else {
        success(&format!(
            "serial:   {:.3} s ({} values kept)",
            report.serial_secs, report.serial_kept
        ));
        success(&format!(
            "parallel: {:.3} s ({} values kept)",
            report.parallel_secs, report.parallel_kept
        ));
        info(&format!(
            "speedup: {:.2}x on {} threads",
            report.speedup, report.threads
        ));
    }

    if let Some(path) = out {
        report.write_json(Path::new(&path))?;
        dim(&format!("report written to {}", path));
    }
    if !quiet && !json {
        parfor_core::log(&format!(
            "bench size={} threads={} speedup={:.2}",
            size, threads, report.speedup
        ));
    }
    Ok(())
}

fn cmd_sweep(size: usize, iterations: usize, threads: usize, quiet: bool) -> Result<(), String> {
    if size == 0 {
        return Err("--size must be at least 1".to_string());
    }
    if iterations == 0 {
        return Err("--iterations must be at least 1".to_string());
    }

    let a = vec![42.0; size];
    let b = vec![4711.1337; size];
    if !quiet {
        info(&format!(
            "sweeping {} elements for {} iterations on {} threads",
            size, iterations, threads
        ));
    }

    let started = Instant::now();
    let serial = serial_sweep(&a, &b, iterations);
    let serial_secs = started.elapsed().as_secs_f64();

    let pe = ParallelExecutor::with_threads(threads);
    let started = Instant::now();
    let parallel = parallel_sweep(&a, &b, iterations, &pe, quiet);
    let parallel_secs = started.elapsed().as_secs_f64();

    let deviation = serial
        .iter()
        .zip(parallel.iter())
        .map(|(s, p)| (s - p).abs())
        .fold(0.0, f64::max);

    success(&format!("serial:   {:.3} s", serial_secs));
    success(&format!("parallel: {:.3} s", parallel_secs));
    dim(&format!("max deviation between runs: {:e}", deviation));
    Ok(())
}

fn run() -> Result<(), String> {
    let threads_arg = Arg::new("threads")
        .long("threads")
        .value_parser(clap::value_parser!(usize))
        .help("Worker threads (default: PARFOR_THREADS or logical cores)");
    let quiet_arg = Arg::new("quiet")
        .short('q')
        .long("quiet")
        .action(ArgAction::SetTrue)
        .help("Minimal output; show spinner when busy");

    let matches = Command::new("parfor")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Spawn-and-join parallel for loops, demoed against a serial reference")
        .after_help(
            "Examples:\n  parfor bench\n  parfor bench --size 20000 --threads 8 --json\n  parfor sweep --iterations 100\n\nEnvironment:\n  PARFOR_THREADS  default worker count\n  PARFOR_QUIET    suppress progress output",
        )
        .subcommand_required(true)
        .subcommand(
            Command::new("bench")
                .about("Benchmark the parallel executor against a serial loop")
                .arg(
                    Arg::new("size")
                        .long("size")
                        .value_parser(clap::value_parser!(usize))
                        .default_value("10000")
                        .help("Number of random input values"),
                )
                .arg(threads_arg.clone())
                .arg(quiet_arg.clone())
                .arg(
                    Arg::new("json")
                        .long("json")
                        .action(ArgAction::SetTrue)
                        .help("Print the report as JSON"),
                )
                .arg(
                    Arg::new("out")
                        .long("out")
                        .value_name("FILE")
                        .help("Also write the JSON report to FILE"),
                ),
        )
        .subcommand(
            Command::new("sweep")
                .about("Repeated element-wise accumulation with nested parallel loops")
                .arg(
                    Arg::new("size")
                        .long("size")
                        .value_parser(clap::value_parser!(usize))
                        .default_value("10000")
                        .help("Number of input values"),
                )
                .arg(
                    Arg::new("iterations")
                        .long("iterations")
                        .value_parser(clap::value_parser!(usize))
                        .default_value("100")
                        .help("Accumulation passes over the input"),
                )
                .arg(threads_arg.clone().default_value("12"))
                .arg(quiet_arg.clone()),
        )
        .get_matches();

    match matches.subcommand() {
        Some(("bench", sub)) => {
            let size = *sub.get_one::<usize>("size").unwrap();
            let threads = sub
                .get_one::<usize>("threads")
                .copied()
                .unwrap_or_else(config::default_threads);
            let quiet = sub.get_flag("quiet") || config::is_quiet();
            cmd_bench(
                size,
                threads,
                quiet,
                sub.get_flag("json"),
                sub.get_one::<String>("out").cloned(),
            )
        }
        Some(("sweep", sub)) => {
            let size = *sub.get_one::<usize>("size").unwrap();
            let iterations = *sub.get_one::<usize>("iterations").unwrap();
            let threads = *sub.get_one::<usize>("threads").unwrap();
            let quiet = sub.get_flag("quiet") || config::is_quiet();
            cmd_sweep(size, iterations, threads, quiet)
        }
        _ => unreachable!("subcommand required"),
    }
}

fn main() {
    if !use_color() {
        colored::control::set_override(false);
    }

    let code = match std::panic::catch_unwind(|| run()) {
        Ok(Ok(())) => 0,
        Ok(Err(e)) => {
            error(&e);
            1
        }
        Err(_) => {
            error("An unexpected error occurred. Please report this issue.");
            1
        }
    };
    std::process::exit(code);
}

//! Process-wide serialized console output.
//!
//! One global lock covers every executor instance and every thread; a line
//! written through here never interleaves with another. The relative order of
//! lines from concurrent writers stays scheduler-dependent.

use std::io::{self, Write};
use std::sync::{Mutex, MutexGuard, PoisonError};

use chrono::Local;

static CONSOLE: Mutex<()> = Mutex::new(());

/// Write one line to stdout while holding the console lock.
///
/// Best effort: stdout write errors are ignored, same as the log lines.
pub fn write(message: &str) {
    let _guard = lock();
    let mut out = io::stdout();
    let _ = writeln!(out, "{}", message);
}

/// Timestamped variant of [`write`]; the CLI milestone-line format.
pub fn log(message: &str) {
    write(&stamped(message));
}

/// Hold the console lock until the guard drops, for several chained writes
/// that must come out as one block.
pub fn console_lock() -> ConsoleGuard {
    ConsoleGuard {
        _guard: lock(),
        out: io::stdout(),
    }
}

fn lock() -> MutexGuard<'static, ()> {
    // A writer that panicked mid-line must not wedge every later write.
    CONSOLE.lock().unwrap_or_else(PoisonError::into_inner)
}

fn stamped(message: &str) -> String {
    let timestamp = Local::now().format("%Y-%m-%d %H:%M:%S");
    format!("[{}] {}", timestamp, message)
}

/// Scoped console lock writing to stdout.
///
/// Released when the guard goes out of scope, early returns and unwinds
/// included.
pub struct ConsoleGuard {
    _guard: MutexGuard<'static, ()>,
    out: io::Stdout,
}

impl Write for ConsoleGuard {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.out.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.out.flush()
    }
}

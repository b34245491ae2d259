//! Env-based configuration. CLI flags override these.

use std::env;

/// Worker count from `PARFOR_THREADS`, if set to a positive integer.
/// Anything else (unset, unparsable, zero) is ignored.
pub fn threads_from_env() -> Option<usize> {
    env::var("PARFOR_THREADS")
        .ok()?
        .trim()
        .parse::<usize>()
        .ok()
        .filter(|&n| n > 0)
}

/// Worker count for callers that give no explicit choice: the env override,
/// else the detected logical core count with a floor of one.
pub fn default_threads() -> usize {
    threads_from_env().unwrap_or_else(|| num_cpus::get().max(1))
}

/// Whether progress output is suppressed via `PARFOR_QUIET` (1/true).
pub fn is_quiet() -> bool {
    env::var("PARFOR_QUIET")
        .map(|v| v == "1" || v.eq_ignore_ascii_case("true"))
        .unwrap_or(false)
}

//! Process-level runtime snapshots: uptime and resident memory.
//!
//! The supervisor health report and the `.ping` / `.cek_status` replies all
//! quote uptime and memory; this module is the single source for both.

use std::sync::OnceLock;
use std::time::Instant;

static PROCESS_START: OnceLock<Instant> = OnceLock::new();

/// Record the process start instant. Called once from `main` before any
/// session or supervisor task is spawned; later calls are no-ops.
pub fn mark_start() {
    let _ = PROCESS_START.set(Instant::now());
}

/// Seconds since [`mark_start`]. Zero if it was never called (tests).
pub fn uptime_secs() -> u64 {
    PROCESS_START
        .get()
        .map(|s| s.elapsed().as_secs())
        .unwrap_or(0)
}

/// Resident set size in MiB, read from `/proc/self/statm`.
///
/// Returns `None` on platforms without procfs or when the file cannot be
/// parsed; callers render that as an unknown value rather than failing.
pub fn rss_mib() -> Option<u64> {
    let statm = std::fs::read_to_string("/proc/self/statm").ok()?;
    let resident_pages: u64 = statm.split_whitespace().nth(1)?.parse().ok()?;
    let page_size = 4096u64;
    Some(resident_pages * page_size / (1024 * 1024))
}

/// Memory figure for user-facing replies: RSS or `?` when unavailable.
pub fn rss_display() -> String {
    match rss_mib() {
        Some(mib) => format!("{}MB", mib),
        None => "?MB".to_string(),
    }
}

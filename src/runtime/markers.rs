//! Activation completion markers
//!
//! After every `/run` call (success or failure) and after a failed `/init`,
//! the proxy emits a literal sentinel line plus current memory figures and
//! flushes its output. The orchestrator relies on the sentinel to delimit one
//! activation's log output from the next, so it must appear exactly once per
//! call regardless of outcome. Markers go to stdout in production; tests
//! redirect them to a shared buffer to count emissions.

use std::io::{self, Write};
use std::sync::Arc;

use parking_lot::Mutex;
use sysinfo::{Pid, ProcessesToUpdate, System};

/// The literal sentinel line the orchestrator scans for
pub const ACTIVATION_SENTINEL: &str = "XXX_THE_END_OF_A_WHISK_ACTIVATION_XXX";

/// Where completion markers are written.
///
/// The production writer targets stdout and flushes both standard streams
/// after each block. A buffer-backed writer captures the same bytes for
/// tests; clones share the underlying sink.
#[derive(Clone, Default)]
pub struct MarkerWriter {
    buffer: Option<Arc<Mutex<Vec<u8>>>>,
}

impl MarkerWriter {
    /// Markers go to stdout (the production default).
    pub fn stdout() -> Self {
        Self::default()
    }

    /// Markers go to a shared in-memory buffer.
    pub fn to_buffer(buffer: Arc<Mutex<Vec<u8>>>) -> Self {
        Self {
            buffer: Some(buffer),
        }
    }

    /// Emit one complete marker block, then flush.
    pub fn write_activation_markers(&self) {
        match &self.buffer {
            Some(buffer) => {
                let _ = write_markers_to(&mut *buffer.lock());
            }
            None => {
                let mut stdout = io::stdout().lock();
                let _ = write_markers_to(&mut stdout);
                let _ = stdout.flush();
                let _ = io::stderr().flush();
            }
        }
    }
}

/// Render one complete marker block to the given writer.
fn write_markers_to(out: &mut impl Write) -> io::Result<()> {
    writeln!(out, "{ACTIVATION_SENTINEL}")?;
    match memory_figures() {
        Some((resident_mb, virtual_mb)) => writeln!(
            out,
            "Resident Memory: {resident_mb:.1} MB\nVirtual Memory: {virtual_mb:.1} MB."
        ),
        None => writeln!(out, "Resident Memory: unavailable."),
    }
}

/// Resident and virtual memory of this process in megabytes.
fn memory_figures() -> Option<(f64, f64)> {
    let pid = Pid::from_u32(std::process::id());
    let mut system = System::new();
    system.refresh_processes(ProcessesToUpdate::Some(&[pid]), false);
    let process = system.process(pid)?;
    Some((
        process.memory() as f64 / 1_000_000.0,
        process.virtual_memory() as f64 / 1_000_000.0,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sentinel_count(bytes: &[u8]) -> usize {
        String::from_utf8_lossy(bytes)
            .lines()
            .filter(|line| *line == ACTIVATION_SENTINEL)
            .count()
    }

    #[test]
    fn marker_block_contains_exactly_one_sentinel() {
        let mut out = Vec::new();
        write_markers_to(&mut out).unwrap();
        assert_eq!(sentinel_count(&out), 1);
        assert!(String::from_utf8(out).unwrap().starts_with(ACTIVATION_SENTINEL));
    }

    #[test]
    fn buffered_writer_emits_one_block_per_call() {
        let buffer = Arc::new(Mutex::new(Vec::new()));
        let writer = MarkerWriter::to_buffer(buffer.clone());

        writer.write_activation_markers();
        writer.write_activation_markers();

        assert_eq!(sentinel_count(&buffer.lock()), 2);
    }

    #[test]
    fn memory_figures_report_a_running_process() {
        // This process exists, so the figures resolve and are positive.
        let (resident_mb, virtual_mb) = memory_figures().expect("own process is visible");
        assert!(resident_mb > 0.0);
        assert!(virtual_mb >= resident_mb);
    }
}

use sysinfo::{Pid, System};
use tracing::debug;

const BYTES_PER_MB: f64 = 1024.0 * 1024.0;

/// Samples the resident set size of the current process.
#[derive(Debug)]
pub struct MemorySampler {
    system: System,
    pid: Option<Pid>,
}

impl MemorySampler {
    pub fn new() -> Self {
        let pid = sysinfo::get_current_pid()
            .map_err(|e| debug!("Cannot determine the current pid: {}", e))
            .ok();
        MemorySampler {
            system: System::new(),
            pid,
        }
    }

    /// The current resident set size in bytes, `None` if it can't be read on this platform.
    pub fn rss_bytes(&mut self) -> Option<u64> {
        let pid = self.pid?;
        if !self.system.refresh_process(pid) {
            return None;
        }
        self.system.process(pid).map(|p| p.memory())
    }
}

/// The increase between two samples in MB, clamped at zero. Missing samples count as no increase.
pub fn memory_delta_mb(before: Option<u64>, after: Option<u64>) -> f64 {
    match (before, after) {
        (Some(before), Some(after)) => after.saturating_sub(before) as f64 / BYTES_PER_MB,
        _ => 0.0,
    }
}

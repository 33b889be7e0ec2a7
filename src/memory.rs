use serde::Serialize;
use sysinfo::System;

/// Resident memory before dispatch and after the join barrier.
#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct MemoryDelta {
    pub before_bytes: u64,
    pub after_bytes: u64,
}

impl MemoryDelta {
    pub fn new(before_bytes: u64, after_bytes: u64) -> Self {
        Self {
            before_bytes,
            after_bytes,
        }
    }

    pub fn delta_bytes(&self) -> i64 {
        self.after_bytes as i64 - self.before_bytes as i64
    }

    pub fn delta_kb(&self) -> f64 {
        self.delta_bytes() as f64 / 1000.0
    }
}

/// Current resident set size of this process, or 0 on platforms
/// `sysinfo` cannot inspect.
pub fn resident_bytes() -> u64 {
    let Ok(pid) = sysinfo::get_current_pid() else {
        return 0;
    };
    let mut sys = System::new();
    if !sys.refresh_process(pid) {
        return 0;
    }
    sys.process(pid).map(|p| p.memory()).unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resident_bytes_sees_this_process() {
        if sysinfo::IS_SUPPORTED_SYSTEM {
            assert!(resident_bytes() > 0);
        } else {
            assert_eq!(resident_bytes(), 0);
        }
    }

    #[test]
    fn test_delta_can_shrink() {
        let delta = MemoryDelta::new(5_000, 3_000);
        assert_eq!(delta.delta_bytes(), -2_000);
        assert_eq!(delta.delta_kb(), -2.0);
    }
}

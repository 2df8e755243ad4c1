use guard_common::{MapError, Pid, maps::CowHashMap};

/// Token stored for processes tracked by the control plane.
pub const TRACKED: u32 = 1;

/// Processes whose syscalls are counted. The stored token is opaque to the
/// tracer: only membership matters.
pub struct ProcessTrackSet {
    pids: CowHashMap<Pid, u32>,
}

impl ProcessTrackSet {
    pub fn with_max_entries(max_entries: usize) -> Self {
        Self {
            pids: CowHashMap::with_max_entries(max_entries),
        }
    }

    pub fn is_tracked(&self, pid: Pid) -> bool {
        self.pids.contains_key(&pid)
    }

    pub fn track(&self, pid: Pid) -> Result<(), MapError> {
        self.track_with(pid, TRACKED)
    }

    pub fn track_with(&self, pid: Pid, token: u32) -> Result<(), MapError> {
        self.pids.insert(pid, token).map(|_| ())
    }

    /// Returns whether the process was tracked.
    pub fn untrack(&self, pid: Pid) -> bool {
        self.pids.remove(&pid).is_some()
    }

    pub fn token(&self, pid: Pid) -> Option<u32> {
        self.pids.get(&pid)
    }

    /// Tracked processes in ascending pid order.
    pub fn pids(&self) -> Vec<Pid> {
        let mut pids: Vec<Pid> = self.pids.snapshot().keys().copied().collect();
        pids.sort_unstable();
        pids
    }

    pub fn len(&self) -> usize {
        self.pids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pids.is_empty()
    }

    pub fn clear(&self) {
        self.pids.clear()
    }
}

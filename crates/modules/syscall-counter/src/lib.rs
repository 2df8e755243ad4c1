//! Per process syscall counter.
//!
//! On every syscall entry the tracer checks the [`ProcessTrackSet`] and, for
//! tracked processes, adds one to the process counter. The counter is created
//! by the first tracked syscall; creation and increment are one atomic step,
//! so concurrent first syscalls of a multi-threaded process are all counted.
//!
//! The tracer never removes counters. The control plane reaps them when a
//! process exits, see [`SyscallCounter::forget`].

use std::collections::HashMap;

use guard_common::{MapError, Pid, maps::CounterMap};
use guard_core::pdk::GuardModule;

mod config;
mod track;

pub use config::{MAX_ENTRIES, SyscallCounterConfig};
pub use track::{ProcessTrackSet, TRACKED};

pub const MODULE_NAME: &str = "syscall-counter";

pub struct SyscallCounterModule;

impl GuardModule for SyscallCounterModule {
    type Config = SyscallCounterConfig;

    const MODULE_NAME: &'static str = MODULE_NAME;
    const DEFAULT_ENABLED: bool = false;
}

/// What happened to one syscall entry event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TraceOutcome {
    Untracked,
    /// The new count of the process.
    Counted(u64),
    /// The process is tracked but the count table is full.
    Dropped,
}

pub struct SyscallCounter {
    tracked: ProcessTrackSet,
    counts: CounterMap<Pid>,
}

impl SyscallCounter {
    pub fn new(max_entries: usize) -> Self {
        Self {
            tracked: ProcessTrackSet::with_max_entries(max_entries),
            counts: CounterMap::with_max_entries(max_entries),
        }
    }

    pub fn tracked(&self) -> &ProcessTrackSet {
        &self.tracked
    }

    pub fn on_sys_enter(&self, pid: Pid) -> TraceOutcome {
        if !self.tracked.is_tracked(pid) {
            return TraceOutcome::Untracked;
        }
        match self.counts.increment(pid) {
            Ok(count) => TraceOutcome::Counted(count),
            Err(MapError::Full { max_entries }) => {
                log::trace!("{pid}: count table full ({max_entries} entries)");
                TraceOutcome::Dropped
            }
            Err(err) => {
                log::trace!("{pid}: {err}");
                TraceOutcome::Dropped
            }
        }
    }

    pub fn count(&self, pid: Pid) -> Option<u64> {
        self.counts.get(&pid)
    }

    pub fn counts(&self) -> HashMap<Pid, u64> {
        self.counts.snapshot()
    }

    /// Counts sorted by pid.
    pub fn sorted_counts(&self) -> Vec<(Pid, u64)> {
        let mut counts: Vec<_> = self.counts.snapshot().into_iter().collect();
        counts.sort_unstable();
        counts
    }

    /// Take every count out, leaving tracking untouched.
    pub fn drain_counts(&self) -> HashMap<Pid, u64> {
        self.counts.drain()
    }

    /// Stop tracking `pid` and drop its counter, returning the final count.
    pub fn forget(&self, pid: Pid) -> Option<u64> {
        self.tracked.untrack(pid);
        self.counts.remove(&pid)
    }

    pub fn reset(&self) {
        self.tracked.clear();
        self.counts.clear();
    }
}

impl Default for SyscallCounter {
    fn default() -> Self {
        Self::new(MAX_ENTRIES)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tracked_process_is_counted() {
        let counter = SyscallCounter::default();
        let p = Pid::from_raw(100);
        let q = Pid::from_raw(200);
        counter.tracked().track(p).unwrap();

        assert_eq!(counter.on_sys_enter(p), TraceOutcome::Counted(1));
        assert_eq!(counter.on_sys_enter(p), TraceOutcome::Counted(2));
        assert_eq!(counter.count(p), Some(2));

        for _ in 0..5 {
            assert_eq!(counter.on_sys_enter(q), TraceOutcome::Untracked);
        }
        assert_eq!(counter.count(q), None);
        assert_eq!(counter.counts().len(), 1);
    }

    #[test]
    fn forgotten_process_frees_its_slot() {
        let counter = SyscallCounter::new(1);
        let p = Pid::from_raw(1);
        counter.tracked().track(p).unwrap();
        counter.on_sys_enter(p);
        counter.forget(p);
        // tracking and counting share the bound
        counter.tracked().track(Pid::from_raw(2)).unwrap();
        assert_eq!(counter.on_sys_enter(Pid::from_raw(2)), TraceOutcome::Counted(1));
        assert_eq!(counter.on_sys_enter(p), TraceOutcome::Untracked);
    }

    #[test]
    fn dropped_when_counts_are_full() {
        let counter = SyscallCounter::new(2);
        let (a, b) = (Pid::from_raw(1), Pid::from_raw(2));
        counter.tracked().track(a).unwrap();
        counter.tracked().track(b).unwrap();
        counter.on_sys_enter(a);
        // a's counter survives untracking, the table is still full
        counter.tracked().untrack(a);
        counter.tracked().track(Pid::from_raw(3)).unwrap();
        counter.on_sys_enter(b);
        assert_eq!(counter.on_sys_enter(Pid::from_raw(3)), TraceOutcome::Dropped);
        assert_eq!(counter.forget(a), Some(1));
        assert_eq!(counter.on_sys_enter(Pid::from_raw(3)), TraceOutcome::Counted(1));
    }

    #[test]
    fn forget_reaps_the_count() {
        let counter = SyscallCounter::default();
        let p = Pid::from_raw(7);
        counter.tracked().track(p).unwrap();
        counter.on_sys_enter(p);
        assert_eq!(counter.forget(p), Some(1));
        assert_eq!(counter.on_sys_enter(p), TraceOutcome::Untracked);
        assert_eq!(counter.count(p), None);
    }

    #[test]
    fn concurrent_first_syscalls_are_not_lost() {
        const THREADS: u64 = 8;
        const PER_THREAD: u64 = 250;

        for _ in 0..20 {
            let counter = SyscallCounter::default();
            let p = Pid::from_raw(4242);
            counter.tracked().track(p).unwrap();
            std::thread::scope(|s| {
                for _ in 0..THREADS {
                    s.spawn(|| {
                        for _ in 0..PER_THREAD {
                            counter.on_sys_enter(p);
                        }
                    });
                }
            });
            assert_eq!(counter.count(p), Some(THREADS * PER_THREAD));
        }
    }

    #[test]
    fn drain_keeps_tracking() {
        let counter = SyscallCounter::default();
        let p = Pid::from_raw(9);
        counter.tracked().track(p).unwrap();
        counter.on_sys_enter(p);
        counter.on_sys_enter(p);
        assert_eq!(counter.drain_counts(), HashMap::from([(p, 2)]));
        assert_eq!(counter.on_sys_enter(p), TraceOutcome::Counted(1));
        assert_eq!(counter.sorted_counts(), vec![(p, 1)]);
    }
}

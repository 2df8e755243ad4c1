//! Execution contexts.
//!
//! Every event is classified on some execution context. In the kernel that is
//! the CPU the probe fires on; here every thread gets an id the first time it
//! asks for one. Ids are handed out round-robin over [`possible_cpus`], so two
//! threads may share an id and per-context storage must still be updated
//! atomically.

use std::{
    cell::Cell,
    fmt,
    sync::{
        OnceLock,
        atomic::{AtomicUsize, Ordering},
    },
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CpuId(usize);

impl CpuId {
    /// Build an id, wrapping it into the range of possible contexts.
    pub fn new(raw: usize) -> Self {
        Self(raw % possible_cpus())
    }

    pub fn as_usize(self) -> usize {
        self.0
    }
}

impl fmt::Display for CpuId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "cpu{}", self.0)
    }
}

/// Number of execution contexts. Computed once.
pub fn possible_cpus() -> usize {
    static POSSIBLE: OnceLock<usize> = OnceLock::new();
    *POSSIBLE.get_or_init(|| num_cpus::get().max(1))
}

static NEXT_ID: AtomicUsize = AtomicUsize::new(0);

thread_local! {
    static CURRENT: Cell<Option<CpuId>> = const { Cell::new(None) };
}

/// Execution context of the calling thread.
pub fn current() -> CpuId {
    CURRENT.with(|current| match current.get() {
        Some(id) => id,
        None => {
            let id = CpuId::new(NEXT_ID.fetch_add(1, Ordering::Relaxed));
            current.set(Some(id));
            id
        }
    })
}

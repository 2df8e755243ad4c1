use std::sync::atomic::{AtomicU64, Ordering};

use crate::cpu::{self, CpuId};

/// One context's copy of the counters, on its own cache line.
#[repr(align(64))]
struct Slot<const N: usize>([AtomicU64; N]);

impl<const N: usize> Slot<N> {
    fn new() -> Self {
        Self(std::array::from_fn(|_| AtomicU64::new(0)))
    }
}

/// `N` logical counters, each stored once per execution context.
///
/// Writers only touch the slot of their own context; the logical value is the
/// sum over all contexts and is computed on read.
pub struct PerCpuArray<const N: usize> {
    slots: Box<[Slot<N>]>,
}

impl<const N: usize> PerCpuArray<N> {
    pub fn new() -> Self {
        Self {
            slots: (0..cpu::possible_cpus()).map(|_| Slot::new()).collect(),
        }
    }

    /// Indexes past `N` are ignored.
    pub fn increment(&self, cpu: CpuId, index: usize) {
        self.add(cpu, index, 1);
    }

    pub fn add(&self, cpu: CpuId, index: usize, value: u64) {
        let slot = &self.slots[cpu.as_usize() % self.slots.len()];
        if let Some(counter) = slot.0.get(index) {
            counter.fetch_add(value, Ordering::Relaxed);
        }
    }

    /// Sum over every context.
    pub fn get(&self, index: usize) -> u64 {
        self.per_cpu(index)
            .into_iter()
            .fold(0u64, |total, value| total.wrapping_add(value))
    }

    pub fn per_cpu(&self, index: usize) -> Vec<u64> {
        if index >= N {
            return Vec::new();
        }
        self.slots
            .iter()
            .map(|slot| slot.0[index].load(Ordering::Relaxed))
            .collect()
    }

    /// Read and zero counter `index` on every context in one pass. Increments
    /// landing while it runs go either to the returned sum or to the next one.
    pub fn drain(&self, index: usize) -> u64 {
        if index >= N {
            return 0;
        }
        self.slots
            .iter()
            .map(|slot| slot.0[index].swap(0, Ordering::Relaxed))
            .fold(0u64, |total, value| total.wrapping_add(value))
    }

    pub fn reset(&self) {
        for slot in self.slots.iter() {
            for counter in slot.0.iter() {
                counter.store(0, Ordering::Relaxed);
            }
        }
    }
}

impl<const N: usize> Default for PerCpuArray<N> {
    fn default() -> Self {
        Self::new()
    }
}

//! Control tables shared between the classifiers and the control plane.
//!
//! These mirror the kernel map types the probes are written against:
//!
//! | map             | kernel counterpart         | readers          | writers                 |
//! |-----------------|----------------------------|------------------|-------------------------|
//! | [`IndexedArray`]| dense-index hash / array   | lock-free        | control plane           |
//! | [`CowHashMap`]  | hash                       | shared snapshot  | control plane           |
//! | [`PerCpuArray`] | per-cpu array              | control plane    | every context, unshared |
//! | [`CounterMap`]  | hash + atomic add          | control plane    | every context, shared   |
//!
//! Readers never observe a partially written entry: [`IndexedArray`] slots are
//! single atomic words and [`CowHashMap`] publishes whole new versions.

mod counter_map;
mod cow_hash;
mod indexed_array;
mod per_cpu;

pub use counter_map::CounterMap;
pub use cow_hash::CowHashMap;
pub use indexed_array::{IndexedArray, Packed};
pub use per_cpu::PerCpuArray;

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MapError {
    #[error("index {index} is out of bounds (capacity {capacity})")]
    IndexOutOfBounds { index: u32, capacity: u32 },
    #[error("map is full ({max_entries} entries)")]
    Full { max_entries: usize },
}

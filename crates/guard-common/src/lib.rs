//! Primitives shared by the podguard classifiers and their control plane.
//!
//! - [`cpu`]: execution context ids, used to shard counters
//! - [`maps`]: the control tables consulted on every event and mutated by the
//!   control plane
//! - [`parsing`]: bounds-checked protocol header parsing

pub mod cpu;
pub mod maps;
pub mod parsing;
#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;

pub use cpu::CpuId;
pub use maps::MapError;
pub use nix::unistd::Pid;

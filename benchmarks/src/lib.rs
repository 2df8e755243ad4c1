//! Criterion benchmarks of the per-event classification paths, see `benches/`.

//! Cost of one event on each data path, alone and with every thread of the
//! machine hammering the same classifier.
use std::{
    hint::black_box,
    sync::{Arc, Barrier},
};

use criterion::{Criterion, criterion_group, criterion_main};
use guard_common::{
    Pid,
    parsing::IpProto,
    test_utils::{tcp_frame, udp_frame},
};
use l4_firewall::{FirewallRule, L4Firewall, MAX_RULES, Packet};
use syscall_counter::SyscallCounter;

criterion_main!(benches);
criterion_group!(benches, firewall_benchmark, syscall_benchmark);

/// Events each thread classifies per iteration of the contended benchmarks.
const EVENTS_PER_THREAD: usize = 1000;

const IFINDEX: u32 = 2;

fn threads() -> usize {
    std::thread::available_parallelism().map_or(4, |n| n.get())
}

/// Firewall with every rule slot used, the matching rule in the last one.
fn full_firewall() -> L4Firewall {
    let firewall = L4Firewall::default();
    firewall.gate().enable(IFINDEX).unwrap();
    for index in 0..MAX_RULES - 1 {
        let rule = FirewallRule::allow(10_000 + index as u16, IpProto::Tcp);
        firewall.rules().insert(index, rule).unwrap();
    }
    firewall
        .rules()
        .insert(MAX_RULES - 1, FirewallRule::block(22, IpProto::Tcp))
        .unwrap();
    firewall
}

pub fn firewall_benchmark(c: &mut Criterion) {
    let mut c = c.benchmark_group("l4-firewall");

    let firewall = Arc::new(full_firewall());
    let ssh = tcp_frame(22);
    let dns = udp_frame(53);
    c.bench_function("last rule", |bencher| {
        bencher.iter(|| firewall.classify(black_box(&Packet::new(IFINDEX, &ssh))))
    });
    c.bench_function("no match", |bencher| {
        bencher.iter(|| firewall.classify(black_box(&Packet::new(IFINDEX, &dns))))
    });
    c.bench_function("gate inactive", |bencher| {
        bencher.iter(|| firewall.classify(black_box(&Packet::new(IFINDEX + 1, &ssh))))
    });

    let tasks = (0..threads())
        .map(|_| {
            let firewall = firewall.clone();
            let ssh = ssh.clone();
            Box::new(move || {
                for _ in 0..EVENTS_PER_THREAD {
                    black_box(firewall.classify(&Packet::new(IFINDEX, &ssh)));
                }
            }) as Closure
        })
        .collect();
    let runner = ThreadRunner::new(tasks);
    c.sample_size(10)
        .bench_function("contended", |bencher| bencher.iter(|| runner.run()));
}

pub fn syscall_benchmark(c: &mut Criterion) {
    let mut c = c.benchmark_group("syscall-counter");

    let counter = Arc::new(SyscallCounter::default());
    let pid = Pid::from_raw(1000);
    counter.tracked().track(pid).unwrap();
    c.bench_function("tracked", |bencher| {
        bencher.iter(|| counter.on_sys_enter(black_box(pid)))
    });
    c.bench_function("untracked", |bencher| {
        bencher.iter(|| counter.on_sys_enter(black_box(Pid::from_raw(2000))))
    });

    // every thread of one process on its own context
    let tasks = (0..threads())
        .map(|_| {
            let counter = counter.clone();
            Box::new(move || {
                for _ in 0..EVENTS_PER_THREAD {
                    black_box(counter.on_sys_enter(pid));
                }
            }) as Closure
        })
        .collect();
    let runner = ThreadRunner::new(tasks);
    c.sample_size(10)
        .bench_function("contended", |bencher| bencher.iter(|| runner.run()));
}

/// A function which can be executed inside the thread runner
type Closure = Box<dyn FnMut() + Send + 'static>;

/// Benchmark utility to start several threads at the same time
struct ThreadRunner {
    barrier: Arc<Barrier>,
}

impl ThreadRunner {
    fn new(tasks: Vec<Closure>) -> Self {
        let barrier = Arc::new(Barrier::new(tasks.len() + 1));
        tasks.into_iter().for_each(|mut task| {
            let c = barrier.clone();
            std::thread::spawn(move || {
                loop {
                    c.wait();
                    task();
                    c.wait();
                }
            });
        });
        Self { barrier }
    }

    fn run(&self) {
        self.barrier.wait();
        self.barrier.wait();
    }
}

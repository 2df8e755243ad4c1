use std::{
    collections::{BTreeMap, HashMap},
    sync::Arc,
};

use guard_common::{MapError, Pid};
use l4_firewall::{L4Firewall, L4FirewallConfig, StatsSnapshot};
use parking_lot::RwLock;
use serde::Serialize;
use syscall_counter::{SyscallCounter, SyscallCounterConfig};
use thiserror::Error;

use crate::config::WorkloadConfig;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ManagerError {
    #[error("workload {0} is not attached")]
    UnknownWorkload(String),
    #[error("failed to enable interface {ifindex} for workload {workload}")]
    EnableInterface {
        workload: String,
        ifindex: u32,
        #[source]
        source: MapError,
    },
}

/// The classifiers running for one workload.
pub struct WorkloadProgram {
    config: WorkloadConfig,
    firewall: Option<Arc<L4Firewall>>,
    syscall_counter: Option<Arc<SyscallCounter>>,
}

impl WorkloadProgram {
    fn build(workload: &str, config: WorkloadConfig) -> Result<Self, ManagerError> {
        let firewall = config
            .firewall
            .as_ref()
            .map(|firewall| setup_firewall(workload, firewall))
            .transpose()?;
        let syscall_counter = config
            .syscall_counter
            .as_ref()
            .map(|counter| setup_syscall_counter(workload, counter));
        Ok(Self {
            config,
            firewall,
            syscall_counter,
        })
    }

    pub fn config(&self) -> &WorkloadConfig {
        &self.config
    }

    fn metrics(&self, workload: &str) -> WorkloadMetrics {
        WorkloadMetrics {
            workload: workload.to_string(),
            firewall: self.firewall.as_ref().map(|firewall| firewall.stats().snapshot()),
            syscalls: self.syscall_counter.as_ref().map(|counter| {
                counter
                    .counts()
                    .into_iter()
                    .map(|(pid, count)| (pid.as_raw(), count))
                    .collect()
            }),
        }
    }

    fn teardown(&self) {
        if let Some(firewall) = &self.firewall {
            firewall.reset();
        }
        if let Some(counter) = &self.syscall_counter {
            counter.reset();
        }
    }
}

fn setup_firewall(workload: &str, config: &L4FirewallConfig) -> Result<Arc<L4Firewall>, ManagerError> {
    let firewall = L4Firewall::new(config.max_rules);
    for (index, rule) in (0u32..).zip(config.rules()) {
        if let Err(err) = firewall.rules().insert(index, rule) {
            log::warn!(
                "Failed to add firewall rule for {workload}: port {} ({err})",
                rule.port
            );
        }
    }
    for ifindex in &config.interfaces {
        firewall
            .gate()
            .enable(*ifindex)
            .map_err(|source| ManagerError::EnableInterface {
                workload: workload.to_string(),
                ifindex: *ifindex,
                source,
            })?;
    }
    Ok(Arc::new(firewall))
}

fn setup_syscall_counter(workload: &str, config: &SyscallCounterConfig) -> Arc<SyscallCounter> {
    let counter = SyscallCounter::new(config.max_entries);
    track_pids(workload, &counter, &config.pid_targets);
    Arc::new(counter)
}

fn track_pids(workload: &str, counter: &SyscallCounter, pids: &[Pid]) {
    for pid in pids {
        if let Err(err) = counter.tracked().track(*pid) {
            log::warn!("Failed to track pid {pid} for {workload}: {err}");
        }
    }
}

/// Counters of one workload at collection time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WorkloadMetrics {
    pub workload: String,
    pub firewall: Option<StatsSnapshot>,
    /// Syscall count by pid.
    pub syscalls: Option<BTreeMap<i32, u64>>,
}

/// Owns the classifiers of every attached workload.
#[derive(Default)]
pub struct GuardManager {
    programs: RwLock<HashMap<String, WorkloadProgram>>,
}

impl GuardManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start classifying for `workload`. Attaching twice updates the
    /// existing programs instead.
    pub fn attach(&self, workload: &str, config: WorkloadConfig) -> Result<(), ManagerError> {
        let mut programs = self.programs.write();
        if let Some(program) = programs.get_mut(workload) {
            log::debug!("Workload {workload} already attached");
            let pids = config
                .syscall_counter
                .as_ref()
                .map(|counter| counter.pid_targets.clone())
                .unwrap_or_default();
            update_program(workload, program, config, &pids);
            return Ok(());
        }

        log::info!("Attaching to workload {workload}");
        let program = WorkloadProgram::build(workload, config)?;
        programs.insert(workload.to_string(), program);
        Ok(())
    }

    /// Replace the configuration of an attached workload and track `pids`.
    /// Running tables are kept.
    pub fn update(
        &self,
        workload: &str,
        config: WorkloadConfig,
        pids: &[Pid],
    ) -> Result<(), ManagerError> {
        let mut programs = self.programs.write();
        let program = programs
            .get_mut(workload)
            .ok_or_else(|| ManagerError::UnknownWorkload(workload.to_string()))?;
        update_program(workload, program, config, pids);
        Ok(())
    }

    /// Stop classifying for `workload`. Returns whether it was attached.
    pub fn detach(&self, workload: &str) -> bool {
        let Some(program) = self.programs.write().remove(workload) else {
            log::debug!("No programs attached to workload {workload}");
            return false;
        };
        log::info!("Detaching from workload {workload}");
        program.teardown();
        true
    }

    pub fn detach_all(&self) {
        let programs: Vec<_> = self.programs.write().drain().collect();
        for (workload, program) in programs {
            log::info!("Detaching from workload {workload}");
            program.teardown();
        }
    }

    /// Stop tracking an exited process everywhere and drop its counters.
    /// Returns the final count of each workload that was counting it.
    pub fn process_exited(&self, pid: Pid) -> Vec<(String, u64)> {
        let programs = self.programs.read();
        let mut reaped: Vec<_> = programs
            .iter()
            .filter_map(|(workload, program)| {
                let count = program.syscall_counter.as_ref()?.forget(pid)?;
                Some((workload.clone(), count))
            })
            .collect();
        reaped.sort();
        for (workload, count) in &reaped {
            log::debug!("Process {pid} of {workload} exited after {count} syscalls");
        }
        reaped
    }

    /// Counters of every workload, sorted by workload id.
    pub fn collect_metrics(&self) -> Vec<WorkloadMetrics> {
        let mut metrics: Vec<_> = self
            .programs
            .read()
            .iter()
            .map(|(workload, program)| program.metrics(workload))
            .collect();
        metrics.sort_by(|a, b| a.workload.cmp(&b.workload));
        metrics
    }

    pub fn workloads(&self) -> Vec<String> {
        let mut workloads: Vec<_> = self.programs.read().keys().cloned().collect();
        workloads.sort();
        workloads
    }

    pub fn is_attached(&self, workload: &str) -> bool {
        self.programs.read().contains_key(workload)
    }

    pub fn config(&self, workload: &str) -> Option<WorkloadConfig> {
        self.programs
            .read()
            .get(workload)
            .map(|program| program.config().clone())
    }

    /// Packet classifier of `workload`, if its firewall is enabled.
    pub fn firewall(&self, workload: &str) -> Option<Arc<L4Firewall>> {
        self.programs.read().get(workload)?.firewall.clone()
    }

    /// Syscall tracer of `workload`, if syscall counting is enabled.
    pub fn syscall_counter(&self, workload: &str) -> Option<Arc<SyscallCounter>> {
        self.programs.read().get(workload)?.syscall_counter.clone()
    }
}

fn update_program(workload: &str, program: &mut WorkloadProgram, config: WorkloadConfig, pids: &[Pid]) {
    program.config = config;
    if let Some(counter) = &program.syscall_counter {
        track_pids(workload, counter, pids);
    }
}

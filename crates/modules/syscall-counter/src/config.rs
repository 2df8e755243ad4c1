use guard_common::Pid;
use guard_core::pdk::{ConfigError, ModuleConfig};

pub const MAX_ENTRIES: usize = 1024;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyscallCounterConfig {
    pub pid_targets: Vec<Pid>,
    pub max_entries: usize,
}

impl Default for SyscallCounterConfig {
    fn default() -> Self {
        Self {
            pid_targets: Vec::new(),
            max_entries: MAX_ENTRIES,
        }
    }
}

impl TryFrom<&ModuleConfig> for SyscallCounterConfig {
    type Error = ConfigError;

    fn try_from(config: &ModuleConfig) -> Result<Self, Self::Error> {
        let raw_pids: Vec<i32> = config.get_list("pid_targets")?;
        if let Some(bad) = raw_pids.iter().find(|pid| **pid <= 0) {
            return Err(ConfigError::InvalidValue {
                field: "pid_targets".to_string(),
                value: bad.to_string(),
                err: "pids must be positive".to_string(),
            });
        }
        let max_entries = config.with_default("max_entries", MAX_ENTRIES)?;
        if max_entries == 0 {
            return Err(ConfigError::InvalidValue {
                field: "max_entries".to_string(),
                value: max_entries.to_string(),
                err: "must be at least 1".to_string(),
            });
        }
        Ok(SyscallCounterConfig {
            pid_targets: raw_pids.into_iter().map(Pid::from_raw).collect(),
            max_entries,
        })
    }
}

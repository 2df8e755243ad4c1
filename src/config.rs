use std::{collections::HashMap, path::PathBuf, time::Duration};

use anyhow::{Context, Result, bail};
use guard_core::pdk::{ConfigError, GuardModule, ModuleConfig};
use l4_firewall::{L4FirewallConfig, L4FirewallModule};
use syscall_counter::{SyscallCounterConfig, SyscallCounterModule};

pub const METRICS_CONFIG: &str = "metrics";

/// Configuration of every module, one `INI` section per module.
#[derive(Debug, Clone, Default)]
pub struct GuardConfig {
    config_file: Option<PathBuf>,
    configs: HashMap<String, ModuleConfig>,
}

impl GuardConfig {
    /// Load a configuration file. The file must exist.
    pub fn with_custom_file(config_file: &str) -> Result<Self> {
        let config_file = PathBuf::from(config_file);
        if !config_file.exists() {
            bail!("Configuration file {} not found", config_file.display());
        }
        let conf = ini::Ini::load_from_file(&config_file)
            .with_context(|| format!("Error loading configuration from {config_file:?}"))?;
        Ok(Self {
            config_file: Some(config_file),
            configs: module_configs(&conf),
        })
    }

    pub fn from_ini_str(content: &str) -> Result<Self> {
        let conf = ini::Ini::load_from_str(content).context("Error parsing configuration")?;
        Ok(Self {
            config_file: None,
            configs: module_configs(&conf),
        })
    }

    pub fn config_file(&self) -> Option<&PathBuf> {
        self.config_file.as_ref()
    }

    /// Get module configuration, if the file has a section for it.
    pub fn get_module_config(&self, module: &str) -> Option<ModuleConfig> {
        self.configs.get(module).cloned()
    }

    /// All sections, sorted by module name.
    pub fn get_configs(&self) -> Vec<(String, ModuleConfig)> {
        let mut configs: Vec<_> = self
            .configs
            .iter()
            .map(|(module, config)| (module.clone(), config.clone()))
            .collect();
        configs.sort_by(|a, b| a.0.cmp(&b.0));
        configs
    }

    /// The typed configuration of `T`, or `None` if it is disabled.
    pub fn module<T: GuardModule>(&self) -> Result<Option<T::Config>, ConfigError> {
        let config = self.get_module_config(T::MODULE_NAME).unwrap_or_default();
        if !T::is_enabled(&config)? {
            return Ok(None);
        }
        T::config(&config).map(Some)
    }

    pub fn workload_config(&self) -> Result<WorkloadConfig> {
        Ok(WorkloadConfig {
            firewall: self
                .module::<L4FirewallModule>()
                .with_context(|| format!("Invalid [{}] section", L4FirewallModule::MODULE_NAME))?,
            syscall_counter: self.module::<SyscallCounterModule>().with_context(|| {
                format!("Invalid [{}] section", SyscallCounterModule::MODULE_NAME)
            })?,
        })
    }

    pub fn metrics_config(&self) -> Result<MetricsConfig> {
        let config = self.get_module_config(METRICS_CONFIG).unwrap_or_default();
        MetricsConfig::try_from(&config)
            .with_context(|| format!("Invalid [{METRICS_CONFIG}] section"))
    }
}

fn module_configs(conf: &ini::Ini) -> HashMap<String, ModuleConfig> {
    let mut configs: HashMap<String, ModuleConfig> = HashMap::new();
    for (section, prop) in conf {
        if let Some(section) = section {
            let mod_config = configs.entry(section.to_string()).or_default();
            for (key, value) in prop.iter() {
                log::debug!("{}.{}={}", section, key, value);
                mod_config.insert(key.to_string(), value.to_string());
            }
        }
    }
    configs
}

/// The programs to run for one workload. A disabled module is `None`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WorkloadConfig {
    pub firewall: Option<L4FirewallConfig>,
    pub syscall_counter: Option<SyscallCounterConfig>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MetricsConfig {
    pub enabled: bool,
    pub interval: Duration,
}

pub const DEFAULT_METRICS_INTERVAL_SECS: u64 = 30;

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            interval: Duration::from_secs(DEFAULT_METRICS_INTERVAL_SECS),
        }
    }
}

impl TryFrom<&ModuleConfig> for MetricsConfig {
    type Error = ConfigError;

    fn try_from(config: &ModuleConfig) -> Result<Self, Self::Error> {
        let interval_secs = config.with_default("interval_secs", DEFAULT_METRICS_INTERVAL_SECS)?;
        if interval_secs == 0 {
            return Err(ConfigError::InvalidValue {
                field: "interval_secs".to_string(),
                value: interval_secs.to_string(),
                err: "must be at least 1".to_string(),
            });
        }
        Ok(Self {
            enabled: config.with_default("enabled", true)?,
            interval: Duration::from_secs(interval_secs),
        })
    }
}

#[cfg(test)]
mod tests {
    use guard_common::{Pid, parsing::IpProto};

    use super::*;

    const CONFIG: &str = r#"
[l4-firewall]
enabled=true
allowed_ports=80,443
blocked_ports=22
interfaces=2,3

[syscall-counter]
enabled=true
pid_targets=100

[metrics]
interval_secs=5
"#;

    #[test]
    fn sections_become_module_configs() {
        let config = GuardConfig::from_ini_str(CONFIG).unwrap();
        let names: Vec<_> = config.get_configs().into_iter().map(|(name, _)| name).collect();
        assert_eq!(names, ["l4-firewall", "metrics", "syscall-counter"]);
        assert_eq!(
            config
                .get_module_config("l4-firewall")
                .unwrap()
                .get_list::<u16>("blocked_ports"),
            Ok(vec![22])
        );
        assert!(config.get_module_config("missing").is_none());
    }

    #[test]
    fn workload_config() {
        let config = GuardConfig::from_ini_str(CONFIG).unwrap();
        let workload = config.workload_config().unwrap();
        let firewall = workload.firewall.unwrap();
        assert_eq!(firewall.allowed_ports, vec![80, 443]);
        assert_eq!(firewall.interfaces, vec![2, 3]);
        assert_eq!(firewall.protocol, IpProto::Tcp);
        assert_eq!(
            workload.syscall_counter.unwrap().pid_targets,
            vec![Pid::from_raw(100)]
        );
        assert_eq!(
            config.metrics_config().unwrap(),
            MetricsConfig {
                enabled: true,
                interval: Duration::from_secs(5),
            }
        );
    }

    #[test]
    fn modules_are_disabled_by_default() {
        let config = GuardConfig::from_ini_str("[l4-firewall]\nblocked_ports=22\n").unwrap();
        assert_eq!(config.workload_config().unwrap(), WorkloadConfig::default());
        assert_eq!(config.metrics_config().unwrap(), MetricsConfig::default());
    }

    #[test]
    fn invalid_sections_are_reported() {
        let config = GuardConfig::from_ini_str("[l4-firewall]\nenabled=yes\n").unwrap();
        let err = config.workload_config().unwrap_err();
        assert!(format!("{err:#}").contains("[l4-firewall]"));

        let config = GuardConfig::from_ini_str("[metrics]\ninterval_secs=0\n").unwrap();
        assert!(config.metrics_config().is_err());
    }

    #[test]
    fn missing_file() {
        let err = GuardConfig::with_custom_file("/nonexistent/podguard.ini").unwrap_err();
        assert!(err.to_string().contains("not found"));
    }

    #[test]
    fn load_file() {
        let path = std::env::temp_dir().join(format!("podguard-{}.ini", std::process::id()));
        std::fs::write(&path, CONFIG).unwrap();
        let config = GuardConfig::with_custom_file(path.to_str().unwrap()).unwrap();
        std::fs::remove_file(&path).unwrap();
        assert_eq!(config.config_file(), Some(&path));
        assert!(config.workload_config().unwrap().firewall.is_some());
    }
}

//! This module includes what is needed to plug a classifier into podguard.
//!
//! A module describes itself with a [`GuardModule`] implementation: the name of
//! its configuration section, whether it runs when the section doesn't say,
//! and a typed configuration extracted from the raw [`ModuleConfig`].
//!
//! # Example
//!
//! ```
//! use guard_core::pdk::{ConfigError, GuardModule, ModuleConfig};
//!
//! pub struct Echo;
//!
//! pub struct EchoConfig {
//!     pub words: Vec<String>,
//! }
//!
//! impl TryFrom<&ModuleConfig> for EchoConfig {
//!     type Error = ConfigError;
//!
//!     fn try_from(config: &ModuleConfig) -> Result<Self, Self::Error> {
//!         Ok(EchoConfig {
//!             words: config.get_list("words")?,
//!         })
//!     }
//! }
//!
//! impl GuardModule for Echo {
//!     type Config = EchoConfig;
//!
//!     const MODULE_NAME: &'static str = "echo";
//!     const DEFAULT_ENABLED: bool = false;
//! }
//!
//! let mut raw = ModuleConfig::default();
//! raw.insert("enabled".to_string(), "true".to_string());
//! raw.insert("words".to_string(), "a,b".to_string());
//! assert!(Echo::is_enabled(&raw).unwrap());
//! assert_eq!(Echo::config(&raw).unwrap().words, vec!["a", "b"]);
//! ```

mod config;

pub use config::*;

/// Static description of a podguard module.
pub trait GuardModule {
    type Config: for<'a> TryFrom<&'a ModuleConfig, Error = ConfigError>;

    const MODULE_NAME: &'static str;
    const DEFAULT_ENABLED: bool;

    /// Read the `enabled` key, falling back to [`GuardModule::DEFAULT_ENABLED`].
    fn is_enabled(config: &ModuleConfig) -> Result<bool, ConfigError> {
        config.with_default("enabled", Self::DEFAULT_ENABLED)
    }

    fn config(config: &ModuleConfig) -> Result<Self::Config, ConfigError> {
        Self::Config::try_from(config)
    }
}

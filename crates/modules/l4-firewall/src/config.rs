use guard_common::parsing::IpProto;
use guard_core::pdk::{ConfigError, ModuleConfig};

use crate::rules::{FirewallRule, MAX_RULES};

/// Interface enabled when the configuration lists none.
pub const DEFAULT_INTERFACE: u32 = 2;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct L4FirewallConfig {
    pub interfaces: Vec<u32>,
    pub allowed_ports: Vec<u16>,
    pub blocked_ports: Vec<u16>,
    pub protocol: IpProto,
    pub max_rules: u32,
}

impl L4FirewallConfig {
    /// Rules in table order: every allowed port, then every blocked port.
    pub fn rules(&self) -> impl Iterator<Item = FirewallRule> + '_ {
        let allowed = self
            .allowed_ports
            .iter()
            .map(|port| FirewallRule::allow(*port, self.protocol));
        let blocked = self
            .blocked_ports
            .iter()
            .map(|port| FirewallRule::block(*port, self.protocol));
        allowed.chain(blocked)
    }
}

impl Default for L4FirewallConfig {
    fn default() -> Self {
        Self {
            interfaces: vec![DEFAULT_INTERFACE],
            allowed_ports: Vec::new(),
            blocked_ports: Vec::new(),
            protocol: IpProto::Tcp,
            max_rules: MAX_RULES,
        }
    }
}

impl TryFrom<&ModuleConfig> for L4FirewallConfig {
    type Error = ConfigError;

    fn try_from(config: &ModuleConfig) -> Result<Self, Self::Error> {
        let max_rules = config.with_default("max_rules", MAX_RULES)?;
        if !(1..=MAX_RULES).contains(&max_rules) {
            return Err(ConfigError::InvalidValue {
                field: "max_rules".to_string(),
                value: max_rules.to_string(),
                err: format!("rule slots must be between 1 and {MAX_RULES}"),
            });
        }
        Ok(L4FirewallConfig {
            interfaces: config.get_list_with_default("interfaces", vec![DEFAULT_INTERFACE])?,
            allowed_ports: config.get_list("allowed_ports")?,
            blocked_ports: config.get_list("blocked_ports")?,
            protocol: config.with_default("protocol", IpProto::Tcp)?,
            max_rules,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rules::Action;

    #[test]
    fn defaults() {
        let config = L4FirewallConfig::try_from(&ModuleConfig::default()).unwrap();
        assert_eq!(config, L4FirewallConfig::default());
        assert_eq!(config.interfaces, vec![2]);
        assert_eq!(config.rules().count(), 0);
    }

    #[test]
    fn allowed_ports_come_first() {
        let raw = ModuleConfig::from_iter([
            ("allowed_ports", "80, 443"),
            ("blocked_ports", "22"),
            ("protocol", "udp"),
            ("interfaces", "3,4"),
        ]);
        let config = L4FirewallConfig::try_from(&raw).unwrap();
        assert_eq!(config.interfaces, vec![3, 4]);
        let rules: Vec<_> = config.rules().collect();
        assert_eq!(
            rules,
            vec![
                FirewallRule::allow(80, IpProto::Udp),
                FirewallRule::allow(443, IpProto::Udp),
                FirewallRule::block(22, IpProto::Udp),
            ]
        );
        assert_eq!(rules[2].action, Action::Block);
    }

    #[test]
    fn invalid_values() {
        let bad_port = ModuleConfig::from_iter([("blocked_ports", "22,70000")]);
        assert!(matches!(
            L4FirewallConfig::try_from(&bad_port),
            Err(ConfigError::InvalidValue { field, .. }) if field == "blocked_ports"
        ));
        let bad_proto = ModuleConfig::from_iter([("protocol", "sctp")]);
        assert!(L4FirewallConfig::try_from(&bad_proto).is_err());
        let no_slots = ModuleConfig::from_iter([("max_rules", "0")]);
        assert!(L4FirewallConfig::try_from(&no_slots).is_err());
    }

    #[test]
    fn rule_slots_are_bounded() {
        let most = ModuleConfig::from_iter([("max_rules", "256")]);
        assert_eq!(L4FirewallConfig::try_from(&most).unwrap().max_rules, MAX_RULES);
        let few = ModuleConfig::from_iter([("max_rules", "8")]);
        assert_eq!(L4FirewallConfig::try_from(&few).unwrap().max_rules, 8);
        for value in ["257", "4294967295"] {
            let raw = ModuleConfig::from_iter([("max_rules", value)]);
            assert_eq!(
                L4FirewallConfig::try_from(&raw),
                Err(ConfigError::InvalidValue {
                    field: "max_rules".to_string(),
                    value: value.to_string(),
                    err: "rule slots must be between 1 and 256".to_string(),
                })
            );
        }
    }
}

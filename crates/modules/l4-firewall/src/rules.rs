use guard_common::{
    MapError,
    maps::{IndexedArray, Packed},
    parsing::IpProto,
};

/// Number of rule slots when the configuration doesn't say otherwise, and
/// the most a configuration may ask for.
pub const MAX_RULES: u32 = 256;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Action {
    Allow = 0,
    Block = 1,
}

impl Action {
    fn from_raw(raw: u8) -> Option<Self> {
        match raw {
            0 => Some(Action::Allow),
            1 => Some(Action::Block),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FirewallRule {
    pub port: u16,
    pub protocol: IpProto,
    pub action: Action,
}

impl FirewallRule {
    pub fn allow(port: u16, protocol: IpProto) -> Self {
        Self {
            port,
            protocol,
            action: Action::Allow,
        }
    }

    pub fn block(port: u16, protocol: IpProto) -> Self {
        Self {
            port,
            protocol,
            action: Action::Block,
        }
    }

    fn matches(&self, port: u16, protocol: IpProto) -> bool {
        self.port == port && self.protocol == protocol
    }
}

// port (16 bits) | protocol (8 bits) | action (8 bits)
impl Packed for FirewallRule {
    fn pack(&self) -> u32 {
        ((self.port as u32) << 16) | ((self.protocol.as_raw() as u32) << 8) | self.action as u32
    }

    fn unpack(word: u32) -> Option<Self> {
        Some(Self {
            port: (word >> 16) as u16,
            protocol: IpProto::from_raw((word >> 8) as u8)?,
            action: Action::from_raw(word as u8)?,
        })
    }
}

/// Rules stored by index. The index is the priority: the lowest matching
/// index decides.
pub struct RuleTable {
    rules: IndexedArray<FirewallRule>,
}

impl RuleTable {
    pub fn with_capacity(capacity: u32) -> Self {
        Self {
            rules: IndexedArray::with_capacity(capacity),
        }
    }

    pub fn capacity(&self) -> u32 {
        self.rules.capacity()
    }

    /// Store `rule` at `index`, replacing what was there.
    pub fn insert(&self, index: u32, rule: FirewallRule) -> Result<Option<FirewallRule>, MapError> {
        self.rules.set(index, rule)
    }

    pub fn remove(&self, index: u32) -> Result<Option<FirewallRule>, MapError> {
        self.rules.clear(index)
    }

    pub fn get(&self, index: u32) -> Option<FirewallRule> {
        self.rules.get(index)
    }

    /// Action of the first rule matching `port` and `protocol`, in ascending
    /// index order. Without a match the traffic is allowed.
    pub fn resolve(&self, port: u16, protocol: IpProto) -> Action {
        self.rules
            .iter()
            .find(|(_, rule)| rule.matches(port, protocol))
            .map_or(Action::Allow, |(_, rule)| rule.action)
    }

    pub fn iter(&self) -> impl Iterator<Item = (u32, FirewallRule)> + '_ {
        self.rules.iter()
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    pub fn clear(&self) {
        self.rules.reset()
    }
}

impl Default for RuleTable {
    fn default() -> Self {
        Self::with_capacity(MAX_RULES)
    }
}

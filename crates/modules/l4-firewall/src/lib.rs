//! Layer 4 ingress firewall.
//!
//! Every received frame goes through the same pipeline:
//!
//! 1. the [`InterfaceGate`] decides if the ingress interface is classified at all;
//! 2. the frame is parsed down to its TCP or UDP header;
//! 3. the protocol packet counter is incremented;
//! 4. the [`RuleTable`] resolves the destination port to an [`Action`];
//! 5. the `allowed` or `blocked` counter is incremented.
//!
//! Any failure along the way lets the packet through untouched: an inactive
//! interface, a frame outside IPv4 TCP/UDP and a truncated frame are all
//! [`Outcome::Bypassed`], and no rule or later counter is involved.
//!
//! The tables are written by the control plane only. Classification reads
//! them without locks and can run on many threads at once.

use guard_common::{
    CpuId, cpu,
    parsing::{Malformed, ParseError, Unsupported, parse_l4},
};
use guard_core::pdk::GuardModule;

mod config;
mod gate;
mod rules;
mod stats;

pub use config::{DEFAULT_INTERFACE, L4FirewallConfig};
pub use gate::{InterfaceGate, MAX_INTERFACES};
pub use rules::{Action, FirewallRule, MAX_RULES, RuleTable};
pub use stats::{STAT_COUNTERS, StatCounter, Stats, StatsSnapshot};

pub const MODULE_NAME: &str = "l4-firewall";

/// `tc` action letting the packet continue.
pub const TC_ACT_OK: i32 = 0;
/// `tc` action dropping the packet.
pub const TC_ACT_SHOT: i32 = 2;

pub struct L4FirewallModule;

impl GuardModule for L4FirewallModule {
    type Config = L4FirewallConfig;

    const MODULE_NAME: &'static str = MODULE_NAME;
    const DEFAULT_ENABLED: bool = false;
}

/// A frame as delivered by the transport: raw bytes starting at the
/// Ethernet header, and the interface it was received on.
#[derive(Debug, Clone, Copy)]
pub struct Packet<'a> {
    pub ifindex: u32,
    pub data: &'a [u8],
}

impl<'a> Packet<'a> {
    pub fn new(ifindex: u32, data: &'a [u8]) -> Self {
        Self { ifindex, data }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Bypassed(BypassReason),
    Allowed,
    Blocked,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BypassReason {
    GateInactive,
    NotApplicable(Unsupported),
    Malformed(Malformed),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    Forward,
    Drop,
}

impl Outcome {
    pub fn verdict(&self) -> Verdict {
        match self {
            Outcome::Blocked => Verdict::Drop,
            Outcome::Allowed | Outcome::Bypassed(_) => Verdict::Forward,
        }
    }
}

impl Verdict {
    pub fn tc_action(self) -> i32 {
        match self {
            Verdict::Forward => TC_ACT_OK,
            Verdict::Drop => TC_ACT_SHOT,
        }
    }
}

pub struct L4Firewall {
    gate: InterfaceGate,
    rules: RuleTable,
    stats: Stats,
}

impl L4Firewall {
    pub fn new(max_rules: u32) -> Self {
        Self {
            gate: InterfaceGate::new(),
            rules: RuleTable::with_capacity(max_rules),
            stats: Stats::default(),
        }
    }

    pub fn gate(&self) -> &InterfaceGate {
        &self.gate
    }

    pub fn rules(&self) -> &RuleTable {
        &self.rules
    }

    pub fn stats(&self) -> &Stats {
        &self.stats
    }

    /// Classify a packet on the execution context of the calling thread.
    pub fn classify(&self, packet: &Packet<'_>) -> Outcome {
        self.classify_on(cpu::current(), packet)
    }

    pub fn classify_on(&self, cpu: CpuId, packet: &Packet<'_>) -> Outcome {
        if !self.gate.is_active(packet.ifindex) {
            return Outcome::Bypassed(BypassReason::GateInactive);
        }

        let header = match parse_l4(packet.data) {
            Ok(header) => header,
            Err(ParseError::NotApplicable(reason)) => {
                log::trace!("if{}: bypass, {reason}", packet.ifindex);
                return Outcome::Bypassed(BypassReason::NotApplicable(reason));
            }
            Err(ParseError::Malformed(reason)) => {
                log::trace!("if{}: malformed frame, {reason}", packet.ifindex);
                return Outcome::Bypassed(BypassReason::Malformed(reason));
            }
        };
        self.stats.increment(cpu, header.protocol.into());

        match self.rules.resolve(header.dst_port, header.protocol) {
            Action::Block => {
                self.stats.increment(cpu, StatCounter::Blocked);
                log::trace!(
                    "if{}: drop {}/{}",
                    packet.ifindex,
                    header.protocol,
                    header.dst_port
                );
                Outcome::Blocked
            }
            Action::Allow => {
                self.stats.increment(cpu, StatCounter::Allowed);
                Outcome::Allowed
            }
        }
    }

    /// Empty every table and zero the counters.
    pub fn reset(&self) {
        self.gate.clear();
        self.rules.clear();
        self.stats.reset();
    }
}

impl Default for L4Firewall {
    fn default() -> Self {
        Self::new(MAX_RULES)
    }
}

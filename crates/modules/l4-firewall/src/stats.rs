use guard_common::{CpuId, maps::PerCpuArray, parsing::IpProto};
use serde::Serialize;
use strum::{Display, EnumCount, EnumIter, IntoEnumIterator, IntoStaticStr};

/// Number of [`StatCounter`] variants.
pub const STAT_COUNTERS: usize = 4;

/// Packet path counters. The discriminant is the slot in [`Stats`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumCount, EnumIter, IntoStaticStr)]
#[strum(serialize_all = "snake_case")]
pub enum StatCounter {
    Allowed = 0,
    Blocked = 1,
    TcpPackets = 2,
    UdpPackets = 3,
}

impl From<IpProto> for StatCounter {
    fn from(protocol: IpProto) -> Self {
        match protocol {
            IpProto::Tcp => StatCounter::TcpPackets,
            IpProto::Udp => StatCounter::UdpPackets,
        }
    }
}

/// Firewall counters, one copy per execution context.
#[derive(Default)]
pub struct Stats {
    counters: PerCpuArray<STAT_COUNTERS>,
}

impl Stats {
    pub fn increment(&self, cpu: CpuId, counter: StatCounter) {
        self.counters.increment(cpu, counter as usize)
    }

    /// Sum over all execution contexts.
    pub fn get(&self, counter: StatCounter) -> u64 {
        self.counters.get(counter as usize)
    }

    pub fn per_cpu(&self, counter: StatCounter) -> Vec<u64> {
        self.counters.per_cpu(counter as usize)
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            allowed: self.get(StatCounter::Allowed),
            blocked: self.get(StatCounter::Blocked),
            tcp_packets: self.get(StatCounter::TcpPackets),
            udp_packets: self.get(StatCounter::UdpPackets),
        }
    }

    /// Read and zero every counter. Unlike `snapshot` then `reset`, packets
    /// classified in between are kept for the next drain.
    pub fn drain(&self) -> StatsSnapshot {
        StatsSnapshot {
            allowed: self.counters.drain(StatCounter::Allowed as usize),
            blocked: self.counters.drain(StatCounter::Blocked as usize),
            tcp_packets: self.counters.drain(StatCounter::TcpPackets as usize),
            udp_packets: self.counters.drain(StatCounter::UdpPackets as usize),
        }
    }

    pub fn reset(&self) {
        self.counters.reset()
    }
}

/// Aggregated counter values at one point in time.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct StatsSnapshot {
    pub allowed: u64,
    pub blocked: u64,
    pub tcp_packets: u64,
    pub udp_packets: u64,
}

impl StatsSnapshot {
    pub fn get(&self, counter: StatCounter) -> u64 {
        match counter {
            StatCounter::Allowed => self.allowed,
            StatCounter::Blocked => self.blocked,
            StatCounter::TcpPackets => self.tcp_packets,
            StatCounter::UdpPackets => self.udp_packets,
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (StatCounter, u64)> + '_ {
        StatCounter::iter().map(|counter| (counter, self.get(counter)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counter_names() {
        assert_eq!(StatCounter::COUNT, STAT_COUNTERS);
        let names: Vec<&'static str> = StatCounter::iter().map(Into::into).collect();
        assert_eq!(names, ["allowed", "blocked", "tcp_packets", "udp_packets"]);
        assert_eq!(StatCounter::TcpPackets.to_string(), "tcp_packets");
    }

    #[test]
    fn snapshot_sums_contexts() {
        let stats = Stats::default();
        stats.increment(CpuId::new(0), StatCounter::Allowed);
        stats.increment(CpuId::new(1), StatCounter::Allowed);
        stats.increment(CpuId::new(1), StatCounter::UdpPackets);
        let snapshot = stats.snapshot();
        assert_eq!(
            snapshot,
            StatsSnapshot {
                allowed: 2,
                udp_packets: 1,
                ..Default::default()
            }
        );
        assert_eq!(stats.per_cpu(StatCounter::Allowed).iter().sum::<u64>(), 2);

        stats.reset();
        assert_eq!(stats.snapshot(), StatsSnapshot::default());
    }

    #[test]
    fn drain_zeroes_counters() {
        let stats = Stats::default();
        stats.increment(CpuId::new(0), StatCounter::Blocked);
        stats.increment(CpuId::new(1), StatCounter::TcpPackets);
        stats.increment(CpuId::new(1), StatCounter::Blocked);
        assert_eq!(
            stats.drain(),
            StatsSnapshot {
                blocked: 2,
                tcp_packets: 1,
                ..Default::default()
            }
        );
        assert_eq!(stats.snapshot(), StatsSnapshot::default());
        stats.increment(CpuId::new(0), StatCounter::Allowed);
        assert_eq!(stats.drain().allowed, 1);
    }
}

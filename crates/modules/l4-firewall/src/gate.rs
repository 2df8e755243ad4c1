use guard_common::{MapError, maps::CowHashMap};

pub const MAX_INTERFACES: usize = 1024;

/// Per interface switch deciding whether packets are classified at all.
///
/// An interface without an entry is inactive: its traffic bypasses the
/// firewall.
pub struct InterfaceGate {
    flags: CowHashMap<u32, bool>,
}

impl InterfaceGate {
    pub fn new() -> Self {
        Self {
            flags: CowHashMap::with_max_entries(MAX_INTERFACES),
        }
    }

    pub fn is_active(&self, ifindex: u32) -> bool {
        self.flags.get(&ifindex).unwrap_or(false)
    }

    pub fn enable(&self, ifindex: u32) -> Result<(), MapError> {
        self.flags.insert(ifindex, true).map(|_| ())
    }

    /// Keep the entry but turn classification off.
    pub fn disable(&self, ifindex: u32) -> Result<(), MapError> {
        self.flags.insert(ifindex, false).map(|_| ())
    }

    /// Forget the interface. Returns whether it was registered.
    pub fn remove(&self, ifindex: u32) -> bool {
        self.flags.remove(&ifindex).is_some()
    }

    /// Registered interfaces and their flag, sorted by interface index.
    pub fn interfaces(&self) -> Vec<(u32, bool)> {
        let mut interfaces: Vec<_> = self
            .flags
            .snapshot()
            .iter()
            .map(|(ifindex, active)| (*ifindex, *active))
            .collect();
        interfaces.sort_unstable();
        interfaces
    }

    pub fn clear(&self) {
        self.flags.clear()
    }
}

impl Default for InterfaceGate {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unregistered_is_inactive() {
        let gate = InterfaceGate::new();
        assert!(!gate.is_active(2));
    }

    #[test]
    fn enable_disable_remove() {
        let gate = InterfaceGate::new();
        gate.enable(2).unwrap();
        gate.enable(5).unwrap();
        assert!(gate.is_active(2));

        gate.disable(2).unwrap();
        assert!(!gate.is_active(2));
        assert_eq!(gate.interfaces(), vec![(2, false), (5, true)]);

        assert!(gate.remove(5));
        assert!(!gate.remove(5));
        assert!(!gate.is_active(5));
    }

    #[test]
    fn interface_count_is_bounded() {
        let gate = InterfaceGate::new();
        for ifindex in 0..MAX_INTERFACES as u32 {
            gate.enable(ifindex).unwrap();
        }
        assert_eq!(
            gate.enable(u32::MAX),
            Err(MapError::Full {
                max_entries: MAX_INTERFACES
            })
        );
        // flipping an existing flag still works
        gate.disable(0).unwrap();
    }
}

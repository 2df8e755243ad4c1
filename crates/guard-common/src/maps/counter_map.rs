use std::{
    collections::{
        HashMap,
        hash_map::{DefaultHasher, Entry},
    },
    hash::{Hash, Hasher},
    sync::atomic::{AtomicU64, AtomicUsize, Ordering},
};

use parking_lot::RwLock;

use super::MapError;

pub const COUNTER_SHARDS: usize = 64;

/// Map from key to a counter which many contexts increment concurrently.
///
/// [`CounterMap::increment`] is a single linearizable step: it either adds to
/// an existing counter or creates it with value 1, never both, so two first
/// increments racing on the same key both get counted.
pub struct CounterMap<K> {
    shards: Box<[RwLock<HashMap<K, AtomicU64>>]>,
    len: AtomicUsize,
    max_entries: usize,
}

impl<K: Hash + Eq + Copy> CounterMap<K> {
    pub fn with_max_entries(max_entries: usize) -> Self {
        Self {
            shards: (0..COUNTER_SHARDS)
                .map(|_| RwLock::new(HashMap::new()))
                .collect(),
            len: AtomicUsize::new(0),
            max_entries,
        }
    }

    pub fn max_entries(&self) -> usize {
        self.max_entries
    }

    fn shard(&self, key: &K) -> &RwLock<HashMap<K, AtomicU64>> {
        let mut hasher = DefaultHasher::new();
        key.hash(&mut hasher);
        &self.shards[(hasher.finish() as usize) % self.shards.len()]
    }

    /// Add one to the counter of `key`, creating it if needed, and return the
    /// new value. A new key is refused when the map is full.
    pub fn increment(&self, key: K) -> Result<u64, MapError> {
        let shard = self.shard(&key);
        // Fast path: the counter exists, a shared lock is enough.
        if let Some(counter) = shard.read().get(&key) {
            return Ok(counter.fetch_add(1, Ordering::Relaxed) + 1);
        }
        match shard.write().entry(key) {
            // Someone created it between the two locks.
            Entry::Occupied(entry) => Ok(entry.get().fetch_add(1, Ordering::Relaxed) + 1),
            Entry::Vacant(entry) => {
                self.len
                    .fetch_update(Ordering::AcqRel, Ordering::Acquire, |len| {
                        (len < self.max_entries).then_some(len + 1)
                    })
                    .map_err(|_| MapError::Full {
                        max_entries: self.max_entries,
                    })?;
                entry.insert(AtomicU64::new(1));
                Ok(1)
            }
        }
    }

    pub fn get(&self, key: &K) -> Option<u64> {
        self.shard(key)
            .read()
            .get(key)
            .map(|counter| counter.load(Ordering::Relaxed))
    }

    pub fn remove(&self, key: &K) -> Option<u64> {
        let removed = self.shard(key).write().remove(key)?;
        self.len.fetch_sub(1, Ordering::AcqRel);
        Some(removed.into_inner())
    }

    pub fn len(&self) -> usize {
        self.len.load(Ordering::Acquire)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Copy of every counter. Shards are read one at a time, so the result is
    /// not a single point-in-time view while writers are active.
    pub fn snapshot(&self) -> HashMap<K, u64> {
        let mut snapshot = HashMap::new();
        for shard in self.shards.iter() {
            let guard = shard.read();
            for (key, counter) in guard.iter() {
                snapshot.insert(*key, counter.load(Ordering::Relaxed));
            }
        }
        snapshot
    }

    /// Take every counter out of the map.
    pub fn drain(&self) -> HashMap<K, u64> {
        let mut drained = HashMap::new();
        for shard in self.shards.iter() {
            let mut guard = shard.write();
            self.len.fetch_sub(guard.len(), Ordering::AcqRel);
            drained.extend(
                guard
                    .drain()
                    .map(|(key, counter)| (key, counter.into_inner())),
            );
        }
        drained
    }

    pub fn clear(&self) {
        self.drain();
    }
}

use std::{borrow::Borrow, collections::HashMap, hash::Hash, sync::Arc};

use arc_swap::ArcSwap;
use parking_lot::Mutex;

use super::MapError;

/// Read-mostly hash map published as immutable versions.
///
/// Writers build a new version from the current one and swap the pointer, so
/// a lookup sees either the old or the new entry, never a partial one. Lookups
/// never lock. Writers are serialized among themselves.
pub struct CowHashMap<K, V> {
    current: ArcSwap<HashMap<K, V>>,
    writer: Mutex<()>,
    max_entries: usize,
}

impl<K, V> CowHashMap<K, V>
where
    K: Hash + Eq + Clone,
    V: Clone,
{
    pub fn with_max_entries(max_entries: usize) -> Self {
        Self {
            current: ArcSwap::from_pointee(HashMap::new()),
            writer: Mutex::new(()),
            max_entries,
        }
    }

    pub fn max_entries(&self) -> usize {
        self.max_entries
    }

    pub fn get<Q>(&self, key: &Q) -> Option<V>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.current.load().get(key).cloned()
    }

    pub fn contains_key<Q>(&self, key: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.current.load().contains_key(key)
    }

    /// The current version. It stays valid and unchanged after later writes.
    pub fn snapshot(&self) -> Arc<HashMap<K, V>> {
        self.current.load_full()
    }

    pub fn len(&self) -> usize {
        self.current.load().len()
    }

    pub fn is_empty(&self) -> bool {
        self.current.load().is_empty()
    }

    /// Insert or replace an entry. New keys are refused once the map is full.
    pub fn insert(&self, key: K, value: V) -> Result<Option<V>, MapError> {
        let _writer = self.writer.lock();
        let current = self.current.load();
        if !current.contains_key(&key) && current.len() >= self.max_entries {
            return Err(MapError::Full {
                max_entries: self.max_entries,
            });
        }
        let mut next = HashMap::clone(&current);
        let previous = next.insert(key, value);
        self.current.store(Arc::new(next));
        Ok(previous)
    }

    pub fn remove<Q>(&self, key: &Q) -> Option<V>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        let _writer = self.writer.lock();
        let current = self.current.load();
        if !current.contains_key(key) {
            return None;
        }
        let mut next = HashMap::clone(&current);
        let previous = next.remove(key);
        self.current.store(Arc::new(next));
        previous
    }

    pub fn clear(&self) {
        let _writer = self.writer.lock();
        self.current.store(Arc::new(HashMap::new()));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn insert_get_remove() {
        let map = CowHashMap::with_max_entries(4);
        assert_eq!(map.insert(1u32, true), Ok(None));
        assert_eq!(map.insert(1, false), Ok(Some(true)));
        assert_eq!(map.get(&1), Some(false));
        assert!(map.contains_key(&1));
        assert_eq!(map.remove(&1), Some(false));
        assert_eq!(map.remove(&1), None);
        assert!(map.is_empty());
    }

    #[test]
    fn full_map_refuses_new_keys_only() {
        let map = CowHashMap::with_max_entries(1);
        map.insert(1u32, 1u32).unwrap();
        assert_eq!(map.insert(2, 2), Err(MapError::Full { max_entries: 1 }));
        assert_eq!(map.insert(1, 3), Ok(Some(1)));
    }

    #[test]
    fn snapshots_are_immutable() {
        let map = CowHashMap::with_max_entries(8);
        map.insert("a".to_string(), 1).unwrap();
        let before = map.snapshot();
        map.insert("b".to_string(), 2).unwrap();
        map.remove("a");
        assert_eq!(before.len(), 1);
        assert_eq!(before.get("a"), Some(&1));
        assert_eq!(map.get("b"), Some(2));
    }

    #[test]
    fn readers_see_whole_versions() {
        let map = CowHashMap::with_max_entries(4);
        std::thread::scope(|s| {
            s.spawn(|| {
                for i in 0..1000u64 {
                    map.insert(0u32, (i, i)).unwrap();
                }
            });
            s.spawn(|| {
                for _ in 0..1000 {
                    if let Some((a, b)) = map.get(&0) {
                        assert_eq!(a, b);
                    }
                }
            });
        });
    }

    #[test]
    fn lookups_do_not_wait_for_writers() {
        let map = CowHashMap::with_max_entries(4);
        map.insert(2u32, true).unwrap();
        let (tx, rx) = std::sync::mpsc::channel();
        let _writer = map.writer.lock();
        std::thread::scope(|s| {
            s.spawn(|| tx.send(map.get(&2)).unwrap());
            assert_eq!(
                rx.recv_timeout(std::time::Duration::from_secs(5)),
                Ok(Some(true))
            );
        });
    }
}

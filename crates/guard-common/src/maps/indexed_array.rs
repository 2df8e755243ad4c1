use std::{
    marker::PhantomData,
    sync::atomic::{AtomicU64, Ordering},
};

use super::MapError;

/// Marks a slot as holding a value. The low 32 bits carry the packed value.
const PRESENT: u64 = 1 << 32;

/// A value that can be stored in a single [`IndexedArray`] slot.
///
/// `unpack` may refuse a word: such a slot is then reported as absent.
pub trait Packed: Copy {
    fn pack(&self) -> u32;
    fn unpack(word: u32) -> Option<Self>;
}

/// Fixed capacity array of optional values, indexed by `u32`.
///
/// Each slot is one `AtomicU64` holding a present bit and the packed value,
/// so replacing an entry is a single store and readers need no lock.
pub struct IndexedArray<T> {
    slots: Box<[AtomicU64]>,
    _value: PhantomData<T>,
}

impl<T: Packed> IndexedArray<T> {
    pub fn with_capacity(capacity: u32) -> Self {
        Self {
            slots: (0..capacity).map(|_| AtomicU64::new(0)).collect(),
            _value: PhantomData,
        }
    }

    pub fn capacity(&self) -> u32 {
        self.slots.len() as u32
    }

    /// Store `value` at `index`, returning the previous one.
    pub fn set(&self, index: u32, value: T) -> Result<Option<T>, MapError> {
        let previous = self
            .slot(index)?
            .swap(PRESENT | value.pack() as u64, Ordering::AcqRel);
        Ok(decode(previous))
    }

    /// Empty the slot at `index`, returning the previous value.
    pub fn clear(&self, index: u32) -> Result<Option<T>, MapError> {
        let previous = self.slot(index)?.swap(0, Ordering::AcqRel);
        Ok(decode(previous))
    }

    /// Out of range indexes read as absent.
    pub fn get(&self, index: u32) -> Option<T> {
        self.slots
            .get(index as usize)
            .and_then(|slot| decode(slot.load(Ordering::Acquire)))
    }

    /// Present entries in ascending index order.
    pub fn iter(&self) -> impl Iterator<Item = (u32, T)> + '_ {
        self.slots
            .iter()
            .enumerate()
            .filter_map(|(index, slot)| {
                decode(slot.load(Ordering::Acquire)).map(|value| (index as u32, value))
            })
    }

    pub fn len(&self) -> usize {
        self.iter().count()
    }

    pub fn is_empty(&self) -> bool {
        self.iter().next().is_none()
    }

    pub fn reset(&self) {
        for slot in self.slots.iter() {
            slot.store(0, Ordering::Release);
        }
    }

    fn slot(&self, index: u32) -> Result<&AtomicU64, MapError> {
        self.slots
            .get(index as usize)
            .ok_or(MapError::IndexOutOfBounds {
                index,
                capacity: self.capacity(),
            })
    }
}

fn decode<T: Packed>(word: u64) -> Option<T> {
    if word & PRESENT == 0 {
        None
    } else {
        T::unpack(word as u32)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Even numbers only, to exercise rejected words.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    struct Even(u32);

    impl Packed for Even {
        fn pack(&self) -> u32 {
            self.0
        }

        fn unpack(word: u32) -> Option<Self> {
            (word % 2 == 0).then_some(Even(word))
        }
    }

    #[test]
    fn absent_by_default() {
        let array = IndexedArray::<Even>::with_capacity(4);
        assert!(array.is_empty());
        assert_eq!(array.get(0), None);
        assert_eq!(array.get(100), None);
    }

    #[test]
    fn zero_value_is_not_absent() {
        let array = IndexedArray::with_capacity(4);
        array.set(1, Even(0)).unwrap();
        assert_eq!(array.get(1), Some(Even(0)));
        assert_eq!(array.get(0), None);
    }

    #[test]
    fn set_replaces_and_clear_empties() {
        let array = IndexedArray::with_capacity(4);
        assert_eq!(array.set(2, Even(10)), Ok(None));
        assert_eq!(array.set(2, Even(12)), Ok(Some(Even(10))));
        assert_eq!(array.clear(2), Ok(Some(Even(12))));
        assert_eq!(array.get(2), None);
    }

    #[test]
    fn iter_is_ascending_and_skips_holes() {
        let array = IndexedArray::with_capacity(8);
        array.set(5, Even(2)).unwrap();
        array.set(1, Even(4)).unwrap();
        array.set(7, Even(6)).unwrap();
        let entries: Vec<_> = array.iter().collect();
        assert_eq!(entries, vec![(1, Even(4)), (5, Even(2)), (7, Even(6))]);
    }

    #[test]
    fn out_of_bounds_write_is_rejected() {
        let array = IndexedArray::with_capacity(2);
        assert_eq!(
            array.set(2, Even(0)),
            Err(MapError::IndexOutOfBounds {
                index: 2,
                capacity: 2
            })
        );
    }

    #[test]
    fn rejected_words_read_as_absent() {
        let array = IndexedArray::<Even>::with_capacity(2);
        array.slots[0].store(PRESENT | 3, Ordering::Release);
        assert_eq!(array.get(0), None);
        assert_eq!(array.len(), 0);
    }
}

use std::ops::{Index, IndexMut};

/// Dense storage with stable indices and a LIFO free list.
///
/// Backing allocator for handle tables: `emplace` returns an index that keeps
/// referring to the same value until it is removed. Removed slots hold the
/// next free index, so the free list lives inside the storage itself and
/// the most recently freed slot is reused first.
///
/// Not internally synchronized. There are no generation checks: once an
/// index is removed, any later `emplace` may hand it out again.
///
/// # Example
///
/// ```ignore
/// let mut pool = ObjectPool::new();
/// let a = pool.emplace("a");  // 0
/// let b = pool.emplace("b");  // 1
/// pool.remove(a);
/// let c = pool.emplace("c");  // 0 (recycled)
/// ```
pub struct ObjectPool<T> {
    slots: Vec<Slot<T>>,
    free_head: Option<usize>,
    len: usize,
}

enum Slot<T> {
    Occupied(T),
    Free { next: Option<usize> },
}

impl<T> ObjectPool<T> {
    /// Create a new empty pool
    pub fn new() -> Self {
        Self {
            slots: Vec::new(),
            free_head: None,
            len: 0,
        }
    }

    /// Create an empty pool with room for `capacity` slots
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            slots: Vec::with_capacity(capacity),
            free_head: None,
            len: 0,
        }
    }

    /// Store `value`, reusing the most recently freed slot if there is one
    pub fn emplace(&mut self, value: T) -> usize {
        self.len += 1;
        match self.free_head {
            Some(index) => {
                let next = match self.slots[index] {
                    Slot::Free { next } => next,
                    Slot::Occupied(_) => unreachable!("free list points at a live slot"),
                };
                self.free_head = next;
                self.slots[index] = Slot::Occupied(value);
                index
            }
            None => {
                self.slots.push(Slot::Occupied(value));
                self.slots.len() - 1
            }
        }
    }

    /// Take the value at `index` out and push the slot onto the free list
    ///
    /// # Panics
    ///
    /// If `index` is out of range or already free.
    pub fn remove(&mut self, index: usize) -> T {
        let slot = std::mem::replace(&mut self.slots[index], Slot::Free { next: self.free_head });
        match slot {
            Slot::Occupied(value) => {
                self.free_head = Some(index);
                self.len -= 1;
                value
            }
            Slot::Free { next } => {
                self.slots[index] = Slot::Free { next };
                panic!("ObjectPool: removing free slot {}", index);
            }
        }
    }

    /// Live value at `index`
    ///
    /// # Panics
    ///
    /// If `index` is out of range or free.
    pub fn at(&self, index: usize) -> &T {
        match self.get(index) {
            Some(value) => value,
            None => panic!("ObjectPool: slot {} is not occupied", index),
        }
    }

    /// Mutable live value at `index`
    ///
    /// # Panics
    ///
    /// If `index` is out of range or free.
    pub fn at_mut(&mut self, index: usize) -> &mut T {
        match self.get_mut(index) {
            Some(value) => value,
            None => panic!("ObjectPool: slot {} is not occupied", index),
        }
    }

    pub fn get(&self, index: usize) -> Option<&T> {
        match self.slots.get(index) {
            Some(Slot::Occupied(value)) => Some(value),
            _ => None,
        }
    }

    pub fn get_mut(&mut self, index: usize) -> Option<&mut T> {
        match self.slots.get_mut(index) {
            Some(Slot::Occupied(value)) => Some(value),
            _ => None,
        }
    }

    /// Whether `index` currently holds a value
    pub fn contains(&self, index: usize) -> bool {
        self.get(index).is_some()
    }

    /// Number of live values
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Number of slots ever created (live + free)
    pub fn slot_count(&self) -> usize {
        self.slots.len()
    }

    /// Remove and yield every live value, leaving the pool empty
    pub fn drain(&mut self) -> impl Iterator<Item = T> + '_ {
        self.free_head = None;
        self.len = 0;
        self.slots.drain(..).filter_map(|slot| match slot {
            Slot::Occupied(value) => Some(value),
            Slot::Free { .. } => None,
        })
    }
}

impl<T> Default for ObjectPool<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Index<usize> for ObjectPool<T> {
    type Output = T;

    fn index(&self, index: usize) -> &T {
        self.at(index)
    }
}

impl<T> IndexMut<usize> for ObjectPool<T> {
    fn index_mut(&mut self, index: usize) -> &mut T {
        self.at_mut(index)
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
#[path = "object_pool_tests.rs"]
mod tests;

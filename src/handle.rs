//! Generation-tagged, fixed-capacity slot allocator.
//!
//! A [`Handle<T>`] is a (slot index, generation) pair. Callers hold handles
//! across arbitrary spans of time without borrowing anything; a lookup only
//! succeeds if the slot hasn't since been freed and reused. This replaces
//! pointer-graph ownership with a pair of integers, the same trick a C-style
//! pool allocator gets from a tagged free-list entry: the top bit of the
//! stored generation marks a slot "free", and the remaining bits are a
//! counter bumped every time the slot changes hands.
//!
//! Free slots form a singly-linked list embedded in the storage itself
//! (the free slot's union doubles as a `next_free` pointer), so freeing
//! costs no extra memory.

use std::marker::PhantomData;

const FREE_BIT: u32 = 1 << 31;
const GENERATION_MASK: u32 = !FREE_BIT;

/// Slot 0 is reserved; a handle with `index == 0` is the null handle.
const NULL_INDEX: u32 = 0;

/// A generation-tagged reference into a [`HandlePool<T>`].
///
/// `Handle::null()` is guaranteed distinct from every handle a pool can
/// ever hand out, since slot 0 is reserved and never allocated.
pub struct Handle<T> {
    index: u32,
    generation: u32,
    _marker: PhantomData<fn() -> T>,
}

impl<T> Handle<T> {
    pub const fn null() -> Self {
        Handle {
            index: NULL_INDEX,
            generation: 0,
            _marker: PhantomData,
        }
    }

    pub fn is_null(&self) -> bool {
        self.index == NULL_INDEX
    }

    pub fn index(&self) -> u32 {
        self.index
    }

    pub fn generation(&self) -> u32 {
        self.generation
    }
}

// Handles are plain data: Copy/Clone/Eq/Hash/Debug don't depend on T.
impl<T> Copy for Handle<T> {}
impl<T> Clone for Handle<T> {
    fn clone(&self) -> Self {
        *self
    }
}
impl<T> PartialEq for Handle<T> {
    fn eq(&self, other: &Self) -> bool {
        self.index == other.index && self.generation == other.generation
    }
}
impl<T> Eq for Handle<T> {}
impl<T> std::hash::Hash for Handle<T> {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.index.hash(state);
        self.generation.hash(state);
    }
}
impl<T> std::fmt::Debug for Handle<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Handle")
            .field("index", &self.index)
            .field("generation", &(self.generation & GENERATION_MASK))
            .finish()
    }
}
impl<T> Default for Handle<T> {
    fn default() -> Self {
        Handle::null()
    }
}

enum Slot<T> {
    /// Slot 0 only: never allocated, never freed, holds no value.
    Reserved,
    Occupied { generation: u32, value: T },
    Free { generation: u32, next_free: u32 },
}

/// Fixed-capacity, generation-tagged slot allocator.
///
/// Allocation beyond `capacity` fails by returning `None`; this is a fatal
/// condition in practice (callers are expected to size pools so this never
/// triggers in normal operation) but `HandlePool` itself stays
/// infallible-looking and lets the caller decide how to react.
pub struct HandlePool<T> {
    slots: Vec<Slot<T>>,
    free_head: Option<u32>,
    watermark: u32,
    capacity: u32,
}

impl<T> HandlePool<T> {
    /// Creates a pool with the given fixed capacity. Slot 0 is reserved
    /// immediately so it can never be allocated (it's the null handle).
    pub fn with_capacity(capacity: u32) -> Self {
        let mut slots = Vec::with_capacity(capacity as usize + 1);
        slots.push(Slot::Reserved);
        HandlePool {
            slots,
            free_head: None,
            watermark: 0,
            capacity,
        }
    }

    pub fn capacity(&self) -> u32 {
        self.capacity
    }

    /// Current number of slots touched so far (ascending index bound for
    /// iteration), not the number of live objects.
    pub fn watermark(&self) -> u32 {
        self.watermark
    }

    /// Allocates a slot and returns its handle along with a mutable
    /// reference to the freshly inserted value. Returns `None` if the pool
    /// is at capacity and has no free slot to recycle.
    pub fn allocate(&mut self, value: T) -> Option<(Handle<T>, &mut T)> {
        let index = if let Some(free_index) = self.free_head {
            let &Slot::Free {
                generation,
                next_free,
            } = &self.slots[free_index as usize]
            else {
                unreachable!("free_head must point at a free slot")
            };
            self.free_head = if next_free == free_index {
                None
            } else {
                Some(next_free)
            };
            self.slots[free_index as usize] = Slot::Occupied {
                generation: generation & GENERATION_MASK,
                value,
            };
            free_index
        } else {
            if self.watermark >= self.capacity {
                return None;
            }
            self.watermark += 1;
            let index = self.watermark;
            self.slots.push(Slot::Occupied {
                generation: 1,
                value,
            });
            index
        };

        let generation = match &self.slots[index as usize] {
            Slot::Occupied { generation, .. } => *generation,
            Slot::Free { .. } | Slot::Reserved => unreachable!(),
        };

        let handle = Handle {
            index,
            generation,
            _marker: PhantomData,
        };

        let Slot::Occupied { value, .. } = &mut self.slots[index as usize] else {
            unreachable!()
        };
        Some((handle, value))
    }

    /// Frees a slot. Bumps its generation so any outstanding handle with the
    /// old generation becomes stale. No-op (returns `false`) for a handle
    /// that is already stale, null, or out of range.
    pub fn free(&mut self, handle: Handle<T>) -> bool {
        if handle.is_null() || !self.is_valid(handle) {
            return false;
        }
        let index = handle.index;
        let next_generation = (handle.generation.wrapping_add(1) & GENERATION_MASK) | FREE_BIT;
        let next_free = self.free_head.unwrap_or(index);
        self.slots[index as usize] = Slot::Free {
            generation: next_generation,
            next_free,
        };
        self.free_head = Some(index);
        true
    }

    fn is_valid(&self, handle: Handle<T>) -> bool {
        if handle.index == NULL_INDEX || handle.index > self.watermark {
            return false;
        }
        matches!(
            self.slots.get(handle.index as usize),
            Some(Slot::Occupied { generation, .. }) if *generation == handle.generation
        )
    }

    pub fn get(&self, handle: Handle<T>) -> Option<&T> {
        if !self.is_valid(handle) {
            return None;
        }
        match &self.slots[handle.index as usize] {
            Slot::Occupied { value, .. } => Some(value),
            Slot::Free { .. } | Slot::Reserved => None,
        }
    }

    pub fn get_mut(&mut self, handle: Handle<T>) -> Option<&mut T> {
        if !self.is_valid(handle) {
            return None;
        }
        match &mut self.slots[handle.index as usize] {
            Slot::Occupied { value, .. } => Some(value),
            Slot::Free { .. } | Slot::Reserved => None,
        }
    }

    /// Iterates live entries in ascending slot order. This order is not
    /// stable under concurrent modification: callers must not mutate the
    /// pool while iterating.
    pub fn iter(&self) -> impl Iterator<Item = (Handle<T>, &T)> {
        self.slots
            .iter()
            .enumerate()
            .skip(1)
            .filter_map(|(index, slot)| match slot {
                Slot::Occupied { generation, value } => Some((
                    Handle {
                        index: index as u32,
                        generation: *generation,
                        _marker: PhantomData,
                    },
                    value,
                )),
                Slot::Free { .. } | Slot::Reserved => None,
            })
    }
}

//! Generational slot arena for scene objects
//!
//! Objects of a scene are stored contiguously and referenced by
//! [`ObjectId`]. Ownership of the tree is logical (a parent lists the ids of
//! its children); the arena is the single physical owner.
//!
//! Released slots are recycled through a free list. Every slot carries a
//! generation counter that is bumped on release, so an id that outlived its
//! object resolves to `None` instead of aliasing a newer object.

use serde::{Deserialize, Serialize};

// ============================================================================
// Object Id
// ============================================================================

/// Non-owning handle to an object stored in a scene.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ObjectId {
    index: u32,
    generation: u32,
}

impl ObjectId {
    /// Raw slot index.
    #[must_use]
    #[inline]
    pub const fn index(self) -> usize {
        self.index as usize
    }

    /// Generation of the slot when this id was issued.
    #[must_use]
    #[inline]
    pub const fn generation(self) -> u32 {
        self.generation
    }
}

impl std::fmt::Display for ObjectId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}v{}", self.index, self.generation)
    }
}

// ============================================================================
// Slot
// ============================================================================

#[derive(Debug)]
enum Slot<T> {
    /// Slot holds a live value
    Occupied { generation: u32, value: T },
    /// Slot is empty and links to the next free slot (or `NONE`)
    Vacant { generation: u32, next_free: usize },
}

// ============================================================================
// Arena
// ============================================================================

/// Slot storage with O(1) insert, remove and lookup.
#[derive(Debug)]
pub struct Arena<T> {
    slots: Vec<Slot<T>>,
    free_head: usize,
    len: usize,
}

impl<T> Arena<T> {
    /// End of the free list.
    const NONE: usize = usize::MAX;

    /// Create an empty arena.
    #[must_use]
    pub fn new() -> Self {
        Self {
            slots: Vec::new(),
            free_head: Self::NONE,
            len: 0,
        }
    }

    /// Most values an arena can hold; ids store their slot as a `u32`.
    pub const MAX_SLOTS: usize = u32::MAX as usize;

    fn slot_index(index: usize) -> u32 {
        match u32::try_from(index) {
            Ok(index) if index < u32::MAX => index,
            _ => panic!("arena is full ({} slots)", Self::MAX_SLOTS),
        }
    }

    /// Insert a value, reusing a free slot when one exists.
    ///
    /// # Panics
    ///
    /// Panics if the arena already uses [`MAX_SLOTS`](Self::MAX_SLOTS) slots,
    /// like `Vec::push` does on capacity overflow.
    pub fn insert(&mut self, value: T) -> ObjectId {
        self.len += 1;

        if self.free_head != Self::NONE {
            let index = self.free_head;
            let generation = match self.slots[index] {
                Slot::Vacant {
                    generation,
                    next_free,
                } => {
                    self.free_head = next_free;
                    generation
                }
                Slot::Occupied { .. } => unreachable!("free list points at an occupied slot"),
            };
            self.slots[index] = Slot::Occupied { generation, value };
            ObjectId {
                index: Self::slot_index(index),
                generation,
            }
        } else {
            let index = Self::slot_index(self.slots.len());
            self.slots.push(Slot::Occupied {
                generation: 0,
                value,
            });
            ObjectId {
                index,
                generation: 0,
            }
        }
    }

    /// Remove the value behind `id`, returning it.
    ///
    /// Returns `None` for stale or out-of-range ids.
    pub fn remove(&mut self, id: ObjectId) -> Option<T> {
        let index = id.index();
        match self.slots.get(index) {
            Some(Slot::Occupied { generation, .. }) if *generation == id.generation => {}
            _ => return None,
        }

        let vacant = Slot::Vacant {
            generation: id.generation.wrapping_add(1),
            next_free: self.free_head,
        };
        let old = std::mem::replace(&mut self.slots[index], vacant);
        self.free_head = index;
        self.len -= 1;

        match old {
            Slot::Occupied { value, .. } => Some(value),
            Slot::Vacant { .. } => None,
        }
    }

    /// Get a value by id.
    #[must_use]
    #[inline]
    pub fn get(&self, id: ObjectId) -> Option<&T> {
        match self.slots.get(id.index()) {
            Some(Slot::Occupied { generation, value }) if *generation == id.generation => {
                Some(value)
            }
            _ => None,
        }
    }

    /// Get a value mutably by id.
    #[inline]
    pub fn get_mut(&mut self, id: ObjectId) -> Option<&mut T> {
        match self.slots.get_mut(id.index()) {
            Some(Slot::Occupied { generation, value }) if *generation == id.generation => {
                Some(value)
            }
            _ => None,
        }
    }

    /// Check whether `id` refers to a live value.
    #[must_use]
    #[inline]
    pub fn contains(&self, id: ObjectId) -> bool {
        self.get(id).is_some()
    }

    /// Number of live values.
    #[must_use]
    #[inline]
    pub const fn len(&self) -> usize {
        self.len
    }

    /// Check if the arena holds no values.
    #[must_use]
    #[inline]
    pub const fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Iterate over live values with their ids, in slot order.
    pub fn iter(&self) -> impl Iterator<Item = (ObjectId, &T)> {
        self.slots
            .iter()
            .enumerate()
            .filter_map(|(index, slot)| match slot {
                Slot::Occupied { generation, value } => Some((
                    ObjectId {
                        index: index as u32,
                        generation: *generation,
                    },
                    value,
                )),
                Slot::Vacant { .. } => None,
            })
    }

    /// Drop every value. Outstanding ids all become stale.
    pub fn clear(&mut self) {
        let ids: Vec<ObjectId> = self.iter().map(|(id, _)| id).collect();
        for id in ids {
            self.remove(id);
        }
    }
}

impl<T> Default for Arena<T> {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// Tests
// ============================================================================

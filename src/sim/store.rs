//! Entity store: slot arena with generation-checked handles
//!
//! Freed slots go on a free list and bump their generation, so a handle held
//! past its entity's destruction is detectably stale instead of aliasing the
//! next occupant. Each live entity is linked into exactly one bin list; the
//! links live in the slots so relinking is O(1).

use serde::{Deserialize, Serialize};

use super::entity::{Class, Entity};
use super::layer::BinIndex;
use crate::config::Capacities;
use crate::error::SimError;

/// Stable reference to an entity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Handle {
    index: u32,
    generation: u32,
}

impl Handle {
    pub fn index(&self) -> usize {
        self.index as usize
    }
}

#[derive(Debug, Clone)]
struct Slot {
    generation: u32,
    entity: Option<Entity>,
    prev: Option<u32>,
    next: Option<u32>,
    next_free: Option<u32>,
}

/// Per-class pools in one arena, plus the per-bin membership lists
#[derive(Debug, Clone)]
pub struct Store {
    slots: Vec<Slot>,
    free_head: Option<u32>,
    bin_heads: Vec<Option<u32>>,
    counts: [usize; Class::COUNT],
    limits: [usize; Class::COUNT],
}

impl Store {
    pub fn new(capacities: &Capacities, bin_count: usize) -> Self {
        let mut limits = [0; Class::COUNT];
        limits[Class::Ship.index()] = capacities.ships;
        limits[Class::Debris.index()] = capacities.debris;
        limits[Class::Weapon.index()] = capacities.weapons;
        limits[Class::Gate.index()] = capacities.gates;
        Self {
            slots: Vec::with_capacity(limits.iter().sum()),
            free_head: None,
            bin_heads: vec![None; bin_count],
            counts: [0; Class::COUNT],
            limits,
        }
    }

    /// Insert an entity into the bin already recorded in `entity.item.bin`
    pub fn create(&mut self, entity: Entity) -> Result<Handle, SimError> {
        let class = entity.class();
        let capacity = self.limits[class.index()];
        if self.counts[class.index()] >= capacity {
            return Err(SimError::CapacityExceeded { class, capacity });
        }
        let mass = entity.item.mass;
        if !(mass > 0.0 && mass.is_finite()) {
            return Err(SimError::InvalidMass { mass });
        }
        let bin = entity.item.bin;
        if bin >= self.bin_heads.len() {
            return Err(SimError::InvalidBin { bin });
        }

        let index = match self.free_head {
            Some(free) => {
                let slot = &mut self.slots[free as usize];
                self.free_head = slot.next_free.take();
                slot.entity = Some(entity);
                free
            }
            None => {
                self.slots.push(Slot {
                    generation: 0,
                    entity: Some(entity),
                    prev: None,
                    next: None,
                    next_free: None,
                });
                (self.slots.len() - 1) as u32
            }
        };
        self.counts[class.index()] += 1;
        self.link(index, bin);

        Ok(Handle {
            index,
            generation: self.slots[index as usize].generation,
        })
    }

    /// Remove an entity. Stale handles are a no-op returning `None`.
    pub fn destroy(&mut self, handle: Handle) -> Option<Entity> {
        if !self.contains(handle) {
            return None;
        }
        self.unlink(handle.index);
        let slot = &mut self.slots[handle.index as usize];
        let entity = slot.entity.take()?;
        slot.generation = slot.generation.wrapping_add(1);
        slot.next_free = self.free_head;
        self.free_head = Some(handle.index);
        self.counts[entity.class().index()] -= 1;
        Some(entity)
    }

    /// Relink into `bin`; returns false for stale handles or bad bins
    pub fn move_to_bin(&mut self, handle: Handle, bin: BinIndex) -> bool {
        if !self.contains(handle) || bin >= self.bin_heads.len() {
            return false;
        }
        let current = self.slots[handle.index as usize]
            .entity
            .as_ref()
            .map(|e| e.item.bin);
        if current == Some(bin) {
            return true;
        }
        self.unlink(handle.index);
        self.link(handle.index, bin);
        true
    }

    pub fn contains(&self, handle: Handle) -> bool {
        self.slots
            .get(handle.index as usize)
            .is_some_and(|s| s.generation == handle.generation && s.entity.is_some())
    }

    pub fn get(&self, handle: Handle) -> Option<&Entity> {
        let slot = self.slots.get(handle.index as usize)?;
        if slot.generation != handle.generation {
            return None;
        }
        slot.entity.as_ref()
    }

    pub fn get_mut(&mut self, handle: Handle) -> Option<&mut Entity> {
        let slot = self.slots.get_mut(handle.index as usize)?;
        if slot.generation != handle.generation {
            return None;
        }
        slot.entity.as_mut()
    }

    /// Snapshot of a bin's members. Callers may destroy any of them while
    /// walking the snapshot; stale entries just fail `get`.
    pub fn handles_in_bin(&self, bin: BinIndex) -> Vec<Handle> {
        let mut out = Vec::new();
        let mut cur = self.bin_heads.get(bin).copied().flatten();
        while let Some(index) = cur {
            let slot = &self.slots[index as usize];
            out.push(Handle {
                index,
                generation: slot.generation,
            });
            cur = slot.next;
        }
        out
    }

    pub fn bin_len(&self, bin: BinIndex) -> usize {
        let mut len = 0;
        let mut cur = self.bin_heads.get(bin).copied().flatten();
        while let Some(index) = cur {
            len += 1;
            cur = self.slots[index as usize].next;
        }
        len
    }

    /// Live entities in slot order
    pub fn iter(&self) -> impl Iterator<Item = (Handle, &Entity)> {
        self.slots.iter().enumerate().filter_map(|(i, slot)| {
            slot.entity.as_ref().map(|e| {
                (
                    Handle {
                        index: i as u32,
                        generation: slot.generation,
                    },
                    e,
                )
            })
        })
    }

    pub fn handles(&self) -> Vec<Handle> {
        self.iter().map(|(h, _)| h).collect()
    }

    pub fn len(&self) -> usize {
        self.counts.iter().sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn count(&self, class: Class) -> usize {
        self.counts[class.index()]
    }

    pub fn capacity(&self, class: Class) -> usize {
        self.limits[class.index()]
    }

    fn link(&mut self, index: u32, bin: BinIndex) {
        let head = self.bin_heads[bin];
        if let Some(head) = head {
            self.slots[head as usize].prev = Some(index);
        }
        let slot = &mut self.slots[index as usize];
        slot.prev = None;
        slot.next = head;
        if let Some(entity) = slot.entity.as_mut() {
            entity.item.bin = bin;
        }
        self.bin_heads[bin] = Some(index);
    }

    fn unlink(&mut self, index: u32) {
        let slot = &self.slots[index as usize];
        let (prev, next) = (slot.prev, slot.next);
        let Some(bin) = slot.entity.as_ref().map(|e| e.item.bin) else {
            return;
        };
        match prev {
            Some(prev) => self.slots[prev as usize].next = next,
            None => self.bin_heads[bin] = next,
        }
        if let Some(next) = next {
            self.slots[next as usize].prev = prev;
        }
        let slot = &mut self.slots[index as usize];
        slot.prev = None;
        slot.next = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim::entity::Entity;
    use glam::Vec2;

    fn caps() -> Capacities {
        Capacities {
            ships: 2,
            debris: 4,
            weapons: 1,
            gates: 1,
            ..Default::default()
        }
    }

    fn rock(bin: BinIndex) -> Entity {
        let mut e = Entity::debris(Vec2::ZERO, Vec2::ZERO, 5.0, 1.0, 10.0);
        e.item.bin = bin;
        e
    }

    #[test]
    fn test_create_links_into_bin() {
        let mut store = Store::new(&caps(), 4);
        let a = store.create(rock(2)).unwrap();
        let b = store.create(rock(2)).unwrap();
        let c = store.create(rock(3)).unwrap();
        assert_eq!(store.len(), 3);
        let in_two = store.handles_in_bin(2);
        assert_eq!(in_two.len(), 2);
        assert!(in_two.contains(&a) && in_two.contains(&b));
        assert_eq!(store.handles_in_bin(3), vec![c]);
        assert_eq!(store.get(a).unwrap().item.bin, 2);
    }

    #[test]
    fn test_capacity_per_class() {
        let mut store = Store::new(&caps(), 4);
        for _ in 0..4 {
            store.create(rock(0)).unwrap();
        }
        let err = store.create(rock(0)).unwrap_err();
        assert_eq!(
            err,
            SimError::CapacityExceeded {
                class: Class::Debris,
                capacity: 4
            }
        );
        assert_eq!(store.count(Class::Debris), 4);
    }

    #[test]
    fn test_rejects_bad_mass() {
        let mut store = Store::new(&caps(), 4);
        let mut e = rock(0);
        e.item.mass = 0.0;
        assert!(matches!(store.create(e), Err(SimError::InvalidMass { .. })));
        let mut e = rock(0);
        e.item.mass = f32::NAN;
        assert!(matches!(store.create(e), Err(SimError::InvalidMass { .. })));
        assert!(store.is_empty());
    }

    #[test]
    fn test_destroy_is_idempotent() {
        let mut store = Store::new(&caps(), 4);
        let a = store.create(rock(1)).unwrap();
        assert!(store.destroy(a).is_some());
        assert!(store.destroy(a).is_none());
        assert!(!store.contains(a));
        assert_eq!(store.bin_len(1), 0);
        assert_eq!(store.count(Class::Debris), 0);
    }

    #[test]
    fn test_reused_slot_gets_new_generation() {
        let mut store = Store::new(&caps(), 4);
        let a = store.create(rock(1)).unwrap();
        store.destroy(a);
        let b = store.create(rock(1)).unwrap();
        assert_eq!(a.index(), b.index());
        assert_ne!(a, b);
        assert!(store.get(a).is_none());
        assert!(store.get(b).is_some());
    }

    #[test]
    fn test_move_to_bin() {
        let mut store = Store::new(&caps(), 4);
        let a = store.create(rock(0)).unwrap();
        let b = store.create(rock(0)).unwrap();
        let c = store.create(rock(0)).unwrap();
        // Move the middle of the list
        assert!(store.move_to_bin(b, 3));
        assert_eq!(store.handles_in_bin(3), vec![b]);
        let rest = store.handles_in_bin(0);
        assert_eq!(rest.len(), 2);
        assert!(rest.contains(&a) && rest.contains(&c));
        assert_eq!(store.get(b).unwrap().item.bin, 3);

        store.destroy(c);
        assert!(!store.move_to_bin(c, 2));
        assert!(!store.move_to_bin(a, 99));
        assert_eq!(store.handles_in_bin(0), vec![a]);
    }

    #[test]
    fn test_removal_during_traversal() {
        let mut store = Store::new(&caps(), 4);
        let handles: Vec<_> = (0..4).map(|_| store.create(rock(1)).unwrap()).collect();
        let mut visited = 0;
        for h in store.handles_in_bin(1) {
            if store.get(h).is_none() {
                continue;
            }
            visited += 1;
            // Each visit deletes itself and one other member
            store.destroy(h);
            if let Some(&other) = handles.iter().find(|&&o| store.contains(o)) {
                store.destroy(other);
            }
        }
        assert_eq!(visited, 2);
        assert!(store.is_empty());
        assert_eq!(store.bin_len(1), 0);
    }
}

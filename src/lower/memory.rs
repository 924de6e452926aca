use std::collections::BTreeSet;

use log::debug;

use super::error::LowerError;
use crate::lang::PoolKind;

/// Index of a slot in one store.
pub type Slot = u32;

/// One finite flat store of the target.
///
/// Slots are handed out in allocation order. With reuse on, freed slots go
/// to a free list and the lowest one is handed out first, so the same
/// program always gets the same layout.
#[derive(Debug, Clone)]
pub struct MemoryPool {
    kind: PoolKind,
    capacity: u32,
    reuse: bool,
    next: Slot,
    free: BTreeSet<Slot>,
    allocations: usize,
    high_water: u32,
}

impl MemoryPool {
    pub fn new(kind: PoolKind, capacity: u32, reuse: bool) -> Self {
        Self {
            kind,
            capacity,
            reuse,
            next: 0,
            free: BTreeSet::new(),
            allocations: 0,
            high_water: 0,
        }
    }

    pub fn kind(&self) -> PoolKind {
        self.kind
    }

    pub fn capacity(&self) -> u32 {
        self.capacity
    }

    pub fn allocate(&mut self, owner: &str) -> Result<Slot, LowerError> {
        let slot = if let Some(slot) = self.free.pop_first() {
            slot
        } else if self.next < self.capacity {
            let slot = self.next;
            self.next += 1;
            slot
        } else {
            return Err(LowerError::exhausted(self.kind, self.capacity, owner));
        };

        self.allocations += 1;
        self.high_water = self.high_water.max(self.live_count());
        debug!("{} slot {} -> '{}'", self.kind, slot, owner);
        Ok(slot)
    }

    /// Give a slot back. Only has an effect when the pool reuses slots.
    pub fn free(&mut self, slot: Slot) -> Result<(), LowerError> {
        if !self.reuse {
            return Ok(());
        }
        if slot >= self.next {
            return Err(LowerError::invariant(format!(
                "{} slot {} freed but never allocated",
                self.kind, slot
            )));
        }
        if !self.free.insert(slot) {
            return Err(LowerError::invariant(format!(
                "{} slot {} freed twice",
                self.kind, slot
            )));
        }
        debug!("{} slot {} freed", self.kind, slot);
        Ok(())
    }

    pub fn live_count(&self) -> u32 {
        self.next - self.free.len() as u32
    }

    /// Most slots live at once.
    pub fn high_water(&self) -> u32 {
        self.high_water
    }

    /// Total successful allocations, reused slots included.
    pub fn allocations(&self) -> usize {
        self.allocations
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lower::error::ErrorKind;

    #[test]
    fn test_allocates_in_order() {
        let mut pool = MemoryPool::new(PoolKind::Global, 4, false);
        assert_eq!(pool.allocate("a").unwrap(), 0);
        assert_eq!(pool.allocate("b").unwrap(), 1);
        assert_eq!(pool.allocate("c").unwrap(), 2);
        assert_eq!(pool.live_count(), 3);
    }

    #[test]
    fn test_exhausted_at_capacity() {
        let mut pool = MemoryPool::new(PoolKind::Actor, 1, false);
        pool.allocate("a").unwrap();
        let err = pool.allocate("b").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ResourceExhausted);
        assert!(err.to_string().contains("'b'"));
    }

    #[test]
    fn test_free_without_reuse_is_noop() {
        let mut pool = MemoryPool::new(PoolKind::Global, 2, false);
        let a = pool.allocate("a").unwrap();
        pool.free(a).unwrap();
        pool.free(a).unwrap();
        assert_eq!(pool.allocate("b").unwrap(), 1);
    }

    #[test]
    fn test_reuse_pops_lowest_slot() {
        let mut pool = MemoryPool::new(PoolKind::Global, 8, true);
        for name in ["a", "b", "c", "d"] {
            pool.allocate(name).unwrap();
        }
        pool.free(3).unwrap();
        pool.free(1).unwrap();
        assert_eq!(pool.allocate("e").unwrap(), 1);
        assert_eq!(pool.allocate("f").unwrap(), 3);
        assert_eq!(pool.allocate("g").unwrap(), 4);
        assert_eq!(pool.high_water(), 5);
        assert_eq!(pool.allocations(), 7);
    }

    #[test]
    fn test_reuse_rejects_double_free() {
        let mut pool = MemoryPool::new(PoolKind::Global, 8, true);
        let a = pool.allocate("a").unwrap();
        pool.free(a).unwrap();
        assert_eq!(pool.free(a).unwrap_err().kind(), ErrorKind::InvariantViolation);
        assert!(pool.free(7).is_err());
    }

    #[test]
    fn test_reuse_exhaustion_after_free() {
        let mut pool = MemoryPool::new(PoolKind::Global, 1, true);
        let a = pool.allocate("a").unwrap();
        assert!(pool.allocate("b").is_err());
        pool.free(a).unwrap();
        assert_eq!(pool.allocate("b").unwrap(), 0);
    }
}

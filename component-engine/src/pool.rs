// Copyright 2025 John Brosnihan
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.
//! Slot pool with generational handles
//!
//! [`SlotPool`] is the storage behind every entity and every component record.
//! It keeps its elements in one contiguous `Vec` of slots and hands out
//! [`SlotHandle`]s instead of references.
//!
//! # Stability rules
//!
//! - A slot's **index** never moves while the slot is live.
//! - A slot's **address** may move on any allocation, because the backing
//!   vector can grow. Borrowed references therefore never outlive a call that
//!   allocates, which the borrow checker enforces.
//! - Freed slots are recycled (most recently freed first). Every free bumps the
//!   slot's generation, so handles to the previous occupant stop resolving
//!   instead of silently aliasing the new one.
//!
//! # Iteration
//!
//! Live slots are linked in an "active list" that defines iteration order.
//! Elements allocated with [`AllocationLocation::Back`] join the end of the
//! list, [`AllocationLocation::Front`] the beginning. Traversals that need to
//! remove the element they are visiting use the cursor API ([`SlotPool::first`],
//! [`SlotPool::next`], [`SlotPool::free_and_advance`]); removing the current
//! element never skips or repeats another one. Allocating into a pool that is
//! being traversed with a cursor is unsupported: the new element may or may not
//! be visited.

use crate::error::PoolError;
use std::fmt;
use std::sync::atomic::{AtomicU32, Ordering};

#[cfg(feature = "parallel")]
use rayon::prelude::*;

/// Link value marking the end of the active list or the free list
const NIL: u32 = u32::MAX;

/// Generation of a retired slot. Retired slots are never handed out again.
const RETIRED: u32 = u32::MAX;

static NEXT_POOL_ID: AtomicU32 = AtomicU32::new(0);

/// Identity of a pool instance
///
/// Every pool created in the process receives a distinct id, which lets a pool
/// reject handles that were issued by another pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PoolId(u32);

impl PoolId {
    fn next() -> Self {
        PoolId(NEXT_POOL_ID.fetch_add(1, Ordering::Relaxed))
    }

    /// Get the raw id value
    pub fn raw(&self) -> u32 {
        self.0
    }
}

impl fmt::Display for PoolId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Pool({})", self.0)
    }
}

/// Weak reference to one element of a [`SlotPool`]
///
/// Handles are plain values: copying one never allocates and holding one does
/// not keep the element alive. A handle resolves only while the slot still
/// holds the element it was issued for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SlotHandle {
    pool: PoolId,
    index: u32,
    generation: u32,
}

impl SlotHandle {
    /// Identity of the pool that issued this handle
    pub fn pool(&self) -> PoolId {
        self.pool
    }

    /// Slot index inside the pool
    pub fn index(&self) -> usize {
        self.index as usize
    }

    /// Generation of the slot at the time the handle was issued
    pub fn generation(&self) -> u32 {
        self.generation
    }
}

impl fmt::Display for SlotHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Slot({}, index: {}, gen: {})",
            self.pool.0, self.index, self.generation
        )
    }
}

/// Where a newly allocated element joins the iteration order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum AllocationLocation {
    /// Visit the new element before every existing one
    Front,
    /// Visit the new element after every existing one
    #[default]
    Back,
}

/// Configuration for slot pool behavior
#[derive(Debug, Clone)]
pub struct PoolConfig {
    /// Number of slots reserved up front
    pub initial_capacity: usize,
    /// Hard upper bound on the number of slots, if any
    pub max_capacity: Option<usize>,
    /// Growth factor applied to the slot vector when it is full (e.g. 2.0 for doubling)
    pub growth_factor: f64,
}

impl Default for PoolConfig {
    fn default() -> Self {
        PoolConfig {
            initial_capacity: 64,
            max_capacity: None,
            growth_factor: 2.0,
        }
    }
}

impl PoolConfig {
    /// Create a new pool configuration with the given initial capacity
    pub fn new(initial_capacity: usize) -> Self {
        PoolConfig {
            initial_capacity,
            ..PoolConfig::default()
        }
    }

    /// Limit the pool to at most `max_capacity` slots
    pub fn with_max_capacity(mut self, max_capacity: usize) -> Self {
        self.max_capacity = Some(max_capacity);
        self
    }

    /// Set the growth factor for slot vector expansion
    pub fn with_growth_factor(mut self, factor: f64) -> Self {
        assert!(factor >= 1.0, "Growth factor must be >= 1.0");
        self.growth_factor = factor;
        self
    }
}

/// Statistics for monitoring pool behavior
#[derive(Debug, Clone, Default)]
pub struct PoolStats {
    /// Number of successful allocations
    pub allocations: usize,
    /// Allocations that were served from the free list
    pub reuses: usize,
    /// Number of slots released
    pub frees: usize,
    /// Number of times the slot vector was grown
    pub resize_count: usize,
    /// Peak number of live elements
    pub peak_len: usize,
    /// Slots permanently withdrawn because their generation ran out
    pub retired: usize,
}

impl PoolStats {
    /// Share of allocations served by slot reuse, as a percentage
    pub fn reuse_rate(&self) -> f64 {
        if self.allocations == 0 {
            0.0
        } else {
            (self.reuses as f64 / self.allocations as f64) * 100.0
        }
    }
}

struct Slot<T> {
    value: Option<T>,
    generation: u32,
    /// Previous live slot; unused while free
    prev: u32,
    /// Next live slot, or next free slot while on the free list
    next: u32,
}

/// Contiguous pool of reusable slots addressed by generational handles
///
/// All operations are O(1) (allocation is amortized O(1) because the slot
/// vector occasionally grows).
///
/// # Example
///
/// ```
/// use component_engine::pool::{AllocationLocation, SlotPool};
///
/// let mut pool = SlotPool::new();
/// let a = pool.allocate("a", AllocationLocation::Back).unwrap();
/// let b = pool.allocate("b", AllocationLocation::Back).unwrap();
///
/// // Remove elements while walking the pool
/// let mut cursor = pool.first();
/// while let Some(handle) = cursor {
///     cursor = pool.free_and_advance(handle);
/// }
///
/// assert!(pool.is_empty());
/// assert!(pool.get(a).is_none());
/// assert!(pool.get(b).is_none());
/// ```
pub struct SlotPool<T> {
    id: PoolId,
    slots: Vec<Slot<T>>,
    first: u32,
    last: u32,
    free_head: u32,
    len: usize,
    config: PoolConfig,
    stats: PoolStats,
}

impl<T> SlotPool<T> {
    /// Create a new pool with default configuration
    pub fn new() -> Self {
        Self::with_config(PoolConfig::default())
    }

    /// Create a new pool with custom configuration
    pub fn with_config(config: PoolConfig) -> Self {
        let reserve = match config.max_capacity {
            Some(max) => config.initial_capacity.min(max),
            None => config.initial_capacity,
        };
        SlotPool {
            id: PoolId::next(),
            slots: Vec::with_capacity(reserve),
            first: NIL,
            last: NIL,
            free_head: NIL,
            len: 0,
            config,
            stats: PoolStats::default(),
        }
    }

    /// Identity of this pool
    pub fn id(&self) -> PoolId {
        self.id
    }

    /// Number of live elements
    pub fn len(&self) -> usize {
        self.len
    }

    /// Check if the pool holds no live elements
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Number of slots ever created, live or free
    pub fn slot_count(&self) -> usize {
        self.slots.len()
    }

    /// Number of slots the pool can hold before it has to grow
    pub fn capacity(&self) -> usize {
        self.slots.capacity()
    }

    /// Get the pool configuration
    pub fn config(&self) -> &PoolConfig {
        &self.config
    }

    /// Get current pool statistics
    pub fn stats(&self) -> &PoolStats {
        &self.stats
    }

    /// Store `value` in a free slot and return its handle
    ///
    /// Recycles the most recently freed slot when one exists, otherwise appends
    /// a new slot (growing the backing vector if needed).
    ///
    /// # Errors
    ///
    /// Returns [`PoolError::CapacityExhausted`] if the pool is configured with a
    /// maximum capacity that is already reached, or if the index space is used up.
    pub fn allocate(
        &mut self,
        value: T,
        location: AllocationLocation,
    ) -> Result<SlotHandle, PoolError> {
        let index = if self.free_head != NIL {
            let index = self.free_head;
            self.free_head = self.slots[index as usize].next;
            self.stats.reuses += 1;
            index
        } else {
            let slot_count = self.slots.len();
            let limit = self
                .config
                .max_capacity
                .unwrap_or(NIL as usize)
                .min(NIL as usize);
            if slot_count >= limit {
                return Err(PoolError::CapacityExhausted { capacity: limit });
            }
            self.grow_if_full();
            self.slots.push(Slot {
                value: None,
                generation: 0,
                prev: NIL,
                next: NIL,
            });
            slot_count as u32
        };

        self.slots[index as usize].value = Some(value);
        self.link(index, location);
        self.len += 1;
        self.stats.allocations += 1;
        self.stats.peak_len = self.stats.peak_len.max(self.len);

        Ok(self.handle_at(index))
    }

    /// Get a reference to the element behind `handle`
    ///
    /// Returns `None` for handles issued by another pool, freed elements, and
    /// handles whose slot has since been reused.
    pub fn get(&self, handle: SlotHandle) -> Option<&T> {
        self.live_slot(handle).and_then(|slot| slot.value.as_ref())
    }

    /// Get a mutable reference to the element behind `handle`
    pub fn get_mut(&mut self, handle: SlotHandle) -> Option<&mut T> {
        if !self.contains(handle) {
            return None;
        }
        self.slots[handle.index as usize].value.as_mut()
    }

    /// Check if `handle` refers to a live element of this pool
    pub fn contains(&self, handle: SlotHandle) -> bool {
        self.live_slot(handle).is_some()
    }

    /// Release the element behind `handle` and return it
    ///
    /// Freeing an already freed or stale handle is a no-op returning `None`.
    pub fn free(&mut self, handle: SlotHandle) -> Option<T> {
        if !self.contains(handle) {
            return None;
        }
        self.release(handle.index)
    }

    /// Release the element behind `handle` and return the element after it
    ///
    /// This is the removal-safe step of a traversal: feeding the returned
    /// handle back into the loop continues exactly where the removed element
    /// left off. Returns `None` at the end of the pool or if `handle` is stale.
    pub fn free_and_advance(&mut self, handle: SlotHandle) -> Option<SlotHandle> {
        if !self.contains(handle) {
            return None;
        }
        let next = self.slots[handle.index as usize].next;
        self.release(handle.index);
        self.handle_or_none(next)
    }

    /// First element in iteration order
    pub fn first(&self) -> Option<SlotHandle> {
        self.handle_or_none(self.first)
    }

    /// Last element in iteration order
    pub fn last(&self) -> Option<SlotHandle> {
        self.handle_or_none(self.last)
    }

    /// Element following `handle` in iteration order
    ///
    /// Returns `None` at the end of the pool, or if `handle` is stale.
    pub fn next(&self, handle: SlotHandle) -> Option<SlotHandle> {
        let slot = self.live_slot(handle)?;
        self.handle_or_none(slot.next)
    }

    /// Iterate over live elements in iteration order
    pub fn iter(&self) -> Iter<'_, T> {
        Iter {
            pool: self,
            cursor: self.first,
            remaining: self.len,
        }
    }

    /// Visit every live element mutably, in iteration order
    pub fn for_each_mut<F>(&mut self, mut f: F)
    where
        F: FnMut(SlotHandle, &mut T),
    {
        let mut cursor = self.first;
        while cursor != NIL {
            let handle = self.handle_at(cursor);
            let slot = &mut self.slots[cursor as usize];
            cursor = slot.next;
            if let Some(value) = slot.value.as_mut() {
                f(handle, value);
            }
        }
    }

    /// Iterate mutably over live elements in storage order
    ///
    /// Storage order differs from iteration order once slots have been reused
    /// or elements were allocated at the front. Use this for bulk updates that
    /// do not care about order.
    pub fn values_mut(&mut self) -> impl Iterator<Item = &mut T> + '_ {
        self.slots.iter_mut().filter_map(|slot| slot.value.as_mut())
    }

    /// Visit every live element mutably across the Rayon thread pool
    ///
    /// Order is unspecified.
    #[cfg(feature = "parallel")]
    pub fn par_for_each_mut<F>(&mut self, f: F)
    where
        T: Send,
        F: Fn(&mut T) + Sync + Send,
    {
        self.slots
            .par_iter_mut()
            .filter_map(|slot| slot.value.as_mut())
            .for_each(f);
    }

    /// Drop every live element and invalidate all outstanding handles
    ///
    /// The slots themselves are kept for reuse.
    pub fn clear(&mut self) {
        let mut cursor = self.first;
        while cursor != NIL {
            let slot = &mut self.slots[cursor as usize];
            cursor = slot.next;
            slot.value = None;
            slot.generation = bump_generation(slot.generation);
            if slot.generation == RETIRED {
                self.stats.retired += 1;
            }
            self.stats.frees += 1;
        }

        // Rebuild the free list so the lowest indices are reused first
        self.free_head = NIL;
        for index in (0..self.slots.len()).rev() {
            let slot = &mut self.slots[index];
            if slot.generation != RETIRED {
                slot.prev = NIL;
                slot.next = self.free_head;
                self.free_head = index as u32;
            }
        }

        self.first = NIL;
        self.last = NIL;
        self.len = 0;
    }

    fn live_slot(&self, handle: SlotHandle) -> Option<&Slot<T>> {
        if handle.pool != self.id {
            return None;
        }
        self.slots
            .get(handle.index as usize)
            .filter(|slot| slot.generation == handle.generation && slot.value.is_some())
    }

    fn handle_at(&self, index: u32) -> SlotHandle {
        SlotHandle {
            pool: self.id,
            index,
            generation: self.slots[index as usize].generation,
        }
    }

    fn handle_or_none(&self, index: u32) -> Option<SlotHandle> {
        if index == NIL {
            None
        } else {
            Some(self.handle_at(index))
        }
    }

    fn grow_if_full(&mut self) {
        let current = self.slots.capacity();
        if self.slots.len() < current {
            return;
        }
        let mut target = ((current as f64) * self.config.growth_factor).ceil() as usize;
        target = target.max(current + 1);
        if let Some(max) = self.config.max_capacity {
            target = target.min(max);
        }
        self.slots.reserve_exact(target - self.slots.len());
        self.stats.resize_count += 1;
        log::debug!(
            "{}: grew slot storage from {} to {} slots ({} live)",
            self.id,
            current,
            self.slots.capacity(),
            self.len
        );
    }

    fn link(&mut self, index: u32, location: AllocationLocation) {
        match location {
            AllocationLocation::Back => {
                let last = self.last;
                {
                    let slot = &mut self.slots[index as usize];
                    slot.prev = last;
                    slot.next = NIL;
                }
                if last == NIL {
                    self.first = index;
                } else {
                    self.slots[last as usize].next = index;
                }
                self.last = index;
            }
            AllocationLocation::Front => {
                let first = self.first;
                {
                    let slot = &mut self.slots[index as usize];
                    slot.prev = NIL;
                    slot.next = first;
                }
                if first == NIL {
                    self.last = index;
                } else {
                    self.slots[first as usize].prev = index;
                }
                self.first = index;
            }
        }
    }

    fn unlink(&mut self, index: u32) {
        let (prev, next) = {
            let slot = &self.slots[index as usize];
            (slot.prev, slot.next)
        };
        if prev == NIL {
            self.first = next;
        } else {
            self.slots[prev as usize].next = next;
        }
        if next == NIL {
            self.last = prev;
        } else {
            self.slots[next as usize].prev = prev;
        }
    }

    /// Free a slot known to be live
    fn release(&mut self, index: u32) -> Option<T> {
        self.unlink(index);
        let free_head = self.free_head;
        let slot = &mut self.slots[index as usize];
        let value = slot.value.take();
        slot.generation = bump_generation(slot.generation);
        slot.prev = NIL;
        if slot.generation == RETIRED {
            slot.next = NIL;
            self.stats.retired += 1;
            log::debug!("{}: retired slot {} after exhausting its generations", self.id, index);
        } else {
            slot.next = free_head;
            self.free_head = index;
        }
        self.len -= 1;
        self.stats.frees += 1;
        value
    }
}

fn bump_generation(generation: u32) -> u32 {
    generation.saturating_add(1)
}

impl<T> Default for SlotPool<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: fmt::Debug> fmt::Debug for SlotPool<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SlotPool")
            .field("id", &self.id)
            .field("len", &self.len)
            .field("slot_count", &self.slots.len())
            .field("values", &self.iter().map(|(_, value)| value).collect::<Vec<_>>())
            .finish()
    }
}

/// Iterator over the live elements of a [`SlotPool`], in iteration order
pub struct Iter<'a, T> {
    pool: &'a SlotPool<T>,
    cursor: u32,
    remaining: usize,
}

impl<'a, T> Iterator for Iter<'a, T> {
    type Item = (SlotHandle, &'a T);

    fn next(&mut self) -> Option<Self::Item> {
        while self.cursor != NIL {
            let index = self.cursor;
            let slot = &self.pool.slots[index as usize];
            self.cursor = slot.next;
            if let Some(value) = slot.value.as_ref() {
                self.remaining = self.remaining.saturating_sub(1);
                return Some((self.pool.handle_at(index), value));
            }
        }
        None
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.remaining, Some(self.remaining))
    }
}

impl<T> ExactSizeIterator for Iter<'_, T> {}

impl<'a, T> IntoIterator for &'a SlotPool<T> {
    type Item = (SlotHandle, &'a T);
    type IntoIter = Iter<'a, T>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn values<T: Copy>(pool: &SlotPool<T>) -> Vec<T> {
        pool.iter().map(|(_, value)| *value).collect()
    }

    #[test]
    fn test_pool_config_defaults() {
        let config = PoolConfig::default();
        assert_eq!(config.initial_capacity, 64);
        assert_eq!(config.max_capacity, None);
        assert_eq!(config.growth_factor, 2.0);
    }

    #[test]
    fn test_pool_config_custom() {
        let config = PoolConfig::new(8)
            .with_max_capacity(16)
            .with_growth_factor(1.5);

        assert_eq!(config.initial_capacity, 8);
        assert_eq!(config.max_capacity, Some(16));
        assert_eq!(config.growth_factor, 1.5);
    }

    #[test]
    #[should_panic(expected = "Growth factor must be >= 1.0")]
    fn test_pool_config_rejects_shrinking_growth() {
        PoolConfig::default().with_growth_factor(0.5);
    }

    #[test]
    fn test_allocate_and_get() {
        let mut pool = SlotPool::new();
        let a = pool.allocate(10, AllocationLocation::Back).unwrap();
        let b = pool.allocate(20, AllocationLocation::Back).unwrap();

        assert_eq!(pool.len(), 2);
        assert_eq!(pool.get(a), Some(&10));
        assert_eq!(pool.get(b), Some(&20));
        assert_eq!(a.index(), 0);
        assert_eq!(b.index(), 1);
    }

    #[test]
    fn test_get_mut_updates_in_place() {
        let mut pool = SlotPool::new();
        let a = pool.allocate(1, AllocationLocation::Back).unwrap();
        *pool.get_mut(a).unwrap() = 5;
        assert_eq!(pool.get(a), Some(&5));
    }

    #[test]
    fn test_free_returns_value_and_invalidates_handle() {
        let mut pool = SlotPool::new();
        let a = pool.allocate("a", AllocationLocation::Back).unwrap();

        assert_eq!(pool.free(a), Some("a"));
        assert!(pool.get(a).is_none());
        assert!(!pool.contains(a));
        assert!(pool.is_empty());

        // Double free is a no-op
        assert_eq!(pool.free(a), None);
        assert_eq!(pool.stats().frees, 1);
    }

    #[test]
    fn test_freed_slot_is_reused_with_new_generation() {
        let mut pool = SlotPool::new();
        let a = pool.allocate(1, AllocationLocation::Back).unwrap();
        pool.free(a);
        let b = pool.allocate(2, AllocationLocation::Back).unwrap();

        assert_eq!(b.index(), a.index());
        assert_ne!(b.generation(), a.generation());
        assert!(pool.get(a).is_none());
        assert_eq!(pool.get(b), Some(&2));
        assert_eq!(pool.stats().reuses, 1);
    }

    #[test]
    fn test_most_recently_freed_slot_is_reused_first() {
        let mut pool = SlotPool::new();
        let handles: Vec<_> = (0..4)
            .map(|i| pool.allocate(i, AllocationLocation::Back).unwrap())
            .collect();
        pool.free(handles[1]);
        pool.free(handles[3]);

        let reused = pool.allocate(9, AllocationLocation::Back).unwrap();
        assert_eq!(reused.index(), 3);
        let reused = pool.allocate(8, AllocationLocation::Back).unwrap();
        assert_eq!(reused.index(), 1);
    }

    #[test]
    fn test_handles_from_other_pools_are_rejected() {
        let mut first = SlotPool::new();
        let mut second = SlotPool::new();
        let a = first.allocate(1, AllocationLocation::Back).unwrap();
        second.allocate(2, AllocationLocation::Back).unwrap();

        assert_ne!(first.id(), second.id());
        assert_eq!(a.index(), 0);
        assert!(second.get(a).is_none());
        assert_eq!(second.free(a), None);
        assert_eq!(second.len(), 1);
    }

    #[test]
    fn test_allocation_location_controls_order() {
        let mut pool = SlotPool::new();
        pool.allocate(2, AllocationLocation::Back).unwrap();
        pool.allocate(3, AllocationLocation::Back).unwrap();
        pool.allocate(1, AllocationLocation::Front).unwrap();
        pool.allocate(4, AllocationLocation::Back).unwrap();
        pool.allocate(0, AllocationLocation::Front).unwrap();

        assert_eq!(values(&pool), vec![0, 1, 2, 3, 4]);
        assert_eq!(pool.get(pool.first().unwrap()), Some(&0));
        assert_eq!(pool.get(pool.last().unwrap()), Some(&4));
    }

    #[test]
    fn test_reused_slot_follows_requested_location() {
        let mut pool = SlotPool::new();
        let a = pool.allocate(1, AllocationLocation::Back).unwrap();
        pool.allocate(2, AllocationLocation::Back).unwrap();
        pool.allocate(3, AllocationLocation::Back).unwrap();

        pool.free(a);
        let reused = pool.allocate(4, AllocationLocation::Back).unwrap();
        assert_eq!(reused.index(), 0);
        assert_eq!(values(&pool), vec![2, 3, 4]);
    }

    #[test]
    fn test_free_and_advance_visits_everything_once() {
        let mut pool = SlotPool::new();
        for i in 0..10 {
            pool.allocate(i, AllocationLocation::Back).unwrap();
        }

        let mut visited = Vec::new();
        let mut cursor = pool.first();
        while let Some(handle) = cursor {
            let value = *pool.get(handle).unwrap();
            visited.push(value);
            cursor = if value % 2 == 0 {
                pool.free_and_advance(handle)
            } else {
                pool.next(handle)
            };
        }

        assert_eq!(visited, (0..10).collect::<Vec<_>>());
        assert_eq!(values(&pool), vec![1, 3, 5, 7, 9]);
    }

    #[test]
    fn test_free_and_advance_on_stale_handle() {
        let mut pool = SlotPool::new();
        let a = pool.allocate(1, AllocationLocation::Back).unwrap();
        pool.allocate(2, AllocationLocation::Back).unwrap();
        pool.free(a);

        assert_eq!(pool.free_and_advance(a), None);
        assert_eq!(pool.next(a), None);
        assert_eq!(pool.len(), 1);
    }

    #[test]
    fn test_max_capacity_is_enforced() {
        let mut pool = SlotPool::with_config(PoolConfig::new(1).with_max_capacity(2));
        let a = pool.allocate(1, AllocationLocation::Back).unwrap();
        pool.allocate(2, AllocationLocation::Back).unwrap();

        let result = pool.allocate(3, AllocationLocation::Back);
        assert_eq!(result, Err(PoolError::CapacityExhausted { capacity: 2 }));

        // Freed slots can still be recycled at the limit
        pool.free(a);
        assert!(pool.allocate(4, AllocationLocation::Back).is_ok());
        assert_eq!(pool.slot_count(), 2);
    }

    #[test]
    fn test_growth_is_tracked() {
        let mut pool = SlotPool::with_config(PoolConfig::new(2).with_growth_factor(2.0));
        for i in 0..9 {
            pool.allocate(i, AllocationLocation::Back).unwrap();
        }

        let stats = pool.stats();
        assert!(stats.resize_count >= 2);
        assert!(pool.capacity() >= 9);
        assert_eq!(stats.peak_len, 9);
    }

    #[test]
    fn test_zero_initial_capacity() {
        let mut pool = SlotPool::with_config(PoolConfig::new(0));
        assert_eq!(pool.capacity(), 0);
        let a = pool.allocate(7, AllocationLocation::Back).unwrap();
        assert_eq!(pool.get(a), Some(&7));
    }

    #[test]
    fn test_clear_invalidates_handles() {
        let mut pool = SlotPool::new();
        let a = pool.allocate(1, AllocationLocation::Back).unwrap();
        let b = pool.allocate(2, AllocationLocation::Back).unwrap();

        pool.clear();
        assert!(pool.is_empty());
        assert!(pool.first().is_none());
        assert!(pool.get(a).is_none());
        assert!(pool.get(b).is_none());

        let c = pool.allocate(3, AllocationLocation::Back).unwrap();
        assert_eq!(c.index(), 0);
        assert_eq!(values(&pool), vec![3]);
    }

    #[test]
    fn test_generation_exhaustion_retires_slot() {
        let mut pool = SlotPool::new();
        let a = pool.allocate(1, AllocationLocation::Back).unwrap();
        pool.slots[a.index()].generation = RETIRED - 1;
        let a = pool.handle_at(a.index as u32);

        pool.free(a);
        assert_eq!(pool.stats().retired, 1);

        let b = pool.allocate(2, AllocationLocation::Back).unwrap();
        assert_ne!(b.index(), a.index());
        assert_eq!(pool.slot_count(), 2);
    }

    #[test]
    fn test_for_each_mut_follows_iteration_order() {
        let mut pool = SlotPool::new();
        pool.allocate(1, AllocationLocation::Back).unwrap();
        pool.allocate(0, AllocationLocation::Front).unwrap();

        let mut order = Vec::new();
        pool.for_each_mut(|_, value| {
            order.push(*value);
            *value += 10;
        });

        assert_eq!(order, vec![0, 1]);
        assert_eq!(values(&pool), vec![10, 11]);
    }

    #[test]
    fn test_values_mut_and_iter_len() {
        let mut pool = SlotPool::new();
        for i in 0..5 {
            pool.allocate(i, AllocationLocation::Back).unwrap();
        }
        for value in pool.values_mut() {
            *value *= 2;
        }
        assert_eq!(pool.iter().len(), 5);
        assert_eq!(values(&pool).iter().sum::<i32>(), 20);
    }

    #[cfg(feature = "parallel")]
    #[test]
    fn test_par_for_each_mut() {
        let mut pool = SlotPool::new();
        for i in 0..1000u64 {
            pool.allocate(i, AllocationLocation::Back).unwrap();
        }
        pool.par_for_each_mut(|value| *value += 1);
        assert_eq!(pool.iter().map(|(_, v)| *v).sum::<u64>(), (1..=1000).sum());
    }

    #[test]
    fn test_reuse_rate() {
        let mut pool = SlotPool::new();
        let a = pool.allocate(1, AllocationLocation::Back).unwrap();
        pool.free(a);
        pool.allocate(2, AllocationLocation::Back).unwrap();

        assert_eq!(pool.stats().allocations, 2);
        assert_eq!(pool.stats().reuse_rate(), 50.0);
    }
}

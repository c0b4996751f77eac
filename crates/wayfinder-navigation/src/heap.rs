//! Indexed binary min-heap with in-place priority updates.
//!
//! Unlike [`std::collections::BinaryHeap`], every key remembers its slot in the
//! heap, so membership tests are O(1) and a queued key can have its priority
//! changed in O(log n) without being removed and re-added. This is what the
//! A* open set needs when it finds a cheaper route to a frontier cell.

use std::collections::HashMap;
use std::fmt;
use std::hash::Hash;

/// A min-heap of `(key, priority)` pairs with one entry per key.
///
/// The smallest priority is removed first. Keys with equal priorities come out
/// in an unspecified but deterministic order.
pub struct IndexedHeap<K, P> {
    entries: Vec<(K, P)>,
    slots: HashMap<K, usize>,
}

impl<K, P> IndexedHeap<K, P>
where
    K: Clone + Eq + Hash,
    P: Ord,
{
    /// Creates an empty heap.
    pub fn new() -> Self {
        IndexedHeap {
            entries: Vec::new(),
            slots: HashMap::new(),
        }
    }

    /// Creates an empty heap with room for `capacity` entries.
    pub fn with_capacity(capacity: usize) -> Self {
        IndexedHeap {
            entries: Vec::with_capacity(capacity),
            slots: HashMap::with_capacity(capacity),
        }
    }

    /// Number of queued keys.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true when nothing is queued.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Returns true when `key` is currently queued.
    pub fn contains(&self, key: &K) -> bool {
        self.slots.contains_key(key)
    }

    /// Current priority of a queued key.
    pub fn priority(&self, key: &K) -> Option<&P> {
        self.slots.get(key).map(|&slot| &self.entries[slot].1)
    }

    /// Smallest entry, without removing it.
    pub fn peek(&self) -> Option<(&K, &P)> {
        self.entries.first().map(|(k, p)| (k, p))
    }

    /// Queues `key` with `priority`.
    ///
    /// If the key is already queued its priority is replaced instead, as
    /// [`update`](Self::update) would do.
    ///
    /// # Returns
    /// * `bool` - `true` if the key was newly added
    pub fn add(&mut self, key: K, priority: P) -> bool {
        if self.contains(&key) {
            self.update(&key, priority);
            return false;
        }
        let slot = self.entries.len();
        self.slots.insert(key.clone(), slot);
        self.entries.push((key, priority));
        self.sift_up(slot);
        true
    }

    /// Removes and returns the entry with the smallest priority.
    pub fn remove_first(&mut self) -> Option<(K, P)> {
        if self.entries.is_empty() {
            return None;
        }
        let last = self.entries.len() - 1;
        self.swap(0, last);
        let (key, priority) = self.entries.pop()?;
        self.slots.remove(&key);
        if !self.entries.is_empty() {
            self.sift_down(0);
        }
        Some((key, priority))
    }

    /// Changes the priority of a queued key and restores the heap order.
    ///
    /// # Returns
    /// * `bool` - `false` if the key is not queued; nothing is inserted
    pub fn update(&mut self, key: &K, priority: P) -> bool {
        let Some(&slot) = self.slots.get(key) else {
            return false;
        };
        self.entries[slot].1 = priority;
        let slot = self.sift_up(slot);
        self.sift_down(slot);
        true
    }

    /// Removes every entry.
    pub fn clear(&mut self) {
        self.entries.clear();
        self.slots.clear();
    }

    fn swap(&mut self, a: usize, b: usize) {
        if a == b {
            return;
        }
        self.entries.swap(a, b);
        if let Some(slot) = self.slots.get_mut(&self.entries[a].0) {
            *slot = a;
        }
        if let Some(slot) = self.slots.get_mut(&self.entries[b].0) {
            *slot = b;
        }
    }

    fn sift_up(&mut self, mut slot: usize) -> usize {
        while slot > 0 {
            let parent = (slot - 1) / 2;
            if self.entries[slot].1 >= self.entries[parent].1 {
                break;
            }
            self.swap(slot, parent);
            slot = parent;
        }
        slot
    }

    fn sift_down(&mut self, mut slot: usize) -> usize {
        let len = self.entries.len();
        loop {
            let left = 2 * slot + 1;
            let right = left + 1;
            let mut smallest = slot;
            if left < len && self.entries[left].1 < self.entries[smallest].1 {
                smallest = left;
            }
            if right < len && self.entries[right].1 < self.entries[smallest].1 {
                smallest = right;
            }
            if smallest == slot {
                return slot;
            }
            self.swap(slot, smallest);
            slot = smallest;
        }
    }
}

impl<K, P> Default for IndexedHeap<K, P>
where
    K: Clone + Eq + Hash,
    P: Ord,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<K: fmt::Debug, P: fmt::Debug> fmt::Debug for IndexedHeap<K, P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.entries.iter()).finish()
    }
}

/// Open-set priority of an A* frontier cell.
///
/// Orders by total cost `f = g + h`, then by the heuristic `h`, so that among
/// equally promising cells the one closer to the target is expanded first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SearchPriority {
    /// Estimated total cost through the cell.
    pub f_cost: u32,
    /// Heuristic cost from the cell to the target.
    pub h_cost: u32,
}

impl SearchPriority {
    /// Builds a priority from the cost so far and the heuristic.
    pub fn new(g_cost: u32, h_cost: u32) -> Self {
        SearchPriority {
            f_cost: g_cost.saturating_add(h_cost),
            h_cost,
        }
    }
}

//! A bounded map with least-recently-used eviction.
//!
//! The cache keeps two views of the same entries: a hash index for lookups,
//! and a doubly-linked recency list (threaded through a slab of slots) for
//! eviction. Both are updated together by every operation, and neither is
//! exposed, so they can't drift apart.

use std::collections::HashMap;
use std::hash::Hash;

#[derive(Clone, Debug)]
struct Slot<K, V> {
    key: K,
    value: V,
    // Towards the most recently used end.
    prev: Option<usize>,
    // Towards the least recently used end.
    next: Option<usize>,
}

/// A bounded cache with least-recently-used eviction.
///
/// Lookups, promotions and evictions are all `O(1)`. A capacity of zero
/// turns the cache off: values are computed but never stored.
#[derive(Clone, Debug)]
pub struct LruCache<K, V> {
    index: HashMap<K, usize>,
    slots: Vec<Slot<K, V>>,
    head: Option<usize>,
    tail: Option<usize>,
    capacity: usize,
    hits: u64,
    misses: u64,
}

impl<K: Hash + Eq + Clone, V: Clone> LruCache<K, V> {
    /// Creates an empty cache holding at most `capacity` entries.
    ///
    /// No memory is reserved up front; the cache grows as it fills.
    pub fn new(capacity: usize) -> Self {
        LruCache {
            index: HashMap::new(),
            slots: Vec::new(),
            head: None,
            tail: None,
            capacity,
            hits: 0,
            misses: 0,
        }
    }

    /// The number of entries currently stored.
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    /// Are we empty?
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// The maximum number of entries.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// The number of lookups that found their key.
    pub fn hits(&self) -> u64 {
        self.hits
    }

    /// The number of lookups that had to compute their value.
    pub fn misses(&self) -> u64 {
        self.misses
    }

    /// Is `key` resident? This doesn't count as an access.
    pub fn contains(&self, key: &K) -> bool {
        self.index.contains_key(key)
    }

    /// Removes every entry (but keeps the hit and miss counts).
    pub fn clear(&mut self) {
        self.index.clear();
        self.slots.clear();
        self.head = None;
        self.tail = None;
    }

    /// Looks up `key`, marking it as the most recently used.
    pub fn get(&mut self, key: &K) -> Option<&V> {
        let idx = *self.index.get(key)?;
        self.hits += 1;
        self.promote(idx);
        Some(&self.slots[idx].value)
    }

    /// Looks up `key`, computing and inserting its value if it's missing.
    pub fn get_or_insert_with(&mut self, key: K, compute: impl FnOnce() -> V) -> V {
        match self.try_get_or_insert_with(key, || Ok::<_, std::convert::Infallible>(compute())) {
            Ok(v) => v,
            Err(never) => match never {},
        }
    }

    /// Like [`LruCache::get_or_insert_with`], but the computation may fail.
    ///
    /// Failures are passed through and nothing is inserted.
    pub fn try_get_or_insert_with<E>(
        &mut self,
        key: K,
        compute: impl FnOnce() -> Result<V, E>,
    ) -> Result<V, E> {
        if let Some(v) = self.get(&key) {
            return Ok(v.clone());
        }
        self.misses += 1;
        let value = compute()?;
        self.insert(key, value.clone());
        Ok(value)
    }

    /// Iterates over the keys, most recently used first.
    pub fn keys_by_recency(&self) -> impl Iterator<Item = &K> + '_ {
        let mut cur = self.head;
        std::iter::from_fn(move || {
            let slot = &self.slots[cur?];
            cur = slot.next;
            Some(&slot.key)
        })
    }

    // Inserts a key that isn't yet present.
    fn insert(&mut self, key: K, value: V) {
        debug_assert!(!self.index.contains_key(&key));
        if self.capacity == 0 {
            return;
        }

        let idx = if self.slots.len() >= self.capacity {
            // unwrap: the cache is full and the capacity is positive, so there's a tail.
            let idx = self.tail.unwrap();
            self.unlink(idx);
            let slot = &mut self.slots[idx];
            log::trace!("evicting least recently used cache slot {idx}");
            self.index.remove(&slot.key);
            slot.key = key.clone();
            slot.value = value;
            idx
        } else {
            self.slots.push(Slot {
                key: key.clone(),
                value,
                prev: None,
                next: None,
            });
            self.slots.len() - 1
        };
        self.index.insert(key, idx);
        self.push_front(idx);

        #[cfg(feature = "slow-asserts")]
        self.check_invariants();
    }

    fn unlink(&mut self, idx: usize) {
        let Slot { prev, next, .. } = self.slots[idx];
        match prev {
            Some(p) => self.slots[p].next = next,
            None => self.head = next,
        }
        match next {
            Some(n) => self.slots[n].prev = prev,
            None => self.tail = prev,
        }
        self.slots[idx].prev = None;
        self.slots[idx].next = None;
    }

    fn push_front(&mut self, idx: usize) {
        self.slots[idx].prev = None;
        self.slots[idx].next = self.head;
        if let Some(h) = self.head {
            self.slots[h].prev = Some(idx);
        }
        self.head = Some(idx);
        if self.tail.is_none() {
            self.tail = Some(idx);
        }
    }

    fn promote(&mut self, idx: usize) {
        if self.head != Some(idx) {
            self.unlink(idx);
            self.push_front(idx);
        }
    }

    #[cfg(any(test, feature = "slow-asserts"))]
    fn check_invariants(&self) {
        assert!(self.slots.len() <= self.capacity);
        assert_eq!(self.index.len(), self.slots.len());
        let keys: Vec<_> = self.keys_by_recency().collect();
        assert_eq!(keys.len(), self.slots.len());
        for (k, &idx) in &self.index {
            assert!(self.slots[idx].key == *k);
        }
    }
}

// Copyright (c) 2024 The image-attestor Authors
//
// SPDX-License-Identifier: Apache-2.0
//

//! Bounded, recency ordered cache of derived signature selectors.
//!
//! The cache is keyed by image ID. Each image keeps every verified selector
//! its signatures produced. Allow-list filtering happens when an attestation
//! is rendered, not here, so a policy change never requires invalidation.

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::Mutex;

use crate::signature::SignatureSelector;

/// Default number of distinct images kept in the cache.
pub const DEFAULT_CACHE_SIZE: usize = 100;

#[async_trait]
pub trait SignatureCache: Send + Sync {
    /// Look up `key` and mark it most recently used. `None` means the key is
    /// absent, which is distinct from a cached empty selector list.
    async fn get_signature(&self, key: &str) -> Option<Vec<SignatureSelector>>;

    /// Insert or overwrite `key` and mark it most recently used, evicting the
    /// least recently used key when a new key would exceed the capacity.
    async fn put_signature(&self, key: String, value: Vec<SignatureSelector>);
}

#[derive(Debug)]
struct Node<V> {
    key: String,
    value: V,
    prev: Option<usize>,
    next: Option<usize>,
}

/// Doubly linked recency list over a slab, with a hash index into the slab.
///
/// `head` is the most recently used entry and `tail` the least recently used.
/// The slab never grows past `capacity`; an eviction reuses the evicted slot.
#[derive(Debug)]
struct LruMap<V> {
    capacity: usize,
    nodes: Vec<Node<V>>,
    index: HashMap<String, usize>,
    head: Option<usize>,
    tail: Option<usize>,
}

impl<V> LruMap<V> {
    fn new(capacity: usize) -> Self {
        Self {
            capacity,
            nodes: Vec::with_capacity(capacity),
            index: HashMap::with_capacity(capacity),
            head: None,
            tail: None,
        }
    }

    fn get(&mut self, key: &str) -> Option<&V> {
        let idx = *self.index.get(key)?;
        self.move_to_front(idx);
        Some(&self.nodes[idx].value)
    }

    fn put(&mut self, key: String, value: V) {
        if self.capacity == 0 {
            return;
        }

        if let Some(&idx) = self.index.get(&key) {
            self.nodes[idx].value = value;
            self.move_to_front(idx);
            return;
        }

        let node = Node {
            key: key.clone(),
            value,
            prev: None,
            next: None,
        };

        let idx = if self.nodes.len() < self.capacity {
            self.nodes.push(node);
            self.nodes.len() - 1
        } else {
            let Some(lru) = self.tail else {
                return;
            };
            self.unlink(lru);
            let evicted = std::mem::replace(&mut self.nodes[lru], node);
            self.index.remove(&evicted.key);
            lru
        };

        self.index.insert(key, idx);
        self.push_front(idx);
    }

    fn len(&self) -> usize {
        self.index.len()
    }

    fn clear(&mut self) {
        self.nodes.clear();
        self.index.clear();
        self.head = None;
        self.tail = None;
    }

    fn unlink(&mut self, idx: usize) {
        let (prev, next) = (self.nodes[idx].prev, self.nodes[idx].next);
        match prev {
            Some(prev) => self.nodes[prev].next = next,
            None => self.head = next,
        }
        match next {
            Some(next) => self.nodes[next].prev = prev,
            None => self.tail = prev,
        }
        self.nodes[idx].prev = None;
        self.nodes[idx].next = None;
    }

    fn push_front(&mut self, idx: usize) {
        self.nodes[idx].prev = None;
        self.nodes[idx].next = self.head;
        if let Some(head) = self.head {
            self.nodes[head].prev = Some(idx);
        }
        self.head = Some(idx);
        if self.tail.is_none() {
            self.tail = Some(idx);
        }
    }

    fn move_to_front(&mut self, idx: usize) {
        if self.head == Some(idx) {
            return;
        }
        self.unlink(idx);
        self.push_front(idx);
    }

    /// Keys from most to least recently used.
    #[cfg(test)]
    fn keys(&self) -> Vec<&str> {
        let mut keys = Vec::with_capacity(self.len());
        let mut cursor = self.head;
        while let Some(idx) = cursor {
            keys.push(self.nodes[idx].key.as_str());
            cursor = self.nodes[idx].next;
        }
        keys
    }
}

/// The in-memory [`SignatureCache`] used by the attestor.
#[derive(Debug)]
pub struct LruSignatureCache {
    inner: Mutex<LruMap<Vec<SignatureSelector>>>,
}

impl LruSignatureCache {
    /// Create a cache holding at most `capacity` images. A capacity of 0
    /// disables caching.
    pub fn new(capacity: usize) -> Self {
        Self {
            inner: Mutex::new(LruMap::new(capacity)),
        }
    }

    pub async fn len(&self) -> usize {
        self.inner.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    pub async fn clear(&self) {
        self.inner.lock().await.clear();
    }
}

impl Default for LruSignatureCache {
    fn default() -> Self {
        Self::new(DEFAULT_CACHE_SIZE)
    }
}

#[async_trait]
impl SignatureCache for LruSignatureCache {
    async fn get_signature(&self, key: &str) -> Option<Vec<SignatureSelector>> {
        self.inner.lock().await.get(key).cloned()
    }

    async fn put_signature(&self, key: String, value: Vec<SignatureSelector>) {
        self.inner.lock().await.put(key, value);
    }
}

//! Bounded, TTL-aware LRU cache with a single-writer serialization discipline.
//!
//! Readers take a shared lock across the map lookup and the expiry check;
//! every `get` (hit, miss, or stale) that touches an existing entry enqueues
//! a writer event, and only the writer task ever mutates the map or the
//! recency list. This keeps `get` cheap and lock-free with respect to other
//! readers while still letting one promotion at a time land deterministically.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use tokio::sync::{mpsc, RwLock};
use tracing::debug;

/// One cached value. Identity is the key; once written, `value` and `expiry`
/// are never mutated in place — only promoted (moved in the recency list) or
/// replaced wholesale by a fresh insert.
#[derive(Debug, Clone)]
struct Entry {
    key: String,
    value: String,
    expiry: Instant,
}

/// A slot in the arena-backed doubly linked recency list.
struct Node {
    entry: Entry,
    prev: Option<usize>,
    next: Option<usize>,
}

/// The map + list pair the writer exclusively mutates. Readers only ever
/// look things up through the shared lock that wraps this struct; no method
/// here does its own locking.
struct Inner {
    map: HashMap<String, usize>,
    arena: Vec<Option<Node>>,
    free: Vec<usize>,
    head: Option<usize>,
    tail: Option<usize>,
    len: usize,
    capacity: usize,
}

impl Inner {
    fn new(capacity: usize) -> Self {
        Self {
            map: HashMap::new(),
            arena: Vec::new(),
            free: Vec::new(),
            head: None,
            tail: None,
            len: 0,
            capacity,
        }
    }

    fn alloc(&mut self, entry: Entry) -> usize {
        let node = Node {
            entry,
            prev: None,
            next: None,
        };
        if let Some(idx) = self.free.pop() {
            self.arena[idx] = Some(node);
            idx
        } else {
            self.arena.push(Some(node));
            self.arena.len() - 1
        }
    }

    /// Detach `idx` from the list without freeing its slot (used when
    /// promoting a node that will immediately be re-linked at the front).
    fn unlink(&mut self, idx: usize) {
        let (prev, next) = {
            let node = self.arena[idx].as_ref().expect("unlink of freed node");
            (node.prev, node.next)
        };
        match prev {
            Some(p) => self.arena[p].as_mut().unwrap().next = next,
            None => self.head = next,
        }
        match next {
            Some(n) => self.arena[n].as_mut().unwrap().prev = prev,
            None => self.tail = prev,
        }
        let node = self.arena[idx].as_mut().unwrap();
        node.prev = None;
        node.next = None;
    }

    fn push_front(&mut self, idx: usize) {
        let old_head = self.head;
        {
            let node = self.arena[idx].as_mut().unwrap();
            node.next = old_head;
            node.prev = None;
        }
        if let Some(h) = old_head {
            self.arena[h].as_mut().unwrap().prev = Some(idx);
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

    fn evict_tail(&mut self) {
        if let Some(tail) = self.tail {
            let key = self.arena[tail].as_ref().unwrap().entry.key.clone();
            self.unlink(tail);
            self.arena[tail] = None;
            self.free.push(tail);
            self.map.remove(&key);
            self.len -= 1;
        }
    }

    /// Insert-or-promote. If the key already exists, only its recency is
    /// refreshed — the stored value and expiry are left untouched, matching
    /// the upstream behavior this cache was modeled on (see DESIGN.md).
    fn write_or_promote(&mut self, entry: Entry) {
        if let Some(&idx) = self.map.get(&entry.key) {
            self.move_to_front(idx);
            debug!(key = %entry.key, "key found in cache, moving to front");
            return;
        }

        if self.len == self.capacity {
            self.evict_tail();
        }

        let key = entry.key.clone();
        let idx = self.alloc(entry);
        self.push_front(idx);
        self.map.insert(key.clone(), idx);
        self.len += 1;
        debug!(key = %key, "new key written into cache");
    }

    fn delete(&mut self, entry: Entry) {
        if let Some(idx) = self.map.remove(&entry.key) {
            self.unlink(idx);
            self.arena[idx] = None;
            self.free.push(idx);
            self.len -= 1;
            debug!(key = %entry.key, "expired key found, deleted from cache");
        }
    }

    #[cfg(test)]
    fn ordered_keys(&self) -> Vec<String> {
        let mut keys = Vec::with_capacity(self.len);
        let mut cur = self.head;
        while let Some(idx) = cur {
            let node = self.arena[idx].as_ref().unwrap();
            keys.push(node.entry.key.clone());
            cur = node.next;
        }
        keys
    }
}

/// Bounded LRU cache with per-entry TTL, fronting a Redis-compatible upstream.
///
/// Cloning a `Cache` handle is cheap: the map/list live behind a shared lock
/// and the writer mailbox sender is an `mpsc::Sender`, both trivially
/// clonable. Callers generally hold it behind an `Arc` anyway since it is
/// shared across every worker.
pub struct Cache {
    inner: std::sync::Arc<RwLock<Inner>>,
    writer: mpsc::Sender<Entry>,
    ttl: Duration,
}

impl Cache {
    /// `mailbox` bounds the writer's event queue; the dispatcher sizes it to
    /// the worker pool so that writers never lag meaningfully behind the
    /// upstream lookups that feed them.
    pub fn new(capacity: usize, ttl: Duration, mailbox: usize) -> Self {
        let inner = std::sync::Arc::new(RwLock::new(Inner::new(capacity)));
        let (tx, rx) = mpsc::channel(mailbox.max(1));

        let writer_inner = inner.clone();
        tokio::spawn(run_writer(writer_inner, rx));

        Self {
            inner,
            writer: tx,
            ttl,
        }
    }

    /// Returns the cached value if present and unexpired, otherwise an empty
    /// string. Every call that finds an existing entry — hit or stale —
    /// enqueues a writer event; a miss enqueues nothing.
    pub async fn get(&self, key: &str) -> String {
        let (found, now_stale, entry) = {
            let guard = self.inner.read().await;
            match guard.map.get(key) {
                None => {
                    debug!(key = %key, "key doesn't exist in cache");
                    (false, false, None)
                }
                Some(&idx) => {
                    let node = guard.arena[idx].as_ref().expect("map points at freed node");
                    let entry = node.entry.clone();
                    let stale = Instant::now() >= entry.expiry;
                    (true, stale, Some(entry))
                }
            }
        };

        if !found {
            return String::new();
        }
        let entry = entry.unwrap();

        if now_stale {
            let _ = self.writer.send(entry).await;
            String::new()
        } else {
            let value = entry.value.clone();
            let _ = self.writer.send(entry).await;
            value
        }
    }

    /// Captures `(key, value, now + ttl)` and enqueues an insert/promote
    /// event. May block briefly if the writer mailbox is saturated — that
    /// backpressure is intentional (see SPEC_FULL.md §5).
    pub async fn set(&self, key: String, value: String) {
        let expiry = Instant::now() + self.ttl;
        let entry = Entry { key, value, expiry };
        let _ = self.writer.send(entry).await;
    }

    #[cfg(test)]
    async fn len(&self) -> usize {
        self.inner.read().await.len
    }

    #[cfg(test)]
    async fn ordered_keys(&self) -> Vec<String> {
        self.inner.read().await.ordered_keys()
    }
}

async fn run_writer(inner: std::sync::Arc<RwLock<Inner>>, mut rx: mpsc::Receiver<Entry>) {
    debug!("cache writer is running");
    while let Some(entry) = rx.recv().await {
        let mut guard = inner.write().await;
        if Instant::now() >= entry.expiry {
            guard.delete(entry);
        } else {
            guard.write_or_promote(entry);
        }
    }
}

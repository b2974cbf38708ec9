//! The storage collaborator boundary.
//!
//! The execution core never persists anything itself; it asks a [`ReadStore`]
//! for ordered range scans over the key space and composes the returned
//! iterators. Isolation and consistency of the read view are the store's
//! responsibility; this layer assumes a view is established before iteration
//! begins. Each scan is owned exclusively by its iterator until recycled or
//! exhausted.
//!
//! [`MemoryStore`] is the in-process reference implementation used by tests
//! and demos; its scans genuinely re-seek, so `forward` skips the key space
//! instead of reading through it.

use std::collections::BTreeMap;
use std::ops::Bound;
use std::sync::Arc;

use parking_lot::RwLock;

use crate::encoding::Key;
use crate::error::{Result, TesseraError};
use crate::iterator::sorted::{BoxForward, Forward, Order, Sorted};
use crate::iterator::Lazy;

/// Read access to an ordered key-value store.
pub trait ReadStore: Send + Sync {
    /// Point lookup.
    fn get(&self, key: &Key) -> Result<Option<Vec<u8>>>;

    /// Ordered scan of `[lower, upper)`. The returned iterator owns the
    /// scan; the caller must recycle it (or drain it) to release the view.
    fn scan(&self, lower: &Key, upper: &Key, order: Order) -> Result<BoxForward<Key>>;
}

type SharedMap = Arc<RwLock<BTreeMap<Vec<u8>, Vec<u8>>>>;

/// An in-memory ordered store over a shared `BTreeMap`.
#[derive(Default, Clone)]
pub struct MemoryStore {
    map: SharedMap,
}

impl MemoryStore {
    /// Creates an empty store.
    pub fn new() -> MemoryStore {
        MemoryStore::default()
    }

    /// Inserts or replaces an entry.
    pub fn put(&self, key: Key, value: Vec<u8>) {
        self.map.write().insert(key.bytes().to_vec(), value);
    }

    /// Removes an entry, returning whether it existed.
    pub fn delete(&self, key: &Key) -> bool {
        self.map.write().remove(key.bytes()).is_some()
    }

    /// Number of stored entries.
    pub fn len(&self) -> usize {
        self.map.read().len()
    }

    /// Whether the store holds no entries.
    pub fn is_empty(&self) -> bool {
        self.map.read().is_empty()
    }
}

impl ReadStore for MemoryStore {
    fn get(&self, key: &Key) -> Result<Option<Vec<u8>>> {
        Ok(self.map.read().get(key.bytes()).cloned())
    }

    fn scan(&self, lower: &Key, upper: &Key, order: Order) -> Result<BoxForward<Key>> {
        let hi = if upper.bytes().is_empty() {
            // An empty exclusive bound means "no finite successor": unbounded.
            Bound::Unbounded
        } else {
            Bound::Excluded(upper.bytes().to_vec())
        };
        Ok(Box::new(MemoryScan {
            map: Arc::clone(&self.map),
            lo: Bound::Included(lower.bytes().to_vec()),
            hi,
            order,
            next: None,
            last: None,
            done: false,
        }))
    }
}

/// A re-seeking cursor over the shared map. Holds no lock between pulls;
/// each fetch re-enters the map at the remembered position.
struct MemoryScan {
    map: SharedMap,
    lo: Bound<Vec<u8>>,
    hi: Bound<Vec<u8>>,
    order: Order,
    next: Option<Key>,
    last: Option<Key>,
    done: bool,
}

impl MemoryScan {
    fn fetch(&mut self) {
        if self.next.is_some() || self.done {
            return;
        }
        let map = self.map.read();
        let mut range = map.range::<Vec<u8>, _>((self.lo.clone(), self.hi.clone()));
        let found = match self.order {
            Order::Ascending => range.next(),
            Order::Descending => range.next_back(),
        };
        match found {
            Some((bytes, _)) => {
                match self.order {
                    Order::Ascending => self.lo = Bound::Excluded(bytes.clone()),
                    Order::Descending => self.hi = Bound::Excluded(bytes.clone()),
                }
                self.next = Some(Key::from_bytes(bytes));
            }
            None => self.done = true,
        }
    }
}

impl Lazy<Key> for MemoryScan {
    fn has_next(&mut self) -> Result<bool> {
        self.fetch();
        Ok(self.next.is_some())
    }

    fn next(&mut self) -> Result<Key> {
        self.fetch();
        let key = self.next.take().ok_or(TesseraError::Exhausted)?;
        self.last = Some(key.clone());
        Ok(key)
    }

    fn recycle(&mut self) {
        self.next = None;
        self.done = true;
    }
}

impl Sorted<Key> for MemoryScan {
    fn order(&self) -> Order {
        self.order
    }

    fn peek(&mut self) -> Result<Option<&Key>> {
        self.fetch();
        Ok(self.next.as_ref())
    }
}

impl Forward<Key> for MemoryScan {
    fn forward(&mut self, target: &Key) -> Result<()> {
        if let Some(last) = &self.last {
            if !self.order.is_valid_next(last, target) {
                return Err(TesseraError::OrderingViolation(
                    "forward target precedes the last returned element",
                ));
            }
        }
        if let Some(next) = &self.next {
            if self.order.is_valid_next(target, next) {
                return Ok(());
            }
            self.last = self.next.take();
        }
        match self.order {
            Order::Ascending => self.lo = Bound::Included(target.bytes().to_vec()),
            Order::Descending => self.hi = Bound::Included(target.bytes().to_vec()),
        }
        Ok(())
    }
}

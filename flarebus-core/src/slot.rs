//! Listener Slots
//!
//! Each event type owns one [`ListenerSlot`]: a copy-on-write holder of an
//! immutable, priority-sorted consumer array.
//!
//! # Key Types
//!
//! - [`ListenerSlot`]: per-event-type holder, mutated by whole-array swaps
//! - [`Snapshot`]: the array as published at the moment it was loaded
//!
//! # Performance
//!
//! - **Read**: O(1) - one atomic load, no lock, no allocation
//! - **Write**: O(n) - copy into a new array + atomic swap, under the slot lock
//!
//! Readers see either the array before a mutation or the one after it, never
//! a partially built one.

use crate::consumer::Consumer;
use arc_swap::{ArcSwap, Guard};
use parking_lot::Mutex;
use std::fmt;
use std::ops::Deref;
use std::sync::Arc;

/// Immutable consumer array published by a slot.
pub type ConsumerArray = Box<[Arc<Consumer>]>;

// ============================================================================
// Snapshot - Immutable View
// ============================================================================

/// The consumers of one event type at a point in time.
///
/// Holding a snapshot keeps its array alive even after the slot has moved
/// on, so dispatch can iterate it while subscriptions change.
pub struct Snapshot {
    inner: Guard<Arc<ConsumerArray>>,
}

impl Snapshot {
    /// Check if this snapshot holds the same array as `other`.
    #[inline]
    pub fn same_source(&self, other: &Snapshot) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl Deref for Snapshot {
    type Target = [Arc<Consumer>];

    #[inline]
    fn deref(&self) -> &Self::Target {
        &self.inner[..]
    }
}

impl fmt::Debug for Snapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.iter()).finish()
    }
}

// ============================================================================
// ListenerSlot - Copy-on-Write Holder
// ============================================================================

/// Copy-on-write holder of one event type's consumers.
///
/// The array is sorted by descending priority; among equal priorities the
/// most recently inserted consumer comes first.
pub struct ListenerSlot {
    current: ArcSwap<ConsumerArray>,
    empty: Arc<ConsumerArray>,
    write: Mutex<()>,
}

impl ListenerSlot {
    /// Create a slot publishing `empty`.
    ///
    /// `empty` is shared by every slot of a registry and republished whenever
    /// a slot drains.
    pub fn new(empty: Arc<ConsumerArray>) -> Self {
        Self {
            current: ArcSwap::new(Arc::clone(&empty)),
            empty,
            write: Mutex::new(()),
        }
    }

    /// Load the current array.
    #[inline]
    pub fn load(&self) -> Snapshot {
        Snapshot {
            inner: self.current.load(),
        }
    }

    /// Number of consumers currently published.
    #[inline]
    pub fn len(&self) -> usize {
        self.current.load().len()
    }

    /// Check if no consumer is published.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Insert `consumer` at its priority position.
    pub fn insert(&self, consumer: Arc<Consumer>) {
        let _write = self.write.lock();
        let current = self.current.load_full();

        let at = current.partition_point(|c| c.priority() > consumer.priority());
        let mut next = Vec::with_capacity(current.len() + 1);
        next.extend_from_slice(&current[..at]);
        next.push(consumer);
        next.extend_from_slice(&current[at..]);

        self.current.store(Arc::new(next.into_boxed_slice()));
    }

    /// Remove `consumer`, compared by identity.
    ///
    /// Returns `false` when it was not present.
    pub fn remove(&self, consumer: &Arc<Consumer>) -> bool {
        let _write = self.write.lock();
        let current = self.current.load_full();

        let Some(at) = current.iter().rposition(|c| Arc::ptr_eq(c, consumer)) else {
            return false;
        };

        if current.len() == 1 {
            self.current.store(Arc::clone(&self.empty));
            return true;
        }

        let mut next = Vec::with_capacity(current.len() - 1);
        next.extend_from_slice(&current[..at]);
        next.extend_from_slice(&current[at + 1..]);

        self.current.store(Arc::new(next.into_boxed_slice()));
        true
    }

    /// Drop every consumer, republishing the shared empty array.
    pub fn clear(&self) {
        let _write = self.write.lock();
        self.current.store(Arc::clone(&self.empty));
    }
}

impl fmt::Debug for ListenerSlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ListenerSlot")
            .field("len", &self.len())
            .finish()
    }
}

//! Event Type Catalog
//!
//! Maps concrete event types to dense integer ids `[0, N)`. The catalog is
//! built once, before any bus uses it, and is immutable afterwards. Types that
//! were never registered have no id: nothing can ever be delivered for them.
//!
//! # Example
//!
//! ```rust
//! use flarebus_core::EventCatalog;
//!
//! struct Ping;
//! struct Pong;
//!
//! let catalog = EventCatalog::builder().event::<Ping>().event::<Pong>().build();
//!
//! assert_eq!(catalog.len(), 2);
//! assert_eq!(catalog.id_of::<Pong>().map(|id| id.index()), Some(1));
//! assert!(catalog.id_of::<String>().is_none());
//! ```

use rustc_hash::FxHashMap;
use std::any::{Any, TypeId};
use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

/// Source of catalog identities.
static NEXT_CATALOG: AtomicU64 = AtomicU64::new(1);

/// Dense identifier of an event type within one catalog.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EventTypeId(u32);

impl EventTypeId {
    /// Position of this id in the catalog.
    #[inline]
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for EventTypeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// A catalog id resolved ahead of time for event type `E`.
///
/// Posting through a key skips the type-id lookup. A key remembers the
/// catalog that issued it; other catalogs resolve it by type instead.
pub struct EventKey<E> {
    catalog: u64,
    id: EventTypeId,
    _event: PhantomData<fn(&E)>,
}

impl<E> EventKey<E> {
    /// The resolved id.
    #[inline]
    pub fn id(&self) -> EventTypeId {
        self.id
    }
}

impl<E> Clone for EventKey<E> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<E> Copy for EventKey<E> {}

impl<E> fmt::Debug for EventKey<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventKey")
            .field("catalog", &self.catalog)
            .field("id", &self.id)
            .field("event", &std::any::type_name::<E>())
            .finish()
    }
}

/// Immutable mapping from event types to dense ids.
#[derive(Debug)]
pub struct EventCatalog {
    nonce: u64,
    names: Box<[&'static str]>,
    index: FxHashMap<TypeId, EventTypeId>,
}

impl EventCatalog {
    /// Start building a catalog.
    pub fn builder() -> EventCatalogBuilder {
        EventCatalogBuilder::new()
    }

    /// Id of event type `E`, if registered.
    #[inline]
    pub fn id_of<E: Any>(&self) -> Option<EventTypeId> {
        self.id_of_type(TypeId::of::<E>())
    }

    /// Id of the type identified by `type_id`, if registered.
    #[inline]
    pub fn id_of_type(&self, type_id: TypeId) -> Option<EventTypeId> {
        self.index.get(&type_id).copied()
    }

    /// Typed key for event type `E`, if registered.
    pub fn key<E: Any>(&self) -> Option<EventKey<E>> {
        self.id_of::<E>().map(|id| EventKey {
            catalog: self.nonce,
            id,
            _event: PhantomData,
        })
    }

    /// Id of `key` in this catalog.
    ///
    /// Keys issued by this catalog resolve without a lookup. Keys from any
    /// other catalog are resolved through their event type.
    #[inline]
    pub fn resolve<E: Any>(&self, key: EventKey<E>) -> Option<EventTypeId> {
        if key.catalog == self.nonce {
            Some(key.id)
        } else {
            self.id_of::<E>()
        }
    }

    /// Check whether `key` was issued by this catalog.
    #[inline]
    pub fn issued<E>(&self, key: &EventKey<E>) -> bool {
        key.catalog == self.nonce
    }

    /// Type name of the event registered under `id`.
    pub fn name(&self, id: EventTypeId) -> Option<&'static str> {
        self.names.get(id.index()).copied()
    }

    /// Check whether `id` belongs to this catalog.
    #[inline]
    pub fn contains(&self, id: EventTypeId) -> bool {
        id.index() < self.names.len()
    }

    /// Number of registered event types.
    #[inline]
    pub fn len(&self) -> usize {
        self.names.len()
    }

    /// Check if no event types are registered.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    /// Iterate `(id, type name)` pairs in id order.
    pub fn iter(&self) -> impl Iterator<Item = (EventTypeId, &'static str)> + '_ {
        self.names
            .iter()
            .enumerate()
            .map(|(i, name)| (EventTypeId(i as u32), *name))
    }
}

/// Builder for [`EventCatalog`].
#[derive(Debug, Default)]
pub struct EventCatalogBuilder {
    names: Vec<&'static str>,
    index: FxHashMap<TypeId, EventTypeId>,
}

impl EventCatalogBuilder {
    /// Create an empty builder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register event type `E`.
    ///
    /// Ids are assigned in registration order. Registering a type twice keeps
    /// its first id.
    pub fn event<E: Any>(mut self) -> Self {
        self.add::<E>();
        self
    }

    /// Register event type `E` through a mutable reference.
    pub fn add<E: Any>(&mut self) -> EventTypeId {
        let type_id = TypeId::of::<E>();
        if let Some(id) = self.index.get(&type_id) {
            return *id;
        }

        let id = EventTypeId(self.names.len() as u32);
        self.names.push(std::any::type_name::<E>());
        self.index.insert(type_id, id);
        id
    }

    /// Finish the catalog.
    pub fn build(self) -> Arc<EventCatalog> {
        Arc::new(EventCatalog {
            nonce: NEXT_CATALOG.fetch_add(1, Ordering::Relaxed),
            names: self.names.into_boxed_slice(),
            index: self.index,
        })
    }
}

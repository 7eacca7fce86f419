//! Dispatch registry
//!
//! The [`Registry`] holds one [`ListenerSlot`] per catalog entry plus the
//! wrapper table. It is the only surface binders register through:
//! [`Registry::register`], [`Registry::unregister`] and
//! [`Registry::lookup_wrapper`].
//!
//! Slots are allocated once, when the registry is created, and every slot
//! starts out publishing the same empty array.

use crate::catalog::{EventCatalog, EventTypeId};
use crate::consumer::Consumer;
use crate::slot::{ConsumerArray, ListenerSlot, Snapshot};
use crate::wrapper::Wrapper;
use std::fmt;
use std::sync::Arc;
use tracing::trace;

/// Per-event-type consumer storage and wrapper table.
pub struct Registry {
    catalog: Arc<EventCatalog>,
    slots: Box<[ListenerSlot]>,
    wrappers: Box<[Option<Arc<Wrapper>>]>,
    logging: bool,
}

impl Registry {
    /// Create a registry without wrappers.
    ///
    /// `logging` enables `trace!` records for slot mutations.
    pub fn new(catalog: Arc<EventCatalog>, logging: bool) -> Self {
        let wrappers = (0..catalog.len()).map(|_| None).collect();
        Self::with_wrappers(catalog, wrappers, logging)
    }

    /// Create a registry with a wrapper table indexed by event type id.
    pub(crate) fn with_wrappers(
        catalog: Arc<EventCatalog>,
        wrappers: Box<[Option<Arc<Wrapper>>]>,
        logging: bool,
    ) -> Self {
        let empty: Arc<ConsumerArray> = Arc::new(Vec::new().into_boxed_slice());
        let slots = (0..catalog.len())
            .map(|_| ListenerSlot::new(Arc::clone(&empty)))
            .collect();

        Self {
            catalog,
            slots,
            wrappers,
            logging,
        }
    }

    /// The catalog defining this registry's id space.
    #[inline]
    pub fn catalog(&self) -> &Arc<EventCatalog> {
        &self.catalog
    }

    #[inline]
    fn slot(&self, id: EventTypeId) -> Option<&ListenerSlot> {
        self.slots.get(id.index())
    }

    /// Insert `consumer` into the slot of `id`.
    ///
    /// A `None` id, or one outside the catalog, is ignored.
    pub fn register(&self, id: Option<EventTypeId>, consumer: Arc<Consumer>) {
        let Some((id, slot)) = id.and_then(|id| Some((id, self.slot(id)?))) else {
            return;
        };

        if self.logging {
            trace!(
                event = self.catalog.name(id).unwrap_or("?"),
                label = consumer.label(),
                priority = consumer.priority(),
                "Registering consumer"
            );
        }
        slot.insert(consumer);
    }

    /// Remove `consumer` from the slot of `id`.
    ///
    /// Returns whether the consumer was present.
    pub fn unregister(&self, id: Option<EventTypeId>, consumer: &Arc<Consumer>) -> bool {
        let Some((id, slot)) = id.and_then(|id| Some((id, self.slot(id)?))) else {
            return false;
        };

        let removed = slot.remove(consumer);
        if removed && self.logging {
            trace!(
                event = self.catalog.name(id).unwrap_or("?"),
                label = consumer.label(),
                "Unregistered consumer"
            );
        }
        removed
    }

    /// Wrapper registered for `id`, if any.
    #[inline]
    pub fn lookup_wrapper(&self, id: Option<EventTypeId>) -> Option<&Arc<Wrapper>> {
        self.wrappers.get(id?.index())?.as_ref()
    }

    /// Current consumers of `id`.
    ///
    /// `None` for ids outside this registry's catalog.
    #[inline]
    pub fn snapshot(&self, id: EventTypeId) -> Option<Snapshot> {
        self.slot(id).map(ListenerSlot::load)
    }

    /// Number of consumers currently registered for `id`.
    pub fn listener_count(&self, id: EventTypeId) -> usize {
        self.slot(id).map_or(0, ListenerSlot::len)
    }

    /// Total number of consumers over all slots.
    pub fn total_listeners(&self) -> usize {
        self.slots.iter().map(ListenerSlot::len).sum()
    }

    /// Drop every consumer from every slot.
    pub fn clear(&self) {
        for slot in self.slots.iter() {
            slot.clear();
        }
    }
}

impl fmt::Debug for Registry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Registry")
            .field("event_types", &self.catalog.len())
            .field("listeners", &self.total_listeners())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bus::EventBus;
    use crate::consumer::SubscriberId;
    use crate::handler::Handler;
    use crate::wrapper::SingleWrapper;

    struct Ping;
    struct Pong;
    struct Stray;

    struct Chat {
        body: String,
    }

    fn catalog() -> Arc<EventCatalog> {
        EventCatalog::builder()
            .event::<Ping>()
            .event::<Pong>()
            .event::<Chat>()
            .build()
    }

    fn consumer(id: Option<EventTypeId>, priority: i32) -> Arc<Consumer> {
        let owner = Arc::new(());
        Arc::new(Consumer::new(
            SubscriberId::of(&owner),
            id,
            priority,
            Handler::new(|_: &Ping| {}),
            "test",
        ))
    }

    #[test]
    fn test_register_and_unregister() {
        let registry = Registry::new(catalog(), false);
        let ping = registry.catalog().id_of::<Ping>();
        let c = consumer(ping, 0);

        registry.register(ping, Arc::clone(&c));
        assert_eq!(registry.listener_count(ping.unwrap()), 1);

        assert!(registry.unregister(ping, &c));
        assert_eq!(registry.listener_count(ping.unwrap()), 0);
        assert!(!registry.unregister(ping, &c));
    }

    #[test]
    fn test_slots_are_independent() {
        let registry = Registry::new(catalog(), false);
        let ping = registry.catalog().id_of::<Ping>();
        let pong = registry.catalog().id_of::<Pong>();

        registry.register(ping, consumer(ping, 1));
        registry.register(ping, consumer(ping, 2));
        registry.register(pong, consumer(pong, 1));

        assert_eq!(registry.listener_count(ping.unwrap()), 2);
        assert_eq!(registry.listener_count(pong.unwrap()), 1);
        assert_eq!(registry.total_listeners(), 3);

        registry.clear();
        assert_eq!(registry.total_listeners(), 0);
    }

    #[test]
    fn test_unknown_id_is_ignored() {
        let registry = Registry::new(catalog(), false);
        let stray = registry.catalog().id_of::<Stray>();
        assert!(stray.is_none());

        let c = consumer(stray, 0);
        registry.register(stray, Arc::clone(&c));
        assert_eq!(registry.total_listeners(), 0);
        assert!(!registry.unregister(stray, &c));
    }

    #[test]
    fn test_lookup_wrapper() {
        let catalog = catalog();
        let chat = catalog.id_of::<Chat>();
        let mut wrappers: Vec<Option<Arc<Wrapper>>> = vec![None; catalog.len()];
        wrappers[chat.unwrap().index()] = Some(Arc::new(Wrapper::new::<Chat, _>(
            SingleWrapper::new(|c: &Chat| &c.body),
        )));

        let registry = Registry::with_wrappers(catalog, wrappers.into_boxed_slice(), false);
        assert_eq!(registry.lookup_wrapper(chat).map(|w| w.arity()), Some(1));
        assert!(registry.lookup_wrapper(registry.catalog().id_of::<Ping>()).is_none());
        assert!(registry.lookup_wrapper(None).is_none());
    }

    #[test]
    fn test_logging_follows_flag() {
        assert!(!Registry::new(catalog(), false).logging);
        assert!(Registry::new(catalog(), true).logging);

        let quiet = EventBus::builder(catalog()).enable_logging(false).build().unwrap();
        assert!(!quiet.registry().logging);
    }

    #[test]
    fn test_snapshot_for_foreign_id() {
        let registry = Registry::new(catalog(), false);
        let other = EventCatalog::builder()
            .event::<Ping>()
            .event::<Pong>()
            .event::<Chat>()
            .event::<Stray>()
            .build();

        let stray = other.id_of::<Stray>().unwrap();
        assert!(registry.snapshot(stray).is_none());
        assert_eq!(registry.listener_count(stray), 0);
    }
}

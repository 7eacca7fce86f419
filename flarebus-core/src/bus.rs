//! Event Bus implementation

use crate::binder::{Binder, Subscriber};
use crate::catalog::{EventCatalog, EventKey, EventTypeId};
use crate::config::{BusConfig, FailurePolicy};
use crate::consumer::{Consumer, SubscriberId};
use crate::error::{BindError, BuildError, DispatchError, HandlerError};
use crate::registry::Registry;
use crate::wrapper::{EventWrapper, FnWrapper, MAX_WRAPPER_ARITY, SingleWrapper, Wrapper};
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use std::any::{Any, TypeId};
use std::fmt;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// Event bus for in-process event publishing and handling
///
/// Cloning is cheap; clones share registrations.
#[derive(Clone)]
pub struct EventBus {
    /// Consumers and wrappers for each event type
    registry: Arc<Registry>,

    /// Consumers produced by each subscriber, for unsubscribing
    subscribers: Arc<DashMap<SubscriberId, Subscription>>,

    /// Configuration
    config: Arc<BusConfig>,
}

/// Record of one subscribed object.
struct Subscription {
    consumers: Box<[Arc<Consumer>]>,
    /// Keeps the subscriber's allocation, and so its id, alive
    _anchor: Box<dyn Send + Sync>,
}

impl EventBus {
    /// Create an event bus without wrappers
    pub fn new(catalog: Arc<EventCatalog>) -> Self {
        Self::with_config(catalog, BusConfig::default())
    }

    /// Create an event bus without wrappers, using `config`
    pub fn with_config(catalog: Arc<EventCatalog>, config: BusConfig) -> Self {
        let registry = Registry::new(catalog, config.enable_logging);
        Self::from_parts(registry, config)
    }

    /// Start building an event bus over `catalog`
    pub fn builder(catalog: Arc<EventCatalog>) -> BusBuilder {
        BusBuilder::new(catalog)
    }

    fn from_parts(registry: Registry, config: BusConfig) -> Self {
        Self {
            registry: Arc::new(registry),
            subscribers: Arc::new(DashMap::new()),
            config: Arc::new(config),
        }
    }

    /// Publish an event
    ///
    /// Every consumer registered for the exact type `E` runs, highest
    /// priority first. Events of types outside the catalog are dropped.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use flarebus_core::{EventBus, EventCatalog};
    ///
    /// struct Ping;
    ///
    /// let bus = EventBus::new(EventCatalog::builder().event::<Ping>().build());
    /// bus.post(&Ping).unwrap();
    /// ```
    #[inline]
    pub fn post<E: Any>(&self, event: &E) -> Result<(), DispatchError> {
        match self.registry.catalog().id_of::<E>() {
            Some(id) => self.dispatch(id, event),
            None => Ok(()),
        }
    }

    /// Publish an event whose type is only known at runtime
    #[inline]
    pub fn post_dyn(&self, event: &dyn Any) -> Result<(), DispatchError> {
        match self.registry.catalog().id_of_type(Any::type_id(event)) {
            Some(id) => self.dispatch(id, event),
            None => Ok(()),
        }
    }

    /// Publish an event through a key resolved with [`EventCatalog::key`]
    ///
    /// A key from another catalog is resolved by type, like [`post`](Self::post).
    #[inline]
    pub fn post_keyed<E: Any>(&self, key: EventKey<E>, event: &E) -> Result<(), DispatchError> {
        match self.registry.catalog().resolve(key) {
            Some(id) => self.dispatch(id, event),
            None => Ok(()),
        }
    }

    fn dispatch(&self, id: EventTypeId, event: &dyn Any) -> Result<(), DispatchError> {
        let Some(snapshot) = self.registry.snapshot(id) else {
            return Ok(());
        };

        match self.config.failure_policy {
            FailurePolicy::Abort => {
                for consumer in snapshot.iter() {
                    if let Err(source) = consumer.accept(event) {
                        return Err(self.failure(id, consumer, source));
                    }
                }
                Ok(())
            }
            FailurePolicy::Isolate => {
                let mut errors = Vec::new();
                for consumer in snapshot.iter() {
                    if let Err(source) = consumer.accept(event) {
                        errors.push(self.failure(id, consumer, source));
                    }
                }

                if errors.is_empty() {
                    Ok(())
                } else {
                    Err(DispatchError::HandlersFailed(errors))
                }
            }
        }
    }

    fn failure(&self, id: EventTypeId, consumer: &Consumer, source: HandlerError) -> DispatchError {
        let event = self.registry.catalog().name(id).unwrap_or("?");

        if self.config.enable_logging {
            error!(
                bus = %self.config.name,
                event,
                label = consumer.label(),
                priority = consumer.priority(),
                "Handler failed: {}",
                source
            );
        }

        DispatchError::HandlerFailed {
            event,
            label: consumer.label(),
            priority: consumer.priority(),
            source,
        }
    }

    /// Subscribe every handler of `subscriber`
    ///
    /// Returns `Ok(false)` when the subscriber is already subscribed. A
    /// binding error leaves nothing registered.
    pub fn subscribe<T: Subscriber>(&self, subscriber: &Arc<T>) -> Result<bool, BindError> {
        self.subscribe_fn(subscriber, |subscriber, binder| subscriber.bind(binder))
    }

    /// Subscribe `subscriber` with handlers described by `bind`
    ///
    /// # Examples
    ///
    /// ```rust
    /// use flarebus_core::{EventBus, EventCatalog};
    /// use std::sync::Arc;
    /// use std::sync::atomic::{AtomicU32, Ordering};
    ///
    /// struct Tick;
    ///
    /// let bus = EventBus::new(EventCatalog::builder().event::<Tick>().build());
    /// let ticks = Arc::new(AtomicU32::new(0));
    ///
    /// bus.subscribe_fn(&ticks, |ticks, binder| {
    ///     let ticks = Arc::clone(ticks);
    ///     binder.listen(0, move |_: &Tick| {
    ///         ticks.fetch_add(1, Ordering::Relaxed);
    ///     })?;
    ///     Ok(())
    /// })
    /// .unwrap();
    ///
    /// bus.post(&Tick).unwrap();
    /// assert_eq!(ticks.load(Ordering::Relaxed), 1);
    /// ```
    pub fn subscribe_fn<T, F>(&self, subscriber: &Arc<T>, bind: F) -> Result<bool, BindError>
    where
        T: ?Sized + Send + Sync + 'static,
        F: FnOnce(&Arc<T>, &mut Binder<'_>) -> Result<(), BindError>,
    {
        let id = SubscriberId::of(subscriber);
        if self.subscribers.contains_key(&id) {
            return Ok(false);
        }

        let mut binder = Binder::new(&self.registry, id);
        if let Err(err) = bind(subscriber, &mut binder) {
            if self.config.enable_logging {
                warn!(bus = %self.config.name, subscriber = %id, "Subscription rejected: {}", err);
            }
            return Err(err);
        }

        Ok(self.install(
            id,
            Subscription {
                consumers: binder.into_consumers(),
                _anchor: Box::new(Arc::clone(subscriber)),
            },
        ))
    }

    fn install(&self, id: SubscriberId, subscription: Subscription) -> bool {
        match self.subscribers.entry(id) {
            Entry::Occupied(_) => false,
            Entry::Vacant(entry) => {
                for consumer in subscription.consumers.iter() {
                    self.registry.register(consumer.event(), Arc::clone(consumer));
                }

                if self.config.enable_logging {
                    debug!(
                        bus = %self.config.name,
                        subscriber = %id,
                        consumers = subscription.consumers.len(),
                        "Subscribed"
                    );
                }

                entry.insert(subscription);
                true
            }
        }
    }

    /// Unsubscribe every handler of `subscriber`
    ///
    /// Returns `false` when the subscriber was not subscribed.
    pub fn unsubscribe<T: ?Sized>(&self, subscriber: &Arc<T>) -> bool {
        let id = SubscriberId::of(subscriber);
        let Some((_, subscription)) = self.subscribers.remove(&id) else {
            return false;
        };

        for consumer in subscription.consumers.iter() {
            self.registry.unregister(consumer.event(), consumer);
        }

        if self.config.enable_logging {
            debug!(
                bus = %self.config.name,
                subscriber = %id,
                consumers = subscription.consumers.len(),
                "Unsubscribed"
            );
        }
        true
    }

    /// Check whether `subscriber` is currently subscribed
    #[inline]
    pub fn is_subscribed<T: ?Sized>(&self, subscriber: &Arc<T>) -> bool {
        self.subscribers.contains_key(&SubscriberId::of(subscriber))
    }

    /// Number of subscribed objects
    pub fn subscriber_count(&self) -> usize {
        self.subscribers.len()
    }

    /// Number of consumers registered for event type `E`
    pub fn listener_count<E: Any>(&self) -> usize {
        self.registry
            .catalog()
            .id_of::<E>()
            .map_or(0, |id| self.registry.listener_count(id))
    }

    /// Drop every subscription
    ///
    /// Subscriptions racing with `clear` may survive it.
    pub fn clear(&self) {
        self.subscribers.clear();
        self.registry.clear();

        if self.config.enable_logging {
            info!(bus = %self.config.name, "Cleared all subscriptions");
        }
    }

    /// The catalog this bus dispatches over
    pub fn catalog(&self) -> &Arc<EventCatalog> {
        self.registry.catalog()
    }

    /// The underlying registry
    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Bus configuration
    pub fn config(&self) -> &BusConfig {
        &self.config
    }
}

impl fmt::Debug for EventBus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventBus")
            .field("name", &self.config.name)
            .field("subscribers", &self.subscribers.len())
            .field("registry", &self.registry)
            .finish()
    }
}

/// Event bus builder
pub struct BusBuilder {
    catalog: Arc<EventCatalog>,
    wrappers: Vec<(TypeId, Wrapper)>,
    config: BusConfig,
}

impl BusBuilder {
    /// Create new event bus builder
    pub fn new(catalog: Arc<EventCatalog>) -> Self {
        Self {
            catalog,
            wrappers: Vec::new(),
            config: BusConfig::default(),
        }
    }

    /// Register the wrapper of event type `E`
    ///
    /// A later wrapper for the same type replaces an earlier one.
    pub fn wrap<E, W>(mut self, wrapper: W) -> Self
    where
        E: Any,
        W: EventWrapper<E>,
    {
        self.wrappers
            .push((TypeId::of::<E>(), Wrapper::new::<E, W>(wrapper)));
        self
    }

    /// Register a single-value wrapper for event type `E`
    pub fn wrap_single<E, V, F>(self, unwrap: F) -> Self
    where
        E: Any,
        V: Any,
        F: Fn(&E) -> &V + Send + Sync + 'static,
    {
        self.wrap::<E, _>(SingleWrapper::new(unwrap))
    }

    /// Register a closure wrapper producing `arity` values for event type `E`
    pub fn wrap_fn<E, F>(self, arity: usize, wrap: F) -> Self
    where
        E: Any,
        F: for<'e> Fn(&'e E, &mut [Option<&'e dyn Any>]) + Send + Sync + 'static,
    {
        self.wrap::<E, _>(FnWrapper::new(arity, wrap))
    }

    /// Replace the whole configuration
    pub fn config(mut self, config: BusConfig) -> Self {
        self.config = config;
        self
    }

    /// Set the handler failure policy
    pub fn failure_policy(mut self, policy: FailurePolicy) -> Self {
        self.config.failure_policy = policy;
        self
    }

    /// Enable/disable logging
    pub fn enable_logging(mut self, enabled: bool) -> Self {
        self.config.enable_logging = enabled;
        self
    }

    /// Set the bus name used in log records
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.config.name = name.into();
        self
    }

    /// Build the event bus
    pub fn build(self) -> Result<EventBus, BuildError> {
        let mut table: Vec<Option<Arc<Wrapper>>> = vec![None; self.catalog.len()];

        for (type_id, wrapper) in self.wrappers {
            let Some(id) = self.catalog.id_of_type(type_id) else {
                return Err(BuildError::UnknownEventType(wrapper.event_name()));
            };

            if wrapper.arity() > MAX_WRAPPER_ARITY {
                return Err(BuildError::ArityTooLarge {
                    event: wrapper.event_name(),
                    arity: wrapper.arity(),
                    max: MAX_WRAPPER_ARITY,
                });
            }

            table[id.index()] = Some(Arc::new(wrapper));
        }

        if self.config.enable_logging {
            info!(
                bus = %self.config.name,
                event_types = self.catalog.len(),
                wrappers = table.iter().flatten().count(),
                policy = ?self.config.failure_policy,
                "Event bus built"
            );
        }

        let registry = Registry::with_wrappers(
            self.catalog,
            table.into_boxed_slice(),
            self.config.enable_logging,
        );
        Ok(EventBus::from_parts(registry, self.config))
    }
}

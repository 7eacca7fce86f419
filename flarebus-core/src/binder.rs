//! Subscriber binding
//!
//! A [`Subscriber`] describes its handlers to a [`Binder`], which turns each
//! of them into a [`Consumer`]. The binder validates handlers against the
//! wrapper table as they are added; nothing reaches the registry until the
//! whole subscriber has bound successfully.
//!
//! Implement [`Subscriber`] by hand, or derive it with `#[subscriber]` from
//! the macro crate.
//!
//! ```rust
//! use flarebus_core::{BindError, Binder, EventBus, EventCatalog, Subscriber};
//! use std::sync::Arc;
//! use std::sync::atomic::{AtomicU32, Ordering};
//!
//! struct Tick;
//!
//! #[derive(Default)]
//! struct Counter {
//!     ticks: AtomicU32,
//! }
//!
//! impl Subscriber for Counter {
//!     fn bind(self: &Arc<Self>, binder: &mut Binder<'_>) -> Result<(), BindError> {
//!         let this = Arc::clone(self);
//!         binder.with_label("on_tick").listen(0, move |_: &Tick| {
//!             this.ticks.fetch_add(1, Ordering::Relaxed);
//!         })?;
//!         Ok(())
//!     }
//! }
//!
//! let bus = EventBus::new(EventCatalog::builder().event::<Tick>().build());
//! let counter = Arc::new(Counter::default());
//!
//! assert_eq!(bus.subscribe(&counter), Ok(true));
//! bus.post(&Tick).unwrap();
//! assert_eq!(counter.ticks.load(Ordering::Relaxed), 1);
//! ```

use crate::consumer::{Consumer, SubscriberId};
use crate::error::BindError;
use crate::handler::{Handler, IntoHandlerResult, WrappedListener};
use crate::registry::Registry;
use std::any::{Any, TypeId};
use std::sync::Arc;

/// An object exposing event handlers.
pub trait Subscriber: Send + Sync + 'static {
    /// Describe every handler of this subscriber to `binder`.
    ///
    /// Handlers capture a clone of `self`, which keeps the subscriber alive
    /// for as long as it stays subscribed.
    fn bind(self: &Arc<Self>, binder: &mut Binder<'_>) -> Result<(), BindError>;
}

/// Collects the consumers of one subscriber.
pub struct Binder<'r> {
    registry: &'r Registry,
    owner: SubscriberId,
    label: Option<&'static str>,
    consumers: Vec<Arc<Consumer>>,
}

impl<'r> Binder<'r> {
    pub(crate) fn new(registry: &'r Registry, owner: SubscriberId) -> Self {
        Self {
            registry,
            owner,
            label: None,
            consumers: Vec::new(),
        }
    }

    /// Identity of the subscriber being bound.
    #[inline]
    pub fn owner(&self) -> SubscriberId {
        self.owner
    }

    /// Name the next binding in diagnostics.
    ///
    /// Without a label, bindings are named after their closure type.
    pub fn with_label(&mut self, label: &'static str) -> &mut Self {
        self.label = Some(label);
        self
    }

    /// Bind a handler taking only the event.
    pub fn listen<E, R, F>(&mut self, priority: i32, f: F) -> Result<&mut Self, BindError>
    where
        E: Any,
        R: IntoHandlerResult,
        F: Fn(&E) -> R + Send + Sync + 'static,
    {
        let label = self.take_label::<F>();
        self.push::<E>(priority, Handler::new(f), label)
    }

    /// Bind a handler taking the event plus values from the event's wrapper.
    ///
    /// `Args` is the tuple of extra argument types, e.g.
    /// `listen_wrapped::<Chat, (String,), _>(0, |c: &Chat, body: Option<&String>| ..)`.
    pub fn listen_wrapped<E, Args, F>(
        &mut self,
        priority: i32,
        f: F,
    ) -> Result<&mut Self, BindError>
    where
        E: Any,
        Args: 'static,
        F: WrappedListener<E, Args>,
    {
        let label = self.take_label::<F>();
        let id = self.registry.catalog().id_of::<E>();

        let wrapper = match self.registry.lookup_wrapper(id) {
            Some(wrapper) if wrapper.arity() == F::ARITY => Arc::clone(wrapper),
            other => {
                return Err(BindError::WrapperArityMismatch {
                    event: std::any::type_name::<E>(),
                    label,
                    expected: other.map_or(0, |w| w.arity()),
                    found: F::ARITY,
                });
            }
        };

        self.push::<E>(priority, Handler::wrapped(f, wrapper), label)
    }

    /// Bind a prebuilt handler for events of type `E`.
    ///
    /// The handler must have been built for `E`. A wrapped handler must
    /// decompose with the wrapper this bus registered for `E`.
    pub fn add<E: Any>(&mut self, priority: i32, handler: Handler) -> Result<&mut Self, BindError> {
        let label = self.take_label::<Handler>();
        self.push::<E>(priority, handler, label)
    }

    /// Number of bindings collected so far.
    pub fn len(&self) -> usize {
        self.consumers.len()
    }

    /// Check if nothing has been bound yet.
    pub fn is_empty(&self) -> bool {
        self.consumers.is_empty()
    }

    pub(crate) fn into_consumers(self) -> Box<[Arc<Consumer>]> {
        self.consumers.into_boxed_slice()
    }

    fn take_label<F>(&mut self) -> &'static str {
        self.label.take().unwrap_or_else(std::any::type_name::<F>)
    }

    fn push<E: Any>(
        &mut self,
        priority: i32,
        handler: Handler,
        label: &'static str,
    ) -> Result<&mut Self, BindError> {
        let event = std::any::type_name::<E>();
        if handler.event_type() != TypeId::of::<E>() {
            return Err(BindError::EventTypeMismatch {
                expected: event,
                label,
                found: handler.event_name(),
            });
        }

        let id = self.registry.catalog().id_of::<E>();
        let registered = self.registry.lookup_wrapper(id);
        let expected = registered.map_or(0, |w| w.arity());

        if handler.extra_args() != 0 && handler.extra_args() != expected {
            return Err(BindError::WrapperArityMismatch {
                event,
                label,
                expected,
                found: handler.extra_args(),
            });
        }

        if let Some(own) = handler.wrapper()
            && !registered.is_some_and(|registered| Arc::ptr_eq(own, registered))
        {
            return Err(BindError::ForeignWrapper { event, label });
        }

        self.consumers.push(Arc::new(Consumer::new(
            self.owner, id, priority, handler, label,
        )));
        Ok(self)
    }
}

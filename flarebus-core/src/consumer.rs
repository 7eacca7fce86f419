//! Consumers
//!
//! A [`Consumer`] is one bound unit of work: a handler tagged with its
//! owner, event type and priority. Consumers are immutable once built and
//! shared between a listener slot and the bus's subscriber record.

use crate::catalog::EventTypeId;
use crate::error::HandlerResult;
use crate::handler::Handler;
use std::any::Any;
use std::fmt;
use std::sync::Arc;

/// Identity of a subscribed object.
///
/// Derived from the address of the subscriber's `Arc` allocation. It is only
/// compared, never dereferenced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriberId(usize);

impl SubscriberId {
    /// Identity of the object behind `subscriber`.
    #[inline]
    pub fn of<T: ?Sized>(subscriber: &Arc<T>) -> Self {
        Self(Arc::as_ptr(subscriber).cast::<()>() as usize)
    }

    /// Raw identity value.
    #[inline]
    pub fn as_usize(self) -> usize {
        self.0
    }
}

impl fmt::Display for SubscriberId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#x}", self.0)
    }
}

/// A bound, priority-tagged handler registration.
#[derive(Debug)]
pub struct Consumer {
    owner: SubscriberId,
    event: Option<EventTypeId>,
    priority: i32,
    handler: Handler,
    label: &'static str,
}

impl Consumer {
    /// Create a consumer.
    ///
    /// `event` is `None` for event types outside the catalog; such consumers
    /// are never registered in any slot.
    pub fn new(
        owner: SubscriberId,
        event: Option<EventTypeId>,
        priority: i32,
        handler: Handler,
        label: &'static str,
    ) -> Self {
        Self {
            owner,
            event,
            priority,
            handler,
            label,
        }
    }

    /// Identity of the subscriber this consumer was bound from.
    #[inline]
    pub fn owner(&self) -> SubscriberId {
        self.owner
    }

    /// Event type this consumer listens to.
    #[inline]
    pub fn event(&self) -> Option<EventTypeId> {
        self.event
    }

    /// Delivery priority; higher runs first.
    #[inline]
    pub fn priority(&self) -> i32 {
        self.priority
    }

    /// Number of wrapper-supplied arguments.
    #[inline]
    pub fn extra_args(&self) -> usize {
        self.handler.extra_args()
    }

    /// Diagnostic name of the bound handler.
    #[inline]
    pub fn label(&self) -> &'static str {
        self.label
    }

    /// Deliver an event to the handler.
    #[inline]
    pub fn accept(&self, event: &dyn Any) -> HandlerResult {
        self.handler.call(event)
    }
}

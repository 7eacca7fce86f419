//! Event wrappers
//!
//! A wrapper decomposes an event into a fixed number of extra values for
//! handlers that take more than the event itself. Wrappers are registered per
//! event type while building the bus and never change afterwards.
//!
//! Values are borrowed from the event and written into a caller-provided
//! buffer, so decomposition never allocates. `None` marks an absent value.
//!
//! # Example
//!
//! ```rust
//! use flarebus_core::{EventWrapper, FnWrapper, SingleWrapper};
//!
//! struct Chat {
//!     author: String,
//!     body: String,
//! }
//!
//! // One value per event
//! let single = SingleWrapper::new(|chat: &Chat| &chat.body);
//! assert_eq!(EventWrapper::<Chat>::arity(&single), 1);
//!
//! // Several values per event
//! let pair = FnWrapper::<Chat, _>::new(2, |chat, out| {
//!     out[0] = Some(&chat.author);
//!     out[1] = Some(&chat.body);
//! });
//! assert_eq!(pair.arity(), 2);
//! ```

use std::any::Any;
use std::fmt;
use std::marker::PhantomData;

/// Largest arity a wrapper may declare.
pub const MAX_WRAPPER_ARITY: usize = 8;

/// Stack buffer a wrapper decomposes into.
pub type WrapBuffer<'e> = [Option<&'e dyn Any>; MAX_WRAPPER_ARITY];

/// Decomposes events of type `E` into extra handler arguments.
pub trait EventWrapper<E>: Send + Sync + 'static {
    /// Number of values produced per event.
    fn arity(&self) -> usize;

    /// Write the values extracted from `event` into `out[..arity]`.
    fn wrap_into<'e>(&self, event: &'e E, out: &mut [Option<&'e dyn Any>]);
}

/// Wrapper producing a single value borrowed from the event.
pub struct SingleWrapper<E, V, F> {
    unwrap: F,
    _types: PhantomData<fn(&E) -> V>,
}

impl<E, V, F> SingleWrapper<E, V, F>
where
    F: Fn(&E) -> &V,
{
    /// Create a wrapper from an accessor.
    pub fn new(unwrap: F) -> Self {
        Self {
            unwrap,
            _types: PhantomData,
        }
    }
}

impl<E, V, F> EventWrapper<E> for SingleWrapper<E, V, F>
where
    E: 'static,
    V: Any,
    F: Fn(&E) -> &V + Send + Sync + 'static,
{
    fn arity(&self) -> usize {
        1
    }

    fn wrap_into<'e>(&self, event: &'e E, out: &mut [Option<&'e dyn Any>]) {
        let value: &'e dyn Any = (self.unwrap)(event);
        out[0] = Some(value);
    }
}

/// Wrapper built from a closure filling the output buffer directly.
pub struct FnWrapper<E, F> {
    arity: usize,
    wrap: F,
    _event: PhantomData<fn(&E)>,
}

impl<E, F> FnWrapper<E, F>
where
    F: for<'e> Fn(&'e E, &mut [Option<&'e dyn Any>]),
{
    /// Create a wrapper declaring `arity` values.
    pub fn new(arity: usize, wrap: F) -> Self {
        Self {
            arity,
            wrap,
            _event: PhantomData,
        }
    }
}

impl<E, F> EventWrapper<E> for FnWrapper<E, F>
where
    E: 'static,
    F: for<'e> Fn(&'e E, &mut [Option<&'e dyn Any>]) + Send + Sync + 'static,
{
    fn arity(&self) -> usize {
        self.arity
    }

    fn wrap_into<'e>(&self, event: &'e E, out: &mut [Option<&'e dyn Any>]) {
        (self.wrap)(event, out)
    }
}

trait ErasedWrapper: Send + Sync {
    fn decompose<'e>(&self, event: &'e dyn Any, out: &mut [Option<&'e dyn Any>]) -> bool;
}

struct Erased<E, W> {
    wrapper: W,
    _event: PhantomData<fn(&E)>,
}

impl<E, W> ErasedWrapper for Erased<E, W>
where
    E: Any,
    W: EventWrapper<E>,
{
    fn decompose<'e>(&self, event: &'e dyn Any, out: &mut [Option<&'e dyn Any>]) -> bool {
        match event.downcast_ref::<E>() {
            Some(event) => {
                self.wrapper.wrap_into(event, out);
                true
            }
            None => false,
        }
    }
}

/// Type-erased wrapper stored in the bus's wrapper table.
pub struct Wrapper {
    event: &'static str,
    arity: usize,
    inner: Box<dyn ErasedWrapper>,
}

impl Wrapper {
    /// Erase a typed wrapper for event type `E`.
    pub fn new<E, W>(wrapper: W) -> Self
    where
        E: Any,
        W: EventWrapper<E>,
    {
        Self {
            event: std::any::type_name::<E>(),
            arity: wrapper.arity(),
            inner: Box::new(Erased {
                wrapper,
                _event: PhantomData,
            }),
        }
    }

    /// Number of values produced per event.
    #[inline]
    pub fn arity(&self) -> usize {
        self.arity
    }

    /// Type name of the wrapped event.
    pub fn event_name(&self) -> &'static str {
        self.event
    }

    /// Decompose `event` into `out`.
    ///
    /// Returns `false`, leaving `out` untouched, when `event` is not of the
    /// wrapped type.
    #[inline]
    pub fn decompose<'e>(&self, event: &'e dyn Any, out: &mut [Option<&'e dyn Any>]) -> bool {
        self.inner.decompose(event, out)
    }
}

impl fmt::Debug for Wrapper {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Wrapper")
            .field("event", &self.event)
            .field("arity", &self.arity)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Chat {
        author: String,
        body: String,
    }

    fn chat() -> Chat {
        Chat {
            author: "ada".to_string(),
            body: "hello".to_string(),
        }
    }

    #[test]
    fn test_single_wrapper() {
        let wrapper = Wrapper::new::<Chat, _>(SingleWrapper::new(|c: &Chat| &c.body));
        assert_eq!(wrapper.arity(), 1);

        let event = chat();
        let mut out: WrapBuffer<'_> = [None; MAX_WRAPPER_ARITY];
        assert!(wrapper.decompose(&event, &mut out));

        let body = out[0].and_then(|v| v.downcast_ref::<String>());
        assert_eq!(body.map(String::as_str), Some("hello"));
        assert!(out[1].is_none());
    }

    #[test]
    fn test_fn_wrapper_multiple_values() {
        let wrapper = Wrapper::new::<Chat, _>(FnWrapper::<Chat, _>::new(2, |c, out| {
            out[0] = Some(&c.author);
            out[1] = Some(&c.body);
        }));

        let event = chat();
        let mut out: WrapBuffer<'_> = [None; MAX_WRAPPER_ARITY];
        assert!(wrapper.decompose(&event, &mut out));
        assert_eq!(
            out[0].and_then(|v| v.downcast_ref::<String>()).map(String::as_str),
            Some("ada")
        );
        assert_eq!(
            out[1].and_then(|v| v.downcast_ref::<String>()).map(String::as_str),
            Some("hello")
        );
    }

    #[test]
    fn test_decompose_rejects_other_types() {
        let wrapper = Wrapper::new::<Chat, _>(SingleWrapper::new(|c: &Chat| &c.body));
        let mut out: WrapBuffer<'_> = [None; MAX_WRAPPER_ARITY];
        assert!(!wrapper.decompose(&42u32, &mut out));
        assert!(out.iter().all(Option::is_none));
    }

    #[test]
    fn test_debug_names_event() {
        let wrapper = Wrapper::new::<Chat, _>(SingleWrapper::new(|c: &Chat| &c.body));
        assert!(format!("{wrapper:?}").contains("Chat"));
        assert!(wrapper.event_name().ends_with("Chat"));
    }
}

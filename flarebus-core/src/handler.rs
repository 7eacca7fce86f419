//! Handler thunks
//!
//! A [`Handler`] is the type-erased invocation closure stored in a consumer.
//! It receives the posted event as `&dyn Any` and downcasts it to the event
//! type it was built for.
//!
//! Hooks compose around a handler instead of overriding it:
//!
//! ```rust
//! use flarebus_core::{Handler, HandlerError};
//!
//! struct Damage {
//!     amount: u32,
//!     cancelled: bool,
//! }
//!
//! let handler = Handler::new(|d: &Damage| {
//!     if d.amount > 100 {
//!         return Err(HandlerError::failed("overkill"));
//!     }
//!     Ok(())
//! })
//! .guard(|d: &Damage| !d.cancelled)
//! .on_error(|_err| Ok(()));
//!
//! assert!(handler.call(&Damage { amount: 500, cancelled: false }).is_ok());
//! ```

use crate::error::{HandlerError, HandlerResult};
use crate::wrapper::{MAX_WRAPPER_ARITY, WrapBuffer, Wrapper};
use std::any::{Any, TypeId};
use std::fmt;
use std::sync::Arc;

/// Conversion of handler return values into a [`HandlerResult`].
pub trait IntoHandlerResult {
    fn into_handler_result(self) -> HandlerResult;
}

impl IntoHandlerResult for () {
    #[inline]
    fn into_handler_result(self) -> HandlerResult {
        Ok(())
    }
}

impl<E: Into<HandlerError>> IntoHandlerResult for Result<(), E> {
    #[inline]
    fn into_handler_result(self) -> HandlerResult {
        self.map_err(Into::into)
    }
}

/// Handler taking wrapper-supplied values after the event.
///
/// Implemented for closures `Fn(&E, Option<&A>, ..)` with one to four extra
/// arguments; `Args` is the tuple of declared argument types.
pub trait WrappedListener<E, Args>: Send + Sync + 'static {
    /// Number of extra arguments.
    const ARITY: usize;

    /// Invoke with decomposed values.
    ///
    /// Returns `None` when a present value does not have its declared type;
    /// the handler is not run in that case.
    fn invoke(&self, event: &E, values: &[Option<&dyn Any>]) -> Option<HandlerResult>;
}

#[inline]
fn extract<'v, A: Any>(values: &[Option<&'v dyn Any>], index: usize) -> Option<Option<&'v A>> {
    match values.get(index).copied().flatten() {
        None => Some(None),
        Some(value) => value.downcast_ref::<A>().map(Some),
    }
}

macro_rules! impl_wrapped_listener {
    ($arity:expr; $($arg:ident => $index:tt),+) => {
        impl<E, R, F, $($arg),+> WrappedListener<E, ($($arg,)+)> for F
        where
            E: Any,
            R: IntoHandlerResult,
            $($arg: Any,)+
            F: Fn(&E, $(Option<&$arg>),+) -> R + Send + Sync + 'static,
        {
            const ARITY: usize = $arity;

            #[inline]
            fn invoke(&self, event: &E, values: &[Option<&dyn Any>]) -> Option<HandlerResult> {
                Some((self)(event, $(extract::<$arg>(values, $index)?),+).into_handler_result())
            }
        }
    };
}

impl_wrapped_listener!(1; A1 => 0);
impl_wrapped_listener!(2; A1 => 0, A2 => 1);
impl_wrapped_listener!(3; A1 => 0, A2 => 1, A3 => 2);
impl_wrapped_listener!(4; A1 => 0, A2 => 1, A3 => 2, A4 => 3);

type Thunk = dyn Fn(&dyn Any) -> HandlerResult + Send + Sync;

/// Type-erased, cheaply clonable invocation closure.
///
/// A handler remembers the event type it was built for and, when wrapped,
/// the wrapper it decomposes with. Binders check both against the bus.
#[derive(Clone)]
pub struct Handler {
    thunk: Arc<Thunk>,
    event: TypeId,
    event_name: &'static str,
    extra_args: usize,
    wrapper: Option<Arc<Wrapper>>,
}

impl Handler {
    /// Handler for events of type `E`.
    pub fn new<E, R, F>(f: F) -> Self
    where
        E: Any,
        R: IntoHandlerResult,
        F: Fn(&E) -> R + Send + Sync + 'static,
    {
        Self {
            thunk: Arc::new(move |event: &dyn Any| match event.downcast_ref::<E>() {
                Some(event) => f(event).into_handler_result(),
                None => Ok(()),
            }),
            event: TypeId::of::<E>(),
            event_name: std::any::type_name::<E>(),
            extra_args: 0,
            wrapper: None,
        }
    }

    /// Handler receiving values decomposed by `wrapper` after the event.
    ///
    /// The decompose buffer lives on the stack of each invocation.
    ///
    /// Bind it with the wrapper the bus registered for `E`, which
    /// [`Registry::lookup_wrapper`](crate::Registry::lookup_wrapper) returns.
    pub fn wrapped<E, Args, F>(f: F, wrapper: Arc<Wrapper>) -> Self
    where
        E: Any,
        Args: 'static,
        F: WrappedListener<E, Args>,
    {
        let decomposer = Arc::clone(&wrapper);
        Self {
            thunk: Arc::new(move |event: &dyn Any| {
                let Some(typed) = event.downcast_ref::<E>() else {
                    return Ok(());
                };

                let mut buffer: WrapBuffer<'_> = [None; MAX_WRAPPER_ARITY];
                if !decomposer.decompose(event, &mut buffer) {
                    return Ok(());
                }

                f.invoke(typed, &buffer).unwrap_or(Ok(()))
            }),
            event: TypeId::of::<E>(),
            event_name: std::any::type_name::<E>(),
            extra_args: F::ARITY,
            wrapper: Some(wrapper),
        }
    }

    /// Run only when `predicate` accepts the event.
    pub fn guard<E, P>(self, predicate: P) -> Self
    where
        E: Any,
        P: Fn(&E) -> bool + Send + Sync + 'static,
    {
        let inner = Arc::clone(&self.thunk);
        self.with_thunk(Arc::new(move |event: &dyn Any| {
            if let Some(typed) = event.downcast_ref::<E>()
                && !predicate(typed)
            {
                return Ok(());
            }
            inner(event)
        }))
    }

    /// Run `after` once the handler completed successfully.
    pub fn then<E, A>(self, after: A) -> Self
    where
        E: Any,
        A: Fn(&E) + Send + Sync + 'static,
    {
        let inner = Arc::clone(&self.thunk);
        self.with_thunk(Arc::new(move |event: &dyn Any| {
            inner(event)?;
            if let Some(typed) = event.downcast_ref::<E>() {
                after(typed);
            }
            Ok(())
        }))
    }

    /// Intercept failures; `recover` may swallow or replace the error.
    pub fn on_error<F>(self, recover: F) -> Self
    where
        F: Fn(HandlerError) -> HandlerResult + Send + Sync + 'static,
    {
        let inner = Arc::clone(&self.thunk);
        self.with_thunk(Arc::new(move |event: &dyn Any| {
            inner(event).or_else(&recover)
        }))
    }

    /// Rewrite the error of a failed invocation.
    pub fn map_err<F>(self, map: F) -> Self
    where
        F: Fn(HandlerError) -> HandlerError + Send + Sync + 'static,
    {
        self.on_error(move |err| Err(map(err)))
    }

    fn with_thunk(self, thunk: Arc<Thunk>) -> Self {
        Self { thunk, ..self }
    }

    /// Type id of the event this handler was built for.
    #[inline]
    pub fn event_type(&self) -> TypeId {
        self.event
    }

    /// Type name of the event this handler was built for.
    #[inline]
    pub fn event_name(&self) -> &'static str {
        self.event_name
    }

    /// Wrapper a wrapped handler decomposes with.
    #[inline]
    pub fn wrapper(&self) -> Option<&Arc<Wrapper>> {
        self.wrapper.as_ref()
    }

    /// Number of wrapper-supplied arguments this handler expects.
    #[inline]
    pub fn extra_args(&self) -> usize {
        self.extra_args
    }

    /// Invoke the handler.
    #[inline]
    pub fn call(&self, event: &dyn Any) -> HandlerResult {
        (self.thunk)(event)
    }
}

impl fmt::Debug for Handler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Handler")
            .field("event", &self.event_name)
            .field("extra_args", &self.extra_args)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::wrapper::SingleWrapper;
    use std::sync::atomic::{AtomicU32, Ordering};

    struct Ping {
        value: u32,
    }

    struct Wrapped {
        payload: String,
        count: u32,
    }

    #[test]
    fn test_handler_downcasts() {
        let seen = Arc::new(AtomicU32::new(0));
        let s = seen.clone();
        let handler = Handler::new(move |p: &Ping| {
            s.store(p.value, Ordering::SeqCst);
        });

        handler.call(&Ping { value: 7 }).unwrap();
        assert_eq!(seen.load(Ordering::SeqCst), 7);

        // Other types are ignored
        handler.call(&"not a ping").unwrap();
        assert_eq!(seen.load(Ordering::SeqCst), 7);
        assert_eq!(handler.extra_args(), 0);
    }

    #[test]
    fn test_handler_error_propagates() {
        let handler = Handler::new(|_: &Ping| Err::<(), _>(HandlerError::failed("nope")));
        let err = handler.call(&Ping { value: 1 }).unwrap_err();
        assert_eq!(err.to_string(), "Handler failed: nope");
    }

    #[test]
    fn test_wrapped_handler_receives_value() {
        let wrapper = Arc::new(Wrapper::new::<Wrapped, _>(SingleWrapper::new(
            |w: &Wrapped| &w.payload,
        )));
        let seen = Arc::new(parking_lot::Mutex::new(None));
        let s = seen.clone();

        let handler = Handler::wrapped::<Wrapped, (String,), _>(
            move |_: &Wrapped, text: Option<&String>| {
                *s.lock() = text.cloned();
            },
            wrapper,
        );
        assert_eq!(handler.extra_args(), 1);

        handler
            .call(&Wrapped {
                payload: "hello".to_string(),
                count: 0,
            })
            .unwrap();
        assert_eq!(seen.lock().as_deref(), Some("hello"));
    }

    #[test]
    fn test_wrapped_handler_skips_type_mismatch() {
        let wrapper = Arc::new(Wrapper::new::<Wrapped, _>(SingleWrapper::new(
            |w: &Wrapped| &w.count,
        )));
        let calls = Arc::new(AtomicU32::new(0));
        let c = calls.clone();

        let handler = Handler::wrapped::<Wrapped, (String,), _>(
            move |_: &Wrapped, _: Option<&String>| {
                c.fetch_add(1, Ordering::SeqCst);
            },
            wrapper,
        );

        let result = handler.call(&Wrapped {
            payload: "hello".to_string(),
            count: 3,
        });
        assert!(result.is_ok());
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_handler_remembers_event_and_wrapper() {
        let plain = Handler::new(|_: &Ping| {});
        assert_eq!(plain.event_type(), TypeId::of::<Ping>());
        assert!(plain.event_name().ends_with("Ping"));
        assert!(plain.wrapper().is_none());

        let wrapper = Arc::new(Wrapper::new::<Wrapped, _>(SingleWrapper::new(
            |w: &Wrapped| &w.payload,
        )));
        let wrapped = Handler::wrapped::<Wrapped, (String,), _>(
            |_: &Wrapped, _: Option<&String>| {},
            Arc::clone(&wrapper),
        )
        .guard(|w: &Wrapped| w.count > 0)
        .map_err(|err| err);

        // Hooks keep the identity of the handler they decorate
        assert_eq!(wrapped.event_type(), TypeId::of::<Wrapped>());
        assert_eq!(wrapped.extra_args(), 1);
        assert!(Arc::ptr_eq(wrapped.wrapper().unwrap(), &wrapper));
    }

    #[test]
    fn test_extract_passes_absent_values() {
        let values: [Option<&dyn Any>; 2] = [None, Some(&5u8)];
        assert_eq!(extract::<String>(&values, 0), Some(None));
        assert_eq!(extract::<u8>(&values, 1), Some(Some(&5u8)));
        assert_eq!(extract::<String>(&values, 1), None);
    }

    #[test]
    fn test_guard_skips() {
        let calls = Arc::new(AtomicU32::new(0));
        let c = calls.clone();
        let handler = Handler::new(move |_: &Ping| {
            c.fetch_add(1, Ordering::SeqCst);
        })
        .guard(|p: &Ping| p.value > 10);

        handler.call(&Ping { value: 5 }).unwrap();
        handler.call(&Ping { value: 50 }).unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_then_runs_only_after_success() {
        let after = Arc::new(AtomicU32::new(0));
        let a = after.clone();
        let handler = Handler::new(|p: &Ping| {
            if p.value == 0 {
                Err(HandlerError::failed("zero"))
            } else {
                Ok(())
            }
        })
        .then(move |_: &Ping| {
            a.fetch_add(1, Ordering::SeqCst);
        });

        assert!(handler.call(&Ping { value: 0 }).is_err());
        assert!(handler.call(&Ping { value: 1 }).is_ok());
        assert_eq!(after.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_map_err_rewrites() {
        let handler = Handler::new(|_: &Ping| Err::<(), _>(HandlerError::failed("raw")))
            .map_err(|err| HandlerError::failed(format!("wrapped: {err}")));

        let err = handler.call(&Ping { value: 1 }).unwrap_err();
        assert_eq!(err.to_string(), "Handler failed: wrapped: Handler failed: raw");
    }
}

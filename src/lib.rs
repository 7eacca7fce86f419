// Flarebus - An in-process publish/subscribe event bus for Rust
//
// This library dispatches events to prioritized handlers with lock-free,
// allocation-free posting and attribute-driven subscriber bindings.

// Re-export core functionality
pub use flarebus_core::*;

// Re-export procedural macros
pub use flarebus_macro::subscriber;

/// Prelude for common imports.
///
/// ```rust
/// use flarebus::prelude::*;
/// ```
pub mod prelude {
    pub use crate::{
        BindError,
        Binder,
        BusBuilder,
        BusConfig,
        DispatchError,
        EventBus,
        EventCatalog,
        EventKey,
        FailurePolicy,
        Handler,
        HandlerError,
        HandlerResult,
        Subscriber,
        // Wrappers
        EventWrapper,
        FnWrapper,
        SingleWrapper,
        subscriber,
    };
}

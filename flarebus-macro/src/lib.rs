// Procedural macros for the Flarebus event bus
// These macros derive subscriber bindings from annotated handler methods

use proc_macro::TokenStream;

mod subscriber;

/// Implements `flarebus::Subscriber` for the type of an inherent impl block
///
/// Every method tagged `#[listener]` becomes a handler. The method takes
/// `&self`, then the event by reference, then optionally up to four
/// `Option<&T>` values supplied by the event's wrapper. It returns `()` or
/// `Result<(), E>` with `E: Into<HandlerError>`.
///
/// `#[listener(priority = EXPR)]` sets the priority (default `0`), and
/// `#[listener(label = "name")]` overrides the diagnostic name (default: the
/// method name).
///
/// ```rust,ignore
/// use flarebus::prelude::*;
///
/// struct Audit;
///
/// #[subscriber]
/// impl Audit {
///     #[listener(priority = i32::MAX)]
///     fn first(&self, event: &Login) {}
///
///     #[listener]
///     fn with_user(&self, event: &Login, user: Option<&String>) {}
/// }
/// ```
#[proc_macro_attribute]
pub fn subscriber(attr: TokenStream, item: TokenStream) -> TokenStream {
    subscriber::subscriber_impl(attr, item)
}

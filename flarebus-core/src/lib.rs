//! In-process publish/subscribe dispatch for Flarebus
//!
//! This crate provides the dispatch core: a fixed catalog of event types, a
//! copy-on-write registry of prioritized handlers, and the bus that posts
//! events to them.
//!
//! ## Features
//!
//! - **Exact-type dispatch** - Events are delivered to handlers of their concrete type only
//! - **Priorities** - Higher priority handlers run first, newest first among equals
//! - **Lock-free posting** - Posting never blocks and never allocates
//! - **Wrappers** - Handlers may receive extra values decomposed from the event
//! - **Idempotent subscriptions** - Subscribing twice or unsubscribing a stranger is a no-op
//!
//! ## Quick Start
//!
//! ```rust
//! use flarebus_core::*;
//! use std::sync::Arc;
//! use std::sync::atomic::{AtomicU32, Ordering};
//!
//! // Define events
//! struct UserCreated {
//!     email: String,
//! }
//!
//! // Define a subscriber
//! #[derive(Default)]
//! struct Mailer {
//!     sent: AtomicU32,
//! }
//!
//! impl Subscriber for Mailer {
//!     fn bind(self: &Arc<Self>, binder: &mut Binder<'_>) -> Result<(), BindError> {
//!         let this = Arc::clone(self);
//!         binder.with_label("send_welcome").listen_wrapped::<UserCreated, (String,), _>(
//!             0,
//!             move |_: &UserCreated, email: Option<&String>| {
//!                 if email.is_some() {
//!                     this.sent.fetch_add(1, Ordering::Relaxed);
//!                 }
//!             },
//!         )?;
//!         Ok(())
//!     }
//! }
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let catalog = EventCatalog::builder().event::<UserCreated>().build();
//!     let bus = EventBus::builder(catalog)
//!         .wrap_single(|e: &UserCreated| &e.email)
//!         .build()?;
//!
//!     let mailer = Arc::new(Mailer::default());
//!     bus.subscribe(&mailer)?;
//!
//!     bus.post(&UserCreated {
//!         email: "alice@example.com".to_string(),
//!     })?;
//!
//!     assert_eq!(mailer.sent.load(Ordering::Relaxed), 1);
//!     Ok(())
//! }
//! ```
//!
//! ## Configuration
//!
//! ```rust
//! use flarebus_core::{EventBus, EventCatalog, FailurePolicy};
//!
//! struct Ping;
//!
//! let bus = EventBus::builder(EventCatalog::builder().event::<Ping>().build())
//!     .name("game")
//!     .failure_policy(FailurePolicy::Isolate) // Run every handler, collect failures
//!     .enable_logging(false)
//!     .build()
//!     .unwrap();
//! ```
//!
//! ## Error Handling
//!
//! ```rust,ignore
//! match bus.post(&event) {
//!     Ok(()) => println!("All handlers succeeded"),
//!     Err(DispatchError::HandlerFailed { label, source, .. }) => {
//!         eprintln!("{label} failed: {source}");
//!     }
//!     Err(DispatchError::HandlersFailed(errors)) => {
//!         eprintln!("{} handlers failed", errors.len());
//!     }
//! }
//! ```

pub mod binder;
pub mod bus;
pub mod catalog;
pub mod config;
pub mod consumer;
pub mod error;
pub mod handler;
pub mod registry;
pub mod slot;
pub mod wrapper;

pub use binder::{Binder, Subscriber};
pub use bus::{BusBuilder, EventBus};
pub use catalog::{EventCatalog, EventCatalogBuilder, EventKey, EventTypeId};
pub use config::{BusConfig, FailurePolicy};
pub use consumer::{Consumer, SubscriberId};
pub use error::{BindError, BoxError, BuildError, DispatchError, HandlerError, HandlerResult};
pub use handler::{Handler, IntoHandlerResult, WrappedListener};
pub use registry::Registry;
pub use slot::{ListenerSlot, Snapshot};
pub use wrapper::{EventWrapper, FnWrapper, MAX_WRAPPER_ARITY, SingleWrapper, Wrapper};

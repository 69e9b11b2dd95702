#![forbid(unsafe_code)]

//! Typed in-process signal dispatch for component runtimes.
//!
//! # Role in the host
//! `sigmux` is the event layer of a component-based runtime (a scene graph,
//! a widget tree, an entity hierarchy). Producers publish immutable typed
//! values ("signals"); consumers register typed callbacks against a live
//! owner identity whose lifetime bounds the callback's validity.
//!
//! # Primary responsibilities
//! - **SignalHub**: type-indexed registry of subscriber channels; the single
//!   entry point for subscribe/unsubscribe/publish/query.
//! - **Priority dispatch**: descending priority, ties in subscription order
//!   (stable), with per-entry publish-time filters.
//! - **Deterministic teardown**: per-owner monitors release every entry an
//!   owner registered when the host reports that owner destroyed.
//! - **Receiver binding**: declaration-driven auto-subscription of an owner
//!   type's handler methods, discovered once per concrete type and cached.
//!
//! # How it fits in the system
//! The host drives the hub from its single logical update thread. The hub
//! has no threads, no queues, and no persistence: publish is a direct,
//! depth-first synchronous call chain through the eligible listeners.
//! The host's only obligations are to call [`SignalHub::owner_destroyed`]
//! when an owner identity dies and [`SignalHub::unsubscribe_all`] at its
//! session reset boundary.
//!
//! # Example
//! ```
//! use sigmux::{OwnerId, Signal, SignalHub};
//!
//! struct Ping {
//!     value: i32,
//! }
//! impl Signal for Ping {}
//!
//! let hub = SignalHub::new();
//! let owner = OwnerId::fresh();
//! hub.subscribe_fn(owner, 0, |ping: &Ping| {
//!     assert_eq!(ping.value, 42);
//! });
//! hub.publish(&Ping { value: 42 });
//! hub.owner_destroyed(owner);
//! assert_eq!(hub.subscriber_count::<Ping>(), 0);
//! ```

pub mod binder;
mod channel;
pub mod filter;
pub mod handler;
pub mod hub;
mod monitor;
pub mod owner;
pub mod signal;

pub use binder::{ReceiverDecl, ReceiverDecls, Receivers, SignalKind};
pub use filter::{OwnerIn, OwnerIs, SignalFilter};
pub use handler::SignalHandler;
pub use hub::SignalHub;
pub use owner::OwnerId;
pub use signal::Signal;

//! Callback handles with stable identity.
//!
//! Rust closures have no notion of equality, so the engine makes callback
//! identity explicit: a [`SignalHandler`] is a cheap cloneable handle around
//! an `Rc`'d closure, and two handles are the *same callback* exactly when
//! they share the allocation. Cloning preserves identity; constructing a new
//! handle from an identical closure does not.
//!
//! Identity is what drives the replace-on-resubscribe rule and explicit
//! unsubscription. While a handle is stored in a channel, the channel holds
//! a strong reference, so the identity value cannot be recycled out from
//! under its bookkeeping.

use std::fmt;
use std::rc::Rc;

use crate::signal::Signal;

/// Identity of a callback, derived from its `Rc` allocation address.
///
/// Only meaningful while at least one strong handle is alive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) struct HandlerId(usize);

impl HandlerId {
    /// Fabricated identity for bookkeeping tests that have no live closure.
    #[cfg(test)]
    pub(crate) fn synthetic(raw: usize) -> Self {
        Self(raw)
    }
}

/// A cloneable, identity-carrying callback for signals of type `S`.
///
/// # Invariants
///
/// 1. All clones of one handle share one identity.
/// 2. Two independently constructed handles never share an identity while
///    both are alive.
pub struct SignalHandler<S: Signal> {
    callback: Rc<dyn Fn(&S)>,
}

impl<S: Signal> SignalHandler<S> {
    /// Wrap a closure as an identity-carrying handle.
    pub fn new(callback: impl Fn(&S) + 'static) -> Self {
        Self {
            callback: Rc::new(callback),
        }
    }

    pub(crate) fn id(&self) -> HandlerId {
        HandlerId(Rc::as_ptr(&self.callback) as *const () as usize)
    }

    pub(crate) fn invoke(&self, signal: &S) {
        (self.callback)(signal);
    }
}

// Manual Clone: shares the same Rc (and therefore the same identity).
impl<S: Signal> Clone for SignalHandler<S> {
    fn clone(&self) -> Self {
        Self {
            callback: Rc::clone(&self.callback),
        }
    }
}

impl<S: Signal> fmt::Debug for SignalHandler<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SignalHandler")
            .field("signal", &crate::signal::signal_name::<S>())
            .field("id", &self.id())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    struct Tick;
    impl Signal for Tick {}

    #[test]
    fn clones_share_identity() {
        let handler = SignalHandler::new(|_: &Tick| {});
        let other = handler.clone();
        assert_eq!(handler.id(), other.id());
    }

    #[test]
    fn fresh_handles_are_distinct() {
        let a = SignalHandler::new(|_: &Tick| {});
        let b = SignalHandler::new(|_: &Tick| {});
        assert_ne!(a.id(), b.id());
    }

    #[test]
    fn invoke_calls_the_closure() {
        let hits = Rc::new(Cell::new(0u32));
        let hits_in = Rc::clone(&hits);
        let handler = SignalHandler::new(move |_: &Tick| hits_in.set(hits_in.get() + 1));
        handler.invoke(&Tick);
        handler.invoke(&Tick);
        assert_eq!(hits.get(), 2);
    }
}

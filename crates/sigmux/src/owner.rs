//! Owner identity.
//!
//! An owner is the identity whose lifetime bounds a set of subscriptions;
//! in the host it is typically a component instance in the scene graph.
//! The hub never dereferences an owner — it only uses the id as a map key
//! and as the value handed to publish-time filters — so the host is free to
//! derive ids from whatever instance bookkeeping it already has.

use std::cell::Cell;
use std::fmt;

thread_local! {
    static NEXT_OWNER: Cell<u64> = const { Cell::new(1) };
}

/// Opaque owner identity.
///
/// Small copyable key; the host allocates them (or uses [`OwnerId::fresh`])
/// and reports destruction via [`SignalHub::owner_destroyed`].
///
/// [`SignalHub::owner_destroyed`]: crate::SignalHub::owner_destroyed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct OwnerId(u64);

impl OwnerId {
    /// Wrap a host-supplied raw id.
    #[must_use]
    pub const fn new(raw: u64) -> Self {
        Self(raw)
    }

    /// Allocate a process-unique id from a thread-local counter.
    ///
    /// Convenience for hosts without their own id scheme. Single-threaded,
    /// like everything else in the engine.
    #[must_use]
    pub fn fresh() -> Self {
        NEXT_OWNER.with(|next| {
            let id = next.get();
            next.set(id + 1);
            Self(id)
        })
    }

    /// The raw id value.
    #[must_use]
    pub const fn raw(self) -> u64 {
        self.0
    }
}

impl From<u64> for OwnerId {
    fn from(raw: u64) -> Self {
        Self(raw)
    }
}

impl fmt::Display for OwnerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "owner#{}", self.0)
    }
}

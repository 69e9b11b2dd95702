//! Per-signal-type subscriber storage.
//!
//! A [`Channel<S>`] owns every live subscription entry for exactly one
//! signal type, kept sorted by (priority descending, insertion sequence
//! ascending). Insertion sequence numbers come from the hub, so ties in
//! priority dispatch in subscription order — a stable order, not an
//! accident of the container.
//!
//! # Invariants
//!
//! 1. At most one entry per (owner, handler identity) pair; re-insertion
//!    replaces (remove + fresh insert with a new sequence number).
//! 2. `entries` is always sorted by the dispatch key.
//! 3. Dispatch operates on a [`snapshot`](Channel::snapshot): structural
//!    changes triggered by callbacks mid-dispatch never skip or duplicate
//!    an already-decided invocation for that publish call.
//!
//! The hub is responsible for dropping a channel the moment it empties; no
//! empty channel persists in the registry.

use std::any::Any;

use crate::handler::{HandlerId, SignalHandler};
use crate::owner::OwnerId;
use crate::signal::Signal;

/// One (callback, owner, priority) registration.
struct Entry<S: Signal> {
    handler: SignalHandler<S>,
    owner: OwnerId,
    priority: i32,
    seq: u64,
}

/// Ordered subscriber storage for one signal type.
pub(crate) struct Channel<S: Signal> {
    entries: Vec<Entry<S>>,
}

impl<S: Signal> Channel<S> {
    pub(crate) fn new() -> Self {
        Self {
            entries: Vec::new(),
        }
    }

    /// Insert an entry, replacing any existing entry for the same
    /// (owner, handler identity) pair. Returns `true` if an entry was
    /// replaced rather than added.
    pub(crate) fn insert(
        &mut self,
        handler: SignalHandler<S>,
        owner: OwnerId,
        priority: i32,
        seq: u64,
    ) -> bool {
        let replaced = self.remove(owner, handler.id());
        // New entries carry the largest seq so far, so they sort after
        // every existing entry of equal priority.
        let at = self.entries.partition_point(|e| e.priority >= priority);
        self.entries.insert(
            at,
            Entry {
                handler,
                owner,
                priority,
                seq,
            },
        );
        debug_assert!(self.is_sorted(), "channel order invariant violated");
        replaced
    }

    /// Remove the entry for (owner, handler identity), if present.
    pub(crate) fn remove(&mut self, owner: OwnerId, handler: HandlerId) -> bool {
        let before = self.entries.len();
        self.entries
            .retain(|e| !(e.owner == owner && e.handler.id() == handler));
        before != self.entries.len()
    }

    /// Clone out the current dispatch order. The snapshot holds strong
    /// handler references, so entries removed mid-dispatch still complete
    /// their already-decided invocation.
    pub(crate) fn snapshot(&self) -> Vec<(SignalHandler<S>, OwnerId)> {
        self.entries
            .iter()
            .map(|e| (e.handler.clone(), e.owner))
            .collect()
    }

    pub(crate) fn len(&self) -> usize {
        self.entries.len()
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn is_sorted(&self) -> bool {
        self.entries.windows(2).all(|w| {
            w[0].priority > w[1].priority
                || (w[0].priority == w[1].priority && w[0].seq < w[1].seq)
        })
    }
}

/// Type-erased channel surface for the hub's `TypeId`-keyed registry.
///
/// Exposes exactly what the hub needs without the signal type; publish
/// downcasts back to [`Channel<S>`] via `as_any`.
pub(crate) trait ErasedChannel {
    fn remove_entry(&mut self, owner: OwnerId, handler: HandlerId) -> bool;
    fn len(&self) -> usize;
    fn is_empty(&self) -> bool;
    fn as_any(&self) -> &dyn Any;
    fn as_any_mut(&mut self) -> &mut dyn Any;
}

impl<S: Signal> ErasedChannel for Channel<S> {
    fn remove_entry(&mut self, owner: OwnerId, handler: HandlerId) -> bool {
        self.remove(owner, handler)
    }

    fn len(&self) -> usize {
        Channel::len(self)
    }

    fn is_empty(&self) -> bool {
        Channel::is_empty(self)
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Ping;
    impl Signal for Ping {}

    fn handler() -> SignalHandler<Ping> {
        SignalHandler::new(|_: &Ping| {})
    }

    #[test]
    fn orders_by_priority_then_insertion() {
        let mut ch = Channel::new();
        let (h1, h2, h3) = (handler(), handler(), handler());
        let (o1, o2, o3) = (OwnerId::new(1), OwnerId::new(2), OwnerId::new(3));
        ch.insert(h1, o1, 5, 0);
        ch.insert(h2, o2, 1, 1);
        ch.insert(h3, o3, 5, 2);

        let owners: Vec<_> = ch.snapshot().into_iter().map(|(_, o)| o).collect();
        assert_eq!(owners, vec![o1, o3, o2]);
    }

    #[test]
    fn reinsert_replaces_not_duplicates() {
        let mut ch = Channel::new();
        let h = handler();
        let owner = OwnerId::new(1);
        assert!(!ch.insert(h.clone(), owner, 0, 0));
        assert!(ch.insert(h, owner, 3, 1));
        assert_eq!(ch.len(), 1);
    }

    #[test]
    fn same_closure_different_owner_is_two_entries() {
        let mut ch = Channel::new();
        let h = handler();
        ch.insert(h.clone(), OwnerId::new(1), 0, 0);
        ch.insert(h, OwnerId::new(2), 0, 1);
        assert_eq!(ch.len(), 2);
    }

    #[test]
    fn remove_miss_is_false() {
        let mut ch = Channel::new();
        let h = handler();
        ch.insert(h, OwnerId::new(1), 0, 0);
        let stranger = handler();
        assert!(!ch.remove(OwnerId::new(1), stranger.id()));
        assert_eq!(ch.len(), 1);
    }
}

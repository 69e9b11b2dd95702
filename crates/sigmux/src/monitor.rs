//! Per-owner subscription bookkeeping.
//!
//! One [`OwnerMonitor`] exists per distinct owner identity, created on the
//! owner's first subscribe and held in the hub keyed by [`OwnerId`]. It maps
//! each of the owner's callback identities to the channel that holds the
//! matching entry, so destruction can release all of them in one pass.
//!
//! The monitor is plain bookkeeping: it never touches channels itself. The
//! hub owns all mutation, which keeps the engine free of handle-to-registry
//! reference cycles and makes the single-writer borrow discipline trivial.
//! Disposal removes the monitor from the hub's map entirely — that is what
//! makes a repeated destruction notification a no-op.

use std::any::TypeId;

use rustc_hash::FxHashMap;

use crate::handler::HandlerId;
use crate::owner::OwnerId;

/// What the monitor remembers about one registered callback: which channel
/// holds its entry.
#[derive(Debug, Clone, Copy)]
pub(crate) struct ReceiverRecord {
    pub(crate) signal: TypeId,
    pub(crate) signal_name: &'static str,
}

/// Bookkeeping for every subscription a single owner holds.
#[derive(Default)]
pub(crate) struct OwnerMonitor {
    receivers: FxHashMap<HandlerId, ReceiverRecord>,
}

impl OwnerMonitor {
    /// Record a callback registration. If a record already exists for this
    /// identity it is displaced and returned, so the caller can dispose the
    /// stale channel entry before the new one takes its place.
    pub(crate) fn add_receiver(
        &mut self,
        handler: HandlerId,
        record: ReceiverRecord,
    ) -> Option<ReceiverRecord> {
        self.receivers.insert(handler, record)
    }

    /// Remove and return the record for a callback identity, if present.
    pub(crate) fn remove_receiver(&mut self, handler: HandlerId) -> Option<ReceiverRecord> {
        self.receivers.remove(&handler)
    }

    /// Drop every record whose channel is `signal`. Returns how many were
    /// dropped. Used when a whole channel is bulk-cleared.
    pub(crate) fn purge_signal(&mut self, signal: TypeId) -> usize {
        let before = self.receivers.len();
        self.receivers.retain(|_, record| record.signal != signal);
        before - self.receivers.len()
    }

    /// Consume the monitor, yielding every record for disposal.
    pub(crate) fn into_records(self) -> impl Iterator<Item = (HandlerId, ReceiverRecord)> {
        self.receivers.into_iter()
    }

    pub(crate) fn len(&self) -> usize {
        self.receivers.len()
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.receivers.is_empty()
    }

    /// Used by the owner-destruction log line.
    pub(crate) fn describe(&self, owner: OwnerId) -> String {
        let mut names: Vec<&str> = self.receivers.values().map(|r| r.signal_name).collect();
        names.sort_unstable();
        names.dedup();
        format!("{owner}: {} receiver(s) across {:?}", self.len(), names)
    }
}

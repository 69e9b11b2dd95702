//! The dispatcher registry.
//!
//! [`SignalHub`] is the single entry point for subscribe, unsubscribe,
//! publish, and query. It owns the type-indexed channel map, the per-owner
//! monitors, and the receiver-binding bookkeeping.
//!
//! # Architecture
//!
//! The hub is a cheap cloneable handle over `Rc<RefCell<..>>` shared state,
//! single-threaded by construction. Every operation takes a short borrow,
//! and **no borrow is ever held while a user callback runs**: publish
//! snapshots the eligible entries first, then invokes them with the
//! registry unlocked. That is what makes the hub re-entrant — a listener
//! may unsubscribe itself, subscribe others, or publish another signal
//! recursively, all synchronously.
//!
//! # Invariants
//!
//! 1. Dispatch order is descending priority; equal priorities dispatch in
//!    subscription order (stable).
//! 2. Structural changes made by callbacks take effect for subsequent
//!    publish calls; the current call's invocation set was decided by its
//!    snapshot.
//! 3. No empty channel persists in the registry.
//! 4. A panicking listener is caught, logged, and never prevents the
//!    remaining snapshot entries from running.
//! 5. Exactly one monitor per owner; disposing it (owner destruction) is
//!    idempotent because disposal removes it from the map.

use std::any::{Any, TypeId};
use std::cell::RefCell;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::rc::Rc;

use rustc_hash::FxHashMap;
use tracing::{debug, error, trace};

use crate::binder::{self, BinderState, Receivers};
use crate::channel::{Channel, ErasedChannel};
use crate::filter::SignalFilter;
use crate::handler::{HandlerId, SignalHandler};
use crate::monitor::{OwnerMonitor, ReceiverRecord};
use crate::owner::OwnerId;
use crate::signal::{Signal, signal_name};

/// Shared interior for [`SignalHub`].
pub(crate) struct HubInner {
    channels: FxHashMap<TypeId, Box<dyn ErasedChannel>>,
    monitors: FxHashMap<OwnerId, OwnerMonitor>,
    pub(crate) binder: BinderState,
    /// Monotonic insertion counter; the stable-sort tiebreaker.
    next_seq: u64,
}

impl HubInner {
    fn new() -> Self {
        Self {
            channels: FxHashMap::default(),
            monitors: FxHashMap::default(),
            binder: BinderState::default(),
            next_seq: 0,
        }
    }

    fn subscribe_entry<S: Signal>(
        &mut self,
        owner: OwnerId,
        handler: SignalHandler<S>,
        priority: i32,
    ) {
        let handler_id = handler.id();
        let record = ReceiverRecord {
            signal: TypeId::of::<S>(),
            signal_name: signal_name::<S>(),
        };
        let stale = self
            .monitors
            .entry(owner)
            .or_default()
            .add_receiver(handler_id, record);
        if let Some(stale) = stale {
            // Same identity, same allocation, so the prior registration can
            // only have targeted the same channel.
            debug_assert_eq!(stale.signal, record.signal, "handler identity crossed channels");
            self.remove_channel_entry(stale.signal, owner, handler_id);
        }
        let seq = self.next_seq;
        self.next_seq += 1;
        let slot = self
            .channels
            .entry(TypeId::of::<S>())
            .or_insert_with(|| Box::new(Channel::<S>::new()));
        match slot.as_any_mut().downcast_mut::<Channel<S>>() {
            Some(channel) => {
                channel.insert(handler, owner, priority, seq);
                trace!(
                    signal = signal_name::<S>(),
                    owner = %owner,
                    priority,
                    "subscribed"
                );
            }
            None => debug_assert!(
                false,
                "channel registry holds wrong type for {}",
                signal_name::<S>()
            ),
        }
    }

    /// Remove one entry from its channel, dropping the channel if that
    /// empties it. Returns whether an entry was removed.
    pub(crate) fn remove_channel_entry(
        &mut self,
        signal: TypeId,
        owner: OwnerId,
        handler: HandlerId,
    ) -> bool {
        let Some(channel) = self.channels.get_mut(&signal) else {
            return false;
        };
        let removed = channel.remove_entry(owner, handler);
        if channel.is_empty() {
            self.channels.remove(&signal);
        }
        removed
    }

    pub(crate) fn monitor_mut(&mut self, owner: OwnerId) -> Option<&mut OwnerMonitor> {
        self.monitors.get_mut(&owner)
    }

    /// Monitors mirror channels: an owner's monitor exists only while the
    /// owner holds at least one entry.
    pub(crate) fn drop_monitor_if_empty(&mut self, owner: OwnerId) {
        if self.monitors.get(&owner).is_some_and(OwnerMonitor::is_empty) {
            self.monitors.remove(&owner);
        }
    }
}

/// Strongly-typed publish/subscribe dispatcher for a component runtime.
///
/// Cloning a `SignalHub` creates a new handle to the **same** registry.
/// Construct independent hubs for independent worlds (or tests); there is
/// no hidden global instance.
pub struct SignalHub {
    pub(crate) inner: Rc<RefCell<HubInner>>,
}

// Manual Clone: shares the same Rc.
impl Clone for SignalHub {
    fn clone(&self) -> Self {
        Self {
            inner: Rc::clone(&self.inner),
        }
    }
}

impl Default for SignalHub {
    fn default() -> Self {
        Self::new()
    }
}

impl SignalHub {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self {
            inner: Rc::new(RefCell::new(HubInner::new())),
        }
    }

    /// Register `handler` for signals of type `S` on behalf of `owner`.
    ///
    /// Higher `priority` is invoked earlier; ties dispatch in subscription
    /// order. Re-subscribing a clone of an already-registered handler for
    /// the same owner replaces the prior entry (the count does not grow),
    /// taking the new priority and a fresh position among its equals.
    pub fn subscribe<S: Signal>(&self, owner: OwnerId, handler: SignalHandler<S>, priority: i32) {
        self.inner
            .borrow_mut()
            .subscribe_entry(owner, handler, priority);
    }

    /// Wrap `callback` in a [`SignalHandler`], subscribe it, and return the
    /// handle for later [`unsubscribe`](Self::unsubscribe).
    pub fn subscribe_fn<S: Signal>(
        &self,
        owner: OwnerId,
        priority: i32,
        callback: impl Fn(&S) + 'static,
    ) -> SignalHandler<S> {
        let handler = SignalHandler::new(callback);
        self.subscribe(owner, handler.clone(), priority);
        handler
    }

    /// Remove the entry for (`owner`, `handler`), if one exists.
    ///
    /// Checks the owner's monitor first, then the channel directly; a miss
    /// on both is a logged no-op. Removing the last entry drops the
    /// channel, and removing the owner's last record drops its monitor.
    pub fn unsubscribe<S: Signal>(&self, owner: OwnerId, handler: &SignalHandler<S>) {
        let inner = &mut *self.inner.borrow_mut();
        let handler_id = handler.id();
        let recorded = inner
            .monitors
            .get_mut(&owner)
            .and_then(|monitor| monitor.remove_receiver(handler_id));
        let removed = inner.remove_channel_entry(TypeId::of::<S>(), owner, handler_id);
        inner.drop_monitor_if_empty(owner);
        if recorded.is_none() && !removed {
            debug!(
                signal = signal_name::<S>(),
                owner = %owner,
                "unsubscribe: no matching entry"
            );
        }
    }

    /// Publish `signal` to every live entry of its exact type.
    ///
    /// Publishing with zero subscribers is a valid no-op. Dispatch is a
    /// direct synchronous call chain; see the module docs for the
    /// re-entrancy and fault-isolation guarantees.
    pub fn publish<S: Signal>(&self, signal: &S) {
        self.publish_filtered(signal, &[]);
    }

    /// Publish `signal` to entries whose owner is admitted by **every**
    /// filter (logical AND; an empty slice behaves like [`publish`]).
    ///
    /// Filters run once per entry per call, immediately before that entry's
    /// invocation, against the entry's own recorded owner.
    ///
    /// [`publish`]: Self::publish
    pub fn publish_filtered<S: Signal>(&self, signal: &S, filters: &[&dyn SignalFilter]) {
        let snapshot = {
            let inner = self.inner.borrow();
            let Some(channel) = inner.channels.get(&TypeId::of::<S>()) else {
                trace!(signal = signal_name::<S>(), "publish with no subscribers");
                return;
            };
            let Some(channel) = channel.as_any().downcast_ref::<Channel<S>>() else {
                debug_assert!(
                    false,
                    "channel registry holds wrong type for {}",
                    signal_name::<S>()
                );
                return;
            };
            channel.snapshot()
        };
        for (handler, owner) in snapshot {
            if !filters.iter().all(|filter| filter.admits(owner)) {
                continue;
            }
            if let Err(payload) = catch_unwind(AssertUnwindSafe(|| handler.invoke(signal))) {
                error!(
                    signal = signal_name::<S>(),
                    owner = %owner,
                    reason = panic_message(payload.as_ref()),
                    "listener panicked during dispatch; continuing"
                );
            }
        }
    }

    /// Drop the channel for `S` and purge every matching monitor and
    /// bound-receiver record. The cleared entries held the only strong
    /// handles behind their identities, so no bookkeeping may keep them.
    pub fn unsubscribe_all_of<S: Signal>(&self) {
        let inner = &mut *self.inner.borrow_mut();
        let signal = TypeId::of::<S>();
        match inner.channels.remove(&signal) {
            Some(channel) => debug!(
                signal = signal_name::<S>(),
                entries = channel.len(),
                "bulk-cleared channel"
            ),
            None => trace!(signal = signal_name::<S>(), "bulk clear with no channel"),
        }
        inner.monitors.retain(|_, monitor| {
            monitor.purge_signal(signal);
            !monitor.is_empty()
        });
        inner.binder.purge_signal(signal);
    }

    /// Full reset: every channel, monitor, and bound receiver pair is
    /// dropped. The defined reset boundary for session/scene end.
    pub fn unsubscribe_all(&self) {
        let inner = &mut *self.inner.borrow_mut();
        let channels = inner.channels.len();
        inner.channels.clear();
        inner.monitors.clear();
        inner.binder.forget_all_bound();
        debug!(channels, "hub reset");
    }

    /// Live entry count for `S`; 0 if no channel exists.
    #[must_use]
    pub fn subscriber_count<S: Signal>(&self) -> usize {
        self.inner
            .borrow()
            .channels
            .get(&TypeId::of::<S>())
            .map_or(0, |channel| channel.len())
    }

    /// Number of live (non-empty) channels.
    #[must_use]
    pub fn channel_count(&self) -> usize {
        self.inner.borrow().channels.len()
    }

    /// Host notification that `owner` has been permanently destroyed.
    ///
    /// Releases every entry the owner registered (direct subscriptions and
    /// bound receivers alike) and forgets its bound pairs. Idempotent: a
    /// second notification finds no monitor and is a no-op.
    pub fn owner_destroyed(&self, owner: OwnerId) {
        let inner = &mut *self.inner.borrow_mut();
        inner.binder.forget_owner(owner);
        let Some(monitor) = inner.monitors.remove(&owner) else {
            trace!(owner = %owner, "destruction notice for unknown owner (already released)");
            return;
        };
        debug!("releasing {}", monitor.describe(owner));
        for (handler_id, record) in monitor.into_records() {
            let removed = inner.remove_channel_entry(record.signal, owner, handler_id);
            debug_assert!(
                removed,
                "monitor record without matching channel entry for {}",
                record.signal_name
            );
        }
    }

    /// Subscribe every declared receiver of `T` for this `instance`.
    ///
    /// Discovery of `T`'s declarations runs once per concrete type and is
    /// cached hub-wide. Binding an already-bound (owner, type) pair is a
    /// no-op. Callbacks hold the instance weakly; a receiver whose instance
    /// has been dropped is skipped at dispatch, never invoked.
    pub fn bind_receivers<T: Receivers>(&self, owner: OwnerId, instance: &Rc<T>) {
        binder::bind(self, owner, instance);
    }

    /// Unsubscribe exactly the receivers that [`bind_receivers`] created
    /// for this (owner, type) pair. Unbinding an unbound pair is a no-op.
    ///
    /// [`bind_receivers`]: Self::bind_receivers
    pub fn unbind_receivers<T: Receivers>(&self, owner: OwnerId) {
        binder::unbind::<T>(self, owner);
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    payload
        .downcast_ref::<&'static str>()
        .copied()
        .or_else(|| payload.downcast_ref::<String>().map(String::as_str))
        .unwrap_or("<non-string panic payload>")
}

//! Declaration-driven receiver binding.
//!
//! The original host discovered annotated handler methods by reflection.
//! Rust has no runtime reflection, so the declaration is explicit: an owner
//! type implements [`Receivers`] and lists its handler methods once, in
//! [`Receivers::declare`]. Discovery compiles those declarations into a
//! [`ReceiverSet`] exactly once per concrete type (cached hub-wide) and
//! validates them as it goes; binding an instance then walks the cached set
//! and registers each receiver through the ordinary subscribe path — no
//! special dispatch path exists for bound receivers.
//!
//! # Validation
//!
//! Parameter arity and the signal contract are compile-time properties
//! here. The checks that remain discovery-time faults — an explicit signal
//! type override that does not match the receiver's parameter, or a
//! duplicate method name — log an error naming the method and exclude only
//! that declaration; the rest of the type's receivers still bind.
//!
//! # Lifetimes
//!
//! Bound callbacks hold the instance weakly. An instance dropped while its
//! entries are still registered is never invoked; dispatch skips it until
//! the host's destruction notice purges the entries eagerly.
//!
//! # Example
//!
//! ```
//! use std::cell::Cell;
//! use std::rc::Rc;
//! use sigmux::{OwnerId, ReceiverDecls, Receivers, Signal, SignalHub};
//!
//! struct Damage {
//!     amount: i32,
//! }
//! impl Signal for Damage {}
//!
//! struct Creature {
//!     health: Cell<i32>,
//! }
//!
//! impl Receivers for Creature {
//!     fn declare(decls: &mut ReceiverDecls<Self>) {
//!         decls.on("on_damage", 0, |creature: &Creature, damage: &Damage| {
//!             creature.health.set(creature.health.get() - damage.amount);
//!         });
//!     }
//! }
//!
//! let hub = SignalHub::new();
//! let owner = OwnerId::fresh();
//! let creature = Rc::new(Creature { health: Cell::new(10) });
//! hub.bind_receivers(owner, &creature);
//! hub.publish(&Damage { amount: 3 });
//! assert_eq!(creature.health.get(), 7);
//! hub.owner_destroyed(owner);
//! ```

use std::any::{Any, TypeId, type_name};
use std::rc::{Rc, Weak};

use rustc_hash::{FxHashMap, FxHashSet};
use tracing::{debug, error, warn};

use crate::handler::{HandlerId, SignalHandler};
use crate::hub::SignalHub;
use crate::owner::OwnerId;
use crate::signal::{Signal, signal_name};

/// Owner types whose handler methods are auto-bound through the hub.
pub trait Receivers: Sized + 'static {
    /// Declare every handler method of this type. Runs once per concrete
    /// type; the result is cached and shared by all instances.
    fn declare(decls: &mut ReceiverDecls<Self>);
}

type BindFn<T> = Box<dyn Fn(&SignalHub, OwnerId, i32, Weak<T>) -> HandlerId>;

/// A concrete signal type carried by an erased declaration.
///
/// The original host allowed a handler whose parameter was a shared
/// supertype, with the concrete signal type declared on the annotation.
/// `SignalKind::of::<S>()` is that declaration: it pins the channel type
/// while the handler body receives the signal as `&dyn Any`.
#[derive(Debug, Clone, Copy)]
pub struct SignalKind {
    signal: TypeId,
    signal_name: &'static str,
    subscribe: fn(&SignalHub, OwnerId, i32, Rc<dyn Fn(&dyn Any)>) -> HandlerId,
}

impl SignalKind {
    /// The kind for signal type `S`.
    #[must_use]
    pub fn of<S: Signal>() -> Self {
        fn subscribe_as<S: Signal>(
            hub: &SignalHub,
            owner: OwnerId,
            priority: i32,
            callback: Rc<dyn Fn(&dyn Any)>,
        ) -> HandlerId {
            let handler = SignalHandler::new(move |signal: &S| (*callback)(signal));
            let id = handler.id();
            hub.subscribe(owner, handler, priority);
            id
        }
        Self {
            signal: TypeId::of::<S>(),
            signal_name: signal_name::<S>(),
            subscribe: subscribe_as::<S>,
        }
    }
}

enum DeclKind<T> {
    Typed {
        param: TypeId,
        param_name: &'static str,
        subscribe: BindFn<T>,
    },
    Erased {
        kind: SignalKind,
        method: Rc<dyn Fn(&T, &dyn Any)>,
    },
}

/// One declared handler method, as written in [`Receivers::declare`].
pub struct ReceiverDecl<T> {
    name: &'static str,
    priority: i32,
    override_signal: Option<(TypeId, &'static str)>,
    kind: DeclKind<T>,
}

impl<T> ReceiverDecl<T> {
    /// Explicitly declare the signal type this receiver listens to.
    ///
    /// Redundant when it matches the receiver's parameter type; a mismatch
    /// is a discovery-time validation error that excludes this declaration.
    pub fn with_signal<S: Signal>(&mut self) -> &mut Self {
        self.override_signal = Some((TypeId::of::<S>(), signal_name::<S>()));
        self
    }
}

/// Accumulates a type's receiver declarations during [`Receivers::declare`].
pub struct ReceiverDecls<T> {
    decls: Vec<ReceiverDecl<T>>,
}

impl<T: 'static> ReceiverDecls<T> {
    fn new() -> Self {
        Self { decls: Vec::new() }
    }

    /// Declare a typed handler method: the parameter type is the signal
    /// type. Higher `priority` is invoked earlier.
    pub fn on<S: Signal>(
        &mut self,
        name: &'static str,
        priority: i32,
        method: impl Fn(&T, &S) + 'static,
    ) -> &mut ReceiverDecl<T> {
        let method: Rc<dyn Fn(&T, &S)> = Rc::new(method);
        let subscribe: BindFn<T> = Box::new(move |hub, owner, priority, weak: Weak<T>| {
            let method = Rc::clone(&method);
            let handler = SignalHandler::new(move |signal: &S| match weak.upgrade() {
                Some(instance) => (*method)(&instance, signal),
                None => debug!(method = name, "receiver instance dropped; skipping dispatch"),
            });
            let id = handler.id();
            hub.subscribe(owner, handler, priority);
            id
        });
        self.push(ReceiverDecl {
            name,
            priority,
            override_signal: None,
            kind: DeclKind::Typed {
                param: TypeId::of::<S>(),
                param_name: signal_name::<S>(),
                subscribe,
            },
        })
    }

    /// Declare a type-erased handler method: the body receives the signal
    /// as `&dyn Any` and `kind` pins the concrete channel type.
    pub fn on_erased(
        &mut self,
        name: &'static str,
        priority: i32,
        kind: SignalKind,
        method: impl Fn(&T, &dyn Any) + 'static,
    ) -> &mut ReceiverDecl<T> {
        self.push(ReceiverDecl {
            name,
            priority,
            override_signal: None,
            kind: DeclKind::Erased {
                kind,
                method: Rc::new(method),
            },
        })
    }

    fn push(&mut self, decl: ReceiverDecl<T>) -> &mut ReceiverDecl<T> {
        self.decls.push(decl);
        let last = self.decls.len() - 1;
        &mut self.decls[last]
    }
}

/// One validated, compiled receiver: everything bind needs to subscribe it
/// for a fresh instance.
struct CompiledReceiver<T> {
    name: &'static str,
    signal: TypeId,
    signal_name: &'static str,
    priority: i32,
    bind_one: Box<dyn Fn(&SignalHub, OwnerId, Weak<T>) -> HandlerId>,
}

/// The cached result of discovery for one concrete owner type. Read-only
/// after construction; shared by every instance of that type.
pub(crate) struct ReceiverSet<T> {
    receivers: Vec<CompiledReceiver<T>>,
}

impl<T: Receivers> ReceiverSet<T> {
    fn discover() -> Self {
        let mut decls = ReceiverDecls::new();
        T::declare(&mut decls);

        let mut seen: FxHashSet<&'static str> = FxHashSet::default();
        let mut receivers = Vec::with_capacity(decls.decls.len());
        for decl in decls.decls {
            if !seen.insert(decl.name) {
                error!(
                    owner_type = type_name::<T>(),
                    method = decl.name,
                    "duplicate receiver declaration; excluding"
                );
                continue;
            }
            let name = decl.name;
            let priority = decl.priority;
            match decl.kind {
                DeclKind::Typed {
                    param,
                    param_name,
                    subscribe,
                } => {
                    if let Some((declared, declared_name)) = decl.override_signal
                        && declared != param
                    {
                        error!(
                            owner_type = type_name::<T>(),
                            method = name,
                            declared = declared_name,
                            parameter = param_name,
                            "explicit signal type does not match receiver parameter; excluding"
                        );
                        continue;
                    }
                    receivers.push(CompiledReceiver {
                        name,
                        signal: param,
                        signal_name: param_name,
                        priority,
                        bind_one: Box::new(move |hub, owner, weak| {
                            subscribe(hub, owner, priority, weak)
                        }),
                    });
                }
                DeclKind::Erased { kind, method } => {
                    if let Some((declared, declared_name)) = decl.override_signal
                        && declared != kind.signal
                    {
                        error!(
                            owner_type = type_name::<T>(),
                            method = name,
                            declared = declared_name,
                            parameter = kind.signal_name,
                            "explicit signal type does not match receiver parameter; excluding"
                        );
                        continue;
                    }
                    receivers.push(CompiledReceiver {
                        name,
                        signal: kind.signal,
                        signal_name: kind.signal_name,
                        priority,
                        bind_one: Box::new(move |hub, owner, weak: Weak<T>| {
                            let method = Rc::clone(&method);
                            let erased: Rc<dyn Fn(&dyn Any)> =
                                Rc::new(move |signal| match weak.upgrade() {
                                    Some(instance) => (*method)(&instance, signal),
                                    None => debug!(
                                        method = name,
                                        "receiver instance dropped; skipping dispatch"
                                    ),
                                });
                            (kind.subscribe)(hub, owner, priority, erased)
                        }),
                    });
                }
            }
        }
        Self { receivers }
    }
}

/// Binder bookkeeping inside the hub: the per-type discovery cache and the
/// mutable set of currently bound (owner, type) pairs.
#[derive(Default)]
pub(crate) struct BinderState {
    cache: FxHashMap<TypeId, Rc<dyn Any>>,
    bound: FxHashMap<(OwnerId, TypeId), Vec<(TypeId, HandlerId)>>,
}

impl BinderState {
    fn cached<T: Receivers>(&self) -> Option<Rc<ReceiverSet<T>>> {
        let cached = self.cache.get(&TypeId::of::<T>())?;
        match Rc::clone(cached).downcast::<ReceiverSet<T>>() {
            Ok(set) => Some(set),
            Err(_) => {
                debug_assert!(false, "receiver cache holds wrong type for {}", type_name::<T>());
                None
            }
        }
    }

    fn is_bound(&self, owner: OwnerId, owner_type: TypeId) -> bool {
        self.bound.contains_key(&(owner, owner_type))
    }

    fn mark_bound(
        &mut self,
        owner: OwnerId,
        owner_type: TypeId,
        entries: Vec<(TypeId, HandlerId)>,
    ) {
        self.bound.insert((owner, owner_type), entries);
    }

    fn take_bound(
        &mut self,
        owner: OwnerId,
        owner_type: TypeId,
    ) -> Option<Vec<(TypeId, HandlerId)>> {
        self.bound.remove(&(owner, owner_type))
    }

    /// Forget every bound pair for a destroyed owner. The hub releases the
    /// channel entries through the owner's monitor.
    pub(crate) fn forget_owner(&mut self, owner: OwnerId) {
        self.bound.retain(|(bound_owner, _), _| *bound_owner != owner);
    }

    /// Companion to `SignalHub::unsubscribe_all_of`: the cleared channel
    /// held the only strong handles behind these identities, so they must
    /// never be replayed by a later unbind. A pair whose last record is
    /// purged becomes unbound.
    pub(crate) fn purge_signal(&mut self, signal: TypeId) {
        self.bound.retain(|_, entries| {
            entries.retain(|(bound_signal, _)| *bound_signal != signal);
            !entries.is_empty()
        });
    }

    /// Full reset companion to `SignalHub::unsubscribe_all`. The discovery
    /// cache survives: it is per-type, read-only data.
    pub(crate) fn forget_all_bound(&mut self) {
        self.bound.clear();
    }
}

pub(crate) fn bind<T: Receivers>(hub: &SignalHub, owner: OwnerId, instance: &Rc<T>) {
    let owner_type = TypeId::of::<T>();
    if hub.inner.borrow().binder.is_bound(owner, owner_type) {
        debug!(owner = %owner, owner_type = type_name::<T>(), "bind: already bound");
        return;
    }
    let set = receiver_set::<T>(hub);
    if set.receivers.is_empty() {
        warn!(
            owner_type = type_name::<T>(),
            "bind: no valid receiver declarations"
        );
    }
    let weak = Rc::downgrade(instance);
    let mut entries = Vec::with_capacity(set.receivers.len());
    for receiver in &set.receivers {
        let id = (receiver.bind_one)(hub, owner, weak.clone());
        debug!(
            method = receiver.name,
            signal = receiver.signal_name,
            priority = receiver.priority,
            "receiver bound"
        );
        entries.push((receiver.signal, id));
    }
    debug!(
        owner = %owner,
        owner_type = type_name::<T>(),
        receivers = entries.len(),
        "bound receivers"
    );
    hub.inner
        .borrow_mut()
        .binder
        .mark_bound(owner, owner_type, entries);
}

pub(crate) fn unbind<T: Receivers>(hub: &SignalHub, owner: OwnerId) {
    let taken = hub
        .inner
        .borrow_mut()
        .binder
        .take_bound(owner, TypeId::of::<T>());
    let Some(entries) = taken else {
        debug!(owner = %owner, owner_type = type_name::<T>(), "unbind: not bound");
        return;
    };
    let inner = &mut *hub.inner.borrow_mut();
    for (signal, handler_id) in entries {
        if let Some(monitor) = inner.monitor_mut(owner) {
            monitor.remove_receiver(handler_id);
        }
        inner.remove_channel_entry(signal, owner, handler_id);
    }
    inner.drop_monitor_if_empty(owner);
}

/// Fetch the cached receiver set for `T`, running discovery on first use.
/// Discovery executes user declaration code, so it runs with no hub borrow
/// held.
fn receiver_set<T: Receivers>(hub: &SignalHub) -> Rc<ReceiverSet<T>> {
    if let Some(set) = hub.inner.borrow().binder.cached::<T>() {
        return set;
    }
    let set = Rc::new(ReceiverSet::<T>::discover());
    let stored: Rc<dyn Any> = Rc::clone(&set) as Rc<dyn Any>;
    hub.inner
        .borrow_mut()
        .binder
        .cache
        .insert(TypeId::of::<T>(), stored);
    set
}

//! Property-based invariant tests for the dispatch registry.
//!
//! These verify the bookkeeping and ordering properties that must hold for
//! **any** sequence of operations:
//!
//! 1. `subscriber_count` always equals the number of currently-live
//!    entries, across arbitrary subscribe/unsubscribe/destroy/bulk-clear
//!    sequences (checked after every step).
//! 2. Dispatch order is exactly the model's stable sort: descending
//!    priority, ties in subscription order.
//! 3. A filtered publish invokes exactly the admitted subset of the
//!    unfiltered invocation sequence, in the same relative order.
//! 4. Re-subscribing a live handle never changes the entry count.

use std::cell::RefCell;
use std::rc::Rc;

use proptest::prelude::*;
use sigmux::{OwnerId, Signal, SignalHandler, SignalHub};

struct Ping;
impl Signal for Ping {}

#[derive(Debug, Clone)]
enum Op {
    Subscribe { owner: u8, priority: i8 },
    Unsubscribe { index: u8 },
    Destroy { owner: u8 },
    BulkClear,
}

fn op_strategy() -> impl Strategy<Value = Op> {
    prop_oneof![
        4 => (0u8..8, any::<i8>()).prop_map(|(owner, priority)| Op::Subscribe { owner, priority }),
        2 => (any::<u8>()).prop_map(|index| Op::Unsubscribe { index }),
        1 => (0u8..8).prop_map(|owner| Op::Destroy { owner }),
        1 => Just(Op::BulkClear),
    ]
}

struct ModelEntry {
    owner: OwnerId,
    handler: SignalHandler<Ping>,
    alive: bool,
}

proptest! {
    /// Count bookkeeping matches a naive model after every operation.
    #[test]
    fn subscriber_count_matches_model(ops in proptest::collection::vec(op_strategy(), 0..64)) {
        let hub = SignalHub::new();
        let mut model: Vec<ModelEntry> = Vec::new();

        for op in ops {
            match op {
                Op::Subscribe { owner, priority } => {
                    let owner = OwnerId::new(u64::from(owner));
                    let handler = hub.subscribe_fn(owner, i32::from(priority), |_: &Ping| {});
                    model.push(ModelEntry { owner, handler, alive: true });
                }
                Op::Unsubscribe { index } => {
                    if !model.is_empty() {
                        let len = model.len();
                        let entry = &mut model[usize::from(index) % len];
                        // Unsubscribing an already-dead entry is a no-op on
                        // both sides.
                        hub.unsubscribe(entry.owner, &entry.handler);
                        entry.alive = false;
                    }
                }
                Op::Destroy { owner } => {
                    let owner = OwnerId::new(u64::from(owner));
                    hub.owner_destroyed(owner);
                    for entry in &mut model {
                        if entry.owner == owner {
                            entry.alive = false;
                        }
                    }
                }
                Op::BulkClear => {
                    hub.unsubscribe_all_of::<Ping>();
                    for entry in &mut model {
                        entry.alive = false;
                    }
                }
            }
            let live = model.iter().filter(|e| e.alive).count();
            prop_assert_eq!(hub.subscriber_count::<Ping>(), live);
        }

        hub.unsubscribe_all_of::<Ping>();
        prop_assert_eq!(hub.subscriber_count::<Ping>(), 0);
        let _ = model; // keep handler identities alive until the end
    }

    /// Dispatch order is the stable sort of (priority desc, insertion asc).
    #[test]
    fn dispatch_order_is_a_stable_priority_sort(
        priorities in proptest::collection::vec(any::<i8>(), 1..32),
    ) {
        let hub = SignalHub::new();
        let invoked: Rc<RefCell<Vec<usize>>> = Rc::default();

        for (index, priority) in priorities.iter().enumerate() {
            let invoked = Rc::clone(&invoked);
            hub.subscribe_fn(
                OwnerId::new(index as u64),
                i32::from(*priority),
                move |_: &Ping| invoked.borrow_mut().push(index),
            );
        }
        hub.publish(&Ping);

        let mut expected: Vec<usize> = (0..priorities.len()).collect();
        expected.sort_by_key(|&index| std::cmp::Reverse(priorities[index]));
        // sort_by_key is stable: equal priorities keep insertion order.
        prop_assert_eq!(&*invoked.borrow(), &expected);
    }

    /// The filtered invocation sequence is exactly the admitted
    /// subsequence of the unfiltered one.
    #[test]
    fn filtered_publish_is_an_ordered_subsequence(
        priorities in proptest::collection::vec(any::<i8>(), 1..24),
        admitted_mask in any::<u32>(),
    ) {
        let hub = SignalHub::new();
        let invoked: Rc<RefCell<Vec<usize>>> = Rc::default();

        for (index, priority) in priorities.iter().enumerate() {
            let invoked = Rc::clone(&invoked);
            hub.subscribe_fn(
                OwnerId::new(index as u64),
                i32::from(*priority),
                move |_: &Ping| invoked.borrow_mut().push(index),
            );
        }

        hub.publish(&Ping);
        let unfiltered = invoked.borrow().clone();
        invoked.borrow_mut().clear();

        let admit = move |owner: OwnerId| admitted_mask & (1 << (owner.raw() % 32)) != 0;
        hub.publish_filtered(&Ping, &[&admit]);
        let filtered = invoked.borrow().clone();

        let expected: Vec<usize> = unfiltered
            .iter()
            .copied()
            .filter(|&index| admit(OwnerId::new(index as u64)))
            .collect();
        prop_assert_eq!(filtered, expected);
    }

    /// Re-subscribing a live handle replaces; the count never grows.
    #[test]
    fn resubscribe_never_duplicates(
        priorities in proptest::collection::vec(any::<i8>(), 1..16),
    ) {
        let hub = SignalHub::new();
        let owner = OwnerId::new(1);
        let handler = SignalHandler::new(|_: &Ping| {});

        for priority in priorities {
            hub.subscribe(owner, handler.clone(), i32::from(priority));
            prop_assert_eq!(hub.subscriber_count::<Ping>(), 1);
        }
    }
}

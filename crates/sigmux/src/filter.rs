//! Publish-time delivery filters.
//!
//! A filter is a predicate over an entry's owner, supplied at the publish
//! call site and never stored in the hub. During a filtered publish every
//! filter is evaluated against each snapshot entry's own recorded owner,
//! immediately before that entry's invocation; an entry is invoked only if
//! all filters admit it (logical AND).

use crate::owner::OwnerId;

/// Predicate over an owner identity, evaluated fresh per publish call.
pub trait SignalFilter {
    /// Whether an entry belonging to `owner` should be invoked.
    fn admits(&self, owner: OwnerId) -> bool;
}

impl<F> SignalFilter for F
where
    F: Fn(OwnerId) -> bool,
{
    fn admits(&self, owner: OwnerId) -> bool {
        self(owner)
    }
}

/// Admits exactly one owner.
#[derive(Debug, Clone, Copy)]
pub struct OwnerIs(pub OwnerId);

impl SignalFilter for OwnerIs {
    fn admits(&self, owner: OwnerId) -> bool {
        self.0 == owner
    }
}

/// Admits any owner in the slice.
#[derive(Debug, Clone, Copy)]
pub struct OwnerIn<'a>(pub &'a [OwnerId]);

impl SignalFilter for OwnerIn<'_> {
    fn admits(&self, owner: OwnerId) -> bool {
        self.0.contains(&owner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn closure_is_a_filter() {
        let even = |owner: OwnerId| owner.raw() % 2 == 0;
        assert!(even.admits(OwnerId::new(4)));
        assert!(!even.admits(OwnerId::new(5)));
    }

    #[test]
    fn owner_is_matches_exactly_one() {
        let filter = OwnerIs(OwnerId::new(3));
        assert!(filter.admits(OwnerId::new(3)));
        assert!(!filter.admits(OwnerId::new(4)));
    }

    #[test]
    fn owner_in_matches_membership() {
        let allowed = [OwnerId::new(1), OwnerId::new(9)];
        let filter = OwnerIn(&allowed);
        assert!(filter.admits(OwnerId::new(9)));
        assert!(!filter.admits(OwnerId::new(2)));
    }
}

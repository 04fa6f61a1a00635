use std::collections::BTreeMap;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObservedSnapshot<V, C: Ord, A> {
    pub visibility: V,
    pub amounts: BTreeMap<C, A>,
    pub aux_count: usize,
}

impl<V, C: Ord, A> ObservedSnapshot<V, C, A> {
    pub fn new(visibility: V) -> Self {
        Self {
            visibility,
            amounts: BTreeMap::new(),
            aux_count: 0,
        }
    }
}

/// True when any observed input differs from what was last applied.
///
/// A category present in `previous` but absent from `fresh` counts as a
/// difference, as does any size change of the category mapping.
pub fn needs_refresh<V, C, A>(
    previous: &ObservedSnapshot<V, C, A>,
    fresh: &ObservedSnapshot<V, C, A>,
) -> bool
where
    V: PartialEq,
    C: Ord,
    A: PartialEq,
{
    if previous.visibility != fresh.visibility || previous.aux_count != fresh.aux_count {
        return true;
    }
    if previous.amounts.len() != fresh.amounts.len() {
        return true;
    }
    previous
        .amounts
        .iter()
        .any(|(category, amount)| fresh.amounts.get(category) != Some(amount))
}

/// Holds one entity's applied snapshot and replaces it wholesale whenever a
/// fresh observation requires a refresh.
#[derive(Debug, Clone)]
pub struct ChangeDetector<V, C: Ord, A> {
    applied: ObservedSnapshot<V, C, A>,
}

impl<V, C, A> ChangeDetector<V, C, A>
where
    V: PartialEq,
    C: Ord,
    A: PartialEq,
{
    pub fn new(initial: ObservedSnapshot<V, C, A>) -> Self {
        Self { applied: initial }
    }

    pub fn applied(&self) -> &ObservedSnapshot<V, C, A> {
        &self.applied
    }

    /// Returns true (and stores `fresh`) when the entity must be redrawn.
    /// Otherwise the stored snapshot is left untouched.
    pub fn observe(&mut self, fresh: ObservedSnapshot<V, C, A>) -> bool {
        if !needs_refresh(&self.applied, &fresh) {
            return false;
        }
        self.applied = fresh;
        true
    }

    pub fn reset(&mut self, snapshot: ObservedSnapshot<V, C, A>) {
        self.applied = snapshot;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    enum Reveal {
        Hidden,
        Revealed,
    }

    fn snapshot(
        visibility: Reveal,
        amounts: &[(&'static str, i32)],
        aux_count: usize,
    ) -> ObservedSnapshot<Reveal, &'static str, i32> {
        ObservedSnapshot {
            visibility,
            amounts: amounts.iter().copied().collect(),
            aux_count,
        }
    }

    #[test]
    fn identical_snapshots_need_no_refresh() {
        let prev = snapshot(Reveal::Revealed, &[("food", 3), ("gold", 2)], 1);
        let fresh = prev.clone();
        assert!(!needs_refresh(&prev, &fresh));
    }

    #[test]
    fn changed_amount_needs_refresh() {
        let prev = snapshot(Reveal::Revealed, &[("food", 3), ("gold", 2)], 0);
        let fresh = snapshot(Reveal::Revealed, &[("food", 3), ("gold", 5)], 0);

        let mut detector = ChangeDetector::new(prev);
        assert!(detector.observe(fresh.clone()));
        assert_eq!(detector.applied(), &fresh);
    }

    #[test]
    fn hidden_to_revealed_with_empty_amounts_needs_refresh() {
        let prev = snapshot(Reveal::Hidden, &[], 0);
        let fresh = snapshot(Reveal::Revealed, &[], 0);
        assert!(needs_refresh(&prev, &fresh));
    }

    #[test]
    fn aux_count_or_mapping_size_change_needs_refresh() {
        let prev = snapshot(Reveal::Revealed, &[("food", 1)], 0);
        assert!(needs_refresh(&prev, &snapshot(Reveal::Revealed, &[("food", 1)], 1)));
        assert!(needs_refresh(
            &prev,
            &snapshot(Reveal::Revealed, &[("food", 1), ("production", 1)], 0)
        ));
    }

    #[test]
    fn swapped_category_with_same_size_needs_refresh() {
        let prev = snapshot(Reveal::Revealed, &[("food", 2)], 0);
        let fresh = snapshot(Reveal::Revealed, &[("science", 2)], 0);
        assert!(needs_refresh(&prev, &fresh));
    }

    #[test]
    fn unchanged_observation_keeps_snapshot() {
        let prev = snapshot(Reveal::Revealed, &[("food", 3)], 2);
        let mut detector = ChangeDetector::new(prev.clone());

        assert!(!detector.observe(prev.clone()));
        assert_eq!(detector.applied(), &prev);
    }
}

//! Selection and catch reconciliation for one encounter batch.
//!
//! Confirming a catch is split in two so the persistence call can be
//! awaited outside any borrow of the reconciler: [`CatchReconciler::begin_confirm`]
//! takes the single-flight guard and hands back a [`CatchRequest`];
//! [`CatchReconciler::finish_confirm`] applies the result and releases the
//! guard. While a request is out, selection is frozen and further
//! confirmations are no-ops.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use crate::encounter::EncounterBatch;
use crate::error::PersistenceError;

/// Maximum items claimable from one batch, from the work length.
pub fn catch_capacity(work_minutes: u32) -> usize {
    if work_minutes >= 40 {
        3
    } else if work_minutes >= 30 {
        2
    } else {
        1
    }
}

/// What the persistence call needs to record one catch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatchRequest {
    pub batch_id: u64,
    pub indices: Vec<usize>,
    pub names: Vec<String>,
    pub experience: u32,
}

/// How a finished confirmation was applied.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CatchOutcome {
    /// Selected indices moved into the caught set.
    Caught { indices: Vec<usize> },
    /// Persistence failed; the selection is still there to retry.
    Failed { message: String },
    /// The batch was replaced while the call was pending.
    Stale,
}

#[derive(Debug, Clone)]
pub struct CatchReconciler {
    batch_id: u64,
    item_names: Vec<String>,
    experience: u32,
    capacity: usize,
    selected: BTreeSet<usize>,
    caught: BTreeSet<usize>,
    in_flight: Option<u64>,
}

impl CatchReconciler {
    pub fn new(work_minutes: u32) -> Self {
        Self {
            batch_id: 0,
            item_names: Vec::new(),
            experience: 0,
            capacity: catch_capacity(work_minutes),
            selected: BTreeSet::new(),
            caught: BTreeSet::new(),
            in_flight: None,
        }
    }

    /// Start over with a new batch (or an empty one for a work phase).
    ///
    /// A confirmation still in flight keeps its guard; it is released when
    /// its result arrives and is then treated as stale.
    pub fn reset(&mut self, batch: &EncounterBatch) {
        self.batch_id = batch.id;
        self.item_names = batch.items.iter().map(|i| i.name.clone()).collect();
        self.experience = batch.experience;
        self.selected.clear();
        self.caught.clear();
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn batch_id(&self) -> u64 {
        self.batch_id
    }

    pub fn selected(&self) -> &BTreeSet<usize> {
        &self.selected
    }

    pub fn caught(&self) -> &BTreeSet<usize> {
        &self.caught
    }

    pub fn is_saving(&self) -> bool {
        self.in_flight.is_some()
    }

    /// Slots still open for selection in this batch.
    pub fn remaining_capacity(&self) -> usize {
        self.capacity
            .saturating_sub(self.caught.len() + self.selected.len())
    }

    /// Flip selection of `index`. Returns true if the selection changed.
    pub fn toggle_selection(&mut self, index: usize) -> bool {
        if self.in_flight.is_some()
            || index >= self.item_names.len()
            || self.caught.contains(&index)
        {
            return false;
        }
        if self.selected.remove(&index) {
            return true;
        }
        if self.remaining_capacity() == 0 {
            return false;
        }
        self.selected.insert(index)
    }

    /// Take the single-flight guard and describe the persistence call.
    ///
    /// Returns `None` when there is nothing selected or a confirmation is
    /// already pending.
    pub fn begin_confirm(&mut self) -> Option<CatchRequest> {
        if self.selected.is_empty() || self.in_flight.is_some() {
            return None;
        }
        self.in_flight = Some(self.batch_id);
        let indices: Vec<usize> = self.selected.iter().copied().collect();
        let names = indices
            .iter()
            .filter_map(|i| self.item_names.get(*i).cloned())
            .collect();
        Some(CatchRequest {
            batch_id: self.batch_id,
            indices,
            names,
            experience: self.experience,
        })
    }

    /// Apply the persistence result for `request` and release the guard.
    pub fn finish_confirm(
        &mut self,
        request: &CatchRequest,
        result: Result<(), PersistenceError>,
    ) -> CatchOutcome {
        self.in_flight = None;
        if request.batch_id != self.batch_id {
            return CatchOutcome::Stale;
        }
        match result {
            Ok(()) => {
                for index in &request.indices {
                    self.selected.remove(index);
                    self.caught.insert(*index);
                }
                CatchOutcome::Caught {
                    indices: request.indices.clone(),
                }
            }
            Err(e) => CatchOutcome::Failed {
                message: e.to_string(),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::encounter::{Category, EncounterItem};
    use proptest::prelude::*;

    fn batch(id: u64, n: usize) -> EncounterBatch {
        EncounterBatch {
            id,
            items: (0..n)
                .map(|i| EncounterItem {
                    name: format!("Mon{i}"),
                    category: Category::Fire,
                })
                .collect(),
            experience: 100,
        }
    }

    #[test]
    fn capacity_thresholds() {
        assert_eq!(catch_capacity(0), 1);
        assert_eq!(catch_capacity(29), 1);
        assert_eq!(catch_capacity(30), 2);
        assert_eq!(catch_capacity(39), 2);
        assert_eq!(catch_capacity(40), 3);
        assert_eq!(catch_capacity(120), 3);
    }

    #[test]
    fn toggle_respects_capacity() {
        let mut r = CatchReconciler::new(35);
        r.reset(&batch(1, 3));
        assert!(r.toggle_selection(0));
        assert!(r.toggle_selection(1));
        assert!(!r.toggle_selection(2));
        assert_eq!(r.selected().len(), 2);
    }

    #[test]
    fn toggle_twice_deselects() {
        let mut r = CatchReconciler::new(45);
        r.reset(&batch(1, 4));
        assert!(r.toggle_selection(2));
        assert!(r.toggle_selection(2));
        assert!(r.selected().is_empty());
    }

    #[test]
    fn out_of_range_index_is_ignored() {
        let mut r = CatchReconciler::new(45);
        r.reset(&batch(1, 2));
        assert!(!r.toggle_selection(5));
    }

    #[test]
    fn confirm_moves_selection_to_caught() {
        let mut r = CatchReconciler::new(40);
        r.reset(&batch(1, 4));
        r.toggle_selection(1);
        r.toggle_selection(3);
        let req = r.begin_confirm().unwrap();
        assert_eq!(req.names, vec!["Mon1".to_string(), "Mon3".to_string()]);
        assert_eq!(req.experience, 100);
        assert!(r.is_saving());

        let outcome = r.finish_confirm(&req, Ok(()));
        assert_eq!(outcome, CatchOutcome::Caught { indices: vec![1, 3] });
        assert!(r.selected().is_empty());
        assert_eq!(r.caught().len(), 2);
        assert!(!r.is_saving());
        assert!(!r.toggle_selection(1));
    }

    #[test]
    fn second_begin_while_pending_is_noop() {
        let mut r = CatchReconciler::new(30);
        r.reset(&batch(1, 3));
        r.toggle_selection(0);
        assert!(r.begin_confirm().is_some());
        assert!(r.begin_confirm().is_none());
        assert!(!r.toggle_selection(1));
    }

    #[test]
    fn failure_releases_guard_and_keeps_selection() {
        let mut r = CatchReconciler::new(30);
        r.reset(&batch(1, 3));
        r.toggle_selection(0);
        let req = r.begin_confirm().unwrap();
        let outcome = r.finish_confirm(&req, Err(PersistenceError::SaveFailed("offline".into())));
        assert!(matches!(outcome, CatchOutcome::Failed { .. }));
        assert!(!r.is_saving());
        assert_eq!(r.selected().len(), 1);
        assert!(r.begin_confirm().is_some());
    }

    #[test]
    fn result_for_replaced_batch_is_stale() {
        let mut r = CatchReconciler::new(30);
        r.reset(&batch(1, 3));
        r.toggle_selection(0);
        let req = r.begin_confirm().unwrap();
        r.reset(&EncounterBatch::default());
        assert!(r.is_saving());
        assert_eq!(r.finish_confirm(&req, Ok(())), CatchOutcome::Stale);
        assert!(r.caught().is_empty());
        assert!(!r.is_saving());
    }

    #[test]
    fn caught_items_count_against_capacity() {
        let mut r = CatchReconciler::new(30);
        r.reset(&batch(1, 3));
        r.toggle_selection(0);
        let req = r.begin_confirm().unwrap();
        r.finish_confirm(&req, Ok(()));
        assert!(r.toggle_selection(1));
        assert!(!r.toggle_selection(2));
    }

    #[test]
    fn empty_batch_has_nothing_to_confirm() {
        let mut r = CatchReconciler::new(5);
        r.reset(&batch(1, 0));
        assert!(!r.toggle_selection(0));
        assert!(r.begin_confirm().is_none());
    }

    #[derive(Debug, Clone)]
    enum Op {
        Toggle(usize),
        Begin,
        FinishOk,
        FinishErr,
    }

    fn op() -> impl Strategy<Value = Op> {
        prop_oneof![
            (0usize..6).prop_map(Op::Toggle),
            Just(Op::Begin),
            Just(Op::FinishOk),
            Just(Op::FinishErr),
        ]
    }

    proptest! {
        #[test]
        fn selection_and_caught_stay_disjoint_and_bounded(
            work in 0u32..60,
            ops in proptest::collection::vec(op(), 0..40),
        ) {
            let mut r = CatchReconciler::new(work);
            r.reset(&batch(1, 5));
            let mut pending: Option<CatchRequest> = None;
            for op in ops {
                match op {
                    Op::Toggle(i) => { r.toggle_selection(i); }
                    Op::Begin => {
                        if let Some(req) = r.begin_confirm() {
                            prop_assert!(pending.is_none());
                            pending = Some(req);
                        }
                    }
                    Op::FinishOk => {
                        if let Some(req) = pending.take() {
                            r.finish_confirm(&req, Ok(()));
                        }
                    }
                    Op::FinishErr => {
                        if let Some(req) = pending.take() {
                            r.finish_confirm(&req, Err(PersistenceError::SaveFailed("x".into())));
                        }
                    }
                }
                prop_assert!(r.selected().is_disjoint(r.caught()));
                prop_assert!(r.selected().len() + r.caught().len() <= catch_capacity(work));
            }
        }
    }
}

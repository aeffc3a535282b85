//! Fork-choice scoring
//!
//! Live tips close to the canonical tip are ranked by a distance-weighted
//! penalty: how far each branch has drifted from its burn height, weighted by
//! how far it trails the tallest candidate, plus the drift of every ancestor
//! walked until all branches meet. The lowest penalty is the predicted next
//! canonical tip.

use std::collections::BTreeMap;

use burnscope_common::prelude::*;
use burnscope_common::types::defaults;
use tracing::{debug, instrument};

use crate::canonical::ChainView;
use crate::commit::Commit;

/// Scores competing live tips of a [`ChainView`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ForkScorer {
    max_fork_depth: u64,
}

impl Default for ForkScorer {
    fn default() -> Self {
        Self::new(defaults::MAX_FORK_DEPTH)
    }
}

impl ForkScorer {
    pub fn new(max_fork_depth: u64) -> Self {
        Self { max_fork_depth }
    }

    pub fn max_fork_depth(&self) -> u64 {
        self.max_fork_depth
    }

    /// Live tips within `max_fork_depth` of the canonical tip, ordered by hash.
    /// Empty when the canonical tip itself has no resolved height.
    pub fn candidates<'a>(&self, view: &'a ChainView) -> Vec<&'a Commit> {
        let Some(tip_height) = view.resolved_height(view.canonical_tip()) else {
            return Vec::new();
        };
        let floor = tip_height.saturating_sub(self.max_fork_depth);

        let mut candidates: Vec<&Commit> = view
            .entries()
            .filter(|(_, marks)| {
                marks.potential_tip && marks.resolved_height.is_some_and(|h| h >= floor)
            })
            .map(|(commit, _)| commit)
            .collect();
        candidates.sort_by(|a, b| a.block_header_hash.cmp(&b.block_header_hash));
        candidates
    }

    /// Score each tip by walking back to the tips' common ancestor.
    ///
    /// Returns `None` when `tips` is empty or when some branch runs out of
    /// resolved history in the window before the branches meet.
    pub fn score_to_common_ancestor(
        view: &ChainView,
        tips: &[&Commit],
    ) -> Option<BTreeMap<BlockHeaderHash, i64>> {
        let drift = |commit: &Commit| -> Option<i64> {
            let resolved = view.resolved_height(&commit.block_header_hash)?;
            Some(commit.burn_height as i64 - resolved as i64)
        };

        let heights = tips
            .iter()
            .map(|tip| view.resolved_height(&tip.block_header_hash))
            .collect::<Option<Vec<_>>>()?;
        let max_height = *heights.iter().max()? as i64;
        let min_height = *heights.iter().min()?;

        let mut scores = BTreeMap::new();
        let mut pointers: Vec<(&Commit, &Commit)> = Vec::with_capacity(tips.len());

        // Bring every branch down to the lowest candidate height
        for (&tip, &height) in tips.iter().zip(&heights) {
            let mut score = drift(tip)? * (max_height - height as i64);
            let mut pointer = tip;
            while view.resolved_height(&pointer.block_header_hash)? > min_height {
                score += drift(pointer)?;
                pointer = view.graph().parent_of(&pointer.block_header_hash)?;
            }
            scores.insert(tip.block_header_hash.clone(), score);
            pointers.push((tip, pointer));
        }

        // Advance in lock-step until every branch sits on the same commit
        let mut steps = 0usize;
        while pointers
            .iter()
            .any(|(_, pointer)| pointer.block_header_hash != pointers[0].1.block_header_hash)
        {
            for (tip, pointer) in pointers.iter_mut() {
                let current = *pointer;
                *scores.get_mut(&tip.block_header_hash)? += drift(current)?;
                let parent = view.graph().parent_of(&current.block_header_hash)?;
                view.resolved_height(&parent.block_header_hash)?;
                *pointer = parent;
            }
            steps += 1;
        }

        debug!(tips = tips.len(), steps, "Found common ancestor");
        Some(scores)
    }

    /// Predict the next canonical tip and mark it `next_tip`.
    ///
    /// Among the minimal scores the lexicographically smallest block header
    /// hash wins.
    #[instrument(skip(self, view), fields(depth = self.max_fork_depth))]
    pub fn mark_next_tip(&self, view: &mut ChainView) -> Option<BlockHeaderHash> {
        let candidates = self.candidates(view);
        if candidates.is_empty() {
            debug!("No live tips to score");
            return None;
        }

        let Some(scores) = Self::score_to_common_ancestor(view, &candidates) else {
            debug!(
                candidates = candidates.len(),
                "No common ancestor inside window"
            );
            return None;
        };

        let next_tip = scores
            .iter()
            .min_by(|a, b| a.1.cmp(b.1).then_with(|| a.0.cmp(b.0)))
            .map(|(hash, _)| hash.clone())?;

        if let Some(marks) = view.marks_mut(&next_tip) {
            marks.next_tip = true;
        }
        debug!(next_tip = %next_tip, ?scores, "Predicted next tip");
        Some(next_tip)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::CommitGraph;
    use crate::canonical::mark_canonical;
    use crate::memory::{record, MemoryLedger};

    fn view(ledger: &MemoryLedger, start: BurnHeight, span: u64) -> ChainView {
        let graph = CommitGraph::build(ledger, start, span).unwrap();
        mark_canonical(graph, ledger, start).unwrap()
    }

    fn next_tips(view: &ChainView) -> Vec<&str> {
        view.entries()
            .filter(|(_, m)| m.next_tip)
            .map(|(c, _)| c.block_header_hash.as_str())
            .collect()
    }

    /// R at 100, X1 -> X2 built on R at 101/102, Y built on R at 103,
    /// and a stale root Z at 104
    fn branching_ledger() -> MemoryLedger {
        let mut ledger = MemoryLedger::new();
        ledger
            .commit(record("R", "S1", 100, 1, 1000, None))
            .commit(record("X1", "S1", 101, 1, 1000, Some((100, 1))))
            .commit(record("X2", "S1", 102, 1, 1000, Some((101, 1))))
            .commit(record("Y", "S2", 103, 1, 1000, Some((100, 1))))
            .commit(record("Z", "S3", 104, 1, 1000, None))
            .declare_winner(100, "R", 10)
            .declare_winner(101, "X1", 11)
            .declare_winner(102, "X2", 12)
            .declare_winner(103, "Y", 11)
            .declare_winner(104, "Z", 5)
            .tip(104, "X2");
        ledger
    }

    #[test]
    fn test_scenario_predicts_sole_tip() {
        let mut ledger = MemoryLedger::new();
        ledger
            .commit(record("A", "S1", 100, 1, 1000, None))
            .commit(record("B", "S1", 101, 1, 2000, Some((100, 1))))
            .commit(record("C", "S2", 101, 2, 500, Some((100, 1))))
            .commit(record("D", "S1", 102, 1, 3000, Some((101, 1))))
            .commit(record("E", "S3", 102, 2, 100, Some((101, 1))))
            .empty_round(100)
            .declare_winner(101, "B", 50)
            .declare_winner(102, "D", 51)
            .tip(102, "D");
        let mut view = view(&ledger, 102, 2);

        let scorer = ForkScorer::default();
        let candidates: Vec<_> = scorer
            .candidates(&view)
            .iter()
            .map(|c| c.block_header_hash.clone())
            .collect();
        assert_eq!(candidates, vec!["D"]);

        assert_eq!(scorer.mark_next_tip(&mut view).as_deref(), Some("D"));
        assert_eq!(next_tips(&view), vec!["D"]);
        assert_eq!(view.next_tip().unwrap().block_header_hash, "D");
    }

    #[test]
    fn test_single_candidate_needs_no_history() {
        // The only live tip is a window root: nothing to walk
        let mut ledger = MemoryLedger::new();
        ledger
            .commit(record("A", "S1", 100, 1, 1000, None))
            .declare_winner(100, "A", 3)
            .tip(100, "A");
        let mut view = view(&ledger, 100, 1);

        let scores =
            ForkScorer::score_to_common_ancestor(&view, &ForkScorer::default().candidates(&view))
                .unwrap();
        assert_eq!(scores.get("A"), Some(&0));
        assert_eq!(ForkScorer::default().mark_next_tip(&mut view).as_deref(), Some("A"));
    }

    #[test]
    fn test_taller_branch_scores_lower() {
        let ledger = branching_ledger();
        let mut view = view(&ledger, 104, 4);
        let scorer = ForkScorer::new(3);

        let candidates = scorer.candidates(&view);
        let hashes: Vec<_> = candidates.iter().map(|c| c.block_header_hash.as_str()).collect();
        assert_eq!(hashes, vec!["X2", "Y"]);

        let scores = ForkScorer::score_to_common_ancestor(&view, &candidates).unwrap();
        // X2: 0 weight, +90 walking down to 11, +90 for X1 before meeting at R
        assert_eq!(scores.get("X2"), Some(&180));
        // Y: 92 * 1, +92 for itself before meeting at R
        assert_eq!(scores.get("Y"), Some(&184));

        assert_eq!(scorer.mark_next_tip(&mut view).as_deref(), Some("X2"));
        assert_eq!(next_tips(&view), vec!["X2"]);
    }

    #[test]
    fn test_disjoint_branches_give_no_prediction() {
        let ledger = branching_ledger();
        let mut view = view(&ledger, 104, 4);
        let scorer = ForkScorer::new(10);

        // Z is now deep enough to count but shares no ancestor with the others
        assert_eq!(scorer.candidates(&view).len(), 3);
        assert!(scorer.mark_next_tip(&mut view).is_none());
        assert!(next_tips(&view).is_empty());
    }

    #[test]
    fn test_two_roots_give_no_prediction() {
        let mut ledger = MemoryLedger::new();
        ledger
            .commit(record("P", "S1", 100, 1, 1000, None))
            .commit(record("Q", "S2", 101, 1, 1000, None))
            .declare_winner(100, "P", 7)
            .declare_winner(101, "Q", 7)
            .tip(101, "Q");
        let mut view = view(&ledger, 101, 1);

        assert_eq!(ForkScorer::default().candidates(&view).len(), 2);
        assert!(ForkScorer::default().mark_next_tip(&mut view).is_none());
    }

    #[test]
    fn test_ties_break_by_smallest_hash() {
        // bb extends P; aa forks off R at the same height as P
        let mut ledger = MemoryLedger::new();
        ledger
            .commit(record("R", "S1", 100, 1, 1000, None))
            .commit(record("P", "S1", 101, 1, 1000, Some((100, 1))))
            .commit(record("aa", "S2", 102, 1, 1000, Some((100, 1))))
            .commit(record("bb", "S1", 104, 1, 1000, Some((101, 1))))
            .declare_winner(100, "R", 20)
            .declare_winner(101, "P", 21)
            .declare_winner(102, "aa", 21)
            .declare_winner(104, "bb", 22)
            .tip(104, "bb");
        let mut view = view(&ledger, 104, 4);
        let scorer = ForkScorer::default();

        let candidates = scorer.candidates(&view);
        let scores = ForkScorer::score_to_common_ancestor(&view, &candidates).unwrap();
        // aa: 81 * 1, +81 for itself before meeting at R
        // bb: 82 * 0, +82 walking down to P, +80 for P before meeting at R
        assert_eq!(scores["aa"], 162);
        assert_eq!(scores["bb"], 162);

        assert_eq!(scorer.mark_next_tip(&mut view).as_deref(), Some("aa"));
        assert_eq!(next_tips(&view), vec!["aa"]);
    }

    #[test]
    fn test_unresolved_canonical_tip_gives_no_prediction() {
        let mut ledger = MemoryLedger::new();
        ledger
            .commit(record("A", "S1", 100, 1, 1000, None))
            .declare_winner(100, "A", 0)
            .tip(100, "A");
        let mut view = view(&ledger, 100, 1);

        assert!(ForkScorer::default().candidates(&view).is_empty());
        assert!(ForkScorer::default().mark_next_tip(&mut view).is_none());
    }

    #[test]
    fn test_empty_tips_score_nothing() {
        let ledger = branching_ledger();
        let view = view(&ledger, 104, 4);
        assert!(ForkScorer::score_to_common_ancestor(&view, &[]).is_none());
    }
}

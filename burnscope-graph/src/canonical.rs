//! Canonical chain marking
//!
//! Second construction phase. The immutable [`CommitGraph`] is wrapped in a
//! [`ChainView`] together with per-commit [`CommitMarks`]: round winners,
//! live tips, provisional chain heights, post-processing enrichment and the
//! canonical path ending at the externally declared tip.

use std::collections::HashMap;

use burnscope_common::prelude::*;
use tracing::{debug, instrument, warn};

use crate::builder::CommitGraph;
use crate::commit::{Commit, CommitMarks};
use crate::source::RoundOutcomeSource;

/// A commit graph plus everything learned about it from the outcome source
#[derive(Debug, Clone)]
pub struct ChainView {
    graph: CommitGraph,
    marks: HashMap<BlockHeaderHash, CommitMarks>,
    canonical_tip: BlockHeaderHash,
}

impl ChainView {
    pub fn graph(&self) -> &CommitGraph {
        &self.graph
    }

    /// Marks of a commit; every commit of the graph has an entry
    pub fn marks(&self, hash: &str) -> Option<&CommitMarks> {
        self.marks.get(hash)
    }

    pub(crate) fn marks_mut(&mut self, hash: &str) -> Option<&mut CommitMarks> {
        self.marks.get_mut(hash)
    }

    /// Commit paired with its marks
    pub fn entry(&self, hash: &str) -> Option<(&Commit, &CommitMarks)> {
        Some((self.graph.get(hash)?, self.marks.get(hash)?))
    }

    /// All commits with their marks, by burn height then intra-block index
    pub fn entries(&self) -> impl Iterator<Item = (&Commit, &CommitMarks)> {
        self.graph
            .commits_ordered()
            .filter_map(|commit| Some((commit, self.marks.get(&commit.block_header_hash)?)))
    }

    pub fn canonical_tip(&self) -> &str {
        &self.canonical_tip
    }

    pub fn resolved_height(&self, hash: &str) -> Option<ChainHeight> {
        self.marks.get(hash).and_then(|marks| marks.resolved_height)
    }

    /// Canonical commits from the declared tip back to the window root
    pub fn canonical_path(&self) -> Vec<&Commit> {
        self.graph.ancestry(&self.canonical_tip).collect()
    }

    /// The commit predicted to become the next canonical tip, if any
    pub fn next_tip(&self) -> Option<&Commit> {
        self.entries()
            .find(|(_, marks)| marks.next_tip)
            .map(|(commit, _)| commit)
    }

    /// Winner of the round at `height`, if that round had one
    pub fn winner_at(&self, height: BurnHeight) -> Option<&Commit> {
        self.graph
            .commits_at(height)
            .find(|commit| self.marks.get(&commit.block_header_hash).is_some_and(|m| m.won))
    }
}

/// Mark round winners and the canonical chain of a built graph.
///
/// Rounds are visited in ascending burn height over the heights that have
/// commits in the graph. Every such height must have an outcome entry; a
/// declared winner must be one of that height's commits. Missing
/// post-processing data is logged and leaves enrichment at zero.
#[instrument(skip(graph, outcomes), fields(commits = graph.len()))]
pub fn mark_canonical<O>(
    graph: CommitGraph,
    outcomes: &O,
    start_height: BurnHeight,
) -> ScopeResult<ChainView>
where
    O: RoundOutcomeSource + ?Sized,
{
    let mut marks: HashMap<BlockHeaderHash, CommitMarks> = graph
        .commits()
        .map(|commit| (commit.block_header_hash.clone(), CommitMarks::default()))
        .collect();

    let heights: Vec<BurnHeight> = graph.heights().collect();
    for height in heights {
        let outcome = outcomes
            .round_outcome(height)?
            .ok_or(ChainError::MissingRoundOutcome { height })?;

        let winner = match &outcome.winning_txid {
            Some(txid) => Some(
                graph
                    .commits_at(height)
                    .find(|commit| &commit.txid == txid)
                    .ok_or_else(|| ChainError::WinnerNotMaterialized {
                        height,
                        txid: txid.clone(),
                    })?,
            ),
            None => {
                debug!(height, "Round has no winner");
                None
            }
        };

        if let Some(winner) = winner {
            let hash = &winner.block_header_hash;
            if let Some(parent) = winner.parent.as_deref() {
                if let Some(parent_marks) = marks.get_mut(parent) {
                    parent_marks.potential_tip = false;
                }
            }

            let winner_marks = marks
                .get_mut(hash)
                .ok_or_else(|| ScopeError::internal(format!("No marks for commit {}", hash)))?;
            winner_marks.won = true;
            winner_marks.potential_tip = true;

            if outcome.is_processed() {
                winner_marks.resolved_height = Some(outcome.resolved_height);
                match outcomes.processed_block(&outcome.handle)? {
                    Some(block) => {
                        winner_marks.block_hash = Some(block.block_hash);
                        winner_marks.earnings = block.earnings;
                        match block.usage {
                            Some(usage) => winner_marks.usage = usage,
                            None => warn!(
                                height,
                                handle = %outcome.handle,
                                "No resource usage recorded for processed block"
                            ),
                        }
                    }
                    None => warn!(
                        height,
                        handle = %outcome.handle,
                        "No payment recorded for processed round"
                    ),
                }
            }
        }

        let winner_hash = winner.map(|w| w.block_header_hash.as_str());
        for commit in graph.commits_at(height) {
            if Some(commit.block_header_hash.as_str()) == winner_hash {
                continue;
            }
            let parent_height = commit
                .parent
                .as_deref()
                .and_then(|parent| marks.get(parent))
                .and_then(|parent| parent.resolved_height);
            if let Some(parent_height) = parent_height {
                if let Some(commit_marks) = marks.get_mut(&commit.block_header_hash) {
                    commit_marks.resolved_height = Some(parent_height + 1);
                }
            }
        }
    }

    let canonical_tip = outcomes
        .canonical_tip(start_height)?
        .ok_or(ChainError::MissingCanonicalTip {
            height: start_height,
        })?;
    if !graph.contains(&canonical_tip) {
        return Err(ChainError::TipNotMaterialized {
            hash: canonical_tip,
        }
        .into());
    }

    if let Some(tip_marks) = marks.get_mut(&canonical_tip) {
        tip_marks.tip = true;
    }
    let mut path_len = 0usize;
    for commit in graph.ancestry(&canonical_tip) {
        if let Some(commit_marks) = marks.get_mut(&commit.block_header_hash) {
            commit_marks.canonical = true;
            path_len += 1;
        }
    }

    debug!(tip = %canonical_tip, path_len, "Marked canonical chain");

    Ok(ChainView {
        graph,
        marks,
        canonical_tip,
    })
}

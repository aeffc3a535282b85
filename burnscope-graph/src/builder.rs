//! Commit graph construction
//!
//! A single ascending pass over the window's commit records. Each record's
//! declared parent slot `(parent_height, parent_vtxindex)` is resolved against
//! the slots already seen; a miss makes the commit a window root. A parent
//! slot must lie strictly below the commit, except for the `(0, 0)` "no
//! parent" marker.

use std::collections::{BTreeMap, HashMap};

use burnscope_common::prelude::*;
use tracing::{debug, instrument};

use crate::commit::{Commit, CommitRecord};
use crate::source::RecordSource;

/// Arena of commits for one analysis window, keyed by block header hash
#[derive(Debug, Clone, Default)]
pub struct CommitGraph {
    low: BurnHeight,
    high: BurnHeight,
    commits: HashMap<BlockHeaderHash, Commit>,
    round_totals: HashMap<RoundId, Sats>,
    /// Hashes per burn height, in intra-block index order
    heights: BTreeMap<BurnHeight, Vec<BlockHeaderHash>>,
}

impl CommitGraph {
    /// Load and build the window `[start_height - span, start_height]`
    #[instrument(skip(source))]
    pub fn build<S>(source: &S, start_height: BurnHeight, span: u64) -> ScopeResult<Self>
    where
        S: RecordSource + ?Sized,
    {
        let (low, high) = ValidationUtils::validate_window(start_height, span)?;
        let records = source.commits_in_range(low, high)?;
        Self::from_records(low, high, records)
    }

    /// Build from records already in ascending burn height order
    pub fn from_records<I>(low: BurnHeight, high: BurnHeight, records: I) -> ScopeResult<Self>
    where
        I: IntoIterator<Item = CommitRecord>,
    {
        let mut graph = Self {
            low,
            high,
            ..Self::default()
        };
        let mut slots: HashMap<(BurnHeight, u32), BlockHeaderHash> = HashMap::new();
        let mut previous: Option<BurnHeight> = None;

        for record in records {
            let height = record.burn_height;
            if height < low || height > high {
                return Err(ChainError::OutsideWindow { height, low, high }.into());
            }
            if let Some(previous) = previous {
                if height < previous {
                    return Err(ChainError::OutOfOrder { height, previous }.into());
                }
            }
            previous = Some(height);

            let slot = (height, record.vtxindex);
            if slots.contains_key(&slot) {
                return Err(ChainError::DuplicateSlot {
                    height,
                    vtxindex: record.vtxindex,
                }
                .into());
            }
            if graph.commits.contains_key(&record.block_header_hash) {
                return Err(ChainError::DuplicateCommit {
                    hash: record.block_header_hash,
                }
                .into());
            }

            let parent_slot = (record.parent_height, record.parent_vtxindex);
            if record.parent_height >= height && parent_slot != (0, 0) {
                return Err(ChainError::ParentNotBelow {
                    hash: record.block_header_hash,
                    height,
                    parent_height: record.parent_height,
                }
                .into());
            }

            let parent = slots
                .get(&parent_slot)
                .cloned();

            let hash = record.block_header_hash.clone();
            *graph.round_totals.entry(record.round_id.clone()).or_insert(0) += record.spend;
            slots.insert(slot, hash.clone());
            graph.heights.entry(height).or_default().push(hash.clone());
            graph.commits.insert(hash, Commit::from_record(record, parent));
        }

        debug!(
            commits = graph.commits.len(),
            rounds = graph.round_totals.len(),
            low,
            high,
            "Built commit graph"
        );

        Ok(graph)
    }

    /// Inclusive burn height bounds of the window
    pub fn window(&self) -> (BurnHeight, BurnHeight) {
        (self.low, self.high)
    }

    pub fn get(&self, hash: &str) -> Option<&Commit> {
        self.commits.get(hash)
    }

    pub fn contains(&self, hash: &str) -> bool {
        self.commits.contains_key(hash)
    }

    pub fn len(&self) -> usize {
        self.commits.len()
    }

    pub fn is_empty(&self) -> bool {
        self.commits.is_empty()
    }

    /// Commits in unspecified order
    pub fn commits(&self) -> impl Iterator<Item = &Commit> {
        self.commits.values()
    }

    /// Commits ordered by burn height, then intra-block index
    pub fn commits_ordered(&self) -> impl Iterator<Item = &Commit> {
        self.heights
            .values()
            .flatten()
            .filter_map(|hash| self.commits.get(hash))
    }

    /// Burn heights that have at least one commit, ascending
    pub fn heights(&self) -> impl Iterator<Item = BurnHeight> + '_ {
        self.heights.keys().copied()
    }

    /// Number of distinct burn heights with commits
    pub fn block_count(&self) -> usize {
        self.heights.len()
    }

    /// Commits at one burn height, in intra-block index order
    pub fn commits_at(&self, height: BurnHeight) -> impl Iterator<Item = &Commit> {
        self.heights
            .get(&height)
            .into_iter()
            .flatten()
            .filter_map(|hash| self.commits.get(hash))
    }

    /// Parent of a commit, if it lies inside the window
    pub fn parent_of(&self, hash: &str) -> Option<&Commit> {
        self.commits
            .get(hash)
            .and_then(|commit| commit.parent.as_deref())
            .and_then(|parent| self.commits.get(parent))
    }

    /// Walk from `hash` (inclusive) towards the window root
    pub fn ancestry<'a>(&'a self, hash: &str) -> impl Iterator<Item = &'a Commit> + 'a {
        let mut next = self.commits.get(hash);
        std::iter::from_fn(move || {
            let current = next?;
            next = current
                .parent
                .as_deref()
                .and_then(|parent| self.commits.get(parent));
            Some(current)
        })
    }

    /// Total spend of all commits in a round
    pub fn round_total(&self, round_id: &str) -> Sats {
        self.round_totals.get(round_id).copied().unwrap_or(0)
    }

    pub fn round_totals(&self) -> &HashMap<RoundId, Sats> {
        &self.round_totals
    }
}

//! Read-only data source traits
//!
//! The analysis core never talks to a database directly. Each run is handed
//! implementations of these traits: the SQLite store in production, the
//! scripted [`MemoryLedger`](crate::memory::MemoryLedger) in tests.

use burnscope_common::prelude::*;
use serde::{Deserialize, Serialize};

use crate::commit::{CommitRecord, ProcessedBlock};

/// Ordered source of raw block-commit records
pub trait RecordSource {
    /// All commits with `low <= burn_height <= high`, ascending by burn height
    /// and then by intra-block index
    fn commits_in_range(&self, low: BurnHeight, high: BurnHeight)
        -> ScopeResult<Vec<CommitRecord>>;
}

/// The declared outcome of one round
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoundOutcome {
    /// `None` when the round had no winner
    pub winning_txid: Option<Txid>,
    /// Chain height of the winning block; 0 until the block is processed
    pub resolved_height: ChainHeight,
    /// Handle used to fetch post-processing results
    pub handle: ConsensusHash,
}

impl RoundOutcome {
    pub fn is_processed(&self) -> bool {
        self.resolved_height > 0
    }
}

/// Authoritative, height-indexed view of round winners and the chain tip
pub trait RoundOutcomeSource {
    /// Outcome of the round at `height`, `None` if the source has no entry
    fn round_outcome(&self, height: BurnHeight) -> ScopeResult<Option<RoundOutcome>>;

    /// Header hash of the declared canonical tip as of `height`
    fn canonical_tip(&self, height: BurnHeight) -> ScopeResult<Option<BlockHeaderHash>>;

    /// Earnings and resource usage for a processed round
    fn processed_block(&self, handle: &ConsensusHash) -> ScopeResult<Option<ProcessedBlock>>;
}

/// Burn-fee lookup for commit transactions
pub trait FeeSource {
    /// Fee paid by the commit transaction, `None` when unknown
    fn burn_fee(&self, txid: &Txid) -> ScopeResult<Option<Sats>>;
}

/// Fee source that knows no fees
#[derive(Debug, Clone, Copy, Default)]
pub struct NoFees;

impl FeeSource for NoFees {
    fn burn_fee(&self, _txid: &Txid) -> ScopeResult<Option<Sats>> {
        Ok(None)
    }
}

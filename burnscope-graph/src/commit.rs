//! Commit data model
//!
//! A [`Commit`] carries the immutable fields read from the ledger. Everything
//! learned afterwards (round winners, chain positions, earnings) lives in a
//! separate [`CommitMarks`] value owned by the chain view, so the graph built
//! in the first pass is never mutated.

use burnscope_common::prelude::*;
use std::fmt;

/// A raw block-commit row as delivered by a [`RecordSource`](crate::source::RecordSource)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommitRecord {
    pub block_header_hash: BlockHeaderHash,
    pub txid: Txid,
    pub sender: Address,
    pub round_id: RoundId,
    pub vtxindex: u32,
    pub burn_height: BurnHeight,
    pub spend: Sats,
    pub parent_height: BurnHeight,
    pub parent_vtxindex: u32,
}

/// A leader's block-commit, resolved against the other commits of its window
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Commit {
    pub block_header_hash: BlockHeaderHash,
    pub txid: Txid,
    pub sender: Address,
    pub round_id: RoundId,
    pub vtxindex: u32,
    pub burn_height: BurnHeight,
    pub spend: Sats,
    /// Parent commit within the same window; `None` marks a window root
    pub parent: Option<BlockHeaderHash>,
}

impl Commit {
    pub(crate) fn from_record(record: CommitRecord, parent: Option<BlockHeaderHash>) -> Self {
        Self {
            block_header_hash: record.block_header_hash,
            txid: record.txid,
            sender: record.sender,
            round_id: record.round_id,
            vtxindex: record.vtxindex,
            burn_height: record.burn_height,
            spend: record.spend,
            parent,
        }
    }

    /// Short form of the header hash for logs
    pub fn short_hash(&self) -> &str {
        self.block_header_hash
            .get(..8)
            .unwrap_or(&self.block_header_hash)
    }
}

impl fmt::Display for Commit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Commit({}, burn height {}, spend {})",
            self.short_hash(),
            self.burn_height,
            self.spend
        )
    }
}

/// Rewards paid to the miner of a processed block
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Earnings {
    pub coinbase: MicroUnits,
    pub fees: MicroUnits,
}

impl Earnings {
    pub fn total(&self) -> MicroUnits {
        self.coinbase + self.fees
    }
}

/// Execution cost and size of a processed block
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceUsage {
    pub read_length: u64,
    pub read_count: u64,
    pub write_length: u64,
    pub write_count: u64,
    pub runtime: u64,
    pub block_size: u64,
}

impl ResourceUsage {
    /// Percentage of the tightest ceiling consumed, rounded to two decimals
    pub fn fullness(&self, limits: &CostLimits) -> f64 {
        let ratio = |used: u64, limit: u64| {
            if limit == 0 {
                0.0
            } else {
                used as f64 / limit as f64
            }
        };

        let fullness = [
            ratio(self.read_length, limits.read_length),
            ratio(self.read_count, limits.read_count),
            ratio(self.write_length, limits.write_length),
            ratio(self.write_count, limits.write_count),
            ratio(self.runtime, limits.runtime),
            ratio(self.block_size, limits.size),
        ]
        .into_iter()
        .fold(0.0_f64, f64::max);

        (fullness * 10_000.0).round() / 100.0
    }
}

/// Post-processing results for a round whose winner has been processed
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessedBlock {
    pub block_hash: String,
    pub earnings: Earnings,
    /// Cost data may lag behind payments; absent means "not yet recorded"
    pub usage: Option<ResourceUsage>,
}

/// Enrichment attached to a commit by the canonical marker and fork scorer
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CommitMarks {
    pub won: bool,
    pub potential_tip: bool,
    pub next_tip: bool,
    pub canonical: bool,
    pub tip: bool,
    pub resolved_height: Option<ChainHeight>,
    pub block_hash: Option<String>,
    pub earnings: Earnings,
    pub usage: ResourceUsage,
}

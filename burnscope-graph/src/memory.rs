//! In-memory ledger
//!
//! A scripted implementation of every source trait. Used to exercise the
//! analysis core without a node's databases.

use std::collections::{BTreeMap, HashMap};

use burnscope_common::prelude::*;

use crate::commit::{CommitRecord, ProcessedBlock};
use crate::source::{FeeSource, RecordSource, RoundOutcome, RoundOutcomeSource};

/// Build a commit record with conventional ids: txid `tx-<hash>` and round
/// `round-<height>`. A `parent` of `None` points at the null slot `(0, 0)`.
pub fn record(
    hash: &str,
    sender: &str,
    burn_height: BurnHeight,
    vtxindex: u32,
    spend: Sats,
    parent: Option<(BurnHeight, u32)>,
) -> CommitRecord {
    let (parent_height, parent_vtxindex) = parent.unwrap_or((0, 0));
    CommitRecord {
        block_header_hash: hash.to_string(),
        txid: format!("tx-{}", hash),
        sender: sender.to_string(),
        round_id: format!("round-{}", burn_height),
        vtxindex,
        burn_height,
        spend,
        parent_height,
        parent_vtxindex,
    }
}

/// Handle under which the outcome of `height` is recorded
pub fn handle_for(height: BurnHeight) -> ConsensusHash {
    format!("ch-{}", height)
}

#[derive(Debug, Clone, Default)]
pub struct MemoryLedger {
    records: Vec<CommitRecord>,
    outcomes: BTreeMap<BurnHeight, RoundOutcome>,
    tips: BTreeMap<BurnHeight, BlockHeaderHash>,
    processed: HashMap<ConsensusHash, ProcessedBlock>,
    fees: HashMap<Txid, Sats>,
}

impl MemoryLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn commit(&mut self, record: CommitRecord) -> &mut Self {
        self.records.push(record);
        self
    }

    /// Declare the commit `hash` as winner of its round. A `resolved_height`
    /// of 0 leaves the round unprocessed.
    pub fn declare_winner(
        &mut self,
        height: BurnHeight,
        hash: &str,
        resolved_height: ChainHeight,
    ) -> &mut Self {
        let txid = self
            .records
            .iter()
            .find(|r| r.block_header_hash == hash)
            .map(|r| r.txid.clone())
            .unwrap_or_else(|| format!("tx-{}", hash));
        self.outcome(
            height,
            RoundOutcome {
                winning_txid: Some(txid),
                resolved_height,
                handle: handle_for(height),
            },
        )
    }

    /// Record a round that had no winner
    pub fn empty_round(&mut self, height: BurnHeight) -> &mut Self {
        self.outcome(
            height,
            RoundOutcome {
                winning_txid: None,
                resolved_height: 0,
                handle: handle_for(height),
            },
        )
    }

    pub fn outcome(&mut self, height: BurnHeight, outcome: RoundOutcome) -> &mut Self {
        self.outcomes.insert(height, outcome);
        self
    }

    pub fn tip(&mut self, height: BurnHeight, hash: &str) -> &mut Self {
        self.tips.insert(height, hash.to_string());
        self
    }

    /// Attach post-processing results to the round at `height`
    pub fn processed(&mut self, height: BurnHeight, block: ProcessedBlock) -> &mut Self {
        self.processed.insert(handle_for(height), block);
        self
    }

    pub fn fee(&mut self, txid: &str, fee: Sats) -> &mut Self {
        self.fees.insert(txid.to_string(), fee);
        self
    }
}

impl RecordSource for MemoryLedger {
    fn commits_in_range(
        &self,
        low: BurnHeight,
        high: BurnHeight,
    ) -> ScopeResult<Vec<CommitRecord>> {
        let mut records: Vec<_> = self
            .records
            .iter()
            .filter(|r| r.burn_height >= low && r.burn_height <= high)
            .cloned()
            .collect();
        records.sort_by_key(|r| (r.burn_height, r.vtxindex));
        Ok(records)
    }
}

impl RoundOutcomeSource for MemoryLedger {
    fn round_outcome(&self, height: BurnHeight) -> ScopeResult<Option<RoundOutcome>> {
        Ok(self.outcomes.get(&height).cloned())
    }

    fn canonical_tip(&self, height: BurnHeight) -> ScopeResult<Option<BlockHeaderHash>> {
        Ok(self.tips.get(&height).cloned())
    }

    fn processed_block(&self, handle: &ConsensusHash) -> ScopeResult<Option<ProcessedBlock>> {
        Ok(self.processed.get(handle).cloned())
    }
}

impl FeeSource for MemoryLedger {
    fn burn_fee(&self, txid: &Txid) -> ScopeResult<Option<Sats>> {
        Ok(self.fees.get(txid).copied())
    }
}

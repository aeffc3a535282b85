//! Read-only access to a node's sortition and chainstate databases

use std::path::Path;

use burnscope_common::prelude::*;
use burnscope_common::validation::ValidationUtils;
use burnscope_graph::{
    CommitRecord, Earnings, ProcessedBlock, RecordSource, ResourceUsage, RoundOutcome,
    RoundOutcomeSource,
};
use rusqlite::types::{Value, ValueRef};
use rusqlite::{params, Connection, OpenFlags, OptionalExtension, Row};
use serde::Deserialize;
use tracing::{debug, instrument, warn};

/// Sortition database, relative to the node's working directory
pub const SORTITION_DB: &str = "mainnet/burnchain/sortition/marf.sqlite";

/// Chainstate index database, relative to the node's working directory
pub const CHAINSTATE_DB: &str = "mainnet/chainstate/vm/index.sqlite";

const COMMITS_QUERY: &str = "SELECT block_header_hash, txid, apparent_sender, sortition_id, \
     vtxindex, block_height, burn_fee, parent_block_ptr, parent_vtxindex \
     FROM block_commits \
     WHERE block_height BETWEEN ?1 AND ?2 \
     ORDER BY block_height ASC, vtxindex ASC";

const OUTCOME_QUERY: &str = "SELECT winning_block_txid, stacks_block_height, consensus_hash \
     FROM snapshots WHERE block_height = ?1";

const TIP_QUERY: &str = "SELECT canonical_stacks_tip_hash FROM snapshots WHERE block_height = ?1";

const PAYMENT_QUERY: &str = "SELECT block_hash, coinbase, tx_fees_anchored, tx_fees_streamed \
     FROM payments WHERE consensus_hash = ?1";

const HEADER_QUERY: &str = "SELECT cost, block_size FROM block_headers WHERE block_hash = ?1";

/// Execution cost as stored in the `cost` column
#[derive(Debug, Deserialize)]
struct ExecutionCost {
    read_length: u64,
    read_count: u64,
    write_length: u64,
    write_count: u64,
    runtime: u64,
}

/// Node databases opened for one analysis run
pub struct LedgerStore {
    sortition: Connection,
    chainstate: Connection,
}

impl LedgerStore {
    /// Open both databases under the node's working directory, read-only
    #[instrument]
    pub fn open(db_path: &Path) -> ScopeResult<Self> {
        let sortition = open_read_only(&db_path.join(SORTITION_DB))?;
        let chainstate = open_read_only(&db_path.join(CHAINSTATE_DB))?;
        debug!("Opened ledger databases");
        Ok(Self::from_connections(sortition, chainstate))
    }

    pub fn from_connections(sortition: Connection, chainstate: Connection) -> Self {
        Self {
            sortition,
            chainstate,
        }
    }

    /// Highest burn height with a recorded commit
    pub fn chain_tip_height(&self) -> ScopeResult<Option<BurnHeight>> {
        let tip: Option<i64> =
            self.sortition
                .query_row("SELECT MAX(block_height) FROM block_commits", [], |row| {
                    row.get(0)
                })?;
        Ok(tip.map(|h| h as BurnHeight))
    }

    fn read_usage(&self, block_hash: &str) -> ScopeResult<Option<ResourceUsage>> {
        let row = self
            .chainstate
            .query_row(HEADER_QUERY, params![block_hash], |row| {
                Ok((row.get::<_, String>(0)?, read_u64(row, 1)?))
            })
            .optional()?;

        let Some((cost, block_size)) = row else {
            return Ok(None);
        };

        match serde_json::from_str::<ExecutionCost>(&cost) {
            Ok(cost) => Ok(Some(ResourceUsage {
                read_length: cost.read_length,
                read_count: cost.read_count,
                write_length: cost.write_length,
                write_count: cost.write_count,
                runtime: cost.runtime,
                block_size,
            })),
            Err(e) => {
                warn!(block_hash, error = %e, "Unreadable execution cost");
                Ok(None)
            }
        }
    }
}

fn open_read_only(path: &Path) -> ScopeResult<Connection> {
    Connection::open_with_flags(
        path,
        OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
    )
    .map_err(|e| ScopeError::ledger(format!("Failed to open {}: {}", path.display(), e)))
}

/// Amounts are stored either as integers or as decimal text
fn read_u64(row: &Row<'_>, idx: usize) -> rusqlite::Result<u64> {
    let invalid = |value: Value| {
        rusqlite::Error::FromSqlConversionFailure(
            idx,
            value.data_type(),
            format!("not an unsigned amount: {:?}", value).into(),
        )
    };

    match row.get_ref(idx)? {
        ValueRef::Integer(n) => u64::try_from(n).map_err(|_| invalid(Value::Integer(n))),
        ValueRef::Text(bytes) => {
            let text = String::from_utf8_lossy(bytes).trim().to_string();
            match text.parse::<u64>() {
                Ok(n) => Ok(n),
                Err(_) => Err(invalid(Value::Text(text))),
            }
        }
        other => Err(invalid(other.into())),
    }
}

/// Senders are stored JSON-quoted
fn unquote(sender: String) -> Address {
    match sender
        .strip_prefix('"')
        .and_then(|s| s.strip_suffix('"'))
    {
        Some(inner) => inner.to_string(),
        None => sender,
    }
}

impl RecordSource for LedgerStore {
    #[instrument(skip(self))]
    fn commits_in_range(
        &self,
        low: BurnHeight,
        high: BurnHeight,
    ) -> ScopeResult<Vec<CommitRecord>> {
        let mut stmt = self.sortition.prepare(COMMITS_QUERY)?;
        let rows = stmt.query_map(params![low as i64, high as i64], |row| {
            Ok(CommitRecord {
                block_header_hash: row.get(0)?,
                txid: row.get(1)?,
                sender: unquote(row.get(2)?),
                round_id: row.get(3)?,
                vtxindex: row.get(4)?,
                burn_height: read_u64(row, 5)?,
                spend: read_u64(row, 6)?,
                parent_height: read_u64(row, 7)?,
                parent_vtxindex: row.get(8)?,
            })
        })?;

        let records = rows.collect::<Result<Vec<_>, _>>()?;
        debug!(count = records.len(), "Loaded block commits");
        Ok(records)
    }
}

impl RoundOutcomeSource for LedgerStore {
    fn round_outcome(&self, height: BurnHeight) -> ScopeResult<Option<RoundOutcome>> {
        let outcome = self
            .sortition
            .query_row(OUTCOME_QUERY, params![height as i64], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    read_u64(row, 1)?,
                    row.get::<_, String>(2)?,
                ))
            })
            .optional()?;

        Ok(outcome.map(|(txid, resolved_height, handle)| RoundOutcome {
            winning_txid: (!ValidationUtils::is_zero_hash(&txid)).then_some(txid),
            resolved_height,
            handle,
        }))
    }

    fn canonical_tip(&self, height: BurnHeight) -> ScopeResult<Option<BlockHeaderHash>> {
        Ok(self
            .sortition
            .query_row(TIP_QUERY, params![height as i64], |row| row.get(0))
            .optional()?)
    }

    fn processed_block(&self, handle: &ConsensusHash) -> ScopeResult<Option<ProcessedBlock>> {
        let payment = self
            .chainstate
            .query_row(PAYMENT_QUERY, params![handle], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    read_u64(row, 1)?,
                    read_u64(row, 2)?,
                    read_u64(row, 3)?,
                ))
            })
            .optional()?;

        let Some((block_hash, coinbase, anchored, streamed)) = payment else {
            return Ok(None);
        };

        let usage = self.read_usage(&block_hash)?;
        Ok(Some(ProcessedBlock {
            block_hash,
            earnings: Earnings {
                coinbase,
                fees: anchored + streamed,
            },
            usage,
        }))
    }
}

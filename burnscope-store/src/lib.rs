//! # Burnscope Store
//!
//! SQLite-backed implementations of the analysis sources.
//!
//! ### [`LedgerStore`] - Node Databases
//! - Block-commit records from the sortition database's `block_commits` table
//! - Round winners, processed heights and the canonical tip from `snapshots`
//! - Block payments (`payments`) and execution costs (`block_headers`) from the
//!   chainstate index
//!
//! ### [`FeeCache`] - Burn Fees
//! - Fees paid by commit transactions, keyed by txid
//! - Created on demand next to the generated reports
//! - [`FetchingFeeSource`] fills misses from a block explorer API
//!
//! ## Example Usage
//!
//! ```no_run
//! use std::path::Path;
//! use burnscope_graph::prelude::*;
//! use burnscope_store::LedgerStore;
//!
//! # fn example() -> burnscope_common::error::ScopeResult<()> {
//! let store = LedgerStore::open(Path::new("/var/lib/node"))?;
//! let tip = store.chain_tip_height()?.unwrap_or_default();
//! let graph = CommitGraph::build(&store, tip, 20)?;
//! let view = mark_canonical(graph, &store, tip)?;
//! println!("canonical tip {}", view.canonical_tip());
//! # Ok(())
//! # }
//! ```

pub mod fees;
pub mod ledger;

pub use fees::{
    FeeCache, FeeFetcher, FetchingFeeSource, MempoolFetcher, DEFAULT_FEE_API_URL, FEE_CACHE_DB,
};
pub use ledger::{LedgerStore, CHAINSTATE_DB, SORTITION_DB};

//burnscope-common/src/types.rs
//! Common type definitions and constants used throughout burnscope

use serde::{Deserialize, Serialize};

/// Burnchain block height
pub type BurnHeight = u64;

/// Position of a block in the (possibly provisional) chain built from parent links
pub type ChainHeight = u64;

/// Hex-encoded hash of the block a commit bids for
pub type BlockHeaderHash = String;

/// Hex-encoded burnchain transaction id
pub type Txid = String;

/// Identifier of the sortition (round) a commit competes in
pub type RoundId = String;

/// Opaque chain-state handle used to look up post-processing results
pub type ConsensusHash = String;

/// Burnchain address of a commit's sender
pub type Address = String;

/// Amount in satoshis
pub type Sats = u64;

/// Amount in micro-units of the chain's native token
pub type MicroUnits = u64;

/// Micro-units per whole token
pub const MICRO_PER_TOKEN: f64 = 1_000_000.0;

/// Registry display defaults
pub mod display {
    /// Group assigned to senders the registry does not know
    pub const DEFAULT_GROUP: &str = "Other";

    /// Color assigned to senders without a configured group color
    pub const DEFAULT_COLOR: &str = "white";

    /// Length of the address prefix used as a fallback display name
    pub const NAME_PREFIX_LEN: usize = 8;

    /// Fallback display name for an address
    pub fn short_name(address: &str) -> String {
        address.chars().take(NAME_PREFIX_LEN).collect()
    }
}

/// Analysis defaults
pub mod defaults {
    /// How far below the canonical tip a live fork may sit and still be scored
    pub const MAX_FORK_DEPTH: u64 = 3;

    /// Window spans analyzed when none are given on the command line
    pub const BLOCK_COUNTS: [u64; 3] = [20, 50, 100];
}

/// Per-block execution ceilings used to derive a block's fullness
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CostLimits {
    pub write_length: u64,
    pub write_count: u64,
    pub read_length: u64,
    pub read_count: u64,
    pub runtime: u64,
    pub size: u64,
}

impl Default for CostLimits {
    fn default() -> Self {
        Self {
            write_length: 15_000_000,
            write_count: 15_000,
            read_length: 100_000_000,
            read_count: 15_000,
            runtime: 5_000_000_000,
            size: 2 * 1024 * 1024,
        }
    }
}

impl CostLimits {
    /// All six ceilings must be non-zero to be usable as ratio denominators
    pub fn is_valid(&self) -> bool {
        [
            self.write_length,
            self.write_count,
            self.read_length,
            self.read_count,
            self.runtime,
            self.size,
        ]
        .iter()
        .all(|&limit| limit > 0)
    }
}

/// Result of asking for a recomputation while runs are serialized by a lock
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum TriggerOutcome {
    /// The run was started and finished successfully
    Completed,
    /// The run was started and failed with the given message
    Failed(String),
    /// Another run holds the lock; nothing was started
    Busy,
}

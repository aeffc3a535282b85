//burnscope-common/src/error.rs
//! Standardized error types for all burnscope components

use thiserror::Error;

use crate::types::{BlockHeaderHash, BurnHeight, Txid};

/// Standard result type used throughout burnscope
pub type ScopeResult<T> = std::result::Result<T, ScopeError>;

/// Integrity failures raised while building or marking a commit graph.
///
/// Every variant means the input data broke a precondition of the analysis
/// window; none of them are recoverable inside a run.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ChainError {
    #[error("Duplicate commit slot at height {height}, index {vtxindex}")]
    DuplicateSlot { height: BurnHeight, vtxindex: u32 },

    #[error("Duplicate block header hash {hash}")]
    DuplicateCommit { hash: BlockHeaderHash },

    #[error("Commit at height {height} arrived after height {previous}")]
    OutOfOrder {
        height: BurnHeight,
        previous: BurnHeight,
    },

    #[error("Commit {hash} at height {height} names parent height {parent_height}")]
    ParentNotBelow {
        hash: BlockHeaderHash,
        height: BurnHeight,
        parent_height: BurnHeight,
    },

    #[error("Commit at height {height} lies outside window [{low}, {high}]")]
    OutsideWindow {
        height: BurnHeight,
        low: BurnHeight,
        high: BurnHeight,
    },

    #[error("No round outcome recorded for burn height {height}")]
    MissingRoundOutcome { height: BurnHeight },

    #[error("Declared winner {txid} at height {height} is not in the loaded window")]
    WinnerNotMaterialized { height: BurnHeight, txid: Txid },

    #[error("No canonical tip recorded for burn height {height}")]
    MissingCanonicalTip { height: BurnHeight },

    #[error("Canonical tip {hash} is not in the loaded window")]
    TipNotMaterialized { hash: BlockHeaderHash },
}

impl From<ChainError> for ScopeError {
    fn from(err: ChainError) -> Self {
        ScopeError::Chain(err)
    }
}

/// Comprehensive error type for all burnscope operations
#[derive(Error, Debug)]
pub enum ScopeError {
    // Data source errors
    #[error("Source error: {0}")]
    Source(String),

    // Database errors
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    // Validation errors
    #[error("Validation error: {0}")]
    Validation(String),

    // Network errors
    #[error("Network error: {0}")]
    Network(String),

    // Graph integrity errors
    #[error("Chain error: {0}")]
    Chain(ChainError),

    // Configuration errors
    #[error("Config error: {0}")]
    Config(String),

    // I/O errors
    #[error("I/O error: {0}")]
    IO(#[from] std::io::Error),

    // JSON errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    // Generic errors
    #[error("Internal error: {0}")]
    Internal(String),
}

impl ScopeError {
    /// Create a new data source error
    pub fn ledger(msg: impl Into<String>) -> Self {
        Self::Source(msg.into())
    }

    /// Create a new validation error
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    /// Create a new network error
    pub fn network(msg: impl Into<String>) -> Self {
        Self::Network(msg.into())
    }

    /// Create a new config error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create a new internal error
    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    /// Whether this error is a data-integrity failure of the analysis window
    pub fn is_integrity(&self) -> bool {
        matches!(self, Self::Chain(_))
    }
}

//! # Burnscope Common
//!
//! Common utilities, types, and standardized patterns for burnscope.
//! This crate is the single source of truth for functionality shared by the
//! graph, store, rpc and core crates, preventing code duplication and
//! circular dependencies.
//!
//! ## Modules
//!
//! - **error**: The shared error type and graph integrity errors
//! - **types**: Type aliases, cost limits and display defaults
//! - **validation**: Input validation utilities
//!
//! ## Example Usage
//!
//! ```rust
//! use burnscope_common::prelude::*;
//!
//! fn window(start: BurnHeight) -> ScopeResult<(BurnHeight, BurnHeight)> {
//!     ValidationUtils::validate_window(start, 20)
//! }
//!
//! assert_eq!(window(120).unwrap(), (100, 120));
//! ```

#![warn(rustdoc::missing_crate_level_docs)]

pub mod error;
pub mod types;
pub mod validation;

/// Re-export commonly used types and traits
pub mod prelude {
    pub use crate::error::{ChainError, ScopeError, ScopeResult};
    pub use crate::types::{
        Address, BlockHeaderHash, BurnHeight, ChainHeight, ConsensusHash, CostLimits,
        MicroUnits, RoundId, Sats, TriggerOutcome, Txid,
    };
    pub use crate::validation::ValidationUtils;

    // Re-export essential external crates
    pub use serde::{Deserialize, Serialize};
}

// Version and constants
/// Burnscope common crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

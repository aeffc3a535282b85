// lib.rs - Burnscope Core Library
//! # Burnscope Core
//!
//! Runs the commit-graph analysis end to end.
//!
//! This crate wires the SQLite sources, the graph algorithms and the report
//! outputs together, and adds the long-running observer and the mining
//! simulator.
//!
//! ## Architecture
//!
//! - **Config**: TOML file that also lists known miners and their groups
//! - **Pipeline**: One run analyzes every window span and writes JSON reports
//! - **Alerts**: New miners and unusual spend, delivered to an [`AlertSink`]
//! - **Observer**: Recomputes on node notifications, serves the latest reports
//!
//! ## Example
//!
//! ```no_run
//! use burnscope_core::{Runner, ScopeConfig, SqliteSources};
//! use burnscope_rpc::ReportCache;
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = ScopeConfig::default();
//!     let sources = SqliteSources::from_config(&config);
//!     let counts = config.block_counts.clone();
//!     let runner = Runner::new(config, sources, ReportCache::new());
//!
//!     for report in runner.run_once(None, &counts)? {
//!         println!("{}", report.summary());
//!     }
//!     Ok(())
//! }
//! ```

#![warn(rustdoc::missing_crate_level_docs)]

/// Alert evaluation and delivery
pub mod alerts;

/// Configuration module
pub mod config;

/// Observer mode
pub mod observer;

/// Analysis runs
pub mod pipeline;

/// Run serialization
pub mod runlock;

/// Mining simulator
pub mod sim;

/// Prelude with commonly used types
pub mod prelude {
    pub use crate::config::ScopeConfig;
    pub use crate::observer::Observer;
    pub use crate::pipeline::{analyze_window, Runner, SqliteSources};
    // Re-export burnscope-common prelude
    pub use burnscope_common::prelude::*;
}

// Re-export main types at crate root
pub use alerts::{Alert, AlertEvaluator, AlertSink, LogAlertSink};
pub use config::ScopeConfig;
pub use observer::{Observer, ScopeRpcHandler};
pub use pipeline::{analyze_window, AnalysisSettings, Runner, SourceOpener, SqliteSources};
pub use runlock::RunLock;
pub use sim::{SimConfig, Simulation};

/// Burnscope version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

//! # Burnscope Graph
//!
//! Turns a window of proof-of-burn block-commits into a navigable DAG, marks
//! the canonical chain, predicts the next canonical tip among competing live
//! branches and rolls up per-group statistics.
//!
//! A run is strictly forward:
//!
//! 1. [`CommitGraph::build`] reads the window from a [`RecordSource`]
//! 2. [`mark_canonical`] consults a [`RoundOutcomeSource`] and yields a [`ChainView`]
//! 3. [`ForkScorer::mark_next_tip`] flags the predicted next tip
//! 4. [`collect_stats`] aggregates the view per [`MinerRegistry`] group
//!
//! ```rust
//! use burnscope_graph::prelude::*;
//! use burnscope_graph::memory::{record, MemoryLedger};
//!
//! let mut ledger = MemoryLedger::new();
//! ledger
//!     .commit(record("a", "S1", 100, 1, 1000, None))
//!     .commit(record("b", "S1", 101, 1, 2000, Some((100, 1))))
//!     .declare_winner(100, "a", 10)
//!     .declare_winner(101, "b", 11)
//!     .tip(101, "b");
//!
//! let graph = CommitGraph::build(&ledger, 101, 1).unwrap();
//! let mut view = mark_canonical(graph, &ledger, 101).unwrap();
//! assert_eq!(ForkScorer::default().mark_next_tip(&mut view).as_deref(), Some("b"));
//! ```

pub mod builder;
pub mod canonical;
pub mod commit;
pub mod fork;
pub mod memory;
pub mod registry;
pub mod report;
pub mod source;
pub mod stats;

pub use builder::CommitGraph;
pub use canonical::{mark_canonical, ChainView};
pub use commit::{Commit, CommitMarks, CommitRecord, Earnings, ProcessedBlock, ResourceUsage};
pub use fork::ForkScorer;
pub use registry::{EmptyRegistry, MinerInfo, MinerRegistry, StaticRegistry};
pub use report::{AnalysisReport, CommitView};
pub use source::{FeeSource, NoFees, RecordSource, RoundOutcome, RoundOutcomeSource};
pub use stats::{collect_stats, GroupSummary, PriceRatio, RoundSummary, WindowStats};

/// Re-export commonly used types and traits
pub mod prelude {
    pub use crate::builder::CommitGraph;
    pub use crate::canonical::{mark_canonical, ChainView};
    pub use crate::fork::ForkScorer;
    pub use crate::registry::MinerRegistry;
    pub use crate::source::{FeeSource, RecordSource, RoundOutcomeSource};
    pub use crate::stats::collect_stats;
}

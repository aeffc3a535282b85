//! # Burnscope RPC - Query API and Trigger Endpoint
//!
//! This crate exposes a running observer's results.
//!
//! ## API Overview
//!
//! ### JSON-RPC
//! - **`scope_latestReport`**: Full report for a window span (smallest span by default)
//! - **`scope_listWindows`**: Window spans with their tip and prediction
//! - **`scope_nextTip`**: Predicted next canonical tip for a window span
//!
//! ### HTTP
//! - **`POST /new_block`**: Loopback-only notification that the ledger advanced
//! - **`GET /reports/{window}`**: Latest report for a window span as JSON
//!
//! ## Example Usage
//!
//! ```json
//! {
//!   "jsonrpc": "2.0",
//!   "method": "scope_nextTip",
//!   "params": [20],
//!   "id": 1
//! }
//! ```

use burnscope_common::prelude::*;
use burnscope_graph::AnalysisReport;
use jsonrpsee::{core::RpcResult, proc_macros::rpc, server::ServerBuilder};
use std::net::SocketAddr;

pub mod cache;
pub mod trigger;

pub use cache::ReportCache;
pub use trigger::{router, serve_trigger, RecomputeTrigger};

/// Summary of one analyzed window
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct WindowInfo {
    pub span: u64,
    pub low: BurnHeight,
    pub high: BurnHeight,
    pub canonical_tip: BlockHeaderHash,
    pub next_tip: Option<BlockHeaderHash>,
    pub commits: usize,
    /// Unix seconds
    pub generated_at: u64,
}

impl From<&AnalysisReport> for WindowInfo {
    fn from(report: &AnalysisReport) -> Self {
        Self {
            span: report.span,
            low: report.low,
            high: report.high,
            canonical_tip: report.canonical_tip.clone(),
            next_tip: report.next_tip.clone(),
            commits: report.commits.len(),
            generated_at: report.generated_at,
        }
    }
}

/// Predicted next canonical tip of a window
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct NextTipInfo {
    pub span: u64,
    pub block_header_hash: BlockHeaderHash,
    pub sender: Address,
    pub name: String,
    pub burn_height: BurnHeight,
    pub resolved_height: Option<ChainHeight>,
}

impl NextTipInfo {
    pub fn from_report(report: &AnalysisReport) -> Option<Self> {
        let hash = report.next_tip.as_ref()?;
        let commit = report
            .commits
            .iter()
            .find(|c| &c.block_header_hash == hash)?;
        Some(Self {
            span: report.span,
            block_header_hash: commit.block_header_hash.clone(),
            sender: commit.sender.clone(),
            name: commit.name.clone(),
            burn_height: commit.burn_height,
            resolved_height: commit.resolved_height,
        })
    }
}

/// Burnscope JSON-RPC API
#[rpc(server)]
pub trait ScopeApi {
    /// Latest report for `window`, or for the smallest analyzed window when omitted
    #[method(name = "scope_latestReport")]
    async fn latest_report(&self, window: Option<u64>) -> RpcResult<Option<AnalysisReport>>;

    /// All analyzed windows, smallest span first
    #[method(name = "scope_listWindows")]
    async fn list_windows(&self) -> RpcResult<Vec<WindowInfo>>;

    /// Predicted next canonical tip; `None` when the window made no prediction
    #[method(name = "scope_nextTip")]
    async fn next_tip(&self, window: Option<u64>) -> RpcResult<Option<NextTipInfo>>;
}

/// Configuration for the JSON-RPC server
pub struct RpcConfig {
    /// Socket address to bind the server to (IP:port)
    pub listen_addr: SocketAddr,
}

/// Start the JSON-RPC server and serve until it is stopped
pub async fn start_server<T: ScopeApiServer>(config: RpcConfig, api_impl: T) -> ScopeResult<()> {
    let server = ServerBuilder::default()
        .build(config.listen_addr)
        .await
        .map_err(|e| ScopeError::network(format!("Failed to build server: {}", e)))?;

    let addr = server
        .local_addr()
        .map_err(|e| ScopeError::network(format!("Failed to get local address: {}", e)))?;
    let handle = server.start(api_impl.into_rpc());

    tracing::info!("RPC server listening on {}", addr);

    handle.stopped().await;
    Ok(())
}

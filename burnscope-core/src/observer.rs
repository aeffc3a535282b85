//! Long-running observer: recompute on "new block" notifications and answer
//! queries about the latest reports.

use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use burnscope_common::prelude::*;
use burnscope_graph::AnalysisReport;
use burnscope_rpc::{
    NextTipInfo, RecomputeTrigger, ReportCache, RpcConfig, ScopeApiServer, WindowInfo,
};
use jsonrpsee::types::error::{ErrorObject, INVALID_PARAMS_CODE};
use tracing::{error, info, warn};

use crate::pipeline::{Runner, SourceOpener};
use crate::runlock::RunLock;

/// Runs every configured window under the run lock
pub struct Observer<O: SourceOpener> {
    runner: Arc<Runner<O>>,
    lock: Arc<RunLock>,
    block_counts: Arc<Vec<u64>>,
}

impl<O: SourceOpener> Clone for Observer<O> {
    fn clone(&self) -> Self {
        Self {
            runner: self.runner.clone(),
            lock: self.lock.clone(),
            block_counts: self.block_counts.clone(),
        }
    }
}

impl<O: SourceOpener> Observer<O> {
    pub fn new(runner: Runner<O>, block_counts: Vec<u64>) -> Self {
        Self {
            runner: Arc::new(runner),
            lock: Arc::new(RunLock::new()),
            block_counts: Arc::new(block_counts),
        }
    }

    pub fn cache(&self) -> &ReportCache {
        self.runner.cache()
    }

    /// Recompute on the calling thread
    pub fn run_blocking(&self) -> TriggerOutcome {
        self.lock.try_run(|| {
            self.runner
                .run_once(None, &self.block_counts)
                .map(|_| ())
        })
    }

    /// Serve the trigger endpoint and the JSON-RPC API until either stops
    pub async fn serve(self) -> Result<()> {
        let config = self.runner.config();
        let observer_addr = config.observer_addr;
        let rpc_config = RpcConfig {
            listen_addr: config.rpc_addr,
        };

        let rpc_handler = ScopeRpcHandler::new(self.cache().clone());
        let rpc_task = tokio::spawn(async move {
            info!("Starting RPC server on {}", rpc_config.listen_addr);
            if let Err(e) = burnscope_rpc::start_server(rpc_config, rpc_handler).await {
                error!("RPC server error: {}", e);
            }
        });

        let cache = self.cache().clone();
        let router = burnscope_rpc::router(Arc::new(self), cache);
        let served = burnscope_rpc::serve_trigger(observer_addr, router).await;
        rpc_task.abort();
        served.map_err(Into::into)
    }
}

#[async_trait]
impl<O: SourceOpener> RecomputeTrigger for Observer<O> {
    async fn request_run(&self) -> TriggerOutcome {
        info!("Received new block notification");
        let observer = self.clone();
        match tokio::task::spawn_blocking(move || observer.run_blocking()).await {
            Ok(outcome) => outcome,
            Err(e) => {
                error!("Analysis task panicked: {}", e);
                TriggerOutcome::Failed(format!("analysis task failed: {}", e))
            }
        }
    }
}

/// JSON-RPC handler answering from the report cache
pub struct ScopeRpcHandler {
    cache: ReportCache,
}

impl ScopeRpcHandler {
    pub fn new(cache: ReportCache) -> Self {
        Self { cache }
    }

    fn report(&self, window: Option<u64>) -> jsonrpsee::core::RpcResult<Option<AnalysisReport>> {
        match window {
            Some(0) => Err(ErrorObject::owned(
                INVALID_PARAMS_CODE,
                "Window span must be greater than 0",
                None::<()>,
            )),
            Some(span) => Ok(self.cache.get(span)),
            None => Ok(self.cache.primary()),
        }
    }
}

// Implement RPC API on the handler
#[async_trait]
impl ScopeApiServer for ScopeRpcHandler {
    async fn latest_report(
        &self,
        window: Option<u64>,
    ) -> jsonrpsee::core::RpcResult<Option<AnalysisReport>> {
        self.report(window)
    }

    async fn list_windows(&self) -> jsonrpsee::core::RpcResult<Vec<WindowInfo>> {
        Ok(self.cache.snapshot().iter().map(WindowInfo::from).collect())
    }

    async fn next_tip(&self, window: Option<u64>) -> jsonrpsee::core::RpcResult<Option<NextTipInfo>> {
        let report = self.report(window)?;
        if report.is_none() {
            warn!(?window, "No report available yet");
        }
        Ok(report.as_ref().and_then(NextTipInfo::from_report))
    }
}

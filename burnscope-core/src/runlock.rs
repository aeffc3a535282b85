//! Fail-fast serialization of analysis runs

use burnscope_common::prelude::*;
use parking_lot::Mutex;
use tracing::{error, info};

/// At most one run at a time; a second caller is turned away instead of queued
#[derive(Debug, Default)]
pub struct RunLock {
    lock: Mutex<()>,
}

impl RunLock {
    pub fn new() -> Self {
        Self::default()
    }

    /// Run `f` if no other run holds the lock
    pub fn try_run<F>(&self, f: F) -> TriggerOutcome
    where
        F: FnOnce() -> ScopeResult<()>,
    {
        let Some(_guard) = self.lock.try_lock() else {
            return TriggerOutcome::Busy;
        };

        match f() {
            Ok(()) => {
                info!("Reports rebuilt");
                TriggerOutcome::Completed
            }
            Err(e) => {
                error!("Run failed: {}", e);
                TriggerOutcome::Failed(e.to_string())
            }
        }
    }

    pub fn is_running(&self) -> bool {
        self.lock.is_locked()
    }
}

//! Latest report per window, shared between the pipeline and the servers

use std::collections::BTreeMap;
use std::sync::Arc;

use burnscope_graph::AnalysisReport;
use parking_lot::RwLock;

/// Cheaply clonable handle to the most recent report of each window span
#[derive(Debug, Clone, Default)]
pub struct ReportCache {
    reports: Arc<RwLock<BTreeMap<u64, AnalysisReport>>>,
}

impl ReportCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the report for the report's window span
    pub fn publish(&self, report: AnalysisReport) {
        self.reports.write().insert(report.span, report);
    }

    pub fn get(&self, span: u64) -> Option<AnalysisReport> {
        self.reports.read().get(&span).cloned()
    }

    /// Report of the smallest window span, the one shown first
    pub fn primary(&self) -> Option<AnalysisReport> {
        self.reports.read().values().next().cloned()
    }

    pub fn spans(&self) -> Vec<u64> {
        self.reports.read().keys().copied().collect()
    }

    pub fn snapshot(&self) -> Vec<AnalysisReport> {
        self.reports.read().values().cloned().collect()
    }

    pub fn is_empty(&self) -> bool {
        self.reports.read().is_empty()
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use burnscope_common::types::CostLimits;
    use burnscope_graph::memory::{record, MemoryLedger};
    use burnscope_graph::prelude::*;
    use burnscope_graph::{EmptyRegistry, NoFees};

    /// Report for a two-block window ending at 101 with `b` as tip
    pub(crate) fn sample_report(span: u64) -> AnalysisReport {
        let mut ledger = MemoryLedger::new();
        ledger
            .commit(record("a", "S1", 100, 1, 1000, None))
            .commit(record("b", "S1", 101, 1, 2000, Some((100, 1))))
            .declare_winner(100, "a", 10)
            .declare_winner(101, "b", 11)
            .tip(101, "b");

        let graph = CommitGraph::build(&ledger, 101, 1).unwrap();
        let mut view = mark_canonical(graph, &ledger, 101).unwrap();
        ForkScorer::default().mark_next_tip(&mut view);
        let stats = collect_stats(&view, &EmptyRegistry, &NoFees).unwrap();
        AnalysisReport::new(&view, stats, &EmptyRegistry, &CostLimits::default(), span, None)
    }

    #[test]
    fn test_publish_replaces_by_span() {
        let cache = ReportCache::new();
        assert!(cache.is_empty());
        assert!(cache.primary().is_none());

        cache.publish(sample_report(50));
        cache.publish(sample_report(20));
        let mut newer = sample_report(20);
        newer.generated_at += 60;
        cache.publish(newer.clone());

        assert_eq!(cache.spans(), vec![20, 50]);
        assert_eq!(cache.get(20), Some(newer));
        assert_eq!(cache.primary().map(|r| r.span), Some(20));
        assert!(cache.get(100).is_none());
        assert_eq!(cache.snapshot().len(), 2);
    }

    #[test]
    fn test_clones_share_reports() {
        let cache = ReportCache::new();
        let handle = cache.clone();
        cache.publish(sample_report(20));
        assert_eq!(handle.spans(), vec![20]);
    }
}

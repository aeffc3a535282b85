//! Serializable analysis reports

use std::fmt::Write as _;
use std::time::{SystemTime, UNIX_EPOCH};

use burnscope_common::prelude::*;
use burnscope_common::types::MICRO_PER_TOKEN;

use crate::canonical::ChainView;
use crate::commit::Earnings;
use crate::registry::MinerRegistry;
use crate::stats::WindowStats;

/// One commit as shown in a report
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommitView {
    pub block_header_hash: BlockHeaderHash,
    pub txid: Txid,
    pub sender: Address,
    pub name: String,
    pub burn_height: BurnHeight,
    pub spend: Sats,
    pub round_total: Sats,
    /// Fraction of the round's total spend
    pub share_of_round: f64,
    pub parent: Option<BlockHeaderHash>,
    pub resolved_height: Option<ChainHeight>,
    pub won: bool,
    pub potential_tip: bool,
    pub canonical: bool,
    pub tip: bool,
    pub next_tip: bool,
    pub block_hash: Option<String>,
    pub earnings: Earnings,
    /// Block fullness percentage, winners only
    pub fullness: Option<f64>,
}

/// Everything learned about one analysis window
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisReport {
    pub start_height: BurnHeight,
    pub span: u64,
    pub low: BurnHeight,
    pub high: BurnHeight,
    pub canonical_tip: BlockHeaderHash,
    pub next_tip: Option<BlockHeaderHash>,
    pub commits: Vec<CommitView>,
    pub stats: WindowStats,
    /// Market price of one token in sats, when known
    pub market_price: Option<f64>,
    /// Unix seconds
    pub generated_at: u64,
}

impl AnalysisReport {
    pub fn new<R>(
        view: &ChainView,
        stats: WindowStats,
        registry: &R,
        limits: &CostLimits,
        span: u64,
        market_price: Option<f64>,
    ) -> Self
    where
        R: MinerRegistry + ?Sized,
    {
        let graph = view.graph();
        let (low, high) = graph.window();

        let commits = view
            .entries()
            .map(|(commit, marks)| {
                let round_total = graph.round_total(&commit.round_id);
                CommitView {
                    block_header_hash: commit.block_header_hash.clone(),
                    txid: commit.txid.clone(),
                    sender: commit.sender.clone(),
                    name: stats
                        .miners
                        .get(&commit.sender)
                        .map(|miner| miner.name.clone())
                        .unwrap_or_else(|| registry.display_name(&commit.sender)),
                    burn_height: commit.burn_height,
                    spend: commit.spend,
                    round_total,
                    share_of_round: if round_total == 0 {
                        0.0
                    } else {
                        commit.spend as f64 / round_total as f64
                    },
                    parent: commit.parent.clone(),
                    resolved_height: marks.resolved_height,
                    won: marks.won,
                    potential_tip: marks.potential_tip,
                    canonical: marks.canonical,
                    tip: marks.tip,
                    next_tip: marks.next_tip,
                    block_hash: marks.block_hash.clone(),
                    earnings: marks.earnings,
                    fullness: marks.won.then(|| marks.usage.fullness(limits)),
                }
            })
            .collect();

        let generated_at = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or(0);

        Self {
            start_height: high,
            span,
            low,
            high,
            canonical_tip: view.canonical_tip().to_string(),
            next_tip: view.next_tip().map(|c| c.block_header_hash.clone()),
            commits,
            stats,
            market_price,
            generated_at,
        }
    }

    pub fn to_json(&self) -> ScopeResult<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn from_json(json: &str) -> ScopeResult<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Plain-text summary of the network and per-group stats
    pub fn summary(&self) -> String {
        let mut out = String::new();
        let stats = &self.stats;
        let tokens = |micro: MicroUnits| micro as f64 / MICRO_PER_TOKEN;

        let _ = writeln!(
            out,
            "Window {}..={} ({} blocks)",
            self.low, self.high, stats.blocks
        );
        let _ = writeln!(out, "Network orphan rate: {:.2}%", stats.orphan_rate * 100.0);
        if let Some(price) = self.market_price {
            let _ = writeln!(out, "Market price: {:.2} sats", price);
        }
        for (group, summary) in &stats.groups {
            let _ = writeln!(out, "Group: {}", group);
            let _ = writeln!(out, "  Burn spend: {} sats", summary.spend);
            let _ = writeln!(out, "  Burn fees: {} sats", summary.burn_fees);
            let _ = writeln!(out, "  Total spend: {} sats", summary.total_spend);
            let _ = writeln!(out, "  Coinbase earned: {} tokens", tokens(summary.coinbase_earned));
            let _ = writeln!(out, "  Fees earned: {} tokens", tokens(summary.fees_earned));
            let _ = writeln!(out, "  Total earned: {} tokens", tokens(summary.total_earned));
            let _ = writeln!(out, "  Avg spend per block: {} sats", summary.avg_spend_per_block);
            let _ = writeln!(out, "  Win %: {:.2}%", summary.win_percentage * 100.0);
            let _ = writeln!(out, "  Canonical %: {:.2}%", summary.canonical_percentage * 100.0);
            let _ = writeln!(out, "  Orphan rate: {:.2}%", summary.orphan_rate * 100.0);
            let _ = writeln!(out, "  Price ratio: {} sats/token", summary.price_ratio);
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::CommitGraph;
    use crate::canonical::mark_canonical;
    use crate::commit::{ProcessedBlock, ResourceUsage};
    use crate::fork::ForkScorer;
    use crate::memory::{record, MemoryLedger};
    use crate::registry::StaticRegistry;
    use crate::stats::collect_stats;

    fn report() -> AnalysisReport {
        let mut ledger = MemoryLedger::new();
        ledger
            .commit(record("A", "S1", 100, 1, 1000, None))
            .commit(record("B", "S1", 101, 1, 2000, Some((100, 1))))
            .commit(record("C", "S2", 101, 2, 500, Some((100, 1))))
            .empty_round(100)
            .declare_winner(101, "B", 50)
            .processed(
                101,
                ProcessedBlock {
                    block_hash: "block-101".to_string(),
                    earnings: Earnings {
                        coinbase: 1_000_000,
                        fees: 0,
                    },
                    usage: Some(ResourceUsage {
                        write_count: 1_500,
                        ..ResourceUsage::default()
                    }),
                },
            )
            .tip(101, "B");
        let mut registry = StaticRegistry::new();
        registry.insert("S1", "alpha", "Pool", true);

        let graph = CommitGraph::build(&ledger, 101, 1).unwrap();
        let mut view = mark_canonical(graph, &ledger, 101).unwrap();
        ForkScorer::default().mark_next_tip(&mut view);
        let stats = collect_stats(&view, &registry, &ledger).unwrap();
        AnalysisReport::new(&view, stats, &registry, &CostLimits::default(), 1, Some(2500.0))
    }

    #[test]
    fn test_commit_views() {
        let report = report();
        assert_eq!((report.low, report.high), (100, 101));
        assert_eq!(report.canonical_tip, "B");
        assert_eq!(report.next_tip.as_deref(), Some("B"));

        let hashes: Vec<_> = report.commits.iter().map(|c| c.block_header_hash.as_str()).collect();
        assert_eq!(hashes, vec!["A", "B", "C"]);

        let b = &report.commits[1];
        assert_eq!(b.name, "alpha");
        assert_eq!(b.round_total, 2500);
        assert_eq!(b.share_of_round, 0.8);
        assert_eq!(b.fullness, Some(10.0));
        assert!(b.won && b.canonical && b.tip && b.next_tip);

        let c = &report.commits[2];
        assert_eq!(c.name, "S2");
        assert_eq!(c.fullness, None);
        assert!(!c.canonical);
    }

    #[test]
    fn test_json_round_trip() {
        let report = report();
        let json = report.to_json().unwrap();
        assert!(json.contains("\"canonical_tip\": \"B\""));
        assert_eq!(AnalysisReport::from_json(&json).unwrap(), report);
    }

    #[test]
    fn test_summary_lists_groups() {
        let summary = report().summary();
        assert!(summary.contains("Window 100..=101 (2 blocks)"));
        assert!(summary.contains("Group: Pool"));
        assert!(summary.contains("Group: Other"));
        assert!(summary.contains("Market price: 2500.00 sats"));
    }
}

//! One analysis run: every requested window, from the node databases to
//! JSON reports, alerts and the shared report cache.

use std::path::PathBuf;
use std::sync::Arc;

use burnscope_common::prelude::*;
use burnscope_graph::prelude::*;
use burnscope_graph::AnalysisReport;
use burnscope_rpc::ReportCache;
use burnscope_store::{FeeCache, FetchingFeeSource, LedgerStore, MempoolFetcher};
use parking_lot::Mutex;
use tracing::{debug, info, instrument};

use crate::alerts::{AlertEvaluator, AlertSink, AlertThresholds, LogAlertSink};
use crate::config::ScopeConfig;

/// Everything a window is analyzed against
pub trait Ledger: RecordSource + RoundOutcomeSource {
    /// Highest burn height with a recorded commit
    fn tip_height(&self) -> ScopeResult<Option<BurnHeight>>;
}

impl Ledger for LedgerStore {
    fn tip_height(&self) -> ScopeResult<Option<BurnHeight>> {
        self.chain_tip_height()
    }
}

/// Opens fresh sources for each run
pub trait SourceOpener: Send + Sync + 'static {
    type Ledger: Ledger;
    type Fees: FeeSource;

    fn open(&self) -> ScopeResult<(Self::Ledger, Self::Fees)>;
}

/// Node databases plus the local burn-fee cache and its fetcher
#[derive(Debug, Clone)]
pub struct SqliteSources {
    db_path: PathBuf,
    fee_cache_path: PathBuf,
    /// `None` when fetching is disabled
    fee_api_url: Option<String>,
}

impl SqliteSources {
    pub fn from_config(config: &ScopeConfig) -> Self {
        Self {
            db_path: config.db_path(),
            fee_cache_path: config.fee_cache_path(),
            fee_api_url: config.fetch_fees.then(|| config.fee_api_url.clone()),
        }
    }
}

impl SourceOpener for SqliteSources {
    type Ledger = LedgerStore;
    type Fees = FetchingFeeSource<MempoolFetcher>;

    /// Opened on the blocking pool, where the HTTP client may be built
    fn open(&self) -> ScopeResult<(LedgerStore, Self::Fees)> {
        let ledger = LedgerStore::open(&self.db_path)?;
        let cache = FeeCache::open(&self.fee_cache_path)?;
        let fees = match &self.fee_api_url {
            Some(url) => FetchingFeeSource::new(cache, MempoolFetcher::new(url.as_str())?),
            None => FetchingFeeSource::cache_only(cache),
        };
        Ok((ledger, fees))
    }
}

/// Per-run knobs shared by every window
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AnalysisSettings {
    pub max_fork_depth: u64,
    pub cost_limits: CostLimits,
    pub market_price: Option<f64>,
}

/// Build, mark, score and roll up one window
pub fn analyze_window<L, F, R>(
    ledger: &L,
    fees: &F,
    registry: &R,
    settings: &AnalysisSettings,
    start_height: BurnHeight,
    span: u64,
) -> ScopeResult<AnalysisReport>
where
    L: RecordSource + RoundOutcomeSource + ?Sized,
    F: FeeSource + ?Sized,
    R: MinerRegistry + ?Sized,
{
    let graph = CommitGraph::build(ledger, start_height, span)?;
    let mut view = mark_canonical(graph, ledger, start_height)?;
    ForkScorer::new(settings.max_fork_depth).mark_next_tip(&mut view);
    let stats = collect_stats(&view, registry, fees)?;

    Ok(AnalysisReport::new(
        &view,
        stats,
        registry,
        &settings.cost_limits,
        span,
        settings.market_price,
    ))
}

/// File name (without extension) of the report for the `index`th of `count` windows
pub fn report_basename(index: usize, count: usize, span: u64) -> String {
    if count == 1 {
        "sample".to_string()
    } else if index == 0 {
        "index".to_string()
    } else {
        span.to_string()
    }
}

pub struct Runner<O: SourceOpener> {
    config: Arc<ScopeConfig>,
    sources: O,
    cache: ReportCache,
    alerts: Mutex<AlertEvaluator>,
    sink: Arc<dyn AlertSink>,
}

impl<O: SourceOpener> Runner<O> {
    pub fn new(config: ScopeConfig, sources: O, cache: ReportCache) -> Self {
        let thresholds = AlertThresholds {
            group_spend_sats: config.alert_group_spend_sats,
            low_total_spend: config.alert_low_total_spend,
        };
        Self {
            config: Arc::new(config),
            sources,
            cache,
            alerts: Mutex::new(AlertEvaluator::new(thresholds)),
            sink: Arc::new(LogAlertSink),
        }
    }

    pub fn with_sink(mut self, sink: Arc<dyn AlertSink>) -> Self {
        self.sink = sink;
        self
    }

    pub fn config(&self) -> &ScopeConfig {
        &self.config
    }

    pub fn cache(&self) -> &ReportCache {
        &self.cache
    }

    /// Analyze every window ending at `at_tip` (or the ledger's highest
    /// commit) and publish the reports
    #[instrument(skip(self))]
    pub fn run_once(
        &self,
        at_tip: Option<BurnHeight>,
        block_counts: &[u64],
    ) -> ScopeResult<Vec<AnalysisReport>> {
        ValidationUtils::validate_block_counts(block_counts)?;

        let (ledger, fees) = self.sources.open()?;
        let start_height = match at_tip {
            Some(height) => height,
            None => ledger
                .tip_height()?
                .ok_or_else(|| ScopeError::ledger("No block commits recorded yet"))?,
        };

        let settings = AnalysisSettings {
            max_fork_depth: self.config.max_fork_depth,
            cost_limits: self.config.cost_limits,
            market_price: self.config.market_price(),
        };

        let output_dir = self.config.output_dir();
        std::fs::create_dir_all(&output_dir)?;

        let mut reports = Vec::with_capacity(block_counts.len());
        for (index, &span) in block_counts.iter().enumerate() {
            let report = analyze_window(
                &ledger,
                &fees,
                self.config.as_ref(),
                &settings,
                start_height,
                span,
            )?;

            let basename = report_basename(index, block_counts.len(), span);
            let path = output_dir.join(format!("{}.json", basename));
            std::fs::write(&path, report.to_json()?)?;
            debug!(path = %path.display(), commits = report.commits.len(), "Wrote report");

            let alerts = self
                .alerts
                .lock()
                .evaluate(&report.stats, settings.market_price);
            for alert in &alerts {
                self.sink.deliver(alert);
            }

            info!(
                span,
                canonical_tip = %report.canonical_tip,
                next_tip = ?report.next_tip,
                "Analyzed window"
            );
            self.cache.publish(report.clone());
            reports.push(report);
        }

        Ok(reports)
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::alerts::Alert;
    use burnscope_graph::memory::{record, MemoryLedger};
    use burnscope_graph::{EmptyRegistry, NoFees};

    impl Ledger for MemoryLedger {
        fn tip_height(&self) -> ScopeResult<Option<BurnHeight>> {
            let records = self.commits_in_range(0, BurnHeight::MAX)?;
            Ok(records.last().map(|r| r.burn_height))
        }
    }

    /// a <- b <- c, with d losing to c at 102
    pub(crate) fn fork_ledger() -> MemoryLedger {
        let mut ledger = MemoryLedger::new();
        ledger
            .commit(record("a", "SPMINERA", 100, 1, 1_000, None))
            .commit(record("b", "SPMINERA", 101, 1, 2_000, Some((100, 1))))
            .commit(record("c", "SPMINERB", 102, 1, 3_000, Some((101, 1))))
            .commit(record("d", "SPMINERA", 102, 2, 1_000, Some((101, 1))))
            .declare_winner(100, "a", 10)
            .declare_winner(101, "b", 11)
            .declare_winner(102, "c", 12)
            .tip(102, "c")
            .tip(101, "b");
        ledger
    }

    pub(crate) struct MemorySources(pub MemoryLedger);

    impl SourceOpener for MemorySources {
        type Ledger = MemoryLedger;
        type Fees = NoFees;

        fn open(&self) -> ScopeResult<(MemoryLedger, NoFees)> {
            Ok((self.0.clone(), NoFees))
        }
    }

    #[derive(Default)]
    struct CollectSink(Mutex<Vec<Alert>>);

    impl AlertSink for CollectSink {
        fn deliver(&self, alert: &Alert) {
            self.0.lock().push(alert.clone());
        }
    }

    pub(crate) fn test_config(output_dir: &std::path::Path) -> ScopeConfig {
        ScopeConfig {
            output_dir: output_dir.display().to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn test_sqlite_sources_follow_fee_settings() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = test_config(dir.path());

        let sources = SqliteSources::from_config(&config);
        assert_eq!(sources.fee_api_url.as_deref(), Some("https://mempool.space/api"));

        config.fetch_fees = false;
        config.fee_cache_path = Some(dir.path().join("fees.sqlite").display().to_string());
        let sources = SqliteSources::from_config(&config);
        assert_eq!(sources.fee_api_url, None);
        assert_eq!(sources.fee_cache_path, dir.path().join("fees.sqlite"));
    }

    #[test]
    fn test_report_basename() {
        assert_eq!(report_basename(0, 1, 20), "sample");
        assert_eq!(report_basename(0, 3, 20), "index");
        assert_eq!(report_basename(1, 3, 50), "50");
    }

    #[test]
    fn test_analyze_window() {
        let ledger = fork_ledger();
        let settings = AnalysisSettings {
            max_fork_depth: 3,
            cost_limits: CostLimits::default(),
            market_price: Some(500.0),
        };
        let report =
            analyze_window(&ledger, &NoFees, &EmptyRegistry, &settings, 102, 2).unwrap();

        assert_eq!((report.low, report.high), (100, 102));
        assert_eq!(report.canonical_tip, "c");
        assert_eq!(report.next_tip.as_deref(), Some("c"));
        assert_eq!(report.commits.len(), 4);
        assert_eq!(report.market_price, Some(500.0));
        assert_eq!(report.stats.blocks, 3);
    }

    #[test]
    fn test_run_once_writes_and_publishes() {
        let dir = tempfile::tempdir().unwrap();
        let cache = ReportCache::new();
        let sink = Arc::new(CollectSink::default());
        let runner = Runner::new(
            test_config(dir.path()),
            MemorySources(fork_ledger()),
            cache.clone(),
        )
        .with_sink(sink.clone());

        let reports = runner.run_once(None, &[1, 2]).unwrap();
        assert_eq!(reports.len(), 2);
        assert!(reports.iter().all(|r| r.start_height == 102));

        assert!(dir.path().join("index.json").exists());
        assert!(dir.path().join("2.json").exists());
        let text = std::fs::read_to_string(dir.path().join("index.json")).unwrap();
        let written = AnalysisReport::from_json(&text).unwrap();
        assert_eq!(written.span, 1);
        assert_eq!((written.low, written.high), (101, 102));

        assert_eq!(cache.spans(), vec![1, 2]);

        // both senders are unregistered; announced once across windows and runs
        runner.run_once(None, &[2]).unwrap();
        let alerts = sink.0.lock();
        assert_eq!(alerts.len(), 1);
        assert!(matches!(
            &alerts[0],
            Alert::NewMiners { block_height: 102, new_miners } if new_miners.len() == 2
        ));
        assert!(dir.path().join("sample.json").exists());
    }

    #[test]
    fn test_run_at_explicit_tip() {
        let dir = tempfile::tempdir().unwrap();
        let runner = Runner::new(
            test_config(dir.path()),
            MemorySources(fork_ledger()),
            ReportCache::new(),
        );

        let reports = runner.run_once(Some(101), &[1]).unwrap();
        assert_eq!(reports[0].canonical_tip, "b");
        assert_eq!(reports[0].high, 101);
    }

    #[test]
    fn test_run_failures() {
        let dir = tempfile::tempdir().unwrap();
        let runner = Runner::new(
            test_config(dir.path()),
            MemorySources(MemoryLedger::new()),
            ReportCache::new(),
        );
        assert!(matches!(runner.run_once(None, &[20]), Err(ScopeError::Source(_))));
        assert!(runner.run_once(Some(100), &[]).is_err());

        let runner = Runner::new(
            test_config(dir.path()),
            MemorySources(fork_ledger()),
            ReportCache::new(),
        );
        // no canonical tip recorded at 103
        let err = runner.run_once(Some(103), &[3]).unwrap_err();
        assert!(err.is_integrity());
        assert!(runner.cache().is_empty());
    }
}

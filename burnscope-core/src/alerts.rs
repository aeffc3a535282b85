//! Alert evaluation over window statistics.
//!
//! Watermarks live in memory: each alert kind is raised at most once per burn
//! height for the lifetime of the evaluator.

use std::collections::BTreeSet;

use burnscope_common::prelude::*;
use burnscope_graph::WindowStats;
use tracing::{debug, warn};

/// Number of most recent blocks the low-spend check averages over
pub const LOW_SPEND_BLOCKS: usize = 5;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Alert {
    /// Senders missing from the registry
    NewMiners {
        block_height: BurnHeight,
        new_miners: Vec<Address>,
    },
    /// One group spent more than the threshold in a single block
    HighSpend {
        group: String,
        block_height: BurnHeight,
        spend: Sats,
    },
    /// Recent network spend per token fell below a fraction of the market price
    LowSpend {
        block_height: BurnHeight,
        last5_price: u64,
        market_price: u64,
    },
}

impl std::fmt::Display for Alert {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Alert::NewMiners {
                block_height,
                new_miners,
            } => write!(
                f,
                "{} new miner(s) at block {}: {}",
                new_miners.len(),
                block_height,
                new_miners.join(", ")
            ),
            Alert::HighSpend {
                group,
                block_height,
                spend,
            } => write!(
                f,
                "High spend detected for block {}: group {} spent {} sats",
                block_height, group, spend
            ),
            Alert::LowSpend {
                block_height,
                last5_price,
                market_price,
            } => write!(
                f,
                "Low spend detected at block {}: {} sats/token (market {} sats/token)",
                block_height, last5_price, market_price
            ),
        }
    }
}

/// Destination for raised alerts
pub trait AlertSink: Send + Sync {
    fn deliver(&self, alert: &Alert);
}

/// Emits every alert as a warning
#[derive(Debug, Clone, Copy, Default)]
pub struct LogAlertSink;

impl AlertSink for LogAlertSink {
    fn deliver(&self, alert: &Alert) {
        match serde_json::to_string(alert) {
            Ok(payload) => warn!(alert = %payload, "{}", alert),
            Err(_) => warn!("{}", alert),
        }
    }
}

/// Thresholds that enable the spend alerts; `None` disables the check
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct AlertThresholds {
    pub group_spend_sats: Option<Sats>,
    pub low_total_spend: Option<f64>,
}

#[derive(Debug, Default)]
pub struct AlertEvaluator {
    thresholds: AlertThresholds,
    announced: BTreeSet<Address>,
    high_watermark: BurnHeight,
    low_watermark: BurnHeight,
}

impl AlertEvaluator {
    pub fn new(thresholds: AlertThresholds) -> Self {
        Self {
            thresholds,
            ..Default::default()
        }
    }

    pub fn high_watermark(&self) -> BurnHeight {
        self.high_watermark
    }

    pub fn low_watermark(&self) -> BurnHeight {
        self.low_watermark
    }

    /// Evaluate every alert kind against one window and advance the watermarks
    pub fn evaluate(&mut self, stats: &WindowStats, market_price: Option<f64>) -> Vec<Alert> {
        let mut alerts = Vec::new();
        alerts.extend(self.new_miners(stats));
        alerts.extend(self.high_spend(stats));
        alerts.extend(self.low_spend(stats, market_price));
        alerts
    }

    fn new_miners(&mut self, stats: &WindowStats) -> Option<Alert> {
        let block_height = *stats.spend_by_block.keys().next_back()?;
        let new_miners: Vec<Address> = stats
            .unknown_miners()
            .filter(|miner| self.announced.insert(miner.address.clone()))
            .map(|miner| miner.address.clone())
            .collect();

        if new_miners.is_empty() {
            return None;
        }
        Some(Alert::NewMiners {
            block_height,
            new_miners,
        })
    }

    fn high_spend(&mut self, stats: &WindowStats) -> Vec<Alert> {
        let Some(threshold) = self.thresholds.group_spend_sats.filter(|&t| t > 0) else {
            return Vec::new();
        };

        let start = self.high_watermark;
        let mut alerts = Vec::new();
        for (group, summary) in &stats.groups {
            for (&block_height, &spend) in summary.spend_by_block.range(start + 1..) {
                if spend > threshold {
                    alerts.push(Alert::HighSpend {
                        group: group.clone(),
                        block_height,
                        spend,
                    });
                }
                self.high_watermark = self.high_watermark.max(block_height);
            }
        }
        alerts
    }

    fn low_spend(&mut self, stats: &WindowStats, market_price: Option<f64>) -> Option<Alert> {
        let fraction = self.thresholds.low_total_spend?;
        let market_price = market_price?;

        let (newest, ratio) = stats.recent_price_ratio(LOW_SPEND_BLOCKS)?;
        if newest <= self.low_watermark {
            return None;
        }
        self.low_watermark = newest;

        let threshold = market_price * fraction;
        debug!(newest, ratio, threshold, "Checked recent spend");
        (ratio < threshold).then(|| Alert::LowSpend {
            block_height: newest,
            last5_price: ratio.round() as u64,
            market_price: market_price.round() as u64,
        })
    }
}

//! Per-group statistics over a marked window

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use burnscope_common::prelude::*;
use burnscope_common::types::MICRO_PER_TOKEN;
use tracing::debug;

use crate::canonical::ChainView;
use crate::registry::{MinerInfo, MinerRegistry};
use crate::source::FeeSource;

/// Sats spent per whole token earned
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PriceRatio {
    Finite(f64),
    /// Something was spent but nothing was earned
    Infinite,
}

impl PriceRatio {
    pub fn compute(total_spend: Sats, earned: MicroUnits) -> Self {
        if earned > 0 {
            let ratio = total_spend as f64 / (earned as f64 / MICRO_PER_TOKEN);
            Self::Finite(round2(ratio))
        } else if total_spend == 0 {
            Self::Finite(0.0)
        } else {
            Self::Infinite
        }
    }

    pub fn as_f64(&self) -> f64 {
        match self {
            Self::Finite(value) => *value,
            Self::Infinite => f64::INFINITY,
        }
    }
}

impl Default for PriceRatio {
    fn default() -> Self {
        Self::Finite(0.0)
    }
}

impl fmt::Display for PriceRatio {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Finite(value) => write!(f, "{:.2}", value),
            Self::Infinite => write!(f, "∞"),
        }
    }
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Aggregated results for one miner group. Percentages are fractions of the
/// window's block count.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GroupSummary {
    pub commits: u64,
    pub wins: u64,
    pub canonical: u64,
    pub spend: Sats,
    pub burn_fees: Sats,
    pub total_spend: Sats,
    pub coinbase_earned: MicroUnits,
    pub fees_earned: MicroUnits,
    pub total_earned: MicroUnits,
    /// Spend plus burn fee per burn height
    pub spend_by_block: BTreeMap<BurnHeight, Sats>,
    pub avg_spend_per_block: u64,
    pub win_percentage: f64,
    pub canonical_percentage: f64,
    pub orphan_rate: f64,
    pub price_ratio: PriceRatio,
}

#[derive(Debug, Default)]
struct GroupTally {
    commits: u64,
    wins: u64,
    canonical: u64,
    spend: Sats,
    burn_fees: Sats,
    coinbase_earned: MicroUnits,
    fees_earned: MicroUnits,
    spend_by_block: BTreeMap<BurnHeight, Sats>,
}

impl GroupTally {
    fn summarize(self, blocks: usize) -> GroupSummary {
        let total_spend = self.spend + self.burn_fees;
        let total_earned = self.coinbase_earned + self.fees_earned;
        let per_block = |count: u64| {
            if blocks == 0 {
                0.0
            } else {
                count as f64 / blocks as f64
            }
        };

        GroupSummary {
            commits: self.commits,
            wins: self.wins,
            canonical: self.canonical,
            spend: self.spend,
            burn_fees: self.burn_fees,
            total_spend,
            coinbase_earned: self.coinbase_earned,
            fees_earned: self.fees_earned,
            total_earned,
            spend_by_block: self.spend_by_block,
            avg_spend_per_block: per_block(self.spend).round() as u64,
            win_percentage: per_block(self.wins),
            canonical_percentage: per_block(self.canonical),
            orphan_rate: orphan_rate(self.wins, self.canonical),
            price_ratio: PriceRatio::compute(total_spend, total_earned),
        }
    }
}

fn orphan_rate(wins: u64, canonical: u64) -> f64 {
    if wins == 0 {
        0.0
    } else {
        wins.saturating_sub(canonical) as f64 / wins as f64
    }
}

/// Spend of every round committed at one burn height
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoundSummary {
    pub total_spend: Sats,
    /// Spend by senders in the tracked group
    pub tracked_spend: Sats,
}

impl RoundSummary {
    /// Tracked share of the round, 0 for an empty round
    pub fn tracked_share(&self) -> f64 {
        if self.total_spend == 0 {
            0.0
        } else {
            self.tracked_spend as f64 / self.total_spend as f64
        }
    }
}

/// Statistics for a whole analysis window
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WindowStats {
    /// Distinct burn heights with commits
    pub blocks: usize,
    pub groups: BTreeMap<String, GroupSummary>,
    /// Every sender seen in the window
    pub miners: BTreeMap<Address, MinerInfo>,
    pub spend_by_block: BTreeMap<BurnHeight, Sats>,
    pub earn_by_block: BTreeMap<BurnHeight, MicroUnits>,
    pub rounds: BTreeMap<BurnHeight, RoundSummary>,
    pub orphan_rate: f64,
}

impl WindowStats {
    /// Sats spent per token earned over the newest `count` blocks.
    /// `None` when nothing was earned in them.
    pub fn recent_price_ratio(&self, count: usize) -> Option<(BurnHeight, f64)> {
        let recent: Vec<BurnHeight> = self
            .spend_by_block
            .keys()
            .rev()
            .take(count)
            .copied()
            .collect();
        let newest = *recent.first()?;

        let spend: Sats = recent.iter().filter_map(|h| self.spend_by_block.get(h)).sum();
        let earned: MicroUnits = recent.iter().filter_map(|h| self.earn_by_block.get(h)).sum();
        if earned == 0 {
            return None;
        }
        Some((newest, spend as f64 / (earned as f64 / MICRO_PER_TOKEN)))
    }

    /// Senders the registry does not list
    pub fn unknown_miners(&self) -> impl Iterator<Item = &MinerInfo> {
        self.miners.values().filter(|miner| !miner.known)
    }
}

/// Roll up spend, earnings and win rates per group.
///
/// Earnings count only for canonical wins. A missing burn fee counts as 0.
pub fn collect_stats<R, F>(view: &ChainView, registry: &R, fees: &F) -> ScopeResult<WindowStats>
where
    R: MinerRegistry + ?Sized,
    F: FeeSource + ?Sized,
{
    let graph = view.graph();
    let blocks = graph.block_count();

    let mut tallies: BTreeMap<String, GroupTally> = BTreeMap::new();
    let mut miners: BTreeMap<Address, MinerInfo> = BTreeMap::new();
    let mut spend_by_block: BTreeMap<BurnHeight, Sats> = BTreeMap::new();
    let mut earn_by_block: BTreeMap<BurnHeight, MicroUnits> = BTreeMap::new();
    let mut rounds: BTreeMap<BurnHeight, RoundSummary> = BTreeMap::new();
    let mut counted_rounds: BTreeSet<(BurnHeight, &str)> = BTreeSet::new();
    let mut wins = 0u64;
    let mut orphans = 0u64;

    for (commit, marks) in view.entries() {
        let height = commit.burn_height;
        let miner = miners
            .entry(commit.sender.clone())
            .or_insert_with(|| registry.info(&commit.sender));
        let fee = fees.burn_fee(&commit.txid)?.unwrap_or(0);

        let tally = tallies.entry(miner.group.clone()).or_default();
        tally.commits += 1;
        tally.spend += commit.spend;
        tally.burn_fees += fee;
        *tally.spend_by_block.entry(height).or_insert(0) += commit.spend + fee;

        *spend_by_block.entry(height).or_insert(0) += commit.spend + fee;
        *earn_by_block.entry(height).or_insert(0) += marks.earnings.total();

        let round = rounds.entry(height).or_default();
        if counted_rounds.insert((height, commit.round_id.as_str())) {
            round.total_spend += graph.round_total(&commit.round_id);
        }
        if miner.tracked {
            round.tracked_spend += commit.spend;
        }

        if marks.won {
            wins += 1;
            tally.wins += 1;
            if marks.canonical {
                tally.canonical += 1;
                tally.coinbase_earned += marks.earnings.coinbase;
                tally.fees_earned += marks.earnings.fees;
            } else {
                orphans += 1;
            }
        }
    }

    let groups = tallies
        .into_iter()
        .map(|(group, tally)| (group, tally.summarize(blocks)))
        .collect();

    debug!(blocks, miners = miners.len(), wins, orphans, "Collected window stats");

    Ok(WindowStats {
        blocks,
        groups,
        miners,
        spend_by_block,
        earn_by_block,
        rounds,
        orphan_rate: orphan_rate(wins, wins - orphans),
    })
}

//! Honest vs colluding mining simulation.
//!
//! Each round one miner is drawn uniformly at random and mines a block.
//! Honest miners always extend the longest chain. Colluding miners extend
//! the best colluding block until the longest chain is more than `gap`
//! blocks ahead of it, then fall back to the longest chain.

use std::collections::BTreeMap;
use std::fmt::Write as _;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Id of a simulated block; the genesis block is 0
pub type BlockId = usize;

pub const GENESIS_MINER: &str = "genesis";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MinerKind {
    Honest,
    Colluding,
}

#[derive(Debug, Clone)]
pub struct SimMiner {
    pub id: String,
    pub kind: MinerKind,
    pub blocks_mined: u64,
}

impl SimMiner {
    pub fn honest(n: usize) -> Self {
        Self {
            id: format!("H{}", n),
            kind: MinerKind::Honest,
            blocks_mined: 0,
        }
    }

    pub fn colluding(n: usize) -> Self {
        Self {
            id: format!("C{}", n),
            kind: MinerKind::Colluding,
            blocks_mined: 0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SimBlock {
    pub id: BlockId,
    pub miner_id: String,
    pub parent: Option<BlockId>,
    pub height: u64,
}

/// A branch that left the longest chain at `base` and currently ends at `tip`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Fork {
    pub base: BlockId,
    pub tip: BlockId,
}

#[derive(Debug, Clone)]
pub struct SimChain {
    blocks: Vec<SimBlock>,
    tip: BlockId,
    colluding_tip: BlockId,
    /// Keyed by the fork's current tip
    forks: BTreeMap<BlockId, Fork>,
}

impl Default for SimChain {
    fn default() -> Self {
        Self::new()
    }
}

impl SimChain {
    pub fn new() -> Self {
        Self {
            blocks: vec![SimBlock {
                id: 0,
                miner_id: GENESIS_MINER.to_string(),
                parent: None,
                height: 0,
            }],
            tip: 0,
            colluding_tip: 0,
            forks: BTreeMap::new(),
        }
    }

    pub fn blocks(&self) -> &[SimBlock] {
        &self.blocks
    }

    pub fn block(&self, id: BlockId) -> Option<&SimBlock> {
        self.blocks.get(id)
    }

    pub fn tip(&self) -> &SimBlock {
        &self.blocks[self.tip]
    }

    pub fn colluding_tip(&self) -> &SimBlock {
        &self.blocks[self.colluding_tip]
    }

    pub fn forks(&self) -> impl Iterator<Item = &Fork> {
        self.forks.values()
    }

    pub fn fork_depth(&self, fork: &Fork) -> u64 {
        self.blocks[fork.tip].height - self.blocks[fork.base].height
    }

    /// Parent a miner of `kind` would build on
    pub fn parent_for(&self, kind: MinerKind, gap: u64) -> BlockId {
        match kind {
            MinerKind::Honest => self.tip,
            MinerKind::Colluding => {
                if self.tip().height > self.colluding_tip().height + gap {
                    self.tip
                } else {
                    self.colluding_tip
                }
            }
        }
    }

    /// Append a block on `parent`; an unknown parent is rejected with `None`
    pub fn add_block(&mut self, miner_id: &str, kind: MinerKind, parent: BlockId) -> Option<BlockId> {
        let height = self.blocks.get(parent)?.height + 1;
        let id = self.blocks.len();
        self.blocks.push(SimBlock {
            id,
            miner_id: miner_id.to_string(),
            parent: Some(parent),
            height,
        });

        let tip_height = self.tip().height;
        if parent != self.tip && height <= tip_height {
            let base = match self.forks.remove(&parent) {
                Some(extended) => extended.base,
                None => parent,
            };
            self.forks.insert(id, Fork { base, tip: id });
        }

        if height > tip_height {
            self.tip = id;
        }
        if kind == MinerKind::Colluding && height > self.colluding_tip().height {
            self.colluding_tip = id;
        }
        Some(id)
    }

    /// Blocks on the path from the longest tip back to genesis
    pub fn included_by_miner(&self) -> BTreeMap<String, u64> {
        let mut included = BTreeMap::new();
        let mut cursor = Some(self.tip);
        while let Some(id) = cursor {
            let block = &self.blocks[id];
            *included.entry(block.miner_id.clone()).or_insert(0) += 1;
            cursor = block.parent;
        }
        included
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SimConfig {
    pub honest: usize,
    pub colluding: usize,
    pub rounds: u64,
    pub gap: u64,
    /// Fixed seed for reproducible runs
    pub seed: Option<u64>,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            honest: 3,
            colluding: 2,
            rounds: 10_000,
            gap: 5,
            seed: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ForkSpan {
    pub from_height: u64,
    pub to_height: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MinerOutcome {
    pub id: String,
    pub kind: MinerKind,
    pub mined: u64,
    pub included: u64,
    pub confirmed_pct: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimStats {
    pub forks: Vec<ForkSpan>,
    pub max_depth: u64,
    pub abandoned: u64,
    /// Blocks mined, excluding genesis
    pub total_blocks: u64,
    pub abandoned_pct: f64,
    pub miners: Vec<MinerOutcome>,
    pub honest_confirmed_pct: f64,
    pub colluding_confirmed_pct: f64,
}

fn pct(part: u64, whole: u64) -> f64 {
    (part as f64 / whole as f64 * 10_000.0).round() / 100.0
}

impl SimStats {
    pub fn render(&self, verbose: bool) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "Fork statistics:");
        let _ = writeln!(out, "--------------------");
        let _ = writeln!(out, "  Num forks: {}", self.forks.len());
        if verbose {
            for fork in &self.forks {
                let _ = writeln!(out, "  * From height {} to {}", fork.from_height, fork.to_height);
            }
        }
        let _ = writeln!(out, "  Max depth: {}", self.max_depth);
        let _ = writeln!(
            out,
            "  Abandoned blocks: {}/{} ({}%)",
            self.abandoned, self.total_blocks, self.abandoned_pct
        );
        let _ = writeln!(out, "--------------------");
        let _ = writeln!(out, "Miner statistics:");
        if verbose {
            for miner in &self.miners {
                let _ = writeln!(
                    out,
                    "  * {}: {:>4} blocks mined, {:>4} blocks included: {}% confirmed",
                    miner.id, miner.mined, miner.included, miner.confirmed_pct
                );
            }
        }
        let _ = writeln!(out, "--------------------");
        let _ = writeln!(out, "  Honest miners:    {}% confirmed", self.honest_confirmed_pct);
        let _ = writeln!(out, "  Colluding miners: {}% confirmed", self.colluding_confirmed_pct);
        out
    }
}

pub struct Simulation {
    chain: SimChain,
    miners: Vec<SimMiner>,
    gap: u64,
}

impl Simulation {
    pub fn new(honest: usize, colluding: usize, gap: u64) -> Self {
        let miners = (1..=honest)
            .map(SimMiner::honest)
            .chain((1..=colluding).map(SimMiner::colluding))
            .collect();
        Self {
            chain: SimChain::new(),
            miners,
            gap,
        }
    }

    /// Build and run a simulation from `config`
    pub fn run(config: &SimConfig) -> Self {
        let mut rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        let mut sim = Self::new(config.honest, config.colluding, config.gap);
        for _ in 0..config.rounds {
            if sim.miners.is_empty() {
                break;
            }
            let index = rng.gen_range(0..sim.miners.len());
            sim.mine(index);
        }
        debug!(
            blocks = sim.chain.blocks().len(),
            tip_height = sim.chain.tip().height,
            "Simulation finished"
        );
        sim
    }

    /// Let the miner at `index` mine one block
    pub fn mine(&mut self, index: usize) -> Option<BlockId> {
        let miner = self.miners.get_mut(index)?;
        let parent = self.chain.parent_for(miner.kind, self.gap);
        let id = self.chain.add_block(&miner.id, miner.kind, parent)?;
        miner.blocks_mined += 1;
        Some(id)
    }

    pub fn chain(&self) -> &SimChain {
        &self.chain
    }

    pub fn miners(&self) -> &[SimMiner] {
        &self.miners
    }

    pub fn statistics(&self) -> SimStats {
        let chain = &self.chain;
        let forks: Vec<ForkSpan> = chain
            .forks()
            .map(|fork| ForkSpan {
                from_height: chain.blocks[fork.base].height + 1,
                to_height: chain.blocks[fork.tip].height,
            })
            .collect();
        let depths: Vec<u64> = chain.forks().map(|fork| chain.fork_depth(fork)).collect();
        let abandoned: u64 = depths.iter().sum();
        let total_blocks = chain.blocks().len() as u64 - 1;

        let included = chain.included_by_miner();
        let mut honest = (0u64, 0u64);
        let mut colluding = (0u64, 0u64);
        let miners = self
            .miners
            .iter()
            .map(|miner| {
                let kept = included.get(&miner.id).copied().unwrap_or(0);
                let totals = match miner.kind {
                    MinerKind::Honest => &mut honest,
                    MinerKind::Colluding => &mut colluding,
                };
                totals.0 += miner.blocks_mined;
                totals.1 += kept;
                MinerOutcome {
                    id: miner.id.clone(),
                    kind: miner.kind,
                    mined: miner.blocks_mined,
                    included: kept,
                    confirmed_pct: if miner.blocks_mined == 0 {
                        0.0
                    } else {
                        pct(kept, miner.blocks_mined)
                    },
                }
            })
            .collect();

        let group_pct = |(mined, kept): (u64, u64)| if mined == 0 { 100.0 } else { pct(kept, mined) };

        SimStats {
            forks,
            max_depth: depths.iter().copied().max().unwrap_or(0),
            abandoned,
            total_blocks,
            abandoned_pct: if total_blocks == 0 { 0.0 } else { pct(abandoned, total_blocks) },
            miners,
            honest_confirmed_pct: group_pct(honest),
            colluding_confirmed_pct: group_pct(colluding),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_honest_only_never_forks() {
        let sim = Simulation::run(&SimConfig {
            honest: 3,
            colluding: 0,
            rounds: 200,
            gap: 5,
            seed: Some(7),
        });
        let stats = sim.statistics();

        assert!(stats.forks.is_empty());
        assert_eq!(stats.total_blocks, 200);
        assert_eq!(sim.chain().tip().height, 200);
        assert_eq!(stats.honest_confirmed_pct, 100.0);
        assert_eq!(stats.colluding_confirmed_pct, 100.0);
    }

    #[test]
    fn test_fork_tracking() {
        let mut chain = SimChain::new();
        let b1 = chain.add_block("H1", MinerKind::Honest, 0).unwrap();
        let b2 = chain.add_block("H1", MinerKind::Honest, b1).unwrap();

        // sibling of b2 opens a fork based at b1
        let b3 = chain.add_block("C1", MinerKind::Colluding, b1).unwrap();
        assert_eq!(chain.forks().collect::<Vec<_>>(), vec![&Fork { base: b1, tip: b3 }]);
        assert_eq!(chain.tip().id, b2);
        assert_eq!(chain.colluding_tip().id, b3);

        // a second block on b1 is a fork of its own
        let b4 = chain.add_block("H2", MinerKind::Honest, b1).unwrap();
        assert_eq!(chain.forks().count(), 2);

        // extending the colluding branch past the tip moves the tip, no new fork
        let b5 = chain.add_block("C1", MinerKind::Colluding, b3).unwrap();
        assert_eq!(chain.tip().id, b5);
        assert_eq!(chain.forks().count(), 2);
        assert!(chain.forks().any(|f| f.tip == b4));

        assert!(chain.add_block("H1", MinerKind::Honest, 99).is_none());
    }

    #[test]
    fn test_fork_extension_keeps_base() {
        let mut chain = SimChain::new();
        let b1 = chain.add_block("H1", MinerKind::Honest, 0).unwrap();
        let b2 = chain.add_block("H1", MinerKind::Honest, b1).unwrap();
        let _b3 = chain.add_block("H1", MinerKind::Honest, b2).unwrap();

        let c1 = chain.add_block("C1", MinerKind::Colluding, b1).unwrap();
        let c2 = chain.add_block("C1", MinerKind::Colluding, c1).unwrap();
        let forks: Vec<_> = chain.forks().copied().collect();
        assert_eq!(forks, vec![Fork { base: b1, tip: c2 }]);
        assert_eq!(chain.fork_depth(&forks[0]), 2);
    }

    #[test]
    fn test_colluders_give_up_past_gap() {
        let mut chain = SimChain::new();
        let mut tip = 0;
        for _ in 0..3 {
            tip = chain.add_block("H1", MinerKind::Honest, tip).unwrap();
        }
        // colluding tip is still genesis, three behind
        assert_eq!(chain.parent_for(MinerKind::Colluding, 3), 0);
        assert_eq!(chain.parent_for(MinerKind::Colluding, 2), tip);
        assert_eq!(chain.parent_for(MinerKind::Honest, 0), tip);
    }

    #[test]
    fn test_statistics_of_known_chain() {
        let mut sim = Simulation::new(1, 1, 10);
        // H1 mines 1, C1 forks from genesis, H1 mines 2 on 1
        sim.mine(0);
        sim.mine(1);
        sim.mine(0);

        let stats = sim.statistics();
        assert_eq!(stats.total_blocks, 3);
        assert_eq!(stats.forks, vec![ForkSpan { from_height: 1, to_height: 1 }]);
        assert_eq!(stats.max_depth, 1);
        assert_eq!(stats.abandoned, 1);
        assert_eq!(stats.abandoned_pct, 33.33);
        assert_eq!(stats.honest_confirmed_pct, 100.0);
        assert_eq!(stats.colluding_confirmed_pct, 0.0);
        assert_eq!(stats.miners[0].included, 2);

        let text = stats.render(true);
        assert!(text.contains("Num forks: 1"));
        assert!(text.contains("* From height 1 to 1"));
    }

    #[test]
    fn test_seeded_runs_repeat() {
        let config = SimConfig {
            rounds: 500,
            seed: Some(42),
            ..Default::default()
        };
        let first = Simulation::run(&config).statistics();
        let second = Simulation::run(&config).statistics();
        assert_eq!(first, second);

        let mined: u64 = first.miners.iter().map(|m| m.mined).sum();
        assert_eq!(mined, 500);
    }
}

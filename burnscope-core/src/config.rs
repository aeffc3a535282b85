// config.rs - Configuration for burnscope-core
use std::collections::BTreeMap;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};

use burnscope_common::prelude::*;
use burnscope_common::types::{defaults, display};
use burnscope_graph::MinerRegistry;
use burnscope_store::{DEFAULT_FEE_API_URL, FEE_CACHE_DB};
use tracing::warn;

/// Registry entry for one miner address
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MinerEntry {
    pub name: Option<String>,
    pub group: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GroupEntry {
    pub color: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScopeConfig {
    /// Node working directory holding the sortition and chainstate databases
    pub db_path: String,

    /// Directory the JSON reports are written to
    pub output_dir: String,

    /// Burn-fee cache; defaults to a file inside `output_dir`
    pub fee_cache_path: Option<String>,

    /// Fetch fees missing from the cache from `fee_api_url`
    pub fetch_fees: bool,

    /// Base URL of a mempool.space compatible explorer API
    pub fee_api_url: String,

    /// Window spans analyzed per run, the first one is the primary report
    pub block_counts: Vec<u64>,

    /// How far below the canonical tip a live fork may sit and still be scored
    pub max_fork_depth: u64,

    /// Group whose share of each round is reported separately
    pub tracked_group: Option<String>,

    /// Count every sender as tracked, whatever its group
    pub track_all: bool,

    /// File containing the market price of one token in sats
    pub market_price_path: Option<String>,

    /// Group spend in one block above which a high-spend alert fires
    pub alert_group_spend_sats: Option<Sats>,

    /// Fraction of the market price below which recent spend is considered low
    pub alert_low_total_spend: Option<f64>,

    /// Address of the HTTP trigger endpoint
    pub observer_addr: SocketAddr,

    /// Address of the JSON-RPC server
    pub rpc_addr: SocketAddr,

    /// Log level (trace, debug, info, warn, error)
    pub log_level: String,

    /// Per-block execution ceilings
    pub cost_limits: CostLimits,

    pub miners: BTreeMap<Address, MinerEntry>,

    pub groups: BTreeMap<String, GroupEntry>,
}

impl Default for ScopeConfig {
    fn default() -> Self {
        Self {
            db_path: "./node".to_string(),
            output_dir: "./output".to_string(),
            fee_cache_path: None,
            fetch_fees: true,
            fee_api_url: DEFAULT_FEE_API_URL.to_string(),
            block_counts: defaults::BLOCK_COUNTS.to_vec(),
            max_fork_depth: defaults::MAX_FORK_DEPTH,
            tracked_group: None,
            track_all: false,
            market_price_path: None,
            alert_group_spend_sats: None,
            alert_low_total_spend: None,
            observer_addr: ([0, 0, 0, 0], 8080).into(),
            rpc_addr: ([127, 0, 0, 1], 8545).into(),
            log_level: "info".to_string(),
            cost_limits: CostLimits::default(),
            miners: BTreeMap::new(),
            groups: BTreeMap::new(),
        }
    }
}

impl ScopeConfig {
    /// Load and validate a TOML configuration file
    pub fn load(path: &Path) -> ScopeResult<Self> {
        let text = std::fs::read_to_string(path).map_err(|e| {
            ScopeError::config(format!("Failed to read {}: {}", path.display(), e))
        })?;
        let config = Self::from_toml(&text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_toml(text: &str) -> ScopeResult<Self> {
        toml::from_str(text).map_err(|e| ScopeError::config(format!("Invalid config: {}", e)))
    }

    /// Validate configuration
    pub fn validate(&self) -> ScopeResult<()> {
        if self.db_path.is_empty() {
            return Err(ScopeError::config("db_path cannot be empty"));
        }

        if self.output_dir.is_empty() {
            return Err(ScopeError::config("output_dir cannot be empty"));
        }

        ValidationUtils::validate_block_counts(&self.block_counts)
            .map_err(|e| ScopeError::config(e.to_string()))?;

        if self.fetch_fees && self.fee_api_url.is_empty() {
            return Err(ScopeError::config("fee_api_url cannot be empty while fetch_fees is set"));
        }

        if !self.cost_limits.is_valid() {
            return Err(ScopeError::config("cost_limits must all be greater than 0"));
        }

        if let Some(fraction) = self.alert_low_total_spend {
            if fraction.is_nan() || fraction <= 0.0 {
                return Err(ScopeError::config("alert_low_total_spend must be positive"));
            }
        }

        for address in self.miners.keys() {
            ValidationUtils::validate_address(address)
                .map_err(|e| ScopeError::config(format!("miners.{}: {}", address, e)))?;
        }

        Ok(())
    }

    /// Get the database path as PathBuf
    pub fn db_path(&self) -> PathBuf {
        PathBuf::from(&self.db_path)
    }

    pub fn output_dir(&self) -> PathBuf {
        PathBuf::from(&self.output_dir)
    }

    pub fn fee_cache_path(&self) -> PathBuf {
        match &self.fee_cache_path {
            Some(path) => PathBuf::from(path),
            None => self.output_dir().join(FEE_CACHE_DB),
        }
    }

    /// Read the market price; an absent or unreadable file yields `None`
    pub fn market_price(&self) -> Option<f64> {
        let path = self.market_price_path.as_ref()?;
        let text = match std::fs::read_to_string(path) {
            Ok(text) => text,
            Err(e) => {
                warn!(path = %path, error = %e, "Market price unavailable");
                return None;
            }
        };
        match text.trim().parse::<f64>() {
            Ok(price) if price.is_finite() && price > 0.0 => Some(price),
            _ => {
                warn!(path = %path, "Market price file does not hold a positive number");
                None
            }
        }
    }

    fn group_of(&self, sender: &str) -> Option<&str> {
        self.miners.get(sender)?.group.as_deref()
    }
}

impl MinerRegistry for ScopeConfig {
    fn classify(&self, sender: &str) -> String {
        self.group_of(sender)
            .unwrap_or(display::DEFAULT_GROUP)
            .to_string()
    }

    fn is_tracked(&self, sender: &str) -> bool {
        if self.track_all {
            return true;
        }
        match (&self.tracked_group, self.group_of(sender)) {
            (Some(tracked), Some(group)) => tracked == group,
            _ => false,
        }
    }

    fn display_name(&self, sender: &str) -> String {
        self.miners
            .get(sender)
            .and_then(|miner| miner.name.clone())
            .unwrap_or_else(|| display::short_name(sender))
    }

    fn color(&self, sender: &str) -> String {
        self.group_of(sender)
            .and_then(|group| self.groups.get(group))
            .and_then(|group| group.color.clone())
            .unwrap_or_else(|| display::DEFAULT_COLOR.to_string())
    }

    fn is_known(&self, sender: &str) -> bool {
        self.miners.contains_key(sender)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const SAMPLE: &str = r#"
        db_path = "/var/lib/node"
        block_counts = [20, 50]
        tracked_group = "Pool"

        [cost_limits]
        runtime = 1000

        [miners.SP1ALPHA]
        name = "alpha"
        group = "Pool"

        [miners.SP2BRAVO]
        name = "bravo"

        [groups.Pool]
        color = "orange"
    "#;

    #[test]
    fn test_defaults_are_valid() {
        let config = ScopeConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.max_fork_depth, 3);
        assert_eq!(config.block_counts, vec![20, 50, 100]);
        assert_eq!(config.fee_cache_path(), PathBuf::from("./output/bitcoin-tx.sqlite"));
        assert!(config.fetch_fees);
        assert_eq!(config.fee_api_url, "https://mempool.space/api");
        assert!(!config.track_all);
    }

    #[test]
    fn test_parse_partial_config() {
        let config = ScopeConfig::from_toml(SAMPLE).unwrap();
        assert_eq!(config.db_path(), PathBuf::from("/var/lib/node"));
        assert_eq!(config.block_counts, vec![20, 50]);
        assert_eq!(config.cost_limits.runtime, 1000);
        assert_eq!(config.cost_limits.write_count, 15_000);
        assert_eq!(config.rpc_addr.port(), 8545);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_registry_lookups() {
        let config = ScopeConfig::from_toml(SAMPLE).unwrap();

        assert_eq!(config.classify("SP1ALPHA"), "Pool");
        assert!(config.is_tracked("SP1ALPHA"));
        assert_eq!(config.color("SP1ALPHA"), "orange");

        assert_eq!(config.display_name("SP2BRAVO"), "bravo");
        assert_eq!(config.classify("SP2BRAVO"), "Other");
        assert!(!config.is_tracked("SP2BRAVO"));
        assert_eq!(config.color("SP2BRAVO"), "white");
        assert!(config.is_known("SP2BRAVO"));

        let stranger = config.info("SP3CHARLIEXYZ");
        assert_eq!(stranger.name, "SP3CHARL");
        assert_eq!(stranger.group, "Other");
        assert!(!stranger.known);
        assert!(!stranger.tracked);
    }

    #[test]
    fn test_track_all_counts_every_sender() {
        let mut config = ScopeConfig::from_toml(&format!("track_all = true\n{}", SAMPLE)).unwrap();
        assert!(config.track_all);
        assert!(config.is_tracked("SP1ALPHA"));
        assert!(config.is_tracked("SP2BRAVO"));
        assert!(config.is_tracked("SP3CHARLIEXYZ"));
        assert!(config.info("SP3CHARLIEXYZ").tracked);
        // grouping is unaffected
        assert_eq!(config.classify("SP3CHARLIEXYZ"), "Other");

        config.tracked_group = None;
        assert!(config.is_tracked("SP2BRAVO"));
        config.track_all = false;
        assert!(!config.is_tracked("SP1ALPHA"));
    }

    #[test]
    fn test_validation_failures() {
        let mut config = ScopeConfig::default();
        config.block_counts.clear();
        assert!(matches!(config.validate(), Err(ScopeError::Config(_))));

        let mut config = ScopeConfig::default();
        config.cost_limits.size = 0;
        assert!(config.validate().is_err());

        let mut config = ScopeConfig::default();
        config.alert_low_total_spend = Some(-0.5);
        assert!(config.validate().is_err());

        let mut config = ScopeConfig::default();
        config.fee_api_url.clear();
        assert!(config.validate().is_err());
        config.fetch_fees = false;
        assert!(config.validate().is_ok());

        assert!(ScopeConfig::from_toml("block_counts = \"twenty\"").is_err());
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("burnscope.toml");
        std::fs::File::create(&path)
            .unwrap()
            .write_all(SAMPLE.as_bytes())
            .unwrap();

        let config = ScopeConfig::load(&path).unwrap();
        assert_eq!(config.miners.len(), 2);
        assert!(ScopeConfig::load(&dir.path().join("missing.toml")).is_err());
    }

    #[test]
    fn test_market_price() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("price.txt");
        std::fs::write(&path, "1234.5\n").unwrap();

        let mut config = ScopeConfig::default();
        assert_eq!(config.market_price(), None);

        config.market_price_path = Some(path.display().to_string());
        assert_eq!(config.market_price(), Some(1234.5));

        std::fs::write(&path, "n/a").unwrap();
        assert_eq!(config.market_price(), None);

        config.market_price_path = Some(dir.path().join("gone.txt").display().to_string());
        assert_eq!(config.market_price(), None);
    }
}

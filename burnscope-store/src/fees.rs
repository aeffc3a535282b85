//! Burn transaction fees: a local SQLite cache, filled on a miss from a
//! block explorer's HTTP API

use std::cell::Cell;
use std::path::Path;
use std::time::Duration;

use burnscope_common::prelude::*;
use burnscope_graph::FeeSource;
use rusqlite::{params, Connection, OptionalExtension};
use tracing::{debug, warn};

/// Default cache file name inside the output directory
pub const FEE_CACHE_DB: &str = "bitcoin-tx.sqlite";

/// Explorer API queried for fees missing from the cache
pub const DEFAULT_FEE_API_URL: &str = "https://mempool.space/api";

const FETCH_TIMEOUT: Duration = Duration::from_secs(10);

/// SQLite table of `txid -> fee` for commit transactions
pub struct FeeCache {
    conn: Connection,
}

impl FeeCache {
    /// Open the cache, creating the file and table if needed
    pub fn open(path: &Path) -> ScopeResult<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        Self::init(Connection::open(path)?)
    }

    pub fn open_in_memory() -> ScopeResult<Self> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(conn: Connection) -> ScopeResult<Self> {
        conn.execute(
            "CREATE TABLE IF NOT EXISTS bitcoin_transactions (
                txid TEXT PRIMARY KEY,
                fee INTEGER
            )",
            [],
        )?;
        Ok(Self { conn })
    }

    pub fn record_fee(&self, txid: &str, fee: Sats) -> ScopeResult<()> {
        self.conn.execute(
            "INSERT OR REPLACE INTO bitcoin_transactions (txid, fee) VALUES (?1, ?2)",
            params![txid, fee as i64],
        )?;
        debug!(txid, fee, "Cached burn fee");
        Ok(())
    }

    pub fn len(&self) -> ScopeResult<usize> {
        let count: i64 =
            self.conn
                .query_row("SELECT COUNT(*) FROM bitcoin_transactions", [], |row| row.get(0))?;
        Ok(count as usize)
    }

    pub fn is_empty(&self) -> ScopeResult<bool> {
        Ok(self.len()? == 0)
    }
}

impl FeeSource for FeeCache {
    fn burn_fee(&self, txid: &Txid) -> ScopeResult<Option<Sats>> {
        let fee: Option<Option<i64>> = self
            .conn
            .query_row(
                "SELECT fee FROM bitcoin_transactions WHERE txid = ?1",
                params![txid],
                |row| row.get(0),
            )
            .optional()?;
        Ok(fee.flatten().map(|fee| fee.max(0) as Sats))
    }
}

/// Remote lookup of the fee a burn-chain transaction paid
pub trait FeeFetcher {
    /// `Ok(None)` when the API does not know the transaction
    fn fetch_fee(&self, txid: &str) -> ScopeResult<Option<Sats>>;
}

#[derive(Debug, Deserialize)]
struct TxFee {
    fee: Sats,
}

/// Fetches fees from a mempool.space compatible `GET {base}/tx/{txid}`
pub struct MempoolFetcher {
    base_url: String,
    client: reqwest::blocking::Client,
}

impl MempoolFetcher {
    /// Must not be called from inside an async context
    pub fn new(base_url: impl Into<String>) -> ScopeResult<Self> {
        let client = reqwest::blocking::Client::builder()
            .timeout(FETCH_TIMEOUT)
            .build()
            .map_err(|e| ScopeError::network(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            client,
        })
    }

    pub fn tx_url(&self, txid: &str) -> String {
        format!("{}/tx/{}", self.base_url, txid)
    }
}

impl FeeFetcher for MempoolFetcher {
    fn fetch_fee(&self, txid: &str) -> ScopeResult<Option<Sats>> {
        let response = self
            .client
            .get(self.tx_url(txid))
            .send()
            .map_err(|e| ScopeError::network(format!("Fee request for {} failed: {}", txid, e)))?;

        if !response.status().is_success() {
            debug!(txid, status = %response.status(), "Fee API has no record");
            return Ok(None);
        }

        let body: TxFee = response
            .json()
            .map_err(|e| ScopeError::network(format!("Bad fee response for {}: {}", txid, e)))?;
        Ok(Some(body.fee))
    }
}

/// Cache-first fee source that fetches misses and writes them back.
///
/// After the first transport failure the fetcher is skipped for the rest of
/// this source's life, so an unreachable API costs one timeout per run.
pub struct FetchingFeeSource<F> {
    cache: FeeCache,
    fetcher: Option<F>,
    offline: Cell<bool>,
}

impl<F: FeeFetcher> FetchingFeeSource<F> {
    pub fn new(cache: FeeCache, fetcher: F) -> Self {
        Self {
            cache,
            fetcher: Some(fetcher),
            offline: Cell::new(false),
        }
    }

    /// Serve only what is already cached
    pub fn cache_only(cache: FeeCache) -> Self {
        Self {
            cache,
            fetcher: None,
            offline: Cell::new(false),
        }
    }

    pub fn cache(&self) -> &FeeCache {
        &self.cache
    }
}

impl<F: FeeFetcher> FeeSource for FetchingFeeSource<F> {
    fn burn_fee(&self, txid: &Txid) -> ScopeResult<Option<Sats>> {
        if let Some(fee) = self.cache.burn_fee(txid)? {
            return Ok(Some(fee));
        }

        let Some(fetcher) = self.fetcher.as_ref() else {
            return Ok(None);
        };
        if self.offline.get() {
            return Ok(None);
        }

        match fetcher.fetch_fee(txid) {
            Ok(Some(fee)) => {
                self.cache.record_fee(txid, fee)?;
                Ok(Some(fee))
            }
            Ok(None) => Ok(None),
            Err(e) => {
                warn!(txid = %txid, "Burn fee lookup failed, using cached fees only: {}", e);
                self.offline.set(true);
                Ok(None)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use tracing_test::traced_test;

    /// Answers from a fixed table, or fails every call
    #[derive(Default)]
    struct ScriptedFetcher {
        fees: HashMap<String, Sats>,
        unreachable: bool,
        calls: Cell<usize>,
    }

    impl FeeFetcher for ScriptedFetcher {
        fn fetch_fee(&self, txid: &str) -> ScopeResult<Option<Sats>> {
            self.calls.set(self.calls.get() + 1);
            if self.unreachable {
                return Err(ScopeError::network("connection refused"));
            }
            Ok(self.fees.get(txid).copied())
        }
    }

    #[test]
    fn test_lookup_and_replace() {
        let cache = FeeCache::open_in_memory().unwrap();
        assert!(cache.is_empty().unwrap());
        assert_eq!(cache.burn_fee(&"tx-a".to_string()).unwrap(), None);

        cache.record_fee("tx-a", 1_200).unwrap();
        cache.record_fee("tx-a", 1_500).unwrap();
        assert_eq!(cache.burn_fee(&"tx-a".to_string()).unwrap(), Some(1_500));
        assert_eq!(cache.len().unwrap(), 1);
    }

    #[test]
    fn test_persists_across_opens() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("output").join(FEE_CACHE_DB);

        FeeCache::open(&path).unwrap().record_fee("tx-b", 42).unwrap();

        let cache = FeeCache::open(&path).unwrap();
        assert_eq!(cache.burn_fee(&"tx-b".to_string()).unwrap(), Some(42));
    }

    #[test]
    fn test_null_fee_is_unknown() {
        let cache = FeeCache::open_in_memory().unwrap();
        cache
            .conn
            .execute("INSERT INTO bitcoin_transactions VALUES ('tx-c', NULL)", [])
            .unwrap();
        assert_eq!(cache.burn_fee(&"tx-c".to_string()).unwrap(), None);
    }

    #[test]
    fn test_miss_is_fetched_and_cached() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(FEE_CACHE_DB);
        let fetcher = ScriptedFetcher {
            fees: HashMap::from([("tx-a".to_string(), 2_750)]),
            ..Default::default()
        };
        let source = FetchingFeeSource::new(FeeCache::open(&path).unwrap(), fetcher);

        assert_eq!(source.burn_fee(&"tx-a".to_string()).unwrap(), Some(2_750));
        assert_eq!(source.burn_fee(&"tx-a".to_string()).unwrap(), Some(2_750));
        assert_eq!(source.fetcher.as_ref().unwrap().calls.get(), 1);

        // unknown to the API: not cached, asked again next time
        assert_eq!(source.burn_fee(&"tx-b".to_string()).unwrap(), None);
        assert_eq!(source.cache().len().unwrap(), 1);

        drop(source);
        let reopened = FeeCache::open(&path).unwrap();
        assert_eq!(reopened.burn_fee(&"tx-a".to_string()).unwrap(), Some(2_750));
    }

    #[test]
    #[traced_test]
    fn test_unreachable_api_falls_back_to_cache() {
        let cache = FeeCache::open_in_memory().unwrap();
        cache.record_fee("tx-known", 300).unwrap();
        let fetcher = ScriptedFetcher {
            unreachable: true,
            ..Default::default()
        };
        let source = FetchingFeeSource::new(cache, fetcher);

        assert_eq!(source.burn_fee(&"tx-known".to_string()).unwrap(), Some(300));
        assert_eq!(source.burn_fee(&"tx-x".to_string()).unwrap(), None);
        assert_eq!(source.burn_fee(&"tx-y".to_string()).unwrap(), None);
        assert_eq!(source.fetcher.as_ref().unwrap().calls.get(), 1);
        assert!(logs_contain("Burn fee lookup failed"));
    }

    #[test]
    fn test_cache_only_never_fetches() {
        let source: FetchingFeeSource<ScriptedFetcher> =
            FetchingFeeSource::cache_only(FeeCache::open_in_memory().unwrap());
        assert_eq!(source.burn_fee(&"tx-a".to_string()).unwrap(), None);
    }

    #[test]
    fn test_tx_url() {
        let fetcher = MempoolFetcher::new("https://mempool.example/api/").unwrap();
        assert_eq!(fetcher.tx_url("abcd"), "https://mempool.example/api/tx/abcd");
    }
}

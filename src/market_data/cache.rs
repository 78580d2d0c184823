use super::types::{PriceTable, Ticker};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;

#[derive(Clone)]
pub struct CachedTable {
    pub data: Arc<PriceTable>,
    pub cached_at: Instant,
}

pub type PriceCache = Arc<RwLock<HashMap<Ticker, CachedTable>>>;

pub fn create_cache() -> PriceCache {
    Arc::new(RwLock::new(HashMap::new()))
}

impl CachedTable {
    fn is_expired(&self, ttl: Option<Duration>) -> bool {
        ttl.is_some_and(|ttl| self.cached_at.elapsed() > ttl)
    }
}

/// Cached table for `ticker`, unless it is older than `ttl`. Expired entries
/// are evicted.
pub async fn lookup(cache: &PriceCache, ticker: &Ticker, ttl: Option<Duration>) -> Option<Arc<PriceTable>> {
    {
        let guard = cache.read().await;
        let entry = guard.get(ticker)?;
        if !entry.is_expired(ttl) {
            return Some(entry.data.clone());
        }
    }

    let mut guard = cache.write().await;
    if guard.get(ticker).is_some_and(|entry| entry.is_expired(ttl)) {
        guard.remove(ticker);
    }
    None
}

/// Insert `table` and drop every other expired entry.
pub async fn store(cache: &PriceCache, ticker: &Ticker, table: Arc<PriceTable>, ttl: Option<Duration>) {
    let mut guard = cache.write().await;
    guard.retain(|_, entry| !entry.is_expired(ttl));
    guard.insert(
        ticker.clone(),
        CachedTable {
            data: table,
            cached_at: Instant::now(),
        },
    );
}

//! Asset metadata cache
//!
//! In-memory cache to avoid repeated `symbol()` / `decimals()` calls for the
//! same token contract.
//!
//! Strategy:
//! - Bounded capacity, least-recently-used eviction, no expiry.
//! - Single-flight population: the first lookup of an address installs a
//!   cell and resolves it; concurrent lookups of the same address wait on
//!   that cell instead of issuing their own calls.

use crate::asset::{resolve_asset_info, AssetInfo};
use crate::node::ContractCaller;
use alloy_primitives::Address;
use lru::LruCache;
use std::num::NonZeroUsize;
use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::OnceCell;
use tracing::debug;

/// Cache for token identity and scale, keyed by contract address.
///
/// Cheap to share: wrap it in an `Arc` and hand the same instance to every
/// block read.
pub struct AssetCache<C> {
    caller: Arc<C>,
    /// Map of contract address -> (possibly still resolving) asset info
    entries: Mutex<LruCache<Address, Arc<OnceCell<AssetInfo>>>>,
}

impl<C: ContractCaller> AssetCache<C> {
    /// Create a new empty cache holding at most `capacity` contracts.
    pub fn new(caller: Arc<C>, capacity: NonZeroUsize) -> Self {
        Self {
            caller,
            entries: Mutex::new(LruCache::new(capacity)),
        }
    }

    /// Look up a contract, resolving it on the first request.
    ///
    /// Never fails: contracts that do not answer get the address as identity
    /// and a scale of zero.
    pub async fn get(&self, contract: Address) -> AssetInfo {
        let cell = {
            let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
            entries
                .get_or_insert(contract, || Arc::new(OnceCell::new()))
                .clone()
        };

        let caller = self.caller.as_ref();
        cell.get_or_init(|| async move {
            debug!(%contract, "Asset cache miss, resolving metadata");
            resolve_asset_info(caller, contract).await
        })
        .await
        .clone()
    }

    /// Check if a contract is cached (resolved or resolving), without
    /// touching its recency.
    pub fn contains(&self, contract: &Address) -> bool {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .contains(contract)
    }

    /// Number of cached contracts.
    pub fn len(&self) -> usize {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::asset::tests::{abi_string, abi_uint};
    use crate::node::mock::MockCaller;
    use alloy_primitives::address;
    use std::time::Duration;

    fn token(n: u8) -> Address {
        Address::with_last_byte(n)
    }

    fn capacity(n: usize) -> NonZeroUsize {
        NonZeroUsize::new(n).unwrap()
    }

    #[tokio::test]
    async fn test_cache_operations() {
        let addr = address!("00000000000000000000000000000000000000cc");
        let caller = MockCaller::default()
            .with_output(addr, "symbol", abi_string("TKN"))
            .with_output(addr, "decimals", abi_uint(6));
        let caller = Arc::new(caller);
        let cache = AssetCache::new(caller.clone(), capacity(10));

        // Initially not cached
        assert!(!cache.contains(&addr));

        let first = cache.get(addr).await;
        assert_eq!(first.asset.id, "TKN");
        assert_eq!(first.scale, 6);
        assert!(cache.contains(&addr));

        // Second lookup is served from the cache
        let second = cache.get(addr).await;
        assert_eq!(first, second);
        assert_eq!(caller.calls(), 2);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_lookups_resolve_once() {
        let addr = token(1);
        let caller = MockCaller {
            delay: Some(Duration::from_millis(50)),
            ..MockCaller::default()
        }
        .with_output(addr, "symbol", abi_string("TKN"))
        .with_output(addr, "decimals", abi_uint(6));
        let caller = Arc::new(caller);
        let cache = Arc::new(AssetCache::new(caller.clone(), capacity(10)));

        let handles: Vec<_> = (0..16)
            .map(|_| {
                let cache = cache.clone();
                tokio::spawn(async move { cache.get(addr).await })
            })
            .collect();

        let mut results = Vec::new();
        for handle in handles {
            results.push(handle.await.unwrap());
        }

        // one resolution = one symbol() + one decimals() call
        assert_eq!(caller.calls(), 2);
        assert!(results.iter().all(|info| *info == results[0]));
        assert_eq!(results[0].asset.id, "TKN");
    }

    #[tokio::test]
    async fn test_least_recently_used_is_evicted() {
        let caller = Arc::new(MockCaller::default());
        let cache = AssetCache::new(caller.clone(), capacity(2));

        cache.get(token(1)).await;
        cache.get(token(2)).await;
        // touch 1 so that 2 becomes the eviction candidate
        cache.get(token(1)).await;
        cache.get(token(3)).await;

        assert_eq!(cache.len(), 2);
        assert!(cache.contains(&token(1)));
        assert!(!cache.contains(&token(2)));
        assert!(cache.contains(&token(3)));

        // evicted entry is resolved again on demand
        let before = caller.calls();
        cache.get(token(2)).await;
        assert_eq!(caller.calls(), before + 2);
    }
}

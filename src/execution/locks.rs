use crate::storage::persistent::{self, DbPool};
use crate::types::error::TradeError;
use std::collections::HashSet;
use std::sync::{Arc, Mutex};
use tokio::runtime::Handle;
use tracing::{debug, warn};

/// Re-entrancy guard over `(user, mint)`. The in-memory set is a fast path;
/// the trade_locks row is the authoritative cross-instance decision, with a
/// TTL so a crashed holder cannot wedge the pair forever.
#[derive(Clone)]
pub struct TradeLocks {
    pool: DbPool,
    instance_id: String,
    local: Arc<Mutex<HashSet<String>>>,
}

impl TradeLocks {
    pub fn new(pool: DbPool, instance_id: String) -> Self {
        Self {
            pool,
            instance_id,
            local: Arc::new(Mutex::new(HashSet::new())),
        }
    }

    pub fn lock_key(user_id: i32, mint: &str) -> String {
        format!("trade:{user_id}:{mint}")
    }

    pub async fn acquire(
        &self,
        user_id: i32,
        mint: &str,
        operation: &str,
    ) -> Result<TradeLockGuard, TradeError> {
        let key = Self::lock_key(user_id, mint);
        {
            let mut local = self.local.lock().unwrap();
            if !local.insert(key.clone()) {
                return Err(TradeError::ConcurrentOperation);
            }
        }
        match persistent::try_acquire_trade_lock(&self.pool, &key, operation, &self.instance_id)
            .await
        {
            Ok(true) => {
                debug!(key = %key, "trade lock acquired");
                Ok(TradeLockGuard {
                    key,
                    locks: self.clone(),
                    released: false,
                })
            }
            Ok(false) => {
                self.local.lock().unwrap().remove(&key);
                Err(TradeError::ConcurrentOperation)
            }
            Err(e) => {
                self.local.lock().unwrap().remove(&key);
                Err(e)
            }
        }
    }
}

/// Held for the duration of one trade. Dropping without an explicit release
/// (cancellation, panic unwind) still frees the local slot and best-effort
/// deletes the row; the row TTL covers a hard crash.
pub struct TradeLockGuard {
    key: String,
    locks: TradeLocks,
    released: bool,
}

impl TradeLockGuard {
    pub async fn release(mut self) {
        self.released = true;
        self.locks.local.lock().unwrap().remove(&self.key);
        if let Err(e) =
            persistent::release_trade_lock(&self.locks.pool, &self.key, &self.locks.instance_id)
                .await
        {
            warn!(key = %self.key, error = %e, "failed to release trade lock row, TTL will reclaim it");
        }
    }
}

impl Drop for TradeLockGuard {
    fn drop(&mut self) {
        if self.released {
            return;
        }
        self.locks.local.lock().unwrap().remove(&self.key);
        let pool = self.locks.pool.clone();
        let key = self.key.clone();
        let instance_id = self.locks.instance_id.clone();
        if let Ok(handle) = Handle::try_current() {
            handle.spawn(async move {
                let _ = persistent::release_trade_lock(&pool, &key, &instance_id).await;
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lock_key_scopes_user_and_mint() {
        assert_eq!(TradeLocks::lock_key(7, "MintA"), "trade:7:MintA");
        assert_ne!(
            TradeLocks::lock_key(7, "MintA"),
            TradeLocks::lock_key(8, "MintA")
        );
        assert_ne!(
            TradeLocks::lock_key(7, "MintA"),
            TradeLocks::lock_key(7, "MintB")
        );
    }
}

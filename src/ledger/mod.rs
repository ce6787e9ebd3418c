//! Ledger orchestration: the hot-path trade application service and the
//! replay/rebuild engine, sharing one set of per-(user, mint) write locks.

pub mod rebuild;
pub mod service;

pub use rebuild::{CancelFlag, RebuildAnomaly, RebuildEngine, RebuildReport};
pub use service::{LedgerService, TradeOutcome};

use crate::domain::{Mint, UserId};
use std::collections::HashMap;
use std::sync::{Arc, Mutex as StdMutex};
use tokio::sync::{Mutex as TokioMutex, OwnedMutexGuard};

/// Per-(user, mint) async mutexes enforcing the single-writer invariant.
///
/// FIFO consumption order and the insufficient-inventory check are only
/// correct under serialized access to a position; distinct keys proceed in
/// parallel. Both the hot path and the rebuild engine acquire through the
/// same instance.
#[derive(Default)]
pub struct KeyLocks {
    inner: StdMutex<HashMap<(UserId, Mint), Arc<TokioMutex<()>>>>,
}

impl KeyLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Acquire the write lock for one (user, mint). Held until dropped.
    pub async fn acquire(&self, user: &UserId, mint: &Mint) -> OwnedMutexGuard<()> {
        let lock = {
            let mut map = self.inner.lock().expect("key lock map poisoned");
            map.entry((user.clone(), mint.clone()))
                .or_insert_with(|| Arc::new(TokioMutex::new(())))
                .clone()
        };
        lock.lock_owned().await
    }
}

//! Live unrealized-PnL fan-out.
//!
//! Consumes the price-tick bus and publishes one watch channel per subscribed
//! (user, mint). Watch channels keep only the latest value, so a slow
//! subscriber sees the freshest figure instead of a growing queue. This path
//! only reads positions; it never writes ledger state.

use crate::db::Repository;
use crate::domain::{Mint, UserId};
use crate::engine::{mark_position, PnlUpdate};
use crate::error::LedgerError;
use crate::pricefeed::PriceTick;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, RwLock};
use tokio::sync::{broadcast, watch};
use tracing::{debug, warn};

pub struct PnlBroadcaster {
    repo: Arc<Repository>,
    /// Last observed price per mint; consulted when a tick is missing so a
    /// stale-but-present value wins over no value.
    last_prices: RwLock<HashMap<Mint, PriceTick>>,
    subscribers: Mutex<HashMap<(UserId, Mint), watch::Sender<Option<PnlUpdate>>>>,
}

impl PnlBroadcaster {
    pub fn new(repo: Arc<Repository>) -> Self {
        Self {
            repo,
            last_prices: RwLock::new(HashMap::new()),
            subscribers: Mutex::new(HashMap::new()),
        }
    }

    /// Subscribe to unrealized-PnL updates for a (user, mint).
    ///
    /// The receiver starts at the latest computed value (None until a price
    /// has been seen). Repeated subscriptions to the same key share one
    /// channel. Dropping every receiver ends the subscription; explicit
    /// [`unsubscribe`](Self::unsubscribe) ends it immediately.
    pub async fn subscribe(
        &self,
        user: &UserId,
        mint: &Mint,
    ) -> watch::Receiver<Option<PnlUpdate>> {
        let (sender, receiver) = {
            let mut subs = self.subscribers.lock().expect("subscriber map poisoned");
            match subs.get(&(user.clone(), mint.clone())) {
                Some(sender) => (sender.clone(), sender.subscribe()),
                None => {
                    let (tx, rx) = watch::channel(None);
                    subs.insert((user.clone(), mint.clone()), tx.clone());
                    (tx, rx)
                }
            }
        };

        // Seed from the cached price so a new subscriber is not blind until
        // the next tick.
        match self.current(user, mint).await {
            Ok(Some(update)) => {
                let _ = sender.send(Some(update));
            }
            Ok(None) => {}
            Err(e) => {
                warn!(user = %user, mint = %mint, error = %e, "failed to seed subscription");
            }
        }

        receiver
    }

    /// Drop the subscription for a (user, mint).
    ///
    /// Idempotent: unsubscribing a key that was never subscribed (or already
    /// unsubscribed) is a no-op.
    pub fn unsubscribe(&self, user: &UserId, mint: &Mint) {
        let mut subs = self.subscribers.lock().expect("subscriber map poisoned");
        subs.remove(&(user.clone(), mint.clone()));
    }

    /// Latest observed price for a mint, if any tick has arrived.
    pub fn last_price(&self, mint: &Mint) -> Option<PriceTick> {
        self.last_prices
            .read()
            .expect("price cache poisoned")
            .get(mint)
            .cloned()
    }

    /// Compute the current unrealized PnL from the cached price.
    ///
    /// Returns None when no price has been observed yet or the user has no
    /// position row for the mint.
    pub async fn current(
        &self,
        user: &UserId,
        mint: &Mint,
    ) -> Result<Option<PnlUpdate>, LedgerError> {
        let Some(tick) = self.last_price(mint) else {
            return Ok(None);
        };
        let Some(position) = self.repo.query_position(user, mint).await? else {
            return Ok(None);
        };
        Ok(Some(mark_position(&position, tick.price, tick.time_ms)))
    }

    /// Consume the tick bus until it closes.
    ///
    /// Lagging behind the bus drops the missed ticks and continues with the
    /// newest; PnL is a current-state signal, not an event log.
    pub async fn run(self: Arc<Self>, mut ticks: broadcast::Receiver<PriceTick>) {
        loop {
            match ticks.recv().await {
                Ok(tick) => self.on_tick(tick).await,
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    debug!(skipped, "pnl broadcaster lagged; dropping stale ticks");
                }
                Err(broadcast::error::RecvError::Closed) => break,
            }
        }
    }

    async fn on_tick(&self, tick: PriceTick) {
        self.last_prices
            .write()
            .expect("price cache poisoned")
            .insert(tick.mint.clone(), tick.clone());

        // Snapshot the live senders for this mint, pruning closed ones.
        let targets: Vec<(UserId, watch::Sender<Option<PnlUpdate>>)> = {
            let mut subs = self.subscribers.lock().expect("subscriber map poisoned");
            subs.retain(|_, sender| !sender.is_closed());
            subs.iter()
                .filter(|((_, mint), _)| *mint == tick.mint)
                .map(|((user, _), sender)| (user.clone(), sender.clone()))
                .collect()
        };

        for (user, sender) in targets {
            let position = match self.repo.query_position(&user, &tick.mint).await {
                Ok(Some(position)) => position,
                Ok(None) => continue,
                Err(e) => {
                    warn!(
                        user = %user,
                        mint = %tick.mint,
                        error = %e,
                        "position read failed during pnl tick"
                    );
                    continue;
                }
            };

            let update = mark_position(&position, tick.price, tick.time_ms);
            let _ = sender.send(Some(update));
        }
    }
}

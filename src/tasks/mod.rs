//! Periodic background work: warm pool maintenance and inactivity
//! reclamation. Each pass is self-contained and never fails as a whole;
//! [`run_scheduler`] drives both on their own intervals.

pub mod pool;
pub mod reclaim;
pub mod sessions;

pub use pool::{PoolMaintainer, PoolReport};
pub use reclaim::{ReclaimReport, Reclaimer};
pub use sessions::{SessionManager, SessionRegistry};

use std::future::Future;
use std::time::Duration;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, info};

/// Runs pool maintenance every `pool_every` and reclamation every
/// `reclaim_every` until `shutdown` resolves.
///
/// Both passes run once immediately. A pass in progress finishes before
/// shutdown is observed.
pub async fn run_scheduler<F>(
    pool: PoolMaintainer,
    reclaimer: Reclaimer,
    pool_every: Duration,
    reclaim_every: Duration,
    shutdown: F,
) where
    F: Future<Output = ()>,
{
    let mut pool_tick = interval(pool_every);
    pool_tick.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let mut reclaim_tick = interval(reclaim_every);
    reclaim_tick.set_missed_tick_behavior(MissedTickBehavior::Delay);

    tokio::pin!(shutdown);

    info!(
        pool_interval_secs = pool_every.as_secs(),
        reclaim_interval_secs = reclaim_every.as_secs(),
        "background tasks started"
    );

    loop {
        tokio::select! {
            biased;
            () = &mut shutdown => break,
            _ = pool_tick.tick() => {
                let report = pool.run().await;
                debug!(?report, "pool pass finished");
            }
            _ = reclaim_tick.tick() => {
                let report = reclaimer.run().await;
                debug!(?report, "reclaim pass finished");
            }
        }
    }

    info!("background tasks stopped");
}

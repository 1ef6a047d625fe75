use std::{sync::Arc, time::Duration};

use tokio::{task::JoinHandle, time::MissedTickBehavior};
use tracing::{debug, info, warn};

use super::SessionStore;

/// Run one expiry pass. Failures are logged and reported as zero removals so
/// the periodic task keeps going.
pub async fn sweep_once(store: &dyn SessionStore) -> u64 {
    match store.delete_expired().await {
        Ok(0) => {
            debug!("session sweep found nothing to remove");
            0
        }
        Ok(n) => {
            info!(removed = n, "sweep removed sessions");
            n
        }
        Err(e) => {
            warn!(error = %e, "session sweep failed");
            0
        }
    }
}

/// Spawn the periodic sweeper. Abort the handle on shutdown.
pub fn spawn(store: Arc<dyn SessionStore>, every: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(every);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            sweep_once(store.as_ref()).await;
        }
    })
}

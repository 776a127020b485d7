use std::time::Duration;

use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info};

use crate::db::dbcollab;
use crate::db::store::CollabStore;

/// Periodically deactivate markers whose expiry has passed.
///
/// One bulk update per tick; no per-marker broadcasts. Clients honor
/// marker TTLs locally, so the short viewing TTL bounds how long a
/// stale marker can render. A failed sweep is retried on the next tick.
pub async fn run_expiry_sweeper(interval: Duration) {
    info!("Expiry sweeper running every {}s", interval.as_secs());

    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        ticker.tick().await;

        let Some(db) = dbcollab::get_db() else {
            debug!("Expiry sweep skipped: database not initialized");
            continue;
        };

        match db.deactivate_expired_markers().await {
            Ok(0) => debug!("Expiry sweep: no expired markers"),
            Ok(n) => info!("Expiry sweep deactivated {} marker(s)", n),
            Err(e) => error!("Expiry sweep failed: {}. Retrying on the next interval", e),
        }
    }
}

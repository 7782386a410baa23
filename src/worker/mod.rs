use std::time::Duration;

use time::OffsetDateTime;
use tokio::time::sleep;
use tracing::{error, info};

use crate::state::AppState;

/// Per-pass ceiling so one sweep cannot monopolize the pool after downtime.
const SWEEP_BATCH_LIMIT: i64 = 500;

/// Spawns the expiry sweep. The sweep is the safety net behind the
/// `checkout.session.expired` webhook: if that delivery is lost, seats held
/// by an abandoned checkout still come back within one interval.
pub async fn start_background_workers(state: AppState) {
    tokio::spawn(async move {
        let interval = Duration::from_secs(state.config.sweep_interval_seconds);
        let expiry = time::Duration::minutes(state.config.checkout_expiry_minutes);
        loop {
            sleep(interval).await;

            let cutoff = OffsetDateTime::now_utc() - expiry;
            match state.settlement.expire_overdue(cutoff, SWEEP_BATCH_LIMIT).await {
                Ok(0) => {}
                Ok(expired) => {
                    info!(expired, "expiry sweep reclaimed stale reservations");
                }
                Err(err) => {
                    error!(?err, "expiry sweep failed");
                }
            }
        }
    });
}

//! Periodic rank refresh
//!
//! Rebuilds all rankings on a fixed interval so positions stay consistent
//! even if a write was interrupted between processes sharing the database.

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, error, info};

use crate::services::engine::ScoringEngine;

/// Spawn the refresh loop
///
/// The loop exits once `shutdown` carries `true` or its sender is dropped.
/// The first rebuild runs one full `period` after spawning.
pub fn spawn_rank_refresh(
    engine: Arc<ScoringEngine>,
    period: Duration,
    mut shutdown: watch::Receiver<bool>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        info!("Rank refresh every {}s", period.as_secs());

        let mut ticker = interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // First tick completes immediately
        ticker.tick().await;

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    match engine.recompute_all_rankings().await {
                        Ok(users) => debug!(users, "Periodic rank refresh complete"),
                        Err(e) => error!("Periodic rank refresh failed: {}", e),
                    }
                }
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        info!("Rank refresh stopped");
                        break;
                    }
                }
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RuntimeSettings;
    use crate::services::accumulator::MetricObservation;
    use vortex_common::events::EventBus;
    use vortex_common::{db::init_memory_database, MetricCategory};

    #[tokio::test]
    async fn test_refresh_runs_and_stops() {
        let pool = init_memory_database().await.unwrap();
        let bus = Arc::new(EventBus::new(16));
        let engine = Arc::new(ScoringEngine::new(pool, Arc::clone(&bus), RuntimeSettings::default()));
        engine
            .record_metric(&MetricObservation::new(1, MetricCategory::Creator, "peer_reviews", 2.0))
            .await
            .unwrap();

        let mut rx = bus.subscribe();
        let (tx, shutdown) = watch::channel(false);
        let handle = spawn_rank_refresh(Arc::clone(&engine), Duration::from_millis(50), shutdown);

        let event = tokio::time::timeout(Duration::from_secs(5), rx.recv())
            .await
            .expect("refresh did not run")
            .unwrap();
        assert_eq!(event.event_type(), "RankingsRecomputed");

        tx.send(true).unwrap();
        tokio::time::timeout(Duration::from_secs(5), handle)
            .await
            .expect("refresh did not stop")
            .unwrap();
    }
}

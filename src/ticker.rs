use std::sync::Arc;
use std::time::Duration;
use tokio::time::{ self, Instant, MissedTickBehavior };
use tokio_util::sync::CancellationToken;

use crate::engine::PluginEvents;

/// Period of the host timer driving the engine
pub const TICK_PERIOD: Duration = Duration::from_secs(1);

/// Drive `events.on_tick` once per `period` until `shutdown` is cancelled.
///
/// A tick in progress (and the network call inside it) runs to completion before the
/// cancellation is observed.
pub async fn run<E>(events: Arc<E>, period: Duration, shutdown: CancellationToken)
    where E: PluginEvents + ?Sized
{
    let mut interval = time::interval_at(Instant::now() + period, period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

    tracing::debug!("Ticker started");
    let mut counter: u64 = 0;

    loop {
        tokio::select! {
            _ = shutdown.cancelled() => break,
            _ = interval.tick() => {
                counter += 1;
                events.on_tick(counter).await;
            }
        }
    }

    tracing::debug!(ticks = counter, "Ticker stopped");
}

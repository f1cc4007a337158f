use crate::bus::BusClient;
use crate::protocol::{self, TOPIC_PUMP_STATE, TOPIC_SOIL_MOISTURE};
use crate::state::{DeviceState, TelemetryEvent};
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::time::{self, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Periodic telemetry task.
///
/// Each tick drifts the sensor under the device lock, publishes the new
/// reading, and lets the automatic rule act on it. Publish failures are
/// logged and never stop the loop; the next tick publishes fresh state.
/// Cancellation is cooperative and only takes effect between ticks, so a
/// tick's mutation is never left half-applied.
pub struct TelemetrySimulator {
    state: Arc<DeviceState>,
    client: Arc<BusClient>,
    events: broadcast::Sender<TelemetryEvent>,
    tick_period: Duration,
    cancel: CancellationToken,
}

impl TelemetrySimulator {
    pub fn new(
        state: Arc<DeviceState>,
        client: Arc<BusClient>,
        events: broadcast::Sender<TelemetryEvent>,
        tick_period: Duration,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            state,
            client,
            events,
            tick_period,
            cancel,
        }
    }

    pub async fn run(self) {
        let mut rng = StdRng::from_entropy();
        let mut interval = time::interval(self.tick_period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // The first interval tick completes immediately; the first drift
        // should land one full period after start.
        interval.tick().await;

        info!(period_ms = self.tick_period.as_millis() as u64, "telemetry simulator started");
        loop {
            tokio::select! {
                _ = self.cancel.cancelled() => break,
                _ = interval.tick() => self.tick(&mut rng),
            }
        }
        info!("telemetry simulator stopped");
    }

    fn tick(&self, rng: &mut StdRng) {
        let event = self.state.tick_moisture(rng);
        debug!(
            moisture = event.moisture,
            previous = event.previous,
            pump = %event.pump,
            "sensor tick"
        );

        let payload = protocol::moisture_payload(event.moisture);
        if let Err(error) = self.client.publish(TOPIC_SOIL_MOISTURE, payload.as_str()) {
            warn!(%error, "telemetry publish failed");
        }

        // No receivers just means no front end is watching right now.
        let _ = self.events.send(event);

        if let Some(pump) = self.state.auto_transition() {
            info!(%pump, moisture = event.moisture, "automatic rule switched pump");
            if let Err(error) = self.client.publish(TOPIC_PUMP_STATE, pump.as_payload()) {
                warn!(%error, "pump state publish failed");
            }
        }
    }
}

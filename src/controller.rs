use crate::bus::{Broker, BusClient, BusError};
use crate::config::SimulatorConfig;
use crate::ingest;
use crate::protocol::{Mode, PumpState, TOPIC_PUMP_COMMAND, TOPIC_SET_MODE};
use crate::simulator::TelemetrySimulator;
use crate::state::{DeviceState, Snapshot, TelemetryEvent};
use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::info;

const TELEMETRY_EVENT_BUFFER: usize = 256;

/// Wires the device core together and exposes the collaborator interface
/// front ends consume: an atomic snapshot for display, command issue calls
/// that go through the same bus path as any remote writer, and a telemetry
/// event stream.
pub struct IrrigationController {
    state: Arc<DeviceState>,
    client: Arc<BusClient>,
    events: broadcast::Sender<TelemetryEvent>,
    cancel: CancellationToken,
    simulator_task: Mutex<Option<JoinHandle<()>>>,
}

impl IrrigationController {
    /// Connect to the broker, register command ingest, and spawn the
    /// telemetry simulator. Must run inside a tokio runtime.
    pub fn start(config: &SimulatorConfig, broker: &Broker) -> Result<Self, BusError> {
        let state = Arc::new(DeviceState::new());
        let client = Arc::new(broker.connect(&config.broker_address)?);

        ingest::register_handlers(&client, Arc::clone(&state))?;

        let (events, _) = broadcast::channel(TELEMETRY_EVENT_BUFFER);
        let cancel = CancellationToken::new();
        let simulator = TelemetrySimulator::new(
            Arc::clone(&state),
            Arc::clone(&client),
            events.clone(),
            config.tick_period,
            cancel.clone(),
        );
        let simulator_task = tokio::spawn(simulator.run());

        info!(broker = %broker.address(), "irrigation controller started");
        Ok(Self {
            state,
            client,
            events,
            cancel,
            simulator_task: Mutex::new(Some(simulator_task)),
        })
    }

    /// Read-only consistent view for display surfaces.
    pub fn snapshot(&self) -> Snapshot {
        self.state.snapshot()
    }

    /// Equivalent to publishing on the pump command topic.
    pub fn issue_pump_command(&self, pump: PumpState) -> Result<(), BusError> {
        self.client.publish(TOPIC_PUMP_COMMAND, pump.as_payload())
    }

    /// Equivalent to publishing on the mode command topic.
    pub fn issue_mode_command(&self, mode: Mode) -> Result<(), BusError> {
        self.client.publish(TOPIC_SET_MODE, mode.as_payload())
    }

    /// Subscribe to per-tick telemetry events (lossy under backpressure,
    /// as display surfaces only care about recency).
    pub fn subscribe_telemetry(&self) -> broadcast::Receiver<TelemetryEvent> {
        self.events.subscribe()
    }

    /// Cooperative shutdown: stop accepting ticks, let the in-flight tick
    /// finish, then disconnect from the bus.
    pub async fn shutdown(&self) {
        self.cancel.cancel();
        let task = self
            .simulator_task
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(task) = task {
            let _ = task.await;
        }
        self.client.disconnect().await;
        info!("irrigation controller stopped");
    }
}

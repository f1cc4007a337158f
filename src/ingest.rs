use crate::bus::{BusClient, BusError, BusMessage};
use crate::protocol::{self, DeviceCommand, TOPIC_PUMP_COMMAND, TOPIC_SET_MODE};
use crate::state::DeviceState;
use std::sync::Arc;
use tracing::{debug, info};

/// Register the two command handlers on the bus client.
///
/// Both run on the delivery task and do nothing beyond the O(1) state
/// mutation. Handlers are idempotent and independent across topics.
pub fn register_handlers(client: &BusClient, state: Arc<DeviceState>) -> Result<(), BusError> {
    let pump_state = Arc::clone(&state);
    client.subscribe(TOPIC_PUMP_COMMAND, move |message| {
        apply(&pump_state, message);
    })?;
    client.subscribe(TOPIC_SET_MODE, move |message| {
        apply(&state, message);
    })?;
    Ok(())
}

fn apply(state: &DeviceState, message: &BusMessage) {
    match protocol::parse_command(message.topic.as_str(), message.payload.as_str()) {
        // A pump command is an unconditional override: it applies in
        // automatic mode too, and holds until the rule next disagrees.
        Ok(DeviceCommand::SetPump(pump)) => {
            if state.set_pump(pump) {
                info!(%pump, "pump state set by bus command");
            }
        }
        Ok(DeviceCommand::SetMode(mode)) => {
            if state.set_mode(mode) {
                info!(%mode, "operating mode set by bus command");
            }
        }
        // Deliberate ignore-unknown-input policy: dropped, never an error.
        Err(_) => {
            debug!(topic = %message.topic, payload = %message.payload, "malformed command dropped");
        }
    }
}

use arrayvec::ArrayString;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

pub const MAX_TOPIC_SIZE: usize = 64;
pub const MAX_PAYLOAD_SIZE: usize = 64;

pub type TopicBuffer = ArrayString<MAX_TOPIC_SIZE>;
pub type PayloadBuffer = ArrayString<MAX_PAYLOAD_SIZE>;

// Bus topics shared by the device and every front end.
pub const TOPIC_SOIL_MOISTURE: &str = "iot/sensor/soil_moisture";
pub const TOPIC_PUMP_COMMAND: &str = "iot/actuator/pump_command";
pub const TOPIC_SET_MODE: &str = "iot/mode/set_mode";
pub const TOPIC_PUMP_STATE: &str = "iot/status/pump_state";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PumpState {
    On,
    Off,
}

impl PumpState {
    pub fn as_payload(&self) -> &'static str {
        match self {
            PumpState::On => "ON",
            PumpState::Off => "OFF",
        }
    }
}

impl fmt::Display for PumpState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_payload())
    }
}

impl FromStr for PumpState {
    type Err = ProtocolError;

    // Payloads are case-sensitive on the wire: "ON" / "OFF" only.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "ON" => Ok(PumpState::On),
            "OFF" => Ok(PumpState::Off),
            _ => Err(ProtocolError::MalformedPayload),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Mode {
    Manual,
    Automatic,
}

impl Mode {
    pub fn as_payload(&self) -> &'static str {
        match self {
            Mode::Manual => "Manual",
            Mode::Automatic => "Automatic",
        }
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_payload())
    }
}

impl FromStr for Mode {
    type Err = ProtocolError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Manual" => Ok(Mode::Manual),
            "Automatic" => Ok(Mode::Automatic),
            _ => Err(ProtocolError::MalformedPayload),
        }
    }
}

/// A validated inbound command, produced at the bus boundary so the typed
/// core never compares raw payload strings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceCommand {
    SetPump(PumpState),
    SetMode(Mode),
}

/// Parse a raw (topic, payload) pair into a typed command.
///
/// Unknown topics and malformed payloads both yield an error; the ingest
/// layer drops them without touching device state.
pub fn parse_command(topic: &str, payload: &str) -> Result<DeviceCommand, ProtocolError> {
    match topic {
        TOPIC_PUMP_COMMAND => payload.parse().map(DeviceCommand::SetPump),
        TOPIC_SET_MODE => payload.parse().map(DeviceCommand::SetMode),
        _ => Err(ProtocolError::UnknownTopic),
    }
}

/// Format a moisture reading as its wire payload ("0".."100").
pub fn moisture_payload(moisture: u8) -> PayloadBuffer {
    let mut buf = PayloadBuffer::new();
    // u8 always fits in the payload buffer.
    let _ = fmt::Write::write_fmt(&mut buf, format_args!("{}", moisture));
    buf
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ProtocolError {
    #[error("payload does not match the expected values for its topic")]
    MalformedPayload,
    #[error("no handler registered for topic")]
    UnknownTopic,
}

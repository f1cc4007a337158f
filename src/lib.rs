//! # Irrigation Controller Simulator
//!
//! A networked irrigation controller simulation library: a soil-moisture
//! sensor that drifts with pump activity, a pump actuator driven by multiple
//! independent command sources, and a MANUAL/AUTOMATIC operating mode, all
//! connected over an in-memory publish/subscribe message bus.
//!
//! ## Features
//!
//! - **Concurrency-safe device state**: atomic snapshots and mutations, no
//!   torn reads between the simulator tick and command ingest
//! - **Periodic telemetry simulation**: cancellable tick task that drifts the
//!   sensor and publishes readings
//! - **Two-threshold automatic control**: hysteresis band prevents pump
//!   oscillation near the setpoint
//! - **Typed command ingest**: payloads are parsed and validated at the bus
//!   boundary; unknown input is dropped, never fatal
//! - **Pub/sub bus abstraction**: per-topic ordered delivery on a dedicated
//!   task, fallible publish that never stops the control loop
//!
//! ## Quick Start
//!
//! ```no_run
//! use irrisim::{Broker, IrrigationController, PumpState, SimulatorConfig};
//!
//! # #[tokio::main]
//! # async fn main() -> Result<(), irrisim::BusError> {
//! let config = SimulatorConfig::default();
//! let broker = Broker::new(config.broker_address.clone());
//! let controller = IrrigationController::start(&config, &broker)?;
//!
//! // Front ends read and drive the same device concurrently.
//! controller.issue_pump_command(PumpState::On)?;
//! let snapshot = controller.snapshot();
//! println!("moisture: {}%", snapshot.moisture);
//!
//! controller.shutdown().await;
//! # Ok(())
//! # }
//! ```
//!
//! ## Architecture
//!
//! - [`state`] - shared device state machine and its atomic operations
//! - [`simulator`] - periodic telemetry simulator task
//! - [`control`] - automatic control rule (pure decision function)
//! - [`ingest`] - bus-delivered command handlers
//! - [`bus`] - in-memory pub/sub broker and client abstraction
//! - [`controller`] - wiring and the front-end collaborator interface
//! - [`protocol`] - topics, payload buffers, and boundary parsing

pub mod bus;
pub mod config;
pub mod control;
pub mod controller;
pub mod ingest;
pub mod protocol;
pub mod simulator;
pub mod state;

// Re-export main public types for convenience
pub use bus::{Broker, BusClient, BusError, BusMessage};
pub use config::SimulatorConfig;
pub use controller::IrrigationController;
pub use protocol::{Mode, PumpState};
pub use state::{DeviceState, Snapshot, TelemetryEvent};

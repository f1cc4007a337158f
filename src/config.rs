use std::time::Duration;

pub const DEFAULT_BROKER_ADDRESS: &str = "mem://irrisim";
pub const DEFAULT_TICK_PERIOD: Duration = Duration::from_secs(10);
pub const DEFAULT_LISTEN_PORT: u16 = 8080;

/// Process-start configuration for the device core. Supplied once at boot;
/// there is no runtime reconfiguration.
#[derive(Debug, Clone)]
pub struct SimulatorConfig {
    /// Bus address the core connects to.
    pub broker_address: String,
    /// Telemetry simulator tick period.
    pub tick_period: Duration,
}

impl Default for SimulatorConfig {
    fn default() -> Self {
        Self {
            broker_address: DEFAULT_BROKER_ADDRESS.to_string(),
            tick_period: DEFAULT_TICK_PERIOD,
        }
    }
}

impl SimulatorConfig {
    pub fn with_tick_period(mut self, period: Duration) -> Self {
        self.tick_period = period;
        self
    }

    pub fn with_broker_address(mut self, address: impl Into<String>) -> Self {
        self.broker_address = address.into();
        self
    }
}

use crate::control;
use crate::protocol::{Mode, PumpState};
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::ops::RangeInclusive;
use std::sync::{Mutex, MutexGuard, PoisonError};

pub const MOISTURE_MAX: u8 = 100;
pub const INITIAL_MOISTURE: u8 = 100;

// Per-tick drift, sampled uniformly. Watering raises moisture faster than
// evaporation drains it.
pub const PUMP_ON_DRIFT: RangeInclusive<u8> = 10..=15;
pub const PUMP_OFF_DRIFT: RangeInclusive<u8> = 5..=10;

/// An atomically captured, internally consistent view of the device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Snapshot {
    pub moisture: u8,
    pub pump: PumpState,
    pub mode: Mode,
}

/// One simulator tick's worth of telemetry: the reading before and after
/// the drift, and the pump state the drift was computed against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TelemetryEvent {
    pub previous: u8,
    pub moisture: u8,
    pub pump: PumpState,
}

#[derive(Debug)]
struct Inner {
    moisture: u8,
    pump: PumpState,
    mode: Mode,
}

/// The single source of truth for the simulated device.
///
/// Every operation is one short critical section; mutations never run
/// against a cached read from an earlier section, so a command landing
/// between two operations can never be silently overwritten.
#[derive(Debug)]
pub struct DeviceState {
    inner: Mutex<Inner>,
}

impl DeviceState {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(Inner {
                moisture: INITIAL_MOISTURE,
                pump: PumpState::Off,
                mode: Mode::Manual,
            }),
        }
    }

    // A poisoned lock only means a panicking thread died mid-section;
    // the invariants hold after every write, so recover the guard.
    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn snapshot(&self) -> Snapshot {
        let inner = self.lock();
        Snapshot {
            moisture: inner.moisture,
            pump: inner.pump,
            mode: inner.mode,
        }
    }

    /// Set the pump unconditionally. Returns true when the state changed.
    pub fn set_pump(&self, pump: PumpState) -> bool {
        let mut inner = self.lock();
        let changed = inner.pump != pump;
        inner.pump = pump;
        changed
    }

    /// Set the operating mode. Returns true when the state changed.
    pub fn set_mode(&self, mode: Mode) -> bool {
        let mut inner = self.lock();
        let changed = inner.mode != mode;
        inner.mode = mode;
        changed
    }

    /// Apply one tick of sensor drift.
    ///
    /// The pump read, the drift computation, and the moisture write all
    /// happen under the same lock: the returned event's `pump` is the state
    /// the delta was actually computed against.
    pub fn tick_moisture(&self, rng: &mut impl Rng) -> TelemetryEvent {
        let mut inner = self.lock();
        let previous = inner.moisture;

        inner.moisture = match inner.pump {
            PumpState::On => previous
                .saturating_add(rng.gen_range(PUMP_ON_DRIFT))
                .min(MOISTURE_MAX),
            PumpState::Off => previous.saturating_sub(rng.gen_range(PUMP_OFF_DRIFT)),
        };

        TelemetryEvent {
            previous,
            moisture: inner.moisture,
            pump: inner.pump,
        }
    }

    /// Evaluate the automatic control rule against the current state and
    /// commit any transition it demands, all in one critical section.
    ///
    /// Returns the new pump state when a transition was applied; `None` in
    /// manual mode or inside the hysteresis band.
    pub fn auto_transition(&self) -> Option<PumpState> {
        let mut inner = self.lock();
        if inner.mode != Mode::Automatic {
            return None;
        }

        let target = control::target_pump_state(inner.moisture, inner.pump)?;
        inner.pump = target;
        Some(target)
    }
}

impl Default for DeviceState {
    fn default() -> Self {
        Self::new()
    }
}

use crate::protocol::PumpState;

// Two-threshold hysteresis: the pump latches ON at or below the low
// threshold and only releases once moisture climbs past the high one.
// A single threshold would oscillate every tick near the setpoint.
pub const PUMP_ON_THRESHOLD: u8 = 30;
pub const PUMP_OFF_THRESHOLD: u8 = 40;

/// Decide the pump transition for the current moisture reading.
///
/// Returns `Some(target)` only when the target differs from `current`;
/// inside the band `(PUMP_ON_THRESHOLD, PUMP_OFF_THRESHOLD]` the pump
/// holds its state.
pub fn target_pump_state(moisture: u8, current: PumpState) -> Option<PumpState> {
    let target = if moisture <= PUMP_ON_THRESHOLD {
        PumpState::On
    } else if moisture > PUMP_OFF_THRESHOLD {
        PumpState::Off
    } else {
        return None;
    };

    (target != current).then_some(target)
}

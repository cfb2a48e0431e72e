//! Actuator trigger policies.
//!
//! Each policy is a parameter set plus a separately owned state value. The
//! policy computes the desired actuator state; it never talks to the
//! actuator. Callers compare the returned state with the previous one and
//! only write on a change.

use glam::DVec3;

/// State of the periodic pulse policy.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct PulseState {
    pub asserted: bool,
    /// Time the current (or most recent) pulse began, or the session start.
    pub last_pulse_time: f64,
}

/// Fixed duty-cycle square wave, gated by session activity.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PeriodicPulse {
    /// Seconds between pulse starts.
    pub interval: f64,
    /// Seconds each pulse stays on.
    pub duration: f64,
}

impl PeriodicPulse {
    pub fn evaluate(&self, state: &mut PulseState, now: f64, session_active: bool) -> bool {
        if !state.asserted && session_active && now - state.last_pulse_time >= self.interval {
            state.asserted = true;
            state.last_pulse_time = now;
        }
        if state.asserted && now - state.last_pulse_time >= self.duration {
            state.asserted = false;
        }
        state.asserted
    }
}

/// State of the threshold hold policy.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct HoldState {
    pub asserted: bool,
    /// When the arming condition started holding continuously.
    pub hold_start: Option<f64>,
    /// Last tick on which the asserting condition held.
    pub last_asserted_time: Option<f64>,
}

/// Spatial + speed gate with a debounce to engage and a grace period to release.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ThresholdHold {
    pub target_position: DVec3,
    pub distance_threshold: f64,
    pub speed_threshold: f64,
    pub required_hold_time: f64,
    pub grace_time: f64,
}

impl ThresholdHold {
    /// Whether a sample at `position` moving at `speed` qualifies.
    pub fn is_armed(&self, speed: f64, position: Option<DVec3>) -> bool {
        position.is_some_and(|p| {
            p.distance(self.target_position) <= self.distance_threshold
                && speed >= self.speed_threshold
        })
    }

    pub fn evaluate(
        &self,
        state: &mut HoldState,
        now: f64,
        speed: f64,
        position: Option<DVec3>,
    ) -> bool {
        if self.is_armed(speed, position) {
            let hold_start = *state.hold_start.get_or_insert(now);
            if now - hold_start >= self.required_hold_time {
                state.asserted = true;
                // Refreshed on every qualifying tick: grace counts from the
                // last good sample, not from when the actuator came on.
                state.last_asserted_time = Some(now);
            }
        } else {
            state.hold_start = None;
            if state.asserted
                && state
                    .last_asserted_time
                    .is_some_and(|last| now - last > self.grace_time)
            {
                state.asserted = false;
            }
        }
        state.asserted
    }
}

/// The active policy together with the state it owns.
#[derive(Debug, Clone)]
pub enum TriggerController {
    Periodic {
        policy: PeriodicPulse,
        state: PulseState,
    },
    Threshold {
        policy: ThresholdHold,
        state: HoldState,
    },
}

impl TriggerController {
    pub fn periodic(policy: PeriodicPulse) -> Self {
        Self::Periodic {
            policy,
            state: PulseState::default(),
        }
    }

    pub fn threshold(policy: ThresholdHold) -> Self {
        Self::Threshold {
            policy,
            state: HoldState::default(),
        }
    }

    /// Desired actuator state for a sample at `now`.
    ///
    /// `position` is only consulted by the threshold policy and
    /// `session_active` only by the periodic one.
    pub fn evaluate(
        &mut self,
        now: f64,
        speed: f64,
        position: Option<DVec3>,
        session_active: bool,
    ) -> bool {
        match self {
            Self::Periodic { policy, state } => policy.evaluate(state, now, session_active),
            Self::Threshold { policy, state } => policy.evaluate(state, now, speed, position),
        }
    }

    /// Anchor timers at the start of a new session.
    pub fn on_session_start(&mut self, now: f64) {
        match self {
            Self::Periodic { state, .. } => {
                *state = PulseState {
                    asserted: false,
                    last_pulse_time: now,
                };
            }
            Self::Threshold { state, .. } => state.hold_start = None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Periodic { .. } => "periodic_pulse",
            Self::Threshold { .. } => "threshold_hold",
        }
    }
}

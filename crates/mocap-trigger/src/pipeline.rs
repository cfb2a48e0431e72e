use crate::session::{SessionBoundaryDetector, SessionEvent};
use crate::speed::{NoiseBands, SpeedEstimator};
use crate::trigger::{PeriodicPulse, ThresholdHold, TriggerController};
use glam::DVec3;
use mocap_config::{AppConfig, ClockSource, LiveGate, PolicyKind};
use mocap_feed::{FrameInfo, PoseSample};
use mocap_sink::{ActuatorChannel, LogRow, SampleRecorder};
use tracing::{debug, info, trace, warn};

/// Wall-clock sample spacing below this means records were stamped in a
/// burst (coalesced reads or a replayed file) rather than as they arrived.
const MIN_WALL_DT: f64 = 0.001;

/// What happened to one live pose sample.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SampleOutcome {
    pub speed: f64,
    pub actuator_state: bool,
    /// Whether this sample changed the actuator state.
    pub changed: bool,
    pub row: LogRow,
}

/// Snapshot for status reporting.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PipelineStatus {
    pub session_active: bool,
    pub actuator_state: bool,
    pub actuator_available: bool,
    pub speed: f64,
    pub position: Option<DVec3>,
    pub frame_number: Option<u32>,
    pub session_time: Option<f64>,
    pub recorded_rows: usize,
}

/// Drives session detection, speed estimation and the trigger policy from
/// feed events, then fans results out to the actuator and the recorder.
///
/// Every call commits the internal state transition before touching the
/// actuator or the recorder. Actuator failures are logged and dropped; the
/// logical state keeps advancing so it is correct once the channel returns.
pub struct TriggerPipeline<A, R> {
    gate: LiveGate,
    clock: ClockSource,
    session: SessionBoundaryDetector,
    speed: SpeedEstimator,
    controller: TriggerController,
    actuator: A,
    recorder: R,
    actuator_state: bool,
    latest_frame: Option<FrameInfo>,
    latest_position: Option<DVec3>,
    burst_warned: bool,
}

impl<A: ActuatorChannel, R: SampleRecorder> TriggerPipeline<A, R> {
    pub fn new(
        gate: LiveGate,
        clock: ClockSource,
        session: SessionBoundaryDetector,
        speed: SpeedEstimator,
        controller: TriggerController,
        actuator: A,
        recorder: R,
    ) -> Self {
        Self {
            gate,
            clock,
            session,
            speed,
            controller,
            actuator,
            recorder,
            actuator_state: false,
            latest_frame: None,
            latest_position: None,
            burst_warned: false,
        }
    }

    pub fn from_config(config: &AppConfig, actuator: A, recorder: R) -> Self {
        let session = SessionBoundaryDetector::new(
            config.session.high_water_frame,
            config.session.low_water_frame,
        );
        let speed = SpeedEstimator::new(NoiseBands {
            floor_low: config.speed.noise_floor_low,
            floor_high: config.speed.noise_floor_high,
            attenuation: config.speed.attenuation,
        });
        let trigger = &config.trigger;
        let controller = match trigger.policy {
            PolicyKind::PeriodicPulse => TriggerController::periodic(PeriodicPulse {
                interval: trigger.periodic.interval_s,
                duration: trigger.periodic.duration_s,
            }),
            PolicyKind::ThresholdHold => TriggerController::threshold(ThresholdHold {
                target_position: trigger.threshold.target_position,
                distance_threshold: trigger.threshold.distance_threshold,
                speed_threshold: trigger.threshold.speed_threshold,
                required_hold_time: trigger.threshold.required_hold_time_s,
                grace_time: trigger.threshold.grace_time_s,
            }),
        };
        info!(
            policy = controller.name(),
            gate = ?config.session.gate,
            clock = ?trigger.clock,
            "Trigger pipeline configured"
        );
        Self::new(
            config.session.gate,
            trigger.clock,
            session,
            speed,
            controller,
            actuator,
            recorder,
        )
    }

    /// Handle frame metadata. Session detection runs on every frame, even
    /// when the poses of that frame turn out to be unusable.
    pub fn on_frame(&mut self, frame: &FrameInfo) -> SessionEvent {
        self.latest_frame = Some(*frame);
        let event = self.session.observe(frame.frame_number, frame.wall_time);
        if event == SessionEvent::Started {
            let start = self.timestamp(frame.wall_time, frame.session_time);
            self.controller.on_session_start(start);
            self.recorder.clear();
            info!(frame_number = frame.frame_number, "Logging started");
        }
        event
    }

    /// Handle one pose sample. Returns `None` if the sample is not live.
    pub fn on_pose(&mut self, sample: &PoseSample) -> Option<SampleOutcome> {
        if !sample.position.is_finite() {
            warn!(
                rigid_body_id = sample.rigid_body_id,
                frame_number = sample.frame_number,
                "Dropping pose with non-finite position"
            );
            return None;
        }
        if !self.is_live(sample) {
            trace!(
                frame_number = sample.frame_number,
                is_recording = sample.is_recording,
                "Sample not live"
            );
            return None;
        }

        let now = self.timestamp(sample.wall_time, sample.session_time);
        if let Some(step) = self.speed.update_detailed(sample.position, now) {
            debug!(
                frame_number = sample.frame_number,
                session_time = sample.session_time,
                speed = step.speed,
                distance = step.raw_distance,
                "Speed updated"
            );
            if self.clock == ClockSource::Wall && step.dt < MIN_WALL_DT && !self.burst_warned {
                self.burst_warned = true;
                warn!(
                    dt = step.dt,
                    "Pose samples arrive in bursts, wall-clock speeds are unreliable (use clock = \"capture\")"
                );
            }
        }
        let speed = self.speed.speed();
        let session_active = self.is_session_active(sample);
        let desired = self
            .controller
            .evaluate(now, speed, Some(sample.position), session_active);

        // State is committed; external effects follow.
        let changed = desired != self.actuator_state;
        self.actuator_state = desired;
        self.latest_position = Some(sample.position);
        if changed {
            self.write_actuator(desired);
        }

        let state = self.session.state();
        let row = LogRow {
            relative_time: state.relative_time(sample.wall_time),
            relative_frame: state.relative_frame(sample.frame_number),
            position: sample.position,
            actuator_state: desired,
        };
        self.recorder.append(row);

        Some(SampleOutcome {
            speed,
            actuator_state: desired,
            changed,
            row,
        })
    }

    /// Turn the actuator off if it was left on.
    pub fn shutdown(&mut self) {
        if self.actuator_state {
            self.actuator_state = false;
            self.write_actuator(false);
        }
    }

    pub fn status(&self) -> PipelineStatus {
        PipelineStatus {
            session_active: self.session.is_active(),
            actuator_state: self.actuator_state,
            actuator_available: self.actuator.is_available(),
            speed: self.speed.speed(),
            position: self.latest_position,
            frame_number: self.latest_frame.map(|f| f.frame_number),
            session_time: self.latest_frame.map(|f| f.session_time),
            recorded_rows: self.recorder.len(),
        }
    }

    pub fn recorder(&self) -> &R {
        &self.recorder
    }

    fn is_live(&self, sample: &PoseSample) -> bool {
        self.is_session_active(sample)
    }

    fn is_session_active(&self, sample: &PoseSample) -> bool {
        match self.gate {
            LiveGate::FrameReset => self.session.is_active(),
            LiveGate::RecordingFlag => sample.is_recording,
        }
    }

    fn timestamp(&self, wall_time: f64, session_time: f64) -> f64 {
        match self.clock {
            ClockSource::Wall => wall_time,
            ClockSource::Capture => session_time,
        }
    }

    fn write_actuator(&mut self, state: bool) {
        if let Err(e) = self.actuator.set(state) {
            warn!(state, %e, "Actuator command dropped");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::DQuat;
    use mocap_sink::{ActuatorError, WriteActuator};

    /// Actuator that records commands and can be unplugged.
    #[derive(Default)]
    struct FakeActuator {
        commands: Vec<bool>,
        unplugged: bool,
    }

    impl ActuatorChannel for FakeActuator {
        fn set(&mut self, state: bool) -> Result<(), ActuatorError> {
            if self.unplugged {
                return Err(ActuatorError::Unavailable);
            }
            self.commands.push(state);
            Ok(())
        }

        fn is_available(&self) -> bool {
            !self.unplugged
        }
    }

    fn frame(frame_number: u32, wall_time: f64) -> FrameInfo {
        FrameInfo {
            frame_number,
            session_time: wall_time + 100.0,
            wall_time,
            is_recording: true,
        }
    }

    fn pose(frame_number: u32, wall_time: f64, position: DVec3) -> PoseSample {
        PoseSample {
            rigid_body_id: 1,
            position,
            orientation: DQuat::IDENTITY,
            frame_number,
            session_time: wall_time + 100.0,
            wall_time,
            is_recording: true,
        }
    }

    fn periodic_config() -> AppConfig {
        let mut config = AppConfig::default();
        config.trigger.policy = PolicyKind::PeriodicPulse;
        config
    }

    fn threshold_config() -> AppConfig {
        let mut config = AppConfig::default();
        config.trigger.policy = PolicyKind::ThresholdHold;
        config.trigger.threshold.required_hold_time_s = 0.0625;
        config.trigger.threshold.grace_time_s = 0.25;
        config
    }

    fn start_session<A: ActuatorChannel, R: SampleRecorder>(
        pipeline: &mut TriggerPipeline<A, R>,
        wall_time: f64,
    ) {
        assert_eq!(pipeline.on_frame(&frame(150, wall_time)), SessionEvent::None);
        assert_eq!(pipeline.on_frame(&frame(2, wall_time)), SessionEvent::Started);
    }

    #[test]
    fn samples_before_session_are_ignored() {
        let mut pipeline =
            TriggerPipeline::from_config(&periodic_config(), FakeActuator::default(), Vec::new());
        pipeline.on_frame(&frame(40, 0.0));
        assert!(pipeline.on_pose(&pose(40, 0.0, DVec3::ZERO)).is_none());
        assert!(pipeline.recorder().is_empty());
        assert!(!pipeline.status().session_active);
    }

    #[test]
    fn session_start_clears_recorder_and_sets_origins() {
        let mut pipeline =
            TriggerPipeline::from_config(&periodic_config(), FakeActuator::default(), Vec::new());
        start_session(&mut pipeline, 10.0);

        pipeline.on_frame(&frame(62, 10.5));
        let outcome = pipeline.on_pose(&pose(62, 10.5, DVec3::new(1.0, 2.0, 3.0))).unwrap();
        assert_eq!(outcome.row.relative_frame, 60);
        assert_eq!(outcome.row.relative_time, 0.5);
        assert_eq!(outcome.row.position, DVec3::new(1.0, 2.0, 3.0));
        assert_eq!(pipeline.recorder().len(), 1);

        // A second session only starts after an explicit end.
        pipeline.session.reset();
        start_session(&mut pipeline, 50.0);
        assert!(pipeline.recorder().is_empty());
    }

    #[test]
    fn periodic_pulse_writes_only_on_changes() {
        let mut pipeline =
            TriggerPipeline::from_config(&periodic_config(), FakeActuator::default(), Vec::new());
        start_session(&mut pipeline, 0.0);

        let mut states = Vec::new();
        for i in 0..=520 {
            let t = i as f64 * 0.125;
            states.push(pipeline.on_pose(&pose(3 + i, t, DVec3::ZERO)).unwrap().actuator_state);
        }

        // First pulse one interval after the session start, then every interval.
        assert!(!states[239]);
        assert!(states[240]);
        assert!(states[247]);
        assert!(!states[248]);
        assert!(states[480]);
        assert_eq!(pipeline.actuator.commands, vec![true, false, true, false]);

        // Every live sample produced one row carrying the actuator state.
        let rows = pipeline.recorder();
        assert_eq!(rows.len(), 521);
        assert!(rows[240].actuator_state);
        assert!(!rows[248].actuator_state);
    }

    #[test]
    fn threshold_policy_engages_on_motion_in_zone() {
        let mut pipeline =
            TriggerPipeline::from_config(&threshold_config(), FakeActuator::default(), Vec::new());
        start_session(&mut pipeline, 0.0);

        let in_zone = DVec3::new(0.0, 0.0, 0.6);
        let step = DVec3::new(0.01, 0.0, 0.0);

        // At rest: no speed, never engages.
        for i in 0..4 {
            let out = pipeline.on_pose(&pose(3, i as f64 * 0.0625, in_zone)).unwrap();
            assert!(!out.actuator_state);
        }

        // Moving 1 cm per 62.5 ms inside the zone.
        let mut position = in_zone;
        let mut t = 0.25;
        let mut engaged_at = None;
        for _ in 0..4 {
            t += 0.0625;
            position += step;
            let out = pipeline.on_pose(&pose(3, t, position)).unwrap();
            if out.changed && out.actuator_state {
                engaged_at = Some(t);
            }
        }
        // Armed at 0.3125, held for 0.0625 s by 0.375.
        assert_eq!(engaged_at, Some(0.375));

        // Stop moving: released only after the grace period.
        let last_good = t;
        assert!(pipeline.on_pose(&pose(3, last_good + 0.125, position)).unwrap().actuator_state);
        let out = pipeline.on_pose(&pose(3, last_good + 0.3125, position)).unwrap();
        assert!(!out.actuator_state);
        assert!(out.changed);
        assert_eq!(pipeline.actuator.commands, vec![true, false]);
    }

    #[test]
    fn recording_flag_gate_follows_capture_state() {
        let mut config = threshold_config();
        config.session.gate = LiveGate::RecordingFlag;
        let mut pipeline = TriggerPipeline::from_config(&config, FakeActuator::default(), Vec::new());

        let mut sample = pose(500, 0.0, DVec3::ZERO);
        sample.is_recording = false;
        assert!(pipeline.on_pose(&sample).is_none());

        sample.is_recording = true;
        assert!(pipeline.on_pose(&sample).is_some());
        // No frame reset happened, so rows carry zero offsets.
        assert_eq!(pipeline.recorder()[0].relative_frame, 0);
    }

    #[test]
    fn unavailable_actuator_degrades_to_log_only() {
        let mut pipeline = TriggerPipeline::from_config(
            &periodic_config(),
            WriteActuator::<Vec<u8>>::disconnected(),
            Vec::new(),
        );
        start_session(&mut pipeline, 0.0);

        assert!(!pipeline.on_pose(&pose(3, 0.0, DVec3::ZERO)).unwrap().actuator_state);
        let out = pipeline.on_pose(&pose(4, 30.0, DVec3::ZERO)).unwrap();
        assert!(out.actuator_state);
        assert!(out.changed);
        assert!(pipeline.recorder()[1].actuator_state);
        assert!(!pipeline.status().actuator_available);
    }

    #[test]
    fn actuator_returning_mid_pulse_sees_next_transition() {
        let mut pipeline =
            TriggerPipeline::from_config(&periodic_config(), FakeActuator::default(), Vec::new());
        start_session(&mut pipeline, 0.0);

        pipeline.actuator.unplugged = true;
        assert!(pipeline.on_pose(&pose(3, 30.0, DVec3::ZERO)).unwrap().actuator_state);
        pipeline.actuator.unplugged = false;

        // No retry of the dropped "on"; the next change goes through.
        assert!(pipeline.on_pose(&pose(4, 30.5, DVec3::ZERO)).unwrap().actuator_state);
        assert!(!pipeline.on_pose(&pose(5, 31.0, DVec3::ZERO)).unwrap().actuator_state);
        assert_eq!(pipeline.actuator.commands, vec![false]);
    }

    #[test]
    fn capture_clock_drives_timers() {
        let mut config = periodic_config();
        config.trigger.clock = ClockSource::Capture;
        let mut pipeline = TriggerPipeline::from_config(&config, FakeActuator::default(), Vec::new());
        start_session(&mut pipeline, 0.0);

        // Capture time is wall + 100, so the session origin is 100 capture seconds.
        let mut sample = pose(3, 0.0, DVec3::ZERO);
        sample.session_time = 129.0;
        assert!(!pipeline.on_pose(&sample).unwrap().actuator_state);
        sample.session_time = 130.0;
        assert!(pipeline.on_pose(&sample).unwrap().actuator_state);
    }

    #[test]
    fn non_finite_pose_is_dropped() {
        let mut pipeline =
            TriggerPipeline::from_config(&threshold_config(), FakeActuator::default(), Vec::new());
        start_session(&mut pipeline, 0.0);

        assert!(pipeline.on_pose(&pose(3, 0.0, DVec3::ZERO)).is_some());
        assert!(pipeline.on_pose(&pose(3, 0.125, DVec3::new(f64::NAN, 0.0, 0.0))).is_none());
        assert!(pipeline.on_pose(&pose(3, 0.25, DVec3::new(0.0, f64::INFINITY, 0.0))).is_none());

        let out = pipeline.on_pose(&pose(3, 0.5, DVec3::new(0.0, 0.0, 0.05))).unwrap();
        assert!(out.speed >= 0.0);
        assert!((out.speed - 0.1).abs() < 1e-9);
        assert_eq!(pipeline.recorder().len(), 2);
        assert_eq!(pipeline.status().position, Some(DVec3::new(0.0, 0.0, 0.05)));
    }

    #[test]
    fn bursty_wall_clock_is_flagged_once() {
        let mut pipeline =
            TriggerPipeline::from_config(&threshold_config(), FakeActuator::default(), Vec::new());
        start_session(&mut pipeline, 0.0);
        pipeline.on_pose(&pose(3, 0.0, DVec3::ZERO));
        assert!(!pipeline.burst_warned);
        pipeline.on_pose(&pose(4, 0.00001, DVec3::new(0.01, 0.0, 0.0)));
        assert!(pipeline.burst_warned);

        let mut config = threshold_config();
        config.trigger.clock = ClockSource::Capture;
        let mut pipeline = TriggerPipeline::from_config(&config, FakeActuator::default(), Vec::new());
        start_session(&mut pipeline, 0.0);
        pipeline.on_pose(&pose(3, 0.0, DVec3::ZERO));
        pipeline.on_pose(&pose(4, 0.00001, DVec3::new(0.01, 0.0, 0.0)));
        assert!(!pipeline.burst_warned);
    }

    #[test]
    fn shutdown_turns_actuator_off() {
        let mut pipeline =
            TriggerPipeline::from_config(&periodic_config(), FakeActuator::default(), Vec::new());
        start_session(&mut pipeline, 0.0);
        pipeline.on_pose(&pose(3, 30.0, DVec3::ZERO));
        pipeline.shutdown();
        assert_eq!(pipeline.actuator.commands, vec![true, false]);
        assert!(!pipeline.status().actuator_state);

        // Nothing to do when already off.
        pipeline.shutdown();
        assert_eq!(pipeline.actuator.commands.len(), 2);
    }

    #[test]
    fn status_reflects_latest_sample() {
        let mut pipeline =
            TriggerPipeline::from_config(&periodic_config(), FakeActuator::default(), Vec::new());
        start_session(&mut pipeline, 0.0);
        pipeline.on_frame(&frame(9, 0.5));
        pipeline.on_pose(&pose(9, 0.5, DVec3::new(0.1, 0.2, 0.3)));

        let status = pipeline.status();
        assert!(status.session_active);
        assert_eq!(status.frame_number, Some(9));
        assert_eq!(status.session_time, Some(100.5));
        assert_eq!(status.position, Some(DVec3::new(0.1, 0.2, 0.3)));
        assert_eq!(status.recorded_rows, 1);
    }
}

use glam::DVec3;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Pose feed connection.
    pub feed: FeedConfig,
    /// Session boundary detection and live-sample gating.
    pub session: SessionConfig,
    /// Speed estimation noise bands.
    pub speed: SpeedConfig,
    /// Trigger policy selection and parameters.
    pub trigger: TriggerConfig,
    /// Actuator (serial LED) channel.
    pub actuator: ActuatorConfig,
    /// Sample recorder output.
    pub recorder: RecorderConfig,
    /// How often the status line is logged, in milliseconds. 0 disables it.
    pub status_interval_ms: u64,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            feed: FeedConfig::default(),
            session: SessionConfig::default(),
            speed: SpeedConfig::default(),
            trigger: TriggerConfig::default(),
            actuator: ActuatorConfig::default(),
            recorder: RecorderConfig::default(),
            status_interval_ms: 1000,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FeedConfig {
    /// `host:port` of the pose relay, or `-` for stdin.
    pub address: String,
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            address: "127.0.0.1:1511".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// The previous frame number must exceed this for a reset to count.
    pub high_water_frame: u32,
    /// The current frame number must be below this for a reset to count.
    pub low_water_frame: u32,
    /// Rule deciding whether a pose sample is live.
    pub gate: LiveGate,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            high_water_frame: 100,
            low_water_frame: 10,
            gate: LiveGate::FrameReset,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LiveGate {
    /// Live once a frame-counter reset has started a session.
    FrameReset,
    /// Live whenever the capture system reports it is recording.
    RecordingFlag,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SpeedConfig {
    /// Displacements below this are treated as zero (meters).
    pub noise_floor_low: f64,
    /// Displacements in `[low, high)` are attenuated (meters).
    pub noise_floor_high: f64,
    /// Scale applied inside the attenuation band.
    pub attenuation: f64,
}

impl Default for SpeedConfig {
    fn default() -> Self {
        Self {
            noise_floor_low: 0.0024,
            noise_floor_high: 0.0025,
            attenuation: 0.3,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TriggerConfig {
    /// Active policy.
    pub policy: PolicyKind,
    /// Time base used for speed differencing and trigger timers.
    pub clock: ClockSource,
    pub periodic: PeriodicConfig,
    pub threshold: ThresholdConfig,
}

impl Default for TriggerConfig {
    fn default() -> Self {
        Self {
            policy: PolicyKind::ThresholdHold,
            clock: ClockSource::Wall,
            periodic: PeriodicConfig::default(),
            threshold: ThresholdConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PolicyKind {
    /// Fixed-duty square wave while a session is active.
    PeriodicPulse,
    /// Spatial + speed gate with hold and grace timers.
    ThresholdHold,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClockSource {
    /// Local monotonic receive time. Only meaningful for a live feed: records
    /// read in one burst (a replayed file) get nearly identical stamps.
    Wall,
    /// Capture-domain time decoded from the frame timecode. Use this when
    /// replaying a recorded feed.
    Capture,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PeriodicConfig {
    /// Seconds between pulse starts.
    pub interval_s: f64,
    /// Seconds each pulse stays on.
    pub duration_s: f64,
}

impl Default for PeriodicConfig {
    fn default() -> Self {
        Self {
            interval_s: 30.0,
            duration_s: 1.0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ThresholdConfig {
    /// Center of the trigger zone (meters, capture frame).
    #[serde(with = "dvec3_serde")]
    pub target_position: DVec3,
    /// Zone radius around `target_position` (meters).
    pub distance_threshold: f64,
    /// Minimum speed to arm (m/s).
    pub speed_threshold: f64,
    /// How long the arming condition must hold before asserting (seconds).
    pub required_hold_time_s: f64,
    /// How long after the last qualifying sample before releasing (seconds).
    pub grace_time_s: f64,
}

impl Default for ThresholdConfig {
    fn default() -> Self {
        Self {
            target_position: DVec3::new(-0.01, 0.0, 0.62),
            distance_threshold: 0.6,
            speed_threshold: 0.0008,
            required_hold_time_s: 0.02,
            grace_time_s: 0.2,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ActuatorConfig {
    /// Serial device path (e.g. `/dev/ttyUSB0`, `COM18`). `None` runs log-only.
    pub port: Option<PathBuf>,
    /// Delay after opening the port before the first command (milliseconds).
    pub settle_ms: u64,
}

impl Default for ActuatorConfig {
    fn default() -> Self {
        Self {
            port: None,
            settle_ms: 2000,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RecorderConfig {
    pub enabled: bool,
    /// CSV file written at shutdown.
    pub output: PathBuf,
}

impl Default for RecorderConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            output: PathBuf::from("rigid_body_positions.csv"),
        }
    }
}

// Positions serialize as plain `[x, y, z]` arrays in TOML.
mod dvec3_serde {
    use glam::DVec3;
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    pub fn serialize<S: Serializer>(v: &DVec3, s: S) -> Result<S::Ok, S::Error> {
        [v.x, v.y, v.z].serialize(s)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<DVec3, D::Error> {
        let [x, y, z] = <[f64; 3]>::deserialize(d)?;
        Ok(DVec3::new(x, y, z))
    }
}

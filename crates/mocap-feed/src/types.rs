use glam::{DQuat, DVec3};

/// Per-frame metadata from the capture system.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FrameInfo {
    /// Capture frame counter. Resets to near zero when a new take starts.
    pub frame_number: u32,
    /// Capture-domain time decoded from the frame timecode (seconds).
    pub session_time: f64,
    /// Local monotonic receive time (seconds since the feed was opened).
    pub wall_time: f64,
    /// Whether the capture system reports it is recording.
    pub is_recording: bool,
}

/// A rigid-body pose stamped with the frame metadata it arrived under.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PoseSample {
    pub rigid_body_id: i32,
    /// Position in meters.
    pub position: DVec3,
    pub orientation: DQuat,
    pub frame_number: u32,
    pub session_time: f64,
    pub wall_time: f64,
    pub is_recording: bool,
}

/// Events delivered to the consumer, in arrival order.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FeedEvent {
    Frame(FrameInfo),
    Pose(PoseSample),
}

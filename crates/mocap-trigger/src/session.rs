//! Recording-session start detection from the capture frame counter.
//!
//! The capture system restarts its frame counter when a new take begins. A
//! session starts when the counter drops from above the high-water mark to
//! below the low-water mark. The two-sided window tolerates small
//! out-of-order deliveries near the boundary, which a plain "frame decreased"
//! rule would mistake for a reset.

/// Outcome of observing one frame number.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionEvent {
    None,
    Started,
}

/// Session bookkeeping owned by the detector.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct SessionState {
    pub active: bool,
    pub start_frame: Option<u32>,
    pub start_wall_time: Option<f64>,
}

impl SessionState {
    /// Frames elapsed since the session started (0 when inactive).
    pub fn relative_frame(&self, frame_number: u32) -> i64 {
        self.start_frame
            .map_or(0, |start| i64::from(frame_number) - i64::from(start))
    }

    /// Seconds elapsed since the session started (0 when inactive).
    pub fn relative_time(&self, wall_time: f64) -> f64 {
        self.start_wall_time.map_or(0.0, |start| wall_time - start)
    }
}

#[derive(Debug, Clone)]
pub struct SessionBoundaryDetector {
    high_water: u32,
    low_water: u32,
    previous_frame: Option<u32>,
    state: SessionState,
}

impl SessionBoundaryDetector {
    pub fn new(high_water: u32, low_water: u32) -> Self {
        Self {
            high_water,
            low_water,
            previous_frame: None,
            state: SessionState::default(),
        }
    }

    /// Record `frame_number` (received at `wall_time`) and report whether it
    /// starts a session. Fires at most once until [`reset`](Self::reset).
    pub fn observe(&mut self, frame_number: u32, wall_time: f64) -> SessionEvent {
        let previous = self.previous_frame.replace(frame_number);

        let crossed = previous.is_some_and(|prev| prev > self.high_water)
            && frame_number < self.low_water;
        if !crossed || self.state.active {
            return SessionEvent::None;
        }

        self.state = SessionState {
            active: true,
            start_frame: Some(frame_number),
            start_wall_time: Some(wall_time),
        };
        tracing::info!(
            frame_number,
            previous_frame = ?previous,
            "Session started at frame counter reset"
        );
        SessionEvent::Started
    }

    /// End the current session so the next counter reset starts a new one.
    /// The last observed frame is kept, so a reset already in progress is
    /// still seen.
    pub fn reset(&mut self) {
        if self.state.active {
            tracing::info!(start_frame = ?self.state.start_frame, "Session ended");
        }
        self.state = SessionState::default();
    }

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    pub fn is_active(&self) -> bool {
        self.state.active
    }
}

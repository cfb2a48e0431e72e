use glam::DVec3;

/// Displacement bands used to suppress tracker jitter.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NoiseBands {
    /// Displacements below this count as no motion.
    pub floor_low: f64,
    /// Displacements in `[floor_low, floor_high)` are scaled by `attenuation`.
    pub floor_high: f64,
    pub attenuation: f64,
}

impl Default for NoiseBands {
    fn default() -> Self {
        Self {
            floor_low: 0.0024,
            floor_high: 0.0025,
            attenuation: 0.3,
        }
    }
}

impl NoiseBands {
    /// Displacement after band filtering.
    pub fn filter(&self, distance: f64) -> f64 {
        if distance < self.floor_low {
            0.0
        } else if distance < self.floor_high {
            distance * self.attenuation
        } else {
            distance
        }
    }
}

/// One differencing step.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SpeedEstimate {
    pub raw_distance: f64,
    pub dt: f64,
    pub speed: f64,
}

/// Finite-difference speed from consecutive positions, with a noise floor.
#[derive(Debug, Clone)]
pub struct SpeedEstimator {
    bands: NoiseBands,
    previous: Option<(DVec3, f64)>,
    speed: f64,
}

impl SpeedEstimator {
    pub fn new(bands: NoiseBands) -> Self {
        Self {
            bands,
            previous: None,
            speed: 0.0,
        }
    }

    /// Feed a position taken at `sample_time` (seconds) and return the current speed.
    pub fn update(&mut self, position: DVec3, sample_time: f64) -> f64 {
        self.update_detailed(position, sample_time);
        self.speed
    }

    /// Like [`update`](Self::update), but also returns the differencing step.
    ///
    /// Returns `None` for the first sample and whenever `dt <= 0` or the
    /// displacement is not finite; in those cases the previous speed is kept.
    /// The stored previous sample advances to the current one unless the
    /// current position or time is not finite, in which case it is ignored.
    pub fn update_detailed(&mut self, position: DVec3, sample_time: f64) -> Option<SpeedEstimate> {
        if !position.is_finite() || !sample_time.is_finite() {
            return None;
        }
        let previous = self.previous.replace((position, sample_time));
        let (prev_position, prev_time) = previous?;

        let dt = sample_time - prev_time;
        if dt <= 0.0 {
            return None;
        }

        let raw_distance = position.distance(prev_position);
        if !raw_distance.is_finite() {
            return None;
        }
        self.speed = self.bands.filter(raw_distance) / dt;
        Some(SpeedEstimate {
            raw_distance,
            dt,
            speed: self.speed,
        })
    }

    /// Last computed speed.
    pub fn speed(&self) -> f64 {
        self.speed
    }

    /// Forget the previous sample and zero the speed.
    pub fn reset(&mut self) {
        self.previous = None;
        self.speed = 0.0;
    }
}

impl Default for SpeedEstimator {
    fn default() -> Self {
        Self::new(NoiseBands::default())
    }
}

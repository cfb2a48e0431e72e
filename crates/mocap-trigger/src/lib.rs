//! Session detection, speed estimation and actuator trigger policies.

pub mod pipeline;
pub mod session;
pub mod speed;
pub mod trigger;

pub use pipeline::{PipelineStatus, SampleOutcome, TriggerPipeline};
pub use session::{SessionBoundaryDetector, SessionEvent, SessionState};
pub use speed::{NoiseBands, SpeedEstimate, SpeedEstimator};
pub use trigger::{HoldState, PeriodicPulse, PulseState, ThresholdHold, TriggerController};

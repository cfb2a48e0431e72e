use crate::protocol::{decode_timecode, FeedRecord};
use crate::types::{FeedEvent, FrameInfo, PoseSample};

/// Joins rigid-body records with the most recent frame metadata.
///
/// The capture system sends frame metadata first and the rigid bodies of that
/// frame after it, so each pose inherits the latest frame seen. Poses that
/// arrive before any frame metadata cannot be placed in time and are dropped.
#[derive(Debug, Default)]
pub struct SampleAssembler {
    latest_frame: Option<FrameInfo>,
}

impl SampleAssembler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Turn a decoded record into an event, stamping it with `wall_time`.
    pub fn on_record(&mut self, record: FeedRecord, wall_time: f64) -> Option<FeedEvent> {
        match record {
            FeedRecord::Frame {
                frame_number,
                timecode,
                subframe,
                is_recording,
            } => {
                let frame = FrameInfo {
                    frame_number,
                    session_time: decode_timecode(timecode, subframe),
                    wall_time,
                    is_recording,
                };
                self.latest_frame = Some(frame);
                Some(FeedEvent::Frame(frame))
            }
            FeedRecord::RigidBody {
                id,
                position,
                orientation,
            } => {
                let frame = self.latest_frame?;
                Some(FeedEvent::Pose(PoseSample {
                    rigid_body_id: id,
                    position,
                    orientation,
                    frame_number: frame.frame_number,
                    session_time: frame.session_time,
                    wall_time,
                    is_recording: frame.is_recording,
                }))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::{DQuat, DVec3};

    fn rigid_body(x: f64) -> FeedRecord {
        FeedRecord::RigidBody {
            id: 1,
            position: DVec3::new(x, 0.0, 0.0),
            orientation: DQuat::IDENTITY,
        }
    }

    #[test]
    fn pose_before_any_frame_is_dropped() {
        let mut assembler = SampleAssembler::new();
        assert!(assembler.on_record(rigid_body(0.0), 0.0).is_none());
    }

    #[test]
    fn pose_inherits_latest_frame_metadata() {
        let mut assembler = SampleAssembler::new();
        let frame = assembler.on_record(
            FeedRecord::Frame {
                frame_number: 42,
                timecode: 5 << 8,
                subframe: 0,
                is_recording: true,
            },
            1.0,
        );
        assert!(matches!(frame, Some(FeedEvent::Frame(f)) if f.frame_number == 42));

        match assembler.on_record(rigid_body(0.25), 1.5) {
            Some(FeedEvent::Pose(sample)) => {
                assert_eq!(sample.frame_number, 42);
                assert_eq!(sample.session_time, 5.0);
                assert_eq!(sample.wall_time, 1.5);
                assert!(sample.is_recording);
                assert_eq!(sample.position.x, 0.25);
            }
            other => panic!("expected pose, got {other:?}"),
        }
    }
}

use glam::{DQuat, DVec3};
use std::collections::VecDeque;
use thiserror::Error;

/// Longest record accepted before the buffer is discarded.
const MAX_LINE_LEN: usize = 4096;

/// Assumed capture rate for timecode frame fields.
const TIMECODE_FPS: f64 = 120.0;

#[derive(Debug, Error, PartialEq)]
pub enum FeedError {
    #[error("Record is not valid UTF-8")]
    InvalidUtf8,
    #[error("Record exceeds the maximum line length without a line break")]
    LineTooLong,
    #[error("Unknown record tag `{0}`")]
    UnknownRecord(String),
    #[error("Missing field `{0}`")]
    MissingField(&'static str),
    #[error("Invalid value for `{field}`: {value}")]
    InvalidField { field: &'static str, value: String },
    #[error("Rigid body {0} has no position")]
    MissingPosition(i32),
}

/// One decoded feed record.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FeedRecord {
    /// `F <frame_number> <timecode> <subframe> <is_recording>`
    Frame {
        frame_number: u32,
        timecode: u32,
        subframe: u32,
        is_recording: bool,
    },
    /// `R <id> <x> <y> <z> [<qx> <qy> <qz> <qw>]`
    RigidBody {
        id: i32,
        position: DVec3,
        orientation: DQuat,
    },
}

/// Streaming parser for the line-framed pose feed.
///
/// Feed raw bytes via `push_data`, then drain parsed records via `next_record`.
pub struct FeedParser {
    buffer: VecDeque<u8>,
}

impl FeedParser {
    pub fn new() -> Self {
        Self {
            buffer: VecDeque::with_capacity(8192),
        }
    }

    /// Append received bytes to the internal buffer.
    pub fn push_data(&mut self, data: &[u8]) {
        self.buffer.extend(data);
    }

    /// Try to extract the next complete record from the buffer.
    /// Returns `None` if no complete line is available yet.
    pub fn next_record(&mut self) -> Option<Result<FeedRecord, FeedError>> {
        loop {
            let line = {
                let buf = self.buffer.make_contiguous();
                match buf.iter().position(|&b| b == b'\n') {
                    Some(end) => buf[..end].to_vec(),
                    None => {
                        if buf.len() > MAX_LINE_LEN {
                            self.buffer.clear();
                            return Some(Err(FeedError::LineTooLong));
                        }
                        return None;
                    }
                }
            };
            self.buffer.drain(..=line.len());

            let Ok(text) = std::str::from_utf8(&line) else {
                return Some(Err(FeedError::InvalidUtf8));
            };
            let text = text.trim();
            if text.is_empty() || text.starts_with('#') {
                continue;
            }
            return Some(parse_line(text));
        }
    }
}

impl Default for FeedParser {
    fn default() -> Self {
        Self::new()
    }
}

fn parse_line(line: &str) -> Result<FeedRecord, FeedError> {
    let mut fields = line.split_whitespace();
    match fields.next() {
        Some("F") => {
            let frame_number = parse_field(fields.next(), "frame_number")?;
            let timecode = parse_field(fields.next(), "timecode")?;
            let subframe = parse_field(fields.next(), "subframe")?;
            let is_recording = parse_flag(fields.next(), "is_recording")?;
            Ok(FeedRecord::Frame {
                frame_number,
                timecode,
                subframe,
                is_recording,
            })
        }
        Some("R") => {
            let id: i32 = parse_field(fields.next(), "rigid_body_id")?;
            let values = fields
                .map(|v| {
                    v.parse::<f64>().map_err(|_| FeedError::InvalidField {
                        field: "pose",
                        value: v.to_string(),
                    })
                })
                .collect::<Result<Vec<f64>, _>>()?;

            // `nan` and `inf` parse as f64 but are not a usable position.
            let position = match values.get(..3) {
                Some(&[x, y, z]) => DVec3::new(x, y, z),
                _ => return Err(FeedError::MissingPosition(id)),
            };
            if !position.is_finite() {
                return Err(FeedError::MissingPosition(id));
            }
            let orientation = match &values[3..] {
                [] => DQuat::IDENTITY,
                &[qx, qy, qz, qw] if [qx, qy, qz, qw].iter().all(|v| v.is_finite()) => {
                    DQuat::from_xyzw(qx, qy, qz, qw)
                }
                rest => {
                    return Err(FeedError::InvalidField {
                        field: "orientation",
                        value: format!("{rest:?}"),
                    })
                }
            };
            Ok(FeedRecord::RigidBody {
                id,
                position,
                orientation,
            })
        }
        Some(tag) => Err(FeedError::UnknownRecord(tag.to_string())),
        None => Err(FeedError::MissingField("tag")),
    }
}

fn parse_field<T: std::str::FromStr>(
    value: Option<&str>,
    field: &'static str,
) -> Result<T, FeedError> {
    let value = value.ok_or(FeedError::MissingField(field))?;
    value.parse().map_err(|_| FeedError::InvalidField {
        field,
        value: value.to_string(),
    })
}

fn parse_flag(value: Option<&str>, field: &'static str) -> Result<bool, FeedError> {
    match value {
        Some("1") | Some("true") => Ok(true),
        Some("0") | Some("false") => Ok(false),
        Some(other) => Err(FeedError::InvalidField {
            field,
            value: other.to_string(),
        }),
        None => Err(FeedError::MissingField(field)),
    }
}

/// Convert a packed SMPTE timecode (`hh mm ss ff`, one byte each, hour in the
/// top byte) plus subframe into seconds.
pub fn decode_timecode(timecode: u32, subframe: u32) -> f64 {
    let hour = (timecode >> 24) & 0xff;
    let minute = (timecode >> 16) & 0xff;
    let second = (timecode >> 8) & 0xff;
    let frame = timecode & 0xff;
    (hour * 3600 + minute * 60 + second) as f64
        + frame as f64 / TIMECODE_FPS
        + subframe as f64 / TIMECODE_FPS
}

//! Telemetry frame formatting.
//!
//! One frame is one datagram of comma-separated ASCII, no terminator:
//!
//! ```text
//! <range>,<angle_h>,<angle_v>,<position_x>,<position_y>
//! 0,0,0,<position_x>,<position_y>          (position only)
//! ```
//!
//! Positions are centimeters printed in shortest round-trip form, so whole
//! values keep their fractional digit (`1.0`, not `1`). Ranging fields are
//! forwarded exactly as the sensor sent them.

use std::fmt;

/// One parsed line from the ranging sensor
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RangingReading {
    pub range: String,
    pub angle_h: String,
    pub angle_v: String,
}

impl RangingReading {
    pub fn new(
        range: impl Into<String>,
        angle_h: impl Into<String>,
        angle_v: impl Into<String>,
    ) -> Self {
        Self {
            range: range.into(),
            angle_h: angle_h.into(),
            angle_v: angle_v.into(),
        }
    }
}

/// A single telemetry record
#[derive(Debug, Clone, PartialEq)]
pub enum TelemetryFrame {
    /// Pointer movement only; ranging fields are zero placeholders
    PositionOnly { x: f64, y: f64 },
    /// Ranging reading fused with the current position
    Ranging { reading: RangingReading, x: f64, y: f64 },
}

impl TelemetryFrame {
    pub fn position_only((x, y): (f64, f64)) -> Self {
        Self::PositionOnly { x, y }
    }

    pub fn ranging(reading: RangingReading, (x, y): (f64, f64)) -> Self {
        Self::Ranging { reading, x, y }
    }

    /// Position in centimeters carried by the frame
    pub fn position(&self) -> (f64, f64) {
        match self {
            Self::PositionOnly { x, y } | Self::Ranging { x, y, .. } => (*x, *y),
        }
    }

    /// Wire payload
    pub fn to_payload(&self) -> Vec<u8> {
        self.to_string().into_bytes()
    }
}

impl fmt::Display for TelemetryFrame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::PositionOnly { x, y } => write!(f, "0,0,0,{:?},{:?}", x, y),
            Self::Ranging { reading, x, y } => write!(
                f,
                "{},{},{},{:?},{:?}",
                reading.range, reading.angle_h, reading.angle_v, x, y
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_position_only_format() {
        let frame = TelemetryFrame::position_only((1.0, 2.0));
        assert_eq!(frame.to_string(), "0,0,0,1.0,2.0");
    }

    #[test]
    fn test_position_only_fractional_and_negative() {
        let frame = TelemetryFrame::position_only((0.003125, -12.5));
        assert_eq!(frame.to_string(), "0,0,0,0.003125,-12.5");
    }

    #[test]
    fn test_ranging_format() {
        let frame = TelemetryFrame::ranging(RangingReading::new("12.5", "30", "45"), (1.0, -0.5));
        assert_eq!(frame.to_string(), "12.5,30,45,1.0,-0.5");
    }

    #[test]
    fn test_ranging_fields_pass_through_verbatim() {
        let frame = TelemetryFrame::ranging(RangingReading::new("abc", " 7", "090"), (0.0, 0.0));
        assert_eq!(frame.to_string(), "abc, 7,090,0.0,0.0");
    }

    #[test]
    fn test_payload_has_no_terminator() {
        let payload = TelemetryFrame::position_only((3.0, 4.0)).to_payload();
        assert_eq!(payload, b"0,0,0,3.0,4.0");
    }

    #[test]
    fn test_position_accessor() {
        let frame = TelemetryFrame::ranging(RangingReading::new("1", "2", "3"), (5.0, 6.0));
        assert_eq!(frame.position(), (5.0, 6.0));
    }
}

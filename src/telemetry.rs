//! CSV telemetry, one row per processed frame.

use std::io::{self, Write};

use crate::types::GazeSample;

pub const HEADER: &str = "frame,timestamp,gaze_angle_x,gaze_angle_y,\
gaze_0_x,gaze_0_y,gaze_0_z,gaze_1_x,gaze_1_y,gaze_1_z";

/// Streams rows to `out`, flushing after each one
pub struct TelemetryEmitter<W: Write> {
    out: W,
    rows: u64,
}

impl<W: Write> TelemetryEmitter<W> {
    /// Write the header right away
    pub fn new(mut out: W) -> io::Result<Self> {
        writeln!(out, "{}", HEADER)?;
        out.flush()?;
        Ok(Self { out, rows: 0 })
    }

    pub fn emit(&mut self, frame: u64, timestamp: f64, gaze: &GazeSample) -> io::Result<()> {
        let GazeSample { eye0: g0, eye1: g1, angle } = gaze;
        writeln!(
            self.out,
            "{},{},{},{},{},{},{},{},{},{}",
            frame, timestamp, angle.0, angle.1, g0.x, g0.y, g0.z, g1.x, g1.y, g1.z
        )?;
        self.out.flush()?;
        self.rows += 1;
        Ok(())
    }

    pub fn rows(&self) -> u64 {
        self.rows
    }

    pub fn into_inner(self) -> W {
        self.out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Point3D;

    #[test]
    fn test_header_comes_first() {
        let emitter = TelemetryEmitter::new(Vec::new()).unwrap();
        let text = String::from_utf8(emitter.into_inner()).unwrap();
        assert_eq!(
            text,
            "frame,timestamp,gaze_angle_x,gaze_angle_y,gaze_0_x,gaze_0_y,gaze_0_z,gaze_1_x,gaze_1_y,gaze_1_z\n"
        );
    }

    #[test]
    fn test_rows_follow_column_order() {
        let mut emitter = TelemetryEmitter::new(Vec::new()).unwrap();
        emitter.emit(1, 0.0, &GazeSample::default()).unwrap();
        emitter
            .emit(
                2,
                0.5,
                &GazeSample {
                    eye0: Point3D::new(0.25, -0.5, -1.0),
                    eye1: Point3D::new(0.125, 0.0, -0.75),
                    angle: (0.1, -0.2),
                },
            )
            .unwrap();
        assert_eq!(emitter.rows(), 2);

        let text = String::from_utf8(emitter.into_inner()).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[1], "1,0,0,0,0,0,0,0,0,0");
        assert_eq!(lines[2], "2,0.5,0.1,-0.2,0.25,-0.5,-1,0.125,0,-0.75");
    }
}

//! JSON exporter for query sweeps.
//!
//! Writes resolved frames and projected annotations for downstream renderers
//! and dataset tooling.

use radiate_core::{BevPixel, FrameQuery, ProjectedPoint, SequenceSpan};
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::Write;

/// Lidar sweep projected for one query.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LidarExport {
    /// Lidar frame id the sweep was read from
    pub frame_id: u32,

    /// Points in the sweep before projection
    pub point_count: usize,

    pub camera_left: Vec<ProjectedPoint>,
    pub camera_right: Vec<ProjectedPoint>,
    pub bev: Vec<BevPixel>,
}

/// A single query timestamp.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExportFrame {
    /// Query time in seconds
    pub time_sec: f64,

    #[serde(flatten)]
    pub query: FrameQuery,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub lidar: Option<LidarExport>,
}

impl ExportFrame {
    pub fn new(query: FrameQuery, lidar: Option<LidarExport>) -> Self {
        Self {
            time_sec: query.frames.time,
            query,
            lidar,
        }
    }

    /// Objects across all enabled views.
    pub fn object_count(&self) -> usize {
        [
            &self.query.radar_cartesian,
            &self.query.lidar_image,
            &self.query.camera_left,
            &self.query.camera_right,
        ]
        .iter()
        .filter_map(|v| v.as_ref())
        .map(|v| v.len())
        .sum()
    }
}

/// Complete sweep export.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryExport {
    /// Sequence directory name
    pub sequence: String,

    /// Time covered by the sequence's timestamp logs
    pub span: SequenceSpan,

    /// All queried frames
    pub frames: Vec<ExportFrame>,

    /// Queries that fell outside the span
    pub degraded_frames: usize,
}

impl QueryExport {
    /// Creates a new export container.
    pub fn new(sequence: &str, span: SequenceSpan) -> Self {
        Self {
            sequence: sequence.to_string(),
            span,
            frames: Vec::new(),
            degraded_frames: 0,
        }
    }

    /// Adds a frame.
    pub fn add_frame(&mut self, frame: ExportFrame) {
        if frame.query.frames.degraded {
            self.degraded_frames += 1;
        }
        self.frames.push(frame);
    }

    /// Writes to a JSON file.
    pub fn write_to_file(&self, path: &str) -> std::io::Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        let mut file = File::create(path)?;
        file.write_all(json.as_bytes())?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use radiate_core::SyncedFrames;

    fn query(time: f64, degraded: bool) -> FrameQuery {
        FrameQuery {
            frames: SyncedFrames {
                time,
                camera: 3,
                lidar: 2,
                radar: 1,
                degraded,
            },
            radar_cartesian: Some(Vec::new()),
            lidar_image: None,
            camera_left: Some(Vec::new()),
            camera_right: None,
        }
    }

    #[test]
    fn test_counts_degraded_frames() {
        let mut export = QueryExport::new("city_1_0", SequenceSpan { start: 0.0, end: 1.0 });
        export.add_frame(ExportFrame::new(query(0.5, false), None));
        export.add_frame(ExportFrame::new(query(3.0, true), None));

        assert_eq!(export.frames.len(), 2);
        assert_eq!(export.degraded_frames, 1);
        assert_eq!(export.frames[1].time_sec, 3.0);
        assert_eq!(export.frames[0].object_count(), 0);
    }

    #[test]
    fn test_disabled_views_are_left_out() {
        let frame = ExportFrame::new(query(0.5, false), None);
        let value = serde_json::to_value(&frame).unwrap();

        assert!(value.get("radar_cartesian").is_some());
        assert!(value.get("camera_right").is_none());
        assert!(value.get("lidar").is_none());
        assert_eq!(value["frames"]["radar"], 1);
    }
}

//! RADIATE Core - Multi-Sensor Time Sync and Annotation Projection
//!
//! Camera, lidar and radar capture the same scene on independent clocks.
//! This library answers one question per timestamp:
//! 1. **Which frames?** Nearest-neighbour frame resolution per sensor with fixed latency offsets
//! 2. **Where are the objects?** Radar ground-plane annotations moved into the lidar grid or
//!    extruded into 3D wireframes and projected into either camera
//! 3. **What does the lidar see?** Dense sweep projection into the cameras and the bird's-eye grid
//!
//! Everything here is in-memory and pure; file I/O lives in `radiate_cli`.

pub mod calibration;
pub mod config;
pub mod error;
pub mod radiate_annotations;
pub mod radiate_boxes;
pub mod radiate_frames;
pub mod radiate_points;
pub mod radiate_time;
pub mod sequence;

// Re-export key types for convenience
pub use calibration::{CalibrationSet, CameraIntrinsics, CameraSide, RadarGrid};
pub use config::{ClassTable, SequenceConfig, SyncOffsets};
pub use error::{Result, SyncError};
pub use radiate_annotations::{AnnotationFilter, AnnotationStore, BBoxRecord, ObjectId, TrackedObject};
pub use radiate_boxes::{project_box_3d, Pixel, ProjectedGeometry, ProjectedObject};
pub use radiate_frames::{transform_ground_point, GroundPlaneTransform};
pub use radiate_points::{project_points, BevPixel, ColorMode, LidarPoint, ProjectedPoint};
pub use radiate_time::{SensorClocks, SensorKind, SequenceSpan, SyncedFrames, TimestampTable};
pub use sequence::{FrameQuery, Sequence, TargetFrame};

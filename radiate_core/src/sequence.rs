//! One recorded sequence, opened for querying.
//!
//! Owns the immutable inputs (config, calibration, timestamp tables and the
//! annotation list) and the transforms derived from them at open time. Every
//! query method takes `&self`, so a `Sequence` can be shared across threads
//! that sweep different timestamps.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::calibration::{CalibrationSet, CameraSide};
use crate::config::SequenceConfig;
use crate::error::Result;
use crate::radiate_annotations::{annotation_index, AnnotationStore, RawAnnotation};
use crate::radiate_boxes::{camera_objects, ground_objects, ProjectedObject};
use crate::radiate_frames::GroundPlaneTransform;
use crate::radiate_points::{lidar_to_bev, project_points, BevPixel, ColorMode, LidarPoint, ProjectedPoint};
use crate::radiate_time::{SensorClocks, SensorKind, SequenceSpan, SyncedFrames};

/// Frame an annotation set can be expressed in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TargetFrame {
    /// Radar cartesian image (annotations are stored here)
    RadarCartesian,
    /// Lidar bird's-eye image
    LidarImage,
    CameraLeft,
    CameraRight,
}

impl TargetFrame {
    pub fn all() -> [TargetFrame; 4] {
        [
            TargetFrame::RadarCartesian,
            TargetFrame::LidarImage,
            TargetFrame::CameraLeft,
            TargetFrame::CameraRight,
        ]
    }

    pub fn camera_side(&self) -> Option<CameraSide> {
        match self {
            TargetFrame::CameraLeft => Some(CameraSide::Left),
            TargetFrame::CameraRight => Some(CameraSide::Right),
            TargetFrame::RadarCartesian | TargetFrame::LidarImage => None,
        }
    }
}

/// Everything produced for one query timestamp.
///
/// A view is `None` when it is disabled in `ViewConfig`; `Some(vec![])` means
/// the view is enabled but nothing is annotated (or visible) there.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FrameQuery {
    pub frames: SyncedFrames,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub radar_cartesian: Option<Vec<ProjectedObject>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lidar_image: Option<Vec<ProjectedObject>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub camera_left: Option<Vec<ProjectedObject>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub camera_right: Option<Vec<ProjectedObject>>,
}

impl FrameQuery {
    pub fn view(&self, target: TargetFrame) -> Option<&[ProjectedObject]> {
        match target {
            TargetFrame::RadarCartesian => self.radar_cartesian.as_deref(),
            TargetFrame::LidarImage => self.lidar_image.as_deref(),
            TargetFrame::CameraLeft => self.camera_left.as_deref(),
            TargetFrame::CameraRight => self.camera_right.as_deref(),
        }
    }
}

/// An opened sequence.
#[derive(Debug, Clone)]
pub struct Sequence {
    config: SequenceConfig,
    calibration: CalibrationSet,
    clocks: SensorClocks,
    store: AnnotationStore,

    /// radar -> lidar with the translation already in lidar-image cells
    lidar_transform: GroundPlaneTransform,
}

impl Sequence {
    pub fn new(
        config: SequenceConfig,
        calibration: CalibrationSet,
        clocks: SensorClocks,
        store: AnnotationStore,
    ) -> Result<Self> {
        config.validate()?;
        calibration.validate()?;

        let lidar_transform = GroundPlaneTransform::new(
            &calibration.radar_to_lidar,
            config.lidar_image.cell_res(),
            config.sensors_height,
        )?;

        let span = clocks.span();
        debug!(
            "Opened sequence: span [{:.3}, {:.3}] ({:.1}s), {} tracked objects",
            span.start,
            span.end,
            span.duration(),
            store.len()
        );

        Ok(Self {
            config,
            calibration,
            clocks,
            store,
            lidar_transform,
        })
    }

    pub fn config(&self) -> &SequenceConfig {
        &self.config
    }

    pub fn calibration(&self) -> &CalibrationSet {
        &self.calibration
    }

    pub fn clocks(&self) -> &SensorClocks {
        &self.clocks
    }

    pub fn store(&self) -> &AnnotationStore {
        &self.store
    }

    pub fn lidar_transform(&self) -> &GroundPlaneTransform {
        &self.lidar_transform
    }

    pub fn span(&self) -> SequenceSpan {
        self.clocks.span()
    }

    /// `OutOfRange` when `t` lies outside the sequence span.
    pub fn check_span(&self, t: f64) -> Result<()> {
        self.span().check(t)
    }

    // ========================================================================
    // TIME
    // ========================================================================

    pub fn resolve_frame(&self, t: f64, sensor: SensorKind) -> Result<u32> {
        self.clocks.resolve(sensor, t, &self.config.sync)
    }

    pub fn synced_frames(&self, t: f64) -> Result<SyncedFrames> {
        self.clocks.synced(t, &self.config.sync)
    }

    // ========================================================================
    // ANNOTATIONS
    // ========================================================================

    /// Annotations of a radar capture expressed in `target`.
    pub fn annotations_for(&self, radar_frame_id: u32, target: TargetFrame) -> Result<Vec<ProjectedObject>> {
        let raw = self.store.annotations_for_raw(radar_frame_id)?;
        self.express_in(&raw, target)
    }

    /// Like [`Self::annotations_for`], with box origins interpolated between
    /// the resolved radar capture and the next one at query time `t`.
    pub fn interpolated_annotations(&self, t: f64, target: TargetFrame) -> Result<Vec<ProjectedObject>> {
        let radar_id = self.resolve_frame(t, SensorKind::Radar)?;
        let index = annotation_index(radar_id)?;
        let radar = self.clocks.table(SensorKind::Radar);

        let next_time = radar_id.checked_add(1).and_then(|next| radar.time_of(next));
        let raw = match (radar.time_of(radar_id), next_time) {
            (Some(t_index), Some(t_next)) => self.store.interpolated_at(index, t, t_index, t_next),
            _ => self.store.annotations_at(index),
        };
        self.express_in(&raw, target)
    }

    fn express_in(&self, raw: &[RawAnnotation], target: TargetFrame) -> Result<Vec<ProjectedObject>> {
        let classes = &self.config.classes;
        if let Some(side) = target.camera_side() {
            return camera_objects(
                raw,
                classes,
                self.calibration.camera(side),
                self.calibration.radar_to(side),
                &self.calibration.radar,
                &self.config.boxes,
            );
        }

        match target {
            TargetFrame::LidarImage => ground_objects(&self.lidar_transform.apply_all(raw)?, classes),
            _ => ground_objects(raw, classes),
        }
    }

    // ========================================================================
    // POINT CLOUDS
    // ========================================================================

    /// Projects a lidar sweep into one camera.
    pub fn project_point_cloud(
        &self,
        points: &[LidarPoint],
        side: CameraSide,
        mode: ColorMode,
    ) -> Result<Vec<ProjectedPoint>> {
        project_points(
            points,
            self.calibration.lidar_to(side),
            self.calibration.camera(side),
            self.config.lidar_proj.max_dist,
            mode,
        )
    }

    /// Rasterizes a lidar sweep onto the configured bird's-eye grid.
    pub fn lidar_image(&self, points: &[LidarPoint]) -> Vec<BevPixel> {
        lidar_to_bev(points, &self.config.lidar_image)
    }

    // ========================================================================
    // QUERY
    // ========================================================================

    /// Resolves every sensor at `t` and builds each enabled annotation view.
    pub fn query(&self, t: f64) -> Result<FrameQuery> {
        let frames = self.synced_frames(t)?;
        let views = self.config.views;

        let build = |enabled: bool, target: TargetFrame| -> Result<Option<Vec<ProjectedObject>>> {
            if enabled {
                self.annotations_for(frames.radar, target).map(Some)
            } else {
                Ok(None)
            }
        };

        Ok(FrameQuery {
            frames,
            radar_cartesian: build(views.radar_cartesian, TargetFrame::RadarCartesian)?,
            lidar_image: build(views.lidar_image, TargetFrame::LidarImage)?,
            camera_left: build(views.camera_left, TargetFrame::CameraLeft)?,
            camera_right: build(views.camera_right, TargetFrame::CameraRight)?,
        })
    }
}

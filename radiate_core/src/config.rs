//! Sequence configuration.
//!
//! Every tunable the engines read lives here as an explicit, immutable value
//! handed over at construction time. Defaults carry the stock values of the
//! RADIATE capture rig.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::{Result, SyncError};
use crate::radiate_annotations::AnnotationFilter;
use crate::radiate_points::ColorMode;
use crate::radiate_time::SensorKind;

// ============================================================================
// SYNCHRONIZATION
// ============================================================================

/// Fixed latency of each sensor clock relative to the query clock (seconds).
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncOffsets {
    pub camera: f64,
    pub lidar: f64,
    pub radar: f64,
}

impl SyncOffsets {
    pub fn get(&self, sensor: SensorKind) -> f64 {
        match sensor {
            SensorKind::Camera => self.camera,
            SensorKind::Lidar => self.lidar,
            SensorKind::Radar => self.radar,
        }
    }
}

// ============================================================================
// PROJECTION
// ============================================================================

/// Parameters of the 3D box wireframe projection.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BoxProjectionConfig {
    /// Ground elevation of box footprints in the radar frame (meters)
    pub ground_z: f64,

    /// Points at or beyond this camera depth are clipped (meters)
    pub max_range: f64,

    /// Fraction of width/height trimmed from the annotated footprint
    pub inset: f64,
}

impl Default for BoxProjectionConfig {
    fn default() -> Self {
        Self {
            ground_z: -1.7,
            max_range: 50.0,
            inset: 0.2,
        }
    }
}

/// Lidar-to-camera point projection settings.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LidarProjectionConfig {
    /// Points at or beyond this depth are dropped (meters)
    pub max_dist: f64,
    pub color_mode: ColorMode,
}

impl Default for LidarProjectionConfig {
    fn default() -> Self {
        Self {
            max_dist: 50.0,
            color_mode: ColorMode::PseudoDistance,
        }
    }
}

/// Bird's-eye lidar image grid.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LidarImageConfig {
    /// Grid size in pixels [width, height]
    pub res: [u32; 2],

    /// Half extent covered by the grid along each axis (meters)
    pub range_m: f64,

    /// Drop points at or below `-ground_thresh`
    pub remove_ground: bool,
    pub ground_thresh: f64,

    /// Shade by laser ring instead of intensity
    pub use_ring: bool,
}

impl Default for LidarImageConfig {
    fn default() -> Self {
        Self {
            res: [1152, 1152],
            range_m: 100.0,
            remove_ground: false,
            ground_thresh: 1.5,
            use_ring: true,
        }
    }
}

impl LidarImageConfig {
    pub fn half_width(&self) -> f64 {
        self.res[0] as f64 / 2.0
    }

    pub fn half_height(&self) -> f64 {
        self.res[1] as f64 / 2.0
    }

    /// Meters per pixel along x and y.
    pub fn cell_res(&self) -> (f64, f64) {
        (
            self.range_m / self.half_width(),
            self.range_m / self.half_height(),
        )
    }
}

/// Annotation views produced by a per-timestamp query.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ViewConfig {
    pub radar_cartesian: bool,
    pub lidar_image: bool,
    pub camera_left: bool,
    pub camera_right: bool,
}

impl Default for ViewConfig {
    fn default() -> Self {
        Self {
            radar_cartesian: true,
            lidar_image: true,
            camera_left: true,
            camera_right: true,
        }
    }
}

// ============================================================================
// CLASS TABLE
// ============================================================================

/// Rendering height and color of one object class.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ClassStyle {
    /// Box extrusion height (meters)
    pub height: f64,

    /// RGB in [0, 1]
    pub color: [f64; 3],
}

/// Closed lookup table keyed by `class_name`.
///
/// Unknown names are a data/config mismatch and fail loudly.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ClassTable {
    classes: BTreeMap<String, ClassStyle>,
}

impl ClassTable {
    pub fn new(classes: BTreeMap<String, ClassStyle>) -> Self {
        Self { classes }
    }

    pub fn style(&self, class_name: &str) -> Result<&ClassStyle> {
        self.classes
            .get(class_name)
            .ok_or_else(|| SyncError::invalid(format!("unknown class_name {class_name:?}")))
    }

    pub fn height(&self, class_name: &str) -> Result<f64> {
        self.style(class_name).map(|s| s.height)
    }

    pub fn color(&self, class_name: &str) -> Result<[f64; 3]> {
        self.style(class_name).map(|s| s.color)
    }

    /// Color scaled to 8-bit RGB.
    pub fn color_u8(&self, class_name: &str) -> Result<[u8; 3]> {
        let c = self.color(class_name)?;
        Ok(c.map(|v| (v.clamp(0.0, 1.0) * 255.0).round() as u8))
    }

    pub fn contains(&self, class_name: &str) -> bool {
        self.classes.contains_key(class_name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.classes.keys().map(String::as_str)
    }
}

impl Default for ClassTable {
    fn default() -> Self {
        let entries: [(&str, f64, [f64; 3]); 8] = [
            ("car", 1.5, [1.0, 0.0, 0.0]),
            ("bus", 5.0, [0.0, 1.0, 0.0]),
            ("truck", 2.5, [0.0, 0.0, 1.0]),
            ("pedestrian", 1.8, [1.0, 1.0, 0.0]),
            ("van", 2.0, [1.0, 0.3, 0.0]),
            ("group_of_pedestrians", 1.8, [1.0, 1.0, 0.3]),
            ("motorbike", 1.5, [0.0, 1.0, 1.0]),
            ("bicycle", 1.5, [0.3, 1.0, 1.0]),
        ];

        Self {
            classes: entries
                .into_iter()
                .map(|(name, height, color)| (name.to_string(), ClassStyle { height, color }))
                .collect(),
        }
    }
}

// ============================================================================
// SEQUENCE CONFIG
// ============================================================================

/// Configuration of one recorded sequence.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SequenceConfig {
    /// Timestamp log names relative to the sequence directory
    pub camera_timestamp_file: String,
    pub radar_timestamp_file: String,
    pub lidar_timestamp_file: String,

    pub sync: SyncOffsets,

    /// Fixed z used when moving ground points between frames (meters)
    pub sensors_height: f64,

    pub boxes: BoxProjectionConfig,
    pub lidar_proj: LidarProjectionConfig,
    pub lidar_image: LidarImageConfig,
    pub views: ViewConfig,
    pub annotation_filter: AnnotationFilter,
    pub classes: ClassTable,
}

impl Default for SequenceConfig {
    fn default() -> Self {
        Self {
            camera_timestamp_file: "zed_left.txt".to_string(),
            radar_timestamp_file: "Navtech_Cartesian.txt".to_string(),
            lidar_timestamp_file: "velo_lidar.txt".to_string(),
            sync: SyncOffsets::default(),
            sensors_height: -1.7,
            boxes: BoxProjectionConfig::default(),
            lidar_proj: LidarProjectionConfig::default(),
            lidar_image: LidarImageConfig::default(),
            views: ViewConfig::default(),
            annotation_filter: AnnotationFilter::default(),
            classes: ClassTable::default(),
        }
    }
}

impl SequenceConfig {
    /// Parses a JSON config; omitted keys keep their defaults.
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Rejects values no engine can work with.
    pub fn validate(&self) -> Result<()> {
        if !(self.boxes.max_range > 0.0) {
            return Err(SyncError::invalid("boxes.max_range must be positive"));
        }
        if !(0.0..1.0).contains(&self.boxes.inset) {
            return Err(SyncError::invalid("boxes.inset must be in [0, 1)"));
        }
        if !(self.lidar_proj.max_dist > 0.0) {
            return Err(SyncError::invalid("lidar_proj.max_dist must be positive"));
        }
        if self.lidar_image.res[0] == 0 || self.lidar_image.res[1] == 0 {
            return Err(SyncError::invalid("lidar_image.res must be non-zero"));
        }
        if !(self.lidar_image.range_m > 0.0) {
            return Err(SyncError::invalid("lidar_image.range_m must be positive"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_default_class_table() {
        let classes = ClassTable::default();
        assert_relative_eq!(classes.height("bus").unwrap(), 5.0);
        assert_eq!(classes.color_u8("truck").unwrap(), [0, 0, 255]);
        assert_eq!(classes.names().count(), 8);
    }

    #[test]
    fn test_unknown_class_fails_loudly() {
        let classes = ClassTable::default();
        assert!(matches!(
            classes.height("tram"),
            Err(SyncError::InvalidInput(_))
        ));
    }

    #[test]
    fn test_partial_json_keeps_defaults() {
        let json = r#"{
            "sync": { "camera": 0.05, "radar": -0.02 },
            "boxes": { "max_range": 80.0 },
            "lidar_proj": { "color_mode": "same" },
            "annotation_filter": "present"
        }"#;
        let config = SequenceConfig::from_json_str(json).unwrap();

        assert_relative_eq!(config.sync.camera, 0.05);
        assert_relative_eq!(config.sync.lidar, 0.0);
        assert_relative_eq!(config.boxes.max_range, 80.0);
        assert_relative_eq!(config.boxes.ground_z, -1.7);
        assert_eq!(config.lidar_proj.color_mode, ColorMode::Same);
        assert_eq!(config.annotation_filter, AnnotationFilter::Present);
        assert_eq!(config.radar_timestamp_file, "Navtech_Cartesian.txt");
        assert!(config.classes.contains("car"));
    }

    #[test]
    fn test_invalid_config_rejected() {
        let json = r#"{ "boxes": { "inset": 1.5 } }"#;
        assert!(SequenceConfig::from_json_str(json).is_err());
    }

    #[test]
    fn test_lidar_cell_resolution() {
        let cfg = LidarImageConfig::default();
        let (rx, ry) = cfg.cell_res();
        assert_relative_eq!(rx, 100.0 / 576.0);
        assert_relative_eq!(ry, 100.0 / 576.0);
    }
}

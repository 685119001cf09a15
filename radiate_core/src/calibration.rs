//! Calibration bundle consumed by the projection engines.
//!
//! All matrices are supplied externally and treated as read-only for the
//! lifetime of a sequence. Nothing in this crate mutates them; rescaled
//! variants are always fresh copies (see `radiate_frames`).

use nalgebra::{Matrix3, Matrix4, Point2, Point3};
use serde::{Deserialize, Serialize};

use crate::error::{Result, SyncError};

/// Which of the two stereo cameras a projection targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CameraSide {
    Left,
    Right,
}

// ============================================================================
// INTRINSICS
// ============================================================================

/// Pinhole camera intrinsics plus image resolution.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "IntrinsicsDoc", into = "IntrinsicsDoc")]
pub struct CameraIntrinsics {
    pub fx: f64,
    pub fy: f64,
    pub cx: f64,
    pub cy: f64,

    /// Image size in pixels [width, height]
    pub resolution: [u32; 2],
}

impl CameraIntrinsics {
    /// Reads focal lengths and principal point from a 3x3 `K`.
    pub fn from_matrix(k: &Matrix3<f64>, resolution: [u32; 2]) -> Result<Self> {
        let intrinsics = Self {
            fx: k[(0, 0)],
            fy: k[(1, 1)],
            cx: k[(0, 2)],
            cy: k[(1, 2)],
            resolution,
        };
        if intrinsics.fx == 0.0 || intrinsics.fy == 0.0 {
            return Err(SyncError::invalid("intrinsic matrix has zero focal length"));
        }
        Ok(intrinsics)
    }

    pub fn matrix(&self) -> Matrix3<f64> {
        Matrix3::new(
            self.fx, 0.0, self.cx, //
            0.0, self.fy, self.cy, //
            0.0, 0.0, 1.0,
        )
    }

    /// Continuous pixel coordinates of a camera-frame point (no rounding).
    pub fn project(&self, p: &Point3<f64>) -> (f64, f64) {
        (self.fx * p.x / p.z + self.cx, self.fy * p.y / p.z + self.cy)
    }

    /// Strictly inside the image: `0 < u < width` and `0 < v < height`.
    pub fn contains_strict(&self, u: i32, v: i32) -> bool {
        u > 0 && (u as i64) < self.resolution[0] as i64 && v > 0 && (v as i64) < self.resolution[1] as i64
    }
}

#[derive(Serialize, Deserialize)]
struct IntrinsicsDoc {
    #[serde(with = "row_major3")]
    matrix: Matrix3<f64>,
    res: [u32; 2],
}

impl TryFrom<IntrinsicsDoc> for CameraIntrinsics {
    type Error = SyncError;

    fn try_from(doc: IntrinsicsDoc) -> Result<Self> {
        CameraIntrinsics::from_matrix(&doc.matrix, doc.res)
    }
}

impl From<CameraIntrinsics> for IntrinsicsDoc {
    fn from(k: CameraIntrinsics) -> Self {
        Self {
            matrix: k.matrix(),
            res: k.resolution,
        }
    }
}

// ============================================================================
// RADAR GRID
// ============================================================================

/// Geometry of the radar's top-down cartesian image.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RadarGrid {
    /// Meters per cell
    pub range_res: f64,

    /// Pixel coordinate of the radar origin along both axes
    pub range_cells: f64,
}

impl Default for RadarGrid {
    fn default() -> Self {
        Self {
            range_res: 0.173_611_1,
            range_cells: 576.0,
        }
    }
}

impl RadarGrid {
    /// Radar pixel -> metric ground coordinates (x right, y forward).
    pub fn pixel_to_ground(&self, p: &Point2<f64>) -> Point2<f64> {
        Point2::new(
            (p.x - self.range_cells) * self.range_res,
            (self.range_cells - p.y) * self.range_res,
        )
    }

    /// Metric ground coordinates -> radar pixel.
    pub fn ground_to_pixel(&self, g: &Point2<f64>) -> Point2<f64> {
        Point2::new(
            g.x / self.range_res + self.range_cells,
            self.range_cells - g.y / self.range_res,
        )
    }
}

// ============================================================================
// CALIBRATION SET
// ============================================================================

/// Every intrinsic/extrinsic the engines use.
///
/// Extrinsics map homogeneous points from the first-named frame into the
/// second (`radar_to_left * p_radar = p_left`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CalibrationSet {
    pub left_camera: CameraIntrinsics,
    pub right_camera: CameraIntrinsics,

    #[serde(with = "row_major4")]
    pub lidar_to_left: Matrix4<f64>,
    #[serde(with = "row_major4")]
    pub lidar_to_right: Matrix4<f64>,
    #[serde(with = "row_major4")]
    pub radar_to_left: Matrix4<f64>,
    #[serde(with = "row_major4")]
    pub radar_to_right: Matrix4<f64>,
    #[serde(with = "row_major4")]
    pub radar_to_lidar: Matrix4<f64>,

    pub radar: RadarGrid,
}

impl CalibrationSet {
    /// Parses a JSON calibration document (matrices written row by row).
    pub fn from_json_str(json: &str) -> Result<Self> {
        let calib: Self = serde_json::from_str(json)?;
        calib.validate()?;
        Ok(calib)
    }

    /// Finite values everywhere and a positive radar resolution.
    pub fn validate(&self) -> Result<()> {
        let extrinsics = [
            ("lidar_to_left", &self.lidar_to_left),
            ("lidar_to_right", &self.lidar_to_right),
            ("radar_to_left", &self.radar_to_left),
            ("radar_to_right", &self.radar_to_right),
            ("radar_to_lidar", &self.radar_to_lidar),
        ];
        for (name, m) in extrinsics {
            if m.iter().any(|v| !v.is_finite()) {
                return Err(SyncError::invalid(format!("{name} has non-finite entries")));
            }
        }
        if !(self.radar.range_res > 0.0) {
            return Err(SyncError::invalid("radar.range_res must be positive"));
        }
        Ok(())
    }

    pub fn camera(&self, side: CameraSide) -> &CameraIntrinsics {
        match side {
            CameraSide::Left => &self.left_camera,
            CameraSide::Right => &self.right_camera,
        }
    }

    pub fn lidar_to(&self, side: CameraSide) -> &Matrix4<f64> {
        match side {
            CameraSide::Left => &self.lidar_to_left,
            CameraSide::Right => &self.lidar_to_right,
        }
    }

    pub fn radar_to(&self, side: CameraSide) -> &Matrix4<f64> {
        match side {
            CameraSide::Left => &self.radar_to_left,
            CameraSide::Right => &self.radar_to_right,
        }
    }
}

// ============================================================================
// ROW-MAJOR SERDE
// ============================================================================

// nalgebra serializes column-major flat arrays; calibration files are
// written as nested rows.

mod row_major4 {
    use nalgebra::Matrix4;
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    pub fn serialize<S: Serializer>(m: &Matrix4<f64>, s: S) -> Result<S::Ok, S::Error> {
        let rows: [[f64; 4]; 4] = std::array::from_fn(|r| std::array::from_fn(|c| m[(r, c)]));
        rows.serialize(s)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Matrix4<f64>, D::Error> {
        let rows = <[[f64; 4]; 4]>::deserialize(d)?;
        Ok(Matrix4::from_fn(|r, c| rows[r][c]))
    }
}

mod row_major3 {
    use nalgebra::Matrix3;
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    pub fn serialize<S: Serializer>(m: &Matrix3<f64>, s: S) -> Result<S::Ok, S::Error> {
        let rows: [[f64; 3]; 3] = std::array::from_fn(|r| std::array::from_fn(|c| m[(r, c)]));
        rows.serialize(s)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Matrix3<f64>, D::Error> {
        let rows = <[[f64; 3]; 3]>::deserialize(d)?;
        Ok(Matrix3::from_fn(|r, c| rows[r][c]))
    }
}

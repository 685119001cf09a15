//! The "POINTS" Engine - Dense Lidar Projection
//!
//! Projects one lidar sweep into a camera image or onto the bird's-eye grid.
//! Both are plain O(N) scans over the sweep; a single sweep holds a few
//! thousand points and nothing is kept between queries.

use nalgebra::{Matrix4, Vector3};
use serde::{Deserialize, Serialize};

use crate::calibration::CameraIntrinsics;
use crate::config::LidarImageConfig;
use crate::error::{Result, SyncError};
use crate::radiate_boxes::Pixel;

/// Color used by [`ColorMode::Same`].
pub const SAME_COLOR: [u8; 3] = [0, 255, 0];

/// One lidar return: position in the lidar frame plus per-return channels.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LidarPoint {
    pub x: f64,
    pub y: f64,
    pub z: f64,
    #[serde(default)]
    pub intensity: f64,
    #[serde(default)]
    pub ring: f64,
}

impl LidarPoint {
    pub fn new(x: f64, y: f64, z: f64) -> Self {
        Self {
            x,
            y,
            z,
            intensity: 0.0,
            ring: 0.0,
        }
    }

    pub fn with_channels(mut self, intensity: f64, ring: f64) -> Self {
        self.intensity = intensity;
        self.ring = ring;
        self
    }
}

/// How projected points are colored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ColorMode {
    /// Fixed green
    Same,
    /// Viridis by range / max distance
    PseudoDistance,
    /// No color; consumers use the carried range
    Distance,
}

/// A lidar return landed inside the camera image.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ProjectedPoint {
    pub pixel: Pixel,

    /// Camera-frame z (meters)
    pub depth: f64,

    /// Euclidean distance from the camera (meters)
    pub range: f64,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub color: Option<[u8; 3]>,
}

/// Projects lidar points into a camera.
///
/// The extrinsic is applied as rotation followed by translation (no
/// homogeneous divide). Points survive when `0 < depth < max_dist` and their
/// truncated pixel lies strictly inside the image.
pub fn project_points(
    points: &[LidarPoint],
    extrinsic: &Matrix4<f64>,
    intrinsics: &CameraIntrinsics,
    max_dist: f64,
    mode: ColorMode,
) -> Result<Vec<ProjectedPoint>> {
    if !(max_dist > 0.0) {
        return Err(SyncError::invalid(format!("max_dist must be positive, got {max_dist}")));
    }

    let rotation = extrinsic.fixed_view::<3, 3>(0, 0);
    let translation = extrinsic.fixed_view::<3, 1>(0, 3);

    let mut out = Vec::new();
    for point in points {
        let cam = rotation * Vector3::new(point.x, point.y, point.z) + translation;
        if cam.z <= 0.0 || cam.z >= max_dist {
            continue;
        }

        let u = (intrinsics.fx * cam.x / cam.z + intrinsics.cx) as i32;
        let v = (intrinsics.fy * cam.y / cam.z + intrinsics.cy) as i32;
        if !intrinsics.contains_strict(u, v) {
            continue;
        }

        let range = cam.norm();
        let color = match mode {
            ColorMode::Same => Some(SAME_COLOR),
            ColorMode::PseudoDistance => Some(viridis(range / max_dist)),
            ColorMode::Distance => None,
        };

        out.push(ProjectedPoint {
            pixel: [u, v],
            depth: cam.z,
            range,
            color,
        });
    }

    Ok(out)
}

// ============================================================================
// BIRD'S-EYE IMAGE
// ============================================================================

/// A lidar return on the bird's-eye grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BevPixel {
    pub pixel: Pixel,

    /// Gray level: ring * 8 or intensity, saturated to 8 bits
    pub value: u8,
}

/// Rasterizes a sweep onto the top-down grid centered on the lidar.
pub fn lidar_to_bev(points: &[LidarPoint], cfg: &LidarImageConfig) -> Vec<BevPixel> {
    let (res_x, res_y) = cfg.cell_res();
    let (half_w, half_h) = (cfg.half_width(), cfg.half_height());
    let (width, height) = (cfg.res[0] as i64, cfg.res[1] as i64);

    points
        .iter()
        .filter(|p| !cfg.remove_ground || p.z > -cfg.ground_thresh)
        .filter_map(|p| {
            let u = (p.x / res_x + half_w) as i64;
            let v = (half_h - p.y / res_y) as i64;
            if u < 0 || u >= width || v < 0 || v >= height {
                return None;
            }

            let shade = if cfg.use_ring { p.ring * 8.0 } else { p.intensity };
            Some(BevPixel {
                pixel: [u as i32, v as i32],
                value: shade.clamp(0.0, 255.0) as u8,
            })
        })
        .collect()
}

// ============================================================================
// COLORMAP
// ============================================================================

/// Viridis sample for `t` in [0, 1] (clamped), as 8-bit RGB.
///
/// Degree-6 polynomial fit of the matplotlib table (CC0,
/// https://www.shadertoy.com/view/WlfXRN).
pub fn viridis(t: f64) -> [u8; 3] {
    const C: [[f64; 3]; 7] = [
        [0.2777273272234177, 0.005407344544966578, 0.3340998053353061],
        [0.1050930431085774, 1.404613529898575, 1.384590162594685],
        [-0.3308618287255563, 0.214847559468213, 0.09509516302823659],
        [-4.634230498983486, -5.799100973351585, -19.33244095627987],
        [6.228269936347081, 14.17993336680509, 56.69055260068105],
        [4.776384997670288, -13.74514537774601, -65.35303263337234],
        [-5.435455855934631, 4.645852612178535, 26.3124352495832],
    ];

    let t = if t.is_nan() { 0.0 } else { t.clamp(0.0, 1.0) };

    // Horner from the highest-order term down
    std::array::from_fn(|ch| {
        let c = C.iter().rev().fold(0.0, |acc, coeffs| acc * t + coeffs[ch]);
        (c.clamp(0.0, 1.0) * 255.0) as u8
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn camera() -> CameraIntrinsics {
        CameraIntrinsics {
            fx: 100.0,
            fy: 100.0,
            cx: 50.0,
            cy: 50.0,
            resolution: [100, 100],
        }
    }

    #[test]
    fn test_projects_with_truncation() {
        let points = [LidarPoint::new(0.259, -0.101, 1.0)];
        let out = project_points(&points, &Matrix4::identity(), &camera(), 50.0, ColorMode::Same).unwrap();

        assert_eq!(out.len(), 1);
        // 75.9 -> 75, 39.9 -> 39
        assert_eq!(out[0].pixel, [75, 39]);
        assert_eq!(out[0].color, Some(SAME_COLOR));
        assert_relative_eq!(out[0].depth, 1.0);
    }

    #[test]
    fn test_rotation_then_translation() {
        // Lidar x-forward -> camera z-forward, shifted 2m further ahead
        let mut extrinsic = Matrix4::zeros();
        extrinsic[(0, 1)] = -1.0;
        extrinsic[(1, 2)] = -1.0;
        extrinsic[(2, 0)] = 1.0;
        extrinsic[(2, 3)] = 2.0;
        extrinsic[(3, 3)] = 1.0;

        let points = [LidarPoint::new(8.0, 0.0, 0.0)];
        let out = project_points(&points, &extrinsic, &camera(), 50.0, ColorMode::Distance).unwrap();

        assert_eq!(out[0].pixel, [50, 50]);
        assert_relative_eq!(out[0].depth, 10.0);
        assert_relative_eq!(out[0].range, 10.0);
        assert!(out[0].color.is_none());
    }

    #[test]
    fn test_depth_window_and_bounds() {
        let points = [
            LidarPoint::new(0.0, 0.0, -1.0),  // behind
            LidarPoint::new(0.0, 0.0, 50.0),  // at max_dist
            LidarPoint::new(0.0, 0.0, 0.0),   // zero depth
            LidarPoint::new(5.0, 0.0, 1.0),   // u = 550, off image
            LidarPoint::new(-0.5, 0.0, 1.0),  // u = 0, on the excluded border
            LidarPoint::new(0.1, 0.1, 10.0),  // kept
        ];
        let out = project_points(&points, &Matrix4::identity(), &camera(), 50.0, ColorMode::Same).unwrap();
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].pixel, [51, 51]);
    }

    #[test]
    fn test_pseudo_distance_colors_differ_with_range() {
        let points = [LidarPoint::new(0.0, 0.0, 2.0), LidarPoint::new(0.0, 0.0, 45.0)];
        let out = project_points(&points, &Matrix4::identity(), &camera(), 50.0, ColorMode::PseudoDistance)
            .unwrap();
        assert_eq!(out[0].color, Some(viridis(2.0 / 50.0)));
        assert_ne!(out[0].color, out[1].color);
    }

    #[test]
    fn test_bad_max_dist() {
        assert!(project_points(&[], &Matrix4::identity(), &camera(), 0.0, ColorMode::Same).is_err());
    }

    #[test]
    fn test_viridis_endpoints() {
        // Dark purple at 0, yellow at 1
        let lo = viridis(0.0);
        let hi = viridis(1.0);
        assert!(lo[2] > lo[1] && lo[0] < 100);
        assert!(hi[0] > 200 && hi[1] > 200 && hi[2] < 80);
        assert_eq!(viridis(-3.0), lo);
        assert_eq!(viridis(7.0), hi);
    }

    #[test]
    fn test_bev_grid_mapping() {
        let cfg = LidarImageConfig {
            res: [200, 200],
            range_m: 100.0,
            remove_ground: false,
            ground_thresh: 1.5,
            use_ring: true,
        };
        let points = [
            LidarPoint::new(0.0, 0.0, 0.0).with_channels(10.0, 3.0),
            LidarPoint::new(10.0, 20.0, 0.0).with_channels(10.0, 40.0),
            LidarPoint::new(500.0, 0.0, 0.0),
        ];
        let bev = lidar_to_bev(&points, &cfg);

        assert_eq!(bev.len(), 2);
        assert_eq!(bev[0].pixel, [100, 100]);
        assert_eq!(bev[0].value, 24);
        // 1 m per cell: x right, y up
        assert_eq!(bev[1].pixel, [110, 80]);
        assert_eq!(bev[1].value, 255);
    }

    #[test]
    fn test_bev_ground_removal_and_intensity() {
        let cfg = LidarImageConfig {
            res: [200, 200],
            range_m: 100.0,
            remove_ground: true,
            ground_thresh: 1.5,
            use_ring: false,
        };
        let points = [
            LidarPoint::new(1.0, 1.0, -1.8).with_channels(90.0, 1.0),
            LidarPoint::new(1.0, 1.0, -0.4).with_channels(90.0, 1.0),
        ];
        let bev = lidar_to_bev(&points, &cfg);
        assert_eq!(bev.len(), 1);
        assert_eq!(bev[0].value, 90);
    }
}

//! The "FRAMES" Engine - Rigid Transforms Between Sensor Frames
//!
//! Ground-plane annotations live in the radar's pixel grid. Moving them into
//! another top-down grid (the lidar bird's-eye image) needs the extrinsic's
//! ground-axis translation expressed in pixels of that grid, so the matrix is
//! rescaled once per target and cached. The shared calibration matrix itself
//! is never touched.

use nalgebra::{Matrix4, Point2, Point3, Vector4};

use crate::error::{Result, SyncError};
use crate::radiate_annotations::RawAnnotation;

/// Homogeneous transform of a 3D point, dehomogenized by w.
pub fn transform_point(p: &Point3<f64>, m: &Matrix4<f64>) -> Result<Point3<f64>> {
    let h = m * Vector4::new(p.x, p.y, p.z, 1.0);
    let w = h[3];
    if w.abs() < f64::EPSILON || !w.is_finite() {
        return Err(SyncError::invalid(format!(
            "transform maps {p} to w = {w}, cannot dehomogenize"
        )));
    }
    Ok(Point3::new(h[0] / w, h[1] / w, h[2] / w))
}

/// Transforms `[x, y, z_fixed, 1]` and keeps only the ground-plane components.
pub fn transform_ground_point(x: f64, y: f64, z_fixed: f64, m: &Matrix4<f64>) -> Result<Point2<f64>> {
    let p = transform_point(&Point3::new(x, y, z_fixed), m)?;
    Ok(Point2::new(p.x, p.y))
}

/// Copy of `m` with the x/y translation converted from meters to grid cells.
///
/// Must be applied exactly once per calibration matrix; the input is left
/// untouched.
pub fn scale_ground_translation(m: &Matrix4<f64>, cell_res_x: f64, cell_res_y: f64) -> Result<Matrix4<f64>> {
    if !(cell_res_x > 0.0 && cell_res_y > 0.0) {
        return Err(SyncError::invalid(format!(
            "cell resolution must be positive, got ({cell_res_x}, {cell_res_y})"
        )));
    }
    let mut scaled = *m;
    scaled[(0, 3)] /= cell_res_x;
    scaled[(1, 3)] /= cell_res_y;
    Ok(scaled)
}

/// A ground-plane transform with its translation already in target pixels.
///
/// Built once per target frame when a sequence is opened and shared
/// read-only afterwards.
#[derive(Debug, Clone, PartialEq)]
pub struct GroundPlaneTransform {
    matrix: Matrix4<f64>,
    z_fixed: f64,
}

impl GroundPlaneTransform {
    pub fn new(extrinsic: &Matrix4<f64>, cell_res: (f64, f64), z_fixed: f64) -> Result<Self> {
        Ok(Self {
            matrix: scale_ground_translation(extrinsic, cell_res.0, cell_res.1)?,
            z_fixed,
        })
    }

    /// The identity mapping (annotations stay in the radar grid).
    pub fn identity(z_fixed: f64) -> Self {
        Self {
            matrix: Matrix4::identity(),
            z_fixed,
        }
    }

    pub fn matrix(&self) -> &Matrix4<f64> {
        &self.matrix
    }

    pub fn z_fixed(&self) -> f64 {
        self.z_fixed
    }

    pub fn apply_point(&self, x: f64, y: f64) -> Result<Point2<f64>> {
        transform_ground_point(x, y, self.z_fixed, &self.matrix)
    }

    /// Moves the box origin; size and rotation are kept.
    pub fn apply(&self, annotation: &RawAnnotation) -> Result<RawAnnotation> {
        let moved = self.apply_point(annotation.bbox.x(), annotation.bbox.y())?;
        Ok(RawAnnotation {
            id: annotation.id.clone(),
            class_name: annotation.class_name.clone(),
            bbox: annotation.bbox.with_origin(moved.x, moved.y),
        })
    }

    pub fn apply_all(&self, annotations: &[RawAnnotation]) -> Result<Vec<RawAnnotation>> {
        annotations.iter().map(|a| self.apply(a)).collect()
    }
}

//! The "BOXES" Engine - Footprint Geometry and 3D Wireframe Projection
//!
//! Annotations are 2D rotated rectangles on the radar ground plane. For the
//! bird's-eye views they stay rectangles. For the cameras each footprint is
//! extruded by its class height into an 8-corner box, traced as a 21-vertex
//! polyline, moved into the camera frame, depth-clipped and projected through
//! the pinhole model.
//!
//! ```text
//!        p8 ─────── p7          p1..p4  ground corners
//!       ╱│         ╱│           p5..p8  same corners + height
//!     p5 ─────── p6 │
//!      │ p4 ──────│─ p3
//!      │╱         │╱
//!     p1 ─────── p2
//! ```

use nalgebra::{Matrix4, Point2, Point3, Rotation2, Vector2};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::calibration::{CameraIntrinsics, RadarGrid};
use crate::config::{BoxProjectionConfig, ClassTable};
use crate::error::{Result, SyncError};
use crate::radiate_annotations::{BBoxRecord, ObjectId, RawAnnotation};
use crate::radiate_frames::transform_point;

/// Integer pixel coordinate `[u, v]`.
pub type Pixel = [i32; 2];

/// Corner indices (p1 = 0 .. p8 = 7) of the polyline that draws all 12 box
/// edges without lifting the pen.
pub const WIREFRAME_ORDER: [usize; 21] = [
    0, 1, 2, 3, 0, 4, 5, 1, 5, 6, 2, 6, 7, 3, 7, 4, 3, 2, 1, 5, 2,
];

// ============================================================================
// FOOTPRINT
// ============================================================================

/// Rotation for a clockwise-positive angle in degrees.
pub fn footprint_rotation(rotation_deg: f64) -> Rotation2<f64> {
    Rotation2::new(-rotation_deg.to_radians())
}

/// Corners of the box rotated about its center, optionally shrunk.
///
/// `inset` trims that fraction of width and height while keeping the center.
/// Corner order is top-left, top-right, bottom-right, bottom-left of the
/// unrotated box.
pub fn rotated_corners(bbox: &[f64; 4], rotation_deg: f64, inset: f64) -> Result<[Point2<f64>; 4]> {
    BBoxRecord::new(*bbox, rotation_deg).validate()?;
    if !(0.0..1.0).contains(&inset) {
        return Err(SyncError::invalid(format!("inset {inset} outside [0, 1)")));
    }

    let [x, y, w, h] = *bbox;
    let center = Point2::new(x + w / 2.0, y + h / 2.0);
    let half_w = w * (1.0 - inset) / 2.0;
    let half_h = h * (1.0 - inset) / 2.0;
    let rot = footprint_rotation(rotation_deg);

    let offsets = [
        [-half_w, -half_h],
        [half_w, -half_h],
        [half_w, half_h],
        [-half_w, half_h],
    ];

    Ok(offsets.map(|[dx, dy]| center + rot * Vector2::new(dx, dy)))
}

/// The annotated rectangle as 4 integer pixel corners (no inset, truncated).
pub fn rotated_rectangle(bbox: &BBoxRecord) -> Result<[Pixel; 4]> {
    let corners = rotated_corners(&bbox.position, bbox.rotation, 0.0)?;
    Ok(corners.map(|c| [c.x as i32, c.y as i32]))
}

// ============================================================================
// 3D BOX
// ============================================================================

/// Extrudes 4 metric ground corners into the 8 corners of a box.
pub fn extrude(ground: &[Point2<f64>; 4], ground_z: f64, height: f64) -> [Point3<f64>; 8] {
    std::array::from_fn(|i| {
        let c = ground[i % 4];
        let z = if i < 4 { ground_z } else { ground_z + height };
        Point3::new(c.x, c.y, z)
    })
}

/// The 21-vertex edge-tracing polyline over the 8 box corners.
pub fn wireframe(corners: &[Point3<f64>; 8]) -> [Point3<f64>; 21] {
    WIREFRAME_ORDER.map(|i| corners[i])
}

/// Projects an annotated footprint as a 3D wireframe into a camera image.
///
/// Points whose camera depth is not in `(0, max_range)`, or that map to w = 0,
/// are dropped without
/// re-inserting anything, so a partially clipped box gives a shorter,
/// discontinuous polyline. The first surviving vertex is not returned. An
/// empty result means the object is not visible in this view.
pub fn project_box_3d(
    bbox: &[f64; 4],
    rotation_deg: f64,
    height: f64,
    intrinsics: &CameraIntrinsics,
    extrinsic: &Matrix4<f64>,
    radar: &RadarGrid,
    params: &BoxProjectionConfig,
) -> Result<Vec<Pixel>> {
    if !height.is_finite() {
        return Err(SyncError::invalid(format!("object height {height} is not finite")));
    }

    let pixels = rotated_corners(bbox, rotation_deg, params.inset)?;
    let ground = pixels.map(|p| radar.pixel_to_ground(&p));
    let corners = extrude(&ground, params.ground_z, height);

    let mut projected = Vec::with_capacity(WIREFRAME_ORDER.len());
    for p in wireframe(&corners) {
        // A vertex the extrinsic sends to infinity is clipped like any other
        let Ok(cam) = transform_point(&p, extrinsic) else {
            continue;
        };
        if cam.z <= 0.0 || cam.z >= params.max_range {
            continue;
        }
        let (u, v) = intrinsics.project(&cam);
        // Half-way pixels round to even
        projected.push([u.round_ties_even() as i32, v.round_ties_even() as i32]);
    }

    if projected.is_empty() {
        debug!("Box {:?} fully clipped for this camera", bbox);
        return Ok(projected);
    }

    projected.remove(0);
    Ok(projected)
}

// ============================================================================
// PROJECTED OBJECTS
// ============================================================================

/// Geometry of an annotation expressed in a target view.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ProjectedGeometry {
    /// Bird's-eye views: the (moved) box and its rotated corners
    Ground { bbox: BBoxRecord, corners: [Pixel; 4] },

    /// Camera views: polyline to draw edge-to-edge with wraparound
    Wireframe { points: Vec<Pixel> },
}

/// An annotation ready for a renderer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProjectedObject {
    pub id: ObjectId,
    pub class_name: String,

    /// Class color, 8-bit RGB
    pub color: [u8; 3],

    pub geometry: ProjectedGeometry,
}

impl ProjectedObject {
    /// False for a fully clipped wireframe.
    pub fn is_visible(&self) -> bool {
        match &self.geometry {
            ProjectedGeometry::Ground { .. } => true,
            ProjectedGeometry::Wireframe { points } => !points.is_empty(),
        }
    }

    pub fn wireframe(&self) -> Option<&[Pixel]> {
        match &self.geometry {
            ProjectedGeometry::Wireframe { points } => Some(points),
            ProjectedGeometry::Ground { .. } => None,
        }
    }
}

/// Annotations kept as 2D rotated rectangles in their ground-plane grid.
pub fn ground_objects(annotations: &[RawAnnotation], classes: &ClassTable) -> Result<Vec<ProjectedObject>> {
    annotations
        .iter()
        .map(|a| {
            Ok(ProjectedObject {
                id: a.id.clone(),
                class_name: a.class_name.clone(),
                color: classes.color_u8(&a.class_name)?,
                geometry: ProjectedGeometry::Ground {
                    bbox: a.bbox,
                    corners: rotated_rectangle(&a.bbox)?,
                },
            })
        })
        .collect()
}

/// Radar-frame annotations projected as wireframes into one camera.
pub fn camera_objects(
    annotations: &[RawAnnotation],
    classes: &ClassTable,
    intrinsics: &CameraIntrinsics,
    radar_to_camera: &Matrix4<f64>,
    radar: &RadarGrid,
    params: &BoxProjectionConfig,
) -> Result<Vec<ProjectedObject>> {
    annotations
        .iter()
        .map(|a| {
            let style = classes.style(&a.class_name)?;
            let points = project_box_3d(
                &a.bbox.position,
                a.bbox.rotation,
                style.height,
                intrinsics,
                radar_to_camera,
                radar,
                params,
            )?;
            Ok(ProjectedObject {
                id: a.id.clone(),
                class_name: a.class_name.clone(),
                color: classes.color_u8(&a.class_name)?,
                geometry: ProjectedGeometry::Wireframe { points },
            })
        })
        .collect()
}

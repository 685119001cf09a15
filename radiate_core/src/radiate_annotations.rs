//! The "ANNOTATIONS" Adapter - Per-Frame Object Lookup
//!
//! Object annotations are stored as one bounding-box time series per tracked
//! object, indexed by *annotation* frame. Annotation frames are one-indexed
//! relative to the raw radar/lidar capture ids, so every lookup driven by a
//! resolved sensor frame goes through [`annotation_index`] first.

use std::fmt;

use nalgebra::Point2;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{Result, SyncError};

// ============================================================================
// RECORDS
// ============================================================================

/// Identity of a tracked object; datasets use either integers or strings.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ObjectId {
    Int(i64),
    Name(String),
}

impl fmt::Display for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ObjectId::Int(id) => write!(f, "{id}"),
            ObjectId::Name(name) => write!(f, "{name}"),
        }
    }
}

impl From<i64> for ObjectId {
    fn from(id: i64) -> Self {
        ObjectId::Int(id)
    }
}

impl From<&str> for ObjectId {
    fn from(name: &str) -> Self {
        ObjectId::Name(name.to_string())
    }
}

/// Visibility of an object at one annotation frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Visibility {
    /// Annotated and visible
    Visible,
    /// Annotated but flagged occluded or deleted
    Hidden,
    /// No record for this frame
    Absent,
}

/// One annotated 2D box in the radar ground-plane pixel grid.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BBoxRecord {
    /// [x, y, width, height] of the axis-aligned box before rotation
    pub position: [f64; 4],

    /// Degrees, clockwise-positive, about the box center
    pub rotation: f64,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub visible: Option<bool>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deleted: Option<bool>,
}

impl BBoxRecord {
    pub fn new(position: [f64; 4], rotation: f64) -> Self {
        Self {
            position,
            rotation,
            visible: None,
            deleted: None,
        }
    }

    pub fn x(&self) -> f64 {
        self.position[0]
    }

    pub fn y(&self) -> f64 {
        self.position[1]
    }

    pub fn width(&self) -> f64 {
        self.position[2]
    }

    pub fn height(&self) -> f64 {
        self.position[3]
    }

    pub fn center(&self) -> Point2<f64> {
        Point2::new(
            self.x() + self.width() / 2.0,
            self.y() + self.height() / 2.0,
        )
    }

    /// Same box with its origin (top-left) moved.
    pub fn with_origin(&self, x: f64, y: f64) -> Self {
        let mut moved = *self;
        moved.position[0] = x;
        moved.position[1] = y;
        moved
    }

    /// Missing flags count as visible and not deleted.
    pub fn is_visible(&self) -> bool {
        self.visible.unwrap_or(true) && !self.deleted.unwrap_or(false)
    }

    /// Finite values and strictly positive extent.
    pub fn validate(&self) -> Result<()> {
        if self.position.iter().any(|v| !v.is_finite()) || !self.rotation.is_finite() {
            return Err(SyncError::invalid(format!(
                "bounding box {:?} / {} has non-finite values",
                self.position, self.rotation
            )));
        }
        if self.width() <= 0.0 || self.height() <= 0.0 {
            return Err(SyncError::invalid(format!(
                "bounding box {:?} has non-positive width or height",
                self.position
            )));
        }
        Ok(())
    }
}

/// A tracked object and its per-frame box series.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawTrackedObject")]
pub struct TrackedObject {
    pub id: ObjectId,
    pub class_name: String,

    /// Indexed by annotation frame; `None` where the object was not annotated
    pub bboxes: Vec<Option<BBoxRecord>>,
}

impl TrackedObject {
    pub fn record(&self, index: usize) -> Option<&BBoxRecord> {
        self.bboxes.get(index).and_then(Option::as_ref)
    }

    pub fn visibility(&self, index: usize) -> Visibility {
        match self.record(index) {
            None => Visibility::Absent,
            Some(r) if r.is_visible() => Visibility::Visible,
            Some(_) => Visibility::Hidden,
        }
    }
}

// Annotation files mark missing frames with `null` or `{}`.
#[derive(Deserialize)]
struct RawTrackedObject {
    id: ObjectId,
    class_name: String,
    #[serde(default)]
    bboxes: Vec<Option<RawBBox>>,
}

#[derive(Deserialize)]
struct RawBBox {
    #[serde(default)]
    position: Option<[f64; 4]>,
    #[serde(default)]
    rotation: Option<f64>,
    #[serde(default)]
    visible: Option<bool>,
    #[serde(default)]
    deleted: Option<bool>,
}

impl RawBBox {
    fn is_empty(&self) -> bool {
        self.position.is_none() && self.rotation.is_none() && self.visible.is_none() && self.deleted.is_none()
    }
}

impl TryFrom<RawTrackedObject> for TrackedObject {
    type Error = SyncError;

    /// Only `null` and `{}` mean "not annotated"; any other record must
    /// carry both `position` and `rotation`.
    fn try_from(raw: RawTrackedObject) -> Result<Self> {
        let id = raw.id;
        let bboxes = raw
            .bboxes
            .into_iter()
            .enumerate()
            .map(|(index, entry)| {
                let entry = match entry {
                    Some(entry) if !entry.is_empty() => entry,
                    _ => return Ok(None),
                };
                let (position, rotation) = match (entry.position, entry.rotation) {
                    (Some(p), Some(r)) => (p, r),
                    (None, _) => {
                        return Err(SyncError::invalid(format!(
                            "object {id} frame {index}: box record without position"
                        )))
                    }
                    (_, None) => {
                        return Err(SyncError::invalid(format!(
                            "object {id} frame {index}: box record without rotation"
                        )))
                    }
                };
                Ok(Some(BBoxRecord {
                    position,
                    rotation,
                    visible: entry.visible,
                    deleted: entry.deleted,
                }))
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Self {
            id,
            class_name: raw.class_name,
            bboxes,
        })
    }
}

/// An object's box at one frame, as handed to the projection engines.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawAnnotation {
    pub id: ObjectId,
    pub class_name: String,
    pub bbox: BBoxRecord,
}

// ============================================================================
// INDEXING
// ============================================================================

/// Which records take part in a lookup.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnnotationFilter {
    /// Any non-null record
    Present,
    /// Non-null, visible and not deleted
    #[default]
    Visible,
}

impl AnnotationFilter {
    pub fn accepts(&self, visibility: Visibility) -> bool {
        match self {
            AnnotationFilter::Present => visibility != Visibility::Absent,
            AnnotationFilter::Visible => visibility == Visibility::Visible,
        }
    }
}

/// Raw radar/lidar capture id -> annotation frame index.
///
/// Annotations are one-indexed with respect to capture ids for both radar and
/// lidar, so this is `raw - 1`. Capture id 0 has no annotation frame.
pub fn annotation_index(raw_frame_id: u32) -> Result<usize> {
    raw_frame_id
        .checked_sub(1)
        .map(|i| i as usize)
        .ok_or_else(|| SyncError::invalid("raw frame id 0 has no annotation frame"))
}

/// Linear interpolation of a coordinate between two timestamps.
///
/// Returns `p1` when the timestamps coincide.
pub fn lerp_at(p1: f64, t: f64, t1: f64, t2: f64, p2: f64) -> f64 {
    if t2 == t1 {
        return p1;
    }
    p1 + (t - t1) * ((p2 - p1) / (t2 - t1))
}

// ============================================================================
// STORE
// ============================================================================

/// Immutable list of all tracked objects of a sequence.
#[derive(Debug, Clone, Default)]
pub struct AnnotationStore {
    objects: Vec<TrackedObject>,
    filter: AnnotationFilter,
}

impl AnnotationStore {
    pub fn new(objects: Vec<TrackedObject>, filter: AnnotationFilter) -> Self {
        debug!(
            "Annotation store: {} objects over {} frames ({:?} filter)",
            objects.len(),
            objects.iter().map(|o| o.bboxes.len()).max().unwrap_or(0),
            filter
        );
        Self { objects, filter }
    }

    /// Parses an annotation document (a JSON array of objects).
    pub fn from_json_str(json: &str, filter: AnnotationFilter) -> Result<Self> {
        let objects: Vec<TrackedObject> = serde_json::from_str(json)?;
        Ok(Self::new(objects, filter))
    }

    pub fn objects(&self) -> &[TrackedObject] {
        &self.objects
    }

    pub fn filter(&self) -> AnnotationFilter {
        self.filter
    }

    pub fn len(&self) -> usize {
        self.objects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }

    /// Longest box series in the store.
    pub fn frame_count(&self) -> usize {
        self.objects.iter().map(|o| o.bboxes.len()).max().unwrap_or(0)
    }

    /// All objects accepted by the filter at `index`; empty when none match.
    pub fn annotations_at(&self, index: usize) -> Vec<RawAnnotation> {
        self.objects
            .iter()
            .filter(|o| self.filter.accepts(o.visibility(index)))
            .filter_map(|o| {
                o.record(index).map(|bbox| RawAnnotation {
                    id: o.id.clone(),
                    class_name: o.class_name.clone(),
                    bbox: *bbox,
                })
            })
            .collect()
    }

    /// Lookup driven by a resolved radar or lidar capture id.
    pub fn annotations_for_raw(&self, raw_frame_id: u32) -> Result<Vec<RawAnnotation>> {
        Ok(self.annotations_at(annotation_index(raw_frame_id)?))
    }

    /// Annotations at `index` with box origins interpolated towards `index + 1`.
    ///
    /// `t_index` and `t_next` are the capture times of the two annotation
    /// frames. Objects without an accepted record at `index + 1` keep their
    /// stored position.
    pub fn interpolated_at(&self, index: usize, t: f64, t_index: f64, t_next: f64) -> Vec<RawAnnotation> {
        self.objects
            .iter()
            .filter(|o| self.filter.accepts(o.visibility(index)))
            .filter_map(|o| {
                let bbox = o.record(index)?;
                let bbox = match o.record(index + 1) {
                    Some(next) if self.filter.accepts(o.visibility(index + 1)) => bbox.with_origin(
                        lerp_at(bbox.x(), t, t_index, t_next, next.x()),
                        lerp_at(bbox.y(), t, t_index, t_next, next.y()),
                    ),
                    _ => *bbox,
                };
                Some(RawAnnotation {
                    id: o.id.clone(),
                    class_name: o.class_name.clone(),
                    bbox,
                })
            })
            .collect()
    }
}

//! The "TIME" Engine - Nearest-Neighbour Frame Resolution
//!
//! Camera, lidar and radar each stamp frames with their own capture clock.
//! A query timestamp is snapped to the closest logged frame of every sensor
//! after correcting for a fixed per-sensor latency offset. Sensor payloads are
//! never interpolated, only the frame index is resolved.

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::config::SyncOffsets;
use crate::error::{Result, SyncError};

// ============================================================================
// TIMESTAMP TABLE
// ============================================================================

/// One row of a sensor's timestamp log.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TimestampEntry {
    /// Capture frame id as written by the logger (may have gaps)
    pub frame_id: u32,

    /// Capture time in seconds
    pub time: f64,
}

/// Resolves the frame whose time minimises `|time - t + offset|`.
///
/// Ties go to the earliest row. The returned id always comes from `entries`.
pub fn nearest_frame(entries: &[TimestampEntry], t: f64, offset: f64) -> Result<u32> {
    if !t.is_finite() || !offset.is_finite() {
        return Err(SyncError::invalid(format!(
            "non-finite query time {t} or offset {offset}"
        )));
    }

    let (first, rest) = entries
        .split_first()
        .ok_or_else(|| SyncError::invalid("cannot resolve against an empty timestamp table"))?;

    let mut best = first;
    let mut best_diff = (first.time - t + offset).abs();

    for entry in rest {
        let diff = (entry.time - t + offset).abs();
        if diff < best_diff {
            best = entry;
            best_diff = diff;
        }
    }

    Ok(best.frame_id)
}

/// Ordered, immutable timestamp log of a single sensor.
#[derive(Debug, Clone, Serialize)]
pub struct TimestampTable {
    entries: Vec<TimestampEntry>,
}

impl TimestampTable {
    /// Builds a table, rejecting empty, non-finite or out-of-order logs.
    pub fn new(entries: Vec<TimestampEntry>) -> Result<Self> {
        if entries.is_empty() {
            return Err(SyncError::invalid("timestamp table is empty"));
        }

        for (i, entry) in entries.iter().enumerate() {
            if !entry.time.is_finite() {
                return Err(SyncError::invalid(format!(
                    "frame {} has non-finite time",
                    entry.frame_id
                )));
            }
            if i > 0 && entry.time < entries[i - 1].time {
                return Err(SyncError::invalid(format!(
                    "timestamps go backwards at frame {} ({} < {})",
                    entry.frame_id,
                    entry.time,
                    entries[i - 1].time
                )));
            }
        }

        Ok(Self { entries })
    }

    /// Builds a table from `(frame_id, time)` pairs.
    pub fn from_pairs(pairs: impl IntoIterator<Item = (u32, f64)>) -> Result<Self> {
        Self::new(
            pairs
                .into_iter()
                .map(|(frame_id, time)| TimestampEntry { frame_id, time })
                .collect(),
        )
    }

    /// Parses a sensor timestamp log.
    ///
    /// Each non-blank line holds four whitespace-separated fields, e.g.
    /// `Frame: 000123 Time: 1574859771.744660272`; the second field is the
    /// frame id and the fourth the time in seconds.
    pub fn parse(text: &str) -> Result<Self> {
        let mut entries = Vec::new();

        for (idx, line) in text.lines().enumerate() {
            let line_no = idx + 1;
            let fields: Vec<&str> = line.split_whitespace().collect();
            if fields.is_empty() {
                continue;
            }
            if fields.len() != 4 {
                return Err(SyncError::parse(
                    line_no,
                    format!("expected 4 fields, found {}", fields.len()),
                ));
            }

            let frame_id = fields[1]
                .parse::<u32>()
                .map_err(|e| SyncError::parse(line_no, format!("bad frame id {:?}: {e}", fields[1])))?;
            let time = fields[3]
                .parse::<f64>()
                .map_err(|e| SyncError::parse(line_no, format!("bad time {:?}: {e}", fields[3])))?;

            entries.push(TimestampEntry { frame_id, time });
        }

        let table = Self::new(entries)?;
        debug!(
            "Parsed timestamp log: {} frames spanning {:.3}s",
            table.len(),
            table.last_time() - table.first_time()
        );
        Ok(table)
    }

    /// Nearest frame id for `t`, with the sensor's latency `offset`.
    pub fn resolve(&self, t: f64, offset: f64) -> Result<u32> {
        nearest_frame(&self.entries, t, offset)
    }

    pub fn entries(&self) -> &[TimestampEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Always false; construction rejects empty logs.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn first_time(&self) -> f64 {
        self.entries[0].time
    }

    pub fn last_time(&self) -> f64 {
        self.entries[self.entries.len() - 1].time
    }

    /// Capture time of a frame id, if logged.
    pub fn time_of(&self, frame_id: u32) -> Option<f64> {
        self.entries
            .iter()
            .find(|e| e.frame_id == frame_id)
            .map(|e| e.time)
    }

    pub fn contains_frame(&self, frame_id: u32) -> bool {
        self.time_of(frame_id).is_some()
    }
}

// ============================================================================
// SEQUENCE CLOCKS
// ============================================================================

/// The three sensors of a recording.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SensorKind {
    Camera,
    Lidar,
    Radar,
}

impl SensorKind {
    pub fn all() -> [SensorKind; 3] {
        [SensorKind::Camera, SensorKind::Lidar, SensorKind::Radar]
    }

    pub fn name(&self) -> &'static str {
        match self {
            SensorKind::Camera => "camera",
            SensorKind::Lidar => "lidar",
            SensorKind::Radar => "radar",
        }
    }
}

/// Time interval covered by a sequence: earliest first frame to latest last frame.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SequenceSpan {
    pub start: f64,
    pub end: f64,
}

impl SequenceSpan {
    pub fn contains(&self, t: f64) -> bool {
        t >= self.start && t <= self.end
    }

    /// `OutOfRange` when `t` falls outside the span.
    pub fn check(&self, t: f64) -> Result<()> {
        if self.contains(t) {
            Ok(())
        } else {
            Err(SyncError::OutOfRange {
                t,
                start: self.start,
                end: self.end,
            })
        }
    }

    pub fn duration(&self) -> f64 {
        self.end - self.start
    }
}

/// Frame ids of every sensor resolved for one query time.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SyncedFrames {
    /// Query time these ids were resolved for
    pub time: f64,
    pub camera: u32,
    pub lidar: u32,
    pub radar: u32,

    /// True when `time` was outside the sequence span (match is degraded)
    pub degraded: bool,
}

impl SyncedFrames {
    pub fn get(&self, sensor: SensorKind) -> u32 {
        match sensor {
            SensorKind::Camera => self.camera,
            SensorKind::Lidar => self.lidar,
            SensorKind::Radar => self.radar,
        }
    }
}

/// Timestamp tables of all three sensors of a sequence, loaded once.
#[derive(Debug, Clone)]
pub struct SensorClocks {
    pub camera: TimestampTable,
    pub lidar: TimestampTable,
    pub radar: TimestampTable,
}

impl SensorClocks {
    pub fn new(camera: TimestampTable, lidar: TimestampTable, radar: TimestampTable) -> Self {
        Self {
            camera,
            lidar,
            radar,
        }
    }

    pub fn table(&self, sensor: SensorKind) -> &TimestampTable {
        match sensor {
            SensorKind::Camera => &self.camera,
            SensorKind::Lidar => &self.lidar,
            SensorKind::Radar => &self.radar,
        }
    }

    /// Span from the earliest first timestamp to the latest last timestamp.
    pub fn span(&self) -> SequenceSpan {
        let tables = [&self.camera, &self.lidar, &self.radar];
        SequenceSpan {
            start: tables
                .iter()
                .map(|t| t.first_time())
                .fold(f64::INFINITY, f64::min),
            end: tables
                .iter()
                .map(|t| t.last_time())
                .fold(f64::NEG_INFINITY, f64::max),
        }
    }

    /// Resolves a single sensor's frame id.
    pub fn resolve(&self, sensor: SensorKind, t: f64, offsets: &SyncOffsets) -> Result<u32> {
        self.table(sensor).resolve(t, offsets.get(sensor))
    }

    /// Resolves all three sensors. Out-of-span queries are flagged, not rejected.
    pub fn synced(&self, t: f64, offsets: &SyncOffsets) -> Result<SyncedFrames> {
        let span = self.span();
        let degraded = !span.contains(t);
        if degraded {
            warn!(
                "Query time {:.6}s outside sequence span [{:.6}, {:.6}], using nearest frames",
                t, span.start, span.end
            );
        }

        Ok(SyncedFrames {
            time: t,
            camera: self.resolve(SensorKind::Camera, t, offsets)?,
            lidar: self.resolve(SensorKind::Lidar, t, offsets)?,
            radar: self.resolve(SensorKind::Radar, t, offsets)?,
            degraded,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn three_frames() -> TimestampTable {
        TimestampTable::from_pairs([(1, 0.0), (2, 1.0), (3, 2.0)]).unwrap()
    }

    #[test]
    fn test_offset_shifts_match() {
        let table = three_frames();
        // |1.0 - 0.95 + 0.1| = 0.15 beats 0.85 and 1.15
        assert_eq!(table.resolve(0.95, 0.1).unwrap(), 2);
        // Large offset pulls the match back to the first frame
        assert_eq!(table.resolve(0.95, 0.9).unwrap(), 1);
        assert_eq!(table.resolve(1.6, 0.0).unwrap(), 3);
    }

    #[test]
    fn test_returns_frame_id_not_row_index() {
        let table = TimestampTable::from_pairs([(10, 0.0), (14, 0.5), (40, 1.0)]).unwrap();
        assert_eq!(table.resolve(0.45, 0.0).unwrap(), 14);
        assert_eq!(table.resolve(99.0, 0.0).unwrap(), 40);
    }

    #[test]
    fn test_tie_goes_to_first_minimum() {
        let table = three_frames();
        assert_eq!(table.resolve(0.5, 0.0).unwrap(), 1);
    }

    #[test]
    fn test_single_entry_always_matches() {
        let table = TimestampTable::from_pairs([(7, 3.0)]).unwrap();
        assert_eq!(table.resolve(-100.0, 0.0).unwrap(), 7);
        assert_eq!(table.resolve(100.0, 5.0).unwrap(), 7);
    }

    #[test]
    fn test_empty_table_is_invalid() {
        assert!(matches!(
            nearest_frame(&[], 0.0, 0.0),
            Err(SyncError::InvalidInput(_))
        ));
        assert!(matches!(
            TimestampTable::new(Vec::new()),
            Err(SyncError::InvalidInput(_))
        ));
    }

    #[test]
    fn test_backwards_time_rejected() {
        let result = TimestampTable::from_pairs([(1, 1.0), (2, 0.5)]);
        assert!(matches!(result, Err(SyncError::InvalidInput(_))));
    }

    #[test]
    fn test_nan_query_rejected() {
        let table = three_frames();
        assert!(table.resolve(f64::NAN, 0.0).is_err());
    }

    #[test]
    fn test_parse_timestamp_log() {
        let text = "Frame: 000001 Time: 1574859771.744660272\n\
                    Frame: 000002 Time: 1574859772.007127576\n\
                    \n\
                    Frame: 000004 Time: 1574859772.269594880\n";
        let table = TimestampTable::parse(text).unwrap();

        assert_eq!(table.len(), 3);
        assert_eq!(table.entries()[2].frame_id, 4);
        assert_relative_eq!(table.first_time(), 1574859771.744660272, epsilon = 1e-6);
        assert!(table.contains_frame(2));
        assert!(!table.contains_frame(3));
    }

    #[test]
    fn test_parse_reports_line_number() {
        let text = "Frame: 000001 Time: 0.0\nFrame: xx Time: 1.0\n";
        match TimestampTable::parse(text) {
            Err(SyncError::Parse { line, .. }) => assert_eq!(line, 2),
            other => panic!("expected parse error, got {:?}", other),
        }
    }

    #[test]
    fn test_span_and_synced_frames() {
        let clocks = SensorClocks::new(
            TimestampTable::from_pairs([(1, 0.2), (2, 0.4), (3, 0.6)]).unwrap(),
            TimestampTable::from_pairs([(1, 0.0), (2, 0.5), (3, 1.0)]).unwrap(),
            TimestampTable::from_pairs([(1, 0.1), (2, 0.35), (3, 0.6), (4, 0.85)]).unwrap(),
        );

        let span = clocks.span();
        assert_relative_eq!(span.start, 0.0);
        assert_relative_eq!(span.end, 1.0);

        let offsets = SyncOffsets::default();
        let frames = clocks.synced(0.41, &offsets).unwrap();
        assert_eq!(frames.camera, 2);
        assert_eq!(frames.lidar, 2);
        assert_eq!(frames.radar, 2);
        assert!(!frames.degraded);

        let late = clocks.synced(5.0, &offsets).unwrap();
        assert!(late.degraded);
        assert_eq!(late.get(SensorKind::Radar), 4);
        assert!(span.check(5.0).unwrap_err().is_out_of_range());
    }
}

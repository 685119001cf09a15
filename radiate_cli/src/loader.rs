//! File collaborators: everything the core consumes, read from disk.
//!
//! Sequence directory layout:
//!
//! ```text
//! <sequence>/
//!   zed_left.txt  velo_lidar.txt  Navtech_Cartesian.txt   timestamp logs
//!   annotations/annotations.json                          tracked objects
//!   velo_lidar/000001.csv ...                             lidar sweeps
//! ```

use std::fs;
use std::io::Read;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use csv::ReaderBuilder;
use tracing::{debug, info};

use radiate_core::radiate_time::SensorClocks;
use radiate_core::{
    AnnotationFilter, AnnotationStore, CalibrationSet, LidarPoint, Sequence, SequenceConfig, TimestampTable,
};

fn read_text(path: &Path) -> Result<String> {
    fs::read_to_string(path).with_context(|| format!("Failed to read {}", path.display()))
}

/// Sequence config, or the stock values when no file is given.
pub fn load_config(path: Option<&Path>) -> Result<SequenceConfig> {
    match path {
        Some(path) => SequenceConfig::from_json_str(&read_text(path)?)
            .with_context(|| format!("Invalid config {}", path.display())),
        None => Ok(SequenceConfig::default()),
    }
}

pub fn load_calibration(path: &Path) -> Result<CalibrationSet> {
    CalibrationSet::from_json_str(&read_text(path)?)
        .with_context(|| format!("Invalid calibration {}", path.display()))
}

pub fn load_timestamps(path: &Path) -> Result<TimestampTable> {
    TimestampTable::parse(&read_text(path)?).with_context(|| format!("Invalid timestamp log {}", path.display()))
}

pub fn annotations_path(sequence: &Path) -> PathBuf {
    sequence.join("annotations").join("annotations.json")
}

pub fn load_annotations(path: &Path, filter: AnnotationFilter) -> Result<AnnotationStore> {
    AnnotationStore::from_json_str(&read_text(path)?, filter)
        .with_context(|| format!("Invalid annotations {}", path.display()))
}

/// Reads every file a sequence needs and opens it.
pub fn open_sequence(root: &Path, config: SequenceConfig, calibration: CalibrationSet) -> Result<Sequence> {
    let clocks = SensorClocks::new(
        load_timestamps(&root.join(&config.camera_timestamp_file))?,
        load_timestamps(&root.join(&config.lidar_timestamp_file))?,
        load_timestamps(&root.join(&config.radar_timestamp_file))?,
    );
    let store = load_annotations(&annotations_path(root), config.annotation_filter)?;

    info!(
        "Loaded {}: {} camera / {} lidar / {} radar frames, {} objects",
        root.display(),
        clocks.camera.len(),
        clocks.lidar.len(),
        clocks.radar.len(),
        store.len()
    );

    Sequence::new(config, calibration, clocks, store).with_context(|| format!("Cannot open {}", root.display()))
}

/// `velo_lidar/000042.csv` for frame 42.
pub fn lidar_csv_path(sequence: &Path, frame_id: u32) -> PathBuf {
    sequence.join("velo_lidar").join(format!("{frame_id:06}.csv"))
}

/// Parses a headerless `x,y,z,intensity,ring` sweep.
pub fn read_lidar_points<R: Read>(reader: R) -> Result<Vec<LidarPoint>> {
    let mut rdr = ReaderBuilder::new()
        .has_headers(false)
        .trim(csv::Trim::All)
        .from_reader(reader);

    let mut points = Vec::new();
    for (row, rec) in rdr.deserialize().enumerate() {
        let point: LidarPoint = rec.with_context(|| format!("Bad lidar row {}", row + 1))?;
        points.push(point);
    }
    Ok(points)
}

pub fn load_lidar_points(path: &Path) -> Result<Vec<LidarPoint>> {
    let file = fs::File::open(path).with_context(|| format!("Failed to open {}", path.display()))?;
    let points = read_lidar_points(file).with_context(|| format!("Invalid lidar sweep {}", path.display()))?;
    debug!("{} points from {}", points.len(), path.display());
    Ok(points)
}

//! RADIATE Sequence Synchronizer CLI
//!
//! Resolve synchronized sensor frames and project annotations over a recorded sequence.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::Parser;
use radiate_cli::loader::{lidar_csv_path, load_calibration, load_config, load_lidar_points, open_sequence};
use radiate_cli::{log_filter, sweep_times, ExportFrame, LidarExport, LogTarget, QueryExport};
use radiate_core::{CameraSide, Sequence};
use tracing::{debug, error, info, warn};
use tracing_subscriber::FmtSubscriber;

/// RADIATE multi-sensor synchronization CLI
#[derive(Parser, Debug)]
#[command(name = "radiate-sync")]
#[command(about = "Resolve synchronized frames and project annotations for a RADIATE sequence", long_about = None)]
struct Args {
    /// Sequence directory (timestamp logs, annotations/, velo_lidar/)
    #[arg(short, long)]
    sequence: PathBuf,

    /// Sequence config JSON (stock values when omitted)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Calibration JSON
    #[arg(short, long)]
    calibration: PathBuf,

    /// Single query timestamp in seconds (overrides the sweep)
    #[arg(short, long)]
    time: Option<f64>,

    /// Sweep start (defaults to the sequence start)
    #[arg(long)]
    start: Option<f64>,

    /// Sweep end (defaults to the sequence end)
    #[arg(long)]
    end: Option<f64>,

    /// Sweep step in seconds
    #[arg(long, default_value = "0.25")]
    step: f64,

    /// Also project each resolved lidar sweep into both cameras
    #[arg(long)]
    lidar: bool,

    /// Verbose output
    #[arg(short, long)]
    verbose: bool,

    /// JSON summary on stdout
    #[arg(long)]
    json: bool,

    /// Export every query to a JSON file
    #[arg(long)]
    export: Option<String>,
}

/// Reads and projects the lidar sweep resolved for one query.
fn project_lidar(sequence: &Sequence, root: &Path, frame_id: u32) -> Result<LidarExport> {
    let points = load_lidar_points(&lidar_csv_path(root, frame_id))?;
    let mode = sequence.config().lidar_proj.color_mode;

    Ok(LidarExport {
        frame_id,
        point_count: points.len(),
        camera_left: sequence.project_point_cloud(&points, CameraSide::Left, mode)?,
        camera_right: sequence.project_point_cloud(&points, CameraSide::Right, mode)?,
        bev: sequence.lidar_image(&points),
    })
}

fn run(args: &Args) -> Result<()> {
    let config = load_config(args.config.as_deref())?;
    let calibration = load_calibration(&args.calibration)?;
    let sequence = open_sequence(&args.sequence, config, calibration)?;

    let span = sequence.span();
    let times = match args.time {
        Some(t) => {
            if let Err(e) = sequence.check_span(t) {
                warn!("{}", e);
            }
            vec![t]
        }
        None => sweep_times(span, args.start, args.end, args.step)?,
    };

    let name = args
        .sequence
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| args.sequence.display().to_string());
    let mut export = QueryExport::new(&name, span);

    for t in times {
        let query = sequence
            .query(t)
            .with_context(|| format!("Query at t={t:.6} failed"))?;

        let lidar = if args.lidar {
            Some(project_lidar(&sequence, &args.sequence, query.frames.lidar)?)
        } else {
            None
        };

        let frame = ExportFrame::new(query, lidar);
        if !args.json {
            info!(
                "t={:.3} | camera={} lidar={} radar={} | objects={}{}",
                t,
                frame.query.frames.camera,
                frame.query.frames.lidar,
                frame.query.frames.radar,
                frame.object_count(),
                if frame.query.frames.degraded { " (degraded)" } else { "" }
            );
        }
        if let Some(lidar) = &frame.lidar {
            debug!(
                "  lidar {} | {} points -> left={} right={} bev={}",
                lidar.frame_id,
                lidar.point_count,
                lidar.camera_left.len(),
                lidar.camera_right.len(),
                lidar.bev.len()
            );
        }
        export.add_frame(frame);
    }

    if args.json {
        let summary = serde_json::json!({
            "sequence": export.sequence,
            "span": [span.start, span.end],
            "queries": export.frames.len(),
            "degraded": export.degraded_frames,
            "frames": export.frames.iter().map(|f| {
                serde_json::json!({
                    "time": f.time_sec,
                    "camera": f.query.frames.camera,
                    "lidar": f.query.frames.lidar,
                    "radar": f.query.frames.radar,
                    "objects": f.object_count(),
                })
            }).collect::<Vec<_>>(),
        });
        println!("{}", serde_json::to_string_pretty(&summary)?);
    } else {
        info!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
        info!(
            "{} queries over [{:.3}, {:.3}], {} degraded",
            export.frames.len(),
            span.start,
            span.end,
            export.degraded_frames
        );
    }

    if let Some(path) = &args.export {
        export
            .write_to_file(path)
            .with_context(|| format!("Failed to write export {path}"))?;
        info!("Exported {} frames to {}", export.frames.len(), path);
    }

    Ok(())
}

fn main() {
    let args = Args::parse();

    // Initialize logging
    let filter = log_filter(args.verbose, std::env::var("RUST_LOG").ok().as_deref());
    let builder = FmtSubscriber::builder().with_env_filter(filter);
    let installed = match LogTarget::for_output(args.json) {
        LogTarget::Stderr => tracing::subscriber::set_global_default(builder.with_writer(std::io::stderr).finish()),
        LogTarget::Stdout => tracing::subscriber::set_global_default(builder.finish()),
    };
    if let Err(e) = installed {
        eprintln!("Failed to set tracing subscriber: {e}");
    }

    if !args.json {
        info!("RADIATE Sequence Synchronizer v{}", env!("CARGO_PKG_VERSION"));
    }

    if let Err(e) = run(&args) {
        error!("{:#}", e);
        std::process::exit(1);
    }
}

//! Property tests over the time and geometry engines.

use approx::assert_relative_eq;
use nalgebra::{Matrix4, Point3, Rotation3, Translation3, Vector3};
use proptest::prelude::*;

use radiate_core::calibration::{CameraIntrinsics, RadarGrid};
use radiate_core::config::BoxProjectionConfig;
use radiate_core::radiate_boxes::{project_box_3d, rotated_corners};
use radiate_core::radiate_frames::transform_point;
use radiate_core::radiate_time::{nearest_frame, TimestampTable};

/// Tables with gapped ids and strictly increasing times.
fn timestamp_table() -> impl Strategy<Value = TimestampTable> {
    prop::collection::vec((1u32..4, 0.01f64..5.0), 1..40).prop_map(|steps| {
        let mut id = 0;
        let mut time = 1_574_859_771.0;
        let pairs: Vec<(u32, f64)> = steps
            .into_iter()
            .map(|(did, dt)| {
                id += did;
                time += dt;
                (id, time)
            })
            .collect();
        TimestampTable::from_pairs(pairs).unwrap()
    })
}

fn pinhole() -> CameraIntrinsics {
    CameraIntrinsics {
        fx: 100.0,
        fy: 100.0,
        cx: 50.0,
        cy: 50.0,
        resolution: [100, 100],
    }
}

// Radar x right / y forward / z up -> camera x right / y down / z forward
fn radar_to_camera() -> Matrix4<f64> {
    Matrix4::new(
        1.0, 0.0, 0.0, 0.0, //
        0.0, 0.0, -1.0, 0.0, //
        0.0, 1.0, 0.0, 0.0, //
        0.0, 0.0, 0.0, 1.0,
    )
}

// One radar pixel per meter, origin at pixel (0, 0)
fn unit_grid() -> RadarGrid {
    RadarGrid {
        range_res: 1.0,
        range_cells: 0.0,
    }
}

proptest! {
    #[test]
    fn resolved_frame_is_in_table(
        table in timestamp_table(),
        dt in -20.0f64..220.0,
        offset in -2.0f64..2.0,
    ) {
        let t = table.first_time() + dt;
        let id = table.resolve(t, offset).unwrap();
        prop_assert!(table.contains_frame(id));
    }

    #[test]
    fn resolution_is_monotonic(
        table in timestamp_table(),
        a in 0.0f64..1.0,
        b in 0.0f64..1.0,
    ) {
        let span = table.last_time() - table.first_time();
        let (lo, hi) = if a <= b { (a, b) } else { (b, a) };
        let t1 = table.first_time() + lo * span;
        let t2 = table.first_time() + hi * span;

        let id1 = nearest_frame(table.entries(), t1, 0.0).unwrap();
        let id2 = nearest_frame(table.entries(), t2, 0.0).unwrap();
        prop_assert!(id1 <= id2);
    }

    #[test]
    fn transform_round_trips_through_inverse(
        yaw in -3.1f64..3.1,
        tx in -20.0f64..20.0,
        ty in -20.0f64..20.0,
        tz in -3.0f64..3.0,
        x in -500.0f64..500.0,
        y in -500.0f64..500.0,
    ) {
        let rot = Rotation3::from_axis_angle(&Vector3::z_axis(), yaw);
        let m = Translation3::new(tx, ty, tz).to_homogeneous() * rot.to_homogeneous();
        let inv = m.try_inverse().unwrap();

        let p = Point3::new(x, y, -1.7);
        let back = transform_point(&transform_point(&p, &m).unwrap(), &inv).unwrap();
        prop_assert!((back - p).norm() < 1e-6);
    }

    #[test]
    fn box_in_range_projects_twenty_points(
        x in -10.0f64..10.0,
        y in -40.0f64..-10.0,
        w in 0.5f64..4.0,
        h in 0.5f64..4.0,
        rotation in 0.0f64..360.0,
        height in 0.5f64..5.0,
    ) {
        let params = BoxProjectionConfig::default();
        let pts = project_box_3d(
            &[x, y, w, h],
            rotation,
            height,
            &pinhole(),
            &radar_to_camera(),
            &unit_grid(),
            &params,
        )
        .unwrap();
        prop_assert_eq!(pts.len(), 20);
    }

    #[test]
    fn box_behind_camera_is_empty(
        x in -10.0f64..10.0,
        y in 10.0f64..40.0,
        w in 0.5f64..4.0,
        h in 0.5f64..4.0,
        rotation in 0.0f64..360.0,
    ) {
        let params = BoxProjectionConfig::default();
        let pts = project_box_3d(
            &[x, y, w, h],
            rotation,
            1.5,
            &pinhole(),
            &radar_to_camera(),
            &unit_grid(),
            &params,
        )
        .unwrap();
        prop_assert!(pts.is_empty());
    }

    #[test]
    fn zero_rotation_matches_axis_aligned_inset(
        x in -500.0f64..500.0,
        y in -500.0f64..500.0,
        w in 0.5f64..50.0,
        h in 0.5f64..50.0,
    ) {
        let corners = rotated_corners(&[x, y, w, h], 0.0, 0.2).unwrap();
        let (dx, dy) = (0.1 * w, 0.1 * h);
        let expected = [
            (x + dx, y + dy),
            (x + w - dx, y + dy),
            (x + w - dx, y + h - dy),
            (x + dx, y + h - dy),
        ];
        for (c, (ex, ey)) in corners.iter().zip(expected) {
            assert_relative_eq!(c.x, ex, epsilon = 1e-9);
            assert_relative_eq!(c.y, ey, epsilon = 1e-9);
        }

        let full_turn = rotated_corners(&[x, y, w, h], 360.0, 0.2).unwrap();
        for (a, b) in corners.iter().zip(full_turn.iter()) {
            assert_relative_eq!(a.x, b.x, epsilon = 1e-9);
            assert_relative_eq!(a.y, b.y, epsilon = 1e-9);
        }
    }
}

#[test]
fn scenario_offset_resolution() {
    let table = TimestampTable::from_pairs([(1, 0.0), (2, 1.0), (3, 2.0)]).unwrap();
    assert_eq!(table.resolve(0.95, 0.1).unwrap(), 2);
}

#[test]
fn scenario_hand_computed_box() {
    // Box [10, 10, 4, 2] on a unit grid with identity extrinsic, ground 5 m
    // in front of the camera so every vertex has positive depth.
    let params = BoxProjectionConfig {
        ground_z: 5.0,
        max_range: 50.0,
        inset: 0.2,
    };
    let pts = project_box_3d(
        &[10.0, 10.0, 4.0, 2.0],
        0.0,
        1.5,
        &pinhole(),
        &Matrix4::identity(),
        &unit_grid(),
        &params,
    )
    .unwrap();

    assert_eq!(pts.len(), 20);
    // p2 of the inset footprint: ground (13.6, -10.2, 5) -> (322, -154)
    assert_eq!(pts[0], [322, -154]);
    // p5 (first top corner): (10.4, -10.2, 6.5) -> (210, -107)
    assert_eq!(pts[4], [210, -107]);
}

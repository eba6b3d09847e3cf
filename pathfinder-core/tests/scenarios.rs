//! End-to-end planner scenarios over hand-built scene descriptors.
//!
//! Each scenario feeds a literal `SceneUnderstanding` through the planner
//! against a fresh grid and checks the navigation decision. Steering
//! scenarios run a handful of frames so the heading smoother settles.

use pathfinder_core::{
    Discontinuity, NavigationOutput, NavigationPlanner, OccupancyGrid, PathfinderConfig,
    SceneUnderstanding, StepDirection, WorldPoint,
};

const COLUMNS: usize = 12;
const HFOV: f32 = 2.0;
const DT: f32 = 1.0 / 30.0;

fn config() -> PathfinderConfig {
    let mut config = PathfinderConfig::default();
    config.scene.columns = COLUMNS;
    config.scene.walkable_ids = vec![21];
    config
}

fn run_frames(scene: &SceneUnderstanding, frames: usize) -> (NavigationOutput, OccupancyGrid) {
    let config = config();
    let mut grid = OccupancyGrid::new(&config).unwrap();
    let mut planner = NavigationPlanner::new(config.planner.clone());

    let mut output = planner.update(scene, WorldPoint::ZERO, 0.0, DT, &mut grid);
    for _ in 1..frames {
        output = planner.update(scene, WorldPoint::ZERO, 0.0, DT, &mut grid);
    }
    (output, grid)
}

#[test]
fn open_field_walks_straight() {
    let mut scene = SceneUnderstanding::empty(COLUMNS, HFOV);
    scene.traversability = vec![1.0; COLUMNS];
    scene.ground_plane_ratio = 0.8;

    let (output, _) = run_frames(&scene, 1);

    assert!(
        output.suggested_heading.abs() < 0.3,
        "heading {}",
        output.suggested_heading
    );
    assert!(output.clearance > 2.0, "clearance {}", output.clearance);
    assert!(!output.is_path_blocked);
    assert!(output.ground_confidence > 0.8);
    assert_eq!(output.nearest_obstacle_distance, f32::INFINITY);
}

#[test]
fn wall_on_left_steers_right() {
    let mut scene = SceneUnderstanding::empty(COLUMNS, HFOV);
    for c in 0..6 {
        scene.traversability[c] = 0.0;
        scene.obstacle_distance[c] = 3.0; // ~3.3 m after conversion
    }
    for c in 6..12 {
        scene.traversability[c] = 1.0;
        scene.obstacle_distance[c] = f32::INFINITY;
    }

    let (output, _) = run_frames(&scene, 10);

    assert!(
        output.suggested_heading > 0.05,
        "expected rightward, got {}",
        output.suggested_heading
    );
    assert!(!output.is_path_blocked);
}

#[test]
fn narrow_corridor_stays_centered() {
    let mut scene = SceneUnderstanding::empty(COLUMNS, HFOV);
    for c in 0..COLUMNS {
        if (5..=7).contains(&c) {
            scene.traversability[c] = 1.0;
            scene.obstacle_distance[c] = f32::INFINITY;
        } else {
            scene.traversability[c] = 0.0;
            scene.obstacle_distance[c] = 5.0; // ~2 m walls
        }
    }

    let (output, _) = run_frames(&scene, 10);

    assert!(
        output.suggested_heading.abs() < 0.5,
        "heading {}",
        output.suggested_heading
    );
    assert!(!output.is_path_blocked);
}

#[test]
fn discontinuity_ahead_is_reported() {
    let mut scene = SceneUnderstanding::empty(COLUMNS, HFOV);
    scene.traversability = vec![1.0; COLUMNS];
    scene.discontinuities = vec![Discontinuity {
        column: 6,
        bearing: scene.column_bearings[6],
        relative_depth: 5.0,
        magnitude: 0.5,
        direction: StepDirection::DropAway,
    }];

    let (output, _) = run_frames(&scene, 1);

    let ahead = output.discontinuity_ahead.expect("discontinuity reported");
    assert!((ahead.magnitude - 0.5).abs() < 1e-6);
    assert_eq!(ahead.direction, StepDirection::DropAway);
    assert!(
        (ahead.distance - 2.0).abs() < 0.01,
        "distance {}",
        ahead.distance
    );
}

#[test]
fn fully_blocked_scene_blocks_every_ray() {
    let mut scene = SceneUnderstanding::empty(COLUMNS, HFOV);
    for c in 0..COLUMNS {
        scene.traversability[c] = 0.0;
        scene.obstacle_distance[c] = 25.0; // ~0.4 m, inside the safety margin
    }

    let (output, _) = run_frames(&scene, 1);

    assert!(output.is_path_blocked);
    assert_eq!(output.clearance, 0.0);
}

#[test]
fn recenter_snaps_origin_and_keeps_cells() {
    let mut config = PathfinderConfig::default();
    config.grid.grid_size = 20;
    config.grid.cell_size = 0.1;
    let mut grid = OccupancyGrid::new(&config).unwrap();

    // Seed a cell at world (0.5, 0.5) with a detection
    let bearing = WorldPoint::ZERO.bearing_to(&WorldPoint::new(0.5, 0.5));
    let distance = WorldPoint::ZERO.distance(&WorldPoint::new(0.5, 0.5));
    grid.update_from_detection(bearing, distance, 0.05, 1.0);
    assert!(grid
        .cell_at(WorldPoint::new(0.5, 0.5))
        .map(|c| c.state.is_blocking())
        .unwrap_or(false));

    // Half-extent 1 m, margin 0.2: moving to x = 0.9 triggers a recenter
    grid.update_user_pose(WorldPoint::new(0.9, 0.0), 0.0);

    assert!((grid.origin().x - 0.9).abs() < 1e-6);
    let cell = grid
        .cell_at(WorldPoint::new(0.5, 0.5))
        .expect("cell still inside the scrolled window");
    assert!(cell.state.is_blocking());
}

//! Centralized tunables.
//!
//! All thresholds, grid geometry, and decay constants live here. Defaults
//! are the contract: a config file only needs to name the values it
//! changes. Groups map to TOML tables (`[grid]`, `[elevation]`, ...).

use crate::error::{CoreError, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Top-level configuration, one field per tunable group.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct PathfinderConfig {
    #[serde(default)]
    pub grid: GridSettings,
    #[serde(default)]
    pub elevation: ElevationSettings,
    #[serde(default)]
    pub temporal: TemporalSettings,
    #[serde(default)]
    pub processing: ProcessingSettings,
    #[serde(default)]
    pub scene: SceneSettings,
    #[serde(default)]
    pub planner: PlannerSettings,
    #[serde(default)]
    pub stream: StreamSettings,
}

/// Occupancy grid geometry.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct GridSettings {
    /// Cell edge length in meters
    pub cell_size: f32,
    /// Cells per grid side (footprint = grid_size * cell_size square)
    pub grid_size: usize,
    /// Maximum mapping distance in meters
    pub max_distance: f32,
    /// Recenter when the user passes (1 - margin) of the half-extent
    pub recenter_edge_margin: f32,
}

/// Elevation thresholds for surface classification (meters).
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct ElevationSettings {
    pub step_min: f32,
    pub step_max: f32,
    pub curb_min: f32,
    pub dropoff: f32,
    /// Maximum rise/run for a surface to count as a ramp rather than a step
    pub ramp_max_slope: f32,
    /// Expected riser height of a staircase
    pub stair_step_size: f32,
    pub stair_tolerance: f32,
    /// Height range above which a cell is an obstacle
    pub obstacle_height: f32,
    /// Band around the floor estimate accepted as floor evidence
    pub floor_tolerance: f32,
}

/// Temporal confidence model.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct TemporalSettings {
    /// Per-frame decay factor at a 60 Hz reference rate
    pub confidence_decay: f32,
    /// Cells decaying below this are forgotten
    pub min_confidence: u8,
    /// Saturating confidence gain per observation
    pub observation_boost: u8,
    pub max_confidence: u8,
}

/// Frame processing parameters.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct ProcessingSettings {
    /// Exponential smoothing factor for the incoming pose heading
    pub heading_smoothing_alpha: f32,
    /// Floor samples required before the floor estimate updates
    pub min_floor_samples: usize,
    /// Observations required before a cell is considered valid
    pub min_hit_count: u16,
    /// Floor samples farther than this from recorded evidence replace it
    pub elevation_merge_threshold: f32,
}

/// Scene analysis thresholds.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct SceneSettings {
    /// Horizontal bins across the image
    pub columns: usize,
    /// Raw depth values above this are sky, skipped before conversion
    pub sky_depth_threshold: f32,
    /// Absolute gradient floor for a discontinuity candidate
    pub min_abs_gradient: f32,
    /// Candidate gradients must exceed the median by this ratio
    pub gradient_outlier_ratio: f32,
    /// Minimum normalized magnitude for a reported discontinuity
    pub discontinuity_threshold: f32,
    /// Semantic class IDs treated as walkable ground
    pub walkable_ids: Vec<u8>,
}

/// Heading planner parameters.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct PlannerSettings {
    /// Relative-to-metric conversion: meters = depth_scale / (relative + eps)
    pub depth_scale: f32,
    /// Exponential smoothing factor for the suggested heading
    pub smoothing_factor: f32,
    /// Rays with clearance at or below this are rejected (meters)
    pub safety_margin: f32,
    /// Ray march ceiling in meters
    pub max_march: f32,
    /// Candidate rays across the +/-90 degree fan
    pub heading_rays: usize,
    /// Rays across the +/-45 degree forward threat fan
    pub threat_rays: usize,
    /// Score multiplier applied once a ray crosses a step cell
    pub step_penalty: f32,
    /// Columns at or below this traversability cannot host a ray
    pub min_column_traversability: f32,
    /// Traversability above which a column's ray is carved as free space
    pub free_walk_traversability: f32,
    /// Free-space carving starts this far out (meters)
    pub free_walk_start: f32,
    /// Free-space carving ceiling (meters)
    pub free_walk_limit: f32,
    /// Metric depth is clamped to this ceiling (meters)
    pub max_reliable_depth: f32,
}

/// Debug stream settings.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct StreamSettings {
    /// Emit a snapshot every N processed frames
    pub send_every_n_frames: u64,
    /// Cap on surface-change entries reported per snapshot
    pub max_elevation_changes: usize,
    pub tcp_port: u16,
}

impl Default for GridSettings {
    fn default() -> Self {
        Self {
            cell_size: 0.10,
            grid_size: 200,
            max_distance: 10.0,
            recenter_edge_margin: 0.2,
        }
    }
}

impl Default for ElevationSettings {
    fn default() -> Self {
        Self {
            step_min: 0.05,
            step_max: 0.20,
            curb_min: 0.20,
            dropoff: 0.30,
            ramp_max_slope: 0.15,
            stair_step_size: 0.18,
            stair_tolerance: 0.03,
            obstacle_height: 0.25,
            floor_tolerance: 0.20,
        }
    }
}

impl Default for TemporalSettings {
    fn default() -> Self {
        Self {
            confidence_decay: 0.995,
            min_confidence: 20,
            observation_boost: 30,
            max_confidence: 255,
        }
    }
}

impl Default for ProcessingSettings {
    fn default() -> Self {
        Self {
            heading_smoothing_alpha: 0.2,
            min_floor_samples: 10,
            min_hit_count: 3,
            elevation_merge_threshold: 0.5,
        }
    }
}

impl Default for SceneSettings {
    fn default() -> Self {
        Self {
            columns: 36,
            sky_depth_threshold: 0.95,
            min_abs_gradient: 0.3,
            gradient_outlier_ratio: 3.0,
            discontinuity_threshold: 0.08,
            walkable_ids: default_walkable_ids(),
        }
    }
}

impl Default for PlannerSettings {
    fn default() -> Self {
        Self {
            depth_scale: 10.0,
            smoothing_factor: 0.3,
            safety_margin: 0.5,
            max_march: 10.0,
            heading_rays: 36,
            threat_rays: 18,
            step_penalty: 0.7,
            min_column_traversability: 0.2,
            free_walk_traversability: 0.7,
            free_walk_start: 0.5,
            free_walk_limit: 5.0,
            max_reliable_depth: 30.0,
        }
    }
}

impl Default for StreamSettings {
    fn default() -> Self {
        Self {
            send_every_n_frames: 3,
            max_elevation_changes: 10,
            tcp_port: 8765,
        }
    }
}

/// COCO panoptic "stuff" classes treated as walkable ground by default.
fn default_walkable_ids() -> Vec<u8> {
    vec![
        101, // carpet
        111, // dirt
        114, // floor-marble
        115, // floor-other
        116, // floor-stone
        117, // floor-tile
        118, // floor-wood
        124, // grass
        125, // gravel
        126, // ground-other
        131, // mat
        136, // mud
        140, // pavement
        144, // platform
        145, // playingfield
        147, // railroad
        149, // road
        152, // rug
        154, // sand
        161, // stairs
    ]
}

impl SceneSettings {
    /// Walkable IDs as a set for per-pixel membership tests.
    pub fn walkable_set(&self) -> HashSet<u8> {
        self.walkable_ids.iter().copied().collect()
    }
}

impl PathfinderConfig {
    /// Validate geometry and thresholds. Called once at startup;
    /// a failure here is fatal.
    pub fn validate(&self) -> Result<()> {
        if self.grid.grid_size == 0 {
            return Err(CoreError::InvalidConfig("grid_size must be non-zero".into()));
        }
        if !self.grid.cell_size.is_finite() || self.grid.cell_size <= 0.0 {
            return Err(CoreError::InvalidConfig(format!(
                "cell_size must be a positive finite value, got {}",
                self.grid.cell_size
            )));
        }
        if !self.grid.max_distance.is_finite() || self.grid.max_distance <= 0.0 {
            return Err(CoreError::InvalidConfig(format!(
                "max_distance must be a positive finite value, got {}",
                self.grid.max_distance
            )));
        }
        if !(0.0..1.0).contains(&self.grid.recenter_edge_margin) {
            return Err(CoreError::InvalidConfig(format!(
                "recenter_edge_margin must be in [0, 1), got {}",
                self.grid.recenter_edge_margin
            )));
        }
        if !(0.0..=1.0).contains(&self.temporal.confidence_decay)
            || !self.temporal.confidence_decay.is_finite()
        {
            return Err(CoreError::InvalidConfig(format!(
                "confidence_decay must be in [0, 1], got {}",
                self.temporal.confidence_decay
            )));
        }
        if self.scene.columns == 0 {
            return Err(CoreError::InvalidConfig("scene columns must be non-zero".into()));
        }
        if self.planner.heading_rays < 2 || self.planner.threat_rays < 2 {
            return Err(CoreError::InvalidConfig(
                "ray fans need at least two rays".into(),
            ));
        }
        for (name, value) in [
            ("depth_scale", self.planner.depth_scale),
            ("safety_margin", self.planner.safety_margin),
            ("max_march", self.planner.max_march),
            ("obstacle_height", self.elevation.obstacle_height),
        ] {
            if !value.is_finite() || value <= 0.0 {
                return Err(CoreError::InvalidConfig(format!(
                    "{} must be a positive finite value, got {}",
                    name, value
                )));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        PathfinderConfig::default().validate().unwrap();
    }

    #[test]
    fn test_zero_grid_rejected() {
        let mut config = PathfinderConfig::default();
        config.grid.grid_size = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_non_finite_threshold_rejected() {
        let mut config = PathfinderConfig::default();
        config.planner.depth_scale = f32::NAN;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_default_walkable_set() {
        let set = SceneSettings::default().walkable_set();
        assert!(set.contains(&149)); // road
        assert!(set.contains(&118)); // floor-wood
        assert!(!set.contains(&0));
        assert_eq!(set.len(), 20);
    }
}

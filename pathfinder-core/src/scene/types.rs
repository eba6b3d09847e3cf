//! Column-wise scene descriptor produced once per frame.

use serde::{Deserialize, Serialize};

/// Direction of a vertical step in the walkable surface.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum StepDirection {
    /// Surface rises toward the user's eye line (step up, curb up)
    RiseUp,
    /// Surface falls away (step down, curb edge, drop-off)
    DropAway,
}

/// A localized vertical step in a column's walkable depth profile.
#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
pub struct Discontinuity {
    /// Column index the step was found in
    pub column: usize,
    /// Bearing of that column from the image center, radians
    pub bearing: f32,
    /// Raw depth at the step location
    pub relative_depth: f32,
    /// Step magnitude normalized by the column's strongest gradient, [0, 1]
    pub magnitude: f32,
    pub direction: StepDirection,
}

/// Per-frame scene descriptor: the image reduced to `columns` vertical
/// slabs plus a handful of whole-image aggregates.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SceneUnderstanding {
    /// Number of horizontal bins across the image
    pub columns: usize,
    /// Bearing of each column from the image center, radians.
    /// Column c maps to `(c / columns - 0.5) * hfov`.
    pub column_bearings: Vec<f32>,
    /// Fraction of walkable pixels per column, [0, 1]
    pub traversability: Vec<f32>,
    /// Raw depth of the first non-walkable, non-sky pixel per column,
    /// scanning bottom to top; +inf when none
    pub obstacle_distance: Vec<f32>,
    /// Detected surface steps, at most one per column
    pub discontinuities: Vec<Discontinuity>,
    /// Walkable / non-sky pixel ratio over the whole image, [0, 1]
    pub ground_plane_ratio: f32,
}

impl SceneUnderstanding {
    /// A descriptor with computed bearings and zeroed/absent evidence.
    ///
    /// This is both the starting point for analysis and the value
    /// returned for degenerate inputs.
    pub fn empty(columns: usize, camera_hfov: f32) -> Self {
        let column_bearings = (0..columns)
            .map(|c| (c as f32 / columns as f32 - 0.5) * camera_hfov)
            .collect();
        Self {
            columns,
            column_bearings,
            traversability: vec![0.0; columns],
            obstacle_distance: vec![f32::INFINITY; columns],
            discontinuities: Vec::new(),
            ground_plane_ratio: 0.0,
        }
    }

    /// Mean traversability across all columns; 0 when there are none.
    pub fn mean_traversability(&self) -> f32 {
        if self.traversability.is_empty() {
            return 0.0;
        }
        self.traversability.iter().sum::<f32>() / self.traversability.len() as f32
    }

    /// Angular width of one column, derived from the bearing table.
    #[inline]
    pub fn column_spacing(&self) -> f32 {
        if self.column_bearings.len() >= 2 {
            self.column_bearings[1] - self.column_bearings[0]
        } else {
            0.0
        }
    }

    /// Column whose angular slab contains `bearing`, clamped to the fan.
    pub fn column_for_bearing(&self, bearing: f32) -> usize {
        let spacing = self.column_spacing();
        if spacing <= 0.0 || self.columns == 0 {
            return 0;
        }
        let idx = ((bearing - self.column_bearings[0]) / spacing).floor();
        (idx.max(0.0) as usize).min(self.columns - 1)
    }
}

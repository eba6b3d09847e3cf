//! Scene analysis: paired depth + segmentation frames reduced to a
//! column-wise descriptor.
//!
//! The analyzer is stateless; it owns only thresholds. Depth and
//! segmentation grids may differ in resolution - mapping between them is
//! nearest-neighbor via integer scaling. Traversability is counted over
//! whole columns rather than below an assumed horizon, because a
//! chest-mounted camera has arbitrary pitch.

use crate::config::SceneSettings;
use crate::depth::{DepthMap, SegmentationMap};
use crate::scene::types::{Discontinuity, SceneUnderstanding, StepDirection};
use std::collections::HashSet;

/// Reduces a depth + segmentation pair into a [`SceneUnderstanding`].
#[derive(Clone, Debug)]
pub struct SceneAnalyzer {
    settings: SceneSettings,
    walkable: HashSet<u8>,
}

impl SceneAnalyzer {
    pub fn new(settings: SceneSettings) -> Self {
        let walkable = settings.walkable_set();
        Self { settings, walkable }
    }

    #[inline]
    pub fn settings(&self) -> &SceneSettings {
        &self.settings
    }

    /// Analyze one frame. Never fails: degenerate inputs produce a
    /// descriptor with zeroed traversability and +inf obstacle distances.
    pub fn analyze(
        &self,
        depth: &DepthMap,
        seg: &SegmentationMap,
        camera_hfov: f32,
    ) -> SceneUnderstanding {
        let columns = self.settings.columns;
        let mut scene = SceneUnderstanding::empty(columns, camera_hfov);
        if columns == 0 {
            return scene;
        }

        for c in 0..columns {
            scene.traversability[c] = self.column_traversability(seg, c);
            let x = self.column_center_x(depth.width(), c);
            scene.obstacle_distance[c] = self.first_obstacle_depth(depth, seg, x);
            if let Some(disc) = self.detect_discontinuity(depth, seg, x, c, &scene.column_bearings)
            {
                scene.discontinuities.push(disc);
            }
        }

        scene.ground_plane_ratio = self.ground_plane_ratio(depth, seg);
        scene
    }

    /// Fraction of walkable pixels in column `c`'s slab of the
    /// segmentation grid, counted over all rows.
    fn column_traversability(&self, seg: &SegmentationMap, c: usize) -> f32 {
        let columns = self.settings.columns;
        let x_start = c * seg.width() / columns;
        let x_end = ((c + 1) * seg.width() / columns).min(seg.width());
        if x_start >= x_end {
            return 0.0;
        }

        let labels = seg.labels();
        let mut walkable = 0usize;
        let mut total = 0usize;
        for y in 0..seg.height() {
            let row = y * seg.width();
            for x in x_start..x_end {
                total += 1;
                if self.walkable.contains(&labels[row + x]) {
                    walkable += 1;
                }
            }
        }

        if total == 0 {
            0.0
        } else {
            walkable as f32 / total as f32
        }
    }

    /// Depth-space X at the middle of column `c`.
    #[inline]
    fn column_center_x(&self, depth_width: usize, c: usize) -> usize {
        let x = (2 * c + 1) * depth_width / (2 * self.settings.columns);
        x.min(depth_width.saturating_sub(1))
    }

    /// Raw depth of the first non-walkable, non-sky pixel scanning the
    /// column bottom to top. +inf when the whole column is clear.
    fn first_obstacle_depth(&self, depth: &DepthMap, seg: &SegmentationMap, x: usize) -> f32 {
        let sky = self.settings.sky_depth_threshold;
        for y in (0..depth.height()).rev() {
            let d = depth.depth_at_pixel(x, y);
            if !d.is_finite() || d > sky {
                continue;
            }
            let sx = x * seg.width() / depth.width();
            let sy = y * seg.height() / depth.height();
            match seg.label_at(sx, sy) {
                Some(label) if self.walkable.contains(&label) => {}
                _ => return d,
            }
        }
        f32::INFINITY
    }

    /// Find the strongest vertical step in the column's walkable depth
    /// profile. The profile runs bottom to top, so ties resolve to the
    /// step nearest the user.
    fn detect_discontinuity(
        &self,
        depth: &DepthMap,
        seg: &SegmentationMap,
        x: usize,
        column: usize,
        bearings: &[f32],
    ) -> Option<Discontinuity> {
        let sky = self.settings.sky_depth_threshold;
        let mut profile = Vec::with_capacity(depth.height());
        for y in (0..depth.height()).rev() {
            let d = depth.depth_at_pixel(x, y);
            if !d.is_finite() || d > sky {
                continue;
            }
            let sx = x * seg.width() / depth.width();
            let sy = y * seg.height() / depth.height();
            if let Some(label) = seg.label_at(sx, sy) {
                if self.walkable.contains(&label) {
                    profile.push(d);
                }
            }
        }
        if profile.len() < 2 {
            return None;
        }

        let gradients: Vec<f32> = profile.windows(2).map(|w| w[1] - w[0]).collect();
        let max_abs = gradients.iter().map(|g| g.abs()).fold(0.0f32, f32::max);
        if max_abs <= 0.0 {
            return None;
        }

        let mut abs_sorted: Vec<f32> = gradients.iter().map(|g| g.abs()).collect();
        abs_sorted.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
        let median_abs = abs_sorted[abs_sorted.len() / 2];

        let mut best: Option<(usize, f32)> = None;
        for (i, &g) in gradients.iter().enumerate() {
            let abs = g.abs();
            if abs < self.settings.min_abs_gradient {
                continue;
            }
            // Outlier test: a real step towers over the smooth slope of a
            // receding floor. Skipped when the column has no slope at all.
            if median_abs > 0.0 && abs / median_abs <= self.settings.gradient_outlier_ratio {
                continue;
            }
            let normalized = abs / max_abs;
            match best {
                Some((_, best_norm)) if normalized <= best_norm => {}
                _ => best = Some((i, normalized)),
            }
        }

        let (idx, magnitude) = best?;
        if magnitude < self.settings.discontinuity_threshold {
            return None;
        }

        let direction = if gradients[idx] > 0.0 {
            StepDirection::DropAway
        } else {
            StepDirection::RiseUp
        };

        Some(Discontinuity {
            column,
            bearing: bearings.get(column).copied().unwrap_or(0.0),
            relative_depth: profile[idx],
            magnitude,
            direction,
        })
    }

    /// Walkable / non-sky pixel ratio over the full image.
    fn ground_plane_ratio(&self, depth: &DepthMap, seg: &SegmentationMap) -> f32 {
        let sky = self.settings.sky_depth_threshold;
        let labels = seg.labels();
        let mut non_sky = 0usize;
        let mut walkable = 0usize;

        for y in 0..seg.height() {
            let dy = y * depth.height() / seg.height();
            let row = y * seg.width();
            for x in 0..seg.width() {
                let dx = x * depth.width() / seg.width();
                let d = depth.depth_at_pixel(dx, dy);
                if d.is_finite() && d > sky {
                    continue;
                }
                non_sky += 1;
                if self.walkable.contains(&labels[row + x]) {
                    walkable += 1;
                }
            }
        }

        if non_sky == 0 {
            0.0
        } else {
            walkable as f32 / non_sky as f32
        }
    }
}

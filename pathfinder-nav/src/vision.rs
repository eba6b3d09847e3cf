//! Vision model runner contracts and the synthetic runners used when no
//! hardware backend is attached.
//!
//! Real depth and segmentation backends live outside this binary; they
//! plug in through the two capability traits below. The synthetic
//! runners generate a deterministic indoor-like frame so the whole
//! pipeline can run, stream, and be tested end to end on any machine.

use crate::error::{NavError, Result};
use pathfinder_core::{DepthMap, SegmentationMap};
use std::path::Path;

/// A color frame as delivered by the camera source. Pixel payload is
/// opaque to the driver; only the models look inside.
#[derive(Clone, Debug)]
pub struct ColorFrame {
    pub width: usize,
    pub height: usize,
    pub data: Vec<u8>,
}

impl ColorFrame {
    pub fn new(width: usize, height: usize, data: Vec<u8>) -> Self {
        Self {
            width,
            height,
            data,
        }
    }
}

/// Monocular depth runner: frame in, relative-depth field out.
pub trait DepthModel: Send {
    fn run_depth(&mut self, frame: &ColorFrame) -> Result<DepthMap>;
}

/// Semantic segmentation runner: frame in, class-label field out.
pub trait SegModel: Send {
    fn run_seg(&mut self, frame: &ColorFrame) -> Result<SegmentationMap>;
}

/// The pair of runners the vision stage drives per frame.
pub struct ModelBundle {
    pub depth: Box<dyn DepthModel>,
    pub seg: Box<dyn SegModel>,
}

impl ModelBundle {
    /// Load runners. Without a model directory the synthetic runners are
    /// used; with one, the directory must exist and carry compiled
    /// backends, which this build does not embed.
    pub fn load(model_dir: Option<&Path>) -> Result<Self> {
        match model_dir {
            None => Ok(Self::synthetic()),
            Some(dir) if !dir.is_dir() => Err(NavError::ModelLoad(format!(
                "model directory {:?} does not exist",
                dir
            ))),
            Some(dir) => Err(NavError::ModelLoad(format!(
                "no supported model backend in {:?}; attach runners via the DepthModel/SegModel traits",
                dir
            ))),
        }
    }

    pub fn synthetic() -> Self {
        Self {
            depth: Box::new(SyntheticDepthModel::default()),
            seg: Box::new(SyntheticSegModel::default()),
        }
    }
}

/// Deterministic relative-depth generator: near ground at the bottom of
/// the frame receding to sky at the top, in raw model units where larger
/// values are closer.
pub struct SyntheticDepthModel {
    /// Output resolution (model native, independent of the frame)
    pub width: usize,
    pub height: usize,
}

impl Default for SyntheticDepthModel {
    fn default() -> Self {
        Self {
            width: 128,
            height: 96,
        }
    }
}

impl DepthModel for SyntheticDepthModel {
    fn run_depth(&mut self, _frame: &ColorFrame) -> Result<DepthMap> {
        let mut data = Vec::with_capacity(self.width * self.height);
        let sky_rows = self.height / 8;
        for y in 0..self.height {
            let raw = if y < sky_rows {
                0.98 // sky band, above the sky threshold
            } else {
                // Ground plane: raw depth falls off toward the horizon
                let t = (y - sky_rows) as f32 / (self.height - sky_rows) as f32;
                0.15 + 0.75 * t
            };
            data.extend(std::iter::repeat(raw).take(self.width));
        }
        DepthMap::new(self.width, self.height, data).map_err(NavError::from)
    }
}

/// Deterministic segmentation: pavement below the horizon, a wall band
/// above it.
pub struct SyntheticSegModel {
    pub width: usize,
    pub height: usize,
    /// Label used for the ground region (COCO pavement)
    pub ground_label: u8,
    /// Label used for everything above the horizon
    pub backdrop_label: u8,
}

impl Default for SyntheticSegModel {
    fn default() -> Self {
        Self {
            width: 128,
            height: 96,
            ground_label: 140,
            backdrop_label: 187,
        }
    }
}

impl SegModel for SyntheticSegModel {
    fn run_seg(&mut self, _frame: &ColorFrame) -> Result<SegmentationMap> {
        let horizon = self.height / 4;
        let mut labels = Vec::with_capacity(self.width * self.height);
        for y in 0..self.height {
            let label = if y < horizon {
                self.backdrop_label
            } else {
                self.ground_label
            };
            labels.extend(std::iter::repeat(label).take(self.width));
        }
        SegmentationMap::new(self.width, self.height, labels).map_err(NavError::from)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frame() -> ColorFrame {
        ColorFrame::new(64, 48, vec![0; 64 * 48 * 4])
    }

    #[test]
    fn test_synthetic_depth_shape_and_range() {
        let mut model = SyntheticDepthModel::default();
        let depth = model.run_depth(&frame()).unwrap();
        assert_eq!(depth.width(), 128);
        assert_eq!(depth.height(), 96);
        // Bottom of the frame is nearer (larger raw value) than mid-frame
        assert!(depth.depth_at_pixel(64, 95) > depth.depth_at_pixel(64, 48));
        // Top rows are sky
        assert!(depth.depth_at_pixel(0, 0) > 0.95);
    }

    #[test]
    fn test_synthetic_seg_has_walkable_ground() {
        let mut model = SyntheticSegModel::default();
        let seg = model.run_seg(&frame()).unwrap();
        assert_eq!(seg.label_at(10, 90), Some(140));
        assert_eq!(seg.label_at(10, 5), Some(187));
    }

    #[test]
    fn test_bundle_load_paths() {
        assert!(ModelBundle::load(None).is_ok());
        let missing = Path::new("/nonexistent/models");
        match ModelBundle::load(Some(missing)) {
            Err(NavError::ModelLoad(_)) => {}
            other => panic!("expected ModelLoad error, got {:?}", other.map(|_| ())),
        }
    }
}

//! Compact grid snapshots for the debug stream.
//!
//! Storage stays world-aligned; only this export path rotates into the
//! heading-aligned frame so a viewer sees the grid from the user's
//! perspective. Output cells are enumerated row-major (z outer, x inner)
//! over local coordinates, each local point rotated by the user heading
//! into world space before the lookup. Out-of-grid output cells encode
//! `(0, 0)`.

use super::cell::CellState;
use super::OccupancyGrid;
use crate::core::WorldPoint;
use crate::error::{CoreError, Result};

impl OccupancyGrid {
    /// State byte and centimeter elevation for one heading-aligned
    /// output cell.
    fn output_cell(&self, ix: usize, iz: usize) -> (u8, i8) {
        let half = self.grid_size() as f32 / 2.0;
        let cs = self.cell_size();
        let lx = (ix as f32 - half + 0.5) * cs;
        let lz = (iz as f32 - half + 0.5) * cs;

        let (sin_h, cos_h) = self.user_heading().sin_cos();
        let origin = self.origin();
        let world = WorldPoint::new(
            origin.x + lx * cos_h + lz * sin_h,
            origin.z - lx * sin_h + lz * cos_h,
        );

        match self.cell_at(world) {
            Some(cell) => {
                let elevation_cm = (cell.elevation * 100.0).round().clamp(-127.0, 127.0) as i8;
                (cell.state as u8, elevation_cm)
            }
            None => (0, 0),
        }
    }

    /// Heading-aligned cell planes for the JSON stream payload.
    pub fn export_cells(&self) -> (Vec<u8>, Vec<i8>) {
        let n = self.grid_size();
        let mut states = Vec::with_capacity(n * n);
        let mut elevations = Vec::with_capacity(n * n);
        for iz in 0..n {
            for ix in 0..n {
                let (state, elevation) = self.output_cell(ix, iz);
                states.push(state);
                elevations.push(elevation);
            }
        }
        (states, elevations)
    }

    /// Binary snapshot: `grid_size^2` pairs of `(state, elevation_cm)`.
    pub fn to_compact_bytes(&self) -> Vec<u8> {
        let n = self.grid_size();
        let mut bytes = Vec::with_capacity(n * n * 2);
        for iz in 0..n {
            for ix in 0..n {
                let (state, elevation) = self.output_cell(ix, iz);
                bytes.push(state);
                bytes.push(elevation as u8);
            }
        }
        bytes
    }
}

/// Decode a compact snapshot into `(state, elevation_m)` pairs in output
/// order. The byte count must be an even square of pairs.
pub fn decode_compact(bytes: &[u8]) -> Result<Vec<(CellState, f32)>> {
    if bytes.len() % 2 != 0 {
        return Err(CoreError::Snapshot(format!(
            "odd byte count {}",
            bytes.len()
        )));
    }
    let pairs = bytes.len() / 2;
    let side = (pairs as f64).sqrt() as usize;
    if side * side != pairs {
        return Err(CoreError::Snapshot(format!(
            "{} cells is not a square grid",
            pairs
        )));
    }

    Ok(bytes
        .chunks_exact(2)
        .map(|pair| {
            let state = CellState::from_u8(pair[0]);
            let elevation = (pair[1] as i8) as f32 / 100.0;
            (state, elevation)
        })
        .collect())
}

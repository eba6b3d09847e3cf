//! # Pathfinder Core
//!
//! Perception -> world model -> planning pipeline for a wearable,
//! monocular navigation aid. Per frame, a depth map and a semantic
//! segmentation map are reduced to a column-wise scene descriptor, fused
//! into a persistent top-down occupancy grid, and turned into a heading
//! suggestion with hazard callouts.
//!
//! ## Architecture
//!
//! ```text
//!  depth + segmentation          SceneAnalyzer
//!  (model runners)      ────────  [scene]       ──┐
//!                                                 ▼
//!                                          SceneUnderstanding
//!                                                 │
//!                                                 ▼
//!                       NavigationPlanner [planner] ──── NavigationOutput
//!                                 │  ▲
//!                        project  │  │ ray-march
//!                                 ▼  │
//!                          OccupancyGrid [grid]
//!                        (decay, recenter, classify)
//! ```
//!
//! The grid is world-aligned; the user's heading is applied only on the
//! snapshot export path. All per-frame values move by value; the grid has
//! a single mutator (the planner, driven by the pipeline thread).
//!
//! ## Coordinate frame
//!
//! Ground plane only: X to the user's right at zero heading, Z forward.
//! Bearings are measured about the vertical axis, 0 = forward, positive
//! to the right.
//!
//! ## Modules
//!
//! - [`core`]: points, cell coordinates, angle math
//! - [`config`]: centralized tunables; defaults are the contract
//! - [`depth`]: immutable depth and segmentation fields
//! - [`scene`]: column descriptor types and the analyzer
//! - [`grid`]: the occupancy grid world model
//! - [`planner`]: heading search and the navigation decision

pub mod config;
pub mod core;
pub mod depth;
pub mod error;
pub mod grid;
pub mod planner;
pub mod scene;

pub use crate::config::PathfinderConfig;
pub use crate::core::{GridCoord, WorldPoint};
pub use crate::depth::{DepthMap, PixelRect, SegmentationMap};
pub use crate::error::{CoreError, Result};
pub use crate::grid::{CellState, GridCell, GridStats, OccupancyGrid, RayMarch};
pub use crate::planner::{DiscontinuityAhead, NavigationOutput, NavigationPlanner};
pub use crate::scene::{Discontinuity, SceneAnalyzer, SceneUnderstanding, StepDirection};

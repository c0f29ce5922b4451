//! Region handling for Poi-Sweep
//!
//! This module provides:
//! - `BoundingBox` and `GridCell`, the spatial units of a crawl
//! - `partition`, which splits a region into a row-major grid of query cells
//! - `DistrictClient`, which resolves a region name to its bounding box

mod grid;
mod lookup;

pub use grid::{partition, BoundingBox, GridCell};
pub use lookup::{parse_polyline, DistrictClient};

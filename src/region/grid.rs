//! Bounding boxes and their partition into a query grid

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::SweepError;

/// Rectangular extent of a region, in the vendor's coordinate system
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    #[serde(rename = "min-lng")]
    pub min_lng: f64,

    #[serde(rename = "max-lng")]
    pub max_lng: f64,

    #[serde(rename = "min-lat")]
    pub min_lat: f64,

    #[serde(rename = "max-lat")]
    pub max_lat: f64,
}

impl BoundingBox {
    pub fn new(min_lng: f64, max_lng: f64, min_lat: f64, max_lat: f64) -> Self {
        Self {
            min_lng,
            max_lng,
            min_lat,
            max_lat,
        }
    }

    /// Smallest box containing every point, or `None` for an empty input
    pub fn enclosing<I>(points: I) -> Option<Self>
    where
        I: IntoIterator<Item = (f64, f64)>,
    {
        points.into_iter().fold(None, |acc, (lng, lat)| {
            Some(match acc {
                None => Self::new(lng, lng, lat, lat),
                Some(b) => Self::new(
                    b.min_lng.min(lng),
                    b.max_lng.max(lng),
                    b.min_lat.min(lat),
                    b.max_lat.max(lat),
                ),
            })
        })
    }

    /// Returns true if min <= max on both axes and every bound is finite
    pub fn is_valid(&self) -> bool {
        [self.min_lng, self.max_lng, self.min_lat, self.max_lat]
            .iter()
            .all(|v| v.is_finite())
            && self.min_lng <= self.max_lng
            && self.min_lat <= self.max_lat
    }

    pub fn width(&self) -> f64 {
        self.max_lng - self.min_lng
    }

    pub fn height(&self) -> f64 {
        self.max_lat - self.min_lat
    }
}

/// One sub-rectangle of a bounding box, given by its upper-left and lower-right corners
///
/// Cells are generated once per crawl and never mutated. The rendered form
/// (`"left,top|right,bottom"`) is sent verbatim as the search polygon.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GridCell {
    pub left: f64,
    pub top: f64,
    pub right: f64,
    pub bottom: f64,
}

impl GridCell {
    /// Query parameter form; the API accepts at most six decimals
    pub fn to_polygon(&self) -> String {
        format!(
            "{:.6},{:.6}|{:.6},{:.6}",
            self.left, self.top, self.right, self.bottom
        )
    }

    pub fn bounds(&self) -> BoundingBox {
        BoundingBox::new(self.left, self.right, self.bottom, self.top)
    }
}

impl fmt::Display for GridCell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_polygon())
    }
}

/// Splits a bounding box into `rows x cols` cells in row-major order
///
/// Row 0 is the southernmost row; within a row, column 0 is the westernmost
/// cell. Neighbouring cells share their edges exactly, and the outermost
/// edges coincide with the box.
///
/// # Errors
///
/// `SweepError::InvalidGrid` if `rows` or `cols` is zero or the box is invalid.
pub fn partition(bbox: &BoundingBox, rows: u32, cols: u32) -> Result<Vec<GridCell>, SweepError> {
    if rows == 0 || cols == 0 {
        return Err(SweepError::InvalidGrid(format!(
            "grid must have at least one row and column, got {}x{}",
            rows, cols
        )));
    }
    if !bbox.is_valid() {
        return Err(SweepError::InvalidGrid(format!(
            "bounding box is not valid: {:?}",
            bbox
        )));
    }

    let lng_step = bbox.width() / cols as f64;
    let lat_step = bbox.height() / rows as f64;

    let lng_at = |c: u32| {
        if c == cols {
            bbox.max_lng
        } else {
            bbox.min_lng + lng_step * c as f64
        }
    };
    let lat_at = |r: u32| {
        if r == rows {
            bbox.max_lat
        } else {
            bbox.min_lat + lat_step * r as f64
        }
    };

    let mut cells = Vec::with_capacity(rows as usize * cols as usize);
    for r in 0..rows {
        for c in 0..cols {
            cells.push(GridCell {
                left: lng_at(c),
                top: lat_at(r + 1),
                right: lng_at(c + 1),
                bottom: lat_at(r),
            });
        }
    }

    Ok(cells)
}

//! Record buffer: columnar storage of records awaiting a flush
//!
//! Every retained attribute is one column of strings and the point
//! geometries form a parallel column, so all columns always have the same
//! length (one slot per record).

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// A decoded record as returned by the search API
pub type RawRecord = Map<String, Value>;

/// Point geometry, longitude first
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub lng: f64,
    pub lat: f64,
}

impl Point {
    pub fn new(lng: f64, lat: f64) -> Self {
        Self { lng, lat }
    }

    /// Parses a `"lng,lat"` location string
    pub fn parse(location: &str) -> Option<Self> {
        let (lng, lat) = location.split_once(',')?;
        let lng: f64 = lng.trim().parse().ok()?;
        let lat: f64 = lat.trim().parse().ok()?;
        if !lng.is_finite() || !lat.is_finite() {
            return None;
        }
        Some(Self { lng, lat })
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RecordBuffer {
    fields: Vec<String>,
    columns: Vec<Vec<String>>,
    geometry: Vec<Option<Point>>,
}

impl RecordBuffer {
    /// Creates an empty buffer retaining the given attributes
    pub fn new(fields: &[String]) -> Self {
        Self {
            fields: fields.to_vec(),
            columns: vec![Vec::new(); fields.len()],
            geometry: Vec::new(),
        }
    }

    pub fn fields(&self) -> &[String] {
        &self.fields
    }

    pub fn len(&self) -> usize {
        self.geometry.len()
    }

    pub fn is_empty(&self) -> bool {
        self.geometry.is_empty()
    }

    /// Appends one record
    ///
    /// Returns false if the record has no usable `location`; it is still
    /// buffered, with an empty geometry.
    pub fn push(&mut self, record: &RawRecord) -> bool {
        for (field, column) in self.fields.iter().zip(self.columns.iter_mut()) {
            column.push(attribute_text(record.get(field)));
        }

        let point = record
            .get("location")
            .and_then(Value::as_str)
            .and_then(Point::parse);
        self.geometry.push(point);
        point.is_some()
    }

    /// Attribute values of record `index`, in field order
    pub fn row(&self, index: usize) -> Vec<&str> {
        self.columns
            .iter()
            .map(|column| column[index].as_str())
            .collect()
    }

    pub fn geometry(&self) -> &[Option<Point>] {
        &self.geometry
    }

    /// Copy of the first `n` records
    pub fn head(&self, n: usize) -> RecordBuffer {
        let n = n.min(self.len());
        RecordBuffer {
            fields: self.fields.clone(),
            columns: self.columns.iter().map(|c| c[..n].to_vec()).collect(),
            geometry: self.geometry[..n].to_vec(),
        }
    }

    /// Drops the first `n` records
    pub fn discard_head(&mut self, n: usize) {
        let n = n.min(self.len());
        for column in &mut self.columns {
            column.drain(..n);
        }
        self.geometry.drain(..n);
    }
}

/// Text form of an attribute value
///
/// The API encodes absent values as `[]`, so empty arrays and nulls both
/// become the empty string.
fn attribute_text(value: Option<&Value>) -> String {
    match value {
        None | Some(Value::Null) => String::new(),
        Some(Value::String(s)) => s.clone(),
        Some(Value::Array(items)) if items.is_empty() => String::new(),
        Some(Value::Number(n)) => n.to_string(),
        Some(Value::Bool(b)) => b.to_string(),
        Some(other) => other.to_string(),
    }
}

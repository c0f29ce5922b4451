//! GeoJSON batch writer
//!
//! Each flush becomes one `FeatureCollection` file named
//! `<counter>_<region>_<cell>.geojson`.

use serde_json::{json, Map, Value};
use std::path::{Path, PathBuf};

use crate::output::traits::{BatchId, OutputResult, RecordSink};
use crate::output::write_atomic;
use crate::state::{Point, RecordBuffer};

/// Sink writing one GeoJSON file per batch into a directory
pub struct GeoJsonSink {
    directory: PathBuf,
    region: String,
}

impl GeoJsonSink {
    pub fn new(directory: impl Into<PathBuf>, region: &str) -> Self {
        Self {
            directory: directory.into(),
            region: file_safe(region),
        }
    }

    pub fn directory(&self) -> &Path {
        &self.directory
    }

    /// File name of a batch
    pub fn file_name(&self, id: BatchId) -> String {
        format!("{}_{}_{}.geojson", id.file_number, self.region, id.cell_index)
    }
}

impl RecordSink for GeoJsonSink {
    fn write_batch(&mut self, batch: &RecordBuffer, id: BatchId) -> OutputResult<String> {
        let name = self.file_name(id);
        let path = self.directory.join(&name);

        let collection = feature_collection(batch);
        let bytes = serde_json::to_vec(&collection)?;
        write_atomic(&path, &bytes)?;

        tracing::info!("Wrote {} records to {}", batch.len(), path.display());
        Ok(name)
    }
}

/// Builds a GeoJSON `FeatureCollection` from a batch
pub fn feature_collection(batch: &RecordBuffer) -> Value {
    let features: Vec<Value> = (0..batch.len())
        .map(|i| {
            let mut properties = Map::new();
            for (field, value) in batch.fields().iter().zip(batch.row(i)) {
                properties.insert(field.clone(), Value::String(value.to_string()));
            }
            json!({
                "type": "Feature",
                "properties": properties,
                "geometry": point_geometry(batch.geometry()[i]),
            })
        })
        .collect();

    json!({
        "type": "FeatureCollection",
        "features": features,
    })
}

fn point_geometry(point: Option<Point>) -> Value {
    match point {
        Some(p) => json!({ "type": "Point", "coordinates": [p.lng, p.lat] }),
        None => Value::Null,
    }
}

fn file_safe(name: &str) -> String {
    name.chars()
        .map(|c| match c {
            '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' => '_',
            c if c.is_control() => '_',
            c => c,
        })
        .collect()
}

//! Batch operations over a crawl's output directory

use serde_json::{json, Value};
use std::fs;
use std::path::{Path, PathBuf};

use crate::output::{write_atomic, OutputError, OutputResult};
use crate::postprocess::gcj02::gcj02_to_wgs84;

const GEOJSON_EXT: &str = "geojson";

/// Outcome of [`convert_directory`]
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConversionReport {
    /// GeoJSON files converted
    pub converted: usize,

    /// Other files copied unchanged
    pub copied: usize,

    /// GeoJSON files that could not be read or converted
    pub failed: Vec<PathBuf>,
}

fn is_geojson(path: &Path) -> bool {
    path.extension().and_then(|e| e.to_str()) == Some(GEOJSON_EXT)
}

fn is_hidden(path: &Path) -> bool {
    path.file_name()
        .and_then(|n| n.to_str())
        .map_or(false, |n| n.starts_with('.'))
}

/// Sort key following the flush counter: `10_x_0` comes after `2_x_0`
fn flush_order(path: &Path) -> (u64, String) {
    let name = path
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or_default()
        .to_string();
    let counter = name
        .split(|c: char| !c.is_ascii_digit())
        .next()
        .and_then(|digits| digits.parse().ok())
        .unwrap_or(u64::MAX);
    (counter, name)
}

/// Files directly inside `dir` in flush order, temporary files excluded
fn list_files(dir: &Path) -> OutputResult<Vec<PathBuf>> {
    let mut files = Vec::new();
    for entry in fs::read_dir(dir)? {
        let path = entry?.path();
        if path.is_file() && !is_hidden(&path) {
            files.push(path);
        }
    }
    files.sort_by_cached_key(|path| flush_order(path));
    Ok(files)
}

/// Subdirectories of `dir` sorted by name, `skip` excluded
fn list_dirs(dir: &Path, skip: Option<&Path>) -> OutputResult<Vec<PathBuf>> {
    let mut dirs = Vec::new();
    for entry in fs::read_dir(dir)? {
        let path = entry?.path();
        if !path.is_dir() || is_hidden(&path) {
            continue;
        }
        if skip.is_some() && path.canonicalize().ok().as_deref() == skip {
            continue;
        }
        dirs.push(path);
    }
    dirs.sort();
    Ok(dirs)
}

fn read_geojson(path: &Path) -> OutputResult<Value> {
    let text = fs::read_to_string(path)?;
    serde_json::from_str(&text).map_err(|e| OutputError::Format {
        path: path.to_path_buf(),
        message: e.to_string(),
    })
}

/// Applies `f` to every position of a GeoJSON coordinates array, at any nesting
fn map_positions(coordinates: &mut Value, f: &impl Fn(f64, f64) -> (f64, f64)) {
    let Value::Array(items) = coordinates else {
        return;
    };

    let position = match items.as_slice() {
        [Value::Number(x), Value::Number(y), ..] => x.as_f64().zip(y.as_f64()),
        _ => None,
    };

    match position {
        Some((lng, lat)) => {
            let (lng, lat) = f(lng, lat);
            items[0] = json!(lng);
            items[1] = json!(lat);
        }
        None => {
            for item in items.iter_mut() {
                map_positions(item, f);
            }
        }
    }
}

fn convert_geometry(geometry: &mut Value) {
    if let Some(geometries) = geometry.get_mut("geometries").and_then(Value::as_array_mut) {
        for inner in geometries {
            convert_geometry(inner);
        }
    }
    if let Some(coordinates) = geometry.get_mut("coordinates") {
        map_positions(coordinates, &gcj02_to_wgs84);
    }
}

/// Converts every geometry of a GeoJSON document from GCJ-02 to WGS84
pub fn convert_document(document: &mut Value) {
    match document.get("type").and_then(Value::as_str) {
        Some("FeatureCollection") => {
            if let Some(features) = document.get_mut("features").and_then(Value::as_array_mut) {
                for feature in features {
                    if let Some(geometry) = feature.get_mut("geometry") {
                        convert_geometry(geometry);
                    }
                }
            }
        }
        Some("Feature") => {
            if let Some(geometry) = document.get_mut("geometry") {
                convert_geometry(geometry);
            }
        }
        _ => convert_geometry(document),
    }
}

/// Converts the crawl output in `in_dir` to WGS84, writing into `out_dir`
///
/// GeoJSON files are converted point by point; any other file (manifests)
/// is copied unchanged. Subdirectories are mirrored, except `out_dir` itself
/// when it lies inside `in_dir`. A file that fails to convert is logged,
/// recorded in the report and skipped.
pub fn convert_directory(in_dir: &Path, out_dir: &Path) -> OutputResult<ConversionReport> {
    fs::create_dir_all(out_dir)?;
    let out_canonical = out_dir.canonicalize()?;

    let mut report = ConversionReport::default();
    convert_into(in_dir, out_dir, &out_canonical, &mut report)?;
    Ok(report)
}

fn convert_into(
    in_dir: &Path,
    out_dir: &Path,
    skip: &Path,
    report: &mut ConversionReport,
) -> OutputResult<()> {
    fs::create_dir_all(out_dir)?;

    for path in list_dirs(in_dir, Some(skip))? {
        if let Some(name) = path.file_name() {
            convert_into(&path, &out_dir.join(name), skip, report)?;
        }
    }

    for path in list_files(in_dir)? {
        let Some(name) = path.file_name() else {
            continue;
        };
        let target = out_dir.join(name);

        if !is_geojson(&path) {
            fs::copy(&path, &target)?;
            report.copied += 1;
            continue;
        }

        let converted = read_geojson(&path).and_then(|mut document| {
            convert_document(&mut document);
            write_atomic(&target, &serde_json::to_vec(&document)?)
        });

        match converted {
            Ok(()) => report.converted += 1,
            Err(e) => {
                tracing::warn!("Skipping {}: {}", path.display(), e);
                report.failed.push(path);
            }
        }
    }

    Ok(())
}

/// Every `.geojson` file under `dir`, subdirectories after the files of
/// their parent, each level in flush order
fn collect_geojson(dir: &Path, files: &mut Vec<PathBuf>) -> OutputResult<()> {
    files.extend(list_files(dir)?.into_iter().filter(|p| is_geojson(p)));
    for sub in list_dirs(dir, None)? {
        collect_geojson(&sub, files)?;
    }
    Ok(())
}

/// Merges every `.geojson` feature collection under `in_dir` into `out_file`
///
/// Subdirectories are included. Inputs are taken in flush-counter order;
/// `out_file` itself is never an input. Returns the number of features written.
pub fn merge_directory(in_dir: &Path, out_file: &Path) -> OutputResult<usize> {
    let out_canonical = out_file.canonicalize().ok();
    let mut inputs = Vec::new();
    collect_geojson(in_dir, &mut inputs)?;

    let mut features = Vec::new();
    for path in inputs {
        if out_canonical.is_some() && path.canonicalize().ok() == out_canonical {
            continue;
        }

        let document = read_geojson(&path)?;
        match document.get("features").and_then(Value::as_array) {
            Some(items) => features.extend(items.iter().cloned()),
            None => {
                return Err(OutputError::Format {
                    path,
                    message: "not a FeatureCollection".to_string(),
                })
            }
        }
    }

    let count = features.len();
    let merged = json!({
        "type": "FeatureCollection",
        "features": features,
    });
    write_atomic(out_file, &serde_json::to_vec(&merged)?)?;
    tracing::info!("Merged {} features into {}", count, out_file.display());
    Ok(count)
}

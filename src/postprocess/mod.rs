//! Post-processing of finished crawls
//!
//! - Converting output coordinates from the vendor datum (GCJ-02) to WGS84
//! - Merging per-flush files into a single feature collection

mod batch;
mod gcj02;

pub use batch::{convert_directory, convert_document, merge_directory, ConversionReport};
pub use gcj02::{gcj02_to_wgs84, out_of_china, wgs84_to_gcj02};

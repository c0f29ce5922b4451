//! GCJ-02 to WGS84 coordinate conversion
//!
//! The vendor publishes coordinates in the obfuscated GCJ-02 datum used for
//! maps of mainland China. The inverse here is the usual single-step
//! approximation, accurate to a few metres.

use std::f64::consts::PI;

/// Semi-major axis of the Krasovsky 1940 ellipsoid
const A: f64 = 6_378_245.0;

/// Eccentricity squared of the same ellipsoid
const EE: f64 = 0.006_693_421_622_965_943;

/// Returns true if the point lies outside the region where GCJ-02 applies
pub fn out_of_china(lng: f64, lat: f64) -> bool {
    !(73.66..=135.05).contains(&lng) || !(3.86..=53.55).contains(&lat)
}

fn transform_lat(x: f64, y: f64) -> f64 {
    let mut ret = -100.0 + 2.0 * x + 3.0 * y + 0.2 * y * y + 0.1 * x * y + 0.2 * x.abs().sqrt();
    ret += (20.0 * (6.0 * x * PI).sin() + 20.0 * (2.0 * x * PI).sin()) * 2.0 / 3.0;
    ret += (20.0 * (y * PI).sin() + 40.0 * (y / 3.0 * PI).sin()) * 2.0 / 3.0;
    ret += (160.0 * (y / 12.0 * PI).sin() + 320.0 * (y * PI / 30.0).sin()) * 2.0 / 3.0;
    ret
}

fn transform_lng(x: f64, y: f64) -> f64 {
    let mut ret = 300.0 + x + 2.0 * y + 0.1 * x * x + 0.1 * x * y + 0.1 * x.abs().sqrt();
    ret += (20.0 * (6.0 * x * PI).sin() + 20.0 * (2.0 * x * PI).sin()) * 2.0 / 3.0;
    ret += (20.0 * (x * PI).sin() + 40.0 * (x / 3.0 * PI).sin()) * 2.0 / 3.0;
    ret += (150.0 * (x / 12.0 * PI).sin() + 300.0 * (x / 30.0 * PI).sin()) * 2.0 / 3.0;
    ret
}

/// GCJ-02 offset at a point, as (d_lng, d_lat) in degrees
fn offset(lng: f64, lat: f64) -> (f64, f64) {
    let d_lat = transform_lat(lng - 105.0, lat - 35.0);
    let d_lng = transform_lng(lng - 105.0, lat - 35.0);

    let rad_lat = lat / 180.0 * PI;
    let magic = 1.0 - EE * rad_lat.sin() * rad_lat.sin();
    let sqrt_magic = magic.sqrt();

    let d_lat = (d_lat * 180.0) / ((A * (1.0 - EE)) / (magic * sqrt_magic) * PI);
    let d_lng = (d_lng * 180.0) / (A / sqrt_magic * rad_lat.cos() * PI);
    (d_lng, d_lat)
}

/// Converts a WGS84 point to GCJ-02
pub fn wgs84_to_gcj02(lng: f64, lat: f64) -> (f64, f64) {
    if out_of_china(lng, lat) {
        return (lng, lat);
    }
    let (d_lng, d_lat) = offset(lng, lat);
    (lng + d_lng, lat + d_lat)
}

/// Converts a GCJ-02 point to WGS84; points outside China are unchanged
pub fn gcj02_to_wgs84(lng: f64, lat: f64) -> (f64, f64) {
    if out_of_china(lng, lat) {
        return (lng, lat);
    }
    let (d_lng, d_lat) = offset(lng, lat);
    (lng - d_lng, lat - d_lat)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_outside_china_unchanged() {
        assert_eq!(gcj02_to_wgs84(2.35, 48.85), (2.35, 48.85));
        assert_eq!(wgs84_to_gcj02(-74.0, 40.7), (-74.0, 40.7));
    }

    #[test]
    fn test_offset_in_beijing() {
        // GCJ-02 shifts central Beijing roughly 500m east and 150m north
        let (lng, lat) = gcj02_to_wgs84(116.397, 39.909);
        let (d_lng, d_lat) = (116.397 - lng, 39.909 - lat);
        assert!(d_lng > 0.003 && d_lng < 0.009, "d_lng {}", d_lng);
        assert!(d_lat > 0.0003 && d_lat < 0.003, "d_lat {}", d_lat);
    }

    #[test]
    fn test_round_trip_within_metres() {
        let (lng, lat) = (118.089, 24.479);
        let (g_lng, g_lat) = wgs84_to_gcj02(lng, lat);
        assert!((g_lng - lng).abs() > 1e-4);

        let (back_lng, back_lat) = gcj02_to_wgs84(g_lng, g_lat);
        // ~1e-5 degrees is about a metre
        assert!((back_lng - lng).abs() < 5e-5);
        assert!((back_lat - lat).abs() < 5e-5);
    }
}

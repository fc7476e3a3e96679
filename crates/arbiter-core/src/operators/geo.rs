//! Geospatial operators: great-circle radius and point-in-polygon.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::{defined, OperatorEnv, OperatorFn};

/// Mean Earth radius used by the Haversine formula.
pub const EARTH_RADIUS_KM: f64 = 6371.0;

const LATITUDE_KEYS: &[&str] = &["lat", "latitude"];
const LONGITUDE_KEYS: &[&str] = &["lon", "lng", "long", "longitude"];

pub(super) const OPERATORS: &[(&str, OperatorFn)] = &[
    ("within_radius", within_radius),
    ("in_polygon", in_polygon),
];

/// A WGS84 point in decimal degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinate {
    pub lat: f64,
    pub lon: f64,
}

impl Coordinate {
    /// Create a coordinate, rejecting out-of-range or non-finite values.
    pub fn new(lat: f64, lon: f64) -> Option<Self> {
        let valid = lat.is_finite()
            && lon.is_finite()
            && (-90.0..=90.0).contains(&lat)
            && (-180.0..=180.0).contains(&lon);
        valid.then_some(Self { lat, lon })
    }
}

/// Read a coordinate from `{lat, lon}` (with `lng`/`long`/`latitude`/`longitude`
/// spellings) or a `[lat, lon]` pair.
pub fn parse_coordinate(value: &Value) -> Option<Coordinate> {
    match value {
        Value::Array(items) if items.len() == 2 => {
            Coordinate::new(items[0].as_f64()?, items[1].as_f64()?)
        }
        Value::Object(map) => Coordinate::new(
            first_number(map, LATITUDE_KEYS)?,
            first_number(map, LONGITUDE_KEYS)?,
        ),
        _ => None,
    }
}

fn first_number(map: &Map<String, Value>, keys: &[&str]) -> Option<f64> {
    keys.iter().find_map(|key| map.get(*key)).and_then(Value::as_f64)
}

/// Great-circle distance in kilometres.
pub fn haversine_km(a: Coordinate, b: Coordinate) -> f64 {
    let (lat1, lat2) = (a.lat.to_radians(), b.lat.to_radians());
    let d_lat = (b.lat - a.lat).to_radians();
    let d_lon = (b.lon - a.lon).to_radians();

    let h = (d_lat / 2.0).sin().powi(2) + lat1.cos() * lat2.cos() * (d_lon / 2.0).sin().powi(2);
    2.0 * EARTH_RADIUS_KM * h.sqrt().min(1.0).asin()
}

/// Operand: `{center: <coordinate>, radius_km: <number>}` (`radius` accepted).
fn within_radius(actual: Option<&Value>, expected: &Value, _env: &OperatorEnv) -> bool {
    let Some(point) = defined(actual).and_then(parse_coordinate) else {
        return false;
    };
    let Some(operand) = expected.as_object() else {
        return false;
    };
    let Some(center) = operand.get("center").and_then(parse_coordinate) else {
        return false;
    };
    let Some(radius) = operand
        .get("radius_km")
        .or_else(|| operand.get("radius"))
        .and_then(Value::as_f64)
        .filter(|r| r.is_finite() && *r >= 0.0)
    else {
        return false;
    };

    haversine_km(point, center) <= radius
}

/// Ray-casting test. Longitude is the x axis, latitude the y axis.
fn in_polygon(actual: Option<&Value>, expected: &Value, _env: &OperatorEnv) -> bool {
    let Some(point) = defined(actual).and_then(parse_coordinate) else {
        return false;
    };
    let Some(raw_vertices) = expected.as_array().filter(|v| v.len() >= 3) else {
        return false;
    };
    let Some(vertices) = raw_vertices
        .iter()
        .map(parse_coordinate)
        .collect::<Option<Vec<_>>>()
    else {
        return false;
    };

    point_in_polygon(point, &vertices)
}

fn point_in_polygon(point: Coordinate, vertices: &[Coordinate]) -> bool {
    if vertices.len() < 3 {
        return false;
    }

    let (x, y) = (point.lon, point.lat);
    let mut inside = false;
    let mut j = vertices.len() - 1;

    for (i, vi) in vertices.iter().enumerate() {
        let vj = vertices[j];
        let (xi, yi) = (vi.lon, vi.lat);
        let (xj, yj) = (vj.lon, vj.lat);

        if (yi > y) != (yj > y) && x < (xj - xi) * (y - yi) / (yj - yi) + xi {
            inside = !inside;
        }
        j = i;
    }

    inside
}

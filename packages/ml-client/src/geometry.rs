use serde::{Deserialize, Serialize};

/// A `[latitude, longitude]` pair in WGS84 degrees, as drawn on the map.
pub type LatLng = [f64; 2];

/// Single-ring polygon in GeoJSON axis order: `[[[lng, lat], ...]]`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct GeoPolygon(Vec<Vec<[f64; 2]>>);

impl GeoPolygon {
    /// The outer ring.
    pub fn ring(&self) -> &[[f64; 2]] {
        self.0.first().map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn is_closed(&self) -> bool {
        let ring = self.ring();
        match (ring.first(), ring.last()) {
            (Some(first), Some(last)) => first == last,
            _ => false,
        }
    }
}

/// Convert map vertices to the closed GeoJSON ring the detection service expects.
///
/// Axis order is swapped to `[lng, lat]` and the first vertex is appended when
/// the ring is open. Fewer than three vertices are still closed here; callers
/// reject such polygons before detection.
pub fn normalize(vertices: &[LatLng]) -> GeoPolygon {
    let ring = vertices.iter().map(|&[lat, lng]| [lng, lat]).collect();
    GeoPolygon(vec![close_ring(ring)])
}

/// Append the first coordinate if the ring does not already end with it.
pub fn close_ring(mut ring: Vec<[f64; 2]>) -> Vec<[f64; 2]> {
    if let (Some(&first), Some(&last)) = (ring.first(), ring.last())
        && first != last
    {
        ring.push(first);
    }
    ring
}

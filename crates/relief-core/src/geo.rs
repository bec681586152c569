//! Great-circle distance, radius clipping, and coordinate normalization.
//!
//! All distances are statute miles. Pure functions only; callers own
//! iteration order and any ranking built on top of [`haversine_mi`].

/// Earth radius in statute miles, as used by the haversine formula.
pub const EARTH_RADIUS_MI: f64 = 3958.8;

/// Earth radius in meters for the spherical Web Mercator projection.
const MERCATOR_RADIUS_M: f64 = 6_378_137.0;

/// A `(lat, lng)` pair in WGS84 degrees.
pub type LatLng = (f64, f64);

/// Great-circle distance in miles between two WGS84 points.
pub fn haversine_mi(a: LatLng, b: LatLng) -> f64 {
    let (lat1, lng1) = a;
    let (lat2, lng2) = b;
    let dphi = (lat2 - lat1).to_radians();
    let dlambda = (lng2 - lng1).to_radians();
    let p1 = lat1.to_radians();
    let p2 = lat2.to_radians();
    let x = (dphi / 2.0).sin().powi(2) + p1.cos() * p2.cos() * (dlambda / 2.0).sin().powi(2);
    2.0 * EARTH_RADIUS_MI * x.sqrt().atan2((1.0 - x).sqrt())
}

/// Distance from `center` to `point`, rounded to 2 decimal places.
///
/// Returns `None` when either coordinate is non-finite, so callers can
/// push unrankable items to the end of a nearest-N ordering.
pub fn distance_mi(center: LatLng, point: LatLng) -> Option<f64> {
    let finite =
        center.0.is_finite() && center.1.is_finite() && point.0.is_finite() && point.1.is_finite();
    if !finite {
        return None;
    }
    Some((haversine_mi(center, point) * 100.0).round() / 100.0)
}

/// Keep only items within `radius_mi` of `center`.
///
/// Order-stable: survivors appear in input order. Items whose location
/// closure returns `None` are dropped (no position, no membership).
pub fn clip_by_radius<T>(
    items: Vec<T>,
    center: LatLng,
    radius_mi: f64,
    location: impl Fn(&T) -> Option<LatLng>,
) -> Vec<T> {
    items
        .into_iter()
        .filter(|it| location(it).is_some_and(|p| haversine_mi(center, p) <= radius_mi))
        .collect()
}

/// Normalize a possibly-projected coordinate pair to WGS84 degrees.
///
/// Some upstream shelter/food feeds publish Web Mercator (EPSG:3857) meters
/// where WGS84 degrees are expected. Detection is by magnitude: anything
/// outside ±90 lat / ±180 lng is treated as meters and inverted through the
/// spherical Mercator formulas. Best effort only — a pathological degree
/// pair can't be told apart from small meter offsets near (0, 0).
pub fn wgs84_from_any(lat: f64, lng: f64) -> LatLng {
    if lat.abs() <= 90.0 && lng.abs() <= 180.0 {
        return (lat, lng);
    }
    // Interpret as (y, x) meters.
    let x = lng;
    let y = lat;
    let lng_deg = (x / MERCATOR_RADIUS_M).to_degrees();
    let lat_deg = (2.0 * (y / MERCATOR_RADIUS_M).exp().atan() - std::f64::consts::FRAC_PI_2)
        .to_degrees();
    (lat_deg, lng_deg)
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

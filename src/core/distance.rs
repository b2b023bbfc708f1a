use crate::models::{BoundingBox, Coordinates};

/// Earth's mean radius in kilometers
const EARTH_RADIUS_KM: f64 = 6371.0;

/// Approximate kilometers per degree of latitude
const KM_PER_DEGREE: f64 = 111.0;

/// Relative slack on the longitude half-width
const BOX_MARGIN: f64 = 0.01;

/// Calculate the Haversine distance between two points in kilometers
///
/// Symmetric, zero for identical points. Out-of-range coordinates are not
/// rejected here; callers validate at the input boundary.
///
/// # Arguments
/// * `lat1` - Latitude of first point in degrees
/// * `lon1` - Longitude of first point in degrees
/// * `lat2` - Latitude of second point in degrees
/// * `lon2` - Longitude of second point in degrees
///
/// # Returns
/// Distance in kilometers
#[inline]
pub fn haversine_distance(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
    let lat1_rad = lat1.to_radians();
    let lat2_rad = lat2.to_radians();
    let delta_lat = (lat2 - lat1).to_radians();
    let delta_lon = (lon2 - lon1).to_radians();

    let a = (delta_lat / 2.0).sin().powi(2)
        + lat1_rad.cos() * lat2_rad.cos() * (delta_lon / 2.0).sin().powi(2);
    let c = 2.0 * a.sqrt().atan2((1.0 - a).sqrt());

    EARTH_RADIUS_KM * c
}

/// Haversine distance between two coordinate pairs
#[inline]
pub fn distance_between(a: &Coordinates, b: &Coordinates) -> f64 {
    haversine_distance(a.latitude, a.longitude, b.latitude, b.longitude)
}

/// Calculate a bounding box around a center point
///
/// Used as the cheap SQL pre-filter before the exact radius check, so it
/// must never exclude a point within `radius_km`. Latitude is clamped to
/// [-90, 90]. The longitude half-width is the widest point of the spherical
/// cap, `asin(sin(d) / cos(lat))`. When the cap touches a pole or crosses
/// the antimeridian the box covers every longitude.
pub fn calculate_bounding_box(lat: f64, lon: f64, radius_km: f64) -> BoundingBox {
    let lat_delta = radius_km / KM_PER_DEGREE;
    let min_lat = (lat - lat_delta).max(-90.0);
    let max_lat = (lat + lat_delta).min(90.0);

    let full_band = BoundingBox {
        min_lat,
        max_lat,
        min_lon: -180.0,
        max_lon: 180.0,
    };

    if min_lat <= -90.0 || max_lat >= 90.0 {
        return full_band;
    }

    let angular = radius_km / EARTH_RADIUS_KM;
    let ratio = angular.sin() / lat.to_radians().cos();
    if angular >= std::f64::consts::FRAC_PI_2 || ratio >= 1.0 {
        return full_band;
    }

    let lon_delta = ratio.asin().to_degrees() * (1.0 + BOX_MARGIN);
    if lon - lon_delta < -180.0 || lon + lon_delta > 180.0 {
        return full_band;
    }

    BoundingBox {
        min_lat,
        max_lat,
        min_lon: lon - lon_delta,
        max_lon: lon + lon_delta,
    }
}

/// Check if a point is within a bounding box
#[inline]
pub fn is_within_bounding_box(
    lat: f64,
    lon: f64,
    bbox: &BoundingBox,
) -> bool {
    lat >= bbox.min_lat
        && lat <= bbox.max_lat
        && lon >= bbox.min_lon
        && lon <= bbox.max_lon
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_haversine_distance() {
        // Distance from London to Paris (approximately 344 km)
        let distance = haversine_distance(51.5074, -0.1278, 48.8566, 2.3522);
        assert!((distance - 344.0).abs() < 10.0, "Distance should be ~344km, got {}", distance);
    }

    #[test]
    fn test_jakarta_points() {
        let distance = haversine_distance(-6.2088, 106.8456, -6.2188, 106.8556);
        assert!((distance - 1.568).abs() < 0.005, "Expected ~1.568km, got {}", distance);
    }

    #[test]
    fn test_distance_between_matches_raw() {
        let a = Coordinates::new(-6.2088, 106.8456);
        let b = Coordinates::new(-6.1988, 106.8356);
        assert_eq!(
            distance_between(&a, &b),
            haversine_distance(a.latitude, a.longitude, b.latitude, b.longitude)
        );
    }

    #[test]
    fn test_bounding_box() {
        let bbox = calculate_bounding_box(-6.2088, 106.8456, 5.0);

        assert!(bbox.min_lat < -6.2088);
        assert!(bbox.max_lat > -6.2088);
        assert!(bbox.min_lon < 106.8456);
        assert!(bbox.max_lon > 106.8456);

        // 10km / 111km per degree = ~0.09 degrees
        let lat_span = bbox.max_lat - bbox.min_lat;
        assert!((lat_span - 0.09).abs() < 0.01, "Lat span should be ~0.09 degrees");
    }

    #[test]
    fn test_bounding_box_at_pole() {
        let bbox = calculate_bounding_box(90.0, 0.0, 5.0);
        assert_eq!(bbox.max_lat, 90.0);
        assert_eq!(bbox.min_lon, -180.0);
        assert_eq!(bbox.max_lon, 180.0);

        let bbox = calculate_bounding_box(-89.99, 45.0, 5.0);
        assert_eq!(bbox.min_lat, -90.0);
        assert_eq!(bbox.min_lon, -180.0);
    }

    #[test]
    fn test_bounding_box_across_antimeridian() {
        let bbox = calculate_bounding_box(0.0, 179.99, 5.0);
        assert_eq!(bbox.min_lon, -180.0);
        assert_eq!(bbox.max_lon, 180.0);

        assert!(haversine_distance(0.0, 179.99, 0.0, -179.99) < 5.0);
        assert!(is_within_bounding_box(0.0, -179.99, &bbox));
    }

    #[test]
    fn test_bounding_box_holds_widest_point_at_high_latitude() {
        let (lat, radius_km) = (85.0_f64, 100.0);
        let bbox = calculate_bounding_box(lat, 0.0, radius_km);

        // Point of greatest longitude on a circle just inside the radius
        let d = 99.9 / EARTH_RADIUS_KM;
        let edge_lat = (lat.to_radians().sin() / d.cos()).asin().to_degrees();
        let edge_lon = (d.sin() / lat.to_radians().cos()).asin().to_degrees();

        let distance = haversine_distance(lat, 0.0, edge_lat, edge_lon);
        assert!(distance <= radius_km, "edge point at {} km", distance);
        assert!(is_within_bounding_box(edge_lat, edge_lon, &bbox));
        assert!(is_within_bounding_box(edge_lat, -edge_lon, &bbox));
    }

    #[test]
    fn test_point_within_bbox() {
        let bbox = calculate_bounding_box(-6.2088, 106.8456, 5.0);

        assert!(is_within_bounding_box(-6.2088, 106.8456, &bbox));
        assert!(is_within_bounding_box(-6.2188, 106.8556, &bbox));
        assert!(!is_within_bounding_box(-7.0, 110.0, &bbox));
    }
}

//! Great-circle distance

use crate::model::Coordinates;

/// Mean Earth radius in meters
pub const EARTH_RADIUS_METERS: f64 = 6_371_000.0;

/// Haversine distance in meters
pub fn haversine_meters(a: Coordinates, b: Coordinates) -> f64 {
    let d_lat = (b.latitude - a.latitude).to_radians();
    let d_lng = (b.longitude - a.longitude).to_radians();
    let s_lat = (d_lat / 2.0).sin();
    let s_lng = (d_lng / 2.0).sin();
    let k = s_lat * s_lat
        + a.latitude.to_radians().cos() * b.latitude.to_radians().cos() * s_lng * s_lng;
    2.0 * EARTH_RADIUS_METERS * k.sqrt().atan2((1.0 - k).sqrt())
}

/// Haversine distance rounded to whole meters
///
/// This rounded value is what results report and what filtering and
/// ordering compare, so every back end agrees on it.
pub fn distance_meters(a: Coordinates, b: Coordinates) -> u64 {
    haversine_meters(a, b).round() as u64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zero_distance() {
        let boston = Coordinates::new(42.36, -71.06);
        assert_eq!(distance_meters(boston, boston), 0);
    }

    #[test]
    fn test_known_distance() {
        // Boston to New York City, roughly 306 km
        let boston = Coordinates::new(42.3601, -71.0589);
        let nyc = Coordinates::new(40.7128, -74.0060);
        let km = haversine_meters(boston, nyc) / 1000.0;
        assert!((km - 306.1).abs() < 1.0, "{}", km);
    }

    #[test]
    fn test_symmetric() {
        let a = Coordinates::new(44.19, -72.5);
        let b = Coordinates::new(42.34, -72.58);
        assert_eq!(distance_meters(a, b), distance_meters(b, a));
    }

    #[test]
    fn test_one_degree_of_latitude() {
        let a = Coordinates::new(0.0, 0.0);
        let b = Coordinates::new(1.0, 0.0);
        // 2 * pi * R / 360
        assert_eq!(distance_meters(a, b), 111_195);
    }
}

/// Earth's radius in statute miles
const EARTH_RADIUS_MILES: f64 = 3958.8;

/// Great-circle distance between two points in miles, via the haversine
/// formula.
///
/// # Arguments
/// * `lat1` - Latitude of first point in degrees
/// * `lon1` - Longitude of first point in degrees
/// * `lat2` - Latitude of second point in degrees
/// * `lon2` - Longitude of second point in degrees
///
/// Inputs are assumed finite; callers must skip the radius check entirely
/// when either side is missing coordinates.
#[inline]
pub fn haversine_miles(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
    let lat1_rad = lat1.to_radians();
    let lat2_rad = lat2.to_radians();
    let delta_lat = (lat2 - lat1).to_radians();
    let delta_lon = (lon2 - lon1).to_radians();

    let a = (delta_lat / 2.0).sin().powi(2)
        + lat1_rad.cos() * lat2_rad.cos() * (delta_lon / 2.0).sin().powi(2);
    let c = 2.0 * a.sqrt().atan2((1.0 - a).sqrt());

    EARTH_RADIUS_MILES * c
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_haversine_zero_distance() {
        let d = haversine_miles(41.8781, -87.6298, 41.8781, -87.6298);
        assert!(d < 0.01);
    }

    #[test]
    fn test_haversine_chicago_to_milwaukee() {
        // Chicago to Milwaukee is roughly 83 miles
        let d = haversine_miles(41.8781, -87.6298, 43.0389, -87.9065);
        assert!((d - 83.0).abs() < 5.0, "expected ~83 miles, got {}", d);
    }

    #[test]
    fn test_haversine_la_to_nyc() {
        // Los Angeles to New York is roughly 2,445 miles
        let d = haversine_miles(34.0522, -118.2437, 40.7128, -74.0060);
        assert!((d - 2445.0).abs() < 50.0, "expected ~2445 miles, got {}", d);
    }

    #[test]
    fn test_haversine_symmetric() {
        let pairs = [
            ((34.0, -118.0), (36.0, -120.0)),
            ((41.8781, -87.6298), (33.7490, -84.3880)),
            ((0.0, 0.0), (-33.8688, 151.2093)),
        ];
        for ((lat1, lon1), (lat2, lon2)) in pairs {
            let ab = haversine_miles(lat1, lon1, lat2, lon2);
            let ba = haversine_miles(lat2, lon2, lat1, lon1);
            assert!((ab - ba).abs() < 1e-9);
        }
    }
}

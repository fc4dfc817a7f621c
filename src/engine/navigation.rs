//! Geodesy and angle helpers shared by the solver, planner and evaluators.

use crate::engine::models::Coordinate;

/// Knots to metres per second.
pub const KNOTS_TO_MS: f64 = 0.51444;
pub const MS_TO_KNOTS: f64 = 1.94384;
/// Metres per degree of latitude used by the planner's equirectangular stepping.
pub const METERS_PER_DEGREE: f64 = 111_000.0;
const EARTH_RADIUS_M: f64 = 6_371_000.0;

/// Normalizes a course to [0, 360)
pub fn normalize_course(deg: f64) -> f64 {
    let c = deg.rem_euclid(360.0);
    if c >= 360.0 { 0.0 } else { c }
}

/// Normalizes a signed angle to (-180, 180]
pub fn normalize_relative(deg: f64) -> f64 {
    let mut a = deg.rem_euclid(360.0);
    if a > 180.0 {
        a -= 360.0;
    }
    a
}

/// Initial great-circle bearing from `start` to `end`, degrees in [0, 360)
pub fn calculate_bearing(start: &Coordinate, end: &Coordinate) -> f64 {
    let start_lat = start.lat.to_radians();
    let end_lat = end.lat.to_radians();
    let d_lon = (end.lon - start.lon).to_radians();

    let y = d_lon.sin() * end_lat.cos();
    let x = start_lat.cos() * end_lat.sin() - start_lat.sin() * end_lat.cos() * d_lon.cos();
    normalize_course(y.atan2(x).to_degrees())
}

/// Great-circle (haversine) distance in meters
pub fn calculate_distance(start: &Coordinate, end: &Coordinate) -> f64 {
    let start_lat = start.lat.to_radians();
    let end_lat = end.lat.to_radians();
    let d_lat = (end.lat - start.lat).to_radians();
    let d_lon = (end.lon - start.lon).to_radians();

    let a = (d_lat / 2.0).sin().powi(2)
        + start_lat.cos() * end_lat.cos() * (d_lon / 2.0).sin().powi(2);
    let c = 2.0 * a.sqrt().atan2((1.0 - a).sqrt());
    EARTH_RADIUS_M * c
}

/// Advances `distance_m` along `course_deg` with the flat-earth approximation
/// the planner steps with.
pub fn advance_equirectangular(start: &Coordinate, course_deg: f64, distance_m: f64) -> Coordinate {
    let course = course_deg.to_radians();
    let d_lat = course.cos() * distance_m / METERS_PER_DEGREE;
    let cos_lat = start.lat.to_radians().cos();
    // Avoid blowing up at the poles
    let d_lon = if cos_lat.abs() < 1e-9 {
        0.0
    } else {
        course.sin() * distance_m / (METERS_PER_DEGREE * cos_lat)
    };
    Coordinate::new(start.lat + d_lat, start.lon + d_lon)
}

/// Midpoint of two coordinates along the great circle
pub fn midpoint(a: &Coordinate, b: &Coordinate) -> Coordinate {
    let lat1 = a.lat.to_radians();
    let lat2 = b.lat.to_radians();
    let lon1 = a.lon.to_radians();
    let d_lon = (b.lon - a.lon).to_radians();

    let bx = lat2.cos() * d_lon.cos();
    let by = lat2.cos() * d_lon.sin();
    let lat = (lat1.sin() + lat2.sin()).atan2(((lat1.cos() + bx).powi(2) + by.powi(2)).sqrt());
    let lon = lon1 + by.atan2(lat1.cos() + bx);
    Coordinate::new(lat.to_degrees(), lon.to_degrees())
}

/// Seconds needed to cover `distance_m` at `speed_kn`; zero speed yields zero time.
pub fn travel_time(distance_m: f64, speed_kn: f64) -> f64 {
    let speed_ms = speed_kn * KNOTS_TO_MS;
    if speed_ms <= 0.0 || !speed_ms.is_finite() {
        return 0.0;
    }
    distance_m / speed_ms
}

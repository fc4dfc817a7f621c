use serde::{Deserialize, Serialize};

use crate::engine::navigation::{MS_TO_KNOTS, normalize_course};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinate {
    pub lat: f64,
    pub lon: f64,
}

impl Coordinate {
    pub fn new(lat: f64, lon: f64) -> Self {
        Self { lat, lon }
    }
}

/// Wind observed at a point, as supplied by the wind-field collaborator
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct WindSample {
    /// Direction the wind blows FROM, degrees in [0, 360)
    pub direction: f64,
    /// True wind speed in knots
    pub speed: f64,
    /// Estimate confidence in [0, 1]
    pub confidence: f64,
}

impl WindSample {
    pub fn new(direction: f64, speed: f64, confidence: f64) -> Self {
        Self {
            direction: normalize_course(direction),
            speed: speed.max(0.0),
            confidence: confidence.clamp(0.0, 1.0),
        }
    }

    /// Builds a sample from GRIB-style components in m/s (u eastward, v northward).
    pub fn from_components(u: f64, v: f64, confidence: f64) -> Self {
        let speed_ms = (u.powi(2) + v.powi(2)).sqrt();
        let angle = v.atan2(u).to_degrees();
        Self::new(270.0 - angle, speed_ms * MS_TO_KNOTS, confidence)
    }
}

/// Read-only wind lookup. Returns `None` outside the field's coverage.
pub trait WindFieldQuery: Send + Sync {
    fn wind_at(&self, coord: &Coordinate) -> Option<WindSample>;
}

impl<F> WindFieldQuery for F
where
    F: Fn(&Coordinate) -> Option<WindSample> + Send + Sync,
{
    fn wind_at(&self, coord: &Coordinate) -> Option<WindSample> {
        self(coord)
    }
}

/// Regular lat/lon grid of wind estimates with nearest-point lookup.
///
/// Cells are stored row-major: `index = lat_idx * lons.len() + lon_idx`.
/// Queries further than half a cell outside the grid extent have no coverage.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WindGrid {
    pub lats: Vec<f64>,
    pub lons: Vec<f64>,
    pub direction: Vec<f64>,
    pub speed: Vec<f64>,
    pub confidence: Vec<f64>,
}

impl WindGrid {
    /// A grid where every cell carries the same sample.
    pub fn uniform(lats: Vec<f64>, lons: Vec<f64>, sample: WindSample) -> Self {
        let cells = lats.len() * lons.len();
        Self {
            lats,
            lons,
            direction: vec![sample.direction; cells],
            speed: vec![sample.speed; cells],
            confidence: vec![sample.confidence; cells],
        }
    }

    pub fn get_bounds(&self) -> Option<(f64, f64, f64, f64)> {
        let min_lat = self.lats.iter().copied().reduce(f64::min)?;
        let max_lat = self.lats.iter().copied().reduce(f64::max)?;
        let min_lon = self.lons.iter().copied().reduce(f64::min)?;
        let max_lon = self.lons.iter().copied().reduce(f64::max)?;
        Some((min_lat, max_lat, min_lon, max_lon))
    }

    fn half_spacing(axis: &[f64]) -> f64 {
        if axis.len() < 2 {
            return 0.5;
        }
        let span = axis[axis.len() - 1] - axis[0];
        (span / (axis.len() - 1) as f64).abs() / 2.0
    }

    fn nearest_index(axis: &[f64], value: f64) -> Option<usize> {
        axis.iter()
            .enumerate()
            .map(|(i, v)| (i, (v - value).abs()))
            .min_by(|a, b| a.1.total_cmp(&b.1))
            .map(|(i, _)| i)
    }
}

impl WindFieldQuery for WindGrid {
    /// Finds the nearest grid point to the given coordinate
    fn wind_at(&self, coord: &Coordinate) -> Option<WindSample> {
        let (min_lat, max_lat, min_lon, max_lon) = self.get_bounds()?;
        let pad_lat = Self::half_spacing(&self.lats);
        let pad_lon = Self::half_spacing(&self.lons);
        if coord.lat < min_lat - pad_lat
            || coord.lat > max_lat + pad_lat
            || coord.lon < min_lon - pad_lon
            || coord.lon > max_lon + pad_lon
        {
            return None;
        }

        let lat_idx = Self::nearest_index(&self.lats, coord.lat)?;
        let lon_idx = Self::nearest_index(&self.lons, coord.lon)?;
        let idx = lat_idx * self.lons.len() + lon_idx;

        let direction = *self.direction.get(idx)?;
        let speed = *self.speed.get(idx)?;
        let confidence = self.confidence.get(idx).copied().unwrap_or(1.0);
        if !direction.is_finite() || !speed.is_finite() {
            return None;
        }
        Some(WindSample::new(direction, speed, confidence))
    }
}

use log::{info, warn};
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::parsers::polars::{PolarInput, PolarTable};

/// Used when an optimal-angle table has no entries.
pub const DEFAULT_UPWIND_ANGLE: f64 = 45.0;
pub const DEFAULT_DOWNWIND_ANGLE: f64 = 150.0;
pub const DEFAULT_NOMINAL_VMG: f64 = 1.0;

/// Boat-speed / wind-speed ratios for the heuristic estimate, matched by boat-id substring.
const HEURISTIC_COEFFICIENTS: &[(&str, f64)] = &[
    ("imoca", 0.9),
    ("class40", 0.8),
    ("j70", 0.65),
    ("470", 0.6),
    ("laser", 0.55),
    ("cruiser", 0.45),
];
const DEFAULT_HEURISTIC_COEFFICIENT: f64 = 0.5;

/// Where a speed estimate came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SpeedSource {
    Table,
    Heuristic,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SpeedEstimate {
    pub knots: f64,
    pub source: SpeedSource,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct OptimalAngle {
    pub wind_speed: f64,
    /// True wind angle in degrees
    pub angle: f64,
    /// VMG along the wind axis in knots
    pub vmg: f64,
}

/// Best VMG angle per known wind speed, ascending by wind speed.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OptimalAngleTable {
    pub entries: Vec<OptimalAngle>,
}

impl OptimalAngleTable {
    fn compute(model: &PolarPerformanceModel, upwind: bool) -> Self {
        let degrees = if upwind { 0..=90 } else { 91..=180 };
        let entries = model
            .table
            .wind_speeds
            .iter()
            .map(|&ws| {
                let mut best = OptimalAngle { wind_speed: ws, angle: f64::NAN, vmg: f64::NEG_INFINITY };
                for deg in degrees.clone() {
                    let angle = deg as f64;
                    let speed = model.estimate(ws, angle).knots;
                    let axis_angle = if upwind { angle } else { 180.0 - angle };
                    let vmg = speed * axis_angle.to_radians().cos();
                    // Strict comparison keeps the lowest angle on ties
                    if vmg > best.vmg || best.angle.is_nan() {
                        best = OptimalAngle { wind_speed: ws, angle, vmg };
                    }
                }
                best
            })
            .collect();
        Self { entries }
    }

    /// Interpolated optimal angle for a wind speed, clamped at the table ends.
    pub fn lookup(&self, wind_speed: f64, upwind: bool) -> OptimalAngle {
        let (first, last) = match (self.entries.first(), self.entries.last()) {
            (Some(first), Some(last)) => (first, last),
            _ => {
                let angle = if upwind { DEFAULT_UPWIND_ANGLE } else { DEFAULT_DOWNWIND_ANGLE };
                return OptimalAngle { wind_speed, angle, vmg: DEFAULT_NOMINAL_VMG };
            }
        };

        if !wind_speed.is_finite() || wind_speed <= first.wind_speed {
            return *first;
        }
        if wind_speed >= last.wind_speed {
            return *last;
        }

        let hi = self.entries.partition_point(|e| e.wind_speed < wind_speed);
        let upper = self.entries[hi];
        if upper.wind_speed == wind_speed {
            return upper;
        }
        let lower = self.entries[hi - 1];
        let frac = (wind_speed - lower.wind_speed) / (upper.wind_speed - lower.wind_speed);
        OptimalAngle {
            wind_speed,
            angle: lower.angle + (upper.angle - lower.angle) * frac,
            vmg: lower.vmg + (upper.vmg - lower.vmg) * frac,
        }
    }
}

/// Position of a query value on one table axis.
#[derive(Debug, Clone, Copy, PartialEq)]
enum Bracket {
    Exact(usize),
    Between(usize, usize, f64),
}

fn bracket(axis: &[f64], value: f64) -> Bracket {
    let hi = axis.partition_point(|v| *v < value);
    if hi >= axis.len() {
        return Bracket::Exact(axis.len() - 1);
    }
    if axis[hi] == value || hi == 0 {
        return Bracket::Exact(hi);
    }
    let lo = hi - 1;
    let frac = (value - axis[lo]) / (axis[hi] - axis[lo]);
    Bracket::Between(lo, hi, frac)
}

/// Folds any wind angle onto [0, 180]; polars are symmetric about the boat's axis.
pub fn normalize_wind_angle(angle: f64) -> f64 {
    let a = angle.abs() % 360.0;
    if a > 180.0 { 360.0 - a } else { a }
}

/// Smooth fallback speed: zero at 0° and 180°, peaks at 45° and 135°, 0.85 abeam.
pub fn heuristic_speed(wind_speed: f64, wind_angle: f64, coefficient: f64) -> f64 {
    if !wind_speed.is_finite() || !wind_angle.is_finite() {
        return 0.0;
    }
    let angle = normalize_wind_angle(wind_angle);
    let shape = if angle <= 45.0 {
        (2.0 * angle).to_radians().sin()
    } else if angle < 135.0 {
        0.85 + 0.15 * (2.0 * (angle - 45.0)).to_radians().cos().abs()
    } else {
        (2.0 * (180.0 - angle)).to_radians().sin()
    };
    wind_speed.max(0.0) * coefficient * shape.max(0.0)
}

fn heuristic_coefficient(boat_id: &str) -> f64 {
    let id = boat_id.to_ascii_lowercase();
    HEURISTIC_COEFFICIENTS
        .iter()
        .find(|(key, _)| id.contains(key))
        .map(|(_, c)| *c)
        .unwrap_or(DEFAULT_HEURISTIC_COEFFICIENT)
}

/// One boat's polar table together with its precomputed optimal angles.
#[derive(Debug, Clone)]
pub struct PolarPerformanceModel {
    boat_id: String,
    table: PolarTable,
    heuristic_coefficient: f64,
    upwind: OptimalAngleTable,
    downwind: OptimalAngleTable,
}

impl PolarPerformanceModel {
    pub fn load(boat_id: &str, input: PolarInput) -> Result<Self> {
        let table = PolarTable::from_input(input)?;
        let mut model = Self {
            boat_id: boat_id.to_string(),
            table,
            heuristic_coefficient: heuristic_coefficient(boat_id),
            upwind: OptimalAngleTable::default(),
            downwind: OptimalAngleTable::default(),
        };
        model.upwind = OptimalAngleTable::compute(&model, true);
        model.downwind = OptimalAngleTable::compute(&model, false);

        let missing = model.table.speeds.iter().flatten().filter(|v| !v.is_finite()).count();
        if missing > 0 {
            warn!("Polar for {} has {} missing cells, heuristic speeds fill the gaps", model.boat_id, missing);
        }

        info!(
            "Loaded polar for {}: {} angles x {} wind speeds",
            model.boat_id,
            model.table.angles.len(),
            model.table.wind_speeds.len()
        );
        Ok(model)
    }

    pub fn boat_id(&self) -> &str {
        &self.boat_id
    }

    pub fn table(&self) -> &PolarTable {
        &self.table
    }

    pub fn optimal_table(&self, upwind: bool) -> &OptimalAngleTable {
        if upwind { &self.upwind } else { &self.downwind }
    }

    /// Boat speed (knots) for a true wind speed and angle.
    ///
    /// Bilinear over the bracketing cells with both axes clamped to the table
    /// range. Falls back to [`heuristic_speed`] when a needed cell is missing.
    pub fn speed_at(&self, wind_speed: f64, wind_angle: f64) -> SpeedEstimate {
        let estimate = self.estimate(wind_speed, wind_angle);
        if estimate.source == SpeedSource::Heuristic {
            warn!(
                "Polar lookup failed for {} at {:.1} kt / {:.1} deg, using heuristic",
                self.boat_id, wind_speed, wind_angle
            );
        }
        estimate
    }

    /// [`Self::speed_at`] without the fallback warning, for bulk scans.
    fn estimate(&self, wind_speed: f64, wind_angle: f64) -> SpeedEstimate {
        match self.interpolate(wind_speed, wind_angle) {
            Some(knots) => SpeedEstimate { knots, source: SpeedSource::Table },
            None => SpeedEstimate {
                knots: heuristic_speed(wind_speed, wind_angle, self.heuristic_coefficient),
                source: SpeedSource::Heuristic,
            },
        }
    }

    pub fn speed_knots(&self, wind_speed: f64, wind_angle: f64) -> f64 {
        self.speed_at(wind_speed, wind_angle).knots
    }

    fn interpolate(&self, wind_speed: f64, wind_angle: f64) -> Option<f64> {
        if !wind_speed.is_finite() || !wind_angle.is_finite() {
            return None;
        }
        let angles = &self.table.angles;
        let speeds = &self.table.wind_speeds;
        let (a_first, a_last) = (*angles.first()?, *angles.last()?);
        let (w_first, w_last) = (*speeds.first()?, *speeds.last()?);

        let angle = normalize_wind_angle(wind_angle).clamp(a_first, a_last);
        let ws = wind_speed.clamp(w_first, w_last);

        let cell = |a: usize, w: usize| -> Option<f64> {
            let v = *self.table.speeds.get(a)?.get(w)?;
            v.is_finite().then_some(v)
        };
        let along_speed = |a: usize| -> Option<f64> {
            match bracket(speeds, ws) {
                Bracket::Exact(w) => cell(a, w),
                Bracket::Between(w0, w1, frac) => {
                    Some(cell(a, w0)? * (1.0 - frac) + cell(a, w1)? * frac)
                }
            }
        };

        match bracket(angles, angle) {
            Bracket::Exact(a) => along_speed(a),
            Bracket::Between(a0, a1, frac) => {
                Some(along_speed(a0)? * (1.0 - frac) + along_speed(a1)? * frac)
            }
        }
    }

    pub fn optimal_angle(&self, wind_speed: f64, upwind: bool) -> OptimalAngle {
        self.optimal_table(upwind).lookup(wind_speed, upwind)
    }
}

use log::debug;
use serde::{Deserialize, Serialize};

use crate::engine::models::{Coordinate, WindFieldQuery, WindSample};
use crate::engine::navigation::{
    KNOTS_TO_MS, calculate_bearing, calculate_distance, normalize_course, normalize_relative,
};
use crate::engine::polar::{PolarPerformanceModel, SpeedSource};

/// True wind angles below this put the target upwind of the boat.
pub const UPWIND_REGIME_LIMIT: f64 = 45.0;
/// True wind angles above this put the target downwind of the boat.
pub const DOWNWIND_REGIME_LIMIT: f64 = 135.0;
pub const DEFAULT_TACK_GAIN_THRESHOLD: f64 = 0.15;

/// One navigation decision toward a target.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct VmgDecision {
    /// Course to steer, degrees in [0, 360)
    pub optimal_course: f64,
    /// Boat speed on that course (knots)
    pub boat_speed: f64,
    /// Speed made good toward the target (knots); negative when sailing away
    pub vmg: f64,
    pub is_upwind: bool,
    pub is_direct: bool,
    pub tack_needed: bool,
    pub wind_sample: WindSample,
    pub bearing_to_target: f64,
    /// Target bearing relative to the wind direction, in (-180, 180]
    pub relative_wind_angle: f64,
    pub distance_to_target_m: f64,
    /// Seconds to the target at the current VMG, when positive
    pub estimated_time_s: Option<f64>,
    pub speed_source: SpeedSource,
    /// The course on the current tack, which differs from `optimal_course`
    /// when `tack_needed` is set
    pub held_course: f64,
    pub held_vmg: f64,
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct Candidate {
    course: f64,
    speed: f64,
    vmg: f64,
    source: SpeedSource,
}

/// Stateless single-point VMG decision maker.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VmgSolver {
    /// VMG gain (knots) the other tack must offer before a tack is called
    pub tack_gain_threshold: f64,
}

impl Default for VmgSolver {
    fn default() -> Self {
        Self { tack_gain_threshold: DEFAULT_TACK_GAIN_THRESHOLD }
    }
}

impl VmgSolver {
    pub fn new(tack_gain_threshold: f64) -> Self {
        Self { tack_gain_threshold: tack_gain_threshold.max(0.0) }
    }

    /// Which side of the wind a course lies on: true for starboard of the wind axis.
    pub fn wind_side(course: f64, wind_direction: f64) -> bool {
        normalize_relative(course - wind_direction) >= 0.0
    }

    /// Best `(course, speed)` toward `bearing` without crossing the wind axis:
    /// close-hauled or running on the given side, whichever makes more VMG.
    pub fn best_on_side(
        model: &PolarPerformanceModel,
        wind: &WindSample,
        bearing: f64,
        starboard: bool,
    ) -> (f64, f64) {
        let sign = if starboard { 1.0 } else { -1.0 };
        let beat = model.optimal_angle(wind.speed, true).angle;
        let run = model.optimal_angle(wind.speed, false).angle;
        let beat = Self::candidate(model, wind, wind.direction + sign * beat, bearing);
        let run = Self::candidate(model, wind, wind.direction + sign * run, bearing);
        let best = if run.vmg > beat.vmg { run } else { beat };
        (best.course, best.speed)
    }

    fn candidate(model: &PolarPerformanceModel, wind: &WindSample, course: f64, bearing: f64) -> Candidate {
        let twa = normalize_relative(course - wind.direction);
        let estimate = model.speed_at(wind.speed, twa);
        let deviation = normalize_relative(course - bearing).to_radians();
        Candidate {
            course: normalize_course(course),
            speed: estimate.knots,
            vmg: estimate.knots * deviation.cos(),
            source: estimate.source,
        }
    }

    /// Best course from `position` toward `target`.
    ///
    /// `current_course` is the heading the boat is already on; when set, the
    /// tack on that side of the wind is the one held unless the other gains
    /// more than `tack_gain_threshold`. Returns `None` when the wind field has
    /// no coverage at `position`.
    pub fn solve(
        &self,
        model: &PolarPerformanceModel,
        wind_field: &dyn WindFieldQuery,
        position: &Coordinate,
        target: &Coordinate,
        current_course: Option<f64>,
    ) -> Option<VmgDecision> {
        let wind = wind_field.wind_at(position)?;
        let bearing = calculate_bearing(position, target);
        let relative = normalize_relative(bearing - wind.direction);
        let twa = relative.abs();
        let distance = calculate_distance(position, target);

        let decision = if twa >= UPWIND_REGIME_LIMIT && twa <= DOWNWIND_REGIME_LIMIT {
            let direct = Self::candidate(model, &wind, bearing, bearing);
            VmgDecision {
                optimal_course: direct.course,
                boat_speed: direct.speed,
                vmg: direct.speed,
                is_upwind: twa < 90.0,
                is_direct: true,
                tack_needed: false,
                wind_sample: wind,
                bearing_to_target: bearing,
                relative_wind_angle: relative,
                distance_to_target_m: distance,
                estimated_time_s: None,
                speed_source: direct.source,
                held_course: direct.course,
                held_vmg: direct.speed,
            }
        } else {
            let upwind = twa < UPWIND_REGIME_LIMIT;
            let optimal = model.optimal_angle(wind.speed, upwind);

            let starboard = Self::candidate(model, &wind, wind.direction + optimal.angle, bearing);
            let port = Self::candidate(model, &wind, wind.direction - optimal.angle, bearing);

            let hold_starboard = match current_course {
                Some(course) => Self::wind_side(course, wind.direction),
                None => relative >= 0.0,
            };
            let (held, other) = if hold_starboard { (starboard, port) } else { (port, starboard) };
            let tack_needed = other.vmg - held.vmg > self.tack_gain_threshold;
            let chosen = if tack_needed { other } else { held };

            VmgDecision {
                optimal_course: chosen.course,
                boat_speed: chosen.speed,
                vmg: chosen.vmg,
                is_upwind: upwind,
                is_direct: false,
                tack_needed,
                wind_sample: wind,
                bearing_to_target: bearing,
                relative_wind_angle: relative,
                distance_to_target_m: distance,
                estimated_time_s: None,
                speed_source: chosen.source,
                held_course: held.course,
                held_vmg: held.vmg,
            }
        };

        let estimated_time_s =
            (decision.vmg > 0.0).then(|| distance / (decision.vmg * KNOTS_TO_MS));
        debug!(
            "VMG decision at ({:.5}, {:.5}): course {:.1} speed {:.2} vmg {:.2} tack {}",
            position.lat,
            position.lon,
            decision.optimal_course,
            decision.boat_speed,
            decision.vmg,
            decision.tack_needed
        );
        Some(VmgDecision { estimated_time_s, ..decision })
    }
}

use std::sync::atomic::{AtomicBool, Ordering};

use log::{debug, info, warn};
use serde::{Deserialize, Serialize};

use crate::config::PlannerConfig;
use crate::engine::models::{Coordinate, WindFieldQuery};
use crate::engine::navigation::{
    KNOTS_TO_MS, advance_equirectangular, calculate_distance, normalize_relative, travel_time,
};
use crate::engine::polar::PolarPerformanceModel;
use crate::engine::vmg::VmgSolver;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PathPoint {
    pub lat: f64,
    pub lon: f64,
    /// Course steered from this point (degrees)
    pub course: f64,
    /// Boat speed (knots)
    pub speed: f64,
    /// Seconds since the start of the leg
    pub elapsed_time: f64,
    pub wind_direction: f64,
    pub wind_speed: f64,
    pub is_upwind: bool,
}

impl PathPoint {
    pub fn coordinate(&self) -> Coordinate {
        Coordinate::new(self.lat, self.lon)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TackEvent {
    pub lat: f64,
    pub lon: f64,
    pub elapsed_time: f64,
    pub is_upwind: bool,
    /// Index of the path point recorded at the tack
    pub path_index: usize,
}

impl TackEvent {
    pub fn coordinate(&self) -> Coordinate {
        Coordinate::new(self.lat, self.lon)
    }
}

/// How a leg simulation ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LegOutcome {
    Arrived,
    /// The wind field had no data at the boat's position
    Aborted,
    Cancelled,
    IterationLimit,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LegResult {
    pub start: Coordinate,
    pub target: Coordinate,
    pub points: Vec<PathPoint>,
    pub tacks: Vec<TackEvent>,
    pub outcome: LegOutcome,
    /// Seconds
    pub total_time: f64,
    /// Meters sailed
    pub total_distance: f64,
    /// Knots
    pub average_speed: f64,
    pub tack_count: usize,
    pub iterations: usize,
}

impl LegResult {
    pub fn arrived(&self) -> bool {
        self.outcome == LegOutcome::Arrived
    }
}

/// Simulates one point-to-point leg by repeatedly applying the VMG solver.
pub struct TackAwarePathPlanner<'a> {
    pub model: &'a PolarPerformanceModel,
    pub wind_field: &'a dyn WindFieldQuery,
    pub solver: VmgSolver,
    pub config: PlannerConfig,
}

impl<'a> TackAwarePathPlanner<'a> {
    pub fn new(
        model: &'a PolarPerformanceModel,
        wind_field: &'a dyn WindFieldQuery,
        solver: VmgSolver,
        config: PlannerConfig,
    ) -> Self {
        Self { model, wind_field, solver, config }
    }

    pub fn plan(&self, start: Coordinate, target: Coordinate) -> LegResult {
        self.plan_with_cancel(start, target, None)
    }

    /// Runs the leg; `cancel` is polled at the top of every iteration.
    pub fn plan_with_cancel(
        &self,
        start: Coordinate,
        target: Coordinate,
        cancel: Option<&AtomicBool>,
    ) -> LegResult {
        let step = self.config.step_distance_m;
        let mut position = start;
        let mut elapsed = 0.0;
        let mut sailed = 0.0;
        let mut tacks_left = self.config.max_tacks;
        let mut course: Option<f64> = None;
        let mut points: Vec<PathPoint> = Vec::new();
        let mut tacks: Vec<TackEvent> = Vec::new();
        let mut outcome = LegOutcome::IterationLimit;
        let mut iterations = 0;

        while iterations < self.config.max_iterations {
            if cancel.is_some_and(|flag| flag.load(Ordering::Relaxed)) {
                outcome = LegOutcome::Cancelled;
                break;
            }

            if calculate_distance(&position, &target) < self.config.arrival_threshold_m {
                outcome = LegOutcome::Arrived;
                break;
            }

            let Some(decision) = self.solver.solve(self.model, self.wind_field, &position, &target, course) else {
                warn!(
                    "No wind data at ({:.5}, {:.5}), aborting leg after {} steps",
                    position.lat, position.lon, iterations
                );
                outcome = LegOutcome::Aborted;
                break;
            };
            iterations += 1;

            let wind = decision.wind_sample;
            // Any change of wind side is a tack or jibe, direct reaches included
            let changes_side = decision.tack_needed
                || course.is_some_and(|c| {
                    VmgSolver::wind_side(c, wind.direction)
                        != VmgSolver::wind_side(decision.optimal_course, wind.direction)
                });
            let tacking = changes_side && tacks_left > 0;

            let (steer, speed) = if changes_side && !tacking {
                // Out of tacks: stay on the current side of the wind
                debug!("Tack budget spent at ({:.5}, {:.5}), holding side", position.lat, position.lon);
                if decision.tack_needed {
                    let held_speed = self.model.speed_knots(wind.speed, decision.held_course - wind.direction);
                    (decision.held_course, held_speed)
                } else {
                    let starboard = !VmgSolver::wind_side(decision.optimal_course, wind.direction);
                    VmgSolver::best_on_side(self.model, &wind, decision.bearing_to_target, starboard)
                }
            } else {
                (decision.optimal_course, decision.boat_speed)
            };
            let is_upwind = normalize_relative(steer - wind.direction).abs() < 90.0;

            if tacking {
                tacks_left -= 1;
                tacks.push(TackEvent {
                    lat: position.lat,
                    lon: position.lon,
                    elapsed_time: elapsed,
                    is_upwind,
                    path_index: points.len(),
                });
            }

            points.push(PathPoint {
                lat: position.lat,
                lon: position.lon,
                course: steer,
                speed,
                elapsed_time: elapsed,
                wind_direction: wind.direction,
                wind_speed: wind.speed,
                is_upwind,
            });

            position = advance_equirectangular(&position, steer, step);
            elapsed += travel_time(step, speed);
            sailed += step;
            course = Some(steer);
        }

        if outcome == LegOutcome::IterationLimit
            && calculate_distance(&position, &target) < self.config.arrival_threshold_m
        {
            outcome = LegOutcome::Arrived;
        }

        match (outcome, points.last().copied()) {
            (LegOutcome::Arrived, last) => {
                // Close the path at the arrival position
                let wind = self.wind_field.wind_at(&position);
                points.push(PathPoint {
                    lat: position.lat,
                    lon: position.lon,
                    course: last.map_or(0.0, |p| p.course),
                    speed: last.map_or(0.0, |p| p.speed),
                    elapsed_time: elapsed,
                    wind_direction: wind.map_or_else(|| last.map_or(0.0, |p| p.wind_direction), |w| w.direction),
                    wind_speed: wind.map_or_else(|| last.map_or(0.0, |p| p.wind_speed), |w| w.speed),
                    is_upwind: last.is_some_and(|p| p.is_upwind),
                });
            }
            (_, Some(last)) => {
                // Pin the path to the target even though the simulation stopped short
                points.push(PathPoint { lat: target.lat, lon: target.lon, ..last });
            }
            (_, None) => {}
        }

        let average_speed = if elapsed > 0.0 {
            (sailed / elapsed) / KNOTS_TO_MS
        } else {
            0.0
        };

        info!(
            "Leg ({:.4}, {:.4}) -> ({:.4}, {:.4}): {:?} after {} steps, {} tacks, {:.0}s",
            start.lat, start.lon, target.lat, target.lon, outcome, iterations, tacks.len(), elapsed
        );

        LegResult {
            start,
            target,
            tack_count: tacks.len(),
            points,
            tacks,
            outcome,
            total_time: elapsed,
            total_distance: sailed,
            average_speed,
            iterations,
        }
    }
}

use chrono::{DateTime, TimeDelta, Utc};
use log::{info, warn};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::engine::models::Coordinate;
use crate::engine::navigation::{calculate_bearing, midpoint, normalize_relative};
use crate::engine::planner::{LegResult, TackAwarePathPlanner};
use crate::error::{PlanningError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LegType {
    Upwind,
    Downwind,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Leg {
    pub index: usize,
    pub start_waypoint: Coordinate,
    pub end_waypoint: Coordinate,
    pub path: LegResult,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub leg_type: LegType,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RouteResult {
    pub departure: DateTime<Utc>,
    pub legs: Vec<Leg>,
    /// Seconds
    pub total_time: f64,
    /// Meters
    pub total_distance: f64,
    pub total_tack_count: usize,
}

impl RouteResult {
    /// True when every leg reached its end waypoint
    pub fn is_complete(&self) -> bool {
        self.legs.iter().all(|leg| leg.path.arrived())
    }

    pub fn arrival(&self) -> DateTime<Utc> {
        self.legs.last().map_or(self.departure, |leg| leg.end_time)
    }
}

/// `seconds` after `start`, saturating at the latest instant chrono can hold.
fn offset_time(start: DateTime<Utc>, seconds: f64) -> DateTime<Utc> {
    if seconds.is_nan() || seconds < 0.0 {
        warn!("Unusable leg time {} s, keeping the leg start time", seconds);
        return start;
    }
    let millis = (seconds * 1000.0).round();
    let end = if millis < i64::MAX as f64 {
        TimeDelta::try_milliseconds(millis as i64).and_then(|delta| start.checked_add_signed(delta))
    } else {
        None
    };
    end.unwrap_or_else(|| {
        warn!("Leg time {:.3e} s runs past the calendar, saturating", seconds);
        DateTime::<Utc>::MAX_UTC
    })
}

/// Plans every leg of a course with one path planner.
pub struct RouteComposer<'p, 'a> {
    planner: &'p TackAwarePathPlanner<'a>,
}

impl<'p, 'a> RouteComposer<'p, 'a> {
    pub fn new(planner: &'p TackAwarePathPlanner<'a>) -> Self {
        Self { planner }
    }

    /// Upwind when the wind at the leg midpoint blows from within 90 deg of the leg bearing.
    fn classify(&self, start: &Coordinate, end: &Coordinate, path: &LegResult) -> LegType {
        let bearing = calculate_bearing(start, end);
        match self.planner.wind_field.wind_at(&midpoint(start, end)) {
            Some(wind) if normalize_relative(bearing - wind.direction).abs() < 90.0 => LegType::Upwind,
            Some(_) => LegType::Downwind,
            None => match path.points.first() {
                Some(p) if p.is_upwind => LegType::Upwind,
                _ => LegType::Downwind,
            },
        }
    }

    pub fn compose(&self, waypoints: &[Coordinate], departure: DateTime<Utc>) -> Result<RouteResult> {
        if waypoints.len() < 2 {
            return Err(PlanningError::InvalidCourse { waypoints: waypoints.len() });
        }

        // Legs share nothing but read-only inputs, so plan them side by side
        let paths: Vec<LegResult> = waypoints
            .par_windows(2)
            .map(|pair| self.planner.plan(pair[0], pair[1]))
            .collect();

        let mut legs = Vec::with_capacity(paths.len());
        let mut clock = departure;
        for (index, (pair, path)) in waypoints.windows(2).zip(paths).enumerate() {
            let start_time = clock;
            let end_time = offset_time(start_time, path.total_time);
            clock = end_time;
            legs.push(Leg {
                index,
                start_waypoint: pair[0],
                end_waypoint: pair[1],
                leg_type: self.classify(&pair[0], &pair[1], &path),
                path,
                start_time,
                end_time,
            });
        }

        let total_time = legs.iter().map(|l| l.path.total_time).sum();
        let total_distance = legs.iter().map(|l| l.path.total_distance).sum();
        let total_tack_count = legs.iter().map(|l| l.path.tack_count).sum();

        let route = RouteResult { departure, legs, total_time, total_distance, total_tack_count };
        info!(
            "Route over {} waypoints: {:.0}s, {:.0}m, {} tacks, complete: {}",
            waypoints.len(),
            route.total_time,
            route.total_distance,
            route.total_tack_count,
            route.is_complete()
        );
        Ok(route)
    }
}

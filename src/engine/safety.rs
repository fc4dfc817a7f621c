//! Post-hoc evaluation of planned legs and routes: obstacle/tack clearance and
//! a strategic risk score. Nothing here mutates its inputs.

use serde::{Deserialize, Serialize};

use crate::config::{RiskPolicy, SafetyConfig};
use crate::engine::models::Coordinate;
use crate::engine::navigation::calculate_distance;
use crate::engine::planner::LegResult;
use crate::engine::route::{Leg, LegType, RouteResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ViolationKind {
    /// A path point passes too close to an obstacle
    Obstacle,
    /// A tack sits too close to a neighbouring path point
    TackClearance,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SafetyViolation {
    pub kind: ViolationKind,
    /// Leg index, set for route-level checks
    pub leg: Option<usize>,
    /// Path point index for obstacles, tack index for tack clearance
    pub index: usize,
    pub lat: f64,
    pub lon: f64,
    pub distance_m: f64,
    pub threshold_m: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SafetyReport {
    pub is_safe: bool,
    pub violations: Vec<SafetyViolation>,
}

impl SafetyReport {
    fn from_violations(violations: Vec<SafetyViolation>) -> Self {
        Self { is_safe: violations.is_empty(), violations }
    }
}

/// Checks a leg's path against obstacles and its tacks against their neighbours.
pub fn check_path_safety(leg: &LegResult, config: &SafetyConfig, obstacles: &[Coordinate]) -> SafetyReport {
    let mut violations = Vec::new();

    for (index, point) in leg.points.iter().enumerate() {
        let position = point.coordinate();
        for obstacle in obstacles {
            let distance_m = calculate_distance(&position, obstacle);
            if distance_m < config.safety_margin_m {
                violations.push(SafetyViolation {
                    kind: ViolationKind::Obstacle,
                    leg: None,
                    index,
                    lat: point.lat,
                    lon: point.lon,
                    distance_m,
                    threshold_m: config.safety_margin_m,
                });
            }
        }
    }

    for (index, tack) in leg.tacks.iter().enumerate() {
        let position = tack.coordinate();
        let neighbours = [
            tack.path_index.checked_sub(1).and_then(|i| leg.points.get(i)),
            leg.points.get(tack.path_index + 1),
        ];
        for neighbour in neighbours.into_iter().flatten() {
            let distance_m = calculate_distance(&position, &neighbour.coordinate());
            if distance_m < config.min_tack_clearance_m {
                violations.push(SafetyViolation {
                    kind: ViolationKind::TackClearance,
                    leg: None,
                    index,
                    lat: tack.lat,
                    lon: tack.lon,
                    distance_m,
                    threshold_m: config.min_tack_clearance_m,
                });
            }
        }
    }

    SafetyReport::from_violations(violations)
}

pub fn check_route_safety(route: &RouteResult, config: &SafetyConfig, obstacles: &[Coordinate]) -> SafetyReport {
    let violations = route
        .legs
        .iter()
        .flat_map(|leg| {
            check_path_safety(&leg.path, config, obstacles)
                .violations
                .into_iter()
                .map(move |v| SafetyViolation { leg: Some(leg.index), ..v })
        })
        .collect();
    SafetyReport::from_violations(violations)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TacticalDifficulty {
    Easy,
    Medium,
    Hard,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum RiskLevel {
    Low,
    Moderate,
    High,
}

impl RiskLevel {
    pub fn from_score(score: f64) -> Self {
        if score < 33.0 {
            RiskLevel::Low
        } else if score < 66.0 {
            RiskLevel::Moderate
        } else {
            RiskLevel::High
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LegRisk {
    pub leg: usize,
    pub upwind: f64,
    pub tacks: f64,
    pub distance: f64,
    pub wind_variability: f64,
    pub difficulty: f64,
    /// Weighted blend in [0, 100]
    pub score: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiskReport {
    pub overall_risk_score: f64,
    pub risk_level: RiskLevel,
    pub legs: Vec<LegRisk>,
}

fn leg_risk(leg: &Leg, wind_variability: f64, difficulty: TacticalDifficulty, policy: &RiskPolicy) -> LegRisk {
    let upwind = match leg.leg_type {
        LegType::Upwind => policy.upwind_score,
        LegType::Downwind => policy.downwind_score,
    };
    let tacks = (leg.path.tack_count as f64 * policy.points_per_tack).min(policy.tack_cap);
    let distance = (leg.path.total_distance / 1000.0 * policy.points_per_km).min(policy.distance_cap);
    let wind_variability = if wind_variability.is_finite() { wind_variability.clamp(0.0, 100.0) } else { 0.0 };
    let difficulty = match difficulty {
        TacticalDifficulty::Easy => policy.easy_score,
        TacticalDifficulty::Medium => policy.medium_score,
        TacticalDifficulty::Hard => policy.hard_score,
    };

    let score = policy.upwind_weight * upwind
        + policy.tack_weight * tacks
        + policy.distance_weight * distance
        + policy.wind_variability_weight * wind_variability
        + policy.difficulty_weight * difficulty;

    LegRisk {
        leg: leg.index,
        upwind,
        tacks,
        distance,
        wind_variability,
        difficulty,
        score: if score.is_finite() { score.clamp(0.0, 100.0) } else { 0.0 },
    }
}

/// Scores the strategic risk of a route on a 0-100 scale.
pub fn evaluate_risk(
    route: &RouteResult,
    wind_variability: f64,
    difficulty: TacticalDifficulty,
    policy: &RiskPolicy,
) -> RiskReport {
    let legs: Vec<LegRisk> = route
        .legs
        .iter()
        .map(|leg| leg_risk(leg, wind_variability, difficulty, policy))
        .collect();

    let overall = if legs.is_empty() {
        0.0
    } else {
        let max = legs.iter().map(|l| l.score).fold(0.0, f64::max);
        let mean = legs.iter().map(|l| l.score).sum::<f64>() / legs.len() as f64;
        let w = policy.max_leg_weight.clamp(0.0, 1.0);
        (w * max + (1.0 - w) * mean).clamp(0.0, 100.0)
    };

    RiskReport { overall_risk_score: overall, risk_level: RiskLevel::from_score(overall), legs }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::planner::{LegOutcome, PathPoint, TackEvent};
    use chrono::Utc;

    fn point(lat: f64, lon: f64) -> PathPoint {
        PathPoint {
            lat,
            lon,
            course: 0.0,
            speed: 5.0,
            elapsed_time: 0.0,
            wind_direction: 0.0,
            wind_speed: 10.0,
            is_upwind: true,
        }
    }

    fn leg_result(points: Vec<PathPoint>, tacks: Vec<TackEvent>, distance: f64) -> LegResult {
        LegResult {
            start: points.first().map_or(Coordinate::new(0.0, 0.0), |p| p.coordinate()),
            target: points.last().map_or(Coordinate::new(0.0, 0.0), |p| p.coordinate()),
            tack_count: tacks.len(),
            points,
            tacks,
            outcome: LegOutcome::Arrived,
            total_time: 600.0,
            total_distance: distance,
            average_speed: 5.0,
            iterations: 3,
        }
    }

    fn route_of(legs: Vec<(LegResult, LegType)>) -> RouteResult {
        let now = Utc::now();
        RouteResult {
            departure: now,
            total_time: legs.iter().map(|(l, _)| l.total_time).sum(),
            total_distance: legs.iter().map(|(l, _)| l.total_distance).sum(),
            total_tack_count: legs.iter().map(|(l, _)| l.tack_count).sum(),
            legs: legs
                .into_iter()
                .enumerate()
                .map(|(index, (path, leg_type))| Leg {
                    index,
                    start_waypoint: path.start,
                    end_waypoint: path.target,
                    path,
                    start_time: now,
                    end_time: now,
                    leg_type,
                })
                .collect(),
        }
    }

    #[test]
    fn test_obstacle_violation() {
        // ~111 m between points along a meridian
        let leg = leg_result(vec![point(45.0, -1.0), point(45.001, -1.0), point(45.002, -1.0)], vec![], 222.0);
        let obstacle = Coordinate::new(45.0011, -1.0);

        let report = check_path_safety(&leg, &SafetyConfig::default(), &[obstacle]);
        assert!(!report.is_safe);
        assert_eq!(report.violations.len(), 1);
        let v = report.violations[0];
        assert_eq!(v.kind, ViolationKind::Obstacle);
        assert_eq!(v.index, 1);
        assert!(v.distance_m < 50.0);
        assert_eq!(v.threshold_m, 50.0);

        let clear = check_path_safety(&leg, &SafetyConfig::default(), &[Coordinate::new(46.0, -1.0)]);
        assert!(clear.is_safe);
        assert!(check_path_safety(&leg, &SafetyConfig::default(), &[]).is_safe);
    }

    #[test]
    fn test_tack_clearance() {
        let points = vec![point(45.0, -1.0), point(45.0001, -1.0), point(45.002, -1.0)];
        let tack = TackEvent { lat: 45.0001, lon: -1.0, elapsed_time: 10.0, is_upwind: true, path_index: 1 };
        let leg = leg_result(points, vec![tack], 222.0);

        let report = check_path_safety(&leg, &SafetyConfig::default(), &[]);
        // ~11 m behind, ~211 m ahead
        assert_eq!(report.violations.len(), 1);
        assert_eq!(report.violations[0].kind, ViolationKind::TackClearance);
        assert_eq!(report.violations[0].index, 0);

        let relaxed = SafetyConfig { min_tack_clearance_m: 5.0, ..SafetyConfig::default() };
        assert!(check_path_safety(&leg, &relaxed, &[]).is_safe);
    }

    #[test]
    fn test_route_safety_tags_legs() {
        let a = leg_result(vec![point(45.0, -1.0), point(45.01, -1.0)], vec![], 1000.0);
        let b = leg_result(vec![point(45.01, -1.0), point(45.02, -1.0)], vec![], 1000.0);
        let route = route_of(vec![(a, LegType::Upwind), (b, LegType::Upwind)]);

        let report = check_route_safety(&route, &SafetyConfig::default(), &[Coordinate::new(45.02, -1.0)]);
        assert!(!report.is_safe);
        assert!(report.violations.iter().all(|v| v.leg == Some(1)));
    }

    #[test]
    fn test_leg_risk_blend() {
        let tacks = (0..2)
            .map(|i| TackEvent { lat: 45.0, lon: -1.0, elapsed_time: 0.0, is_upwind: true, path_index: i })
            .collect();
        let leg = leg_result(vec![point(45.0, -1.0), point(45.01, -1.0)], tacks, 3000.0);
        let route = route_of(vec![(leg, LegType::Upwind)]);

        let report = evaluate_risk(&route, 40.0, TacticalDifficulty::Medium, &RiskPolicy::default());
        // 0.3*60 + 0.2*30 + 0.1*30 + 0.2*40 + 0.2*50
        assert!((report.legs[0].score - 45.0).abs() < 1e-9);
        assert!((report.overall_risk_score - 45.0).abs() < 1e-9);
        assert_eq!(report.risk_level, RiskLevel::Moderate);
    }

    #[test]
    fn test_risk_caps_and_route_weighting() {
        let many_tacks = (0..20)
            .map(|i| TackEvent { lat: 45.0, lon: -1.0, elapsed_time: 0.0, is_upwind: true, path_index: i })
            .collect();
        let hard = leg_result(vec![point(45.0, -1.0)], many_tacks, 100_000.0);
        let easy = leg_result(vec![point(45.0, -1.0)], vec![], 0.0);
        let route = route_of(vec![(hard, LegType::Upwind), (easy, LegType::Downwind)]);

        let report = evaluate_risk(&route, 500.0, TacticalDifficulty::Hard, &RiskPolicy::default());
        // 0.3*60 + 0.2*80 + 0.1*50 + 0.2*100 + 0.2*80 = 75
        assert!((report.legs[0].score - 75.0).abs() < 1e-9);
        // 0.3*30 + 0 + 0 + 0.2*100 + 0.2*80 = 45
        assert!((report.legs[1].score - 45.0).abs() < 1e-9);
        assert!((report.overall_risk_score - (0.6 * 75.0 + 0.4 * 60.0)).abs() < 1e-9);
        assert_eq!(report.risk_level, RiskLevel::High);
    }

    #[test]
    fn test_risk_bounded() {
        let leg = leg_result(vec![point(45.0, -1.0)], vec![], 1.0e9);
        let route = route_of(vec![(leg, LegType::Upwind)]);
        for variability in [f64::NEG_INFINITY, -50.0, 0.0, 55.0, 1.0e6, f64::NAN] {
            for difficulty in [TacticalDifficulty::Easy, TacticalDifficulty::Medium, TacticalDifficulty::Hard] {
                let r = evaluate_risk(&route, variability, difficulty, &RiskPolicy::default());
                assert!((0.0..=100.0).contains(&r.overall_risk_score));
            }
        }

        let empty = route_of(vec![]);
        assert_eq!(evaluate_risk(&empty, 50.0, TacticalDifficulty::Hard, &RiskPolicy::default()).overall_risk_score, 0.0);
    }
}

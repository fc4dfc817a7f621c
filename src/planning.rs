//! The public planning surface: boat registry, wind field, decision cache and
//! the leg/route/evaluation entry points.

use std::collections::HashMap;
use std::sync::atomic::AtomicBool;
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};
use log::{debug, info, warn};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::config::EngineConfig;
use crate::engine::models::{Coordinate, WindFieldQuery};
use crate::engine::planner::{LegResult, TackAwarePathPlanner};
use crate::engine::polar::PolarPerformanceModel;
use crate::engine::route::{RouteComposer, RouteResult};
use crate::engine::safety::{self, RiskReport, SafetyReport, TacticalDifficulty};
use crate::engine::vmg::{VmgDecision, VmgSolver};
use crate::error::{PlanningError, Result};
use crate::parsers::polars::PolarInput;

/// Decision cache key: boat id plus position and target at 6-decimal precision.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct DecisionKey {
    boat_id: String,
    cells: [i64; 4],
}

impl DecisionKey {
    fn new(boat_id: &str, position: &Coordinate, target: &Coordinate) -> Self {
        let round = |v: f64| (v * 1e6).round() as i64;
        Self {
            boat_id: boat_id.to_string(),
            cells: [round(position.lat), round(position.lon), round(target.lat), round(target.lon)],
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DecisionQuery {
    pub position: Coordinate,
    pub target: Coordinate,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LegQuery {
    pub start: Coordinate,
    pub target: Coordinate,
    pub max_tacks: usize,
}

pub struct PlanningEngine {
    config: EngineConfig,
    boats: HashMap<String, Arc<PolarPerformanceModel>>,
    wind_field: Option<Arc<dyn WindFieldQuery>>,
    cache: Mutex<HashMap<DecisionKey, VmgDecision>>,
}

impl Default for PlanningEngine {
    fn default() -> Self {
        Self::new(EngineConfig::default())
    }
}

impl PlanningEngine {
    pub fn new(config: EngineConfig) -> Self {
        Self {
            config,
            boats: HashMap::new(),
            wind_field: None,
            cache: Mutex::new(HashMap::new()),
        }
    }

    pub fn with_wind_field(mut self, wind_field: Arc<dyn WindFieldQuery>) -> Self {
        self.set_wind_field(wind_field);
        self
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Replaces the wind field; cached decisions are dropped.
    pub fn set_wind_field(&mut self, wind_field: Arc<dyn WindFieldQuery>) {
        self.wind_field = Some(wind_field);
        self.clear_cache();
        info!("Wind field updated, decision cache cleared");
    }

    /// Loads (or replaces) a boat's polar; cached decisions are dropped.
    pub fn register(&mut self, boat_id: &str, polar: PolarInput) -> Result<()> {
        let model = PolarPerformanceModel::load(boat_id, polar)?;
        self.boats.insert(boat_id.to_string(), Arc::new(model));
        self.clear_cache();
        Ok(())
    }

    pub fn has(&self, boat_id: &str) -> bool {
        self.boats.contains_key(boat_id)
    }

    pub fn boat_ids(&self) -> Vec<&str> {
        let mut ids: Vec<&str> = self.boats.keys().map(String::as_str).collect();
        ids.sort_unstable();
        ids
    }

    pub fn model(&self, boat_id: &str) -> Result<&PolarPerformanceModel> {
        self.boats
            .get(boat_id)
            .map(Arc::as_ref)
            .ok_or_else(|| PlanningError::UnknownBoatType(boat_id.to_string()))
    }

    fn wind(&self) -> Result<&dyn WindFieldQuery> {
        self.wind_field.as_deref().ok_or(PlanningError::NoWindField)
    }

    fn solver(&self) -> VmgSolver {
        VmgSolver::new(self.config.tack_gain_threshold)
    }

    pub fn clear_cache(&self) {
        if let Ok(mut cache) = self.cache.lock() {
            cache.clear();
        }
    }

    pub fn cache_len(&self) -> usize {
        self.cache.lock().map_or(0, |c| c.len())
    }

    /// Optimal decision at one position; `Ok(None)` when the wind field has no coverage there.
    pub fn decide(
        &self,
        boat_id: &str,
        lat: f64,
        lon: f64,
        target_lat: f64,
        target_lon: f64,
    ) -> Result<Option<VmgDecision>> {
        let model = self.model(boat_id)?;
        let wind = self.wind()?;
        let position = Coordinate::new(lat, lon);
        let target = Coordinate::new(target_lat, target_lon);

        if !self.config.enable_decision_cache {
            return Ok(self.solver().solve(model, wind, &position, &target, None));
        }

        let key = DecisionKey::new(boat_id, &position, &target);
        if let Some(hit) = self.cache.lock().ok().and_then(|c| c.get(&key).copied()) {
            debug!("Decision cache hit for {}", boat_id);
            return Ok(Some(hit));
        }
        let decision = self.solver().solve(model, wind, &position, &target, None);
        if let (Some(d), Ok(mut cache)) = (decision, self.cache.lock()) {
            cache.insert(key, d);
        }
        Ok(decision)
    }

    fn planner<'a>(&'a self, model: &'a PolarPerformanceModel, wind: &'a dyn WindFieldQuery, max_tacks: usize) -> TackAwarePathPlanner<'a> {
        let mut config = self.config.planner;
        config.max_tacks = max_tacks;
        TackAwarePathPlanner::new(model, wind, self.solver(), config)
    }

    pub fn plan_leg(
        &self,
        boat_id: &str,
        start_lat: f64,
        start_lon: f64,
        target_lat: f64,
        target_lon: f64,
        max_tacks: usize,
    ) -> Result<LegResult> {
        let model = self.model(boat_id)?;
        let wind = self.wind()?;
        Ok(self
            .planner(model, wind, max_tacks)
            .plan(Coordinate::new(start_lat, start_lon), Coordinate::new(target_lat, target_lon)))
    }

    /// Like [`plan_leg`](Self::plan_leg), stopping early once `cancel` is set.
    pub fn plan_leg_cancellable(
        &self,
        boat_id: &str,
        start: Coordinate,
        target: Coordinate,
        max_tacks: usize,
        cancel: &AtomicBool,
    ) -> Result<LegResult> {
        let model = self.model(boat_id)?;
        let wind = self.wind()?;
        Ok(self.planner(model, wind, max_tacks).plan_with_cancel(start, target, Some(cancel)))
    }

    pub fn plan_route(&self, boat_id: &str, waypoints: &[Coordinate]) -> Result<RouteResult> {
        self.plan_route_from(boat_id, waypoints, Utc::now())
    }

    pub fn plan_route_from(
        &self,
        boat_id: &str,
        waypoints: &[Coordinate],
        departure: DateTime<Utc>,
    ) -> Result<RouteResult> {
        if waypoints.len() < 2 {
            return Err(PlanningError::InvalidCourse { waypoints: waypoints.len() });
        }
        let model = self.model(boat_id)?;
        let wind = self.wind()?;
        let planner = self.planner(model, wind, self.config.planner.max_tacks);
        RouteComposer::new(&planner).compose(waypoints, departure)
    }

    /// Decisions for many independent queries, in input order. Failed items are `None`.
    pub fn decide_batch(&self, boat_id: &str, queries: &[DecisionQuery]) -> Result<Vec<Option<VmgDecision>>> {
        let model = self.model(boat_id)?;
        let wind = self.wind()?;
        let solver = self.solver();

        Ok(queries
            .par_iter()
            .enumerate()
            .map(|(i, q)| {
                solver
                    .solve(model, wind, &q.position, &q.target, None)
                    .ok_or(PlanningError::NoWindCoverage { lat: q.position.lat, lon: q.position.lon })
                    .inspect_err(|e| warn!("Batch decision {} failed: {}", i, e))
                    .ok()
            })
            .collect())
    }

    /// Plans many independent legs in parallel, in input order. Legs that could
    /// not start (no wind at the start) are `None`.
    pub fn plan_legs_batch(&self, boat_id: &str, queries: &[LegQuery]) -> Result<Vec<Option<LegResult>>> {
        let model = self.model(boat_id)?;
        let wind = self.wind()?;

        Ok(queries
            .par_iter()
            .enumerate()
            .map(|(i, q)| {
                let leg = self.planner(model, wind, q.max_tacks).plan(q.start, q.target);
                if leg.points.is_empty() {
                    warn!(
                        "Batch leg {} failed: {}",
                        i,
                        PlanningError::NoWindCoverage { lat: q.start.lat, lon: q.start.lon }
                    );
                    None
                } else {
                    Some(leg)
                }
            })
            .collect())
    }

    pub fn check_path_safety(&self, leg: &LegResult, margin_m: Option<f64>, obstacles: &[Coordinate]) -> SafetyReport {
        let mut config = self.config.safety;
        if let Some(margin) = margin_m {
            config.safety_margin_m = margin;
        }
        safety::check_path_safety(leg, &config, obstacles)
    }

    pub fn check_route_safety(&self, route: &RouteResult, obstacles: &[Coordinate]) -> SafetyReport {
        safety::check_route_safety(route, &self.config.safety, obstacles)
    }

    pub fn evaluate_risk(
        &self,
        route: &RouteResult,
        wind_variability: f64,
        difficulty: TacticalDifficulty,
    ) -> RiskReport {
        safety::evaluate_risk(route, wind_variability, difficulty, &self.config.risk)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::models::WindSample;
    use crate::engine::polar::tests::sample_polar;

    fn engine(cache: bool) -> PlanningEngine {
        let config = EngineConfig { enable_decision_cache: cache, ..EngineConfig::default() };
        let wind = |_: &Coordinate| Some(WindSample::new(0.0, 10.0, 1.0));
        let mut engine = PlanningEngine::new(config).with_wind_field(Arc::new(wind));
        engine.register("keelboat", sample_polar()).unwrap();
        engine
    }

    #[test]
    fn test_registry() {
        let mut engine = engine(false);
        assert!(engine.has("keelboat"));
        assert!(!engine.has("dinghy"));
        assert_eq!(engine.boat_ids(), vec!["keelboat"]);

        let bad = PolarInput::LongForm(vec![]);
        assert!(matches!(engine.register("dinghy", bad), Err(PlanningError::DataFormat(_))));
        assert!(!engine.has("dinghy"));
    }

    #[test]
    fn test_unknown_boat_and_missing_wind() {
        let engine = engine(false);
        assert_eq!(
            engine.decide("ghost", 45.0, -1.0, 46.0, -1.0).unwrap_err(),
            PlanningError::UnknownBoatType("ghost".into())
        );

        let mut bare = PlanningEngine::default();
        bare.register("keelboat", sample_polar()).unwrap();
        assert_eq!(bare.decide("keelboat", 45.0, -1.0, 46.0, -1.0).unwrap_err(), PlanningError::NoWindField);
        assert_eq!(bare.plan_route("keelboat", &[]).unwrap_err(), PlanningError::InvalidCourse { waypoints: 0 });
    }

    #[test]
    fn test_decision_cache() {
        let engine = engine(true);
        let first = engine.decide("keelboat", 45.0, -1.0, 46.0, -1.0).unwrap().unwrap();
        assert_eq!(engine.cache_len(), 1);
        // Same key at 6-decimal precision
        let second = engine.decide("keelboat", 45.0000001, -1.0, 46.0, -1.0).unwrap().unwrap();
        assert_eq!(first, second);
        assert_eq!(engine.cache_len(), 1);

        engine.decide("keelboat", 45.1, -1.0, 46.0, -1.0).unwrap();
        assert_eq!(engine.cache_len(), 2);
        engine.clear_cache();
        assert_eq!(engine.cache_len(), 0);

        let uncached = self::engine(false);
        uncached.decide("keelboat", 45.0, -1.0, 46.0, -1.0).unwrap();
        assert_eq!(uncached.cache_len(), 0);
    }

    #[test]
    fn test_cache_cleared_on_changes() {
        let mut engine = engine(true);
        engine.decide("keelboat", 45.0, -1.0, 46.0, -1.0).unwrap();
        assert_eq!(engine.cache_len(), 1);
        engine.register("other", sample_polar()).unwrap();
        assert_eq!(engine.cache_len(), 0);

        engine.decide("keelboat", 45.0, -1.0, 46.0, -1.0).unwrap();
        engine.set_wind_field(Arc::new(|_: &Coordinate| Some(WindSample::new(90.0, 10.0, 1.0))));
        assert_eq!(engine.cache_len(), 0);
    }

    #[test]
    fn test_batch_preserves_order() {
        let mut engine = engine(false);
        let patchy = |c: &Coordinate| (c.lat < 50.0).then(|| WindSample::new(0.0, 10.0, 1.0));
        engine.set_wind_field(Arc::new(patchy));

        let queries: Vec<DecisionQuery> = (0..12)
            .map(|i| DecisionQuery {
                position: Coordinate::new(44.0 + i as f64 * 0.75, -1.0),
                target: Coordinate::new(44.0 + i as f64 * 0.75, 0.0),
            })
            .collect();
        let results = engine.decide_batch("keelboat", &queries).unwrap();
        assert_eq!(results.len(), 12);
        for (i, r) in results.iter().enumerate() {
            let lat = 44.0 + i as f64 * 0.75;
            assert_eq!(r.is_some(), lat < 50.0, "query {}", i);
            if let Some(d) = r {
                assert!(d.is_direct);
            }
        }

        let legs = engine
            .plan_legs_batch(
                "keelboat",
                &[
                    LegQuery { start: Coordinate::new(45.0, -1.0), target: Coordinate::new(45.0, -0.97), max_tacks: 5 },
                    LegQuery { start: Coordinate::new(51.0, -1.0), target: Coordinate::new(51.0, -0.97), max_tacks: 5 },
                ],
            )
            .unwrap();
        assert!(legs[0].is_some());
        assert!(legs[1].is_none());
    }

    #[test]
    fn test_safety_margin_override() {
        let engine = engine(false);
        let leg = engine.plan_leg("keelboat", 45.0, -1.0, 45.0, -0.97, 5).unwrap();
        let obstacle = Coordinate::new(45.0008, -0.99);
        let strict = engine.check_path_safety(&leg, Some(500.0), &[obstacle]);
        assert!(!strict.is_safe);
        let loose = engine.check_path_safety(&leg, Some(1.0), &[obstacle]);
        assert!(loose.is_safe);
    }
}

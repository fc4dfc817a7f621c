//! Engine configuration.
//!
//! Every section has a `Default` carrying the stock values, and deserializes
//! with `#[serde(default)]` so a JSON document only needs the fields it
//! overrides.

use serde::{Deserialize, Serialize};

use crate::engine::vmg::DEFAULT_TACK_GAIN_THRESHOLD;
use crate::error::{PlanningError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlannerConfig {
    /// Distance advanced per simulation step (meters)
    pub step_distance_m: f64,
    /// A leg is complete once the boat is closer than this (meters)
    pub arrival_threshold_m: f64,
    pub max_iterations: usize,
    /// Tacks recorded per leg before the boat holds its current tack
    pub max_tacks: usize,
}

impl Default for PlannerConfig {
    fn default() -> Self {
        Self {
            step_distance_m: 250.0,
            arrival_threshold_m: 250.0,
            max_iterations: 200,
            max_tacks: 5,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SafetyConfig {
    /// Minimum distance between any path point and an obstacle (meters)
    pub safety_margin_m: f64,
    /// Minimum distance between a tack and its neighbouring path points (meters)
    pub min_tack_clearance_m: f64,
}

impl Default for SafetyConfig {
    fn default() -> Self {
        Self { safety_margin_m: 50.0, min_tack_clearance_m: 20.0 }
    }
}

/// Weights and caps of the strategic risk score. A tunable heuristic.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RiskPolicy {
    pub upwind_weight: f64,
    pub tack_weight: f64,
    pub distance_weight: f64,
    pub wind_variability_weight: f64,
    pub difficulty_weight: f64,
    pub upwind_score: f64,
    pub downwind_score: f64,
    pub points_per_tack: f64,
    pub tack_cap: f64,
    pub points_per_km: f64,
    pub distance_cap: f64,
    pub easy_score: f64,
    pub medium_score: f64,
    pub hard_score: f64,
    /// Route score = max_leg_weight * max + (1 - max_leg_weight) * mean
    pub max_leg_weight: f64,
}

impl Default for RiskPolicy {
    fn default() -> Self {
        Self {
            upwind_weight: 0.3,
            tack_weight: 0.2,
            distance_weight: 0.1,
            wind_variability_weight: 0.2,
            difficulty_weight: 0.2,
            upwind_score: 60.0,
            downwind_score: 30.0,
            points_per_tack: 15.0,
            tack_cap: 80.0,
            points_per_km: 10.0,
            distance_cap: 50.0,
            easy_score: 20.0,
            medium_score: 50.0,
            hard_score: 80.0,
            max_leg_weight: 0.6,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub planner: PlannerConfig,
    pub safety: SafetyConfig,
    pub risk: RiskPolicy,
    /// VMG gain (knots) required before the planner tacks
    pub tack_gain_threshold: f64,
    pub enable_decision_cache: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            planner: PlannerConfig::default(),
            safety: SafetyConfig::default(),
            risk: RiskPolicy::default(),
            tack_gain_threshold: DEFAULT_TACK_GAIN_THRESHOLD,
            enable_decision_cache: false,
        }
    }
}

impl EngineConfig {
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: Self =
            serde_json::from_str(json).map_err(|e| PlanningError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        let positive = [
            ("planner.step_distance_m", self.planner.step_distance_m),
            ("planner.arrival_threshold_m", self.planner.arrival_threshold_m),
        ];
        for (field, value) in positive {
            if !(value.is_finite() && value > 0.0) {
                return Err(PlanningError::Config(format!("{} must be positive (got {})", field, value)));
            }
        }

        let non_negative = [
            ("safety.safety_margin_m", self.safety.safety_margin_m),
            ("safety.min_tack_clearance_m", self.safety.min_tack_clearance_m),
            ("tack_gain_threshold", self.tack_gain_threshold),
        ];
        for (field, value) in non_negative {
            if !(value.is_finite() && value >= 0.0) {
                return Err(PlanningError::Config(format!("{} must be >= 0 (got {})", field, value)));
            }
        }

        if self.planner.max_iterations == 0 {
            return Err(PlanningError::Config("planner.max_iterations must be at least 1".into()));
        }
        if !(0.0..=1.0).contains(&self.risk.max_leg_weight) {
            return Err(PlanningError::Config(format!(
                "risk.max_leg_weight must be within [0, 1] (got {})",
                self.risk.max_leg_weight
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = EngineConfig::default();
        assert_eq!(config.planner.max_iterations, 200);
        assert_eq!(config.planner.max_tacks, 5);
        assert_eq!(config.safety.safety_margin_m, 50.0);
        assert_eq!(config.safety.min_tack_clearance_m, 20.0);
        assert!(!config.enable_decision_cache);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_json_override() {
        let config = EngineConfig::from_json_str(
            r#"{ "planner": { "max_tacks": 2 }, "enable_decision_cache": true }"#,
        )
        .unwrap();
        assert_eq!(config.planner.max_tacks, 2);
        assert_eq!(config.planner.max_iterations, 200);
        assert!(config.enable_decision_cache);
        assert_eq!(config.risk, RiskPolicy::default());
    }

    #[test]
    fn test_invalid_config_rejected() {
        assert!(matches!(
            EngineConfig::from_json_str(r#"{ "planner": { "step_distance_m": 0 } }"#),
            Err(PlanningError::Config(_))
        ));
        assert!(matches!(
            EngineConfig::from_json_str(r#"{ "planner": { "max_iterations": 0 } }"#),
            Err(PlanningError::Config(_))
        ));
        assert!(matches!(EngineConfig::from_json_str("not json"), Err(PlanningError::Config(_))));
    }
}

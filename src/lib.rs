//! VMG decision engine and tack-aware route planner for sailing vessels.
//!
//! Given a boat's polar table and a queryable wind field, the engine picks the
//! course that maximises velocity made good toward a target, simulates legs
//! step by step with a bounded tack budget, composes multi-leg routes, and
//! scores the result for safety and strategic risk.

pub mod config;
pub mod engine;
pub mod error;
pub mod parsers;
pub mod planning;

pub use config::{EngineConfig, PlannerConfig, RiskPolicy, SafetyConfig};
pub use engine::models::{Coordinate, WindFieldQuery, WindGrid, WindSample};
pub use engine::planner::{LegOutcome, LegResult, PathPoint, TackEvent};
pub use engine::polar::{OptimalAngle, PolarPerformanceModel, SpeedEstimate, SpeedSource};
pub use engine::route::{Leg, LegType, RouteResult};
pub use engine::safety::{RiskLevel, RiskReport, SafetyReport, SafetyViolation, TacticalDifficulty, ViolationKind};
pub use engine::vmg::{VmgDecision, VmgSolver};
pub use error::{PlanningError, Result};
pub use parsers::polars::{PolarInput, PolarSample, PolarTable};
pub use planning::{DecisionQuery, LegQuery, PlanningEngine};

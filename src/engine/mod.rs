pub mod models;
pub mod navigation;
pub mod planner;
pub mod polar;
pub mod route;
pub mod safety;
pub mod vmg;

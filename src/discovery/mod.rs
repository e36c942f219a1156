//! Reference discovery: query planning, registry aggregation, and selection.

pub mod aggregator;
pub mod planner;
pub mod selector;

pub use aggregator::Aggregator;
pub use planner::{PlannerConfig, QueryPlanner};
pub use selector::select;

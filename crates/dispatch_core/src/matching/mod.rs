pub mod cost;
pub mod hungarian;
pub mod matcher;
pub mod types;

pub use cost::{CostMatrix, Leg, RouteMatrix};
pub use hungarian::solve_assignment;
pub use matcher::AssignmentMatcher;
pub use types::{
    Driver, MatchExplanation, MatchMetrics, MatchOutcome, MatchResult, RejectedDriver, Rider,
};

//! Fleet dispatch core: rider/driver assignment, zone rebalancing, and a
//! learned rebalancing policy benchmarked against a greedy reference.
//!
//! - [`matching::AssignmentMatcher`] builds a rider × driver cost matrix from
//!   route queries and solves the assignment exactly, with a UCB1
//!   [`bandit::WeightBandit`] tuning the ETA/distance weighting.
//! - [`flow::FlowRebalancer`] relocates surplus drivers with min-cost max-flow.
//! - [`environment::RebalancingEnvironment`], [`agent::RebalancingAgent`] and
//!   [`training::run_rebalancing`] learn a relocation policy and compare it
//!   with [`oracle::GreedyOracle`].

pub mod agent;
pub mod bandit;
pub mod config;
pub mod environment;
pub mod error;
pub mod flow;
pub mod matching;
pub mod oracle;
pub mod report;
pub mod routing;
pub mod score;
pub mod spatial;
pub mod training;
pub mod zone;

#[cfg(any(test, feature = "test-helpers"))]
pub mod test_helpers;

pub use config::DispatchConfig;
pub use error::{DispatchError, Result};
pub use zone::{Move, Zone, ZoneSnapshot};

pub mod network;
pub mod rebalancer;

pub use network::{EdgeId, FlowError, FlowNetwork, FlowSummary};
pub use rebalancer::FlowRebalancer;

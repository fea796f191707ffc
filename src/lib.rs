//! Load Hunter - matching core for freight-brokerage dispatch operations
//!
//! Given a stream of incoming freight-load emails (already parsed upstream)
//! and a set of per-vehicle hunt plans, this library decides which loads
//! match which plans and maintains the per-match lifecycle state a dispatch
//! board is built from. Matching is a bounded predicate re-evaluated on data
//! change or poll, not a continuous computation.

pub mod config;
pub mod core;
pub mod models;
pub mod services;

// Re-export commonly used types
pub use self::core::{haversine_miles, HuntMatcher, MatchAggregator, RollingWindow, VehicleTypeTable};
pub use models::{HuntPlan, LoadCandidate, MatchBuckets, MatchRecord, MatchStatus};

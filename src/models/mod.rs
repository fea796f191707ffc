// Model exports
pub mod domain;

pub use domain::{
    HuntPlan, LoadCandidate, LoadStatus, Location, MatchBuckets, MatchRecord, MatchStatus,
    PlanStatus, VehicleTypeMapping,
};

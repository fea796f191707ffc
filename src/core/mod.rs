// Core algorithm exports
pub mod aggregator;
pub mod business_day;
pub mod distance;
pub mod freshness;
pub mod matcher;
pub mod vehicle_types;

pub use aggregator::{AggregationResult, LoadMatch, MatchAggregator, PlanMatchSummary};
pub use business_day::{start_of_business_day, BUSINESS_TIMEZONE};
pub use distance::haversine_miles;
pub use freshness::{is_current, RollingWindow};
pub use matcher::{HuntMatcher, DEFAULT_PICKUP_RADIUS_MILES};
pub use vehicle_types::{VehicleTypeTable, DEFAULT_VEHICLE_TYPES};

// Service exports
pub mod broker_api;
pub mod catalog;
pub mod feed;
pub mod match_store;
pub mod retry;

pub use broker_api::{BrokerApiClient, BrokerApiError, BrokerTables};
pub use catalog::VehicleTypeCatalog;
pub use feed::{FeedError, FeedHandle, MatchFeedManager, MatchSnapshot, RefreshGate};
pub use match_store::{ChangeOp, MatchChange, MatchChangeStream, MatchStore, MatchStoreError};
pub use retry::{with_retry, RetryPolicy};

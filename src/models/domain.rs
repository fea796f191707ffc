use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Lifecycle status of one (hunt plan, load) match.
///
/// Transitions are one-directional business events initiated by a dispatcher
/// (e.g. `active -> bid`, `active -> skipped`); the matching core never
/// recomputes them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(type_name = "match_status", rename_all = "lowercase")]
pub enum MatchStatus {
    Active,
    Skipped,
    Bid,
    Undecided,
    Waitlist,
    Booked,
    Expired,
}

impl MatchStatus {
    pub const ALL: [MatchStatus; 7] = [
        MatchStatus::Active,
        MatchStatus::Skipped,
        MatchStatus::Bid,
        MatchStatus::Undecided,
        MatchStatus::Waitlist,
        MatchStatus::Booked,
        MatchStatus::Expired,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            MatchStatus::Active => "active",
            MatchStatus::Skipped => "skipped",
            MatchStatus::Bid => "bid",
            MatchStatus::Undecided => "undecided",
            MatchStatus::Waitlist => "waitlist",
            MatchStatus::Booked => "booked",
            MatchStatus::Expired => "expired",
        }
    }
}

/// Processing state assigned by the upstream email-ingestion pipeline.
/// Only `new` loads are eligible for matching.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LoadStatus {
    New,
    Processed,
    Ignored,
}

/// Explicit deletion state for hunt plans.
///
/// Replaces the legacy convention of tombstoning a plan by renaming it with a
/// marker prefix; deleted plans are filtered out at the query layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PlanStatus {
    Active,
    Deleted,
}

/// City/state/zip plus optional coordinates for one end of a load.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Location {
    #[serde(default)]
    pub city: Option<String>,
    #[serde(default)]
    pub state: Option<String>,
    #[serde(default)]
    pub zip: Option<String>,
    #[serde(default)]
    pub latitude: Option<f64>,
    #[serde(default)]
    pub longitude: Option<f64>,
}

impl Location {
    /// Both coordinates, or `None` if either is missing. Callers use this to
    /// skip radius checks for incomplete geocoding.
    pub fn coords(&self) -> Option<(f64, f64)> {
        match (self.latitude, self.longitude) {
            (Some(lat), Some(lon)) => Some((lat, lon)),
            _ => None,
        }
    }
}

/// One parsed freight-load posting, produced by the email-ingestion
/// collaborator. Immutable once created except for status transitions
/// performed outside this core.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoadCandidate {
    pub id: Uuid,
    #[serde(rename = "tenantId")]
    pub tenant_id: Uuid,
    #[serde(rename = "receivedAt")]
    pub received_at: DateTime<Utc>,
    #[serde(rename = "expiresAt", default)]
    pub expires_at: Option<DateTime<Utc>>,
    #[serde(default = "default_load_status")]
    pub status: LoadStatus,
    pub origin: Location,
    #[serde(default)]
    pub destination: Location,
    #[serde(rename = "loadType", default)]
    pub load_type: Option<String>,
    #[serde(rename = "pickupAt", default)]
    pub pickup_at: Option<DateTime<Utc>>,
}

fn default_load_status() -> LoadStatus {
    LoadStatus::New
}

impl LoadCandidate {
    /// Pickup date as UTC calendar components. Date-only comparisons always
    /// go through this, so the compared day cannot shift with the ambient
    /// locale.
    pub fn pickup_date_utc(&self) -> Option<NaiveDate> {
        self.pickup_at.map(|t| t.date_naive())
    }
}

/// A saved search for one vehicle: the criteria a dispatcher hunts loads
/// with.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HuntPlan {
    pub id: Uuid,
    #[serde(rename = "tenantId")]
    pub tenant_id: Uuid,
    #[serde(rename = "vehicleId")]
    pub vehicle_id: Uuid,
    pub name: String,
    #[serde(default = "default_plan_status")]
    pub status: PlanStatus,
    #[serde(default)]
    pub enabled: bool,
    #[serde(rename = "vehicleSizes", default)]
    pub vehicle_sizes: Vec<String>,
    #[serde(rename = "pickupZip", default)]
    pub pickup_zip: Option<String>,
    #[serde(rename = "pickupRadiusMiles", default)]
    pub pickup_radius_miles: Option<f64>,
    #[serde(rename = "huntLatitude", default)]
    pub hunt_latitude: Option<f64>,
    #[serde(rename = "huntLongitude", default)]
    pub hunt_longitude: Option<f64>,
    #[serde(rename = "destinationZip", default)]
    pub destination_zip: Option<String>,
    #[serde(rename = "destinationRadiusMiles", default)]
    pub destination_radius_miles: Option<f64>,
    #[serde(rename = "availableAt", default)]
    pub available_at: Option<DateTime<Utc>>,
    #[serde(rename = "createdAt", default)]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(rename = "updatedAt", default)]
    pub updated_at: Option<DateTime<Utc>>,
}

fn default_plan_status() -> PlanStatus {
    PlanStatus::Active
}

impl HuntPlan {
    /// Coordinates resolved from the pickup zip, when geocoding succeeded.
    pub fn hunt_coords(&self) -> Option<(f64, f64)> {
        match (self.hunt_latitude, self.hunt_longitude) {
            (Some(lat), Some(lon)) => Some((lat, lon)),
            _ => None,
        }
    }

    /// Desired available date as UTC calendar components.
    pub fn available_date_utc(&self) -> Option<NaiveDate> {
        self.available_at.map(|t| t.date_naive())
    }

    /// Whether this plan participates in matching at all.
    pub fn is_matchable(&self) -> bool {
        self.enabled && self.status == PlanStatus::Active
    }
}

/// Outcome of matching one load against one hunt plan, persisted once a
/// dispatcher acts on it. A given (plan, load) pair has at most one live
/// record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MatchRecord {
    pub id: Uuid,
    #[serde(rename = "tenantId")]
    pub tenant_id: Uuid,
    #[serde(rename = "planId")]
    pub plan_id: Uuid,
    #[serde(rename = "loadId")]
    pub load_id: Uuid,
    pub status: MatchStatus,
    #[serde(rename = "createdAt")]
    pub created_at: DateTime<Utc>,
    #[serde(rename = "updatedAt")]
    pub updated_at: DateTime<Utc>,
}

/// One row of the tenant-configurable vehicle-size vocabulary table.
/// Administrator-maintained; read-only to the matching core.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VehicleTypeMapping {
    #[serde(rename = "tenantId")]
    pub tenant_id: Uuid,
    #[serde(rename = "originalLabel")]
    pub original_label: String,
    #[serde(rename = "canonicalLabel")]
    pub canonical_label: String,
}

/// Match records for one tenant partitioned by lifecycle status.
///
/// The skipped, booked and expired partitions are additionally bounded to
/// the current Eastern business day by the store.
#[derive(Debug, Clone, Default, Serialize)]
pub struct MatchBuckets {
    pub active: Vec<MatchRecord>,
    pub skipped: Vec<MatchRecord>,
    pub bid: Vec<MatchRecord>,
    pub undecided: Vec<MatchRecord>,
    pub waitlist: Vec<MatchRecord>,
    pub booked: Vec<MatchRecord>,
    pub expired: Vec<MatchRecord>,
}

impl MatchBuckets {
    pub fn total(&self) -> usize {
        self.active.len()
            + self.skipped.len()
            + self.bid.len()
            + self.undecided.len()
            + self.waitlist.len()
            + self.booked.len()
            + self.expired.len()
    }

    pub fn bucket_mut(&mut self, status: MatchStatus) -> &mut Vec<MatchRecord> {
        match status {
            MatchStatus::Active => &mut self.active,
            MatchStatus::Skipped => &mut self.skipped,
            MatchStatus::Bid => &mut self.bid,
            MatchStatus::Undecided => &mut self.undecided,
            MatchStatus::Waitlist => &mut self.waitlist,
            MatchStatus::Booked => &mut self.booked,
            MatchStatus::Expired => &mut self.expired,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_location_coords_requires_both() {
        let mut loc = Location {
            latitude: Some(34.0),
            ..Location::default()
        };
        assert!(loc.coords().is_none());

        loc.longitude = Some(-118.0);
        assert_eq!(loc.coords(), Some((34.0, -118.0)));
    }

    #[test]
    fn test_match_status_serializes_lowercase() {
        for status in MatchStatus::ALL {
            let json = serde_json::to_string(&status).unwrap();
            assert_eq!(json, format!("\"{}\"", status.as_str()));
        }
    }

    #[test]
    fn test_plan_matchable() {
        let plan = HuntPlan {
            id: Uuid::new_v4(),
            tenant_id: Uuid::new_v4(),
            vehicle_id: Uuid::new_v4(),
            name: "Unit 12 - Chicago".to_string(),
            status: PlanStatus::Active,
            enabled: true,
            vehicle_sizes: vec![],
            pickup_zip: None,
            pickup_radius_miles: None,
            hunt_latitude: None,
            hunt_longitude: None,
            destination_zip: None,
            destination_radius_miles: None,
            available_at: None,
            created_at: None,
            updated_at: None,
        };
        assert!(plan.is_matchable());

        let disabled = HuntPlan {
            enabled: false,
            ..plan.clone()
        };
        assert!(!disabled.is_matchable());

        let deleted = HuntPlan {
            status: PlanStatus::Deleted,
            ..plan
        };
        assert!(!deleted.is_matchable());
    }
}

use chrono::{DateTime, Utc};

use crate::core::{
    distance::haversine_miles,
    freshness::{is_current, RollingWindow},
    vehicle_types::VehicleTypeTable,
};
use crate::models::{HuntPlan, LoadCandidate, LoadStatus};

/// Pickup radius applied when a plan leaves it unset or unparsable.
pub const DEFAULT_PICKUP_RADIUS_MILES: f64 = 100.0;

/// Applies one hunt plan's criteria to one load.
///
/// # Pipeline stages
/// All conjunctive; a criterion absent from the plan is skipped:
/// 1. Load eligibility (processing status + freshness window)
/// 2. Calendar-day match between available date and pickup date
/// 3. Vehicle-size match after canonicalization
/// 4. Geography: radius around the hunt point, falling back to exact zip
///
/// Geography is effectively mandatory: a plan or load with no usable
/// location data never matches.
#[derive(Debug, Clone)]
pub struct HuntMatcher {
    window: RollingWindow,
    vehicle_types: VehicleTypeTable,
}

impl HuntMatcher {
    pub fn new(window: RollingWindow, vehicle_types: VehicleTypeTable) -> Self {
        Self {
            window,
            vehicle_types,
        }
    }

    pub fn window(&self) -> RollingWindow {
        self.window
    }

    /// Decide whether `load` satisfies `plan` at instant `now`.
    ///
    /// Pure predicate: counting and persistence are the aggregator's and the
    /// store's business.
    pub fn matches(&self, plan: &HuntPlan, load: &LoadCandidate, now: DateTime<Utc>) -> bool {
        // Stage 1: only fresh, unprocessed loads are candidates at all
        if load.status != LoadStatus::New {
            return false;
        }
        if !is_current(load.received_at, load.expires_at, self.window, now) {
            return false;
        }

        // Stage 2: same calendar day, compared as UTC date components so the
        // day cannot shift across timezone boundaries
        if let (Some(wanted), Some(pickup)) = (plan.available_date_utc(), load.pickup_date_utc()) {
            if wanted != pickup {
                return false;
            }
        }

        // Stage 3: posted type must canonicalize to one of the desired sizes
        if !plan.vehicle_sizes.is_empty() {
            if let Some(load_type) = &load.load_type {
                let canonical = self.vehicle_types.canonicalize(load_type);
                let wanted = plan
                    .vehicle_sizes
                    .iter()
                    .any(|size| size.trim().eq_ignore_ascii_case(&canonical));
                if !wanted {
                    return false;
                }
            }
        }

        // Stage 4
        self.matches_geography(plan, load)
    }

    /// Radius check when both sides have coordinates, exact zip equality
    /// otherwise; failure when neither path has data.
    fn matches_geography(&self, plan: &HuntPlan, load: &LoadCandidate) -> bool {
        if let (Some((plan_lat, plan_lon)), Some((load_lat, load_lon))) =
            (plan.hunt_coords(), load.origin.coords())
        {
            let distance = haversine_miles(plan_lat, plan_lon, load_lat, load_lon);
            let radius = plan
                .pickup_radius_miles
                .filter(|r| r.is_finite() && *r > 0.0)
                .unwrap_or(DEFAULT_PICKUP_RADIUS_MILES);
            return distance <= radius;
        }

        match (&plan.pickup_zip, &load.origin.zip) {
            (Some(plan_zip), Some(load_zip)) => plan_zip.trim() == load_zip.trim(),
            _ => false,
        }
    }
}

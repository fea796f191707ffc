use std::collections::HashMap;

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::core::matcher::HuntMatcher;
use crate::models::{HuntPlan, LoadCandidate, MatchRecord, MatchStatus};

/// One matching load for one plan, joined with its persisted lifecycle
/// status where a dispatcher has already acted on the pair.
#[derive(Debug, Clone)]
pub struct LoadMatch {
    pub load_id: Uuid,
    pub status: Option<MatchStatus>,
}

/// Aggregation output for a single hunt plan.
#[derive(Debug, Clone)]
pub struct PlanMatchSummary {
    pub plan_id: Uuid,
    pub vehicle_id: Uuid,
    pub match_count: usize,
    pub matches: Vec<LoadMatch>,
}

/// Result of one aggregation pass over a tenant's plans and loads.
#[derive(Debug)]
pub struct AggregationResult {
    pub summaries: Vec<PlanMatchSummary>,
    pub evaluated_loads: usize,
}

impl AggregationResult {
    pub fn count_for(&self, plan_id: Uuid) -> usize {
        self.summaries
            .iter()
            .find(|s| s.plan_id == plan_id)
            .map(|s| s.match_count)
            .unwrap_or(0)
    }
}

/// Runs the matcher across the full (hunt plans x candidate loads) set.
///
/// Re-run on a new load arriving, a plan being created/edited/toggled, or a
/// periodic refresh. No match results are cached across runs; rows with
/// explicit lifecycle status live in the store and are joined in per pass.
#[derive(Debug, Clone)]
pub struct MatchAggregator {
    matcher: HuntMatcher,
}

impl MatchAggregator {
    pub fn new(matcher: HuntMatcher) -> Self {
        Self { matcher }
    }

    /// Produce per-plan match counts plus the persisted status of each pair.
    ///
    /// Disabled (or deleted) plans contribute zero without evaluating a
    /// single load, so a stale plan can never surface a positive count.
    /// Output order follows the input plan order; plans are otherwise
    /// independent.
    pub fn aggregate(
        &self,
        plans: &[HuntPlan],
        loads: &[LoadCandidate],
        records: &[MatchRecord],
        now: DateTime<Utc>,
    ) -> AggregationResult {
        let recorded: HashMap<(Uuid, Uuid), MatchStatus> = records
            .iter()
            .map(|r| ((r.plan_id, r.load_id), r.status))
            .collect();

        let summaries = plans
            .iter()
            .map(|plan| {
                if !plan.is_matchable() {
                    return PlanMatchSummary {
                        plan_id: plan.id,
                        vehicle_id: plan.vehicle_id,
                        match_count: 0,
                        matches: Vec::new(),
                    };
                }

                let matches: Vec<LoadMatch> = loads
                    .iter()
                    .filter(|load| self.matcher.matches(plan, load, now))
                    .map(|load| LoadMatch {
                        load_id: load.id,
                        status: recorded.get(&(plan.id, load.id)).copied(),
                    })
                    .collect();

                tracing::debug!(
                    plan_id = %plan.id,
                    matches = matches.len(),
                    "Evaluated hunt plan"
                );

                PlanMatchSummary {
                    plan_id: plan.id,
                    vehicle_id: plan.vehicle_id,
                    match_count: matches.len(),
                    matches,
                }
            })
            .collect();

        AggregationResult {
            summaries,
            evaluated_loads: loads.len(),
        }
    }
}

// Integration tests for the Load Hunter matching core

use chrono::{DateTime, Duration, Utc};
use uuid::Uuid;

use loadhunter::core::{
    aggregator::MatchAggregator, freshness::RollingWindow, matcher::HuntMatcher,
    vehicle_types::VehicleTypeTable,
};
use loadhunter::models::{
    HuntPlan, LoadCandidate, LoadStatus, Location, MatchRecord, MatchStatus, PlanStatus,
};
use loadhunter::services::RefreshGate;

/// Route warn/debug output through the test harness; `RUST_LOG` controls
/// verbosity. Safe to call from every test, only the first init wins.
fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

fn plan(tenant_id: Uuid, name: &str) -> HuntPlan {
    HuntPlan {
        id: Uuid::new_v4(),
        tenant_id,
        vehicle_id: Uuid::new_v4(),
        name: name.to_string(),
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
    }
}

fn load_at(tenant_id: Uuid, lat: f64, lon: f64, now: DateTime<Utc>) -> LoadCandidate {
    LoadCandidate {
        id: Uuid::new_v4(),
        tenant_id,
        received_at: now - Duration::minutes(3),
        expires_at: None,
        status: LoadStatus::New,
        origin: Location {
            latitude: Some(lat),
            longitude: Some(lon),
            ..Location::default()
        },
        destination: Location::default(),
        load_type: Some("sprinter".to_string()),
        pickup_at: None,
    }
}

#[test]
fn test_end_to_end_aggregation() {
    init_tracing();
    let now = Utc::now();
    let tenant = Uuid::new_v4();

    // Plan hunting sprinters within 50 miles of downtown LA
    let mut la_plan = plan(tenant, "Unit 3 - LA");
    la_plan.hunt_latitude = Some(34.0522);
    la_plan.hunt_longitude = Some(-118.2437);
    la_plan.pickup_radius_miles = Some(50.0);
    la_plan.vehicle_sizes = vec!["SPRINTER".to_string()];

    // Disabled plan that would otherwise match everything
    let mut idle_plan = plan(tenant, "Unit 9 - idle");
    idle_plan.hunt_latitude = Some(34.0522);
    idle_plan.hunt_longitude = Some(-118.2437);
    idle_plan.pickup_radius_miles = Some(5000.0);
    idle_plan.enabled = false;

    let near_a = load_at(tenant, 34.1, -118.3, now); // ~7 miles
    let near_b = load_at(tenant, 33.8, -118.1, now); // ~19 miles
    let far = load_at(tenant, 37.7749, -122.4194, now); // San Francisco

    let mut stale = load_at(tenant, 34.1, -118.3, now);
    stale.received_at = now - Duration::hours(2);

    let mut wrong_type = load_at(tenant, 34.1, -118.3, now);
    wrong_type.load_type = Some("flatbed".to_string());

    let record = MatchRecord {
        id: Uuid::new_v4(),
        tenant_id: tenant,
        plan_id: la_plan.id,
        load_id: near_a.id,
        status: MatchStatus::Bid,
        created_at: now - Duration::minutes(1),
        updated_at: now - Duration::minutes(1),
    };

    let aggregator = MatchAggregator::new(HuntMatcher::new(
        RollingWindow::ThirtyMinutes,
        VehicleTypeTable::default(),
    ));

    let plans = vec![la_plan.clone(), idle_plan.clone()];
    let loads = vec![
        near_a.clone(),
        near_b.clone(),
        far,
        stale,
        wrong_type,
    ];

    let result = aggregator.aggregate(&plans, &loads, &[record], now);

    assert_eq!(result.evaluated_loads, 5);
    assert_eq!(result.count_for(la_plan.id), 2);
    assert_eq!(result.count_for(idle_plan.id), 0);

    let summary = result
        .summaries
        .iter()
        .find(|s| s.plan_id == la_plan.id)
        .unwrap();
    let bid = summary
        .matches
        .iter()
        .find(|m| m.load_id == near_a.id)
        .unwrap();
    assert_eq!(bid.status, Some(MatchStatus::Bid));

    let fresh = summary
        .matches
        .iter()
        .find(|m| m.load_id == near_b.id)
        .unwrap();
    assert_eq!(fresh.status, None);
}

#[test]
fn test_aggregation_is_tenant_blind_to_counts_only() {
    // Counts are computed purely from whatever plans/loads are passed in;
    // tenant scoping happens at the query layer, so identical inputs give
    // identical outputs.
    let now = Utc::now();
    let tenant = Uuid::new_v4();

    let mut p = plan(tenant, "Unit 1");
    p.pickup_zip = Some("90210".to_string());

    let mut l = load_at(tenant, 0.0, 0.0, now);
    l.origin = Location {
        zip: Some("90210".to_string()),
        ..Location::default()
    };

    let aggregator = MatchAggregator::new(HuntMatcher::new(
        RollingWindow::ThirtyMinutes,
        VehicleTypeTable::default(),
    ));

    let first = aggregator.aggregate(&[p.clone()], &[l.clone()], &[], now);
    let second = aggregator.aggregate(&[p.clone()], &[l], &[], now);
    assert_eq!(first.count_for(p.id), second.count_for(p.id));
}

#[test]
fn test_stale_fetch_result_is_discarded() {
    // Fetch #1 issued, fetch #2 issued, fetch #1 resolves last: applied
    // state must be fetch #2's.
    let gate = RefreshGate::default();

    let fetch_1 = gate.begin();
    let fetch_2 = gate.begin();

    assert!(gate.commit(fetch_2), "newest fetch must apply");
    assert!(!gate.commit(fetch_1), "stale fetch must be discarded");
}

mod broker_api {
    use super::*;
    use loadhunter::services::{BrokerApiClient, BrokerTables, RetryPolicy};
    use std::time::Duration as StdDuration;

    fn fast_retry() -> RetryPolicy {
        RetryPolicy {
            max_attempts: 3,
            base_delay: StdDuration::from_millis(1),
            max_delay: StdDuration::from_millis(4),
        }
    }

    fn client_for(server: &mockito::ServerGuard) -> BrokerApiClient {
        BrokerApiClient::new(
            server.url(),
            "test_key".to_string(),
            BrokerTables::default(),
            fast_retry(),
        )
        .unwrap()
    }

    #[tokio::test]
    async fn test_get_hunt_plans_parses_rows() {
        super::init_tracing();
        let mut server = mockito::Server::new_async().await;
        let tenant = Uuid::new_v4();

        let body = serde_json::json!([{
            "id": Uuid::new_v4(),
            "tenantId": tenant,
            "vehicleId": Uuid::new_v4(),
            "name": "Unit 4 - Chicago",
            "status": "active",
            "enabled": true,
            "vehicleSizes": ["SPRINTER", "CARGO VAN"],
            "pickupZip": "60601",
            "pickupRadiusMiles": 75.0,
        }])
        .to_string();

        let mock = server
            .mock("GET", "/rest/v1/hunt_plans")
            .match_query(mockito::Matcher::Any)
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(body)
            .create_async()
            .await;

        let plans = client_for(&server).get_hunt_plans(tenant).await.unwrap();

        assert_eq!(plans.len(), 1);
        assert_eq!(plans[0].name, "Unit 4 - Chicago");
        assert_eq!(plans[0].pickup_radius_miles, Some(75.0));
        assert!(plans[0].is_matchable());
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_foreign_tenant_rows_are_dropped() {
        super::init_tracing();
        let mut server = mockito::Server::new_async().await;
        let mine = Uuid::new_v4();
        let theirs = Uuid::new_v4();
        let now = Utc::now();

        let body = serde_json::json!([
            {
                "id": Uuid::new_v4(),
                "tenantId": mine,
                "receivedAt": now.to_rfc3339(),
                "origin": { "zip": "60601" },
            },
            {
                "id": Uuid::new_v4(),
                "tenantId": theirs,
                "receivedAt": now.to_rfc3339(),
                "origin": { "zip": "60601" },
            }
        ])
        .to_string();

        let _mock = server
            .mock("GET", "/rest/v1/load_candidates")
            .match_query(mockito::Matcher::Any)
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(body)
            .create_async()
            .await;

        let loads = client_for(&server)
            .get_load_candidates(mine, now - Duration::hours(1), 100)
            .await
            .unwrap();

        assert_eq!(loads.len(), 1);
        assert_eq!(loads[0].tenant_id, mine);
    }

    #[tokio::test]
    async fn test_retries_are_bounded() {
        super::init_tracing();
        let mut server = mockito::Server::new_async().await;

        let mock = server
            .mock("GET", "/rest/v1/vehicle_type_mappings")
            .match_query(mockito::Matcher::Any)
            .with_status(500)
            .expect(3)
            .create_async()
            .await;

        let result = client_for(&server)
            .get_vehicle_type_mappings(Uuid::new_v4())
            .await;

        assert!(result.is_err());
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_fetch_matching_inputs_fans_out() {
        super::init_tracing();
        let mut server = mockito::Server::new_async().await;
        let tenant = Uuid::new_v4();
        let now = Utc::now();

        let _plans = server
            .mock("GET", "/rest/v1/hunt_plans")
            .match_query(mockito::Matcher::Any)
            .with_status(200)
            .with_body("[]")
            .create_async()
            .await;
        let _loads = server
            .mock("GET", "/rest/v1/load_candidates")
            .match_query(mockito::Matcher::Any)
            .with_status(200)
            .with_body("[]")
            .create_async()
            .await;
        let _mappings = server
            .mock("GET", "/rest/v1/vehicle_type_mappings")
            .match_query(mockito::Matcher::Any)
            .with_status(200)
            .with_body("[]")
            .create_async()
            .await;

        let (plans, loads, mappings) = client_for(&server)
            .fetch_matching_inputs(tenant, now - Duration::hours(1), 100)
            .await
            .unwrap();

        assert!(plans.is_empty());
        assert!(loads.is_empty());
        assert!(mappings.is_empty());
    }
}

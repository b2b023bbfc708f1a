// Integration tests for the matching pipeline and the handover flow

use chrono::{DateTime, Duration, Utc};
use foodshare::core::{
    generate_pickup_code, is_valid_pickup_time, plan_transition, rank_requests,
    verify_pickup_code, Matcher,
};
use foodshare::models::{
    Coordinates, Donation, DonationStatus, FoodCategory, NearbySearch, PickupRequest,
    RequestStatus, ScoringWeights, User, UserRole,
};
use uuid::Uuid;

fn create_donation(title: &str, lat: f64, lon: f64, created_at: DateTime<Utc>) -> Donation {
    Donation {
        id: Uuid::new_v4(),
        donor_id: Uuid::new_v4(),
        title: title.to_string(),
        description: format!("{} left over from today's service", title),
        category: FoodCategory::ReadyToEat,
        quantity: 12,
        unit: "box".to_string(),
        images: vec![],
        location: Coordinates::new(lat, lon),
        address: "Jl. Thamrin No. 1, Jakarta Pusat".to_string(),
        pickup_time_start: created_at + Duration::hours(1),
        pickup_time_end: created_at + Duration::hours(3),
        expiry_time: created_at + Duration::hours(8),
        status: DonationStatus::Available,
        notes: None,
        is_recurring: false,
        recurring_days: vec![],
        total_requests: 0,
        completed_at: None,
        created_at,
        updated_at: created_at,
    }
}

fn create_receiver(name: &str, location: Option<Coordinates>, trust_score: f64) -> User {
    let now = Utc::now();
    User {
        id: Uuid::new_v4(),
        email: format!("{}@foodshare.test", name.to_lowercase()),
        name: name.to_string(),
        phone: None,
        role: UserRole::Receiver,
        user_type: None,
        address: None,
        location,
        id_card_number: None,
        trust_score,
        is_active: true,
        created_at: now,
        updated_at: now,
    }
}

fn file_request(
    matcher: &Matcher,
    receiver: &User,
    donation: &Donation,
    at: DateTime<Utc>,
) -> PickupRequest {
    PickupRequest {
        id: Uuid::new_v4(),
        donation_id: donation.id,
        receiver_id: receiver.id,
        status: RequestStatus::Pending,
        message: None,
        estimated_pickup_time: at + Duration::hours(2),
        actual_pickup_time: None,
        pickup_code: None,
        priority: matcher.score_request(receiver, donation, at, at),
        rejection_reason: None,
        created_at: at,
        updated_at: at,
    }
}

fn search_at(origin: Coordinates, radius_km: f64) -> NearbySearch {
    NearbySearch {
        origin,
        radius_km,
        category: None,
        search: None,
        limit: 20,
        offset: 0,
    }
}

#[test]
fn test_integration_nearby_across_antimeridian() {
    let matcher = Matcher::with_default_weights();
    let now = Utc::now();

    let candidates = vec![create_donation("Ikan bakar", 0.0, -179.99, now - Duration::minutes(5))];
    let result = matcher.find_nearby(&search_at(Coordinates::new(0.0, 179.99), 5.0), candidates, now);

    assert_eq!(result.total_matches, 1);
    assert!((result.donations[0].distance_km - 2.224).abs() < 0.01);
}

#[test]
fn test_integration_nearby_at_high_latitude() {
    let matcher = Matcher::with_default_weights();
    let now = Utc::now();
    let origin_lat = 85.0_f64;

    // Easternmost point of a 99.9 km circle around (85, 0)
    let d = 99.9 / 6371.0_f64;
    let edge_lat = (origin_lat.to_radians().sin() / d.cos()).asin().to_degrees();
    let edge_lon = (d.sin() / origin_lat.to_radians().cos()).asin().to_degrees();

    let candidates = vec![create_donation("Roti gandum", edge_lat, edge_lon, now - Duration::minutes(5))];
    let result = matcher.find_nearby(
        &search_at(Coordinates::new(origin_lat, 0.0), 100.0),
        candidates,
        now,
    );

    assert_eq!(result.total_matches, 1);
    assert!(result.donations[0].distance_km <= 100.0);
}

#[test]
fn test_integration_nearby_search() {
    let matcher = Matcher::with_default_weights();
    let now = Utc::now();

    let candidates = vec![
        create_donation("Nasi kotak", -6.2188, 106.8556, now - Duration::minutes(30)),
        create_donation("Roti tawar", -6.2100, 106.8460, now - Duration::minutes(10)),
        create_donation("Sayur segar", -6.6000, 106.8000, now - Duration::minutes(5)),
    ];

    let search = NearbySearch {
        origin: Coordinates::new(-6.2088, 106.8456),
        radius_km: 5.0,
        category: Some(FoodCategory::ReadyToEat),
        search: None,
        limit: 20,
        offset: 0,
    };

    let result = matcher.find_nearby(&search, candidates, now);

    assert_eq!(result.total_candidates, 3);
    assert_eq!(result.donations.len(), 2);
    assert_eq!(result.donations[0].donation.title, "Roti tawar");
    assert!((result.donations[1].distance_km - 1.568).abs() < 0.01);
    assert!(result
        .donations
        .iter()
        .all(|nearby| nearby.distance_km <= search.radius_km));
}

#[test]
fn test_same_distance_newest_first() {
    let matcher = Matcher::with_default_weights();
    let now = Utc::now();

    let older = create_donation("Older", -6.2100, 106.8460, now - Duration::hours(2));
    let newer = create_donation("Newer", -6.2100, 106.8460, now - Duration::minutes(1));

    let search = NearbySearch {
        origin: Coordinates::new(-6.2088, 106.8456),
        radius_km: 5.0,
        category: None,
        search: Some("NEWER".to_string()),
        limit: 20,
        offset: 0,
    };
    let result = matcher.find_nearby(&search, vec![older.clone(), newer.clone()], now);
    assert_eq!(result.donations.len(), 1);

    let search = NearbySearch { search: None, ..search };
    let result = matcher.find_nearby(&search, vec![older, newer], now);
    let titles: Vec<_> = result.donations.iter().map(|d| d.donation.title.as_str()).collect();
    assert_eq!(titles, vec!["Newer", "Older"]);
}

#[test]
fn test_requests_ranked_by_priority_snapshot() {
    let matcher = Matcher::with_default_weights();
    let now = Utc::now();
    let donation = create_donation("Nasi kotak", -6.2088, 106.8456, now - Duration::hours(1));

    let close_trusted = create_receiver("Ayu", Some(Coordinates::new(-6.2090, 106.8458)), 4.8);
    let far_new = create_receiver("Budi", Some(Coordinates::new(-6.2400, 106.8456)), 0.0);
    let no_location = create_receiver("Citra", None, 3.0);

    let mut requests = vec![
        file_request(&matcher, &far_new, &donation, now - Duration::minutes(20)),
        file_request(&matcher, &no_location, &donation, now - Duration::minutes(15)),
        file_request(&matcher, &close_trusted, &donation, now - Duration::minutes(10)),
    ];
    rank_requests(&mut requests);

    let order: Vec<Uuid> = requests.iter().map(|r| r.receiver_id).collect();
    assert_eq!(order, vec![close_trusted.id, no_location.id, far_new.id]);
    assert!(requests.iter().all(|r| (0..=100).contains(&r.priority)));
    // Without a location only trust and recency count
    assert_eq!(requests[1].priority, 40);
}

#[test]
fn test_custom_weights_and_radius() {
    let weights = ScoringWeights {
        distance: 60.0,
        trust_per_point: 6.0,
        recency: 10.0,
        recency_window_hours: 10.0,
    };
    let matcher = Matcher::new(weights, 10.0);
    let now = Utc::now();
    let donation = create_donation("Buah", -6.2088, 106.8456, now);

    let receiver = create_receiver("Dewi", Some(Coordinates::new(-6.2088, 106.8456)), 5.0);
    assert_eq!(matcher.score_request(&receiver, &donation, now, now), 100);
}

#[test]
fn test_handover_flow() {
    let now = Utc::now();
    let request_id = Uuid::new_v4();

    assert!(is_valid_pickup_time(now + Duration::hours(3), now));

    let approve = plan_transition(RequestStatus::Pending, RequestStatus::Approved).unwrap();
    assert!(approve.issue_pickup_code);
    assert_eq!(approve.donation_status, Some(DonationStatus::Completed));

    let code = generate_pickup_code(request_id, now);
    assert!(code.starts_with("FOODSHARE_"));
    assert!(verify_pickup_code(Some(&code), &code));
    assert!(!verify_pickup_code(Some(&code), "FOODSHARE_other_1"));

    let complete = plan_transition(RequestStatus::Approved, RequestStatus::Completed).unwrap();
    assert!(complete.complete_handover);

    // Terminal states never move again
    assert!(plan_transition(RequestStatus::Completed, RequestStatus::Approved).is_err());
    assert!(plan_transition(RequestStatus::Rejected, RequestStatus::Pending).is_err());
}

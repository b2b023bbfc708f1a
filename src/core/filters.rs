use chrono::{DateTime, Utc};

use crate::core::distance::distance_between;
use crate::models::{Coordinates, Donation, DonationStatus, FoodCategory};

/// Radius admission check for a candidate location
///
/// Returns the distance when the candidate is within `radius_km` of the
/// reference (inclusive), `None` otherwise. A missing or invalid candidate
/// location is excluded and logged as a data-quality defect.
#[inline]
pub fn admit_within_radius(
    candidate: Option<&Coordinates>,
    reference: &Coordinates,
    radius_km: f64,
) -> Option<f64> {
    let candidate = match candidate {
        Some(point) if point.is_valid() => point,
        Some(point) => {
            tracing::warn!(
                "Excluding candidate with invalid location ({}, {})",
                point.latitude,
                point.longitude
            );
            return None;
        }
        None => {
            tracing::warn!("Excluding candidate without a location");
            return None;
        }
    };

    let distance_km = distance_between(candidate, reference);
    if distance_km <= radius_km {
        Some(distance_km)
    } else {
        None
    }
}

/// Boolean form of [`admit_within_radius`]
#[inline]
pub fn within_radius(candidate: &Coordinates, reference: &Coordinates, radius_km: f64) -> bool {
    admit_within_radius(Some(candidate), reference, radius_km).is_some()
}

/// Whether a donation can still be claimed at `now`
#[inline]
pub fn is_open_for_requests(donation: &Donation, now: DateTime<Utc>) -> bool {
    matches!(donation.status, DonationStatus::Available | DonationStatus::Requested)
        && !donation.is_expired(now)
}

#[inline]
pub fn matches_category(donation: &Donation, category: Option<FoodCategory>) -> bool {
    category.map_or(true, |category| donation.category == category)
}

/// Case-insensitive match on title or description
pub fn matches_search(donation: &Donation, search: Option<&str>) -> bool {
    let needle = match search.map(str::trim) {
        Some(needle) if !needle.is_empty() => needle.to_lowercase(),
        _ => return true,
    };

    donation.title.to_lowercase().contains(&needle)
        || donation.description.to_lowercase().contains(&needle)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::distance::haversine_distance;
    use chrono::Duration;
    use uuid::Uuid;

    fn create_test_donation(status: DonationStatus, expires_in_hours: i64) -> Donation {
        let now = Utc::now();
        Donation {
            id: Uuid::new_v4(),
            donor_id: Uuid::new_v4(),
            title: "Freshly Baked Bread".to_string(),
            description: "End of day bread, white and whole grain".to_string(),
            category: FoodCategory::ReadyToEat,
            quantity: 20,
            unit: "pcs".to_string(),
            images: vec![],
            location: Coordinates::new(-6.2188, 106.8556),
            address: "Jl. Thamrin No. 456, Jakarta Pusat".to_string(),
            pickup_time_start: now - Duration::hours(1),
            pickup_time_end: now + Duration::hours(expires_in_hours - 1),
            expiry_time: now + Duration::hours(expires_in_hours),
            status,
            notes: None,
            is_recurring: false,
            recurring_days: vec![],
            total_requests: 0,
            completed_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn test_radius_boundary_is_inclusive() {
        let reference = Coordinates::new(-6.2088, 106.8456);
        let candidate = Coordinates::new(-6.2188, 106.8556);
        let exact = haversine_distance(
            candidate.latitude,
            candidate.longitude,
            reference.latitude,
            reference.longitude,
        );

        assert!(within_radius(&candidate, &reference, exact));
        assert!(!within_radius(&candidate, &reference, exact - 1e-9));
    }

    #[test]
    fn test_missing_location_is_excluded() {
        let reference = Coordinates::new(-6.2088, 106.8456);
        assert!(admit_within_radius(None, &reference, 50.0).is_none());
    }

    #[test]
    fn test_invalid_location_is_excluded() {
        let reference = Coordinates::new(-6.2088, 106.8456);
        let broken = Coordinates::new(f64::NAN, 106.8456);
        assert!(admit_within_radius(Some(&broken), &reference, 50.0).is_none());

        let out_of_range = Coordinates::new(-6.2088, 286.8456);
        assert!(admit_within_radius(Some(&out_of_range), &reference, 50_000.0).is_none());
    }

    #[test]
    fn test_open_for_requests() {
        let now = Utc::now();
        assert!(is_open_for_requests(&create_test_donation(DonationStatus::Available, 5), now));
        assert!(is_open_for_requests(&create_test_donation(DonationStatus::Requested, 5), now));
        assert!(!is_open_for_requests(&create_test_donation(DonationStatus::Completed, 5), now));
        assert!(!is_open_for_requests(&create_test_donation(DonationStatus::Cancelled, 5), now));
    }

    #[test]
    fn test_expired_donation_is_closed() {
        let donation = create_test_donation(DonationStatus::Available, 5);
        let later = donation.expiry_time;
        assert!(!is_open_for_requests(&donation, later));
    }

    #[test]
    fn test_category_and_search() {
        let donation = create_test_donation(DonationStatus::Available, 5);

        assert!(matches_category(&donation, None));
        assert!(matches_category(&donation, Some(FoodCategory::ReadyToEat)));
        assert!(!matches_category(&donation, Some(FoodCategory::Fruits)));

        assert!(matches_search(&donation, None));
        assert!(matches_search(&donation, Some("  ")));
        assert!(matches_search(&donation, Some("BREAD")));
        assert!(matches_search(&donation, Some("whole grain")));
        assert!(!matches_search(&donation, Some("rice")));
    }
}

use std::cmp::Ordering;

use chrono::{DateTime, Utc};

use crate::core::{
    distance::{calculate_bounding_box, distance_between, is_within_bounding_box},
    filters::{admit_within_radius, is_open_for_requests, matches_category, matches_search},
    scoring::{calculate_priority, DEFAULT_RADIUS_KM},
};
use crate::models::{Donation, NearbyDonation, NearbySearch, PickupRequest, ScoringWeights, User};

/// Result of a nearby search
#[derive(Debug)]
pub struct NearbyResult {
    pub donations: Vec<NearbyDonation>,
    /// Donations inside the radius before paging
    pub total_matches: usize,
    pub total_candidates: usize,
}

/// Matching orchestrator
///
/// # Pipeline Stages
/// 1. Geospatial bounding box pre-filter
/// 2. Availability (status and expiry)
/// 3. Category and free-text filters
/// 4. Exact radius admission and distance ranking
#[derive(Debug, Clone)]
pub struct Matcher {
    weights: ScoringWeights,
    radius_km: f64,
}

impl Matcher {
    pub fn new(weights: ScoringWeights, radius_km: f64) -> Self {
        Self { weights, radius_km }
    }

    pub fn with_default_weights() -> Self {
        Self::new(ScoringWeights::default(), DEFAULT_RADIUS_KM)
    }

    /// Radius the priority distance score is measured against
    pub fn radius_km(&self) -> f64 {
        self.radius_km
    }

    /// Find the donations a receiver at `search.origin` can claim
    ///
    /// Results are ordered by distance (ascending), newest first on ties,
    /// then paged with `search.offset` / `search.limit`.
    pub fn find_nearby(
        &self,
        search: &NearbySearch,
        candidates: Vec<Donation>,
        now: DateTime<Utc>,
    ) -> NearbyResult {
        let total_candidates = candidates.len();

        let bounding_box = calculate_bounding_box(
            search.origin.latitude,
            search.origin.longitude,
            search.radius_km,
        );

        let mut nearby: Vec<NearbyDonation> = candidates
            .into_iter()
            // Stage 1: cheap geospatial pre-filter
            .filter(|donation| {
                !donation.location.is_valid()
                    || is_within_bounding_box(
                        donation.location.latitude,
                        donation.location.longitude,
                        &bounding_box,
                    )
            })
            // Stage 2: still claimable
            .filter(|donation| is_open_for_requests(donation, now))
            // Stage 3: category and text search
            .filter(|donation| matches_category(donation, search.category))
            .filter(|donation| matches_search(donation, search.search.as_deref()))
            // Stage 4: exact radius, invalid locations dropped here
            .filter_map(|donation| {
                admit_within_radius(Some(&donation.location), &search.origin, search.radius_km)
                    .map(|distance_km| NearbyDonation { donation, distance_km })
            })
            .collect();

        nearby.sort_by(|a, b| {
            a.distance_km
                .partial_cmp(&b.distance_km)
                .unwrap_or(Ordering::Equal)
                .then_with(|| b.donation.created_at.cmp(&a.donation.created_at))
        });

        let total_matches = nearby.len();
        let donations = nearby
            .into_iter()
            .skip(search.offset)
            .take(search.limit)
            .collect();

        NearbyResult {
            donations,
            total_matches,
            total_candidates,
        }
    }

    /// Priority of a new request by `receiver` against `donation`
    ///
    /// A receiver without a usable location is scored as if standing on the
    /// radius, which zeroes the distance part.
    pub fn score_request(
        &self,
        receiver: &User,
        donation: &Donation,
        requested_at: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> i32 {
        let distance_km = match receiver.location.filter(|location| location.is_valid()) {
            Some(location) => distance_between(&location, &donation.location),
            None => {
                tracing::debug!(
                    "Receiver {} has no usable location, distance score is 0",
                    receiver.id
                );
                self.radius_km
            }
        };

        calculate_priority(
            distance_km,
            receiver.bounded_trust_score(),
            requested_at,
            now,
            self.radius_km,
            &self.weights,
        )
    }
}

impl Default for Matcher {
    fn default() -> Self {
        Self::with_default_weights()
    }
}

/// Order requests by priority (descending), oldest first within a priority
pub fn rank_requests(requests: &mut [PickupRequest]) {
    requests.sort_by(|a, b| {
        b.priority
            .cmp(&a.priority)
            .then_with(|| a.created_at.cmp(&b.created_at))
    });
}

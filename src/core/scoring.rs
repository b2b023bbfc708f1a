use chrono::{DateTime, Utc};

use crate::models::{ScoringWeights, MAX_TRUST_SCORE};

/// Matching radius the distance score is measured against
pub const DEFAULT_RADIUS_KM: f64 = 5.0;

const MILLIS_PER_HOUR: f64 = 3_600_000.0;

/// Calculate the priority (0-100 with default weights) of a pickup request
///
/// Scoring formula:
/// priority = round(
///     max(0, (R - d) / R) * 40 +        # Closer receivers score higher
///     trust_score * 10 +                # 0-5 trust, up to 50
///     max(0, 10 - hours_since_request)  # Fresh requests score higher
/// )
///
/// The result is meant to be stored once at request creation: the recency
/// part is a snapshot and is not re-derived on read.
pub fn calculate_priority(
    distance_km: f64,
    trust_score: f64,
    requested_at: DateTime<Utc>,
    now: DateTime<Utc>,
    radius_km: f64,
    weights: &ScoringWeights,
) -> i32 {
    let total = calculate_distance_score(distance_km, radius_km, weights)
        + calculate_trust_score(trust_score, weights)
        + calculate_recency_score(requested_at, now, weights);

    total.round().max(0.0).min(max_priority(weights)) as i32
}

/// Highest score the weights can produce
pub fn max_priority(weights: &ScoringWeights) -> f64 {
    weights.distance + weights.trust_per_point * MAX_TRUST_SCORE + weights.recency
}

/// Distance sub-score, linear from full weight at 0 km to 0 at the radius
#[inline]
pub fn calculate_distance_score(distance_km: f64, radius_km: f64, weights: &ScoringWeights) -> f64 {
    if radius_km <= 0.0 {
        return 0.0;
    }

    ((radius_km - distance_km) / radius_km).max(0.0).min(1.0) * weights.distance
}

/// Trust sub-score; the trust score is bounded to [0, 5] first
#[inline]
pub fn calculate_trust_score(trust_score: f64, weights: &ScoringWeights) -> f64 {
    let trust = if trust_score.is_finite() {
        trust_score.clamp(0.0, MAX_TRUST_SCORE)
    } else {
        0.0
    };

    trust * weights.trust_per_point
}

/// Recency sub-score, decaying linearly to 0 over the recency window
#[inline]
pub fn calculate_recency_score(
    requested_at: DateTime<Utc>,
    now: DateTime<Utc>,
    weights: &ScoringWeights,
) -> f64 {
    let window = weights.recency_window_hours;
    if window <= 0.0 {
        return 0.0;
    }

    let hours = (now - requested_at).num_milliseconds() as f64 / MILLIS_PER_HOUR;

    ((window - hours) / window).clamp(0.0, 1.0) * weights.recency
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn test_maximum_priority() {
        let now = Utc::now();
        let weights = ScoringWeights::default();
        assert_eq!(calculate_priority(0.0, 5.0, now, now, DEFAULT_RADIUS_KM, &weights), 100);
    }

    #[test]
    fn test_at_radius_with_no_trust_keeps_recency() {
        let now = Utc::now();
        let weights = ScoringWeights::default();
        assert_eq!(calculate_priority(5.0, 0.0, now, now, DEFAULT_RADIUS_KM, &weights), 10);
    }

    #[test]
    fn test_distance_score() {
        let weights = ScoringWeights::default();

        assert_eq!(calculate_distance_score(0.0, 5.0, &weights), 40.0);
        assert_eq!(calculate_distance_score(2.5, 5.0, &weights), 20.0);
        assert_eq!(calculate_distance_score(5.0, 5.0, &weights), 0.0);

        // Beyond the radius never goes negative
        assert_eq!(calculate_distance_score(12.0, 5.0, &weights), 0.0);
        assert_eq!(calculate_distance_score(f64::NAN, 5.0, &weights), 0.0);
    }

    #[test]
    fn test_trust_score_is_capped() {
        let weights = ScoringWeights::default();

        assert_eq!(calculate_trust_score(4.8, &weights), 48.0);
        assert_eq!(calculate_trust_score(7.0, &weights), 50.0);
        assert_eq!(calculate_trust_score(-1.0, &weights), 0.0);
    }

    #[test]
    fn test_recency_decay() {
        let now = Utc::now();
        let weights = ScoringWeights::default();

        assert_eq!(calculate_recency_score(now, now, &weights), 10.0);

        let nearly_stale = calculate_recency_score(now - Duration::minutes(570), now, &weights);
        assert!((nearly_stale - 0.5).abs() < 1e-9);

        assert_eq!(calculate_recency_score(now - Duration::hours(10), now, &weights), 0.0);
        assert_eq!(calculate_recency_score(now - Duration::hours(48), now, &weights), 0.0);

        // Clock skew cannot push it past its weight
        assert_eq!(calculate_recency_score(now + Duration::hours(2), now, &weights), 10.0);
    }

    #[test]
    fn test_typical_request() {
        let now = Utc::now();
        let weights = ScoringWeights::default();

        // 20 (distance) + 48 (trust) + 10 (recency)
        assert_eq!(calculate_priority(2.5, 4.8, now, now, DEFAULT_RADIUS_KM, &weights), 78);
    }

    #[test]
    fn test_max_priority_follows_weights() {
        assert_eq!(max_priority(&ScoringWeights::default()), 100.0);

        let weights = ScoringWeights {
            distance: 20.0,
            trust_per_point: 4.0,
            recency: 5.0,
            recency_window_hours: 24.0,
        };
        assert_eq!(max_priority(&weights), 45.0);
    }
}

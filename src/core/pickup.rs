use chrono::{DateTime, Duration, Utc};
use uuid::Uuid;

const CODE_PREFIX: &str = "FOODSHARE";

/// Furthest ahead a receiver may schedule a pickup
const MAX_PICKUP_LEAD_DAYS: i64 = 7;

/// Build the pickup-verification code handed to the receiver on approval
pub fn generate_pickup_code(request_id: Uuid, now: DateTime<Utc>) -> String {
    format!("{}_{}_{}", CODE_PREFIX, request_id.simple(), now.timestamp_millis())
}

/// Check a presented code against the one stored on the request
pub fn verify_pickup_code(expected: Option<&str>, presented: &str) -> bool {
    match expected {
        Some(expected) => !expected.is_empty() && expected == presented.trim(),
        None => false,
    }
}

/// A pickup must be in the future and at most a week away
pub fn is_valid_pickup_time(pickup_time: DateTime<Utc>, now: DateTime<Utc>) -> bool {
    pickup_time > now && pickup_time <= now + Duration::days(MAX_PICKUP_LEAD_DAYS)
}

use serde::{Deserialize, Serialize};

use crate::models::domain::{NearbyDonation, PickupRequest, PickupTransaction, Review};

/// Response for the nearby search endpoint
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NearbyDonationsResponse {
    pub donations: Vec<NearbyDonation>,
    pub radius_km: f64,
    pub total_results: usize,
}

/// Result of a request status change
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RequestTransitionResponse {
    pub request: PickupRequest,
    /// Present when the change created or completed a handover
    pub transaction: Option<PickupTransaction>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReviewResponse {
    pub review: Review,
    pub reviewee_trust_score: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExpireResponse {
    pub expired: u64,
}

/// Health check response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub timestamp: chrono::DateTime<chrono::Utc>,
}

/// Error response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    pub message: String,
    pub status_code: u16,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageResponse {
    pub message: String,
}

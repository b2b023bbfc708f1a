use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Upper bound of a user's trust score
pub const MAX_TRUST_SCORE: f64 = 5.0;

/// A geographic point in decimal degrees
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinates {
    pub latitude: f64,
    pub longitude: f64,
}

impl Coordinates {
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self { latitude, longitude }
    }

    /// Build a point only when both halves are present
    pub fn from_parts(latitude: Option<f64>, longitude: Option<f64>) -> Option<Self> {
        match (latitude, longitude) {
            (Some(latitude), Some(longitude)) => Some(Self { latitude, longitude }),
            _ => None,
        }
    }

    /// Finite and within [-90, 90] / [-180, 180]
    pub fn is_valid(&self) -> bool {
        self.latitude.is_finite()
            && self.longitude.is_finite()
            && (-90.0..=90.0).contains(&self.latitude)
            && (-180.0..=180.0).contains(&self.longitude)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(type_name = "user_role", rename_all = "lowercase")]
pub enum UserRole {
    Donor,
    Receiver,
    Admin,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(type_name = "user_type", rename_all = "lowercase")]
pub enum UserType {
    Individual,
    Restaurant,
    Store,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(type_name = "food_category", rename_all = "snake_case")]
pub enum FoodCategory {
    ReadyToEat,
    RawIngredients,
    Beverages,
    Snacks,
    Desserts,
    Vegetables,
    Fruits,
    Others,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(type_name = "donation_status", rename_all = "lowercase")]
pub enum DonationStatus {
    Available,
    Requested,
    Completed,
    Expired,
    Cancelled,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(type_name = "request_status", rename_all = "lowercase")]
pub enum RequestStatus {
    Pending,
    Approved,
    Rejected,
    Completed,
    Cancelled,
}

/// Marketplace participant
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: Uuid,
    pub email: String,
    pub name: String,
    pub phone: Option<String>,
    pub role: UserRole,
    pub user_type: Option<UserType>,
    pub address: Option<String>,
    pub location: Option<Coordinates>,
    pub id_card_number: Option<String>,
    pub trust_score: f64,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl User {
    /// Trust score clamped to [0, 5], non-finite values read as 0
    pub fn bounded_trust_score(&self) -> f64 {
        if self.trust_score.is_finite() {
            self.trust_score.clamp(0.0, MAX_TRUST_SCORE)
        } else {
            0.0
        }
    }
}

/// Posted food listing
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Donation {
    pub id: Uuid,
    pub donor_id: Uuid,
    pub title: String,
    pub description: String,
    pub category: FoodCategory,
    pub quantity: i32,
    pub unit: String,
    pub images: Vec<String>,
    pub location: Coordinates,
    pub address: String,
    pub pickup_time_start: DateTime<Utc>,
    pub pickup_time_end: DateTime<Utc>,
    pub expiry_time: DateTime<Utc>,
    pub status: DonationStatus,
    pub notes: Option<String>,
    pub is_recurring: bool,
    pub recurring_days: Vec<String>,
    pub total_requests: i32,
    pub completed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Donation {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expiry_time <= now
    }
}

/// Donation annotated with its distance from the searcher
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NearbyDonation {
    #[serde(flatten)]
    pub donation: Donation,
    #[serde(rename = "distanceKm")]
    pub distance_km: f64,
}

/// A receiver's claim against a donation
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PickupRequest {
    pub id: Uuid,
    pub donation_id: Uuid,
    pub receiver_id: Uuid,
    pub status: RequestStatus,
    pub message: Option<String>,
    pub estimated_pickup_time: DateTime<Utc>,
    pub actual_pickup_time: Option<DateTime<Utc>>,
    pub pickup_code: Option<String>,
    /// Priority at time of request; never recomputed
    pub priority: i32,
    pub rejection_reason: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Handover record created when a request is approved
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PickupTransaction {
    pub id: Uuid,
    pub donation_id: Uuid,
    pub request_id: Uuid,
    pub donor_id: Uuid,
    pub receiver_id: Uuid,
    pub pickup_code: String,
    pub completed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl PickupTransaction {
    /// The other party of the handover, if `user_id` is one of them
    pub fn counterparty(&self, user_id: Uuid) -> Option<Uuid> {
        if user_id == self.donor_id {
            Some(self.receiver_id)
        } else if user_id == self.receiver_id {
            Some(self.donor_id)
        } else {
            None
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Review {
    pub id: Uuid,
    pub transaction_id: Uuid,
    pub reviewer_id: Uuid,
    pub reviewee_id: Uuid,
    pub rating: f64,
    pub comment: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Geospatial bounding box
#[derive(Debug, Clone, Copy)]
pub struct BoundingBox {
    pub min_lat: f64,
    pub max_lat: f64,
    pub min_lon: f64,
    pub max_lon: f64,
}

/// Parameters of a nearby-donation search
#[derive(Debug, Clone)]
pub struct NearbySearch {
    pub origin: Coordinates,
    pub radius_km: f64,
    pub category: Option<FoodCategory>,
    pub search: Option<String>,
    pub limit: usize,
    pub offset: usize,
}

/// Priority scoring weights
///
/// The defaults give the 0-100 scale: 40 for distance, 10 per trust point
/// (50 at the maximum trust of 5) and 10 for a fresh request decaying over
/// ten hours.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScoringWeights {
    pub distance: f64,
    pub trust_per_point: f64,
    pub recency: f64,
    pub recency_window_hours: f64,
}

impl Default for ScoringWeights {
    fn default() -> Self {
        Self {
            distance: 40.0,
            trust_per_point: 10.0,
            recency: 10.0,
            recency_window_hours: 10.0,
        }
    }
}

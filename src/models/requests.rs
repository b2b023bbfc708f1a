use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::{Validate, ValidationError};

use crate::models::domain::{DonationStatus, FoodCategory, RequestStatus, UserRole, UserType};

const WEEKDAYS: [&str; 7] = [
    "monday", "tuesday", "wednesday", "thursday", "friday", "saturday", "sunday",
];

/// Request to register a user
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateUserRequest {
    #[validate(email)]
    pub email: String,
    #[validate(length(min = 2, max = 100))]
    pub name: String,
    #[validate(length(max = 20))]
    pub phone: Option<String>,
    pub role: UserRole,
    pub user_type: Option<UserType>,
    #[validate(length(max = 500))]
    pub address: Option<String>,
    #[validate(range(min = -90.0, max = 90.0))]
    pub latitude: Option<f64>,
    #[validate(range(min = -180.0, max = 180.0))]
    pub longitude: Option<f64>,
    #[validate(length(max = 20))]
    pub id_card_number: Option<String>,
}

/// Partial user update; absent fields are left untouched
#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct UpdateUserRequest {
    #[validate(email)]
    pub email: Option<String>,
    #[validate(length(min = 2, max = 100))]
    pub name: Option<String>,
    #[validate(length(max = 20))]
    pub phone: Option<String>,
    pub role: Option<UserRole>,
    pub user_type: Option<UserType>,
    #[validate(length(max = 500))]
    pub address: Option<String>,
    #[validate(range(min = -90.0, max = 90.0))]
    pub latitude: Option<f64>,
    #[validate(range(min = -180.0, max = 180.0))]
    pub longitude: Option<f64>,
    #[validate(length(max = 20))]
    pub id_card_number: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct UserListQuery {
    pub email: Option<String>,
}

/// Request to post a donation
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
#[validate(schema(function = "validate_donation_schedule"))]
pub struct CreateDonationRequest {
    #[validate(length(min = 5, max = 200))]
    pub title: String,
    #[validate(length(min = 10, max = 1000))]
    pub description: String,
    pub category: FoodCategory,
    #[validate(range(min = 1))]
    pub quantity: i32,
    #[validate(length(min = 1, max = 20))]
    pub unit: String,
    #[serde(default)]
    #[validate(length(max = 5))]
    pub images: Vec<String>,
    #[validate(range(min = -90.0, max = 90.0))]
    pub latitude: f64,
    #[validate(range(min = -180.0, max = 180.0))]
    pub longitude: f64,
    #[validate(length(min = 10, max = 500))]
    pub address: String,
    pub pickup_time_start: DateTime<Utc>,
    pub pickup_time_end: DateTime<Utc>,
    pub expiry_time: DateTime<Utc>,
    #[validate(length(max = 1000))]
    pub notes: Option<String>,
    #[serde(default)]
    pub is_recurring: bool,
    #[serde(default)]
    pub recurring_days: Vec<String>,
}

/// Pickup window must open before it closes, and close before the food expires
fn validate_donation_schedule(req: &CreateDonationRequest) -> Result<(), ValidationError> {
    if req.pickup_time_start >= req.pickup_time_end {
        let mut err = ValidationError::new("pickup_window");
        err.message = Some("pickupTimeStart must be before pickupTimeEnd".into());
        return Err(err);
    }

    if req.pickup_time_end >= req.expiry_time {
        let mut err = ValidationError::new("expiry_time");
        err.message = Some("pickupTimeEnd must be before expiryTime".into());
        return Err(err);
    }

    if let Some(day) = req
        .recurring_days
        .iter()
        .find(|day| !WEEKDAYS.contains(&day.to_lowercase().as_str()))
    {
        let mut err = ValidationError::new("recurring_days");
        err.message = Some(format!("'{}' is not a day of the week", day).into());
        return Err(err);
    }

    Ok(())
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DonationListQuery {
    pub donor_id: Option<Uuid>,
    pub status: Option<DonationStatus>,
}

/// Nearby search query string
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct NearbyQuery {
    #[validate(range(min = -90.0, max = 90.0))]
    pub latitude: f64,
    #[validate(range(min = -180.0, max = 180.0))]
    pub longitude: f64,
    #[validate(range(min = 0.1, max = 100.0))]
    pub radius: Option<f64>,
    pub category: Option<FoodCategory>,
    #[validate(length(min = 1, max = 100))]
    pub search: Option<String>,
    #[validate(range(min = 1))]
    pub limit: Option<u32>,
    pub offset: Option<u32>,
}

/// Request to claim a donation
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreatePickupRequest {
    pub donation_id: Uuid,
    #[validate(length(max = 1000))]
    pub message: Option<String>,
    pub estimated_pickup_time: DateTime<Utc>,
}

/// Status change on a pickup request
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct UpdateRequestStatus {
    pub status: RequestStatus,
    #[validate(length(min = 1, max = 1000))]
    pub rejection_reason: Option<String>,
    pub actual_pickup_time: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestListQuery {
    pub donation_id: Option<Uuid>,
    pub receiver_id: Option<Uuid>,
    pub status: Option<RequestStatus>,
}

/// Code presented by the receiver at handover
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct VerifyPickupRequest {
    #[validate(length(min = 1, max = 255))]
    pub code: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionListQuery {
    pub user_id: Uuid,
}

/// Review of the other party of a completed handover
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateReviewRequest {
    pub transaction_id: Uuid,
    pub reviewee_id: Uuid,
    #[validate(range(min = 1.0, max = 5.0))]
    pub rating: f64,
    #[validate(length(max = 1000))]
    pub comment: Option<String>,
}

//! FoodShare - location-based food donation matching service
//!
//! Donors post surplus food, receivers find listings near them and request a
//! pickup. Requests are ranked by a priority that blends distance, trust score
//! and recency; approval issues a pickup code that closes the handover.

pub mod config;
pub mod core;
pub mod error;
pub mod models;
pub mod routes;
pub mod services;

// Re-export commonly used types
pub use core::{calculate_priority, haversine_distance, rank_requests, Matcher};
pub use error::AppError;
pub use models::{Coordinates, Donation, NearbySearch, PickupRequest, ScoringWeights, User};

// Core algorithm exports
pub mod distance;
pub mod filters;
pub mod lifecycle;
pub mod matcher;
pub mod pickup;
pub mod scoring;

pub use distance::{calculate_bounding_box, distance_between, haversine_distance, is_within_bounding_box};
pub use filters::{admit_within_radius, is_open_for_requests, matches_category, matches_search, within_radius};
pub use lifecycle::{donation_status_on_request, plan_transition, TransitionError, TransitionPlan};
pub use matcher::{rank_requests, Matcher, NearbyResult};
pub use pickup::{generate_pickup_code, is_valid_pickup_time, verify_pickup_code};
pub use scoring::{calculate_priority, DEFAULT_RADIUS_KM};

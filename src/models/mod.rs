// Model exports
pub mod domain;
pub mod requests;
pub mod responses;

pub use domain::{
    BoundingBox, Coordinates, Donation, DonationStatus, FoodCategory, NearbyDonation,
    NearbySearch, PickupRequest, PickupTransaction, RequestStatus, Review, ScoringWeights, User,
    UserRole, UserType, MAX_TRUST_SCORE,
};
pub use requests::{
    CreateDonationRequest, CreatePickupRequest, CreateReviewRequest, CreateUserRequest,
    DonationListQuery, NearbyQuery, RequestListQuery, TransactionListQuery, UpdateRequestStatus,
    UpdateUserRequest, UserListQuery, VerifyPickupRequest,
};
pub use responses::{
    ErrorResponse, ExpireResponse, HealthResponse, MessageResponse, NearbyDonationsResponse,
    RequestTransitionResponse, ReviewResponse,
};

use actix_web::{web, HttpResponse};
use chrono::Utc;
use uuid::Uuid;
use validator::Validate;

use crate::core::{is_valid_pickup_time, rank_requests, TransitionError};
use crate::error::AppError;
use crate::models::{
    CreatePickupRequest, MessageResponse, RequestListQuery, RequestTransitionResponse,
    UpdateRequestStatus, VerifyPickupRequest,
};
use crate::routes::users::load_user;
use crate::routes::{AppState, CallerId};
use crate::services::{RequestFilter, TransitionOutcome};

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.route("/requests", web::post().to(create_request))
        .route("/requests", web::get().to(list_requests))
        .route("/requests/{id}", web::get().to(get_request))
        .route("/requests/{id}", web::put().to(update_request_status))
        .route("/requests/{id}", web::delete().to(delete_request))
        .route("/requests/{id}/verify", web::post().to(verify_pickup));
}

/// POST /api/v1/requests
///
/// The receiver is the caller named in `X-User-Id`. The priority is scored
/// here once and stored with the request.
async fn create_request(
    state: web::Data<AppState>,
    caller: CallerId,
    req: web::Json<CreatePickupRequest>,
) -> Result<HttpResponse, AppError> {
    req.validate()?;

    let now = Utc::now();
    if !is_valid_pickup_time(req.estimated_pickup_time, now) {
        return Err(AppError::Validation(
            "estimatedPickupTime must be in the future and within 7 days".to_string(),
        ));
    }

    let receiver = load_user(&state, caller.0).await?;
    let donation = state.postgres.get_donation(req.donation_id).await?;

    if donation.donor_id == receiver.id {
        return Err(AppError::Validation(
            "Donors cannot request their own donation".to_string(),
        ));
    }
    if donation.is_expired(now) {
        return Err(AppError::Conflict(format!(
            "Donation {} has expired",
            donation.id
        )));
    }
    if !donation.status.accepts_requests() {
        return Err(TransitionError::DonationClosed(donation.status).into());
    }

    let priority = state.matcher.score_request(&receiver, &donation, now, now);
    let request = state
        .postgres
        .create_request(receiver.id, &req, priority, now)
        .await?;

    Ok(HttpResponse::Created().json(request))
}

/// GET /api/v1/requests?donationId={id}&receiverId={id}&status={status}
async fn list_requests(
    state: web::Data<AppState>,
    query: web::Query<RequestListQuery>,
) -> Result<HttpResponse, AppError> {
    let filter = RequestFilter {
        donation_id: query.donation_id,
        receiver_id: query.receiver_id,
        status: query.status,
    };

    let mut requests = state.postgres.list_requests(&filter).await?;
    // Priority descending, oldest first on ties
    rank_requests(&mut requests);

    Ok(HttpResponse::Ok().json(requests))
}

/// GET /api/v1/requests/{id}
async fn get_request(
    state: web::Data<AppState>,
    path: web::Path<Uuid>,
) -> Result<HttpResponse, AppError> {
    let request = state.postgres.get_request(path.into_inner()).await?;

    Ok(HttpResponse::Ok().json(request))
}

/// PUT /api/v1/requests/{id}
///
/// Request body:
/// ```json
/// {
///   "status": "approved|rejected|cancelled|completed",
///   "rejectionReason": "string",
///   "actualPickupTime": "2024-01-01T10:00:00Z"
/// }
/// ```
async fn update_request_status(
    state: web::Data<AppState>,
    path: web::Path<Uuid>,
    req: web::Json<UpdateRequestStatus>,
) -> Result<HttpResponse, AppError> {
    req.validate()?;

    let outcome = state
        .postgres
        .transition_request(path.into_inner(), &req, Utc::now())
        .await?;

    Ok(HttpResponse::Ok().json(transition_response(outcome)))
}

/// POST /api/v1/requests/{id}/verify
async fn verify_pickup(
    state: web::Data<AppState>,
    path: web::Path<Uuid>,
    req: web::Json<VerifyPickupRequest>,
) -> Result<HttpResponse, AppError> {
    req.validate()?;

    let outcome = state
        .postgres
        .verify_pickup(path.into_inner(), &req.code, Utc::now())
        .await?;

    Ok(HttpResponse::Ok().json(transition_response(outcome)))
}

/// DELETE /api/v1/requests/{id}
async fn delete_request(
    state: web::Data<AppState>,
    path: web::Path<Uuid>,
) -> Result<HttpResponse, AppError> {
    let id = path.into_inner();

    state.postgres.delete_request(id, Utc::now()).await?;

    tracing::info!("Deleted request {}", id);

    Ok(HttpResponse::Ok().json(MessageResponse {
        message: "Request deleted successfully".to_string(),
    }))
}

fn transition_response(outcome: TransitionOutcome) -> RequestTransitionResponse {
    RequestTransitionResponse {
        request: outcome.request,
        transaction: outcome.transaction,
    }
}

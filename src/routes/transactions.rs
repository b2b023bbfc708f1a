use actix_web::{web, HttpResponse};
use chrono::Utc;
use uuid::Uuid;
use validator::Validate;

use crate::error::AppError;
use crate::models::{CreateReviewRequest, ReviewResponse, TransactionListQuery};
use crate::routes::users::{invalidate_user, load_user};
use crate::routes::{AppState, CallerId};

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.route("/transactions", web::get().to(list_transactions))
        .route("/transactions/{id}", web::get().to(get_transaction))
        .route("/reviews", web::post().to(create_review));
}

/// GET /api/v1/transactions?userId={id}
async fn list_transactions(
    state: web::Data<AppState>,
    query: web::Query<TransactionListQuery>,
) -> Result<HttpResponse, AppError> {
    let transactions = state.postgres.list_transactions(query.user_id).await?;

    Ok(HttpResponse::Ok().json(transactions))
}

/// GET /api/v1/transactions/{id}
async fn get_transaction(
    state: web::Data<AppState>,
    path: web::Path<Uuid>,
) -> Result<HttpResponse, AppError> {
    let transaction = state.postgres.get_transaction(path.into_inner()).await?;

    Ok(HttpResponse::Ok().json(transaction))
}

/// POST /api/v1/reviews
///
/// The reviewer is the caller named in `X-User-Id`.
async fn create_review(
    state: web::Data<AppState>,
    caller: CallerId,
    req: web::Json<CreateReviewRequest>,
) -> Result<HttpResponse, AppError> {
    req.validate()?;

    if caller.0 == req.reviewee_id {
        return Err(AppError::Validation("Users cannot review themselves".to_string()));
    }

    let reviewer = load_user(&state, caller.0).await?;
    let (review, trust_score) = state
        .postgres
        .create_review(reviewer.id, &req, Utc::now())
        .await?;

    invalidate_user(&state, req.reviewee_id).await;

    Ok(HttpResponse::Created().json(ReviewResponse {
        review,
        reviewee_trust_score: trust_score,
    }))
}

use actix_web::{web, HttpResponse};
use chrono::Utc;
use uuid::Uuid;
use validator::Validate;

use crate::error::AppError;
use crate::models::{CreateUserRequest, MessageResponse, UpdateUserRequest, User, UserListQuery};
use crate::routes::AppState;
use crate::services::{CacheError, CacheKey};

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.route("/users", web::post().to(create_user))
        .route("/users", web::get().to(list_users))
        .route("/users/{id}", web::get().to(get_user))
        .route("/users/{id}", web::put().to(update_user))
        .route("/users/{id}", web::delete().to(delete_user));
}

/// Load a user through the cache
///
/// Cache failures are logged and fall through to the database.
pub(crate) async fn load_user(state: &AppState, id: Uuid) -> Result<User, AppError> {
    let key = CacheKey::user(id);

    match state.cache.get::<User>(&key).await {
        Ok(user) => return Ok(user),
        Err(CacheError::CacheMiss(_)) => {}
        Err(e) => tracing::warn!("Cache read failed for {}: {}", key, e),
    }

    let user = state.postgres.get_user(id).await?;

    if let Err(e) = state.cache.set(&key, &user).await {
        tracing::warn!("Cache write failed for {}: {}", key, e);
    }

    Ok(user)
}

/// Drop a cached user after it changed
pub(crate) async fn invalidate_user(state: &AppState, id: Uuid) {
    let key = CacheKey::user(id);
    if let Err(e) = state.cache.delete(&key).await {
        tracing::warn!("Failed to invalidate cache for {}: {}", key, e);
    }
}

/// POST /api/v1/users
async fn create_user(
    state: web::Data<AppState>,
    req: web::Json<CreateUserRequest>,
) -> Result<HttpResponse, AppError> {
    req.validate()?;

    let user = state.postgres.create_user(&req, Utc::now()).await?;

    Ok(HttpResponse::Created().json(user))
}

/// GET /api/v1/users?email={email}
async fn list_users(
    state: web::Data<AppState>,
    query: web::Query<UserListQuery>,
) -> Result<HttpResponse, AppError> {
    let users = match query.email.as_deref() {
        Some(email) => state
            .postgres
            .find_user_by_email(email)
            .await?
            .into_iter()
            .collect(),
        None => state.postgres.list_users().await?,
    };

    Ok(HttpResponse::Ok().json(users))
}

/// GET /api/v1/users/{id}
async fn get_user(
    state: web::Data<AppState>,
    path: web::Path<Uuid>,
) -> Result<HttpResponse, AppError> {
    let user = load_user(&state, path.into_inner()).await?;

    Ok(HttpResponse::Ok().json(user))
}

/// PUT /api/v1/users/{id}
async fn update_user(
    state: web::Data<AppState>,
    path: web::Path<Uuid>,
    req: web::Json<UpdateUserRequest>,
) -> Result<HttpResponse, AppError> {
    req.validate()?;
    let id = path.into_inner();

    let user = state.postgres.update_user(id, &req, Utc::now()).await?;
    invalidate_user(&state, id).await;

    tracing::debug!("Updated user {}", id);

    Ok(HttpResponse::Ok().json(user))
}

/// DELETE /api/v1/users/{id}
async fn delete_user(
    state: web::Data<AppState>,
    path: web::Path<Uuid>,
) -> Result<HttpResponse, AppError> {
    let id = path.into_inner();

    if !state.postgres.delete_user(id).await? {
        return Err(AppError::NotFound(format!("User {} not found", id)));
    }
    invalidate_user(&state, id).await;

    tracing::info!("Deleted user {}", id);

    Ok(HttpResponse::Ok().json(MessageResponse {
        message: "User deleted successfully".to_string(),
    }))
}

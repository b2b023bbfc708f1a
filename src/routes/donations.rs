use actix_web::{web, HttpResponse};
use chrono::Utc;
use uuid::Uuid;
use validator::Validate;

use crate::core::calculate_bounding_box;
use crate::error::AppError;
use crate::models::{
    Coordinates, CreateDonationRequest, DonationListQuery, ExpireResponse, NearbyDonationsResponse,
    NearbyQuery, NearbySearch,
};
use crate::routes::users::load_user;
use crate::routes::{AppState, CallerId, SearchLimits};

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.route("/donations", web::post().to(create_donation))
        .route("/donations", web::get().to(list_donations))
        .route("/donations/nearby", web::get().to(search_nearby))
        .route("/donations/expire", web::post().to(expire_donations))
        .route("/donations/{id}", web::get().to(get_donation))
        .route("/donations/{id}/cancel", web::post().to(cancel_donation));
}

/// POST /api/v1/donations
///
/// The donor is the caller named in `X-User-Id`.
async fn create_donation(
    state: web::Data<AppState>,
    caller: CallerId,
    req: web::Json<CreateDonationRequest>,
) -> Result<HttpResponse, AppError> {
    req.validate()?;

    let now = Utc::now();
    if req.expiry_time <= now {
        return Err(AppError::Validation(
            "expiryTime must be in the future".to_string(),
        ));
    }

    let donor = load_user(&state, caller.0).await?;
    let donation = state.postgres.create_donation(donor.id, &req, now).await?;

    Ok(HttpResponse::Created().json(donation))
}

/// GET /api/v1/donations?donorId={id}&status={status}
async fn list_donations(
    state: web::Data<AppState>,
    query: web::Query<DonationListQuery>,
) -> Result<HttpResponse, AppError> {
    let donations = state
        .postgres
        .list_donations(query.donor_id, query.status)
        .await?;

    Ok(HttpResponse::Ok().json(donations))
}

/// Turn the query string into a search, applying defaults and caps
fn nearby_search(query: &NearbyQuery, limits: &SearchLimits) -> NearbySearch {
    let limit = query
        .limit
        .unwrap_or(limits.default_limit)
        .min(limits.max_limit);

    NearbySearch {
        origin: Coordinates::new(query.latitude, query.longitude),
        radius_km: query.radius.unwrap_or(limits.radius_km),
        category: query.category,
        search: query
            .search
            .as_deref()
            .map(str::trim)
            .filter(|term| !term.is_empty())
            .map(str::to_string),
        limit: limit as usize,
        offset: query.offset.unwrap_or(0) as usize,
    }
}

/// GET /api/v1/donations/nearby
///
/// Query parameters: latitude, longitude, radius (km), category, search,
/// limit, offset.
async fn search_nearby(
    state: web::Data<AppState>,
    query: web::Query<NearbyQuery>,
) -> Result<HttpResponse, AppError> {
    query.validate()?;

    let now = Utc::now();
    let search = nearby_search(&query, &state.limits);

    let bounding_box = calculate_bounding_box(
        search.origin.latitude,
        search.origin.longitude,
        search.radius_km,
    );
    let candidates = state
        .postgres
        .nearby_candidates(&search.origin, &bounding_box, now)
        .await?;

    let result = state.matcher.find_nearby(&search, candidates, now);

    tracing::info!(
        "Nearby search at ({}, {}) within {} km: {} of {} candidates matched",
        search.origin.latitude,
        search.origin.longitude,
        search.radius_km,
        result.total_matches,
        result.total_candidates
    );

    Ok(HttpResponse::Ok().json(NearbyDonationsResponse {
        donations: result.donations,
        radius_km: search.radius_km,
        total_results: result.total_matches,
    }))
}

/// POST /api/v1/donations/expire
async fn expire_donations(state: web::Data<AppState>) -> Result<HttpResponse, AppError> {
    let expired = state.postgres.expire_donations(Utc::now()).await?;

    Ok(HttpResponse::Ok().json(ExpireResponse { expired }))
}

/// GET /api/v1/donations/{id}
async fn get_donation(
    state: web::Data<AppState>,
    path: web::Path<Uuid>,
) -> Result<HttpResponse, AppError> {
    let donation = state.postgres.get_donation(path.into_inner()).await?;

    Ok(HttpResponse::Ok().json(donation))
}

/// POST /api/v1/donations/{id}/cancel
async fn cancel_donation(
    state: web::Data<AppState>,
    path: web::Path<Uuid>,
) -> Result<HttpResponse, AppError> {
    let donation = state
        .postgres
        .cancel_donation(path.into_inner(), Utc::now())
        .await?;

    Ok(HttpResponse::Ok().json(donation))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::FoodCategory;

    fn query() -> NearbyQuery {
        NearbyQuery {
            latitude: -6.2088,
            longitude: 106.8456,
            radius: None,
            category: None,
            search: None,
            limit: None,
            offset: None,
        }
    }

    #[test]
    fn test_nearby_search_defaults() {
        let search = nearby_search(&query(), &SearchLimits::default());

        assert_eq!(search.radius_km, 5.0);
        assert_eq!(search.limit, 20);
        assert_eq!(search.offset, 0);
        assert!(search.search.is_none());
    }

    #[test]
    fn test_nearby_search_caps_limit() {
        let mut q = query();
        q.limit = Some(5000);
        q.offset = Some(40);
        q.radius = Some(12.5);
        q.category = Some(FoodCategory::Fruits);
        q.search = Some("  mango ".to_string());

        let search = nearby_search(&q, &SearchLimits::default());

        assert_eq!(search.limit, 100);
        assert_eq!(search.offset, 40);
        assert_eq!(search.radius_km, 12.5);
        assert_eq!(search.category, Some(FoodCategory::Fruits));
        assert_eq!(search.search.as_deref(), Some("mango"));
    }

    #[test]
    fn test_blank_search_term_is_ignored() {
        let mut q = query();
        q.search = Some("   ".to_string());

        assert!(nearby_search(&q, &SearchLimits::default()).search.is_none());
    }
}

// Route exports
pub mod donations;
pub mod health;
pub mod requests;
pub mod transactions;
pub mod users;

use actix_web::{dev::Payload, web, FromRequest, HttpRequest};
use std::future::{ready, Ready};
use std::sync::Arc;
use uuid::Uuid;

use crate::config::MatchingSettings;
use crate::core::Matcher;
use crate::error::{
    handle_json_payload_error, handle_path_error, handle_query_payload_error, AppError,
};
use crate::services::{CacheManager, PostgresClient};

/// Header carrying the acting user's id
pub const CALLER_HEADER: &str = "X-User-Id";

/// Application state shared across all handlers
#[derive(Clone)]
pub struct AppState {
    pub postgres: Arc<PostgresClient>,
    pub cache: Arc<CacheManager>,
    pub matcher: Matcher,
    pub limits: SearchLimits,
}

/// Defaults and caps for the nearby search
#[derive(Debug, Clone, Copy)]
pub struct SearchLimits {
    pub radius_km: f64,
    pub default_limit: u32,
    pub max_limit: u32,
}

impl From<&MatchingSettings> for SearchLimits {
    fn from(settings: &MatchingSettings) -> Self {
        Self {
            radius_km: settings.search_radius_km,
            default_limit: settings.default_limit,
            max_limit: settings.max_limit,
        }
    }
}

impl Default for SearchLimits {
    fn default() -> Self {
        Self::from(&MatchingSettings::default())
    }
}

/// The acting user, taken from the `X-User-Id` header
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CallerId(pub Uuid);

impl FromRequest for CallerId {
    type Error = AppError;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _payload: &mut Payload) -> Self::Future {
        ready(caller_from_request(req))
    }
}

fn caller_from_request(req: &HttpRequest) -> Result<CallerId, AppError> {
    let raw = req
        .headers()
        .get(CALLER_HEADER)
        .ok_or_else(|| AppError::Validation(format!("Missing {} header", CALLER_HEADER)))?
        .to_str()
        .map_err(|_| AppError::Validation(format!("{} header is not valid text", CALLER_HEADER)))?;

    Uuid::parse_str(raw.trim())
        .map(CallerId)
        .map_err(|_| AppError::Validation(format!("{} header must be a UUID", CALLER_HEADER)))
}

/// Extractor error handlers plus every route
pub fn configure_app(cfg: &mut web::ServiceConfig) {
    cfg.app_data(web::JsonConfig::default().error_handler(handle_json_payload_error))
        .app_data(web::QueryConfig::default().error_handler(handle_query_payload_error))
        .app_data(web::PathConfig::default().error_handler(handle_path_error))
        .configure(configure_routes);
}

pub fn configure_routes(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/api/v1")
            .configure(health::configure)
            .configure(users::configure)
            .configure(donations::configure)
            .configure(requests::configure)
            .configure(transactions::configure),
    );
}

use std::sync::Arc;

use axum::{
    body::Body,
    extract::State,
    http::Request,
    middleware::Next,
    response::Response,
};
use axum_extra::typed_header::{TypedHeader, TypedHeaderRejection};
use headers::{Authorization, authorization::Bearer};

use shared_config::AppConfig;
use shared_models::error::AppError;

use crate::jwt::validate_token;

/// Validates the bearer token and stores the caller in request extensions.
pub async fn auth_middleware(
    State(config): State<Arc<AppConfig>>,
    auth: Result<TypedHeader<Authorization<Bearer>>, TypedHeaderRejection>,
    mut request: Request<Body>,
    next: Next,
) -> Result<Response, AppError> {
    let TypedHeader(Authorization(bearer)) = auth.map_err(|rejection| {
        if rejection.is_missing() {
            AppError::Auth("Missing authorization header".to_string())
        } else {
            AppError::Auth("Invalid authorization header format".to_string())
        }
    })?;

    let user = validate_token(bearer.token(), &config.supabase_jwt_secret)
        .map_err(|e| AppError::Auth(e.to_string()))?;

    request.extensions_mut().insert(user);

    Ok(next.run(request).await)
}

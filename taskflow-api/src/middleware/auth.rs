/// JWT authentication middleware
///
/// Extracts and validates the access token from the `Authorization` header,
/// reloads the user, then injects an [`AuthContext`] into request extensions.
///
/// # Errors
///
/// - 401 Unauthorized: header missing, token invalid or expired, user missing or inactive
/// - 400 Bad Request: header is not `Bearer <token>`

use crate::{app::AppState, error::ApiError};
use axum::{
    extract::{Request, State},
    http::header::AUTHORIZATION,
    middleware::Next,
    response::Response,
};
use taskflow_shared::auth::{
    jwt,
    middleware::{parse_bearer_token, AuthContext, AuthError},
};
use taskflow_shared::models::user::User;

pub async fn jwt_auth_layer(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let header = req.headers().get(AUTHORIZATION).and_then(|v| v.to_str().ok());
    let token = parse_bearer_token(header)?;

    let claims = jwt::validate_access_token(token, &state.config.jwt.access_secret)?;

    // Role and activation come from the database, not the token
    let user = User::find_by_id(&state.db, claims.sub)
        .await?
        .filter(|user| user.is_active)
        .ok_or(AuthError::InactiveUser)?;

    req.extensions_mut().insert(AuthContext::from_user(&user));

    Ok(next.run(req).await)
}

use axum::{
    body::Body,
    http::Request,
    middleware::Next,
    response::Response,
};
use uuid::Uuid;

use shared_models::auth::{CallerContext, Role};
use shared_models::error::AppError;

/// Header carrying the gateway-resolved caller id.
pub const CALLER_ID_HEADER: &str = "x-caller-id";
/// Header carrying the gateway-resolved caller role.
pub const CALLER_ROLE_HEADER: &str = "x-caller-role";

// Middleware resolving the caller context from gateway-injected headers.
// Identity resolution itself happens upstream; this only threads the
// pre-resolved caller into request extensions.
pub async fn caller_middleware(
    mut request: Request<Body>,
    next: Next,
) -> Result<Response, AppError> {
    let identity = header_value(&request, CALLER_ID_HEADER)?;
    let identity = Uuid::parse_str(&identity)
        .map_err(|_| AppError::Auth("Malformed caller id".to_string()))?;

    let role = header_value(&request, CALLER_ROLE_HEADER)?;
    let role: Role = role
        .parse()
        .map_err(|e: String| AppError::Auth(e))?;

    request
        .extensions_mut()
        .insert(CallerContext::new(identity, role));
    request.extensions_mut().insert(role);

    Ok(next.run(request).await)
}

fn header_value(request: &Request<Body>, name: &str) -> Result<String, AppError> {
    request
        .headers()
        .get(name)
        .ok_or_else(|| AppError::Auth(format!("Missing {} header", name)))?
        .to_str()
        .map(|v| v.to_string())
        .map_err(|_| AppError::Auth(format!("Invalid {} header", name)))
}

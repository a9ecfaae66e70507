use axum::body::Body;
use axum::http::{header::CONTENT_TYPE, Method, Request};
use serde_json::Value;
use uuid::Uuid;

use shared_models::auth::Role;

use crate::extractor::{CALLER_ID_HEADER, CALLER_ROLE_HEADER};

/// Fixture caller for router-level tests.
pub struct TestCaller {
    pub id: Uuid,
    pub role: Role,
}

impl TestCaller {
    pub fn new(role: Role) -> Self {
        Self {
            id: Uuid::new_v4(),
            role,
        }
    }

    pub fn admin() -> Self {
        Self::new(Role::Admin)
    }

    pub fn practitioner() -> Self {
        Self::new(Role::Practitioner)
    }

    pub fn client() -> Self {
        Self::new(Role::Client)
    }

    pub fn with_id(id: Uuid, role: Role) -> Self {
        Self { id, role }
    }
}

/// Build a request carrying the gateway caller headers, optionally with a
/// JSON body.
pub fn authed_request(
    method: Method,
    uri: &str,
    caller: &TestCaller,
    body: Option<Value>,
) -> Request<Body> {
    let builder = Request::builder()
        .method(method)
        .uri(uri)
        .header(CALLER_ID_HEADER, caller.id.to_string())
        .header(CALLER_ROLE_HEADER, caller.role.to_string());

    match body {
        Some(json) => builder
            .header(CONTENT_TYPE, "application/json")
            .body(Body::from(json.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    }
}

use std::convert::Infallible;

use axum::{extract::FromRequestParts, http::request::Parts};

use crate::ids::rid;
use crate::logging::LogContext;
use crate::routes::SharedState;

/// Set by Cloudflare Access in front of the service.
///
/// The value is trusted as sent; the Access JWT is not verified here, so the
/// service must only be reachable through Access.
pub const ACCESS_EMAIL_HEADER: &str = "cf-access-authenticated-user-email";
const REQUEST_ID_HEADERS: [&str; 2] = ["x-request-id", "cf-ray"];

/// Caller identity and request id, read from headers.
///
/// Falls back to the configured dev user when the Access header is absent.
#[derive(Debug, Clone)]
pub struct RequestContext {
    pub user_email: String,
    pub request_id: String,
}

impl RequestContext {
    pub fn log_context(&self) -> LogContext {
        LogContext::new()
            .with("request_id", self.request_id.clone())
            .with("user", self.user_email.clone())
    }
}

fn header_value(parts: &Parts, name: &str) -> Option<String> {
    parts
        .headers
        .get(name)
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(str::to_string)
}

impl FromRequestParts<SharedState> for RequestContext {
    type Rejection = Infallible;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &SharedState,
    ) -> Result<Self, Self::Rejection> {
        let user_email = header_value(parts, ACCESS_EMAIL_HEADER)
            .unwrap_or_else(|| state.dev_user_email.clone());
        let request_id = REQUEST_ID_HEADERS
            .iter()
            .find_map(|name| header_value(parts, name))
            .unwrap_or_else(|| rid("req_"));
        Ok(Self {
            user_email,
            request_id,
        })
    }
}

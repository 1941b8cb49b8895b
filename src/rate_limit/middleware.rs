//! Axum middleware enforcing a named rate-limit policy.
//!
//! ```ignore
//! let state = Arc::new(RateLimitState::new(limiter, "lead_capture"));
//! let app = Router::new()
//!     .route("/api/leads", post(capture_lead))
//!     .layer(middleware::from_fn_with_state(state, enforce));
//! ```

use std::sync::Arc;

use axum::{
    Json,
    body::Body,
    extract::State,
    http::{HeaderMap, HeaderValue, Request, StatusCode, header::RETRY_AFTER},
    middleware::Next,
    response::{IntoResponse, Response},
};
use serde_json::json;
use tracing::warn;

use super::{RateLimitDecision, RateLimiter, client_identity, duration_millis};

/// Remaining requests in the window.
pub const REMAINING_HEADER: &str = "x-ratelimit-remaining";
/// Window end, epoch seconds.
pub const RESET_HEADER: &str = "x-ratelimit-reset";

/// Shared state for [`enforce`].
#[derive(Debug, Clone)]
pub struct RateLimitState {
    limiter: Arc<RateLimiter>,
    policy: String,
}

impl RateLimitState {
    /// Enforce `policy` from `limiter`'s configuration.
    pub fn new(limiter: Arc<RateLimiter>, policy: impl Into<String>) -> Self {
        Self {
            limiter,
            policy: policy.into(),
        }
    }
}

/// Rate-limit middleware. Denied requests get `429` with `Retry-After`.
pub async fn enforce(
    State(state): State<Arc<RateLimitState>>,
    request: Request<Body>,
    next: Next,
) -> Response {
    let client = client_identity(request.headers());
    let decision = state.limiter.check_policy(&state.policy, &client);

    if !decision.allowed {
        warn!(policy = %state.policy, client = %client, path = %request.uri().path(), "Rate limit exceeded");
        return rate_limited_response(&decision, state.limiter.now_millis());
    }

    let mut response = next.run(request).await;
    apply_headers(response.headers_mut(), &decision);
    response
}

fn apply_headers(headers: &mut HeaderMap, decision: &RateLimitDecision) {
    headers.insert(REMAINING_HEADER, HeaderValue::from(decision.remaining));
    headers.insert(RESET_HEADER, HeaderValue::from(decision.reset_time.div_ceil(1000)));
}

/// Create a 429 Too Many Requests response
fn rate_limited_response(decision: &RateLimitDecision, now_ms: u64) -> Response {
    let retry_after = duration_millis(decision.retry_after(now_ms))
        .div_ceil(1000)
        .max(1);
    let mut response = (
        StatusCode::TOO_MANY_REQUESTS,
        Json(json!({
            "error": "Too many requests. Please try again later.",
            "retryAfter": retry_after,
        })),
    )
        .into_response();

    let headers = response.headers_mut();
    headers.insert(RETRY_AFTER, HeaderValue::from(retry_after));
    apply_headers(headers, decision);
    response
}

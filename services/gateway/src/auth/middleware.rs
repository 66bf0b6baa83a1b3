//! Request middleware: authenticate -> authorize -> throttle -> audit.
//!
//! Layered per router group (see `build_router`): every protected route
//! runs `authenticate` then a throttle class; admin routes add
//! `require_admin` and use the tighter sensitive budget.

use axum::{
    extract::{Request, State},
    http::{header, HeaderMap},
    middleware::Next,
    response::{IntoResponse, Response},
};

use errors::EntregaError;

use crate::audit::{AuditEvent, Decision};
use crate::error::ApiError;
use crate::AppState;

use super::rate_limit::RouteClass;
use super::{policy, Principal, Role};

fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(header::AUTHORIZATION)?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")
}

/// Best-effort client address for the audit trail.
fn client_ip(headers: &HeaderMap) -> Option<String> {
    let forwarded = headers.get("x-forwarded-for")?.to_str().ok()?;
    let first = forwarded.split(',').next()?.trim();
    (!first.is_empty()).then(|| first.to_string())
}

/// Verify the bearer token and attach the principal to the request.
///
/// Missing, malformed, tampered and expired tokens are distinguished in
/// the audit record but all answer the same generic 401.
pub async fn authenticate(State(state): State<AppState>, mut req: Request, next: Next) -> Response {
    let method = req.method().to_string();
    let path = req.uri().path().to_string();
    let ip = client_ip(req.headers());

    let verified = match bearer_token(req.headers()) {
        Some(token) => state.codec.verify(token),
        None => Err(EntregaError::Unauthorized("missing bearer token".to_string())),
    };

    match verified {
        Ok(principal) => {
            req.extensions_mut().insert(principal);
            next.run(req).await
        },
        Err(err) => {
            state.audit.record(
                AuditEvent::anonymous(&method, &path, ip, Decision::Unauthenticated)
                    .with_detail(err.error_code()),
            );
            ApiError(EntregaError::Unauthorized("authentication required".to_string()))
                .into_response()
        },
    }
}

/// General-budget rate limiting for authenticated routes.
pub async fn throttle_general(
    State(state): State<AppState>,
    req: Request,
    next: Next,
) -> Response {
    throttle(state, req, next, RouteClass::General).await
}

/// Tighter budget for admin surfaces.
pub async fn throttle_sensitive(
    State(state): State<AppState>,
    req: Request,
    next: Next,
) -> Response {
    throttle(state, req, next, RouteClass::Sensitive).await
}

async fn throttle(state: AppState, req: Request, next: Next, class: RouteClass) -> Response {
    let method = req.method().to_string();
    let path = req.uri().path().to_string();
    let ip = client_ip(req.headers());

    // Authenticate always runs in front of a throttle layer.
    let Some(principal) = req.extensions().get::<Principal>().cloned() else {
        return ApiError(EntregaError::Unauthorized("authentication required".to_string()))
            .into_response();
    };

    match state.limiter.check(principal.id, class) {
        Ok(()) => {
            state.audit.record(AuditEvent::for_principal(
                &principal,
                &method,
                &path,
                ip,
                Decision::Allow,
            ));
            next.run(req).await
        },
        Err(err) => {
            state.audit.record(AuditEvent::for_principal(
                &principal,
                &method,
                &path,
                ip,
                Decision::RateLimited,
            ));
            ApiError(err).into_response()
        },
    }
}

/// Route-level admin gate.
pub async fn require_admin(State(state): State<AppState>, req: Request, next: Next) -> Response {
    let method = req.method().to_string();
    let path = req.uri().path().to_string();
    let ip = client_ip(req.headers());

    let Some(principal) = req.extensions().get::<Principal>().cloned() else {
        return ApiError(EntregaError::Unauthorized("authentication required".to_string()))
            .into_response();
    };

    match policy::authorize(&principal, &[Role::Admin]) {
        Ok(()) => next.run(req).await,
        Err(denial) => {
            state.audit.record(
                AuditEvent::for_principal(&principal, &method, &path, ip, Decision::Forbidden)
                    .with_detail(denial.detail()),
            );
            ApiError(denial.into_error()).into_response()
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn bearer_token_extraction() {
        let mut headers = HeaderMap::new();
        assert!(bearer_token(&headers).is_none());

        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Basic abc"));
        assert!(bearer_token(&headers).is_none());

        headers.insert(
            header::AUTHORIZATION,
            HeaderValue::from_static("Bearer tok123"),
        );
        assert_eq!(bearer_token(&headers), Some("tok123"));
    }

    #[test]
    fn forwarded_ip_takes_first_hop() {
        let mut headers = HeaderMap::new();
        assert!(client_ip(&headers).is_none());

        headers.insert(
            "x-forwarded-for",
            HeaderValue::from_static("203.0.113.9, 10.0.0.1"),
        );
        assert_eq!(client_ip(&headers).as_deref(), Some("203.0.113.9"));
    }
}

use actix_web::body::{EitherBody, MessageBody};
use actix_web::dev::{ServiceRequest, ServiceResponse};
use actix_web::http::Method;
use actix_web::middleware::{DefaultHeaders, Next};
use actix_web::{web, Error, ResponseError};
use tracing::warn;

use crate::error::{AppError, AuthError};
use crate::security::threat;
use crate::AppState;

fn reject<B>(req: ServiceRequest, err: AppError) -> ServiceResponse<EitherBody<B>> {
    req.into_response(err.error_response()).map_into_right_body()
}

/// Browser hardening headers added to every response that does not set
/// them itself.
pub fn security_headers() -> DefaultHeaders {
    DefaultHeaders::new()
        .add(("Strict-Transport-Security", "max-age=31536000; includeSubDomains"))
        .add((
            "Content-Security-Policy",
            "default-src 'self'; img-src 'self' data: https:; script-src 'self'; \
             style-src 'self' 'unsafe-inline'; font-src 'self' data:; connect-src 'self' https:",
        ))
        .add(("X-Frame-Options", "SAMEORIGIN"))
        .add(("X-Content-Type-Options", "nosniff"))
        .add(("X-XSS-Protection", "1; mode=block"))
        .add(("Referrer-Policy", "strict-origin-when-cross-origin"))
        .add(("Permissions-Policy", "geolocation=(), microphone=(), camera=()"))
}

/// App-wide gate: refuses blacklisted addresses, then applies the global
/// request limit.
pub async fn client_guard<B: MessageBody>(
    req: ServiceRequest,
    next: Next<B>,
) -> Result<ServiceResponse<EitherBody<B>>, Error> {
    let Some(state) = req.app_data::<web::Data<AppState>>().cloned() else {
        return next.call(req).await.map(ServiceResponse::map_into_left_body);
    };
    let security = &state.security;
    let ip = security.client_ip(req.request());

    if security.blacklist.is_blacklisted(&ip).await {
        warn!(ip, path = req.path(), "Blocked request from blacklisted IP");
        return Ok(reject(req, AuthError::AccessDenied.into()));
    }

    if !security.global_limiter.check_rate_limit(&ip).await {
        let strikes = security.blacklist.track_attempt(&ip).await;
        warn!(ip, strikes, "Rate limit exceeded");
        return Ok(reject(req, AuthError::RateLimited.into()));
    }

    next.call(req).await.map(ServiceResponse::map_into_left_body)
}

/// Bans the caller for the configured threat period when the path or any
/// query value looks like an attack payload.
pub async fn threat_guard<B: MessageBody>(
    req: ServiceRequest,
    next: Next<B>,
) -> Result<ServiceResponse<EitherBody<B>>, Error> {
    let Some(state) = req.app_data::<web::Data<AppState>>().cloned() else {
        return next.call(req).await.map(ServiceResponse::map_into_left_body);
    };

    let found = threat::detect(req.path()).or_else(|| {
        let query = req.query_string();
        match web::Query::<Vec<(String, String)>>::from_query(query) {
            Ok(pairs) => pairs.iter().find_map(|(_, value)| threat::detect(value)),
            Err(_) => threat::detect(query),
        }
    });

    if let Some(kind) = found {
        let security = &state.security;
        let ip = security.client_ip(req.request());
        security.blacklist.add(&ip, security.threat_ban).await;
        warn!(ip, %kind, path = req.path(), "Security threat detected");
        return Ok(reject(
            req,
            AppError::Blocked("Malicious request detected".to_string()),
        ));
    }

    next.call(req).await.map(ServiceResponse::map_into_left_body)
}

/// Tighter limit for the login endpoints.
pub async fn auth_throttle<B: MessageBody>(
    req: ServiceRequest,
    next: Next<B>,
) -> Result<ServiceResponse<EitherBody<B>>, Error> {
    let Some(state) = req.app_data::<web::Data<AppState>>().cloned() else {
        return next.call(req).await.map(ServiceResponse::map_into_left_body);
    };
    let security = &state.security;
    let ip = security.client_ip(req.request());

    if !security.auth_limiter.check_rate_limit(&ip).await {
        let strikes = security.blacklist.track_attempt(&ip).await;
        warn!(ip, strikes, "Auth rate limit exceeded");
        return Ok(reject(
            req,
            AppError::Throttled(
                "Too many authentication attempts. Please try again later.".to_string(),
            ),
        ));
    }

    next.call(req).await.map(ServiceResponse::map_into_left_body)
}

/// Limits order placement per client. Only `POST` counts; reads pass through.
pub async fn order_throttle<B: MessageBody>(
    req: ServiceRequest,
    next: Next<B>,
) -> Result<ServiceResponse<EitherBody<B>>, Error> {
    if req.method() != Method::POST {
        return next.call(req).await.map(ServiceResponse::map_into_left_body);
    }
    let Some(state) = req.app_data::<web::Data<AppState>>().cloned() else {
        return next.call(req).await.map(ServiceResponse::map_into_left_body);
    };
    let ip = state.security.client_ip(req.request());

    if !state.security.order_limiter.check_rate_limit(&ip).await {
        warn!(ip, "Order creation rate limit exceeded");
        return Ok(reject(
            req,
            AppError::Throttled(
                "Too many orders. Please wait before creating another order.".to_string(),
            ),
        ));
    }

    next.call(req).await.map(ServiceResponse::map_into_left_body)
}

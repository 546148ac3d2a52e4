use std::future::{ready, Ready};

use actix_web::{dev::Payload, web, FromRequest, HttpRequest};
use tracing::warn;

use crate::auth::token::Claims;
use crate::error::{AppError, AuthError};
use crate::AppState;

/// A caller holding a valid session token. Taking it as a handler argument
/// restricts that handler to logged-in users.
#[derive(Debug, Clone)]
pub struct Session(pub Claims);

impl Session {
    pub fn email(&self) -> &str {
        &self.0.sub
    }
}

fn bearer_token(req: &HttpRequest) -> Option<&str> {
    req.headers()
        .get("Authorization")
        .and_then(|h| h.to_str().ok())
        .and_then(|h| h.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|token| !token.is_empty())
}

impl FromRequest for Session {
    type Error = AppError;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _: &mut Payload) -> Self::Future {
        let Some(state) = req.app_data::<web::Data<AppState>>() else {
            return ready(Err(AppError::InternalError("application state missing".into())));
        };
        let Some(token) = bearer_token(req) else {
            return ready(Err(AuthError::InvalidToken.into()));
        };

        ready(
            state
                .auth_service
                .validate_token(token)
                .map(Session)
                .inspect_err(|e| warn!(path = req.path(), "Rejected session token: {}", e)),
        )
    }
}

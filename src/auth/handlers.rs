use actix_web::{web, HttpRequest, HttpResponse};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::error::AppError;
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct SendCodeRequest {
    #[serde(default)]
    pub email: String,
}

#[derive(Debug, Deserialize)]
pub struct VerifyCodeRequest {
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub code: String,
}

#[derive(Debug, Serialize)]
pub struct AuthResponse {
    pub success: bool,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
}

/// Body extractor settings for the API: undecodable payloads get the same
/// `{success, message}` shape as every other failure.
pub fn json_config() -> web::JsonConfig {
    web::JsonConfig::default()
        .limit(16 * 1024)
        .error_handler(|err, _req| {
            warn!("Rejected request body: {}", err);
            AppError::ValidationError("Invalid request".to_string()).into()
        })
}

pub async fn send_code(
    req: web::Json<SendCodeRequest>,
    state: web::Data<AppState>,
) -> Result<HttpResponse, AppError> {
    let email = req.email.trim();
    if email.is_empty() {
        return Err(AppError::ValidationError("Email is required".to_string()));
    }

    info!("Received login code request for email: {}", email);
    state.auth_service.send_code(email).await?;

    Ok(HttpResponse::Ok().json(AuthResponse {
        success: true,
        message: format!("Verification code sent to {}", email),
        token: None,
    }))
}

pub async fn verify_code(
    http_req: HttpRequest,
    req: web::Json<VerifyCodeRequest>,
    state: web::Data<AppState>,
) -> Result<HttpResponse, AppError> {
    let email = req.email.trim();
    let code = req.code.trim();
    if email.is_empty() || code.is_empty() {
        return Err(AppError::ValidationError("Email and code are required".to_string()));
    }

    let token = state.auth_service.verify_code(email, code).await?;

    let ip = state.security.client_ip(&http_req);
    state.security.blacklist.reset_attempts(&ip).await;
    info!("Login successful for email: {}", email);

    Ok(HttpResponse::Ok().json(AuthResponse {
        success: true,
        message: "Login successful".to_string(),
        token: Some(token),
    }))
}

pub mod auth;
pub mod catalog;
pub mod config;
pub mod db;
pub mod error;
pub mod orders;
pub mod security;

use std::sync::Arc;
use std::time::Duration;

use actix_web::{middleware::from_fn, web, HttpResponse};
use tracing::warn;

pub use error::AppError;
pub type Result<T> = std::result::Result<T, AppError>;
pub use crate::config::Settings;

pub use auth::{AuthService, CodeMailer, OtpStore, TracingMailer};
pub use catalog::CatalogService;
pub use db::{CatalogStore, DbOperations, OrderStore, User, UserDirectory};
pub use orders::OrderService;
pub use security::SecurityGuard;

/// Health check endpoint handler
/// Returns a JSON response with server status and timestamp
pub async fn health_check() -> HttpResponse {
    HttpResponse::Ok().json(serde_json::json!({
        "status": "healthy",
        "timestamp": chrono::Utc::now().to_rfc3339()
    }))
}

/// Malformed ids in the path get the usual `{success, message}` body.
fn path_config() -> web::PathConfig {
    web::PathConfig::default().error_handler(|err, _req| {
        warn!("Rejected path parameter: {}", err);
        AppError::ValidationError("Invalid ID format".to_string()).into()
    })
}

/// Registers every API route. Wrap the resulting app with
/// [`security::middleware::client_guard`] and
/// [`security::middleware::threat_guard`] to get the app-wide protection.
pub fn configure(cfg: &mut web::ServiceConfig) {
    use catalog::handlers as catalog_api;
    use orders::handlers as orders_api;

    cfg.app_data(auth::handlers::json_config())
        .app_data(path_config())
        .route("/api/health", web::get().to(health_check))
        .service(
            web::scope("/api/auth")
                .wrap(from_fn(security::middleware::auth_throttle))
                .route("/send-code", web::post().to(auth::handlers::send_code))
                .route("/verify-code", web::post().to(auth::handlers::verify_code)),
        )
        .service(
            web::scope("/api/admin")
                .service(
                    web::resource("/products")
                        .route(web::get().to(catalog_api::admin_list_products))
                        .route(web::post().to(catalog_api::create_product)),
                )
                .service(
                    web::resource("/products/{id}")
                        .route(web::put().to(catalog_api::update_product))
                        .route(web::delete().to(catalog_api::delete_product)),
                )
                .route("/products/{id}/toggle", web::patch().to(catalog_api::toggle_product))
                .service(
                    web::resource("/qris")
                        .route(web::get().to(catalog_api::list_qris))
                        .route(web::post().to(catalog_api::create_qris)),
                )
                .service(
                    web::resource("/qris/{id}")
                        .route(web::put().to(catalog_api::update_qris))
                        .route(web::delete().to(catalog_api::delete_qris)),
                ),
        )
        .route("/api/products", web::get().to(catalog_api::list_products))
        .route("/api/products/{id}", web::get().to(catalog_api::get_product))
        .route("/api/products/{id}/qris", web::get().to(catalog_api::product_qris))
        .service(
            web::resource("/api/orders")
                .wrap(from_fn(security::middleware::order_throttle))
                .route(web::post().to(orders_api::create_order))
                .route(web::get().to(orders_api::list_orders)),
        )
        // Fixed segments before `{id}` so they are not read as ids.
        .route("/api/orders/pending-count", web::get().to(orders_api::pending_count))
        .route(
            "/api/orders/customer/{identifier}",
            web::get().to(orders_api::customer_orders),
        )
        .service(
            web::resource("/api/orders/{id}")
                .route(web::get().to(orders_api::get_order))
                .route(web::delete().to(orders_api::delete_order)),
        )
        .route("/api/orders/{id}/status", web::put().to(orders_api::update_status));
}

/// Storage and delivery backends the services are built on.
pub struct Backends {
    pub users: Arc<dyn UserDirectory>,
    pub catalog: Arc<dyn CatalogStore>,
    pub orders: Arc<dyn OrderStore>,
    pub mailer: Arc<dyn CodeMailer>,
}

/// Application state shared across all components
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Settings>,
    pub auth_service: Arc<AuthService>,
    pub catalog: Arc<CatalogService>,
    pub orders: Arc<OrderService>,
    pub security: Arc<SecurityGuard>,
}

impl AppState {
    /// Production wiring: everything is stored in PostgreSQL, codes go to the
    /// log until a real mailer is plugged in.
    pub fn new(config: Settings) -> Result<Self> {
        let db = Arc::new(DbOperations::new_lazy(
            &config.database.url,
            config.database.max_connections,
            Duration::from_secs(config.database.acquire_timeout_seconds),
        )?);

        Ok(Self::with_backends(
            config,
            Backends {
                users: db.clone(),
                catalog: db.clone(),
                orders: db,
                mailer: Arc::new(TracingMailer),
            },
        ))
    }

    pub fn with_backends(config: Settings, backends: Backends) -> Self {
        let auth_service = AuthService::from_config(&config.auth, backends.users, backends.mailer);
        let catalog = CatalogService::new(backends.catalog);
        let orders = OrderService::new(
            backends.orders,
            chrono::Duration::hours(config.orders.cancelled_retention_hours),
        );
        let security = SecurityGuard::from_config(&config.security);

        Self {
            config: Arc::new(config),
            auth_service: Arc::new(auth_service),
            catalog: Arc::new(catalog),
            orders: Arc::new(orders),
            security: Arc::new(security),
        }
    }

    /// Periodic housekeeping: lapsed bans, idle rate windows and, when a
    /// sweep interval is configured, expired login codes.
    pub fn spawn_maintenance(&self) {
        let security = self.security.clone();
        let period = Duration::from_secs(self.config.security.cleanup_interval_seconds.max(1));
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            loop {
                ticker.tick().await;
                security.cleanup().await;
            }
        });

        let sweep = self.config.auth.sweep_interval_seconds;
        if sweep > 0 {
            let auth_service = self.auth_service.clone();
            tokio::spawn(async move {
                let mut ticker = tokio::time::interval(Duration::from_secs(sweep));
                loop {
                    ticker.tick().await;
                    auth_service.codes().purge_expired().await;
                }
            });
        }
    }
}

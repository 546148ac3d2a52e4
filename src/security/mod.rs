//! Abuse protection for the HTTP surface: per-IP rate limits, attack
//! pattern screening and a temporary blacklist fed by both.

mod blacklist;
pub mod middleware;
mod rate_limit;
pub mod threat;

pub use blacklist::IpBlacklist;
pub use rate_limit::{RateLimitPolicy, RateLimiter};

use actix_web::HttpRequest;
use chrono::Duration;
use tracing::debug;

use crate::config::SecurityConfig;

pub struct SecurityGuard {
    pub blacklist: IpBlacklist,
    pub global_limiter: RateLimiter,
    pub auth_limiter: RateLimiter,
    pub order_limiter: RateLimiter,
    pub threat_ban: Duration,
    trust_proxy_headers: bool,
}

impl SecurityGuard {
    pub fn from_config(config: &SecurityConfig) -> Self {
        let window_size = Duration::seconds(config.window_seconds);
        Self {
            blacklist: IpBlacklist::new(
                config.blacklist_threshold,
                Duration::hours(config.blacklist_hours),
            ),
            global_limiter: RateLimiter::new(RateLimitPolicy {
                max_requests: config.global_max_requests,
                window_size,
            }),
            auth_limiter: RateLimiter::new(RateLimitPolicy {
                max_requests: config.auth_max_requests,
                window_size,
            }),
            order_limiter: RateLimiter::new(RateLimitPolicy {
                max_requests: config.order_max_requests,
                window_size: Duration::seconds(config.order_window_seconds),
            }),
            threat_ban: Duration::hours(config.threat_ban_hours),
            trust_proxy_headers: config.trust_proxy_headers,
        }
    }

    /// Address used as the key for limits and bans.
    ///
    /// Forwarding headers are only believed when the server sits behind a
    /// trusted proxy. Even then only the right-most `X-Forwarded-For` hop is
    /// used: it is the one appended by that proxy, while everything to its
    /// left is supplied by the client.
    pub fn client_ip(&self, req: &HttpRequest) -> String {
        if self.trust_proxy_headers {
            let forwarded = req
                .headers()
                .get("x-forwarded-for")
                .and_then(|value| value.to_str().ok())
                .and_then(|value| value.rsplit(',').map(str::trim).find(|hop| !hop.is_empty()));
            if let Some(ip) = forwarded {
                return ip.to_string();
            }
            if let Some(ip) = req.connection_info().realip_remote_addr() {
                return ip.to_string();
            }
        }

        req.peer_addr()
            .map(|addr| addr.ip().to_string())
            .unwrap_or_else(|| "unknown".to_string())
    }

    pub async fn cleanup(&self) {
        let lifted = self.blacklist.clean_expired().await;
        self.global_limiter.cleanup().await;
        self.auth_limiter.cleanup().await;
        self.order_limiter.cleanup().await;
        debug!(lifted, "Cleaned expired blacklist entries and idle rate windows");
    }
}

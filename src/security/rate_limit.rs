use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use tokio::sync::RwLock;

#[derive(Debug, Clone, Copy)]
pub struct RateLimitPolicy {
    pub max_requests: u32,
    pub window_size: Duration,
}

impl Default for RateLimitPolicy {
    fn default() -> Self {
        Self {
            max_requests: 100,  // 100 requests per window
            window_size: Duration::minutes(1),
        }
    }
}

#[derive(Debug)]
struct RequestWindow {
    timestamps: Vec<DateTime<Utc>>,
}

impl RequestWindow {
    fn new() -> Self {
        Self {
            timestamps: Vec::new(),
        }
    }

    fn cleanup_old_requests(&mut self, now: DateTime<Utc>, window_size: Duration) {
        let cutoff = now - window_size;
        self.timestamps.retain(|ts| *ts > cutoff);
    }

    fn add_request(&mut self, now: DateTime<Utc>) {
        self.timestamps.push(now);
    }

    fn request_count(&self) -> usize {
        self.timestamps.len()
    }
}

/// Sliding-window limiter keyed by client address.
pub struct RateLimiter {
    windows: Arc<RwLock<HashMap<String, RequestWindow>>>,
    policy: RateLimitPolicy,
}

impl RateLimiter {
    pub fn new(policy: RateLimitPolicy) -> Self {
        Self {
            windows: Arc::new(RwLock::new(HashMap::new())),
            policy,
        }
    }

    pub async fn check_rate_limit(&self, client: &str) -> bool {
        self.check_rate_limit_at(client, Utc::now()).await
    }

    pub async fn check_rate_limit_at(&self, client: &str, now: DateTime<Utc>) -> bool {
        let mut windows = self.windows.write().await;

        let window = windows
            .entry(client.to_string())
            .or_insert_with(RequestWindow::new);

        window.cleanup_old_requests(now, self.policy.window_size);

        if window.request_count() < self.policy.max_requests as usize {
            window.add_request(now);
            true
        } else {
            false
        }
    }

    pub async fn cleanup(&self) {
        let now = Utc::now();
        let mut windows = self.windows.write().await;

        // Remove windows with no recent requests
        windows.retain(|_, window| {
            window.cleanup_old_requests(now, self.policy.window_size);
            !window.timestamps.is_empty()
        });
    }

    pub async fn tracked_clients(&self) -> usize {
        self.windows.read().await.len()
    }
}

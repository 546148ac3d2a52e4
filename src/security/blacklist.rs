use std::collections::HashMap;

use chrono::{DateTime, Duration, Utc};
use tokio::sync::RwLock;
use tracing::warn;

#[derive(Debug, Clone, Copy)]
struct Strikes {
    count: u32,
    last: DateTime<Utc>,
}

#[derive(Debug, Default)]
struct BlacklistState {
    banned: HashMap<String, DateTime<Utc>>,
    strikes: HashMap<String, Strikes>,
}

/// Temporary IP bans, either explicit or earned by repeatedly tripping a
/// rate limit.
///
/// Strikes are forgotten once an address has been quiet for longer than the
/// ban duration, so occasional limit hits spread over days never add up to
/// a ban.
pub struct IpBlacklist {
    state: RwLock<BlacklistState>,
    threshold: u32,
    ban_duration: Duration,
}

impl IpBlacklist {
    pub fn new(threshold: u32, ban_duration: Duration) -> Self {
        Self {
            state: RwLock::new(BlacklistState::default()),
            threshold,
            ban_duration,
        }
    }

    pub async fn add(&self, ip: &str, duration: Duration) {
        let mut state = self.state.write().await;
        state.banned.insert(ip.to_string(), Utc::now() + duration);
        warn!(ip, minutes = duration.num_minutes(), "IP blacklisted");
    }

    pub async fn is_blacklisted(&self, ip: &str) -> bool {
        let now = Utc::now();
        {
            let state = self.state.read().await;
            match state.banned.get(ip) {
                None => return false,
                Some(until) if now < *until => return true,
                Some(_) => {}
            }
        }

        let mut state = self.state.write().await;
        if let Some(until) = state.banned.get(ip).copied() {
            if now < until {
                return true;
            }
            state.banned.remove(ip);
        }
        false
    }

    pub async fn track_attempt(&self, ip: &str) -> u32 {
        self.track_attempt_at(ip, Utc::now()).await
    }

    /// Records a strike against `ip` and returns the running count. Reaching
    /// the threshold bans the address and starts the count over.
    pub async fn track_attempt_at(&self, ip: &str, now: DateTime<Utc>) -> u32 {
        let mut state = self.state.write().await;
        let stale_before = now - self.ban_duration;
        let count = {
            let strikes = state
                .strikes
                .entry(ip.to_string())
                .or_insert(Strikes { count: 0, last: now });
            if strikes.last < stale_before {
                strikes.count = 0;
            }
            strikes.count += 1;
            strikes.last = now;
            strikes.count
        };

        if count >= self.threshold {
            state.banned.insert(ip.to_string(), now + self.ban_duration);
            state.strikes.remove(ip);
            warn!(ip, attempts = count, "IP auto-blacklisted");
        }

        count
    }

    pub async fn reset_attempts(&self, ip: &str) {
        self.state.write().await.strikes.remove(ip);
    }

    pub async fn clean_expired(&self) -> usize {
        self.clean_expired_at(Utc::now()).await
    }

    /// Lifts lapsed bans and forgets strikes that went stale. Returns the
    /// number of bans lifted.
    pub async fn clean_expired_at(&self, now: DateTime<Utc>) -> usize {
        let stale_before = now - self.ban_duration;
        let mut state = self.state.write().await;

        let before = state.banned.len();
        state.banned.retain(|_, until| now < *until);
        let lifted = before - state.banned.len();

        state.strikes.retain(|_, strikes| strikes.last >= stale_before);
        lifted
    }

    /// Number of addresses currently carrying strikes.
    pub async fn tracked_offenders(&self) -> usize {
        self.state.read().await.strikes.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_explicit_ban() {
        let blacklist = IpBlacklist::new(10, Duration::hours(1));
        assert!(!blacklist.is_blacklisted("10.0.0.1").await);

        blacklist.add("10.0.0.1", Duration::hours(24)).await;
        assert!(blacklist.is_blacklisted("10.0.0.1").await);
        assert!(!blacklist.is_blacklisted("10.0.0.2").await);
    }

    #[tokio::test]
    async fn test_lapsed_ban_is_lifted() {
        let blacklist = IpBlacklist::new(10, Duration::hours(1));
        blacklist.add("10.0.0.1", Duration::seconds(-1)).await;

        assert!(!blacklist.is_blacklisted("10.0.0.1").await);
        assert_eq!(blacklist.clean_expired().await, 0);
    }

    #[tokio::test]
    async fn test_auto_ban_after_threshold() {
        let blacklist = IpBlacklist::new(3, Duration::hours(1));

        assert_eq!(blacklist.track_attempt("10.0.0.1").await, 1);
        assert_eq!(blacklist.track_attempt("10.0.0.1").await, 2);
        assert!(!blacklist.is_blacklisted("10.0.0.1").await);

        assert_eq!(blacklist.track_attempt("10.0.0.1").await, 3);
        assert!(blacklist.is_blacklisted("10.0.0.1").await);

        // strikes start over once the ban is in place
        assert_eq!(blacklist.track_attempt("10.0.0.1").await, 1);
    }

    #[tokio::test]
    async fn test_reset_attempts() {
        let blacklist = IpBlacklist::new(3, Duration::hours(1));
        blacklist.track_attempt("10.0.0.1").await;
        blacklist.track_attempt("10.0.0.1").await;
        blacklist.reset_attempts("10.0.0.1").await;

        assert_eq!(blacklist.track_attempt("10.0.0.1").await, 1);
        assert!(!blacklist.is_blacklisted("10.0.0.1").await);
    }

    #[tokio::test]
    async fn test_clean_expired() {
        let blacklist = IpBlacklist::new(10, Duration::hours(1));
        blacklist.add("10.0.0.1", Duration::seconds(-5)).await;
        blacklist.add("10.0.0.2", Duration::hours(1)).await;

        assert_eq!(blacklist.clean_expired().await, 1);
        assert!(blacklist.is_blacklisted("10.0.0.2").await);
    }

    #[tokio::test]
    async fn test_stale_strikes_are_reclaimed() {
        let blacklist = IpBlacklist::new(10, Duration::hours(1));
        let start = Utc::now();

        for i in 0..1000 {
            blacklist.track_attempt_at(&format!("10.1.{}.{}", i / 256, i % 256), start).await;
        }
        blacklist.track_attempt_at("10.9.9.9", start + Duration::minutes(90)).await;
        assert_eq!(blacklist.tracked_offenders().await, 1001);

        blacklist.clean_expired_at(start + Duration::minutes(90)).await;
        assert_eq!(blacklist.tracked_offenders().await, 1);
    }

    #[tokio::test]
    async fn test_sparse_strikes_never_add_up_to_a_ban() {
        let blacklist = IpBlacklist::new(3, Duration::hours(1));
        let start = Utc::now();

        // one strike a day for ten days
        for day in 0..10 {
            let count = blacklist
                .track_attempt_at("10.0.0.1", start + Duration::days(day))
                .await;
            assert_eq!(count, 1);
        }
        assert!(!blacklist.is_blacklisted("10.0.0.1").await);

        // strikes inside the window still accumulate
        let burst = start + Duration::days(20);
        assert_eq!(blacklist.track_attempt_at("10.0.0.2", burst).await, 1);
        assert_eq!(
            blacklist.track_attempt_at("10.0.0.2", burst + Duration::minutes(30)).await,
            2
        );
    }
}

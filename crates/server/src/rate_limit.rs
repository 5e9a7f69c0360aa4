use std::collections::{HashMap, VecDeque};
use std::time::{Duration, Instant};

use tokio::sync::Mutex;

/// Per-user sliding-window message cap. Checked before a turn is handed to
/// the decision pipeline, so rapid-fire users never reach the engine.
pub struct RateLimiter {
    cap: u32,
    window: Duration,
    arrivals: Mutex<HashMap<String, VecDeque<Instant>>>,
}

impl RateLimiter {
    pub fn new(cap: u32, window: Duration) -> Self {
        Self { cap, window, arrivals: Mutex::new(HashMap::new()) }
    }

    pub fn per_minute(cap: u32) -> Self {
        Self::new(cap, Duration::from_secs(60))
    }

    /// Records the arrival and reports whether it is within the cap.
    /// Users whose newest arrival has aged out of the window are dropped
    /// from the map, so the map tracks active users only.
    pub async fn allow(&self, user_id: &str) -> bool {
        let now = Instant::now();
        let mut arrivals = self.arrivals.lock().await;
        arrivals.retain(|_, window| {
            window.back().is_some_and(|newest| now.duration_since(*newest) < self.window)
        });
        let window = arrivals.entry(user_id.to_string()).or_default();

        while let Some(oldest) = window.front() {
            if now.duration_since(*oldest) >= self.window {
                window.pop_front();
            } else {
                break;
            }
        }

        if window.len() as u32 >= self.cap {
            return false;
        }
        window.push_back(now);
        true
    }

    #[cfg(test)]
    async fn tracked_users(&self) -> usize {
        self.arrivals.lock().await.len()
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::RateLimiter;

    #[tokio::test]
    async fn eleventh_message_in_window_is_rejected() {
        let limiter = RateLimiter::per_minute(10);
        for _ in 0..10 {
            assert!(limiter.allow("u-1").await);
        }
        assert!(!limiter.allow("u-1").await);
    }

    #[tokio::test]
    async fn users_are_limited_independently() {
        let limiter = RateLimiter::per_minute(1);
        assert!(limiter.allow("u-1").await);
        assert!(!limiter.allow("u-1").await);
        assert!(limiter.allow("u-2").await);
    }

    #[tokio::test]
    async fn window_expiry_frees_capacity() {
        let limiter = RateLimiter::new(1, Duration::from_millis(20));
        assert!(limiter.allow("u-1").await);
        assert!(!limiter.allow("u-1").await);

        tokio::time::sleep(Duration::from_millis(30)).await;
        assert!(limiter.allow("u-1").await);
    }

    #[tokio::test]
    async fn idle_users_are_dropped_from_the_map() {
        let limiter = RateLimiter::new(5, Duration::from_millis(20));
        assert!(limiter.allow("u-1").await);
        assert!(limiter.allow("u-2").await);
        assert_eq!(limiter.tracked_users().await, 2);

        tokio::time::sleep(Duration::from_millis(30)).await;
        assert!(limiter.allow("u-3").await);
        assert_eq!(limiter.tracked_users().await, 1);
    }
}

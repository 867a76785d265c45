use std::collections::HashMap;
use std::net::IpAddr;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use axum::body::Body;
use axum::extract::State;
use axum::http::{HeaderMap, Request, StatusCode};
use axum::middleware::Next;
use axum::response::{IntoResponse, Json, Response};
use serde_json::json;

pub const REMAINING_HEADER: &str = "X-RateLimit-Remaining";
pub const RESET_HEADER: &str = "X-RateLimit-Reset";

#[derive(Debug, Clone, Copy)]
pub struct RateLimitDecision {
    pub allowed: bool,
    pub remaining: u32,
    pub reset_secs: u64,
}

/// Admission counter keyed by client IP. In-process implementation below;
/// a multi-instance deployment must back this with a store shared across
/// all serving instances.
pub trait RateLimitStore: Send + Sync {
    fn check(&self, key: IpAddr) -> RateLimitDecision;
}

#[derive(Debug)]
struct WindowState {
    start: Instant,
    count: u32,
}

/// Fixed-capacity counter per IP inside a rolling window.
pub struct MemoryRateLimiter {
    limit: u32,
    window: Duration,
    windows: Mutex<HashMap<IpAddr, WindowState>>,
}

impl MemoryRateLimiter {
    pub fn new(limit: u32, window: Duration) -> Self {
        Self {
            limit: limit.max(1),
            window,
            windows: Mutex::new(HashMap::new()),
        }
    }

    fn check_at(&self, key: IpAddr, now: Instant) -> RateLimitDecision {
        let mut windows = self.windows.lock().expect("rate limiter mutex poisoned");
        // Expired windows are dropped wholesale, the caller's own included,
        // so IPs that stop sending do not accumulate entries.
        windows.retain(|_, w| now.duration_since(w.start) < self.window);
        let state = windows.entry(key).or_insert(WindowState {
            start: now,
            count: 0,
        });
        let reset_secs = self
            .window
            .saturating_sub(now.duration_since(state.start))
            .as_secs();
        if state.count < self.limit {
            state.count += 1;
            RateLimitDecision {
                allowed: true,
                remaining: self.limit - state.count,
                reset_secs,
            }
        } else {
            RateLimitDecision {
                allowed: false,
                remaining: 0,
                reset_secs,
            }
        }
    }
}

impl RateLimitStore for MemoryRateLimiter {
    fn check(&self, key: IpAddr) -> RateLimitDecision {
        self.check_at(key, Instant::now())
    }
}

#[derive(Clone)]
pub struct RateLimiter {
    store: Arc<dyn RateLimitStore>,
}

impl RateLimiter {
    pub fn new(store: Arc<dyn RateLimitStore>) -> Self {
        Self { store }
    }

    pub fn in_memory(limit: u32, window: Duration) -> Self {
        Self::new(Arc::new(MemoryRateLimiter::new(limit, window)))
    }

    pub fn check(&self, key: IpAddr) -> RateLimitDecision {
        self.store.check(key)
    }
}

/// Client IP from the trusted forwarded-for header (first hop).
pub fn client_ip(headers: &HeaderMap) -> Option<IpAddr> {
    headers
        .get("x-forwarded-for")?
        .to_str()
        .ok()?
        .split(',')
        .next()?
        .trim()
        .parse()
        .ok()
}

pub async fn webhook_rate_limit(
    State(limiter): State<RateLimiter>,
    req: Request<Body>,
    next: Next,
) -> Response {
    // Requests without a forwarded-for header share one bucket.
    let ip = client_ip(req.headers()).unwrap_or(IpAddr::from([0, 0, 0, 0]));
    let decision = limiter.check(ip);
    if !decision.allowed {
        let mut response = (
            StatusCode::TOO_MANY_REQUESTS,
            Json(json!({ "error": "rate_limit_exceeded" })),
        )
            .into_response();
        let headers = response.headers_mut();
        headers.insert(REMAINING_HEADER, decision.remaining.into());
        headers.insert(RESET_HEADER, decision.reset_secs.into());
        return response;
    }
    next.run(req).await
}

#[cfg(test)]
mod tests {
    use super::*;

    const IP_A: IpAddr = IpAddr::V4(std::net::Ipv4Addr::new(10, 0, 0, 1));
    const IP_B: IpAddr = IpAddr::V4(std::net::Ipv4Addr::new(10, 0, 0, 2));

    #[test]
    fn request_at_cap_is_accepted_and_next_is_rejected() {
        let limiter = MemoryRateLimiter::new(3, Duration::from_secs(60));
        let now = Instant::now();

        for expected_remaining in [2, 1, 0] {
            let decision = limiter.check_at(IP_A, now);
            assert!(decision.allowed);
            assert_eq!(decision.remaining, expected_remaining);
        }
        let decision = limiter.check_at(IP_A, now);
        assert!(!decision.allowed);
        assert_eq!(decision.remaining, 0);
    }

    #[test]
    fn counters_are_per_ip() {
        let limiter = MemoryRateLimiter::new(1, Duration::from_secs(60));
        let now = Instant::now();
        assert!(limiter.check_at(IP_A, now).allowed);
        assert!(!limiter.check_at(IP_A, now).allowed);
        assert!(limiter.check_at(IP_B, now).allowed);
    }

    #[test]
    fn window_rollover_resets_the_counter() {
        let limiter = MemoryRateLimiter::new(1, Duration::from_secs(60));
        let now = Instant::now();
        assert!(limiter.check_at(IP_A, now).allowed);
        assert!(!limiter.check_at(IP_A, now).allowed);
        assert!(limiter.check_at(IP_A, now + Duration::from_secs(61)).allowed);
    }

    #[test]
    fn idle_ip_entries_are_evicted_after_the_window() {
        let limiter = MemoryRateLimiter::new(3, Duration::from_secs(60));
        let now = Instant::now();
        for octet in 1..=100u8 {
            let ip = IpAddr::V4(std::net::Ipv4Addr::new(10, 0, 1, octet));
            assert!(limiter.check_at(ip, now).allowed);
        }
        assert_eq!(limiter.windows.lock().unwrap().len(), 100);

        // One request after the window expires sweeps every idle entry.
        let later = now + Duration::from_secs(61);
        assert!(limiter.check_at(IP_A, later).allowed);
        let windows = limiter.windows.lock().unwrap();
        assert_eq!(windows.len(), 1);
        assert!(windows.contains_key(&IP_A));
    }

    #[test]
    fn forwarded_for_takes_first_hop() {
        let mut headers = HeaderMap::new();
        headers.insert("x-forwarded-for", "10.0.0.7, 172.16.0.1".parse().unwrap());
        assert_eq!(client_ip(&headers), Some("10.0.0.7".parse().unwrap()));
        assert_eq!(client_ip(&HeaderMap::new()), None);
    }
}

use axum::Json;
use axum::http::{HeaderMap, HeaderName, HeaderValue, StatusCode, header};
use axum::response::{IntoResponse, Response};
use serde_json::json;
use std::sync::Arc;
use tracing::warn;

use crate::budget::DailyBudget;
use crate::client_ip::{client_ip, header_str};
use crate::clock::Clock;
use crate::config::{EndpointTable, GuardConfig};
use crate::metrics::GUARD_REJECTIONS;
use crate::origin::OriginPolicy;
use crate::rate_limit::RateLimiter;

pub const RATE_WINDOW_MS: i64 = 60_000;

pub const X_GUARD: HeaderName = HeaderName::from_static("x-guard");
pub const X_DAILY_USAGE: HeaderName = HeaderName::from_static("x-daily-usage");
pub const X_DAILY_LIMIT: HeaderName = HeaderName::from_static("x-daily-limit");
pub const X_RATELIMIT_REMAINING: HeaderName = HeaderName::from_static("x-ratelimit-remaining");

// Why a request was not admitted
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Rejection {
    OriginRejected,
    RateLimited { retry_after_secs: u64 },
    DailyBudgetExceeded { usage: u64, limit: u64 },
    PayloadTooLarge { size: usize, limit: usize },
}

impl Rejection {
    pub fn status(&self) -> StatusCode {
        match self {
            Rejection::OriginRejected => StatusCode::FORBIDDEN,
            Rejection::RateLimited { .. } | Rejection::DailyBudgetExceeded { .. } => {
                StatusCode::TOO_MANY_REQUESTS
            }
            Rejection::PayloadTooLarge { .. } => StatusCode::PAYLOAD_TOO_LARGE,
        }
    }

    pub fn reason_code(&self) -> &'static str {
        match self {
            Rejection::OriginRejected => "origin-rejected",
            Rejection::RateLimited { .. } => "rate-limited",
            Rejection::DailyBudgetExceeded { .. } => "daily-budget-exceeded",
            Rejection::PayloadTooLarge { .. } => "payload-too-large",
        }
    }

    pub fn message(&self) -> String {
        match self {
            Rejection::OriginRejected => "Requests from this origin are not allowed.".to_string(),
            Rejection::RateLimited { retry_after_secs } => {
                format!("Too many requests. Try again in {retry_after_secs} seconds.")
            }
            Rejection::DailyBudgetExceeded { .. } => {
                "Daily usage limit for this API has been reached. Try again tomorrow.".to_string()
            }
            Rejection::PayloadTooLarge { limit, .. } => {
                format!("Request body exceeds the {limit} byte limit.")
            }
        }
    }

    pub fn retry_after_secs(&self) -> Option<u64> {
        match self {
            Rejection::RateLimited { retry_after_secs } => Some(*retry_after_secs),
            _ => None,
        }
    }
}

impl IntoResponse for Rejection {
    fn into_response(self) -> Response {
        let body = match &self {
            Rejection::DailyBudgetExceeded { usage, limit } => {
                json!({ "error": self.message(), "usage": usage, "limit": limit })
            }
            Rejection::PayloadTooLarge { limit, .. } => {
                json!({ "error": self.message(), "limit": limit })
            }
            _ => json!({ "error": self.message() }),
        };

        let mut response = (self.status(), Json(body)).into_response();
        let headers = response.headers_mut();
        headers.insert(X_GUARD, HeaderValue::from_static(self.reason_code()));
        if let Some(secs) = self.retry_after_secs() {
            headers.insert(header::RETRY_AFTER, HeaderValue::from(secs));
            headers.insert(X_RATELIMIT_REMAINING, HeaderValue::from_static("0"));
        }
        if let Rejection::DailyBudgetExceeded { usage, limit } = self {
            headers.insert(X_DAILY_USAGE, HeaderValue::from(usage));
            headers.insert(X_DAILY_LIMIT, HeaderValue::from(limit));
        }
        response
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GuardDecision {
    Allow,
    Reject(Rejection),
}

impl GuardDecision {
    pub fn into_result(self) -> Result<(), Rejection> {
        match self {
            GuardDecision::Allow => Ok(()),
            GuardDecision::Reject(rejection) => Err(rejection),
        }
    }
}

// Admission pipeline for expensive routes: origin, per-IP rate limit, body size, daily budget.
// Counters live in memory, so limits hold per running instance only.
pub struct ApiGuard {
    endpoints: EndpointTable,
    origins: OriginPolicy,
    limiter: RateLimiter,
    budget: DailyBudget,
}

impl ApiGuard {
    pub fn new(endpoints: EndpointTable, origins: OriginPolicy, clock: Arc<dyn Clock>) -> Self {
        Self {
            endpoints,
            origins,
            limiter: RateLimiter::new(clock.clone()),
            budget: DailyBudget::new(clock),
        }
    }

    pub fn config(&self, endpoint: &str) -> GuardConfig {
        self.endpoints.get(endpoint)
    }

    pub fn check(&self, headers: &HeaderMap, endpoint: &str) -> GuardDecision {
        self.check_request(headers, endpoint, None)
    }

    // Same pipeline, with the body size checked before any budget is spent
    pub fn check_with_body(&self, headers: &HeaderMap, endpoint: &str, body_len: usize) -> GuardDecision {
        self.check_request(headers, endpoint, Some(body_len))
    }

    fn check_request(&self, headers: &HeaderMap, endpoint: &str, body_len: Option<usize>) -> GuardDecision {
        let config = self.config(endpoint);
        let ip = client_ip(headers);

        let decision = self.admit(headers, endpoint, &ip, config, body_len);
        if let GuardDecision::Reject(rejection) = &decision {
            let reason = rejection.reason_code();
            GUARD_REJECTIONS.with_label_values(&[reason]).inc();
            warn!(endpoint, client = %ip, reason, "request rejected by api guard");
        }
        decision
    }

    fn admit(
        &self,
        headers: &HeaderMap,
        endpoint: &str,
        ip: &str,
        config: GuardConfig,
        body_len: Option<usize>,
    ) -> GuardDecision {
        let origin = header_str(headers, "origin");
        let referer = header_str(headers, "referer");
        if !self.origins.is_allowed(origin, referer) {
            return GuardDecision::Reject(Rejection::OriginRejected);
        }

        let key = format!("{endpoint}:{ip}");
        let rl = self
            .limiter
            .admit(&key, RATE_WINDOW_MS, config.rate_per_minute);
        if !rl.allowed {
            return GuardDecision::Reject(Rejection::RateLimited {
                retry_after_secs: retry_after_secs(rl.reset_ms),
            });
        }

        if let (Some(size), Some(limit)) = (body_len, config.max_body_size) {
            if size > limit {
                return GuardDecision::Reject(Rejection::PayloadTooLarge { size, limit });
            }
        }

        if !self.budget.try_consume(endpoint, config.daily_budget) {
            return GuardDecision::Reject(Rejection::DailyBudgetExceeded {
                usage: self.budget.current_usage(endpoint),
                limit: config.daily_budget,
            });
        }

        GuardDecision::Allow
    }

    pub fn daily_usage(&self, endpoint: &str) -> u64 {
        self.budget.current_usage(endpoint)
    }

    // Non-cacheable headers plus the endpoint's daily usage counters
    pub fn secure_headers(&self, response: impl IntoResponse, endpoint: &str) -> Response {
        let mut response = response.into_response();
        let limit = self.config(endpoint).daily_budget;
        let usage = self.daily_usage(endpoint);

        let headers = response.headers_mut();
        headers.insert(X_DAILY_USAGE, HeaderValue::from(usage));
        headers.insert(X_DAILY_LIMIT, HeaderValue::from(limit));
        headers.insert(
            header::CACHE_CONTROL,
            HeaderValue::from_static("no-store, no-cache, must-revalidate"),
        );
        headers.insert(header::X_CONTENT_TYPE_OPTIONS, HeaderValue::from_static("nosniff"));
        response
    }
}

// whole seconds until retry, never below 1
fn retry_after_secs(reset_ms: i64) -> u64 {
    let secs = (reset_ms.max(0) as u64).div_ceil(1000);
    secs.max(1)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;

    const START: i64 = 1_709_294_400_000;

    fn guard_with(table: EndpointTable) -> (Arc<ManualClock>, ApiGuard) {
        let clock = Arc::new(ManualClock::new(START));
        let origins = OriginPolicy::new(
            vec!["https://virtuals-dashboard.vercel.app".to_string()],
            vec![".vercel.app".to_string()],
        );
        (clock.clone(), ApiGuard::new(table, origins, clock))
    }

    fn guard() -> (Arc<ManualClock>, ApiGuard) {
        guard_with(EndpointTable::default())
    }

    fn request(origin: Option<&'static str>, ip: &'static str) -> HeaderMap {
        let mut h = HeaderMap::new();
        if let Some(origin) = origin {
            h.insert("origin", HeaderValue::from_static(origin));
        }
        h.insert("x-forwarded-for", HeaderValue::from_static(ip));
        h
    }

    #[test]
    fn foreign_origin_gets_403_before_anything_is_counted() {
        let (_, g) = guard();
        let decision = g.check(&request(Some("https://evil.com"), "1.1.1.1"), "analyze");
        assert_eq!(decision, GuardDecision::Reject(Rejection::OriginRejected));
        assert_eq!(g.daily_usage("analyze"), 0);
        assert_eq!(g.limiter.key_count(), 0);

        let response = Rejection::OriginRejected.into_response();
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
        assert_eq!(response.headers()[X_GUARD], "origin-rejected");
    }

    #[test]
    fn no_origin_and_preview_origin_are_admitted() {
        let (_, g) = guard();
        assert_eq!(g.check(&request(None, "1.1.1.1"), "analyze"), GuardDecision::Allow);
        assert_eq!(
            g.check(&request(Some("https://my-preview-123.vercel.app"), "2.2.2.2"), "analyze"),
            GuardDecision::Allow
        );
    }

    #[test]
    fn fourth_quick_request_is_rate_limited() {
        let (_, g) = guard();
        let headers = request(Some("https://virtuals-dashboard.vercel.app"), "7.7.7.7");
        for _ in 0..3 {
            assert_eq!(g.check(&headers, "analyze"), GuardDecision::Allow);
        }

        let GuardDecision::Reject(rejection) = g.check(&headers, "analyze") else {
            panic!("fourth request should be rejected");
        };
        assert_eq!(rejection.status(), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(rejection.retry_after_secs(), Some(60));

        let response = rejection.into_response();
        assert_eq!(response.headers()[header::RETRY_AFTER], "60");
        assert_eq!(response.headers()[X_RATELIMIT_REMAINING], "0");
        assert_eq!(response.headers()[X_GUARD], "rate-limited");

        // rate limited calls don't spend the daily budget
        assert_eq!(g.daily_usage("analyze"), 3);
        // other clients are unaffected
        assert_eq!(g.check(&request(None, "8.8.8.8"), "analyze"), GuardDecision::Allow);
    }

    #[test]
    fn daily_budget_is_shared_across_clients() {
        let table = EndpointTable::default().with_endpoint("onchain", GuardConfig::new(5, 2, None));
        let (clock, g) = guard_with(table);

        assert_eq!(g.check(&request(None, "1.1.1.1"), "onchain"), GuardDecision::Allow);
        assert_eq!(g.check(&request(None, "2.2.2.2"), "onchain"), GuardDecision::Allow);
        let decision = g.check(&request(None, "3.3.3.3"), "onchain");
        assert_eq!(
            decision,
            GuardDecision::Reject(Rejection::DailyBudgetExceeded { usage: 2, limit: 2 })
        );

        let GuardDecision::Reject(rejection) = decision else { unreachable!() };
        let response = rejection.into_response();
        assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(response.headers()[X_GUARD], "daily-budget-exceeded");
        assert_eq!(response.headers()[X_DAILY_USAGE], "2");
        assert_eq!(response.headers()[X_DAILY_LIMIT], "2");

        clock.advance(86_400_000);
        assert_eq!(g.check(&request(None, "3.3.3.3"), "onchain"), GuardDecision::Allow);
        assert_eq!(g.daily_usage("onchain"), 1);
    }

    #[test]
    fn unlisted_endpoint_uses_default_limits() {
        let (_, g) = guard();
        for _ in 0..5 {
            assert_eq!(g.check(&request(None, "1.1.1.1"), "onchain"), GuardDecision::Allow);
        }
        assert!(matches!(
            g.check(&request(None, "1.1.1.1"), "onchain"),
            GuardDecision::Reject(Rejection::RateLimited { .. })
        ));
    }

    #[test]
    fn oversized_body_is_rejected_without_spending_budget() {
        let (_, g) = guard();
        assert_eq!(g.check_with_body(&request(None, "1.1.1.1"), "analyze", 1024), GuardDecision::Allow);
        assert_eq!(
            g.check_with_body(&request(None, "2.2.2.2"), "analyze", 1025),
            GuardDecision::Reject(Rejection::PayloadTooLarge { size: 1025, limit: 1024 })
        );
        assert_eq!(g.daily_usage("analyze"), 1);

        // still rate limited per client, so oversized spam can't bypass the limiter
        let spammer = request(None, "3.3.3.3");
        for _ in 0..3 {
            assert!(matches!(
                g.check_with_body(&spammer, "analyze", 4096),
                GuardDecision::Reject(Rejection::PayloadTooLarge { .. })
            ));
        }
        assert!(matches!(
            g.check_with_body(&spammer, "analyze", 4096),
            GuardDecision::Reject(Rejection::RateLimited { .. })
        ));
        assert_eq!(g.daily_usage("analyze"), 1);

        // gap-score has no body limit
        assert_eq!(g.check_with_body(&request(None, "4.4.4.4"), "gap-score", 1 << 20), GuardDecision::Allow);
    }

    #[test]
    fn secure_headers_report_usage() {
        let (_, g) = guard();
        for i in 0..5 {
            let ip: &'static str = ["1.1.1.1", "2.2.2.2", "3.3.3.3", "4.4.4.4", "5.5.5.5"][i];
            assert_eq!(g.check(&request(None, ip), "analyze"), GuardDecision::Allow);
        }

        let response = g.secure_headers(Json(json!({ "ok": true })), "analyze");
        let h = response.headers();
        assert_eq!(h[X_DAILY_USAGE], "5");
        assert_eq!(h[X_DAILY_LIMIT], "200");
        assert_eq!(h[header::CACHE_CONTROL], "no-store, no-cache, must-revalidate");
        assert_eq!(h[header::X_CONTENT_TYPE_OPTIONS], "nosniff");
    }

    #[test]
    fn retry_after_rounds_up() {
        assert_eq!(retry_after_secs(60_000), 60);
        assert_eq!(retry_after_secs(1_001), 2);
        assert_eq!(retry_after_secs(1), 1);
        assert_eq!(retry_after_secs(0), 1);
    }
}

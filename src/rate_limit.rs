//! Per-client fixed-window request limits, counted in Redis.
//!
//! Every request is counted against the `default` bucket. Auth calls,
//! property search and booking or review creation are also counted against a
//! bucket of their own, and the tighter of the two decides. When the counter
//! cannot be reached the request goes through.

use std::{net::SocketAddr, sync::Arc};

use anyhow::Context;
use async_trait::async_trait;
use axum::{
    extract::{ConnectInfo, Request, State},
    http::{header, HeaderMap, HeaderName, HeaderValue, Method},
    middleware::Next,
    response::{IntoResponse, Response},
};
use redis::{aio::ConnectionManager, AsyncCommands};
use tracing::{debug, warn};

use crate::{clock::Clock, config::RateLimitConfig, error::ServiceError};

const HEALTH_PATH: &str = "/api/v1/health";
const X_RATELIMIT_LIMIT: HeaderName = HeaderName::from_static("x-ratelimit-limit");
const X_RATELIMIT_REMAINING: HeaderName = HeaderName::from_static("x-ratelimit-remaining");
const X_RATELIMIT_RESET: HeaderName = HeaderName::from_static("x-ratelimit-reset");

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Bucket {
    Default,
    Auth,
    Search,
    Booking,
    Review,
}

impl Bucket {
    fn name(self) -> &'static str {
        match self {
            Bucket::Default => "default",
            Bucket::Auth => "auth",
            Bucket::Search => "search",
            Bucket::Booking => "create_booking",
            Bucket::Review => "create_review",
        }
    }

    /// The dedicated bucket of a request, on top of `Default`.
    pub fn for_request(method: &Method, path: &str) -> Option<Bucket> {
        let path = path.strip_prefix("/api/v1").unwrap_or(path);
        let path = path.trim_end_matches('/');
        if path.starts_with("/auth/") {
            Some(Bucket::Auth)
        } else if *method == Method::GET && path == "/properties/search" {
            Some(Bucket::Search)
        } else if *method == Method::POST && path == "/bookings" {
            Some(Bucket::Booking)
        } else if *method == Method::POST && path == "/reviews" {
            Some(Bucket::Review)
        } else {
            None
        }
    }
}

/// One counted request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Hit {
    /// Requests seen in the current window, this one included.
    pub count: u64,
    /// Seconds until the window resets.
    pub reset_in: u64,
}

#[async_trait]
pub trait RateCounter: Send + Sync {
    async fn hit(&self, key: &str, window_seconds: u64) -> anyhow::Result<Hit>;
}

/// `INCR` the key and start its expiry on the first hit of a window.
#[derive(Clone)]
pub struct RedisCounter {
    conn: ConnectionManager,
}

impl RedisCounter {
    pub fn new(conn: ConnectionManager) -> Self {
        Self { conn }
    }
}

#[async_trait]
impl RateCounter for RedisCounter {
    async fn hit(&self, key: &str, window_seconds: u64) -> anyhow::Result<Hit> {
        let mut conn = self.conn.clone();
        let window = i64::try_from(window_seconds).unwrap_or(i64::MAX);

        let count: u64 = conn.incr(key, 1u64).await.context("redis INCR")?;
        if count > 1 {
            let ttl: i64 = conn.ttl(key).await.context("redis TTL")?;
            if let Ok(reset_in) = u64::try_from(ttl) {
                return Ok(Hit { count, reset_in });
            }
        }
        // First hit, or a key that lost its expiry and would never reset.
        let _: () = conn.expire(key, window).await.context("redis EXPIRE")?;
        Ok(Hit {
            count,
            reset_in: window_seconds,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Verdict {
    pub bucket: Bucket,
    pub limit: u64,
    pub remaining: u64,
    pub reset_in: u64,
    pub exceeded: bool,
}

impl Verdict {
    fn tighter_than(&self, other: &Verdict) -> bool {
        (self.exceeded && !other.exceeded)
            || (self.exceeded == other.exceeded && self.remaining < other.remaining)
    }
}

pub struct RateLimiter {
    config: RateLimitConfig,
    /// Nothing is counted without one.
    counter: Option<Arc<dyn RateCounter>>,
    clock: Arc<dyn Clock>,
}

impl RateLimiter {
    pub fn new(
        config: RateLimitConfig,
        counter: Option<Arc<dyn RateCounter>>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            config,
            counter,
            clock,
        }
    }

    fn limit(&self, bucket: Bucket) -> u64 {
        match bucket {
            Bucket::Default => self.config.default,
            Bucket::Auth => self.config.auth,
            Bucket::Search => self.config.search,
            Bucket::Booking => self.config.booking,
            Bucket::Review => self.config.review,
        }
    }

    /// Client address used as the counter key.
    fn client(&self, req: &Request) -> String {
        if self.config.trust_forwarded_for {
            let forwarded = req
                .headers()
                .get("x-forwarded-for")
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.split(',').next())
                .map(str::trim)
                .filter(|v| !v.is_empty());
            if let Some(ip) = forwarded {
                return ip.to_string();
            }
        }
        req.extensions()
            .get::<ConnectInfo<SocketAddr>>()
            .map(|ConnectInfo(addr)| addr.ip().to_string())
            .unwrap_or_else(|| "unknown".to_string())
    }

    /// Counts the request in each of its buckets and returns the tightest
    /// outcome. `None` means the request is not limited.
    pub async fn check(&self, client: &str, method: &Method, path: &str) -> Option<Verdict> {
        if !self.config.enabled {
            return None;
        }
        let counter = self.counter.as_ref()?;

        let buckets = std::iter::once(Bucket::Default).chain(Bucket::for_request(method, path));
        let mut tightest: Option<Verdict> = None;
        for bucket in buckets {
            let key = format!("rate_limit:{}:{client}", bucket.name());
            let hit = match counter.hit(&key, self.config.window_seconds).await {
                Ok(hit) => hit,
                Err(e) => {
                    warn!(error = %e, bucket = bucket.name(), "rate limit counter unavailable; allowing request");
                    return None;
                }
            };
            let limit = self.limit(bucket);
            let verdict = Verdict {
                bucket,
                limit,
                remaining: limit.saturating_sub(hit.count),
                reset_in: hit.reset_in,
                exceeded: hit.count > limit,
            };
            let stop = verdict.exceeded;
            tightest = match tightest {
                Some(current) if !verdict.tighter_than(&current) => Some(current),
                _ => Some(verdict),
            };
            if stop {
                break;
            }
        }
        tightest
    }

    fn reset_at(&self, reset_in: u64) -> i64 {
        let reset_in = i64::try_from(reset_in).unwrap_or(i64::MAX);
        self.clock.now().unix_timestamp().saturating_add(reset_in)
    }
}

fn set_headers(headers: &mut HeaderMap, verdict: &Verdict, reset_at: i64) {
    headers.insert(X_RATELIMIT_LIMIT, HeaderValue::from(verdict.limit));
    headers.insert(X_RATELIMIT_REMAINING, HeaderValue::from(verdict.remaining));
    headers.insert(X_RATELIMIT_RESET, HeaderValue::from(reset_at));
}

/// Middleware for `axum::middleware::from_fn_with_state`.
pub async fn enforce(
    State(limiter): State<Arc<RateLimiter>>,
    req: Request,
    next: Next,
) -> Response {
    if req.uri().path() == HEALTH_PATH {
        return next.run(req).await;
    }

    let client = limiter.client(&req);
    let Some(verdict) = limiter.check(&client, req.method(), req.uri().path()).await else {
        return next.run(req).await;
    };
    let reset_at = limiter.reset_at(verdict.reset_in);

    if verdict.exceeded {
        debug!(%client, bucket = verdict.bucket.name(), "rate limit exceeded");
        let mut res = ServiceError::RateLimited(format!(
            "too many requests, limit is {} per {} seconds",
            verdict.limit, limiter.config.window_seconds
        ))
        .into_response();
        set_headers(res.headers_mut(), &verdict, reset_at);
        res.headers_mut()
            .insert(header::RETRY_AFTER, HeaderValue::from(verdict.reset_in));
        return res;
    }

    let mut res = next.run(req).await;
    set_headers(res.headers_mut(), &verdict, reset_at);
    res
}

#[cfg(test)]
pub(crate) mod fakes {
    use std::{
        collections::HashMap,
        sync::{Arc, Mutex},
    };

    use super::*;

    /// In-process counter whose windows never roll over. Can be told to fail.
    #[derive(Clone, Default)]
    pub struct MemoryCounter {
        pub counts: Arc<Mutex<HashMap<String, u64>>>,
        pub broken: bool,
    }

    impl MemoryCounter {
        pub fn broken() -> Self {
            Self {
                broken: true,
                ..Default::default()
            }
        }
    }

    #[async_trait]
    impl RateCounter for MemoryCounter {
        async fn hit(&self, key: &str, window_seconds: u64) -> anyhow::Result<Hit> {
            if self.broken {
                anyhow::bail!("counter offline");
            }
            let mut counts = self.counts.lock().unwrap();
            let count = counts.entry(key.to_string()).or_insert(0);
            *count += 1;
            Ok(Hit {
                count: *count,
                reset_in: window_seconds,
            })
        }
    }
}

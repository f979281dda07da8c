//! Fixed-window request limiter applied as axum middleware.

use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use axum::extract::{Extension, Request};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use tracing::debug;

use crate::error::ApiError;

const WINDOW: Duration = Duration::from_secs(1);

#[derive(Debug)]
struct Window {
    opened: Instant,
    served: u32,
}

/// Allows at most `per_second` requests in each one-second window.
#[derive(Debug, Clone)]
pub struct RateLimiter {
    per_second: u32,
    window: Arc<Mutex<Window>>,
}

impl RateLimiter {
    pub fn new(per_second: u32) -> Self {
        Self {
            per_second: per_second.max(1),
            window: Arc::new(Mutex::new(Window {
                opened: Instant::now(),
                served: 0,
            })),
        }
    }

    /// Count a request against the current window.
    pub fn admit(&self) -> bool {
        self.admit_at(Instant::now())
    }

    fn admit_at(&self, now: Instant) -> bool {
        let Ok(mut window) = self.window.lock() else {
            return true;
        };
        if now.duration_since(window.opened) >= WINDOW {
            window.opened = now;
            window.served = 0;
        }
        if window.served < self.per_second {
            window.served += 1;
            true
        } else {
            false
        }
    }
}

/// Rejects requests over the limit with 429.
pub async fn rate_limit_middleware(
    Extension(limiter): Extension<RateLimiter>,
    req: Request,
    next: Next,
) -> Response {
    if limiter.admit() {
        next.run(req).await
    } else {
        debug!(path = %req.uri().path(), "Rate limit exceeded");
        ApiError::TooManyRequests.into_response()
    }
}

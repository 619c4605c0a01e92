//! RateLimiter - クライアントごとの固定ウィンドウ流量制限
//!
//! 画像アップロードの前段に置く。制限を超えたリクエストはストアに触れずに拒否する。

use std::collections::HashMap;
use std::net::IpAddr;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use tracing::warn;

use crate::domain::GatewayError;

/// この数を超えたら期限切れのウィンドウを掃除する
const PRUNE_THRESHOLD: usize = 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimit {
    pub max_requests: u32,
    pub window: Duration,
}

impl RateLimit {
    pub fn per_minute(max_requests: u32) -> Self {
        Self {
            max_requests,
            window: Duration::from_secs(60),
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct Window {
    started: Instant,
    count: u32,
}

#[derive(Debug)]
pub struct RateLimiter {
    limit: RateLimit,
    windows: Mutex<HashMap<IpAddr, Window>>,
}

impl RateLimiter {
    pub fn new(limit: RateLimit) -> Self {
        Self {
            limit,
            windows: Mutex::new(HashMap::new()),
        }
    }

    pub fn check(&self, client: IpAddr) -> Result<(), GatewayError> {
        self.check_at(client, Instant::now())
    }

    /// `now` を受け取る版。受理されたリクエストだけがカウントされる。
    pub fn check_at(&self, client: IpAddr, now: Instant) -> Result<(), GatewayError> {
        let mut windows = self.windows.lock().unwrap_or_else(|e| e.into_inner());

        if windows.len() > PRUNE_THRESHOLD {
            let span = self.limit.window;
            windows.retain(|_, w| now.duration_since(w.started) < span);
        }

        let window = windows.entry(client).or_insert(Window {
            started: now,
            count: 0,
        });
        if now.duration_since(window.started) >= self.limit.window {
            window.started = now;
            window.count = 0;
        }
        if window.count >= self.limit.max_requests {
            warn!(client = %client, limit = self.limit.max_requests, "rate limit exceeded");
            return Err(GatewayError::RateLimited {
                limit: self.limit.max_requests,
                window_secs: self.limit.window.as_secs(),
            });
        }
        window.count = window.count.saturating_add(1);
        Ok(())
    }
}

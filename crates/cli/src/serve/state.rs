//! Shared service state: case queries, request budget and the per-IP limiter.

use std::collections::HashMap;
use std::net::IpAddr;
use std::time::{Duration, Instant};

use tokio::sync::Mutex;
use trace_eval::CaseQueries;
use trace_storage::MemoryCaseStore;

use super::RATE_LIMIT_WINDOW_SECS;

/// Requests seen from one client since `opened`.
#[derive(Debug, Clone, Copy)]
struct ClientWindow {
    opened: Instant,
    requests: u64,
}

#[derive(Debug)]
struct Windows {
    by_client: HashMap<IpAddr, ClientWindow>,
    last_sweep: Instant,
}

/// Fixed-window request counter keyed by client IP.
///
/// Windows older than the window length are dropped at most once per
/// window, so the map only holds clients seen in the last two windows.
#[derive(Debug)]
pub(crate) struct RateLimiter {
    windows: Mutex<Windows>,
    max_requests: u64,
    window: Duration,
}

impl RateLimiter {
    pub(crate) fn new(max_requests: u64) -> Self {
        Self::with_window(max_requests, Duration::from_secs(RATE_LIMIT_WINDOW_SECS))
    }

    pub(crate) fn with_window(max_requests: u64, window: Duration) -> Self {
        RateLimiter {
            windows: Mutex::new(Windows {
                by_client: HashMap::new(),
                last_sweep: Instant::now(),
            }),
            max_requests,
            window,
        }
    }

    /// Count one request from `ip`. `Err` carries the seconds until the
    /// client's window reopens.
    pub(crate) async fn check(&self, ip: IpAddr) -> Result<(), u64> {
        let now = Instant::now();
        let mut windows = self.windows.lock().await;

        if now.duration_since(windows.last_sweep) >= self.window {
            let window = self.window;
            let before = windows.by_client.len();
            windows
                .by_client
                .retain(|_, w| now.duration_since(w.opened) < window);
            windows.last_sweep = now;
            tracing::debug!(
                dropped = before - windows.by_client.len(),
                tracked = windows.by_client.len(),
                "swept expired rate limit windows"
            );
        }

        let client = windows.by_client.entry(ip).or_insert(ClientWindow {
            opened: now,
            requests: 0,
        });
        if now.duration_since(client.opened) >= self.window {
            *client = ClientWindow {
                opened: now,
                requests: 0,
            };
        }

        client.requests += 1;
        if client.requests > self.max_requests {
            let remaining = self.window.saturating_sub(now.duration_since(client.opened));
            Err(remaining.as_secs().max(1))
        } else {
            Ok(())
        }
    }

    /// Number of clients currently holding a window.
    #[cfg(test)]
    pub(crate) async fn tracked_clients(&self) -> usize {
        self.windows.lock().await.by_client.len()
    }
}

/// Application state shared across request handlers.
///
/// Everything here is read-only after startup except the rate limiter.
pub(crate) struct AppState {
    /// Case queries over the loaded case files.
    pub(crate) queries: CaseQueries<MemoryCaseStore>,
    pub(crate) rate_limiter: RateLimiter,
    /// Budget for a single request before it is answered with 408.
    pub(crate) request_timeout: Duration,
}

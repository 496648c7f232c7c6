//! Per-client request budgets
//!
//! Fixed-window rate limiting keyed by `(client, tool)`. Windows are reset
//! lazily on the next admission after expiry; there is no background
//! sweeper, so memory is bounded by the number of distinct keys observed.

use std::collections::hash_map::DefaultHasher;
use std::collections::HashMap;
use std::hash::{Hash, Hasher};
use std::sync::Mutex;
use std::time::{Duration, Instant};

use crate::error::{ToolError, ToolResult};

/// Parsed request budget, e.g. `"100/minute"` → 100 requests per 60s window
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitPolicy {
    pub max_requests: u32,
    pub window: Duration,
}

impl RateLimitPolicy {
    pub fn new(max_requests: u32, window: Duration) -> Self {
        Self {
            max_requests,
            window,
        }
    }

    /// Parse a policy string of the form `count/unit`
    ///
    /// Accepted units: `second`, `minute`, `hour`, `day` (and their common
    /// abbreviations). A count of zero disables limiting entirely.
    pub fn parse(s: &str) -> ToolResult<Self> {
        let (count, unit) = s.split_once('/').ok_or_else(|| {
            ToolError::ValidationFailure(format!(
                "rate limit '{}' must look like '100/minute'",
                s
            ))
        })?;

        let max_requests: u32 = count.trim().parse().map_err(|_| {
            ToolError::ValidationFailure(format!("invalid rate limit count '{}'", count.trim()))
        })?;

        let window_secs = match unit.trim().to_ascii_lowercase().as_str() {
            "second" | "sec" | "s" => 1,
            "minute" | "min" | "m" => 60,
            "hour" | "h" => 3600,
            "day" | "d" => 86400,
            other => {
                return Err(ToolError::ValidationFailure(format!(
                    "invalid rate limit unit '{}'",
                    other
                )))
            }
        };

        Ok(Self {
            max_requests,
            window: Duration::from_secs(window_secs),
        })
    }

    /// Whether this policy admits everything (the zero-count escape hatch)
    pub fn disabled(&self) -> bool {
        self.max_requests == 0
    }
}

#[derive(Debug)]
struct Window {
    start: Instant,
    count: u32,
}

// Sharded so unrelated clients/tools never contend on one lock.
const SHARD_COUNT: usize = 16;

/// Fixed-window rate limiter keyed by `(client, tool)`
///
/// Each key's counter is read-modified-written under its shard lock, so
/// concurrent admissions for the same key are linearizable: when one slot
/// remains, exactly one of two racing calls gets it.
#[derive(Debug)]
pub struct RateLimiter {
    policy: RateLimitPolicy,
    shards: Vec<Mutex<HashMap<(String, String), Window>>>,
}

impl RateLimiter {
    pub fn new(policy: RateLimitPolicy) -> Self {
        Self {
            policy,
            shards: (0..SHARD_COUNT).map(|_| Mutex::new(HashMap::new())).collect(),
        }
    }

    pub fn policy(&self) -> RateLimitPolicy {
        self.policy
    }

    /// Admit or reject one request for `(client, tool)`
    ///
    /// Admission increments the window counter; rejection does not.
    pub fn admit(&self, client: &str, tool: &str) -> bool {
        if self.policy.disabled() {
            return true;
        }

        let now = Instant::now();
        let shard = &self.shards[self.shard_index(client, tool)];
        let mut map = shard.lock().unwrap_or_else(|e| e.into_inner());

        let window = map
            .entry((client.to_string(), tool.to_string()))
            .or_insert_with(|| Window {
                start: now,
                count: 0,
            });

        if now.duration_since(window.start) >= self.policy.window {
            window.start = now;
            window.count = 0;
        }

        if window.count < self.policy.max_requests {
            window.count += 1;
            true
        } else {
            false
        }
    }

    fn shard_index(&self, client: &str, tool: &str) -> usize {
        let mut hasher = DefaultHasher::new();
        client.hash(&mut hasher);
        tool.hash(&mut hasher);
        (hasher.finish() as usize) % SHARD_COUNT
    }
}

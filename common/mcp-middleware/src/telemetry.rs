//! Call-wrapping instrumentation for tool invocations
//!
//! Every tool call runs inside [`Telemetry::wrap`], which assigns a request
//! id, emits exactly one start event and exactly one terminal event, checks
//! the rate limiter for rate-limited tools, and records counters and
//! durations. It observes errors but never swallows them: the body's result
//! is always returned unchanged.

use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Instant, SystemTime, UNIX_EPOCH};

use tracing::Instrument;

use crate::error::{ToolError, ToolResult};
use crate::limiter::RateLimiter;
use crate::metrics::ToolMetrics;

/// Correlation data for one in-flight invocation
///
/// Created at call entry, lives for the duration of that call only, and is
/// never shared across calls.
#[derive(Debug, Clone)]
pub struct RequestContext {
    pub request_id: String,
    pub tool: String,
    pub client: String,
    pub started: Instant,
}

/// Instrumentation wrapper shared by all tools of one server
#[derive(Debug)]
pub struct Telemetry {
    limiter: Option<Arc<RateLimiter>>,
    metrics: Arc<ToolMetrics>,
    sequence: AtomicU64,
}

impl Telemetry {
    pub fn new(limiter: Option<Arc<RateLimiter>>, metrics: Arc<ToolMetrics>) -> Self {
        Self {
            limiter,
            metrics,
            sequence: AtomicU64::new(0),
        }
    }

    pub fn metrics(&self) -> &Arc<ToolMetrics> {
        &self.metrics
    }

    /// Unique within this process: tool name, epoch millis, monotonic counter
    fn next_request_id(&self, tool: &str) -> String {
        let seq = self.sequence.fetch_add(1, Ordering::Relaxed);
        let millis = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis())
            .unwrap_or(0);
        format!("{}_{}_{}", tool, millis, seq)
    }

    /// Wrap one tool invocation
    ///
    /// `rate_limited` tools are checked against the limiter before the body
    /// runs; a rejection counts as the invocation's terminal failure and the
    /// body is never invoked. `params` is the tool's parameter key names;
    /// log events carry those names as the argument shape but never values.
    pub async fn wrap<T, F>(
        &self,
        tool: &str,
        client: &str,
        rate_limited: bool,
        params: &[&str],
        body: F,
    ) -> ToolResult<T>
    where
        F: Future<Output = ToolResult<T>>,
    {
        let ctx = RequestContext {
            request_id: self.next_request_id(tool),
            tool: tool.to_string(),
            client: client.to_string(),
            started: Instant::now(),
        };

        let span = tracing::info_span!(
            "tool_request",
            request_id = %ctx.request_id,
            tool = %ctx.tool,
            client = %ctx.client,
            params = %params.join(","),
        );

        span.in_scope(|| tracing::info!("request started"));

        if rate_limited {
            if let Some(limiter) = &self.limiter {
                if !limiter.admit(client, tool) {
                    let err = ToolError::RateLimitExceeded {
                        client: client.to_string(),
                        tool: tool.to_string(),
                    };
                    self.finish_failure(&span, &ctx, &err);
                    return Err(err);
                }
            }
        }

        match body.instrument(span.clone()).await {
            Ok(value) => {
                let duration = ctx.started.elapsed();
                self.metrics.record_request(tool, "success");
                self.metrics.observe_duration(tool, duration);
                span.in_scope(|| {
                    tracing::info!(duration_ms = duration.as_millis() as u64, "request completed")
                });
                Ok(value)
            }
            Err(err) => {
                self.finish_failure(&span, &ctx, &err);
                Err(err)
            }
        }
    }

    fn finish_failure(&self, span: &tracing::Span, ctx: &RequestContext, err: &ToolError) {
        let duration = ctx.started.elapsed();
        self.metrics.record_request(&ctx.tool, err.kind());
        span.in_scope(|| {
            tracing::warn!(
                error_kind = err.kind(),
                error = %err,
                duration_ms = duration.as_millis() as u64,
                "request failed"
            )
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::limiter::RateLimitPolicy;
    use std::sync::Mutex;
    use std::time::Duration;

    fn telemetry_with_policy(policy: Option<RateLimitPolicy>) -> Telemetry {
        let limiter = policy.map(|p| Arc::new(RateLimiter::new(p)));
        Telemetry::new(limiter, Arc::new(ToolMetrics::new()))
    }

    #[tokio::test]
    async fn test_success_counted_and_timed() {
        let telemetry = telemetry_with_policy(None);
        let result: ToolResult<u32> = telemetry
            .wrap("echo", "alice", false, &["message"], async { Ok(42) })
            .await;
        assert_eq!(result.unwrap(), 42);
        assert_eq!(telemetry.metrics().request_count("echo", "success"), 1);
        // Duration histogram observed exactly once
        assert!(telemetry
            .metrics()
            .to_prometheus()
            .contains("mcp_request_duration_seconds_count{tool=\"echo\"} 1"));
    }

    #[tokio::test]
    async fn test_failure_classified_and_reraised() {
        let telemetry = telemetry_with_policy(None);
        let result: ToolResult<u32> = telemetry
            .wrap("read_file", "alice", false, &["path"], async {
                Err(ToolError::PathViolation("../x".into()))
            })
            .await;
        assert!(matches!(result, Err(ToolError::PathViolation(_))));
        assert_eq!(
            telemetry.metrics().request_count("read_file", "path_violation"),
            1
        );
        assert_eq!(telemetry.metrics().request_count("read_file", "success"), 0);
    }

    #[tokio::test]
    async fn test_rate_limited_rejection_skips_body() {
        let telemetry =
            telemetry_with_policy(Some(RateLimitPolicy::new(1, Duration::from_secs(60))));

        let first: ToolResult<()> = telemetry
            .wrap("echo", "bob", true, &["message"], async { Ok(()) })
            .await;
        assert!(first.is_ok());

        let mut body_ran = false;
        let second: ToolResult<()> = telemetry
            .wrap("echo", "bob", true, &["message"], async {
                body_ran = true;
                Ok(())
            })
            .await;
        assert!(matches!(second, Err(ToolError::RateLimitExceeded { .. })));
        assert!(!body_ran);
        assert_eq!(telemetry.metrics().request_count("echo", "rate_limited"), 1);
        assert_eq!(telemetry.metrics().request_count("echo", "success"), 1);
    }

    #[tokio::test]
    async fn test_unlimited_tools_skip_admission() {
        let telemetry =
            telemetry_with_policy(Some(RateLimitPolicy::new(1, Duration::from_secs(60))));
        for _ in 0..5 {
            let result: ToolResult<()> = telemetry
                .wrap("health_check", "bob", false, &[], async { Ok(()) })
                .await;
            assert!(result.is_ok());
        }
        assert_eq!(
            telemetry.metrics().request_count("health_check", "success"),
            5
        );
    }

    #[tokio::test]
    async fn test_request_ids_are_unique() {
        let telemetry = telemetry_with_policy(None);
        let a = telemetry.next_request_id("echo");
        let b = telemetry.next_request_id("echo");
        assert_ne!(a, b);
        assert!(a.starts_with("echo_"));
    }

    #[derive(Clone, Default)]
    struct LogCapture(Arc<Mutex<Vec<u8>>>);

    impl LogCapture {
        fn contents(&self) -> String {
            String::from_utf8_lossy(&self.0.lock().unwrap()).to_string()
        }
    }

    impl std::io::Write for LogCapture {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }
        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_start_event_carries_param_names_not_values() {
        let capture = LogCapture::default();
        let writer = capture.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_writer(move || writer.clone())
            .with_ansi(false)
            .finish();
        let _guard = tracing::subscriber::set_default(subscriber);

        let telemetry = telemetry_with_policy(None);
        let secret = "hunter2";
        let result: ToolResult<()> = telemetry
            .wrap("write_file", "alice", false, &["path", "content"], async {
                let _ = secret; // the body sees values; telemetry never does
                Ok(())
            })
            .await;
        assert!(result.is_ok());

        let logs = capture.contents();
        assert!(logs.contains("request started"));
        assert!(logs.contains("path,content"));
        assert!(!logs.contains("hunter2"));
    }
}

//! Request counters and latency histograms
//!
//! In-process registry with Prometheus text exposition. Emission happens
//! once per request and the critical section is a hash map update, so a
//! plain mutex per map is sufficient.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

/// Histogram bucket upper bounds in seconds (Prometheus `le` convention)
const BUCKET_BOUNDS: [f64; 10] = [0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 10.0];

#[derive(Debug, Default, Clone)]
struct Histogram {
    // Per-bucket counts; cumulated only at export time
    buckets: [u64; 10],
    overflow: u64,
    sum: f64,
    count: u64,
}

impl Histogram {
    fn observe(&mut self, secs: f64) {
        match BUCKET_BOUNDS.iter().position(|bound| secs <= *bound) {
            Some(i) => self.buckets[i] += 1,
            None => self.overflow += 1,
        }
        self.sum += secs;
        self.count += 1;
    }
}

/// Per-tool request counters and duration histograms
#[derive(Debug)]
pub struct ToolMetrics {
    // (tool, status) -> count
    requests: Mutex<HashMap<(String, String), u64>>,
    // tool -> duration histogram
    durations: Mutex<HashMap<String, Histogram>>,
}

impl ToolMetrics {
    pub fn new() -> Self {
        Self {
            requests: Mutex::new(HashMap::new()),
            durations: Mutex::new(HashMap::new()),
        }
    }

    /// Increment `requests_total{tool,status}`
    pub fn record_request(&self, tool: &str, status: &str) {
        let mut requests = self.requests.lock().unwrap_or_else(|e| e.into_inner());
        *requests
            .entry((tool.to_string(), status.to_string()))
            .or_insert(0) += 1;
    }

    /// Record one request duration for `tool`
    pub fn observe_duration(&self, tool: &str, duration: Duration) {
        let mut durations = self.durations.lock().unwrap_or_else(|e| e.into_inner());
        durations
            .entry(tool.to_string())
            .or_default()
            .observe(duration.as_secs_f64());
    }

    /// Current counter value for `(tool, status)`, zero if never recorded
    pub fn request_count(&self, tool: &str, status: &str) -> u64 {
        let requests = self.requests.lock().unwrap_or_else(|e| e.into_inner());
        requests
            .get(&(tool.to_string(), status.to_string()))
            .copied()
            .unwrap_or(0)
    }

    /// JSON snapshot of request counters, for health/info tools
    pub fn snapshot(&self) -> serde_json::Value {
        let requests = self.requests.lock().unwrap_or_else(|e| e.into_inner());
        let mut by_tool: HashMap<&str, serde_json::Map<String, serde_json::Value>> = HashMap::new();
        for ((tool, status), count) in requests.iter() {
            by_tool
                .entry(tool)
                .or_default()
                .insert(status.clone(), serde_json::json!(count));
        }
        serde_json::to_value(
            by_tool
                .into_iter()
                .map(|(k, v)| (k.to_string(), serde_json::Value::Object(v)))
                .collect::<serde_json::Map<_, _>>(),
        )
        .unwrap_or_default()
    }

    /// Export all metrics in Prometheus text exposition format
    pub fn to_prometheus(&self) -> String {
        let mut out = String::new();

        out.push_str("# HELP mcp_requests_total Total tool requests by status.\n");
        out.push_str("# TYPE mcp_requests_total counter\n");
        {
            let requests = self.requests.lock().unwrap_or_else(|e| e.into_inner());
            let mut entries: Vec<_> = requests.iter().collect();
            entries.sort_by(|a, b| a.0.cmp(b.0));
            for ((tool, status), count) in entries {
                out.push_str(&format!(
                    "mcp_requests_total{{tool=\"{}\",status=\"{}\"}} {}\n",
                    tool, status, count
                ));
            }
        }

        out.push_str("# HELP mcp_request_duration_seconds Tool request duration.\n");
        out.push_str("# TYPE mcp_request_duration_seconds histogram\n");
        {
            let durations = self.durations.lock().unwrap_or_else(|e| e.into_inner());
            let mut entries: Vec<_> = durations.iter().collect();
            entries.sort_by(|a, b| a.0.cmp(b.0));
            for (tool, histogram) in entries {
                let mut cumulative = 0u64;
                for (bound, count) in BUCKET_BOUNDS.iter().zip(histogram.buckets.iter()) {
                    cumulative += count;
                    out.push_str(&format!(
                        "mcp_request_duration_seconds_bucket{{tool=\"{}\",le=\"{}\"}} {}\n",
                        tool, bound, cumulative
                    ));
                }
                cumulative += histogram.overflow;
                out.push_str(&format!(
                    "mcp_request_duration_seconds_bucket{{tool=\"{}\",le=\"+Inf\"}} {}\n",
                    tool, cumulative
                ));
                out.push_str(&format!(
                    "mcp_request_duration_seconds_sum{{tool=\"{}\"}} {}\n",
                    tool, histogram.sum
                ));
                out.push_str(&format!(
                    "mcp_request_duration_seconds_count{{tool=\"{}\"}} {}\n",
                    tool, histogram.count
                ));
            }
        }

        out
    }
}

impl Default for ToolMetrics {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counter_increments() {
        let metrics = ToolMetrics::new();
        metrics.record_request("echo", "success");
        metrics.record_request("echo", "success");
        metrics.record_request("echo", "rate_limited");
        assert_eq!(metrics.request_count("echo", "success"), 2);
        assert_eq!(metrics.request_count("echo", "rate_limited"), 1);
        assert_eq!(metrics.request_count("echo", "internal_error"), 0);
    }

    #[test]
    fn test_prometheus_counter_lines() {
        let metrics = ToolMetrics::new();
        metrics.record_request("read_file", "rate_limited");
        let body = metrics.to_prometheus();
        assert!(body.contains("# TYPE mcp_requests_total counter"));
        assert!(body.contains("mcp_requests_total{tool=\"read_file\",status=\"rate_limited\"} 1"));
    }

    #[test]
    fn test_histogram_buckets_are_cumulative() {
        let metrics = ToolMetrics::new();
        metrics.observe_duration("echo", Duration::from_millis(1));
        metrics.observe_duration("echo", Duration::from_millis(200));
        let body = metrics.to_prometheus();
        // 1ms falls in the first bucket, 200ms in le="0.25"
        assert!(body.contains("mcp_request_duration_seconds_bucket{tool=\"echo\",le=\"0.005\"} 1"));
        assert!(body.contains("mcp_request_duration_seconds_bucket{tool=\"echo\",le=\"0.25\"} 2"));
        assert!(body.contains("mcp_request_duration_seconds_bucket{tool=\"echo\",le=\"+Inf\"} 2"));
        assert!(body.contains("mcp_request_duration_seconds_count{tool=\"echo\"} 2"));
    }

    #[test]
    fn test_overflow_bucket() {
        let metrics = ToolMetrics::new();
        metrics.observe_duration("slow", Duration::from_secs(30));
        let body = metrics.to_prometheus();
        assert!(body.contains("mcp_request_duration_seconds_bucket{tool=\"slow\",le=\"10\"} 0"));
        assert!(body.contains("mcp_request_duration_seconds_bucket{tool=\"slow\",le=\"+Inf\"} 1"));
    }

    #[test]
    fn test_snapshot_groups_by_tool() {
        let metrics = ToolMetrics::new();
        metrics.record_request("echo", "success");
        let snapshot = metrics.snapshot();
        assert_eq!(snapshot["echo"]["success"], serde_json::json!(1));
    }
}

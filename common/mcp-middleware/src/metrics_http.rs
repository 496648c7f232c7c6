//! Prometheus scrape endpoint
//!
//! A deliberately small HTTP/1.1 responder on a raw `TcpListener`: one
//! localhost port, `GET /metrics` answered from [`ToolMetrics`], anything
//! else 404. The request head is read (bounded) before responding so a
//! well-behaved scraper never sees the connection close with unread bytes.

use std::sync::Arc;
use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio_util::sync::CancellationToken;

use crate::metrics::ToolMetrics;

const PROMETHEUS_CONTENT_TYPE: &str = "text/plain; version=0.0.4; charset=utf-8";
const MAX_REQUEST_HEAD: usize = 4096;
const REQUEST_READ_TIMEOUT: Duration = Duration::from_secs(2);

/// Serve Prometheus text metrics on `addr` (e.g. "127.0.0.1:9090") until
/// the cancel token fires. A bind failure is logged and the endpoint is
/// simply absent; the MCP server itself keeps running.
pub async fn serve_metrics(addr: String, metrics: Arc<ToolMetrics>, cancel: CancellationToken) {
    let listener = match TcpListener::bind(&addr).await {
        Ok(l) => l,
        Err(e) => {
            tracing::warn!("Metrics endpoint: failed to bind {}: {}", addr, e);
            return;
        }
    };

    tracing::info!("Metrics endpoint: listening on http://{}/metrics", addr);

    loop {
        tokio::select! {
            _ = cancel.cancelled() => {
                tracing::info!("Metrics endpoint: shutting down");
                break;
            }
            accept = listener.accept() => {
                let Ok((stream, _)) = accept else { continue };
                tokio::spawn(handle_scrape(stream, Arc::clone(&metrics)));
            }
        }
    }
}

async fn handle_scrape(mut stream: TcpStream, metrics: Arc<ToolMetrics>) {
    let Some(head) = read_request_head(&mut stream).await else {
        return;
    };

    let (status, content_type, body) = match request_target(&head) {
        Some(("GET", "/metrics")) => ("200 OK", PROMETHEUS_CONTENT_TYPE, metrics.to_prometheus()),
        Some(("GET", _)) => ("404 Not Found", "text/plain", "not found\n".to_string()),
        Some(_) => (
            "405 Method Not Allowed",
            "text/plain",
            "method not allowed\n".to_string(),
        ),
        None => ("400 Bad Request", "text/plain", "bad request\n".to_string()),
    };

    let response = format!(
        "HTTP/1.1 {}\r\n\
         Content-Type: {}\r\n\
         Content-Length: {}\r\n\
         Connection: close\r\n\
         \r\n\
         {}",
        status,
        content_type,
        body.len(),
        body
    );

    let _ = stream.write_all(response.as_bytes()).await;
    let _ = stream.shutdown().await;
}

/// Read until the end of the request head, a size cap, or a deadline
async fn read_request_head(stream: &mut TcpStream) -> Option<Vec<u8>> {
    let read = async {
        let mut head = Vec::with_capacity(512);
        let mut buf = [0u8; 512];
        loop {
            let n = stream.read(&mut buf).await.ok()?;
            if n == 0 {
                break;
            }
            head.extend_from_slice(&buf[..n]);
            if head.windows(4).any(|w| w == b"\r\n\r\n") || head.len() >= MAX_REQUEST_HEAD {
                break;
            }
        }
        Some(head)
    };
    tokio::time::timeout(REQUEST_READ_TIMEOUT, read).await.ok()?
}

/// Method and path from the request line, if it parses
fn request_target(head: &[u8]) -> Option<(&str, &str)> {
    let head = std::str::from_utf8(head).ok()?;
    let mut parts = head.lines().next()?.split_whitespace();
    let method = parts.next()?;
    let path = parts.next()?;
    // Scrapers may append a query string; route on the path alone
    let path = path.split('?').next().unwrap_or(path);
    Some((method, path))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::AsyncReadExt;

    async fn request(addr: &str, head: &str) -> String {
        let mut stream = tokio::net::TcpStream::connect(addr).await.unwrap();
        stream.write_all(head.as_bytes()).await.unwrap();
        let mut response = String::new();
        stream.read_to_string(&mut response).await.unwrap();
        response
    }

    async fn start_server(metrics: Arc<ToolMetrics>) -> (String, CancellationToken) {
        // Bind on an ephemeral port to learn a free address
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap().to_string();
        drop(listener);

        let cancel = CancellationToken::new();
        tokio::spawn(serve_metrics(addr.clone(), metrics, cancel.clone()));
        tokio::time::sleep(Duration::from_millis(50)).await;
        (addr, cancel)
    }

    #[tokio::test]
    async fn test_serves_metrics_body() {
        let metrics = Arc::new(ToolMetrics::new());
        metrics.record_request("echo", "success");
        let (addr, cancel) = start_server(Arc::clone(&metrics)).await;

        let response = request(&addr, "GET /metrics HTTP/1.1\r\nHost: x\r\n\r\n").await;
        assert!(response.starts_with("HTTP/1.1 200 OK"));
        assert!(response.contains("mcp_requests_total{tool=\"echo\",status=\"success\"} 1"));

        cancel.cancel();
    }

    #[tokio::test]
    async fn test_unknown_path_is_404() {
        let metrics = Arc::new(ToolMetrics::new());
        let (addr, cancel) = start_server(metrics).await;

        let response = request(&addr, "GET /health HTTP/1.1\r\nHost: x\r\n\r\n").await;
        assert!(response.starts_with("HTTP/1.1 404 Not Found"));

        cancel.cancel();
    }

    #[tokio::test]
    async fn test_non_get_is_405() {
        let metrics = Arc::new(ToolMetrics::new());
        let (addr, cancel) = start_server(metrics).await;

        let response = request(&addr, "POST /metrics HTTP/1.1\r\nHost: x\r\n\r\n").await;
        assert!(response.starts_with("HTTP/1.1 405 Method Not Allowed"));

        cancel.cancel();
    }

    #[tokio::test]
    async fn test_query_string_ignored_for_routing() {
        let metrics = Arc::new(ToolMetrics::new());
        let (addr, cancel) = start_server(metrics).await;

        let response = request(&addr, "GET /metrics?ts=1 HTTP/1.1\r\nHost: x\r\n\r\n").await;
        assert!(response.starts_with("HTTP/1.1 200 OK"));

        cancel.cancel();
    }
}

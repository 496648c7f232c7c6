//! Tracing initialization for MCP servers
//!
//! All logging goes to stderr — stdout is reserved for the MCP protocol.
//! Production output is line-oriented JSON so events can be shipped to a
//! log aggregator as-is; set `LOG_FORMAT=text` for human-readable output
//! during development.

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Initialize tracing for an MCP server
///
/// Default level is `info` for the given crate, overridable via `RUST_LOG`.
pub fn init_tracing(crate_name: &str) -> anyhow::Result<()> {
    let directive = format!("{}=info", crate_name);
    let filter = EnvFilter::from_default_env().add_directive(directive.parse()?);

    let use_text = std::env::var("LOG_FORMAT")
        .map(|v| v.eq_ignore_ascii_case("text"))
        .unwrap_or(false);

    let registry = tracing_subscriber::registry().with(filter);

    if use_text {
        registry
            .with(
                tracing_subscriber::fmt::layer()
                    .with_writer(std::io::stderr)
                    .with_ansi(false),
            )
            .init();
    } else {
        registry
            .with(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_writer(std::io::stderr),
            )
            .init();
    }

    Ok(())
}

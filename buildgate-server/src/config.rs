//! Startup configuration

use clap::{Parser, ValueEnum};
use std::net::SocketAddr;
use std::path::PathBuf;

/// Log output format
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LogFormat {
    /// Human-readable lines
    Text,
    /// One JSON object per event
    Json,
}

/// Command-line and environment configuration of the gate
#[derive(Debug, Clone, Parser)]
#[command(name = "buildgate-server")]
#[command(about = "Build admission gate for CI validator webhooks")]
#[command(version)]
pub struct ServerConfig {
    /// Address to listen on; `:port` listens on all interfaces
    #[arg(long, env = "BUILDGATE_ENDPOINT", default_value = ":3000")]
    pub endpoint: String,

    /// Shared secret used to sign requests (e.g. `openssl rand -hex 16`)
    #[arg(
        long,
        env = "BUILDGATE_SECRET",
        default_value = "",
        hide_env_values = true,
        hide_default_value = true
    )]
    pub secret: String,

    /// Log every gate decision, including request payloads
    #[arg(long, env = "BUILDGATE_DEBUG")]
    pub debug: bool,

    /// Path to the author policy file (.json or .toml)
    #[arg(long = "cfg", env = "BUILDGATE_CFG", default_value = "users.json")]
    pub policy_file: PathBuf,

    /// Maximum allowed distance between the Date header and server time, in seconds (0 disables)
    #[arg(long, env = "BUILDGATE_MAX_CLOCK_SKEW", default_value_t = 0)]
    pub max_clock_skew: u64,

    /// Largest accepted request body, in bytes
    #[arg(long, env = "BUILDGATE_MAX_BODY_BYTES", default_value_t = 1024 * 1024)]
    pub max_body_bytes: usize,

    /// Serve Prometheus metrics on this address
    #[arg(long, env = "BUILDGATE_METRICS_ADDRESS")]
    pub metrics_address: Option<SocketAddr>,

    /// Log output format
    #[arg(long, env = "BUILDGATE_LOG_FORMAT", value_enum, default_value_t = LogFormat::Text)]
    pub log_format: LogFormat,
}

impl ServerConfig {
    /// Address to bind, with `:port` expanded to all interfaces
    pub fn bind_address(&self) -> String {
        normalize_endpoint(&self.endpoint)
    }
}

/// Expand a `:port` endpoint to `0.0.0.0:port`
pub fn normalize_endpoint(endpoint: &str) -> String {
    if endpoint.starts_with(':') {
        format!("0.0.0.0{}", endpoint)
    } else {
        endpoint.to_string()
    }
}

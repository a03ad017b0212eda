//! Log output setup and the debug side channel

use crate::config::LogFormat;
use std::fmt;
use tracing_subscriber::EnvFilter;

/// Target used for debug side channel events
pub const DEBUG_TARGET: &str = "buildgate::gate";

/// Default filter, widened when debug mode is on
fn default_filter(debug: bool) -> EnvFilter {
    if debug {
        EnvFilter::new("info,buildgate=debug")
    } else {
        EnvFilter::new("info")
    }
}

/// Install the global subscriber
///
/// `RUST_LOG` takes precedence over the default filter.
pub fn init_logging(debug: bool, format: LogFormat) -> anyhow::Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| default_filter(debug));
    let builder = tracing_subscriber::fmt().with_env_filter(filter);

    match format {
        LogFormat::Text => tracing::subscriber::set_global_default(builder.finish())?,
        LogFormat::Json => tracing::subscriber::set_global_default(builder.json().finish())?,
    }
    Ok(())
}

/// Point in the request lifecycle a debug event belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    /// Signature header extraction
    Signature,
    /// HMAC and digest validation
    Verification,
    /// Reading the body
    Body,
    /// Decoding the payload
    Decode,
    /// Policy resolution
    Resolve,
}

impl Stage {
    /// Field value for this stage
    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Signature => "signature",
            Stage::Verification => "verification",
            Stage::Body => "body",
            Stage::Decode => "decode",
            Stage::Resolve => "resolve",
        }
    }
}

/// Diagnostics emitted only when the gate runs in debug mode
///
/// The flag is fixed at startup. When disabled nothing is emitted, whatever
/// the subscriber filter says, so payloads never reach production logs.
#[derive(Debug, Clone, Copy, Default)]
pub struct DebugLog {
    enabled: bool,
}

impl DebugLog {
    /// Create the channel
    pub fn new(enabled: bool) -> Self {
        Self { enabled }
    }

    /// Whether events are emitted
    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Record an event for `stage`
    pub fn event(&self, stage: Stage, detail: impl fmt::Display) {
        if self.enabled {
            tracing::debug!(target: DEBUG_TARGET, stage = stage.as_str(), "validator: {}", detail);
        }
    }

    /// Record the raw, authenticated payload
    pub fn payload(&self, body: &[u8]) {
        if self.enabled {
            self.event(Stage::Decode, String::from_utf8_lossy(body));
        }
    }
}

//! Application state

use crate::config::ServerConfig;
use crate::tracing::DebugLog;
use buildgate_core::{PolicyTable, Result, Verifier};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Default request body limit
pub const DEFAULT_MAX_BODY_BYTES: usize = 1024 * 1024;

/// Immutable state shared across handlers
#[derive(Clone)]
pub struct AppState {
    /// Author policies, loaded once
    pub policies: Arc<PolicyTable>,

    /// Signature verifier holding the shared secret
    pub verifier: Arc<Verifier>,

    /// Debug side channel
    pub debug: DebugLog,

    /// Body size limit in bytes
    pub max_body_bytes: usize,

    /// Server start time
    pub start_time: Instant,
}

impl AppState {
    /// Create application state
    pub fn new(policies: PolicyTable, verifier: Verifier) -> Self {
        Self {
            policies: Arc::new(policies),
            verifier: Arc::new(verifier),
            debug: DebugLog::default(),
            max_body_bytes: DEFAULT_MAX_BODY_BYTES,
            start_time: Instant::now(),
        }
    }

    /// Build the state from startup configuration
    ///
    /// Fails on an empty secret or an unreadable policy file.
    pub fn from_config(config: &ServerConfig) -> Result<Self> {
        let mut verifier = Verifier::new(&config.secret)?;
        if config.max_clock_skew > 0 {
            verifier = verifier.with_max_clock_skew(Duration::from_secs(config.max_clock_skew));
        }
        let policies = PolicyTable::load(&config.policy_file)?;

        Ok(Self::new(policies, verifier)
            .with_debug(config.debug)
            .with_max_body_bytes(config.max_body_bytes))
    }

    /// Enable or disable the debug side channel
    pub fn with_debug(mut self, debug: bool) -> Self {
        self.debug = DebugLog::new(debug);
        self
    }

    /// Change the body size limit
    pub fn with_max_body_bytes(mut self, limit: usize) -> Self {
        self.max_body_bytes = limit;
        self
    }

    /// Get uptime in seconds
    pub fn uptime_seconds(&self) -> u64 {
        self.start_time.elapsed().as_secs()
    }
}

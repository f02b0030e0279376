//! Tracing configuration for structured logging
//!
//! Applications configure subscribers; library code only emits trace
//! events. This module is only compiled with the `cli` feature.

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Registry};

/// Tracing subscriber configuration
#[derive(Debug, Clone)]
pub struct TracingConfig {
    /// Verbosity level (maps to log levels)
    pub verbosity: u8,
    /// Environment filter string (overrides verbosity if set)
    pub env_filter: Option<String>,
}

impl Default for TracingConfig {
    fn default() -> Self {
        Self {
            verbosity: 0,
            env_filter: None,
        }
    }
}

impl TracingConfig {
    /// Create a new tracing configuration
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set verbosity level (0-3+)
    #[must_use]
    pub fn with_verbosity(mut self, verbosity: u8) -> Self {
        self.verbosity = verbosity;
        self
    }

    /// Set custom environment filter
    #[must_use]
    pub fn with_env_filter<S: Into<String>>(mut self, filter: S) -> Self {
        self.env_filter = Some(filter.into());
        self
    }

    /// Map verbosity to a default filter directive
    #[must_use]
    pub fn verbosity_to_filter(&self) -> &'static str {
        match self.verbosity {
            0 => "warn",
            1 => "info",
            2 => "debug",
            _ => "trace",
        }
    }

    /// Install the subscriber globally
    ///
    /// # Errors
    ///
    /// Fails when a global subscriber is already installed.
    pub fn init(self) -> anyhow::Result<()> {
        let filter = match &self.env_filter {
            Some(custom) => EnvFilter::try_new(custom)?,
            None => EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(self.verbosity_to_filter())),
        };

        Registry::default()
            .with(filter)
            .with(
                tracing_subscriber::fmt::layer()
                    .with_target(false)
                    .with_writer(std::io::stderr),
            )
            .try_init()?;
        Ok(())
    }
}

/// Initialize tracing for CLI usage from a `-v` count
///
/// # Errors
///
/// Fails when a global subscriber is already installed.
pub fn init_cli_tracing(verbosity: u8) -> anyhow::Result<()> {
    TracingConfig::new().with_verbosity(verbosity).init()
}

/// Initialize minimal tracing for library embedding
///
/// Respects `RUST_LOG`, defaults to warnings only.
///
/// # Errors
///
/// Fails when a global subscriber is already installed.
pub fn init_library_tracing() -> anyhow::Result<()> {
    TracingConfig::new().init()
}

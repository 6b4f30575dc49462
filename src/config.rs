//! Configuration
//!
//! Values are layered, later layers winning:
//!
//! 1. Built-in defaults
//! 2. A TOML file: the explicit `config_path`, or `trampoline.toml` in the
//!    working directory when present
//! 3. Environment variables such as `TRAMPOLINE__POLL__TIMEOUT_SECS`
//!    (a `.env` file is loaded first)
//! 4. Overrides set on the builder

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{anyhow, bail, Context, Result};
use serde::{Deserialize, Serialize};

use crate::helpers::poll::{DEFAULT_POLL_INTERVAL, DEFAULT_POLL_TIMEOUT};
use crate::trampoline::DEFAULT_STACK_SIZE;

pub const DEFAULT_CONFIG_FILE: &str = "trampoline";
pub const ENV_PREFIX: &str = "TRAMPOLINE";

pub use crate::trampoline::MIN_STACK_SIZE;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub trampoline: TrampolineSettings,
    pub poll: PollSettings,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrampolineSettings {
    /// Coroutine stack size per task, in machine words.
    pub stack_size: usize,
    /// Emit the per-run diagnostic trace.
    pub trace: bool,
}

impl Default for TrampolineSettings {
    fn default() -> Self {
        Self {
            stack_size: DEFAULT_STACK_SIZE,
            trace: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PollSettings {
    pub timeout_secs: f64,
    pub interval_secs: f64,
    pub strict: bool,
}

impl Default for PollSettings {
    fn default() -> Self {
        Self {
            timeout_secs: DEFAULT_POLL_TIMEOUT.as_secs_f64(),
            interval_secs: DEFAULT_POLL_INTERVAL.as_secs_f64(),
            strict: false,
        }
    }
}

impl Config {
    pub fn builder() -> ConfigBuilder {
        ConfigBuilder::default()
    }

    /// Render as TOML, e.g. to seed a config file.
    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self).context("Failed to serialize configuration")
    }

    fn validate(&self) -> Result<()> {
        if self.trampoline.stack_size < MIN_STACK_SIZE {
            bail!(
                "trampoline.stack_size must be at least {} words, got {}",
                MIN_STACK_SIZE,
                self.trampoline.stack_size
            );
        }
        if secs_to_duration("poll.interval_secs", self.poll.interval_secs)?.is_zero() {
            bail!("poll.interval_secs must be positive, got {}", self.poll.interval_secs);
        }
        secs_to_duration("poll.timeout_secs", self.poll.timeout_secs)?;
        Ok(())
    }
}

/// Convert a seconds setting, rejecting negative, non-finite and overflowing values.
pub(crate) fn secs_to_duration(name: &str, secs: f64) -> Result<Duration> {
    Duration::try_from_secs_f64(secs)
        .map_err(|_| anyhow!("{name} must be a finite, non-negative number of seconds, got {secs}"))
}

#[derive(Debug, Default)]
pub struct ConfigBuilder {
    config_path: Option<PathBuf>,
    skip_env: bool,
    stack_size: Option<usize>,
    trace: Option<bool>,
    poll_timeout_secs: Option<f64>,
}

impl ConfigBuilder {
    /// Read this file instead of searching for `trampoline.toml`.
    pub fn config_path(mut self, path: Option<PathBuf>) -> Self {
        self.config_path = path;
        self
    }

    /// Ignore the environment and `.env`.
    pub fn skip_env(mut self, skip: bool) -> Self {
        self.skip_env = skip;
        self
    }

    pub fn stack_size(mut self, words: Option<usize>) -> Self {
        self.stack_size = words;
        self
    }

    pub fn trace(mut self, enabled: Option<bool>) -> Self {
        self.trace = enabled;
        self
    }

    pub fn poll_timeout_secs(mut self, secs: Option<f64>) -> Self {
        self.poll_timeout_secs = secs;
        self
    }

    pub fn build(self) -> Result<Config> {
        let mut builder = config::Config::builder();

        builder = match &self.config_path {
            Some(path) => builder.add_source(config::File::from(path.as_path()).required(true)),
            None => builder.add_source(config::File::with_name(DEFAULT_CONFIG_FILE).required(false)),
        };

        if !self.skip_env {
            if let Ok(path) = dotenvy::dotenv() {
                tracing::debug!(path = %path.display(), "loaded .env");
            }
            builder = builder.add_source(
                config::Environment::with_prefix(ENV_PREFIX)
                    .separator("__")
                    .try_parsing(true),
            );
        }

        let mut config: Config = builder
            .build()
            .context("Failed to load configuration")?
            .try_deserialize()
            .context("Failed to parse configuration")?;

        if let Some(words) = self.stack_size {
            config.trampoline.stack_size = words;
        }
        if let Some(enabled) = self.trace {
            config.trampoline.trace = enabled;
        }
        if let Some(secs) = self.poll_timeout_secs {
            config.poll.timeout_secs = secs;
        }

        config.validate()?;
        Ok(config)
    }
}

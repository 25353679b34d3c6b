use std::time::Duration;

use serde::Deserialize;
use termie_core::error::{Result, TermieError};

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ClientConfig {
    pub version: u32,

    #[serde(default)]
    pub login: LoginOptions,

    #[serde(default)]
    pub events: EventsSection,

    #[serde(default)]
    pub servers: Vec<ServerConfig>,
}

impl ClientConfig {
    /// Config for the given servers with default login/event settings.
    pub fn with_servers(servers: Vec<ServerConfig>) -> Self {
        Self {
            version: 1,
            login: LoginOptions::default(),
            events: EventsSection::default(),
            servers,
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.version != 1 {
            return Err(TermieError::Config(format!(
                "unsupported config version {}",
                self.version
            )));
        }
        if self.servers.is_empty() {
            return Err(TermieError::Config("servers must not be empty".into()));
        }

        self.login.validate()?;
        self.events.validate()?;
        for s in &self.servers {
            s.validate()?;
        }

        Ok(())
    }
}

/// Connect/login tuning, shared by every session.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LoginOptions {
    #[serde(default = "default_reconnection_attempts")]
    pub reconnection_attempts: u32,

    #[serde(default = "default_reconnection_delay_ms")]
    pub reconnection_delay_ms: u64,

    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
}

impl Default for LoginOptions {
    fn default() -> Self {
        Self {
            reconnection_attempts: default_reconnection_attempts(),
            reconnection_delay_ms: default_reconnection_delay_ms(),
            timeout_ms: default_timeout_ms(),
        }
    }
}

impl LoginOptions {
    pub fn validate(&self) -> Result<()> {
        if !(1..=100).contains(&self.reconnection_attempts) {
            return Err(TermieError::Config(
                "login.reconnection_attempts must be between 1 and 100".into(),
            ));
        }
        if !(100..=120000).contains(&self.timeout_ms) {
            return Err(TermieError::Config(
                "login.timeout_ms must be between 100 and 120000".into(),
            ));
        }
        if self.reconnection_delay_ms > 60000 {
            return Err(TermieError::Config(
                "login.reconnection_delay_ms must be at most 60000".into(),
            ));
        }
        Ok(())
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    pub fn reconnection_delay(&self) -> Duration {
        Duration::from_millis(self.reconnection_delay_ms)
    }
}

fn default_reconnection_attempts() -> u32 {
    5
}
fn default_reconnection_delay_ms() -> u64 {
    1000
}
fn default_timeout_ms() -> u64 {
    5000
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct EventsSection {
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,
}

impl Default for EventsSection {
    fn default() -> Self {
        Self {
            queue_capacity: default_queue_capacity(),
        }
    }
}

impl EventsSection {
    pub fn validate(&self) -> Result<()> {
        if !(1..=65536).contains(&self.queue_capacity) {
            return Err(TermieError::Config(
                "events.queue_capacity must be between 1 and 65536".into(),
            ));
        }
        Ok(())
    }
}

fn default_queue_capacity() -> usize {
    1024
}

/// One remote server to log into.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ServerConfig {
    /// Base address including the scheme, e.g. `http://localhost`.
    pub host: String,
    pub port: u16,
    pub token: String,
}

impl ServerConfig {
    pub fn new(host: impl Into<String>, port: u16, token: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            port,
            token: token.into(),
        }
    }

    pub fn validate(&self) -> Result<()> {
        if !(self.host.starts_with("http://") || self.host.starts_with("https://")) {
            return Err(TermieError::Config(format!(
                "server host must start with http:// or https:// (got {})",
                self.host
            )));
        }
        if self.hostname().is_empty() {
            return Err(TermieError::Config(format!("server host has no name: {}", self.host)));
        }
        if self.port == 0 {
            return Err(TermieError::Config(format!("server port must be non-zero ({})", self.host)));
        }
        if self.token.trim().is_empty() {
            return Err(TermieError::Config(format!("server token must not be empty ({})", self.host)));
        }
        Ok(())
    }

    /// Transport-security flag, derived from the scheme.
    pub fn secure(&self) -> bool {
        self.host.starts_with("https://")
    }

    /// Host name without the scheme or a trailing slash.
    pub fn hostname(&self) -> &str {
        self.host
            .strip_prefix("https://")
            .or_else(|| self.host.strip_prefix("http://"))
            .unwrap_or(&self.host)
            .trim_end_matches('/')
    }

    /// Registry key, `host:port`.
    pub fn base_key(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

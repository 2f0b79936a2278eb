use std::fmt;
use std::time::Duration;

use thiserror::Error;

pub const DEFAULT_TIMEOUT_SECONDS: u32 = 5;
pub const DEFAULT_PACKET_COUNT: u32 = 4;

/// Extra time granted to the ping process on top of its own timeout
/// before it is killed.
pub const WATCHDOG_GRACE_SECONDS: u64 = 5;

const TIMEOUT_RANGE: (u32, u32) = (1, 60);
const PACKET_COUNT_RANGE: (u32, u32) = (1, 100);

/// A single rejected field of a [`ProbeConfig`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FieldViolation {
    #[error("host cannot be empty")]
    EmptyHost,
    #[error("host cannot start with '-', got {0:?}")]
    OptionLikeHost(String),
    #[error("port must be between 1 and 65535, got {0}")]
    Port(u32),
    #[error("timeout must be between 1 and 60 seconds, got {0}")]
    Timeout(u32),
    #[error("packet count must be between 1 and 100, got {0}")]
    PacketCount(u32),
}

/// Every violation found while building a [`ProbeConfig`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid probe configuration: {}", join(.violations))]
pub struct ValidationError {
    pub violations: Vec<FieldViolation>,
}

fn join(violations: &[FieldViolation]) -> String {
    violations
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

pub fn validate_host(host: &str) -> Result<String, FieldViolation> {
    let host = host.trim();
    if host.is_empty() {
        return Err(FieldViolation::EmptyHost);
    }
    // Passed to ping as a positional argument.
    if host.starts_with('-') {
        return Err(FieldViolation::OptionLikeHost(host.to_string()));
    }
    Ok(host.to_string())
}

pub fn validate_port(port: u32) -> Result<u16, FieldViolation> {
    match u16::try_from(port) {
        Ok(p) if p != 0 => Ok(p),
        _ => Err(FieldViolation::Port(port)),
    }
}

pub fn validate_timeout(seconds: u32) -> Result<u32, FieldViolation> {
    in_range(seconds, TIMEOUT_RANGE).ok_or(FieldViolation::Timeout(seconds))
}

pub fn validate_packet_count(count: u32) -> Result<u32, FieldViolation> {
    in_range(count, PACKET_COUNT_RANGE).ok_or(FieldViolation::PacketCount(count))
}

fn in_range(value: u32, (min, max): (u32, u32)) -> Option<u32> {
    (min..=max).contains(&value).then_some(value)
}

/// Identity and parameters of one probe target.
///
/// Only obtainable through [`ProbeConfigBuilder::build`], so every instance
/// has passed validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProbeConfig {
    host: String,
    port: Option<u16>,
    timeout_seconds: u32,
    packet_count: u32,
}

impl ProbeConfig {
    pub fn builder(host: impl Into<String>) -> ProbeConfigBuilder {
        ProbeConfigBuilder {
            host: host.into(),
            port: None,
            timeout_seconds: DEFAULT_TIMEOUT_SECONDS,
            packet_count: DEFAULT_PACKET_COUNT,
        }
    }

    /// A config for `host` with default timeout and packet count.
    pub fn new(host: impl Into<String>) -> Result<Self, ValidationError> {
        Self::builder(host).build()
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn port(&self) -> Option<u16> {
        self.port
    }

    pub fn timeout_seconds(&self) -> u32 {
        self.timeout_seconds
    }

    pub fn packet_count(&self) -> u32 {
        self.packet_count
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(u64::from(self.timeout_seconds))
    }

    /// Outer bound for a whole probe: the tool's own timeout plus a grace period.
    pub fn watchdog_bound(&self) -> Duration {
        self.timeout() + Duration::from_secs(WATCHDOG_GRACE_SECONDS)
    }
}

impl fmt::Display for ProbeConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.port {
            Some(port) => write!(f, "{}:{}", self.host, port)?,
            None => write!(f, "{}", self.host)?,
        }
        write!(
            f,
            " (timeout={}s, packets={})",
            self.timeout_seconds, self.packet_count
        )
    }
}

#[derive(Debug, Clone)]
pub struct ProbeConfigBuilder {
    host: String,
    port: Option<u32>,
    timeout_seconds: u32,
    packet_count: u32,
}

impl ProbeConfigBuilder {
    pub fn port(mut self, port: u32) -> Self {
        self.port = Some(port);
        self
    }

    pub fn timeout_seconds(mut self, seconds: u32) -> Self {
        self.timeout_seconds = seconds;
        self
    }

    pub fn packet_count(mut self, count: u32) -> Self {
        self.packet_count = count;
        self
    }

    /// Runs every field validator and reports all failures together.
    pub fn build(self) -> Result<ProbeConfig, ValidationError> {
        let mut violations = Vec::new();

        let host = validate_host(&self.host).map_err(|v| violations.push(v)).ok();
        let port = match self.port {
            Some(p) => validate_port(p).map_err(|v| violations.push(v)).ok(),
            None => None,
        };
        let timeout = validate_timeout(self.timeout_seconds)
            .map_err(|v| violations.push(v))
            .ok();
        let count = validate_packet_count(self.packet_count)
            .map_err(|v| violations.push(v))
            .ok();

        match (host, timeout, count) {
            (Some(host), Some(timeout_seconds), Some(packet_count)) if violations.is_empty() => {
                Ok(ProbeConfig {
                    host,
                    port,
                    timeout_seconds,
                    packet_count,
                })
            }
            _ => Err(ValidationError { violations }),
        }
    }
}

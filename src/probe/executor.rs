use std::ffi::OsString;

use super::icmp::PING_TIMEOUT_MESSAGE;
use super::platform::Platform;
use super::result::{FailureKind, ProbeResult};
use super::tcp::TCP_TIMEOUT_MESSAGE;
use super::target::ProbeConfig;

pub const DEFAULT_PING_PROGRAM: &str = "ping";

/// How a probe reaches its target.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProbeMethod {
    /// Echo requests through the system `ping` tool.
    Icmp,
    /// A TCP handshake. Without a port the config's port is used; a port of
    /// 0 counts as absent.
    Tcp { port: Option<u16> },
}

impl ProbeMethod {
    pub fn tcp() -> Self {
        ProbeMethod::Tcp { port: None }
    }

    pub fn tcp_port(port: u16) -> Self {
        ProbeMethod::Tcp { port: Some(port) }
    }
}

/// Carries out probes with blocking I/O.
///
/// Holds no per-probe state, so one executor can serve any number of
/// concurrent probes.
#[derive(Debug, Clone)]
pub struct ProbeExecutor {
    pub(crate) platform: Platform,
    pub(crate) program: OsString,
    pub(crate) leading_args: Vec<OsString>,
}

impl Default for ProbeExecutor {
    fn default() -> Self {
        Self::new(Platform::current())
    }
}

impl ProbeExecutor {
    pub fn new(platform: Platform) -> Self {
        Self {
            platform,
            program: DEFAULT_PING_PROGRAM.into(),
            leading_args: Vec::new(),
        }
    }

    /// Uses `program` in place of the system `ping`. It receives the same
    /// arguments and its output is parsed for this executor's platform.
    pub fn with_program(mut self, program: impl Into<OsString>) -> Self {
        self.program = program.into();
        self.leading_args.clear();
        self
    }

    /// Runs ping through a wrapper, e.g. `["ip", "netns", "exec", "blue", "ping"]`.
    /// The first element is the program; the rest precede the ping arguments.
    /// An empty command keeps the current program.
    pub fn with_command<I, S>(mut self, command: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<OsString>,
    {
        let mut parts = command.into_iter().map(Into::<OsString>::into);
        if let Some(program) = parts.next() {
            self.program = program;
            self.leading_args = parts.collect();
        }
        self
    }

    pub fn platform(&self) -> Platform {
        self.platform
    }

    pub fn execute(&self, config: &ProbeConfig, method: ProbeMethod) -> ProbeResult {
        match method {
            ProbeMethod::Icmp => self.icmp(config),
            ProbeMethod::Tcp { port } => self.tcp(config, port),
        }
    }
}

/// The port a TCP probe connects to: an explicit non-zero port, else the
/// config's.
pub(crate) fn target_port(config: &ProbeConfig, port: Option<u16>) -> Option<u16> {
    port.filter(|p| *p != 0).or(config.port())
}

/// Host label and packet count a probe reports: `host:port` and one packet
/// for TCP, the bare host and the configured count for ICMP.
pub(crate) fn probe_target(config: &ProbeConfig, method: ProbeMethod) -> (String, u32) {
    match method {
        ProbeMethod::Icmp => (config.host().to_string(), config.packet_count()),
        ProbeMethod::Tcp { port } => match target_port(config, port) {
            Some(port) => (format!("{}:{}", config.host(), port), 1),
            None => (config.host().to_string(), 1),
        },
    }
}

/// A failed result worded the way `method` words its own failures.
pub(crate) fn failure_for(
    config: &ProbeConfig,
    method: ProbeMethod,
    kind: FailureKind,
    detail: &str,
) -> ProbeResult {
    let (host, sent) = probe_target(config, method);
    let message = match (method, kind) {
        (ProbeMethod::Icmp, FailureKind::Timeout) => PING_TIMEOUT_MESSAGE.to_string(),
        (ProbeMethod::Icmp, _) => format!("Ping error: {detail}"),
        (ProbeMethod::Tcp { .. }, FailureKind::Timeout) => TCP_TIMEOUT_MESSAGE.to_string(),
        (ProbeMethod::Tcp { .. }, _) => format!("TCP ping error: {detail}"),
    };
    ProbeResult::failed(host, kind, message, sent)
}

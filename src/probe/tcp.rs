use std::io::{self, ErrorKind};
use std::net::{SocketAddr, TcpStream, ToSocketAddrs};
use std::time::Instant;

use super::executor::{ProbeExecutor, target_port};
use super::result::{FailureKind, ProbeResult};
use super::target::ProbeConfig;

pub const TCP_TIMEOUT_MESSAGE: &str = "TCP ping timeout";
pub const NO_PORT_MESSAGE: &str = "No port specified for TCP ping";

impl ProbeExecutor {
    /// Measures a TCP handshake with `config.host()`.
    ///
    /// `port` wins over the config's port. Connect time counts from before
    /// name resolution, and is reported for refused connections too.
    pub fn tcp(&self, config: &ProbeConfig, port: Option<u16>) -> ProbeResult {
        let Some(port) = target_port(config, port) else {
            return ProbeResult::failed(
                config.host(),
                FailureKind::MissingPort,
                NO_PORT_MESSAGE,
                1,
            );
        };
        let target = format!("{}:{}", config.host(), port);

        let start = Instant::now();
        let addr = match resolve_ipv4(config.host(), port) {
            Ok(addr) => addr,
            Err(e) => {
                log::warn!("Cannot resolve {target}: {e}");
                return tcp_fault(&target, e);
            }
        };

        // The stream is dropped, and so closed, before any result is built.
        let outcome = TcpStream::connect_timeout(&addr, config.timeout()).map(drop);
        let elapsed_ms = start.elapsed().as_secs_f64() * 1000.0;
        classify_connect(&target, port, outcome, elapsed_ms)
    }
}

/// Turns the outcome of a connect attempt into a result.
fn classify_connect(
    target: &str,
    port: u16,
    outcome: io::Result<()>,
    elapsed_ms: f64,
) -> ProbeResult {
    match outcome {
        Ok(()) => ProbeResult::measured(target, 1, 1, 0.0, Some(elapsed_ms))
            .unwrap_or_else(|e| tcp_fault(target, e)),
        Err(e) if matches!(e.kind(), ErrorKind::TimedOut | ErrorKind::WouldBlock) => {
            log::debug!("TCP ping {target} timed out after {elapsed_ms:.0}ms");
            ProbeResult::failed(target, FailureKind::Timeout, TCP_TIMEOUT_MESSAGE, 1)
        }
        Err(e) => {
            log::debug!("TCP ping {target} failed: {e}");
            ProbeResult::failed(
                target,
                FailureKind::Unreachable,
                format!("Connection failed to port {port}"),
                1,
            )
            .with_response_time(elapsed_ms)
            .unwrap_or_else(|e| tcp_fault(target, e))
        }
    }
}

fn tcp_fault(target: &str, e: impl std::fmt::Display) -> ProbeResult {
    ProbeResult::failed(target, FailureKind::Fault, format!("TCP ping error: {e}"), 1)
}

fn resolve_ipv4(host: &str, port: u16) -> io::Result<SocketAddr> {
    (host, port)
        .to_socket_addrs()?
        .find(SocketAddr::is_ipv4)
        .ok_or_else(|| {
            io::Error::new(
                ErrorKind::AddrNotAvailable,
                format!("no IPv4 address found for {host}"),
            )
        })
}

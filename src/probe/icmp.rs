use std::io::{self, Read};
use std::process::{Command, ExitStatus, Stdio};
use std::sync::mpsc::{self, RecvTimeoutError, Sender};
use std::thread;
use std::time::{Duration, Instant};

use thiserror::Error;

use super::executor::ProbeExecutor;
use super::parser;
use super::result::{FailureKind, ProbeResult};
use super::target::ProbeConfig;

const POLL_INTERVAL: Duration = Duration::from_millis(20);

pub const PING_TIMEOUT_MESSAGE: &str = "Ping timeout";
const PING_FAILED_MESSAGE: &str = "Ping failed";

#[derive(Debug, Error)]
enum RunError {
    #[error("process still running after {0:?}")]
    TimedOut(Duration),
    #[error(transparent)]
    Io(#[from] io::Error),
}

#[derive(Debug, Clone, Copy)]
enum Pipe {
    Stdout,
    Stderr,
}

struct Captured {
    status: ExitStatus,
    stdout: String,
    stderr: String,
}

impl ProbeExecutor {
    /// Pings `config.host()` with the system tool.
    ///
    /// The tool gets its own timeout argument and is additionally killed once
    /// [`ProbeConfig::watchdog_bound`] has passed. A zero exit status with no
    /// replies in the output is still a failure.
    pub fn icmp(&self, config: &ProbeConfig) -> ProbeResult {
        let host = config.host();
        let sent = config.packet_count();

        let mut command = Command::new(&self.program);
        command
            .args(&self.leading_args)
            .args(self.platform.ping_args(sent, config.timeout()))
            .arg(host);
        log::debug!("Running {:?}", command);

        match run_with_watchdog(command, config.watchdog_bound()) {
            Ok(out) if out.status.success() => self.parsed_result(config, &out.stdout),
            Ok(out) => {
                let stderr = out.stderr.trim();
                let message = if stderr.is_empty() {
                    PING_FAILED_MESSAGE
                } else {
                    stderr
                };
                log::debug!("Ping {host} exited with {}: {message}", out.status);
                ProbeResult::failed(host, FailureKind::Unreachable, message, sent)
            }
            Err(RunError::TimedOut(limit)) => {
                log::warn!("Ping {host} killed after {limit:?}");
                ProbeResult::failed(host, FailureKind::Timeout, PING_TIMEOUT_MESSAGE, sent)
            }
            Err(RunError::Io(e)) => {
                log::warn!("Ping {host} could not be run: {e}");
                ProbeResult::failed(host, FailureKind::Fault, format!("Ping error: {e}"), sent)
            }
        }
    }

    fn parsed_result(&self, config: &ProbeConfig, stdout: &str) -> ProbeResult {
        let host = config.host();
        let stats = parser::parse(stdout, self.platform, config.packet_count()).stats;

        ProbeResult::measured(
            host,
            stats.packets_sent,
            stats.packets_received,
            stats.packet_loss_percent,
            stats.average_response_time_ms,
        )
        .unwrap_or_else(|e| {
            ProbeResult::failed(
                host,
                FailureKind::Fault,
                format!("Ping error: {e}"),
                config.packet_count(),
            )
        })
    }
}

fn run_with_watchdog(mut command: Command, limit: Duration) -> Result<Captured, RunError> {
    let mut child = command
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()?;

    // Drained on their own threads so a chatty child can't fill a pipe and stall.
    let (tx, rx) = mpsc::channel();
    drain(Pipe::Stdout, child.stdout.take(), tx.clone());
    drain(Pipe::Stderr, child.stderr.take(), tx);

    let deadline = Instant::now() + limit;
    let status = loop {
        match child.try_wait() {
            Ok(Some(status)) => break status,
            Ok(None) if Instant::now() >= deadline => {
                let _ = child.kill();
                let _ = child.wait();
                return Err(RunError::TimedOut(limit));
            }
            Ok(None) => thread::sleep(POLL_INTERVAL),
            Err(e) => {
                let _ = child.kill();
                let _ = child.wait();
                return Err(e.into());
            }
        }
    };

    // A descendant of the command may still hold the pipes open, so the
    // output is awaited against the same deadline.
    let mut captured = Captured {
        status,
        stdout: String::new(),
        stderr: String::new(),
    };
    for _ in 0..2 {
        let left = deadline.saturating_duration_since(Instant::now());
        match rx.recv_timeout(left) {
            Ok((Pipe::Stdout, bytes)) => captured.stdout = lossy(bytes),
            Ok((Pipe::Stderr, bytes)) => captured.stderr = lossy(bytes),
            Err(RecvTimeoutError::Timeout) => return Err(RunError::TimedOut(limit)),
            Err(RecvTimeoutError::Disconnected) => break,
        }
    }
    Ok(captured)
}

fn drain<R>(pipe: Pipe, reader: Option<R>, tx: Sender<(Pipe, Vec<u8>)>)
where
    R: Read + Send + 'static,
{
    thread::spawn(move || {
        let mut buf = Vec::new();
        if let Some(mut reader) = reader {
            let _ = reader.read_to_end(&mut buf);
        }
        let _ = tx.send((pipe, buf));
    });
}

fn lossy(bytes: Vec<u8>) -> String {
    String::from_utf8_lossy(&bytes).into_owned()
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use crate::probe::platform::Platform;

    // `sh -c <script> ping <ping args...>`: the script stands in for the ping tool.
    fn fake_ping(script: &str) -> ProbeExecutor {
        ProbeExecutor::new(Platform::Unix).with_command(["sh", "-c", script, "ping"])
    }

    fn config(timeout_seconds: u32) -> ProbeConfig {
        ProbeConfig::builder("example.com")
            .timeout_seconds(timeout_seconds)
            .packet_count(4)
            .build()
            .expect("valid config")
    }

    #[test]
    fn zero_exit_is_parsed() {
        let executor = fake_ping(
            "echo '4 packets transmitted, 4 received, 0% packet loss, time 3003ms'; \
             echo 'rtt min/avg/max/mdev = 1.234/2.345/3.456/0.123 ms'",
        );
        let result = executor.icmp(&config(1));
        assert!(result.success());
        assert_eq!(result.host(), "example.com");
        assert_eq!(result.packets_sent(), 4);
        assert_eq!(result.packets_received(), 4);
        assert_eq!(result.packet_loss_percent(), Some(0.0));
        assert_eq!(result.response_time_ms(), Some(2.345));
        assert_eq!(result.error_message(), None);
    }

    #[test]
    fn zero_exit_without_replies_fails() {
        let executor = fake_ping("echo '4 packets transmitted, 0 received, 100% packet loss'");
        let result = executor.icmp(&config(1));
        assert!(!result.success());
        assert_eq!(result.packets_received(), 0);
        assert_eq!(result.packet_loss_percent(), Some(100.0));
        assert_eq!(result.failure(), Some(FailureKind::Unreachable));
    }

    #[test]
    fn unparseable_zero_exit_fails() {
        let result = fake_ping("echo 'nothing useful'").icmp(&config(1));
        assert!(!result.success());
        assert_eq!(result.packets_received(), 0);
        assert_eq!(result.packet_loss_percent(), Some(100.0));
        assert_eq!(result.response_time_ms(), None);
    }

    #[test]
    fn passes_unix_arguments_before_host() {
        let result = fake_ping("echo \"$@\" >&2; exit 1").icmp(&config(3));
        assert_eq!(result.error_message(), Some("-c 4 -W 3 example.com"));
    }

    #[test]
    fn non_zero_exit_uses_error_stream() {
        let result = fake_ping("echo 'ping: example.com: Name or service not known' >&2; exit 2")
            .icmp(&config(1));
        assert!(!result.success());
        assert_eq!(
            result.error_message(),
            Some("ping: example.com: Name or service not known")
        );
        assert_eq!(result.packets_sent(), 4);
        assert_eq!(result.packets_received(), 0);
        assert_eq!(result.packet_loss_percent(), Some(100.0));
        assert_eq!(result.failure(), Some(FailureKind::Unreachable));
    }

    #[test]
    fn silent_non_zero_exit_has_generic_message() {
        let result = fake_ping("exit 1").icmp(&config(1));
        assert_eq!(result.error_message(), Some("Ping failed"));
    }

    #[test]
    fn missing_program_is_a_fault() {
        let executor = ProbeExecutor::new(Platform::Unix).with_program("/nonexistent/pingbox-ping");
        let result = executor.icmp(&config(1));
        assert!(!result.success());
        assert_eq!(result.failure(), Some(FailureKind::Fault));
        assert!(
            result
                .error_message()
                .is_some_and(|m| m.starts_with("Ping error: "))
        );
        assert_eq!(result.packet_loss_percent(), Some(100.0));
    }

    #[test]
    fn hung_process_is_killed_by_watchdog() {
        let started = Instant::now();
        let result = fake_ping("exec sleep 30").icmp(&config(1));
        let elapsed = started.elapsed();

        assert_eq!(result.error_message(), Some(PING_TIMEOUT_MESSAGE));
        assert_eq!(result.failure(), Some(FailureKind::Timeout));
        assert_eq!(result.packet_loss_percent(), Some(100.0));
        assert!(elapsed >= Duration::from_secs(6), "{elapsed:?}");
        assert!(elapsed < Duration::from_secs(20), "{elapsed:?}");
    }

    #[test]
    fn lingering_child_holding_output_hits_watchdog() {
        let started = Instant::now();
        let result = fake_ping(
            "sleep 20 & echo '1 packets transmitted, 1 received, 0% packet loss'; exit 0",
        )
        .icmp(&config(1));
        let elapsed = started.elapsed();

        assert!(!result.success());
        assert_eq!(result.error_message(), Some(PING_TIMEOUT_MESSAGE));
        assert_eq!(result.failure(), Some(FailureKind::Timeout));
        assert!(elapsed < Duration::from_secs(15), "{elapsed:?}");
    }

    #[test]
    fn output_after_exit_is_collected() {
        let result = fake_ping(
            "echo 'ping: unknown host' >&2; \
             echo '2 packets transmitted, 1 received, 50% packet loss'; exit 0",
        )
        .icmp(&config(1));
        assert!(result.success());
        assert_eq!(result.packets_received(), 1);
        assert_eq!(result.packet_loss_percent(), Some(50.0));
    }
}

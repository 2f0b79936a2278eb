//! Host reachability probing.
//!
//! A target is checked either with the system `ping` tool, whose output is
//! parsed into packet statistics, or with a TCP handshake against one port.
//! Both paths always yield a [`probe::result::ProbeResult`]; a host that is
//! down is a normal outcome, not an error. Only invalid configuration is
//! reported as an error.

use std::fmt::Write;

pub mod config;
pub mod probe;

/// Formats an error together with its chain of sources.
pub fn report(mut err: &(dyn std::error::Error + 'static)) -> String {
    let mut s = format!("{}", err);
    while let Some(src) = err.source() {
        let _ = write!(s, "\n\nCaused by: {}", src);
        err = src;
    }
    s
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::probe::target::ProbeConfig;

    #[test]
    fn report_includes_sources() {
        let source = ProbeConfig::new("").unwrap_err();
        let err = config::app_config::ConfigError::Target {
            index: 0,
            host: String::new(),
            source,
        };
        assert_eq!(
            report(&err),
            "target #0 (\"\") is invalid\n\nCaused by: invalid probe configuration: host cannot be empty"
        );
    }
}

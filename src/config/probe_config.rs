use std::str::FromStr;

use serde::Deserialize;

use crate::probe::executor::ProbeMethod;
use crate::probe::target::{
    DEFAULT_PACKET_COUNT, DEFAULT_TIMEOUT_SECONDS, ProbeConfig, ValidationError,
};

/// Contents of the configuration file.
#[derive(Debug, Clone, Deserialize)]
pub struct FileConfig {
    /// Maximum number of probes running at once.
    /// Defaults to the available parallelism.
    pub workers: Option<usize>,

    /// Command used in place of `ping`, e.g. `[sudo, ping]`.
    pub ping_command: Option<Vec<String>>,

    /// How results are printed.
    #[serde(default)]
    pub output: OutputFormat,

    /// The targets to probe.
    pub targets: Vec<TargetConfig>,
}

/// A single probe target as written in the configuration file.
/// Validated into a [`ProbeConfig`] before use.
#[derive(Debug, Clone, Deserialize)]
pub struct TargetConfig {
    /// Host name or IP address.
    pub host: String,

    /// Port for TCP probes.
    pub port: Option<u32>,

    /// Probe with a TCP handshake instead of ICMP echo.
    #[serde(default)]
    pub tcp: bool,

    #[serde(default = "default_timeout_seconds")]
    pub timeout_seconds: u32,

    #[serde(default = "default_packet_count")]
    pub packet_count: u32,
}

fn default_timeout_seconds() -> u32 {
    DEFAULT_TIMEOUT_SECONDS
}

fn default_packet_count() -> u32 {
    DEFAULT_PACKET_COUNT
}

impl TargetConfig {
    pub fn to_probe_config(&self) -> Result<ProbeConfig, ValidationError> {
        let mut builder = ProbeConfig::builder(self.host.as_str())
            .timeout_seconds(self.timeout_seconds)
            .packet_count(self.packet_count);
        if let Some(port) = self.port {
            builder = builder.port(port);
        }
        builder.build()
    }

    pub fn method(&self) -> ProbeMethod {
        if self.tcp {
            ProbeMethod::tcp()
        } else {
            ProbeMethod::Icmp
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}

impl FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "text" => Ok(OutputFormat::Text),
            "json" => Ok(OutputFormat::Json),
            other => Err(format!("unknown output format {other:?}")),
        }
    }
}

#[cfg(test)]
pub mod test {
    use super::*;
    use crate::probe::target::FieldViolation;

    #[test]
    fn test_target_defaults() {
        assert_eq!(default_timeout_seconds(), 5);
        assert_eq!(default_packet_count(), 4);
    }

    #[test]
    fn test_file_config_deserialization() {
        let yaml = r#"
                    workers: 3
                    ping_command: [sudo, ping]
                    output: json
                    targets:
                        - host: gateway.local
                        - host: example.com
                          port: 443
                          tcp: true
                          timeout_seconds: 2
                        - host: 10.0.0.1
                          packet_count: 10
                    "#;

        let config: FileConfig = serde_yaml::from_str(yaml).expect("Invalid YAML");
        assert_eq!(config.workers, Some(3));
        assert_eq!(
            config.ping_command,
            Some(vec!["sudo".to_string(), "ping".to_string()])
        );
        assert_eq!(config.output, OutputFormat::Json);
        assert_eq!(config.targets.len(), 3);

        let gateway = &config.targets[0];
        assert_eq!(gateway.host, "gateway.local");
        assert_eq!(gateway.port, None);
        assert!(!gateway.tcp);
        assert_eq!(gateway.timeout_seconds, 5);
        assert_eq!(gateway.packet_count, 4);
        assert_eq!(gateway.method(), ProbeMethod::Icmp);

        let web = &config.targets[1];
        assert_eq!(web.port, Some(443));
        assert_eq!(web.method(), ProbeMethod::Tcp { port: None });
        let probe = web.to_probe_config().expect("valid target");
        assert_eq!(probe.port(), Some(443));
        assert_eq!(probe.timeout_seconds(), 2);

        assert_eq!(config.targets[2].packet_count, 10);
    }

    #[test]
    fn test_output_defaults_to_text() {
        let config: FileConfig =
            serde_yaml::from_str("targets: []").expect("Invalid YAML");
        assert_eq!(config.output, OutputFormat::Text);
        assert_eq!(config.workers, None);
        assert!(config.targets.is_empty());
    }

    #[test]
    fn test_invalid_target_is_rejected() {
        let target: TargetConfig =
            serde_yaml::from_str("{host: ' ', port: 0, packet_count: 500}").expect("Invalid YAML");
        let err = target.to_probe_config().unwrap_err();
        assert_eq!(
            err.violations,
            vec![
                FieldViolation::EmptyHost,
                FieldViolation::Port(0),
                FieldViolation::PacketCount(500)
            ]
        );
    }

    #[test]
    fn test_output_format_from_str() {
        assert_eq!("JSON".parse::<OutputFormat>(), Ok(OutputFormat::Json));
        assert_eq!(" text ".parse::<OutputFormat>(), Ok(OutputFormat::Text));
        assert!("xml".parse::<OutputFormat>().is_err());
    }
}

use std::{env, fs, io};

use thiserror::Error;

use super::probe_config::{FileConfig, OutputFormat};
use crate::probe::executor::{DEFAULT_PING_PROGRAM, ProbeExecutor, ProbeMethod};
use crate::probe::platform::Platform;
use crate::probe::pool::WorkerPool;
use crate::probe::target::{ProbeConfig, ValidationError};

const DEFAULT_CONFIG_FILE: &str = "config.yml";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {path}")]
    Read {
        path: String,
        #[source]
        source: io::Error,
    },
    #[error("invalid YAML in {path}")]
    Parse {
        path: String,
        #[source]
        source: serde_yaml::Error,
    },
    #[error("target #{index} ({host:?}) is invalid")]
    Target {
        index: usize,
        host: String,
        #[source]
        source: ValidationError,
    },
    #[error("invalid value {value:?} for {key}")]
    Env { key: &'static str, value: String },
}

/// A validated target together with the way it is probed.
#[derive(Debug, Clone)]
pub struct Target {
    pub config: ProbeConfig,
    pub method: ProbeMethod,
}

#[derive(Debug)]
pub struct AppConfig {
    pub targets: Vec<Target>,
    pub workers: Option<usize>,
    pub ping_command: Vec<String>,
    pub output: OutputFormat,
    pub max_host_width: usize,
}

/// Load the application configuration from a YAML file and environment variables.
/// A `.env` file is honoured first. The file named by `CONFIG_FILE` (default
/// `config.yml`) is parsed, then `PROBE_WORKERS`, `PING_COMMAND` and
/// `OUTPUT_FORMAT` override what it says.
pub fn load_config() -> Result<AppConfig, ConfigError> {
    dotenvy::dotenv().ok();

    let path = env::var("CONFIG_FILE").unwrap_or_else(|_| DEFAULT_CONFIG_FILE.to_string());
    let content = fs::read_to_string(&path).map_err(|source| ConfigError::Read {
        path: path.clone(),
        source,
    })?;
    let file: FileConfig =
        serde_yaml::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.clone(),
            source,
        })?;

    log::info!("Loaded {} targets from {}", file.targets.len(), path);
    AppConfig::from_file(file, |key| env::var(key).ok())
}

impl AppConfig {
    /// Validates every target of `file` and applies overrides looked up
    /// through `env`.
    pub fn from_file(
        file: FileConfig,
        env: impl Fn(&str) -> Option<String>,
    ) -> Result<Self, ConfigError> {
        let targets = file
            .targets
            .iter()
            .enumerate()
            .map(|(index, target)| {
                let config = target
                    .to_probe_config()
                    .map_err(|source| ConfigError::Target {
                        index,
                        host: target.host.clone(),
                        source,
                    })?;
                Ok(Target {
                    config,
                    method: target.method(),
                })
            })
            .collect::<Result<Vec<_>, ConfigError>>()?;

        let workers = match env("PROBE_WORKERS") {
            Some(value) => Some(value.trim().parse().map_err(|_| ConfigError::Env {
                key: "PROBE_WORKERS",
                value,
            })?),
            None => file.workers,
        };

        let ping_command = env("PING_COMMAND")
            .map(|value| value.split_whitespace().map(str::to_string).collect())
            .or(file.ping_command)
            .filter(|command: &Vec<String>| !command.is_empty())
            .unwrap_or_else(|| vec![DEFAULT_PING_PROGRAM.to_string()]);

        let output = match env("OUTPUT_FORMAT") {
            Some(value) => value.parse().map_err(|_| ConfigError::Env {
                key: "OUTPUT_FORMAT",
                value,
            })?,
            None => file.output,
        };

        let max_host_width = targets
            .iter()
            .map(|t| t.config.host().len() + t.config.port().map_or(0, |_| 6))
            .max()
            .unwrap_or(10);

        Ok(Self {
            targets,
            workers,
            ping_command,
            output,
            max_host_width,
        })
    }

    pub fn executor(&self) -> ProbeExecutor {
        ProbeExecutor::new(Platform::current()).with_command(&self.ping_command)
    }

    pub fn pool(&self) -> WorkerPool {
        match self.workers {
            Some(size) => WorkerPool::new(size),
            None => WorkerPool::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn file(yaml: &str) -> FileConfig {
        serde_yaml::from_str(yaml).expect("Invalid YAML")
    }

    fn no_env(_: &str) -> Option<String> {
        None
    }

    #[test]
    fn builds_targets_in_order() {
        let config = AppConfig::from_file(
            file("targets: [{host: a.example}, {host: b.example, port: 22, tcp: true}]"),
            no_env,
        )
        .expect("valid config");

        assert_eq!(config.targets.len(), 2);
        assert_eq!(config.targets[0].config.host(), "a.example");
        assert_eq!(config.targets[0].method, ProbeMethod::Icmp);
        assert_eq!(config.targets[1].config.port(), Some(22));
        assert_eq!(config.targets[1].method, ProbeMethod::tcp());
        assert_eq!(config.ping_command, vec!["ping".to_string()]);
        assert_eq!(config.output, OutputFormat::Text);
        assert_eq!(config.max_host_width, "b.example".len() + 6);
    }

    #[test]
    fn reports_first_invalid_target() {
        let err = AppConfig::from_file(
            file("targets: [{host: ok.example}, {host: '', timeout_seconds: 0}]"),
            no_env,
        )
        .err()
        .expect("invalid target");

        match err {
            ConfigError::Target { index, source, .. } => {
                assert_eq!(index, 1);
                assert_eq!(source.violations.len(), 2);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn environment_overrides_file() {
        let env: HashMap<&str, &str> = HashMap::from([
            ("PROBE_WORKERS", "7"),
            ("PING_COMMAND", "ip netns exec blue ping"),
            ("OUTPUT_FORMAT", "json"),
        ]);
        let config = AppConfig::from_file(
            file("{workers: 2, ping_command: [ping6], targets: []}"),
            |key| env.get(key).map(|v| v.to_string()),
        )
        .expect("valid config");

        assert_eq!(config.workers, Some(7));
        assert_eq!(config.pool().size(), 7);
        assert_eq!(config.ping_command, ["ip", "netns", "exec", "blue", "ping"]);
        assert_eq!(config.output, OutputFormat::Json);
    }

    #[test]
    fn rejects_bad_environment_values() {
        let err = AppConfig::from_file(file("targets: []"), |key| {
            (key == "PROBE_WORKERS").then(|| "many".to_string())
        })
        .err()
        .expect("invalid workers");
        assert!(matches!(err, ConfigError::Env { key: "PROBE_WORKERS", .. }));
    }

    #[test]
    fn empty_ping_command_falls_back_to_ping() {
        let config = AppConfig::from_file(file("{ping_command: [], targets: []}"), no_env)
            .expect("valid config");
        assert_eq!(config.ping_command, ["ping"]);
        assert_eq!(config.max_host_width, 10);
    }
}

/*!
 * Configuration types for the Charon gateway
 */

use crate::error::{GatewayError, Result};
use charon_api::TargetDescriptor;
use charon_connect::{AuthConfig, InvokerSettings};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

/// Top-level gateway configuration, usually loaded from TOML
///
/// ```toml
/// [log]
/// level = "info"
///
/// [timeouts]
/// connect_secs = 10
/// handshake_secs = 30
/// rpc_secs = 60
///
/// [dispatch]
/// max_parallel = 8
///
/// [[targets]]
/// id = "500"
/// host = "vista-500.example.org"
/// port = 18500
/// division = "605"
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GatewayConfig {
    #[serde(default)]
    pub log: LogConfig,

    #[serde(default)]
    pub timeouts: TimeoutConfig,

    #[serde(default)]
    pub dispatch: DispatchConfig,

    /// Sites requests may be routed to
    #[serde(default)]
    pub targets: Vec<TargetConfig>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LogConfig {
    #[serde(default)]
    pub level: LogLevel,

    /// Write JSON logs to this file instead of stderr
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file: Option<PathBuf>,

    /// Use JSON instead of the compact format on stderr
    #[serde(default)]
    pub json: bool,
}

/// Log level for diagnostic output
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Error,
    Warn,
    #[default]
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    /// Convert to tracing::Level
    pub fn to_tracing_level(&self) -> tracing::Level {
        match self {
            LogLevel::Error => tracing::Level::ERROR,
            LogLevel::Warn => tracing::Level::WARN,
            LogLevel::Info => tracing::Level::INFO,
            LogLevel::Debug => tracing::Level::DEBUG,
            LogLevel::Trace => tracing::Level::TRACE,
        }
    }
}

/// Bounds on the blocking network steps, in seconds
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeoutConfig {
    #[serde(default = "default_connect_secs")]
    pub connect_secs: u64,

    #[serde(default = "default_handshake_secs")]
    pub handshake_secs: u64,

    #[serde(default = "default_rpc_secs")]
    pub rpc_secs: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            connect_secs: default_connect_secs(),
            handshake_secs: default_handshake_secs(),
            rpc_secs: default_rpc_secs(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DispatchConfig {
    /// Cap on targets contacted at once (unset = one rayon worker per CPU)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_parallel: Option<usize>,
}

/// One configured site
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TargetConfig {
    pub id: String,
    pub host: String,
    pub port: u16,

    /// Division (institution) the login is made under
    #[serde(default)]
    pub division: String,
}

impl TargetConfig {
    pub fn to_descriptor(&self) -> TargetDescriptor {
        TargetDescriptor::new(&self.id, &self.host, self.port, &self.division)
    }
}

// Default value functions for serde
fn default_connect_secs() -> u64 {
    10
}

fn default_handshake_secs() -> u64 {
    30
}

fn default_rpc_secs() -> u64 {
    60
}

impl GatewayConfig {
    /// Load and validate a configuration from a TOML file
    pub fn from_file(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path).map_err(|e| {
            GatewayError::Config(format!("Failed to read {}: {}", path.display(), e))
        })?;
        contents.parse()
    }

    /// Save configuration to a TOML file
    pub fn to_file(&self, path: &Path) -> Result<()> {
        let contents = toml::to_string_pretty(self)?;
        std::fs::write(path, contents)?;
        Ok(())
    }

    /// Reject configurations that cannot route a request
    pub fn validate(&self) -> Result<()> {
        if self.timeouts.connect_secs == 0
            || self.timeouts.handshake_secs == 0
            || self.timeouts.rpc_secs == 0
        {
            return Err(GatewayError::Config(
                "timeouts must be at least one second".to_string(),
            ));
        }

        if self.dispatch.max_parallel == Some(0) {
            return Err(GatewayError::Config(
                "dispatch.max_parallel must be at least 1".to_string(),
            ));
        }

        let mut seen = HashSet::new();
        for target in &self.targets {
            if target.id.trim().is_empty() {
                return Err(GatewayError::Config("target id must not be empty".to_string()));
            }
            if !seen.insert(target.id.as_str()) {
                return Err(GatewayError::Config(format!(
                    "target {} is configured more than once",
                    target.id
                )));
            }
            if target.host.trim().is_empty() {
                return Err(GatewayError::Config(format!(
                    "target {} has no host",
                    target.id
                )));
            }
            if target.port == 0 {
                return Err(GatewayError::Config(format!(
                    "target {} has port 0",
                    target.id
                )));
            }
        }

        Ok(())
    }

    /// Invoker bounds derived from `[timeouts]`
    pub fn invoker_settings(&self) -> InvokerSettings {
        let auth = AuthConfig::default()
            .with_connect_timeout(Duration::from_secs(self.timeouts.connect_secs))
            .with_handshake_timeout(Duration::from_secs(self.timeouts.handshake_secs));
        InvokerSettings::default()
            .with_auth(auth)
            .with_rpc_timeout(Duration::from_secs(self.timeouts.rpc_secs))
    }

    pub fn descriptors(&self) -> Vec<TargetDescriptor> {
        self.targets.iter().map(TargetConfig::to_descriptor).collect()
    }
}

impl FromStr for GatewayConfig {
    type Err = GatewayError;

    /// Parse and validate TOML text
    fn from_str(s: &str) -> Result<Self> {
        let config: GatewayConfig = toml::from_str(s)?;
        config.validate()?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::NamedTempFile;

    const SAMPLE: &str = r#"
[log]
level = "debug"

[timeouts]
rpc_secs = 15

[dispatch]
max_parallel = 4

[[targets]]
id = "500"
host = "vista-500.example.org"
port = 18500
division = "605"

[[targets]]
id = "600"
host = "vista-600.example.org"
port = 18600
"#;

    #[test]
    fn test_default_config() {
        let config = GatewayConfig::default();
        assert_eq!(config.log.level, LogLevel::Info);
        assert_eq!(config.timeouts.handshake_secs, 30);
        assert!(config.dispatch.max_parallel.is_none());
        assert!(config.targets.is_empty());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_parse_sample() {
        let config: GatewayConfig = SAMPLE.parse().unwrap();

        assert_eq!(config.log.level, LogLevel::Debug);
        assert_eq!(config.timeouts.connect_secs, 10);
        assert_eq!(config.timeouts.rpc_secs, 15);
        assert_eq!(config.dispatch.max_parallel, Some(4));
        assert_eq!(config.targets.len(), 2);
        assert_eq!(config.targets[1].division, "");

        let descriptor = config.targets[0].to_descriptor();
        assert_eq!(descriptor.target_id, "500");
        assert_eq!(descriptor.address(), "vista-500.example.org:18500");
        assert_eq!(descriptor.division_id, "605");
    }

    #[test]
    fn test_invoker_settings_follow_timeouts() {
        let config: GatewayConfig = SAMPLE.parse().unwrap();
        let settings = config.invoker_settings();
        assert_eq!(settings.rpc_timeout, Duration::from_secs(15));
        assert_eq!(settings.auth.connect_timeout, Duration::from_secs(10));
        assert_eq!(settings.auth.handshake_timeout, Duration::from_secs(30));
    }

    #[test]
    fn test_validation_failures() {
        let duplicate = r#"
[[targets]]
id = "500"
host = "a"
port = 1

[[targets]]
id = "500"
host = "b"
port = 2
"#;
        assert!(matches!(
            duplicate.parse::<GatewayConfig>(),
            Err(GatewayError::Config(msg)) if msg.contains("more than once")
        ));

        let no_host = "[[targets]]\nid = \"500\"\nhost = \"\"\nport = 1\n";
        assert!(no_host.parse::<GatewayConfig>().is_err());

        let zero_timeout = "[timeouts]\nrpc_secs = 0\n";
        assert!(zero_timeout.parse::<GatewayConfig>().is_err());

        let zero_parallel = "[dispatch]\nmax_parallel = 0\n";
        assert!(zero_parallel.parse::<GatewayConfig>().is_err());
    }

    #[test]
    fn test_malformed_toml_is_config_error() {
        let err = "[[targets]\nid =".parse::<GatewayConfig>().unwrap_err();
        assert!(matches!(err, GatewayError::Config(_)));
        assert_eq!(err.status_code(), 500);
    }

    #[test]
    fn test_file_round_trip() {
        let config: GatewayConfig = SAMPLE.parse().unwrap();
        let file = NamedTempFile::new().unwrap();

        config.to_file(file.path()).unwrap();
        let loaded = GatewayConfig::from_file(file.path()).unwrap();

        assert_eq!(loaded, config);
    }

    #[test]
    fn test_missing_file() {
        let err = GatewayConfig::from_file(Path::new("/nonexistent/charon.toml")).unwrap_err();
        assert!(matches!(err, GatewayError::Config(msg) if msg.contains("charon.toml")));
    }
}

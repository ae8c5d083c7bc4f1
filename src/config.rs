//! Relay configuration — deserialization and validation.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

use crate::error::RelayError;
use crate::server::ConnectionLimits;
use crate::store::{HeaderFormat, DEFAULT_MARKER};

/// Default TCP port for both server and client.
pub const DEFAULT_PORT: u16 = 5050;

/// Top-level relay configuration, parsed from TOML. Every field has a default.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct RelayConfig {
    pub server: ServerConfig,
    pub templates: TemplatesConfig,
    pub web: WebConfig,
}

/// Listener settings for the template server.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Deadline for a client to deliver its request line.
    pub read_timeout_secs: u64,
    /// Upper bound on connections being served at once.
    pub max_connections: usize,
    /// Request lines longer than this are rejected with an error reply.
    pub max_line_bytes: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: DEFAULT_PORT,
            read_timeout_secs: 10,
            max_connections: 64,
            max_line_bytes: 64 * 1024,
        }
    }
}

impl ServerConfig {
    pub fn limits(&self) -> ConnectionLimits {
        ConnectionLimits {
            read_timeout: Duration::from_secs(self.read_timeout_secs),
            max_connections: self.max_connections,
            max_line_bytes: self.max_line_bytes,
        }
    }
}

/// Which header rule the template source uses.
#[derive(Debug, Clone, Copy, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum TemplateFormat {
    #[default]
    Plain,
    Marker,
}

/// Where templates come from and how they are parsed.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct TemplatesConfig {
    pub path: PathBuf,
    pub format: TemplateFormat,
    pub marker: String,
}

impl Default for TemplatesConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("templates.txt"),
            format: TemplateFormat::Plain,
            marker: DEFAULT_MARKER.to_string(),
        }
    }
}

impl TemplatesConfig {
    /// Header rule for the configured format. Fails on an unusable marker.
    pub fn header_format(&self) -> crate::Result<HeaderFormat> {
        match self.format {
            TemplateFormat::Plain => Ok(HeaderFormat::Plain),
            TemplateFormat::Marker => HeaderFormat::marker(&self.marker),
        }
    }
}

/// Settings for the HTML button page.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct WebConfig {
    pub host: String,
    pub port: u16,
    /// Labels shown when the template source yields nothing.
    pub fallback_buttons: Vec<String>,
}

impl Default for WebConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8000,
            fallback_buttons: [
                "New Patient",
                "Follow-Up Visit",
                "Eval Scheduled",
                "Checking In (Non-Active Patients)",
                "Accidental Lake Forest Phone Call",
            ]
            .into_iter()
            .map(String::from)
            .collect(),
        }
    }
}

impl RelayConfig {
    /// Read and parse a relay.toml file.
    pub fn from_path(path: &Path) -> crate::Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            RelayError::InvalidConfig(path.display().to_string(), e.to_string())
        })?;
        toml::from_str(&content)
            .map_err(|e| RelayError::InvalidConfig(path.display().to_string(), e.to_string()))
    }

    /// Validate the config, failing fast before anything is bound.
    pub fn validate(&self) -> crate::Result<()> {
        if self.server.port == 0 {
            return Err(invalid("server.port", "port must be non-zero"));
        }
        if self.server.read_timeout_secs == 0 {
            return Err(invalid("server.read_timeout_secs", "must be at least 1"));
        }
        if self.server.max_connections == 0 {
            return Err(invalid("server.max_connections", "must be at least 1"));
        }
        if self.server.max_line_bytes == 0 {
            return Err(invalid("server.max_line_bytes", "must be at least 1"));
        }
        if self.templates.path.as_os_str().is_empty() {
            return Err(invalid("templates.path", "path must not be empty"));
        }
        self.templates.header_format()?;
        if self.web.port == 0 {
            return Err(invalid("web.port", "port must be non-zero"));
        }
        Ok(())
    }
}

fn invalid(field: &str, message: &str) -> RelayError {
    RelayError::InvalidConfig(field.to_string(), message.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn parse_toml(toml_str: &str) -> RelayConfig {
        toml::from_str(toml_str).expect("valid TOML")
    }

    #[test]
    fn test_empty_config_uses_defaults() {
        let config = parse_toml("");
        assert_eq!(config.server.host, "0.0.0.0");
        assert_eq!(config.server.port, 5050);
        assert_eq!(config.server.read_timeout_secs, 10);
        assert_eq!(config.templates.path, PathBuf::from("templates.txt"));
        assert_eq!(config.templates.header_format().unwrap(), HeaderFormat::Plain);
        assert_eq!(config.web.fallback_buttons.len(), 5);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_sections() {
        let config = parse_toml(
            r#"
            [server]
            port = 6060

            [templates]
            format = "marker"
            "#,
        );
        assert_eq!(config.server.port, 6060);
        assert_eq!(config.server.host, "0.0.0.0");
        assert_eq!(
            config.templates.header_format().unwrap(),
            HeaderFormat::marker("{Button}").unwrap()
        );
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_limits_from_server_config() {
        let config = parse_toml(
            r#"
            [server]
            read_timeout_secs = 3
            max_connections = 2
            max_line_bytes = 128
            "#,
        );
        let limits = config.server.limits();
        assert_eq!(limits.read_timeout, Duration::from_secs(3));
        assert_eq!(limits.max_connections, 2);
        assert_eq!(limits.max_line_bytes, 128);
    }

    #[test]
    fn test_unknown_format_rejected() {
        let result: Result<RelayConfig, _> = toml::from_str(
            r#"
            [templates]
            format = "yaml"
            "#,
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_zero_port_invalid() {
        let config = parse_toml("[server]\nport = 0\n");
        let result = config.validate();
        assert!(
            matches!(result, Err(RelayError::InvalidConfig(field, _)) if field == "server.port")
        );
    }

    #[test]
    fn test_zero_max_connections_invalid() {
        let config = parse_toml("[server]\nmax_connections = 0\n");
        let result = config.validate();
        assert!(
            matches!(result, Err(RelayError::InvalidConfig(field, _)) if field == "server.max_connections")
        );
    }

    #[test]
    fn test_zero_read_timeout_invalid() {
        let config = parse_toml("[server]\nread_timeout_secs = 0\n");
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_empty_marker_invalid() {
        let config = parse_toml(
            r#"
            [templates]
            format = "marker"
            marker = "  "
            "#,
        );
        let result = config.validate();
        assert!(
            matches!(result, Err(RelayError::InvalidConfig(field, msg)) if field == "templates.marker" && msg.contains("marker"))
        );
    }

    #[test]
    fn test_uncompilable_marker_invalid() {
        let config = RelayConfig {
            templates: TemplatesConfig {
                format: TemplateFormat::Marker,
                marker: "x".repeat(2_000_000),
                ..TemplatesConfig::default()
            },
            ..RelayConfig::default()
        };
        let result = config.validate();
        assert!(
            matches!(result, Err(RelayError::InvalidConfig(field, _)) if field == "templates.marker")
        );
    }

    #[test]
    fn test_empty_marker_ignored_for_plain() {
        let config = parse_toml("[templates]\nmarker = \"\"\n");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_from_path() {
        let mut temp = NamedTempFile::new().expect("create temp file");
        writeln!(temp, "[web]\nport = 9000\nfallback_buttons = [\"Only\"]").expect("write");
        let config = RelayConfig::from_path(temp.path()).unwrap();
        assert_eq!(config.web.port, 9000);
        assert_eq!(config.web.fallback_buttons, vec!["Only"]);
    }

    #[test]
    fn test_from_path_invalid_toml() {
        let mut temp = NamedTempFile::new().expect("create temp file");
        writeln!(temp, "this is not valid toml {{{{").expect("write");
        assert!(RelayConfig::from_path(temp.path()).is_err());
    }

    #[test]
    fn test_from_path_missing_file() {
        let result = RelayConfig::from_path(Path::new("/nonexistent/relay.toml"));
        assert!(matches!(result, Err(RelayError::InvalidConfig(_, _))));
    }
}

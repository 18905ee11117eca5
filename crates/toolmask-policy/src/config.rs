//! Proxy configuration types and parsing

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

use crate::ConfigError;

/// Identity announced when toolmask talks to the server on its own
pub const DEFAULT_SERVER_NAME: &str = "toolmask";
pub const DEFAULT_SERVER_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Which tools of a `tools/list` response survive
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterMode<'a> {
    /// No filter configured, tool lists are forwarded as-is
    PassThrough,
    /// Keep only tools matching at least one pattern
    Include(&'a [String]),
    /// Keep only tools matching none of the patterns
    Exclude(&'a [String]),
}

/// Complete proxy configuration.
///
/// Built once per run and shared read-only by every component. Call
/// [`ProxyConfig::validate`] before spawning anything; [`ProxyConfig::from_yaml`]
/// and [`ProxyConfig::from_file`] do it for you.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProxyConfig {
    /// Executable followed by its arguments
    #[serde(default)]
    pub target_command: Vec<String>,
    /// Whitelist of tool name patterns
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub include_patterns: Option<Vec<String>>,
    /// Blacklist of tool name patterns
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exclude_patterns: Option<Vec<String>>,
    /// Client name sent in the lister's `initialize` request
    #[serde(default = "default_server_name")]
    pub server_name: String,
    /// Client version sent in the lister's `initialize` request
    #[serde(default = "default_server_version")]
    pub server_version: String,
    /// Upper bound for the whole `list` exchange, unbounded when absent
    #[serde(default, with = "seconds", skip_serializing_if = "Option::is_none")]
    pub list_timeout: Option<Duration>,
}

fn default_server_name() -> String {
    DEFAULT_SERVER_NAME.to_string()
}

fn default_server_version() -> String {
    DEFAULT_SERVER_VERSION.to_string()
}

impl Default for ProxyConfig {
    fn default() -> Self {
        Self {
            target_command: Vec::new(),
            include_patterns: None,
            exclude_patterns: None,
            server_name: default_server_name(),
            server_version: default_server_version(),
            list_timeout: None,
        }
    }
}

impl ProxyConfig {
    /// Create a config that wraps `target_command` without filtering anything
    pub fn new<I, S>(target_command: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            target_command: target_command.into_iter().map(Into::into).collect(),
            ..Self::default()
        }
    }

    pub fn with_include<I, S>(mut self, patterns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.include_patterns = Some(patterns.into_iter().map(Into::into).collect());
        self
    }

    pub fn with_exclude<I, S>(mut self, patterns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.exclude_patterns = Some(patterns.into_iter().map(Into::into).collect());
        self
    }

    pub fn with_server_identity(
        mut self,
        name: impl Into<String>,
        version: impl Into<String>,
    ) -> Self {
        self.server_name = name.into();
        self.server_version = version.into();
        self
    }

    pub fn with_list_timeout(mut self, timeout: Duration) -> Self {
        self.list_timeout = Some(timeout);
        self
    }

    /// Load config from a YAML file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::NotFound(format!("{}: {}", path.display(), e)))?;
        Self::from_yaml(&content)
    }

    /// Parse and validate config from a YAML string
    pub fn from_yaml(yaml: &str) -> Result<Self, ConfigError> {
        let config: Self =
            serde_yaml::from_str(yaml).map_err(|e| ConfigError::ParseError(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Serialize config to YAML
    pub fn to_yaml(&self) -> Result<String, ConfigError> {
        serde_yaml::to_string(self).map_err(|e| ConfigError::ParseError(e.to_string()))
    }

    /// Check the invariants every component relies on
    pub fn validate(&self) -> Result<(), ConfigError> {
        match self.target_command.first() {
            None => {
                return Err(ConfigError::InvalidConfig(
                    "target command must not be empty".to_string(),
                ))
            }
            Some(program) if program.is_empty() => {
                return Err(ConfigError::InvalidConfig(
                    "target executable must not be empty".to_string(),
                ))
            }
            Some(_) => {}
        }

        if self.include_patterns.is_some() && self.exclude_patterns.is_some() {
            return Err(ConfigError::InvalidConfig(
                "include and exclude patterns are mutually exclusive".to_string(),
            ));
        }

        Ok(())
    }

    /// The active filter. Include wins if both are set, which `validate` rejects.
    pub fn filter_mode(&self) -> FilterMode<'_> {
        match (&self.include_patterns, &self.exclude_patterns) {
            (Some(include), _) => FilterMode::Include(include),
            (None, Some(exclude)) => FilterMode::Exclude(exclude),
            (None, None) => FilterMode::PassThrough,
        }
    }

    /// Executable name, for log lines
    pub fn program(&self) -> &str {
        self.target_command.first().map(String::as_str).unwrap_or_default()
    }
}

/// `Option<Duration>` as whole seconds
mod seconds {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(
        value: &Option<Duration>,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        match value {
            Some(duration) => serializer.serialize_some(&duration.as_secs()),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Option<Duration>, D::Error> {
        Ok(Option::<u64>::deserialize(deserializer)?.map(Duration::from_secs))
    }
}

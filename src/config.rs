//! Configuration types for the IP gate.

use crate::error::GateError;
use crate::gate::Mode;
use crate::matcher::MatcherSet;
use crate::sources::load_list;
use regex::{Captures, Regex};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::OnceLock;

/// Root configuration for the IP gate.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    /// Logging settings.
    #[serde(default)]
    pub settings: Settings,

    /// IP extraction configuration.
    #[serde(default)]
    pub ip_extraction: IpExtractionConfig,

    /// Addresses allowed through; everything else goes to the fallback.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub allowlist: Option<AddressList>,

    /// Addresses diverted to the fallback; everything else passes.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub denylist: Option<AddressList>,
}

/// Logging settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Settings {
    /// Log requests routed to the fallback handler.
    #[serde(default = "default_true")]
    pub log_denied: bool,

    /// Log requests routed to the primary handler.
    #[serde(default)]
    pub log_allowed: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            log_denied: true,
            log_allowed: false,
        }
    }
}

/// IP extraction configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct IpExtractionConfig {
    /// Consult proxy headers before the peer address.
    #[serde(default)]
    pub enabled: bool,

    /// Headers to check for client IP, in order of preference.
    #[serde(default = "default_ip_headers")]
    pub headers: Vec<String>,

    /// Use first IP from X-Forwarded-For (true) or last IP (false).
    #[serde(default = "default_true")]
    pub use_first_ip: bool,
}

impl Default for IpExtractionConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            headers: default_ip_headers(),
            use_first_ip: true,
        }
    }
}

fn default_ip_headers() -> Vec<String> {
    vec![
        "x-forwarded-for".to_string(),
        "x-real-ip".to_string(),
        "cf-connecting-ip".to_string(),
    ]
}

fn default_true() -> bool {
    true
}

/// An address list: one entry, several entries, or a file of entries.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
#[serde(untagged)]
pub enum AddressList {
    One(String),
    Many(Vec<String>),
    File(ListFile),
}

/// File-backed address list.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
pub struct ListFile {
    /// Path to the list file.
    pub path: PathBuf,

    /// File format.
    #[serde(default)]
    pub format: ListFormat,
}

/// Address list file format.
#[derive(Debug, Clone, Copy, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ListFormat {
    /// Plain text, one IP/CIDR per line.
    #[default]
    Plain,
    /// CSV with IP column.
    Csv,
    /// JSON array of IPs.
    Json,
}

impl AddressList {
    /// Entries in configured order, reading the file if there is one.
    pub fn resolve(&self) -> Result<Vec<String>, GateError> {
        match self {
            AddressList::One(entry) => Ok(vec![entry.clone()]),
            AddressList::Many(entries) => Ok(entries.clone()),
            AddressList::File(file) => load_list(&file.path, file.format),
        }
    }
}

impl From<&str> for AddressList {
    fn from(entry: &str) -> Self {
        AddressList::One(entry.to_string())
    }
}

impl From<Vec<String>> for AddressList {
    fn from(entries: Vec<String>) -> Self {
        AddressList::Many(entries)
    }
}

impl Config {
    /// Load configuration from a YAML file.
    pub fn load(path: &std::path::Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml(&content)
    }

    /// Parse configuration from YAML text, expanding `${VAR}` references.
    pub fn from_yaml(content: &str) -> anyhow::Result<Self> {
        let expanded = expand_env_vars(content);
        let config: Config = serde_yaml::from_str(&expanded)?;
        config.validate()?;
        Ok(config)
    }

    /// The mode and list this configuration selects.
    pub fn selected_list(&self) -> Result<(Mode, &AddressList), GateError> {
        match (&self.allowlist, &self.denylist) {
            (Some(list), None) => Ok((Mode::Allow, list)),
            (None, Some(list)) => Ok((Mode::Deny, list)),
            (Some(_), Some(_)) => Err(GateError::ConflictingLists),
            (None, None) => Err(GateError::MissingList),
        }
    }

    /// Validate configuration.
    ///
    /// Inline lists are parsed here. A list file is only checked for
    /// existence; its entries are read and parsed once, when the gate is
    /// built.
    pub fn validate(&self) -> anyhow::Result<()> {
        let (_, list) = self.selected_list()?;
        match list {
            AddressList::File(file) => {
                if !file.path.exists() {
                    anyhow::bail!("Address list path does not exist: {}", file.path.display());
                }
            }
            inline => {
                MatcherSet::new(inline.resolve()?)?;
            }
        }

        if self.ip_extraction.enabled && self.ip_extraction.headers.is_empty() {
            anyhow::bail!("ip_extraction is enabled but no headers are configured");
        }

        Ok(())
    }

    /// Generate example configuration YAML.
    pub fn example() -> String {
        r#"# IP Gate Configuration

settings:
  log_denied: true             # log requests sent to the fallback
  log_allowed: false           # log requests sent to the primary handler

# Client IP extraction. The peer address is always consulted; when enabled,
# the headers below are checked first (only behind a trusted proxy).
ip_extraction:
  enabled: false
  headers:
    - "x-forwarded-for"
    - "x-real-ip"
    - "cf-connecting-ip"
  use_first_ip: true           # Use first IP from X-Forwarded-For

# Exactly one of allowlist or denylist. Each takes a single entry, a list
# of entries, or a file:
#
# denylist:
#   path: "/etc/zentinel/denylist.txt"
#   format: plain              # plain, csv, or json
#
# Supports single IPs and CIDR notation, IPv4 and IPv6.
allowlist:
  - "127.0.0.1"
  - "::1"
  - "10.0.0.0/8"
  - "192.168.0.0/16"
  - "172.16.0.0/12"
"#
        .to_string()
    }
}

/// Expand environment variables in the format ${VAR_NAME}.
fn expand_env_vars(content: &str) -> String {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    let re = PATTERN.get_or_init(|| Regex::new(r"\$\{([^}]+)\}").expect("env var pattern is valid"));

    re.replace_all(content, |cap: &Captures| {
        std::env::var(&cap[1]).unwrap_or_default()
    })
    .into_owned()
}

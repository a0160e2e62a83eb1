//! Configuration for the send client.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::auth::PasswordHash;
use crate::session::SessionSnapshot;
use crate::units::UnitFormats;
use crate::workflow::StageTimeouts;

/// Send client configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SendConfig {
    #[serde(default)]
    pub node: NodeConfig,

    #[serde(default)]
    pub conversion: ConversionConfig,

    #[serde(default)]
    pub session: SessionConfig,

    #[serde(default)]
    pub timeouts: TimeoutConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeConfig {
    /// RPC endpoints to connect to (with failover support)
    #[serde(default = "default_rpc_endpoints")]
    pub rpc_endpoints: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversionConfig {
    /// Exchange rate ticker URL
    #[serde(default = "default_ticker_url")]
    pub ticker_url: String,

    /// How long fetched rates stay valid
    #[serde(default = "default_cache_ttl")]
    pub cache_ttl_secs: u64,

    /// Fiat currency behind the "other" unit
    #[serde(default = "default_fiat_unit")]
    pub fiat_unit: String,

    /// Fraction-digit rules per unit
    #[serde(default)]
    pub formats: UnitFormats,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Single sign-on: sweeps are sent without asking for the password
    #[serde(default)]
    pub sso: bool,

    /// Label of the smallest unit
    #[serde(default = "default_smaller_currency_unit")]
    pub smaller_currency_unit: String,

    /// SHA-256 hex of the login password. When set, sweeps are authorized
    /// locally instead of by the node.
    pub password_hash: Option<String>,
}

/// Stage timeouts in seconds; 0 disables the timeout
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimeoutConfig {
    #[serde(default = "default_stage_timeout")]
    pub conversion_secs: u64,

    #[serde(default = "default_stage_timeout")]
    pub authorization_secs: u64,
}

fn default_rpc_endpoints() -> Vec<String> {
    vec!["http://localhost:7101".to_string()]
}

fn default_ticker_url() -> String {
    "https://blockchain.info/ticker".to_string()
}

fn default_cache_ttl() -> u64 {
    300
}

fn default_fiat_unit() -> String {
    "USD".to_string()
}

fn default_smaller_currency_unit() -> String {
    "Sats".to_string()
}

fn default_stage_timeout() -> u64 {
    30
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            rpc_endpoints: default_rpc_endpoints(),
        }
    }
}

impl Default for ConversionConfig {
    fn default() -> Self {
        Self {
            ticker_url: default_ticker_url(),
            cache_ttl_secs: default_cache_ttl(),
            fiat_unit: default_fiat_unit(),
            formats: UnitFormats::default(),
        }
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            sso: false,
            smaller_currency_unit: default_smaller_currency_unit(),
            password_hash: None,
        }
    }
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            conversion_secs: default_stage_timeout(),
            authorization_secs: default_stage_timeout(),
        }
    }
}

impl SendConfig {
    /// Default config file location (~/.onchain-send/config.toml)
    pub fn default_path() -> Option<PathBuf> {
        dirs::home_dir().map(|home| home.join(".onchain-send").join("config.toml"))
    }

    /// Load configuration from a TOML file.
    pub fn from_file(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: SendConfig = toml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Load from `path`, or from the default location if it exists.
    /// Falls back to defaults when there is no file.
    pub fn load(path: Option<&Path>) -> anyhow::Result<Self> {
        if let Some(path) = path {
            return Self::from_file(path);
        }
        match Self::default_path() {
            Some(path) if path.exists() => Self::from_file(&path),
            _ => {
                tracing::debug!("No config file found, using defaults");
                Ok(Self::default())
            }
        }
    }

    /// Validate the configuration.
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.node.rpc_endpoints.is_empty() {
            anyhow::bail!("At least one RPC endpoint must be specified");
        }

        if self.conversion.fiat_unit.trim().is_empty() {
            anyhow::bail!("conversion.fiat_unit must not be empty");
        }

        if self.conversion.cache_ttl_secs == 0 {
            tracing::warn!("conversion.cache_ttl_secs is 0: rates will be fetched on every lookup");
        }

        self.conversion
            .formats
            .validate()
            .map_err(|e| anyhow::anyhow!("conversion.formats: {}", e))?;

        if self.password_hash()?.is_some() && self.session.sso {
            tracing::warn!("session.password_hash is ignored while sso is enabled");
        }

        Ok(())
    }

    /// The configured local password hash, if any
    pub fn password_hash(&self) -> anyhow::Result<Option<PasswordHash>> {
        self.session
            .password_hash
            .as_deref()
            .map(|hex_digest| {
                PasswordHash::from_hex(hex_digest)
                    .map_err(|e| anyhow::anyhow!("session.password_hash: {}", e))
            })
            .transpose()
    }

    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.conversion.cache_ttl_secs)
    }

    pub fn stage_timeouts(&self) -> StageTimeouts {
        StageTimeouts {
            conversion: seconds(self.timeouts.conversion_secs),
            authorization: seconds(self.timeouts.authorization_secs),
        }
    }

    /// Initial session state
    pub fn session_snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            fiat_unit: self.conversion.fiat_unit.clone(),
            sso: self.session.sso,
            smaller_currency_unit: self.session.smaller_currency_unit.clone(),
        }
    }
}

fn seconds(secs: u64) -> Option<Duration> {
    (secs > 0).then(|| Duration::from_secs(secs))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::units::{CurrencyUnit, UnitFormat};
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_default_config() {
        let config = SendConfig::default();
        assert_eq!(config.node.rpc_endpoints, vec!["http://localhost:7101"]);
        assert_eq!(config.conversion.cache_ttl_secs, 300);
        assert_eq!(config.conversion.fiat_unit, "USD");
        assert!(!config.session.sso);
        assert_eq!(config.stage_timeouts(), StageTimeouts::default());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_from_file() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"
[node]
rpc_endpoints = ["http://10.0.0.1:7101", "http://10.0.0.2:7101"]

[conversion]
fiat_unit = "EUR"

[conversion.formats]
other = {{ min_fraction = 0, max_fraction = 4 }}

[session]
sso = true

[timeouts]
authorization_secs = 0
"#
        )
        .unwrap();

        let config = SendConfig::from_file(file.path()).unwrap();
        assert_eq!(config.node.rpc_endpoints.len(), 2);
        assert_eq!(config.conversion.fiat_unit, "EUR");
        assert_eq!(config.conversion.ticker_url, "https://blockchain.info/ticker");
        assert_eq!(
            config.conversion.formats.get(CurrencyUnit::Other),
            UnitFormat::new(0, 4)
        );
        assert_eq!(
            config.conversion.formats.get(CurrencyUnit::Btc),
            UnitFormat::new(8, 8)
        );

        let timeouts = config.stage_timeouts();
        assert_eq!(timeouts.conversion, Some(Duration::from_secs(30)));
        assert_eq!(timeouts.authorization, None);

        let snapshot = config.session_snapshot();
        assert!(snapshot.sso);
        assert_eq!(snapshot.fiat_unit, "EUR");
        assert_eq!(snapshot.smaller_currency_unit, "Sats");
    }

    #[test]
    fn test_validate_empty_endpoints() {
        let mut config = SendConfig::default();
        config.node.rpc_endpoints.clear();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_password_hash() {
        let mut config = SendConfig::default();
        config.session.password_hash = Some("zz".to_string());
        assert!(config.validate().is_err());

        config.session.password_hash =
            Some("5e884898da28047151d0e56f8dc6292773603d0d6aabbdd62a11ef721d1542d8".to_string());
        assert!(config.validate().is_ok());
        assert!(config.password_hash().unwrap().is_some());
    }

    #[test]
    fn test_validate_inverted_format() {
        let mut config = SendConfig::default();
        config.conversion.formats.sats = UnitFormat::new(2, 0);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_load_explicit_missing_file_fails() {
        let dir = tempfile::tempdir().unwrap();
        assert!(SendConfig::load(Some(&dir.path().join("missing.toml"))).is_err());
    }
}

//! Configuration management
//!
//! Layers, later ones win: built-in defaults, an optional TOML file
//! (`sip-dialer.toml` in the working directory, or an explicit path), then
//! `DIALER__SECTION__KEY` environment variables.

use crate::infrastructure::media::codec::G711Type;
use serde::{Deserialize, Serialize};
use std::net::IpAddr;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

pub const DEFAULT_CONFIG_FILE: &str = "sip-dialer";
pub const ENV_PREFIX: &str = "DIALER";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to load configuration: {0}")]
    Load(#[from] ::config::ConfigError),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub sip: SipConfig,
    pub media: MediaConfig,
    pub call: CallConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SipConfig {
    /// Registrar / proxy the INVITE goes to
    pub server_host: String,
    pub server_port: u16,
    pub username: String,
    pub password: String,
    /// Host part of our From URI and of bare-number destinations;
    /// `server_host` when unset
    pub domain: Option<String>,
    /// Address put in Via/Contact/SDP; discovered when unset
    pub local_ip: Option<IpAddr>,
    /// 0 picks an ephemeral port
    pub local_port: u16,
    pub user_agent: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MediaConfig {
    /// 0 picks an ephemeral port
    pub rtp_port: u16,
    /// Listed first in the offer; the answer's order decides what is sent
    pub codec: G711Type,
    /// Pause between ACK and the first RTP packet
    pub start_delay_ms: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CallConfig {
    /// Bound on the whole INVITE transaction, challenges included
    pub setup_timeout_secs: u64,
    /// Hang up with BYE once playout is done
    pub send_bye: bool,
}

impl Default for SipConfig {
    fn default() -> Self {
        Self {
            server_host: "127.0.0.1".to_string(),
            server_port: 5060,
            username: String::new(),
            password: String::new(),
            domain: None,
            local_ip: None,
            local_port: 0,
            user_agent: format!("sip-dialer/{}", env!("CARGO_PKG_VERSION")),
        }
    }
}

impl Default for MediaConfig {
    fn default() -> Self {
        Self {
            rtp_port: 0,
            codec: G711Type::PCMU,
            start_delay_ms: 0,
        }
    }
}

impl Default for CallConfig {
    fn default() -> Self {
        Self {
            setup_timeout_secs: 30,
            send_bye: true,
        }
    }
}

impl SipConfig {
    pub fn domain(&self) -> &str {
        self.domain.as_deref().unwrap_or(&self.server_host)
    }
}

impl CallConfig {
    pub fn setup_timeout(&self) -> Duration {
        Duration::from_secs(self.setup_timeout_secs)
    }
}

impl MediaConfig {
    pub fn start_delay(&self) -> Duration {
        Duration::from_millis(self.start_delay_ms)
    }
}

impl Config {
    /// Load defaults, then `path` (required) or `sip-dialer.toml` (optional),
    /// then the environment
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let file = match path {
            Some(path) => ::config::File::from(path).required(true),
            None => ::config::File::with_name(DEFAULT_CONFIG_FILE).required(false),
        };

        let settings = ::config::Config::builder()
            .add_source(::config::Config::try_from(&Config::default())?)
            .add_source(file)
            .add_source(
                ::config::Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("__")
                    .separator("__"),
            )
            .build()?;

        let config: Config = settings.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.sip.server_host.trim().is_empty() {
            return Err(ConfigError::Invalid("sip.server_host is empty".to_string()));
        }
        if self.sip.server_port == 0 {
            return Err(ConfigError::Invalid("sip.server_port is 0".to_string()));
        }
        if self.call.setup_timeout_secs == 0 {
            return Err(ConfigError::Invalid(
                "call.setup_timeout_secs must be positive".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::sync::Mutex;

    /// Held by tests that set `DIALER__*` variables or assert values those
    /// variables would override
    static ENV_LOCK: Mutex<()> = Mutex::new(());

    fn env_lock() -> std::sync::MutexGuard<'static, ()> {
        ENV_LOCK.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn temp_file(contents: &str) -> std::path::PathBuf {
        let path = std::env::temp_dir().join(format!("sip-dialer-{}.toml", uuid::Uuid::new_v4()));
        fs::write(&path, contents).unwrap();
        path
    }

    #[test]
    fn test_defaults_are_valid() {
        let config = Config::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.sip.domain(), "127.0.0.1");
        assert_eq!(config.call.setup_timeout(), Duration::from_secs(30));
    }

    #[test]
    fn test_load_from_file_overrides_defaults() {
        let _env = env_lock();
        let path = temp_file(
            r#"
[sip]
server_host = "pbx.example.com"
username = "1001"
password = "secret"
local_ip = "192.168.1.100"

[media]
codec = "PCMA"

[call]
setup_timeout_secs = 12
"#,
        );

        let config = Config::load(Some(path.as_path())).unwrap();
        fs::remove_file(&path).ok();

        assert_eq!(config.sip.server_host, "pbx.example.com");
        assert_eq!(config.sip.server_port, 5060);
        assert_eq!(config.sip.username, "1001");
        assert_eq!(config.sip.local_ip, Some("192.168.1.100".parse().unwrap()));
        assert_eq!(config.media.codec, G711Type::PCMA);
        assert_eq!(config.call.setup_timeout_secs, 12);
        assert!(config.call.send_bye);
    }

    #[test]
    fn test_serialized_defaults_load_back() {
        let _env = env_lock();
        let path = temp_file(&toml::to_string(&Config::default()).unwrap());
        let config = Config::load(Some(path.as_path())).unwrap();
        fs::remove_file(&path).ok();
        assert_eq!(config, Config::default());
    }

    #[test]
    fn test_missing_explicit_file_is_an_error() {
        let path = std::env::temp_dir().join("sip-dialer-does-not-exist.toml");
        assert!(matches!(Config::load(Some(path.as_path())), Err(ConfigError::Load(_))));
    }

    #[test]
    fn test_invalid_values_rejected() {
        let path = temp_file("[call]\nsetup_timeout_secs = 0\n");
        let result = Config::load(Some(path.as_path()));
        fs::remove_file(&path).ok();
        assert!(matches!(result, Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_environment_keeps_numeric_looking_strings() {
        let _env = env_lock();
        let path = temp_file("[sip]\nusername = \"1001\"\n");
        std::env::set_var("DIALER__SIP__USERNAME", "0100");
        std::env::set_var("DIALER__SIP__PASSWORD", "007");
        std::env::set_var("DIALER__SIP__SERVER_PORT", "5080");

        let result = Config::load(Some(path.as_path()));

        std::env::remove_var("DIALER__SIP__USERNAME");
        std::env::remove_var("DIALER__SIP__PASSWORD");
        std::env::remove_var("DIALER__SIP__SERVER_PORT");
        fs::remove_file(&path).ok();

        let config = result.unwrap();
        assert_eq!(config.sip.username, "0100");
        assert_eq!(config.sip.password, "007");
        assert_eq!(config.sip.server_port, 5080);
    }
}

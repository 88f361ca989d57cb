//! Shared value objects

use serde::{Deserialize, Serialize};
use std::fmt;

/// SIP URI value object
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SipUri {
    user: String,
    host: String,
    port: Option<u16>,
}

impl SipUri {
    pub fn new(user: String, host: String, port: Option<u16>) -> Self {
        Self { user, host, port }
    }

    pub fn parse(uri: &str) -> Result<Self, String> {
        let uri = uri.trim().trim_start_matches('<').trim_end_matches('>');
        let rest = uri
            .strip_prefix("sip:")
            .ok_or_else(|| "URI must start with 'sip:'".to_string())?;

        // Drop URI parameters (";transport=udp" and friends)
        let rest = rest.split(';').next().unwrap_or(rest);

        let (user, host_port) = rest
            .split_once('@')
            .ok_or_else(|| "Invalid SIP URI format".to_string())?;
        if user.is_empty() {
            return Err("SIP URI has an empty user part".to_string());
        }

        let (host, port) = match host_port.split_once(':') {
            Some((host, port)) => {
                let port = port
                    .parse()
                    .map_err(|_| format!("Invalid port in SIP URI: {}", port))?;
                (host, Some(port))
            }
            None => (host_port, None),
        };
        if host.is_empty() {
            return Err("SIP URI has an empty host part".to_string());
        }

        Ok(Self {
            user: user.to_string(),
            host: host.to_string(),
            port,
        })
    }

    /// Resolve a dial string: a full `sip:` URI is taken as-is, a bare
    /// number or user name is placed on `default_host`.
    pub fn for_destination(destination: &str, default_host: &str) -> Result<Self, String> {
        let destination = destination.trim();
        if destination.starts_with("sip:") || destination.starts_with("<sip:") {
            return Self::parse(destination);
        }
        if destination.is_empty() || destination.contains('@') || destination.contains(' ') {
            return Err(format!("Invalid destination: '{}'", destination));
        }
        Ok(Self::new(
            destination.to_string(),
            default_host.to_string(),
            None,
        ))
    }

    pub fn user(&self) -> &str {
        &self.user
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn port(&self) -> Option<u16> {
        self.port
    }
}

impl fmt::Display for SipUri {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(port) = self.port {
            write!(f, "sip:{}@{}:{}", self.user, self.host, port)
        } else {
            write!(f, "sip:{}@{}", self.user, self.host)
        }
    }
}

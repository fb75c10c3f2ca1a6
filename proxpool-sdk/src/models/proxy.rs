use std::{
    fmt::{Display, Formatter},
    str::FromStr,
};

use serde::{Deserialize, Serialize};

use super::Protocols;
use crate::{Error, Result};

/// One proxy endpoint with optional credentials.
///
/// Values are immutable after construction and compare structurally. A
/// source emitting authenticated proxies should set username and password
/// together; the contract does not mechanically enforce that pairing.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, Hash)]
pub struct Proxy {
    host: String,
    port: u16,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    username: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    password: Option<String>,
    #[serde(default)]
    protocols: Protocols,
}

impl Proxy {
    /// Rejects a blank host and port 0; every other port in the TCP range
    /// is accepted as-is.
    pub fn new<T: Into<String>>(host: T, port: u16) -> Result<Self> {
        let host = host.into();
        if host.trim().is_empty() {
            return Err(Error::Validation("proxy host must not be empty".into()));
        }
        if port == 0 {
            return Err(Error::Validation("proxy port must be in 1..=65535".into()));
        }
        Ok(Self {
            host,
            port,
            username: None,
            password: None,
            protocols: Protocols::NONE,
        })
    }

    pub fn with_credentials<T: Into<String>>(mut self, username: T, password: T) -> Self {
        self.username = Some(username.into());
        self.password = Some(password.into());
        self
    }

    pub fn with_protocols(mut self, protocols: Protocols) -> Self {
        self.protocols = protocols;
        self
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn username(&self) -> Option<&str> {
        self.username.as_deref()
    }

    pub fn password(&self) -> Option<&str> {
        self.password.as_deref()
    }

    pub fn protocols(&self) -> Protocols {
        self.protocols
    }
}

impl Display for Proxy {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.host, self.port)
    }
}

impl FromStr for Proxy {
    type Err = Error;

    /// Parses a `host:port` entry. Credentials and protocols are not part
    /// of this textual form.
    fn from_str(s: &str) -> Result<Self> {
        let (host, port) = s
            .rsplit_once(':')
            .ok_or_else(|| Error::Validation(format!("invalid proxy endpoint: {}", s)))?;
        let port = port
            .trim()
            .parse::<u16>()
            .map_err(|_| Error::Validation(format!("invalid proxy port in: {}", s)))?;
        Self::new(host.trim(), port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_malformed_endpoints() {
        assert!(Proxy::new("", 8080).unwrap_err().is_validation());
        assert!(Proxy::new("   ", 8080).unwrap_err().is_validation());
        assert!(Proxy::new("1.2.3.4", 0).unwrap_err().is_validation());
    }

    #[test]
    fn equality_is_structural() {
        let a = Proxy::new("1.2.3.4", 8080)
            .unwrap()
            .with_protocols(Protocols::HTTP | Protocols::HTTPS);
        let b = Proxy::new("1.2.3.4", 8080)
            .unwrap()
            .with_protocols(Protocols::HTTP | Protocols::HTTPS);
        assert_eq!(a, b);
        assert_ne!(a, b.clone().with_credentials("user", "pass"));
    }

    #[test]
    fn parses_host_port() {
        let p = "example.org:3128".parse::<Proxy>().unwrap();
        assert_eq!(p.host(), "example.org");
        assert_eq!(p.port(), 3128);
        assert!(p.protocols().is_empty());

        assert!("example.org".parse::<Proxy>().is_err());
        assert!("example.org:0".parse::<Proxy>().is_err());
        assert!("example.org:99999".parse::<Proxy>().is_err());
    }

    #[test]
    fn display_round_trips_endpoint() {
        let p = Proxy::new("10.0.0.1", 1080).unwrap();
        assert_eq!(p.to_string().parse::<Proxy>().unwrap(), p);
    }
}

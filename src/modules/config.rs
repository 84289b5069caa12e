//! Session configuration.
//!
//! A [`SessionConfig`] names the export and how to reach it. It is fixed
//! for the lifetime of a session and can be read from JSON:
//!
//! ```json
//! { "host": "10.0.0.5", "export_path": "/export", "transport": "tcp",
//!   "uid": 0, "gid": 0, "auth": "none", "timeout": 30 }
//! ```
//!
//! Omitted fields take the defaults of [`SessionConfig::new`].

use super::constants::DEFAULT_TIMEOUT;
use super::error::Error;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

/// RPC transport protocol.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Transport {
    /// Datagram transport
    #[default]
    Udp,
    /// Stream transport
    Tcp,
}

/// How the NFS channel authenticates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AuthMethod {
    /// AUTH_NONE
    None,
    /// AUTH_SYS with the configured uid and gid
    #[default]
    Unix,
    /// Kerberos 5, authentication only
    Krb5,
    /// Kerberos 5 with integrity protection
    Krb5i,
    /// Kerberos 5 with privacy protection
    Krb5p,
}

impl FromStr for Transport {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Error> {
        match s {
            "udp" => Ok(Transport::Udp),
            "tcp" => Ok(Transport::Tcp),
            other => Err(Error::InvalidConfig(format!("invalid transport '{}'", other))),
        }
    }
}

impl FromStr for AuthMethod {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Error> {
        match s {
            "none" => Ok(AuthMethod::None),
            "unix" => Ok(AuthMethod::Unix),
            "krb5" => Ok(AuthMethod::Krb5),
            "krb5i" => Ok(AuthMethod::Krb5i),
            "krb5p" => Ok(AuthMethod::Krb5p),
            other => Err(Error::InvalidConfig(format!(
                "invalid authentication method '{}'",
                other
            ))),
        }
    }
}

impl fmt::Display for Transport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Transport::Udp => "udp",
            Transport::Tcp => "tcp",
        })
    }
}

impl fmt::Display for AuthMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            AuthMethod::None => "none",
            AuthMethod::Unix => "unix",
            AuthMethod::Krb5 => "krb5",
            AuthMethod::Krb5i => "krb5i",
            AuthMethod::Krb5p => "krb5p",
        })
    }
}

/// Immutable parameters of one session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Server host name or IP address
    pub host: String,
    /// Path of the export on the server
    pub export_path: String,
    /// RPC transport
    #[serde(default)]
    pub transport: Transport,
    /// User id sent in AUTH_SYS credentials
    #[serde(default = "effective_uid")]
    pub uid: u32,
    /// Group id sent in AUTH_SYS credentials
    #[serde(default = "effective_gid")]
    pub gid: u32,
    /// Authentication used on the NFS channel
    #[serde(default, rename = "auth")]
    pub auth_method: AuthMethod,
    /// Call timeout in seconds
    #[serde(default = "default_timeout_secs", rename = "timeout")]
    pub timeout_secs: u64,
}

fn effective_uid() -> u32 {
    nix::unistd::geteuid().as_raw()
}

fn effective_gid() -> u32 {
    nix::unistd::getegid().as_raw()
}

fn default_timeout_secs() -> u64 {
    DEFAULT_TIMEOUT.as_secs()
}

impl SessionConfig {
    /// Configuration for `host:export_path` over UDP with AUTH_SYS, the
    /// process's effective ids and a 25 second timeout.
    pub fn new(host: impl Into<String>, export_path: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            export_path: export_path.into(),
            transport: Transport::default(),
            uid: effective_uid(),
            gid: effective_gid(),
            auth_method: AuthMethod::default(),
            timeout_secs: default_timeout_secs(),
        }
    }

    /// Sets the RPC transport.
    pub fn with_transport(mut self, transport: Transport) -> Self {
        self.transport = transport;
        self
    }

    /// Sets the AUTH_SYS user and group ids.
    pub fn with_identity(mut self, uid: u32, gid: u32) -> Self {
        self.uid = uid;
        self.gid = gid;
        self
    }

    /// Sets the NFS channel authentication.
    pub fn with_auth_method(mut self, auth_method: AuthMethod) -> Self {
        self.auth_method = auth_method;
        self
    }

    /// Sets the call timeout, rounded up to whole seconds.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout_secs = timeout
            .as_secs()
            .saturating_add(u64::from(timeout.subsec_nanos() > 0));
        self
    }

    /// Call timeout.
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// Checks the fields a handshake cannot work without.
    pub fn validate(&self) -> Result<(), Error> {
        if self.host.trim().is_empty() {
            return Err(Error::InvalidConfig("host must not be empty".into()));
        }
        if !self.export_path.starts_with('/') {
            return Err(Error::InvalidConfig(format!(
                "export path '{}' is not absolute",
                self.export_path
            )));
        }
        if self.timeout_secs == 0 {
            return Err(Error::InvalidConfig("timeout must be at least one second".into()));
        }
        Ok(())
    }

    /// Parses and validates a JSON configuration.
    pub fn from_json(json: &str) -> Result<Self, Error> {
        let config: SessionConfig =
            serde_json::from_str(json).map_err(|e| Error::InvalidConfig(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Reads a JSON configuration file.
    pub fn load<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)
            .with_context(|| format!("failed to read session config {}", path.display()))?;
        let config = Self::from_json(&content)
            .with_context(|| format!("invalid session config {}", path.display()))?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_defaults() {
        let config = SessionConfig::new("nfs.example.com", "/export");

        assert_eq!(config.transport, Transport::Udp);
        assert_eq!(config.auth_method, AuthMethod::Unix);
        assert_eq!(config.timeout(), Duration::from_secs(25));
        assert_eq!(config.uid, nix::unistd::geteuid().as_raw());
        assert_eq!(config.gid, nix::unistd::getegid().as_raw());
    }

    #[test]
    fn test_parse_methods() {
        assert_eq!("tcp".parse::<Transport>(), Ok(Transport::Tcp));
        assert_eq!("krb5i".parse::<AuthMethod>(), Ok(AuthMethod::Krb5i));
        assert!(matches!(
            "krb4".parse::<AuthMethod>(),
            Err(Error::InvalidConfig(_))
        ));
        assert!(matches!(
            "sctp".parse::<Transport>(),
            Err(Error::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_from_json() -> Result<()> {
        let config = SessionConfig::from_json(
            r#"{ "host": "10.0.0.5", "export_path": "/export", "transport": "tcp",
                 "uid": 0, "gid": 0, "auth": "none", "timeout": 30 }"#,
        )?;

        assert_eq!(config.host, "10.0.0.5");
        assert_eq!(config.transport, Transport::Tcp);
        assert_eq!(config.auth_method, AuthMethod::None);
        assert_eq!(config.timeout(), Duration::from_secs(30));
        Ok(())
    }

    #[test]
    fn test_from_json_rejects_unknown_auth() {
        let err = SessionConfig::from_json(
            r#"{ "host": "h", "export_path": "/e", "auth": "kerberos" }"#,
        )
        .unwrap_err();
        assert_eq!(err.name(), "NFSC_EINVAL");
    }

    #[test]
    fn test_validate() {
        assert!(SessionConfig::new("", "/export").validate().is_err());
        assert!(SessionConfig::new("host", "export").validate().is_err());
        assert!(SessionConfig::new("host", "/export").validate().is_ok());
    }

    #[test]
    fn test_sub_second_timeout_rounds_up() {
        let config = SessionConfig::new("host", "/export").with_timeout(Duration::from_millis(500));
        assert_eq!(config.timeout(), Duration::from_secs(1));
        assert!(config.validate().is_ok());

        let config = SessionConfig::new("host", "/export").with_timeout(Duration::from_millis(2500));
        assert_eq!(config.timeout(), Duration::from_secs(3));

        let config = SessionConfig::new("host", "/export").with_timeout(Duration::from_secs(7));
        assert_eq!(config.timeout(), Duration::from_secs(7));
    }

    #[test]
    fn test_zero_timeout_is_rejected() {
        let config = SessionConfig::new("host", "/export").with_timeout(Duration::ZERO);
        assert!(matches!(config.validate(), Err(Error::InvalidConfig(_))));

        let err = SessionConfig::from_json(r#"{ "host": "h", "export_path": "/e", "timeout": 0 }"#)
            .unwrap_err();
        assert_eq!(err.name(), "NFSC_EINVAL");
    }

    #[test]
    fn test_load_file() -> Result<()> {
        let dir = tempdir()?;
        let path = dir.path().join("session.json");
        let config = SessionConfig::new("server", "/srv/nfs")
            .with_transport(Transport::Tcp)
            .with_identity(1000, 1000);
        fs::write(&path, serde_json::to_string(&config)?)?;

        assert_eq!(SessionConfig::load(&path)?, config);
        assert!(SessionConfig::load(dir.path().join("missing.json")).is_err());
        Ok(())
    }
}

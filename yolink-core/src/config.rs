//! Configuration for the YoLink agent
//!
//! The config file is JSON, matching the layout the vendor tooling
//! hands out: account keys at the top level plus a list of sensor
//! serial numbers. Unknown and missing keys are rejected at load time
//! so a typo never turns into a silent runtime surprise.

use serde::Deserialize;
use std::path::Path;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config: {0}")]
    ReadError(#[from] std::io::Error),

    #[error("Failed to parse config: {0}")]
    ParseError(#[from] serde_json::Error),
}

/// Main configuration structure
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    /// Account id issued by the vendor
    pub csid: String,

    /// Account name; the cloud broker publishes all of an account's
    /// events on the `<csname>/report` topic
    pub csname: String,

    /// Account secret, used to sign API requests
    pub cssekkey: String,

    /// Vendor API endpoint
    pub svr_url: String,

    /// Sensors to enable and label
    #[serde(default)]
    pub devices: Vec<DeviceEntry>,

    /// Optional downstream broker to republish events to
    #[serde(default)]
    pub forward: Option<ForwardConfig>,
}

/// Account keys handed to the auth client. Built once at startup;
/// the auth client owns them for the session duration.
#[derive(Debug, Clone)]
pub struct Credentials {
    pub csid: String,
    pub csname: String,
    pub secret_key: String,
    pub server_url: String,
}

/// One configured sensor
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DeviceEntry {
    /// 32-character serial token printed on the device
    pub serial: String,

    /// Friendly name for log lines
    pub name: String,
}

/// Downstream broker the agent republishes events to
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ForwardConfig {
    pub host: String,

    #[serde(default = "default_forward_port")]
    pub port: u16,

    pub user: Option<String>,
    pub password: Option<String>,

    /// Leading topic segment for republished events
    #[serde(default = "default_topic_prefix")]
    pub topic_prefix: String,
}

fn default_forward_port() -> u16 {
    crate::DEFAULT_FORWARD_PORT
}

fn default_topic_prefix() -> String {
    "yolink".to_string()
}

impl Config {
    /// Load config from a specific path
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = serde_json::from_str(&content)?;
        Ok(config)
    }

    /// Extract the account keys for the auth client
    pub fn credentials(&self) -> Credentials {
        Credentials {
            csid: self.csid.clone(),
            csname: self.csname.clone(),
            secret_key: self.cssekkey.clone(),
            server_url: self.svr_url.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> &'static str {
        r#"{
            "csid": "CSID1234",
            "csname": "home",
            "cssekkey": "sekkey",
            "svr_url": "https://api.example.com/openApi",
            "devices": [
                {"serial": "abcdefabcdefabcdefabcdefabcdefab", "name": "front door"}
            ]
        }"#
    }

    #[test]
    fn test_parse_full_config() {
        let config: Config = serde_json::from_str(sample()).unwrap();
        assert_eq!(config.csid, "CSID1234");
        assert_eq!(config.devices.len(), 1);
        assert_eq!(config.devices[0].name, "front door");
        assert!(config.forward.is_none());

        let creds = config.credentials();
        assert_eq!(creds.csname, "home");
        assert_eq!(creds.secret_key, "sekkey");
    }

    #[test]
    fn test_missing_csid_is_rejected() {
        let raw = r#"{"csname": "home", "cssekkey": "k", "svr_url": "https://x"}"#;
        let err = serde_json::from_str::<Config>(raw).unwrap_err();
        assert!(err.to_string().contains("csid"));
    }

    #[test]
    fn test_unknown_key_is_rejected() {
        let raw = r#"{
            "csid": "a", "csname": "b", "cssekkey": "c", "svr_url": "d",
            "csidd": "typo"
        }"#;
        assert!(serde_json::from_str::<Config>(raw).is_err());
    }

    #[test]
    fn test_device_list_defaults_empty() {
        let raw = r#"{"csid": "a", "csname": "b", "cssekkey": "c", "svr_url": "d"}"#;
        let config: Config = serde_json::from_str(raw).unwrap();
        assert!(config.devices.is_empty());
    }

    #[test]
    fn test_forward_defaults() {
        let raw = r#"{
            "csid": "a", "csname": "b", "cssekkey": "c", "svr_url": "d",
            "forward": {"host": "broker.lan"}
        }"#;
        let config: Config = serde_json::from_str(raw).unwrap();
        let forward = config.forward.unwrap();
        assert_eq!(forward.port, crate::DEFAULT_FORWARD_PORT);
        assert_eq!(forward.topic_prefix, "yolink");
        assert!(forward.user.is_none());
    }

    #[test]
    fn test_load_missing_file() {
        let err = Config::load(Path::new("/nonexistent/agent.json")).unwrap_err();
        assert!(matches!(err, ConfigError::ReadError(_)));
    }
}

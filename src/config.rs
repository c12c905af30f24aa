// MIT License - Copyright (c) 2026 Peter Wright
// Configuration file and daemon options

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

use crate::constants::{
    CONFIRM_TIMEOUT, DEFAULT_CAPTURE_DEVICE, DEFAULT_DATA_FILE_PATH, DEFAULT_SOCKET_PATH,
    KEYSWITCH_PULSE, REQUEST_TIMEOUT,
};
use crate::error::{AlarmError, Result};

/// Parsed TOML configuration file.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub receiver: ReceiverToml,
    /// Arm/disarm is disabled when this section is absent.
    #[serde(default)]
    pub keyswitch: Option<KeyswitchToml>,
    /// MQTT notifications are disabled when this section is absent.
    #[serde(default)]
    pub mqtt: Option<MqttToml>,
    #[serde(default, deserialize_with = "deserialize_zone_names")]
    pub zone_names: HashMap<u32, String>,
}

fn deserialize_zone_names<'de, D>(deserializer: D) -> std::result::Result<HashMap<u32, String>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let string_map: HashMap<String, String> = HashMap::deserialize(deserializer)?;
    string_map
        .into_iter()
        .map(|(k, v)| {
            k.parse::<u32>()
                .map(|id| (id, v))
                .map_err(|_| serde::de::Error::custom(format!("invalid zone ID: {k}")))
        })
        .collect()
}

#[derive(Debug, Clone, Deserialize)]
pub struct ReceiverToml {
    /// Number the panel dials to reach the receiver.
    pub phone_number: String,
    #[serde(default = "default_data_file_path")]
    pub data_file_path: PathBuf,
    #[serde(default = "default_socket_path")]
    pub socket_path: PathBuf,
    #[serde(default = "default_capture_device")]
    pub capture_device: PathBuf,
    /// Shell command that plays the receiver handshake tone.
    #[serde(default)]
    pub handshake_command: Option<String>,
    #[serde(default)]
    pub notify_auto_events: bool,
    #[serde(default = "default_confirm_timeout")]
    pub confirm_timeout_secs: u64,
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
}

fn default_data_file_path() -> PathBuf {
    PathBuf::from(DEFAULT_DATA_FILE_PATH)
}
fn default_socket_path() -> PathBuf {
    PathBuf::from(DEFAULT_SOCKET_PATH)
}
fn default_capture_device() -> PathBuf {
    PathBuf::from(DEFAULT_CAPTURE_DEVICE)
}
fn default_confirm_timeout() -> u64 {
    CONFIRM_TIMEOUT.as_secs()
}
fn default_request_timeout() -> u64 {
    REQUEST_TIMEOUT.as_secs()
}

#[derive(Debug, Clone, Deserialize)]
pub struct KeyswitchToml {
    pub gpio_pin: u32,
    #[serde(default = "default_pulse_ms")]
    pub pulse_ms: u64,
}

fn default_pulse_ms() -> u64 {
    KEYSWITCH_PULSE.as_millis() as u64
}

#[derive(Debug, Clone, Deserialize)]
pub struct MqttToml {
    pub url: String,
    #[serde(default = "default_client_id")]
    pub client_id: String,
    #[serde(default = "default_publish_topic")]
    pub publish_topic: String,
}

fn default_client_id() -> String {
    "alarmd".to_string()
}
fn default_publish_topic() -> String {
    "alarm".to_string()
}

impl Config {
    /// Read and validate a configuration file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|e| AlarmError::Config {
            reason: format!("unable to read {}: {e}", path.display()),
        })?;
        Self::parse(&text)
    }

    pub fn parse(text: &str) -> Result<Self> {
        let config: Config = toml::from_str(text).map_err(|e| AlarmError::Config {
            reason: e.to_string(),
        })?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        let number = &self.receiver.phone_number;
        if number.is_empty() || !number.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(AlarmError::Config {
                reason: format!("phone_number must be a non-empty digit string, got {number:?}"),
            });
        }
        if self.receiver.confirm_timeout_secs == 0 || self.receiver.request_timeout_secs == 0 {
            return Err(AlarmError::Config {
                reason: "timeouts must be at least one second".to_string(),
            });
        }
        Ok(())
    }

    /// Runtime options for the daemon loop.
    pub fn daemon_config(&self) -> DaemonConfig {
        DaemonConfig::builder()
            .phone_number(&self.receiver.phone_number)
            .data_file_path(&self.receiver.data_file_path)
            .socket_path(&self.receiver.socket_path)
            .notify_auto_events(self.receiver.notify_auto_events)
            .confirm_timeout(Duration::from_secs(self.receiver.confirm_timeout_secs))
            .request_timeout(Duration::from_secs(self.receiver.request_timeout_secs))
            .zone_names(self.zone_names.clone())
            .build()
    }
}

/// Options the daemon loop runs with.
#[derive(Debug, Clone)]
pub struct DaemonConfig {
    /// Receiver number the panel dials
    pub phone_number: String,
    /// Where the alarm status is persisted
    pub data_file_path: PathBuf,
    /// Control socket path
    pub socket_path: PathBuf,
    /// Whether automatic Open/Close reports are notified
    pub notify_auto_events: bool,
    /// How long an arm/disarm request waits for the panel's report
    pub confirm_timeout: Duration,
    /// Read timeout for one control request
    pub request_timeout: Duration,
    /// Zone number → name overrides for event descriptions
    pub zone_names: HashMap<u32, String>,
}

impl Default for DaemonConfig {
    fn default() -> Self {
        Self {
            phone_number: String::new(),
            data_file_path: default_data_file_path(),
            socket_path: default_socket_path(),
            notify_auto_events: false,
            confirm_timeout: CONFIRM_TIMEOUT,
            request_timeout: REQUEST_TIMEOUT,
            zone_names: HashMap::new(),
        }
    }
}

impl DaemonConfig {
    /// Create a new config builder starting from defaults.
    pub fn builder() -> DaemonConfigBuilder {
        DaemonConfigBuilder::default()
    }
}

/// Builder for DaemonConfig.
#[derive(Debug, Clone, Default)]
pub struct DaemonConfigBuilder {
    config: DaemonConfig,
}

impl DaemonConfigBuilder {
    pub fn phone_number(mut self, number: impl Into<String>) -> Self {
        self.config.phone_number = number.into();
        self
    }

    pub fn data_file_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.data_file_path = path.into();
        self
    }

    pub fn socket_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.socket_path = path.into();
        self
    }

    pub fn notify_auto_events(mut self, notify: bool) -> Self {
        self.config.notify_auto_events = notify;
        self
    }

    pub fn confirm_timeout(mut self, timeout: Duration) -> Self {
        self.config.confirm_timeout = timeout;
        self
    }

    pub fn request_timeout(mut self, timeout: Duration) -> Self {
        self.config.request_timeout = timeout;
        self
    }

    pub fn zone_names(mut self, names: HashMap<u32, String>) -> Self {
        self.config.zone_names = names;
        self
    }

    pub fn zone_name(mut self, zone: u32, name: impl Into<String>) -> Self {
        self.config.zone_names.insert(zone, name.into());
        self
    }

    pub fn build(self) -> DaemonConfig {
        self.config
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const FULL: &str = r#"
[receiver]
phone_number = "5551234"
data_file_path = "/tmp/status.json"
socket_path = "/tmp/ctl.sock"
capture_device = "/dev/hidraw3"
handshake_command = "aplay /usr/share/alarmd/handshake16k.wav"
notify_auto_events = true
confirm_timeout_secs = 120

[keyswitch]
gpio_pin = 17

[mqtt]
url = "mqtt://broker:1883"

[zone_names]
1 = "Front Door"
16 = "Garage"
"#;

    #[test]
    fn test_parse_full() {
        let config = Config::parse(FULL).unwrap();
        assert_eq!(config.receiver.phone_number, "5551234");
        assert_eq!(config.receiver.capture_device, PathBuf::from("/dev/hidraw3"));
        assert_eq!(config.receiver.request_timeout_secs, 20);
        assert_eq!(config.keyswitch.as_ref().unwrap().gpio_pin, 17);
        assert_eq!(config.keyswitch.as_ref().unwrap().pulse_ms, 2000);
        let mqtt = config.mqtt.as_ref().unwrap();
        assert_eq!(mqtt.client_id, "alarmd");
        assert_eq!(mqtt.publish_topic, "alarm");
        assert_eq!(config.zone_names.get(&16).map(String::as_str), Some("Garage"));

        let daemon = config.daemon_config();
        assert_eq!(daemon.confirm_timeout, Duration::from_secs(120));
        assert_eq!(daemon.request_timeout, Duration::from_secs(20));
        assert!(daemon.notify_auto_events);
        assert_eq!(daemon.socket_path, PathBuf::from("/tmp/ctl.sock"));
    }

    #[test]
    fn test_parse_minimal_defaults() {
        let config = Config::parse("[receiver]\nphone_number = \"5551234\"\n").unwrap();
        assert!(config.keyswitch.is_none());
        assert!(config.mqtt.is_none());
        assert!(config.zone_names.is_empty());
        assert_eq!(config.receiver.socket_path, PathBuf::from(DEFAULT_SOCKET_PATH));
        assert_eq!(config.receiver.data_file_path, PathBuf::from(DEFAULT_DATA_FILE_PATH));
        assert!(!config.receiver.notify_auto_events);
        assert_eq!(config.daemon_config().confirm_timeout, CONFIRM_TIMEOUT);
    }

    #[test]
    fn test_invalid_zone_id() {
        let text = "[receiver]\nphone_number = \"1\"\n[zone_names]\nfront = \"Door\"\n";
        let err = Config::parse(text).unwrap_err();
        assert!(err.to_string().contains("invalid zone ID: front"));
    }

    #[test]
    fn test_invalid_phone_number() {
        assert!(matches!(
            Config::parse("[receiver]\nphone_number = \"\"\n"),
            Err(AlarmError::Config { .. })
        ));
        assert!(matches!(
            Config::parse("[receiver]\nphone_number = \"555-1234\"\n"),
            Err(AlarmError::Config { .. })
        ));
    }

    #[test]
    fn test_missing_receiver_section() {
        assert!(matches!(Config::parse(""), Err(AlarmError::Config { .. })));
    }

    #[test]
    fn test_load_missing_file() {
        let err = Config::load("/nonexistent/alarmd.toml").unwrap_err();
        assert!(err.to_string().contains("/nonexistent/alarmd.toml"));
    }

    #[test]
    fn test_builder() {
        let config = DaemonConfig::builder()
            .phone_number("5551234")
            .zone_name(3, "Hall")
            .confirm_timeout(Duration::from_secs(5))
            .build();
        assert_eq!(config.phone_number, "5551234");
        assert_eq!(config.zone_names.get(&3).map(String::as_str), Some("Hall"));
        assert_eq!(config.confirm_timeout, Duration::from_secs(5));
        assert_eq!(config.request_timeout, REQUEST_TIMEOUT);
    }
}

use crate::consts;
use crate::topic::DeviceTopics;
use serde::Deserialize;
use std::collections::HashMap;
use std::fs::File;
use std::path::Path;

fn default_port() -> u16 {
    consts::DEFAULT_MQTT_PORT
}

fn default_keep_alive() -> u64 {
    consts::DEFAULT_KEEP_ALIVE_SECS
}

fn default_outputs() -> usize {
    1
}

#[derive(Debug, Deserialize, Clone)]
#[serde(deny_unknown_fields)]
pub struct BrokerConfig {
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub password: String,
    #[serde(default = "default_keep_alive")]
    pub keep_alive_secs: u64,
}

/// A single Tasmota device node.
///
/// Empty strings behave like missing values and fall back to the defaults,
/// see `DeviceConfig::normalize`.
#[derive(Debug, Deserialize, Clone)]
#[serde(deny_unknown_fields)]
pub struct DeviceConfig {
    /// Key of the broker in `Config::brokers`.
    pub broker: String,
    /// Tasmota topic of the device, substituted for `%topic%`.
    pub device: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub full_topic: String,
    #[serde(default)]
    pub cmnd_prefix: String,
    #[serde(default)]
    pub stat_prefix: String,
    #[serde(default)]
    pub tele_prefix: String,
    /// Number of node outputs. With 1, every channel goes out on output 0.
    #[serde(default = "default_outputs")]
    pub outputs: usize,
    /// Default retain flag of published commands.
    #[serde(default)]
    pub retain_incoming_cmd: bool,
}

fn or_default(value: &mut String, default: &str) {
    if value.is_empty() {
        *value = default.to_string();
    }
}

impl DeviceConfig {
    /// Fill empty fields with defaults. `node` is the display name fallback.
    pub fn normalize(&mut self, node: &str) {
        or_default(&mut self.name, node);
        or_default(&mut self.full_topic, consts::DEFAULT_FULL_TOPIC);
        or_default(&mut self.cmnd_prefix, consts::DEFAULT_CMND_PREFIX);
        or_default(&mut self.stat_prefix, consts::DEFAULT_STAT_PREFIX);
        or_default(&mut self.tele_prefix, consts::DEFAULT_TELE_PREFIX);
    }

    pub fn topics(&self) -> DeviceTopics {
        DeviceTopics::new(
            &self.device,
            &self.full_topic,
            &self.cmnd_prefix,
            &self.stat_prefix,
            &self.tele_prefix,
        )
    }
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    pub brokers: HashMap<String, BrokerConfig>,
    /// Device nodes by node name.
    pub devices: HashMap<String, DeviceConfig>,
}

impl Config {
    pub fn from_file<P: AsRef<Path>>(filename: P) -> anyhow::Result<Self> {
        let handle = File::open(filename)?;
        let data: Config = serde_yaml::from_reader(handle)?;
        data.validated()
    }

    pub fn from_yaml(data: &str) -> anyhow::Result<Self> {
        let data: Config = serde_yaml::from_str(data)?;
        data.validated()
    }

    fn validated(mut self) -> anyhow::Result<Self> {
        for (node, device) in self.devices.iter_mut() {
            if device.broker.is_empty() {
                anyhow::bail!("Device {} has no broker configured", node);
            }
            if !self.brokers.contains_key(&device.broker) {
                anyhow::bail!("Device {} refers to unknown broker {}", node, device.broker);
            }
            if device.device.is_empty() {
                anyhow::bail!("Device {} has no Tasmota topic configured", node);
            }
            if device.outputs == 0 {
                anyhow::bail!("Device {} needs at least one output", node);
            }
            device.normalize(node);
        }
        Ok(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const CONFIG: &str = r#"
brokers:
  home:
    host: mqtt.local
    username: gate
    password: secret
devices:
  kitchen:
    broker: home
    device: kitchen_relay
    outputs: 4
    cmnd_prefix: ""
  hall:
    broker: home
    device: hall_plug
    name: Hall plug
    full_topic: "tasmota/%prefix%/%topic%"
    retain_incoming_cmd: true
"#;

    #[test]
    fn loads_and_fills_defaults() {
        let config = Config::from_yaml(CONFIG).unwrap();
        let broker = &config.brokers["home"];
        assert_eq!(broker.port, 1883);
        assert_eq!(broker.keep_alive_secs, 5);

        let kitchen = &config.devices["kitchen"];
        assert_eq!(kitchen.name, "kitchen");
        assert_eq!(kitchen.full_topic, "%prefix%/%topic%/");
        assert_eq!(kitchen.cmnd_prefix, "cmnd");
        assert_eq!(kitchen.outputs, 4);
        assert!(!kitchen.retain_incoming_cmd);

        let hall = &config.devices["hall"];
        assert_eq!(hall.name, "Hall plug");
        assert_eq!(hall.outputs, 1);
        assert!(hall.retain_incoming_cmd);
        assert_eq!(
            hall.topics().build(crate::topic::Prefix::Cmnd, "POWER1"),
            "tasmota/cmnd/hall_plug/POWER1"
        );
    }

    #[test]
    fn rejects_unknown_broker() {
        let config = r#"
brokers: {}
devices:
  kitchen:
    broker: home
    device: kitchen_relay
"#;
        assert!(Config::from_yaml(config).is_err());
    }

    #[test]
    fn rejects_missing_device_topic() {
        let config = r#"
brokers:
  home:
    host: mqtt.local
devices:
  kitchen:
    broker: home
    device: ""
"#;
        assert!(Config::from_yaml(config).is_err());
    }

    #[test]
    fn rejects_unknown_fields() {
        let config = r#"
brokers:
  home:
    host: mqtt.local
    colour: blue
devices: {}
"#;
        assert!(Config::from_yaml(config).is_err());
    }
}

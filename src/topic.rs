//! Tasmota topic layout: `<prefix>/<device>/<command>` built from a full-topic
//! template with `%prefix%` and `%topic%` placeholders.
use crate::error::ProtocolError;

const PREFIX_PLACEHOLDER: &str = "%prefix%";
const TOPIC_PLACEHOLDER: &str = "%topic%";

/// Which configured prefix substitutes `%prefix%`.
#[derive(Copy, Clone, Eq, PartialEq, Debug)]
pub enum Prefix {
    /// Commands sent to the device.
    Cmnd,
    /// Command results and state reports.
    Stat,
    /// Periodic telemetry and LWT.
    Tele,
}

/// Topic builder of a single device.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DeviceTopics {
    device: String,
    full_topic: String,
    cmnd_prefix: String,
    stat_prefix: String,
    tele_prefix: String,
}

impl DeviceTopics {
    pub fn new(
        device: &str,
        full_topic: &str,
        cmnd_prefix: &str,
        stat_prefix: &str,
        tele_prefix: &str,
    ) -> Self {
        Self {
            device: device.to_string(),
            full_topic: full_topic.to_string(),
            cmnd_prefix: cmnd_prefix.to_string(),
            stat_prefix: stat_prefix.to_string(),
            tele_prefix: tele_prefix.to_string(),
        }
    }

    pub fn device(&self) -> &str {
        &self.device
    }

    fn prefix(&self, kind: Prefix) -> &str {
        match kind {
            Prefix::Cmnd => &self.cmnd_prefix,
            Prefix::Stat => &self.stat_prefix,
            Prefix::Tele => &self.tele_prefix,
        }
    }

    /// Build a full topic for the command. The command is not validated, any
    /// string (including an empty one or an MQTT wildcard) is accepted.
    pub fn build(&self, kind: Prefix, command: &str) -> String {
        let full = self
            .full_topic
            .replacen(TOPIC_PLACEHOLDER, &self.device, 1)
            .replacen(PREFIX_PLACEHOLDER, self.prefix(kind), 1);

        if full.ends_with('/') {
            format!("{}{}", full, command)
        } else {
            format!("{}/{}", full, command)
        }
    }
}

/// Last segment of the topic, eg. `POWER2` for `stat/plug/POWER2`.
pub fn last_segment(topic: &str) -> &str {
    topic.rsplit('/').next().unwrap_or(topic)
}

/// Extract the channel number from a token like `POWER3`.
///
/// A bare prefix (`POWER`) means channel 1. The remainder must consist of
/// digits only, `POWERX` or `POWER-1` are rejected.
pub fn parse_channel(token: &str, command_prefix: &str) -> Result<u32, ProtocolError> {
    let remainder = token
        .strip_prefix(command_prefix)
        .ok_or_else(|| ProtocolError::InvalidTopic(token.to_string()))?;

    if remainder.is_empty() {
        return Ok(1);
    }
    if !remainder.chars().all(|c| c.is_ascii_digit()) {
        return Err(ProtocolError::InvalidTopic(token.to_string()));
    }
    remainder
        .parse::<u32>()
        .map_err(|_| ProtocolError::InvalidTopic(token.to_string()))
}

/// MQTT topic filter matching with `+` (single level) and `#` (remaining
/// levels) wildcards.
pub fn topic_matches(filter: &str, topic: &str) -> bool {
    let mut filter_levels = filter.split('/');
    let mut topic_levels = topic.split('/');

    loop {
        match (filter_levels.next(), topic_levels.next()) {
            (Some("#"), _) => return true,
            (Some("+"), Some(_)) => continue,
            (Some(f), Some(t)) if f == t => continue,
            (None, None) => return true,
            _ => return false,
        }
    }
}

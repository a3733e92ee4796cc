//! Multi-channel Tasmota relay: flow commands in, `POWER<N>` reports out.
use crate::availability::{AvailabilityTracker, DeviceLifecycle};
use crate::config::DeviceConfig;
use crate::consts::{
    MAX_CHANNEL, POWER_COMMAND, POWER_OFF, POWER_ON, POWER_REFRESH_COMMAND, POWER_TOGGLE,
    SWITCH_TOPIC_PREFIX,
};
use crate::error::ProtocolError;
use crate::flow::{HostSender, InputMessage, InputPayload, OutputMessage, Outgoing, Scalar};
use crate::mqtt::{qos_from_u8, MqttClient, PublishOptions};
use crate::node::{Device, DeviceLink, TasmotaNode};
use crate::status::Fill;
use crate::topic::{self, Prefix};
use std::fmt;
use tracing::{debug, info, trace, warn};

/// Cached relay state of a channel.
#[derive(Copy, Clone, Eq, PartialEq, Debug, Default)]
pub enum PowerState {
    On,
    Off,
    /// Channel was never reported, but a higher one was.
    #[default]
    Unknown,
}

impl fmt::Display for PowerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            PowerState::On => "On",
            PowerState::Off => "Off",
            PowerState::Unknown => "?",
        };
        f.write_str(text)
    }
}

/// Relay states indexed by channel (1-based). Grows to the highest reported
/// channel and never shrinks.
#[derive(Debug, Default, Clone)]
pub struct ChannelCache {
    states: Vec<PowerState>,
}

impl ChannelCache {
    pub fn set(&mut self, channel: u32, state: PowerState) {
        let Some(idx) = (channel as usize).checked_sub(1) else {
            return;
        };
        if idx >= self.states.len() {
            self.states.resize(idx + 1, PowerState::Unknown);
        }
        self.states[idx] = state;
    }

    pub fn get(&self, channel: u32) -> PowerState {
        channel
            .checked_sub(1)
            .and_then(|idx| self.states.get(idx as usize))
            .copied()
            .unwrap_or_default()
    }

    pub fn len(&self) -> usize {
        self.states.len()
    }

    pub fn is_empty(&self) -> bool {
        self.states.is_empty()
    }

    /// Human readable summary, eg. "On - ? - Off".
    pub fn summary(&self) -> String {
        self.states
            .iter()
            .map(PowerState::to_string)
            .collect::<Vec<_>>()
            .join(" - ")
    }
}

/// Value of the POWER command.
#[derive(Copy, Clone, Eq, PartialEq, Debug)]
pub enum PowerCommand {
    On,
    Off,
    Toggle,
}

impl PowerCommand {
    pub fn as_str(&self) -> &'static str {
        match self {
            PowerCommand::On => POWER_ON,
            PowerCommand::Off => POWER_OFF,
            PowerCommand::Toggle => POWER_TOGGLE,
        }
    }

    pub fn from_scalar(value: &Scalar) -> Result<Self, ProtocolError> {
        let command = match value {
            Scalar::Text(text) => match text.to_lowercase().as_str() {
                "1" | "on" | "true" => Some(PowerCommand::On),
                "0" | "off" | "false" => Some(PowerCommand::Off),
                "toggle" => Some(PowerCommand::Toggle),
                _ => None,
            },
            Scalar::Bool(true) => Some(PowerCommand::On),
            Scalar::Bool(false) => Some(PowerCommand::Off),
            Scalar::Number(n) if *n == 1.0 => Some(PowerCommand::On),
            Scalar::Number(n) if *n == 0.0 => Some(PowerCommand::Off),
            Scalar::Number(_) => None,
        };
        command.ok_or_else(|| ProtocolError::MalformedPayload(format!("{:?}", value)))
    }
}

/// Channel addressed by a flow message topic: `switch<N>` (any case) selects
/// N, anything else channel 1.
pub fn input_channel(topic: Option<&str>) -> u32 {
    let Some(topic) = topic else {
        return 1;
    };
    match topic.get(..SWITCH_TOPIC_PREFIX.len()) {
        Some(head) if head.eq_ignore_ascii_case(SWITCH_TOPIC_PREFIX) => {
            topic::parse_channel(&topic[SWITCH_TOPIC_PREFIX.len()..], "").unwrap_or(1)
        }
        _ => 1,
    }
}

/// Decode a `stat/<device>/POWER<N>` report into channel and state.
pub fn decode_stat(topic: &str, payload: &str) -> Result<(u32, PowerState), ProtocolError> {
    let token = topic::last_segment(topic);
    if !token.starts_with(POWER_COMMAND) {
        return Err(ProtocolError::InvalidTopic(topic.to_string()));
    }

    let state = match payload {
        POWER_ON => PowerState::On,
        POWER_OFF => PowerState::Off,
        _ => return Err(ProtocolError::MalformedPayload(payload.to_string())),
    };

    // POWER0 is a command addressing all relays, never a report of one.
    match topic::parse_channel(token, POWER_COMMAND)? {
        0 => Err(ProtocolError::InvalidTopic(topic.to_string())),
        channel if channel > MAX_CHANNEL => Err(ProtocolError::InvalidTopic(topic.to_string())),
        channel => Ok((channel, state)),
    }
}

pub struct SwitchController<C> {
    link: DeviceLink<C>,
    host: HostSender,
    outputs: usize,
    retain_incoming_cmd: bool,
    cache: ChannelCache,
}

pub type SwitchNode<C> = TasmotaNode<SwitchController<C>, C>;

impl<C: MqttClient + Clone> SwitchController<C> {
    pub fn new(link: DeviceLink<C>, host: HostSender, outputs: usize, retain_incoming_cmd: bool) -> Self {
        Self {
            link,
            host,
            outputs,
            retain_incoming_cmd,
            cache: ChannelCache::default(),
        }
    }

    /// Complete switch node for a configured device.
    pub fn node(config: &DeviceConfig, client: C, host: HostSender) -> SwitchNode<C> {
        let link = DeviceLink::new(config.topics(), client);
        let controller = Self::new(
            link.clone(),
            host.clone(),
            config.outputs,
            config.retain_incoming_cmd,
        );
        TasmotaNode::new(link, host, controller)
    }

    pub fn cache(&self) -> &ChannelCache {
        &self.cache
    }

    /// Translate a flow message into a POWER command.
    pub fn on_input(&mut self, msg: InputMessage) {
        let channel = input_channel(msg.topic.as_deref());
        let command = format!("{}{}", POWER_COMMAND, channel);

        let mut options = PublishOptions {
            retain: self.retain_incoming_cmd,
            qos: None,
        };
        let value = match msg.payload {
            InputPayload::Structured { state, retain, qos } => {
                if let Some(retain) = retain {
                    options.retain = retain;
                }
                if let Some(qos) = qos {
                    options.qos = qos_from_u8(qos);
                }
                state
            }
            InputPayload::Scalar(value) => Some(value),
            InputPayload::Empty => None,
        };

        let target = value
            .ok_or_else(|| ProtocolError::MalformedPayload("missing value".into()))
            .and_then(|value| PowerCommand::from_scalar(&value));

        match target {
            Ok(target) => {
                info!("Switching channel {} {}", channel, target.as_str());
                self.link
                    .publish(Prefix::Cmnd, &command, target.as_str(), options);
            }
            Err(err) => {
                warn!("Invalid payload received on input: {}", err);
                self.warn("Invalid payload received on input");
            }
        }
    }

    /// Handle a message on stat/<device>/+. Anything but a valid POWER
    /// report is dropped silently.
    pub fn on_stat(&mut self, topic: &str, payload: &str, tracker: &AvailabilityTracker) {
        let (channel, state) = match decode_stat(topic, payload) {
            Ok(decoded) => decoded,
            Err(err) => {
                trace!("Ignoring stat message: {}", err);
                return;
            }
        };

        self.cache.set(channel, state);

        let fill = if self.cache.get(1) == PowerState::On {
            Fill::Green
        } else {
            Fill::Grey
        };
        tracker.set_status(fill, &self.cache.summary(), None);

        let msg = OutputMessage {
            topic: format!("{}{}", SWITCH_TOPIC_PREFIX, channel),
            payload: state == PowerState::On,
        };
        let outputs = if self.outputs == 1 {
            vec![Some(msg)]
        } else {
            let idx = channel as usize - 1;
            if idx >= self.outputs {
                debug!(
                    "Channel {} has no output ({} configured), not sending",
                    channel, self.outputs
                );
                return;
            }
            let mut outputs = vec![None; self.outputs];
            outputs[idx] = Some(msg);
            outputs
        };
        self.send(Outgoing::Send { outputs });
    }

    fn warn(&self, text: &str) {
        self.send(Outgoing::Warn {
            text: text.to_string(),
        });
    }

    fn send(&self, event: Outgoing) {
        if self.host.send(event).is_err() {
            debug!("Host is gone, event dropped");
        }
    }
}

impl<C: MqttClient + Clone> DeviceLifecycle for SwitchController<C> {
    fn on_device_online(&mut self) {
        // Ask for the state of every relay.
        self.link.publish(
            Prefix::Cmnd,
            POWER_REFRESH_COMMAND,
            "",
            PublishOptions::default(),
        );
    }
}

impl<C: MqttClient + Clone> Device for SwitchController<C> {
    fn subscriptions(&self) -> Vec<(Prefix, &'static str)> {
        vec![(Prefix::Stat, "+")]
    }

    fn on_message(&mut self, topic: &str, payload: &str, tracker: &AvailabilityTracker) {
        self.on_stat(topic, payload, tracker);
    }

    fn on_input(&mut self, msg: InputMessage) {
        SwitchController::on_input(self, msg);
    }
}

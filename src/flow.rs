//! Messages exchanged with the flow automation host.
use crate::status::NodeStatus;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::mpsc;
use tracing::debug;

/// Plain payload value.
#[derive(Clone, Debug, PartialEq)]
pub enum Scalar {
    Text(String),
    Bool(bool),
    Number(f64),
}

impl Scalar {
    /// Converts a JSON value; objects, arrays and null are not scalars.
    pub fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::String(text) => Some(Scalar::Text(text.clone())),
            Value::Bool(b) => Some(Scalar::Bool(*b)),
            Value::Number(n) => n.as_f64().map(Scalar::Number),
            _ => None,
        }
    }
}

/// Payload of an input message, classified once when it is received.
#[derive(Clone, Debug, PartialEq)]
pub enum InputPayload {
    /// No payload at all, or an explicit null.
    Empty,
    /// The whole payload is the value.
    Scalar(Scalar),
    /// An object carrying the value in `state` with optional publish overrides.
    Structured {
        state: Option<Scalar>,
        retain: Option<bool>,
        qos: Option<u8>,
    },
}

impl From<Value> for InputPayload {
    fn from(value: Value) -> Self {
        match value {
            Value::Null => InputPayload::Empty,
            Value::Object(fields) => {
                let state = fields.get("state").and_then(Scalar::from_value);
                let retain = fields.get("retain").and_then(Value::as_bool);
                let qos = match fields.get("qos") {
                    Some(Value::Number(n)) => {
                        let qos = n.as_u64().filter(|q| *q <= 2).map(|q| q as u8);
                        if qos.is_none() {
                            debug!("Ignoring out of range qos override {}", n);
                        }
                        qos
                    }
                    _ => None,
                };
                InputPayload::Structured { state, retain, qos }
            }
            // Arrays are objects for the host too, without a `state` field.
            Value::Array(_) => InputPayload::Structured {
                state: None,
                retain: None,
                qos: None,
            },
            scalar => Scalar::from_value(&scalar)
                .map(InputPayload::Scalar)
                .unwrap_or(InputPayload::Empty),
        }
    }
}

#[derive(Deserialize)]
struct RawInput {
    #[serde(default)]
    topic: Option<String>,
    #[serde(default)]
    payload: Value,
}

/// Message delivered by the host to a node input.
#[derive(Deserialize, Clone, Debug, PartialEq)]
#[serde(from = "RawInput")]
pub struct InputMessage {
    pub topic: Option<String>,
    pub payload: InputPayload,
}

impl From<RawInput> for InputMessage {
    fn from(raw: RawInput) -> Self {
        Self {
            topic: raw.topic,
            payload: raw.payload.into(),
        }
    }
}

impl InputMessage {
    pub fn new(topic: Option<&str>, payload: Value) -> Self {
        Self {
            topic: topic.map(str::to_string),
            payload: payload.into(),
        }
    }
}

/// Message a node sends out, eg. `{topic: "switch2", payload: true}`.
#[derive(Serialize, Clone, Debug, PartialEq, Eq)]
pub struct OutputMessage {
    pub topic: String,
    pub payload: bool,
}

/// Things a node hands over to the host.
#[derive(Serialize, Clone, Debug, PartialEq)]
#[serde(tag = "event", rename_all = "lowercase")]
pub enum Outgoing {
    /// Replace the status indicator.
    Status(NodeStatus),
    /// One slot per node output; `None` means nothing is sent on that output.
    Send { outputs: Vec<Option<OutputMessage>> },
    /// Recoverable problem worth showing to the user.
    Warn { text: String },
}

pub type HostSender = mpsc::UnboundedSender<Outgoing>;

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn classifies_payloads() {
        assert_eq!(
            InputPayload::from(json!("on")),
            InputPayload::Scalar(Scalar::Text("on".into()))
        );
        assert_eq!(
            InputPayload::from(json!(true)),
            InputPayload::Scalar(Scalar::Bool(true))
        );
        assert_eq!(
            InputPayload::from(json!(0)),
            InputPayload::Scalar(Scalar::Number(0.0))
        );
        assert_eq!(InputPayload::from(json!(null)), InputPayload::Empty);
    }

    #[test]
    fn structured_payload_keeps_only_typed_overrides() {
        let payload = InputPayload::from(json!({"state": "toggle", "retain": true, "qos": 1}));
        assert_eq!(
            payload,
            InputPayload::Structured {
                state: Some(Scalar::Text("toggle".into())),
                retain: Some(true),
                qos: Some(1),
            }
        );

        let payload = InputPayload::from(json!({"state": {"x": 1}, "retain": "yes", "qos": 7}));
        assert_eq!(
            payload,
            InputPayload::Structured {
                state: None,
                retain: None,
                qos: None,
            }
        );
    }

    #[test]
    fn deserializes_input_message() {
        let msg: InputMessage =
            serde_json::from_value(json!({"topic": "switch2", "payload": {"state": "on"}})).unwrap();
        assert_eq!(msg.topic.as_deref(), Some("switch2"));
        assert!(matches!(msg.payload, InputPayload::Structured { .. }));

        let msg: InputMessage = serde_json::from_value(json!({"payload": 1})).unwrap();
        assert_eq!(msg.topic, None);
        assert_eq!(msg.payload, InputPayload::Scalar(Scalar::Number(1.0)));
    }

    #[test]
    fn serializes_outgoing_events() {
        let event = Outgoing::Send {
            outputs: vec![
                None,
                Some(OutputMessage {
                    topic: "switch2".into(),
                    payload: false,
                }),
            ],
        };
        assert_eq!(
            serde_json::to_value(&event).unwrap(),
            json!({"event": "send", "outputs": [null, {"topic": "switch2", "payload": false}]})
        );
    }
}

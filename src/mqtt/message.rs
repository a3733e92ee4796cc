use rumqttc::QoS;

/// Things the broker connection reports to a device node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MqttEvent {
    /// Broker accepted the connection (initial or after a reconnect).
    BrokerConnected,
    /// Connection to the broker was lost. The connection keeps retrying.
    BrokerDisconnected,
    /// Publish received on one of the subscribed topics.
    Message { topic: String, payload: String },
}

/// Options of a single outgoing publish.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PublishOptions {
    pub retain: bool,
    /// None publishes with the connection default (at most once).
    pub qos: Option<QoS>,
}

impl PublishOptions {
    pub fn qos_or_default(&self) -> QoS {
        self.qos.unwrap_or(QoS::AtMostOnce)
    }
}

pub fn qos_from_u8(level: u8) -> Option<QoS> {
    match level {
        0 => Some(QoS::AtMostOnce),
        1 => Some(QoS::AtLeastOnce),
        2 => Some(QoS::ExactlyOnce),
        _ => None,
    }
}

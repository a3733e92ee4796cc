mod connection;
mod message;

pub use connection::Connection;
pub use message::{qos_from_u8, MqttEvent, PublishOptions};
pub use rumqttc::QoS;

use tokio::sync::oneshot;

/// Broker connection as seen by a device node. All operations are
/// fire-and-forget: failures are logged by the implementation, delivery and
/// reconnection are its business.
pub trait MqttClient {
    fn publish(&self, topic: &str, payload: &str, options: PublishOptions);

    /// Subscribe to a topic filter. Messages arrive as `MqttEvent::Message`.
    fn subscribe(&self, topic: &str, qos: QoS);

    /// Close the connection. `done` fires once the disconnect went through.
    fn disconnect(&self, done: oneshot::Sender<()>);
}

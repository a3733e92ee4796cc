use super::{MqttClient, MqttEvent, PublishOptions};
use crate::config::BrokerConfig;
use rumqttc::{AsyncClient, EventLoop, MqttOptions, QoS};
use rumqttc::{Event, Outgoing as MqttOutgoing, Packet};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tokio::task;

use tracing::{debug, error, info, warn};

/// Delay between reconnection attempts after a failed poll.
const RECONNECT_DELAY: Duration = Duration::from_secs(1);

#[derive(Default)]
struct Shared {
    /// Subscriptions to restore after a reconnect.
    subscriptions: Mutex<Vec<(String, QoS)>>,
    /// Completion of a requested disconnect.
    disconnected: Mutex<Option<oneshot::Sender<()>>>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl Shared {
    fn disconnect_pending(&self) -> bool {
        lock(&self.disconnected).is_some()
    }

    fn complete_disconnect(&self) {
        if let Some(done) = lock(&self.disconnected).take() {
            // Receiver might be gone already, nothing to do then.
            let _ = done.send(());
        }
    }
}

/// Broker reachability as seen by the poll loop.
#[derive(Default)]
struct Link {
    up: bool,
}

impl Link {
    fn connected(&mut self) {
        self.up = true;
    }

    /// True for the first failed poll after a ConnAck only.
    fn failed(&mut self) -> bool {
        std::mem::replace(&mut self.up, false)
    }
}

/// Single broker connection of a device node, backed by rumqttc.
#[derive(Clone)]
pub struct Connection {
    client: AsyncClient,
    shared: Arc<Shared>,
}

impl Connection {
    /// Create the connection and start polling it. Events are delivered on the
    /// returned queue; the connection itself is established in the background.
    #[tracing::instrument(skip(broker), fields(host = %broker.host, port = broker.port))]
    pub fn connect(client_id: &str, broker: &BrokerConfig) -> (Self, mpsc::Receiver<MqttEvent>) {
        let mut mqttoptions = MqttOptions::new(client_id, &broker.host, broker.port);
        mqttoptions.set_keep_alive(Duration::from_secs(broker.keep_alive_secs));
        if !broker.username.is_empty() {
            mqttoptions.set_credentials(&broker.username, &broker.password);
        }

        let (client, event_loop) = AsyncClient::new(mqttoptions, 10);
        let shared = Arc::new(Shared::default());
        let (queue, events) = mpsc::channel::<MqttEvent>(32);

        task::spawn(Self::receiver(
            event_loop,
            client.clone(),
            shared.clone(),
            queue,
        ));

        (Connection { client, shared }, events)
    }

    async fn receiver(
        mut event_loop: EventLoop,
        client: AsyncClient,
        shared: Arc<Shared>,
        queue: mpsc::Sender<MqttEvent>,
    ) {
        let mut connected_before = false;
        let mut link = Link::default();
        loop {
            let notification = event_loop.poll().await;
            let event = match notification {
                Ok(Event::Incoming(Packet::ConnAck(ack))) => {
                    info!("Connected to broker: {:?}", ack.code);
                    if connected_before && !ack.session_present {
                        // Broker forgot us; requests made before the first
                        // connection were delivered by the event loop itself.
                        let subscriptions = lock(&shared.subscriptions).clone();
                        for (topic, qos) in subscriptions {
                            debug!("Restoring subscription to {}", topic);
                            if let Err(err) = client.try_subscribe(&topic, qos) {
                                error!("Unable to restore subscription {}: {:?}", topic, err);
                            }
                        }
                    }
                    connected_before = true;
                    link.connected();
                    MqttEvent::BrokerConnected
                }
                Ok(Event::Incoming(Packet::Publish(msg))) => {
                    debug!("RX message to {} with payload '{:?}'", msg.topic, msg.payload);
                    MqttEvent::Message {
                        topic: msg.topic.clone(),
                        payload: String::from_utf8_lossy(&msg.payload).into_owned(),
                    }
                }
                Ok(Event::Outgoing(MqttOutgoing::Disconnect)) => {
                    info!("Disconnected from broker");
                    shared.complete_disconnect();
                    return;
                }
                Ok(_) => {
                    // Silence acks, pings and the like.
                    continue;
                }
                Err(err) => {
                    if shared.disconnect_pending() {
                        // Closing while the broker is unreachable; nothing
                        // left to flush.
                        info!("Connection closed while offline: {}", err);
                        shared.complete_disconnect();
                        return;
                    }
                    if link.failed() {
                        warn!("MQTT connection error: {}. Retrying", err);
                        if queue.send(MqttEvent::BrokerDisconnected).await.is_err() {
                            return;
                        }
                    } else {
                        debug!("MQTT connection still down: {}. Retrying", err);
                    }
                    tokio::time::sleep(RECONNECT_DELAY).await;
                    continue;
                }
            };
            if queue.send(event).await.is_err() {
                error!("Event queue closed, quitting MQTT loop");
                return;
            }
        }
    }
}

impl MqttClient for Connection {
    fn publish(&self, topic: &str, payload: &str, options: PublishOptions) {
        debug!(
            "Publishing to {} (retain={}, qos={:?}): '{}'",
            topic, options.retain, options.qos, payload
        );
        let result = self.client.try_publish(
            topic,
            options.qos_or_default(),
            options.retain,
            payload.as_bytes().to_vec(),
        );
        if let Err(err) = result {
            error!("Unable to publish to {}: {:?}", topic, err);
        }
    }

    fn subscribe(&self, topic: &str, qos: QoS) {
        debug!("Subscribing to {}", topic);
        lock(&self.shared.subscriptions).push((topic.to_string(), qos));
        if let Err(err) = self.client.try_subscribe(topic, qos) {
            error!("Unable to subscribe to {}: {:?}", topic, err);
        }
    }

    fn disconnect(&self, done: oneshot::Sender<()>) {
        *lock(&self.shared.disconnected) = Some(done);
        if let Err(err) = self.client.try_disconnect() {
            // Event loop is gone, there is nothing to wait for.
            warn!("Unable to request disconnect: {:?}", err);
            self.shared.complete_disconnect();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn outage_is_reported_once_per_connection() {
        let mut link = Link::default();
        assert!(!link.failed());

        link.connected();
        assert!(link.failed());
        assert!(!link.failed());
        assert!(!link.failed());

        link.connected();
        assert!(link.failed());
    }
}

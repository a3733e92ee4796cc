//! Base of every Tasmota device node: availability tracking, subscription
//! routing and shutdown. Device specific behaviour is plugged in via `Device`.
use crate::availability::{AvailabilityTracker, DeviceLifecycle};
use crate::consts::LWT_COMMAND;
use crate::flow::{HostSender, InputMessage};
use crate::mqtt::{MqttClient, MqttEvent, PublishOptions, QoS};
use crate::topic::{self, DeviceTopics, Prefix};
use tokio::sync::oneshot;
use tracing::{debug, info};

/// QoS of every device subscription.
const SUBSCRIBE_QOS: QoS = QoS::ExactlyOnce;

/// Topic builder bound to the broker connection.
#[derive(Clone)]
pub struct DeviceLink<C> {
    topics: DeviceTopics,
    client: C,
}

impl<C: MqttClient> DeviceLink<C> {
    pub fn new(topics: DeviceTopics, client: C) -> Self {
        Self { topics, client }
    }

    pub fn topics(&self) -> &DeviceTopics {
        &self.topics
    }

    pub fn publish(&self, prefix: Prefix, command: &str, payload: &str, options: PublishOptions) {
        let topic = self.topics.build(prefix, command);
        self.client.publish(&topic, payload, options);
    }

    /// Subscribe and return the topic filter used.
    pub fn subscribe(&self, prefix: Prefix, command: &str) -> String {
        let filter = self.topics.build(prefix, command);
        self.client.subscribe(&filter, SUBSCRIBE_QOS);
        filter
    }

    pub fn disconnect(&self, done: oneshot::Sender<()>) {
        self.client.disconnect(done);
    }
}

/// Device variant: switch, sensor...
pub trait Device: DeviceLifecycle {
    /// Topics the device listens on, besides the LWT.
    fn subscriptions(&self) -> Vec<(Prefix, &'static str)>;

    /// Message on one of the device subscriptions.
    fn on_message(&mut self, topic: &str, payload: &str, tracker: &AvailabilityTracker);

    /// Message from the flow host.
    fn on_input(&mut self, msg: InputMessage);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Route {
    Lwt,
    Device,
}

struct Subscription {
    filter: String,
    route: Route,
}

pub struct TasmotaNode<D, C> {
    link: DeviceLink<C>,
    tracker: AvailabilityTracker,
    device: D,
    subscriptions: Vec<Subscription>,
}

impl<D: Device, C: MqttClient> TasmotaNode<D, C> {
    /// Subscribes to the device availability (tele/<device>/LWT) and to the
    /// device topics.
    pub fn new(link: DeviceLink<C>, host: HostSender, device: D) -> Self {
        let mut subscriptions = vec![Subscription {
            filter: link.subscribe(Prefix::Tele, LWT_COMMAND),
            route: Route::Lwt,
        }];
        for (prefix, command) in device.subscriptions() {
            subscriptions.push(Subscription {
                filter: link.subscribe(prefix, command),
                route: Route::Device,
            });
        }

        Self {
            link,
            tracker: AvailabilityTracker::new(host),
            device,
            subscriptions,
        }
    }

    pub fn tracker(&self) -> &AvailabilityTracker {
        &self.tracker
    }

    pub fn device(&self) -> &D {
        &self.device
    }

    pub fn handle_mqtt(&mut self, event: MqttEvent) {
        match event {
            MqttEvent::BrokerConnected => self.tracker.broker_connected(),
            MqttEvent::BrokerDisconnected => self.tracker.broker_disconnected(&mut self.device),
            MqttEvent::Message { topic, payload } => self.route(&topic, &payload),
        }
    }

    fn route(&mut self, topic: &str, payload: &str) {
        let mut matched = false;
        for subscription in &self.subscriptions {
            if !topic::topic_matches(&subscription.filter, topic) {
                continue;
            }
            matched = true;
            match subscription.route {
                Route::Lwt => self.tracker.handle_lwt(payload, &mut self.device),
                Route::Device => self.device.on_message(topic, payload, &self.tracker),
            }
        }
        if !matched {
            debug!("No subscription for {}, ignoring", topic);
        }
    }

    pub fn handle_input(&mut self, msg: InputMessage) {
        self.device.on_input(msg);
    }

    /// Start the shutdown. `done` fires once the broker connection is closed.
    pub fn close(&mut self, done: oneshot::Sender<()>) {
        info!("Closing node of {}", self.link.topics().device());
        self.tracker.begin_close();
        self.link.disconnect(done);
    }
}

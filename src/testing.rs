use crate::mqtt::{MqttClient, PublishOptions, QoS};
use std::sync::{Arc, Mutex};
use tokio::sync::oneshot;

#[derive(Default)]
struct Recorded {
    publishes: Vec<(String, String, PublishOptions)>,
    subscriptions: Vec<(String, QoS)>,
    disconnects: usize,
}

/// MqttClient fake remembering every request. Disconnects complete at once.
#[derive(Clone, Default)]
pub struct RecordingClient {
    recorded: Arc<Mutex<Recorded>>,
}

impl RecordingClient {
    pub fn publishes(&self) -> Vec<(String, String, PublishOptions)> {
        self.recorded.lock().unwrap().publishes.clone()
    }

    pub fn subscriptions(&self) -> Vec<(String, QoS)> {
        self.recorded.lock().unwrap().subscriptions.clone()
    }

    pub fn disconnects(&self) -> usize {
        self.recorded.lock().unwrap().disconnects
    }
}

impl MqttClient for RecordingClient {
    fn publish(&self, topic: &str, payload: &str, options: PublishOptions) {
        self.recorded
            .lock()
            .unwrap()
            .publishes
            .push((topic.to_string(), payload.to_string(), options));
    }

    fn subscribe(&self, topic: &str, qos: QoS) {
        self.recorded
            .lock()
            .unwrap()
            .subscriptions
            .push((topic.to_string(), qos));
    }

    fn disconnect(&self, done: oneshot::Sender<()>) {
        self.recorded.lock().unwrap().disconnects += 1;
        let _ = done.send(());
    }
}

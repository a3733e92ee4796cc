use serde_json::json;
use std::sync::{Arc, Mutex};
use tasmota_gate::availability::AvailabilityState;
use tasmota_gate::config::Config;
use tasmota_gate::flow::{InputMessage, OutputMessage, Outgoing};
use tasmota_gate::mqtt::{MqttClient, MqttEvent, PublishOptions, QoS};
use tasmota_gate::status::{Fill, NodeStatus, Shape};
use tasmota_gate::switch::{SwitchController, SwitchNode};
use tokio::sync::{mpsc, oneshot};

#[derive(Clone, Default)]
struct FakeBroker {
    published: Arc<Mutex<Vec<(String, String)>>>,
    subscribed: Arc<Mutex<Vec<String>>>,
}

impl FakeBroker {
    fn published(&self) -> Vec<(String, String)> {
        self.published.lock().unwrap().clone()
    }
}

impl MqttClient for FakeBroker {
    fn publish(&self, topic: &str, payload: &str, _options: PublishOptions) {
        self.published
            .lock()
            .unwrap()
            .push((topic.to_string(), payload.to_string()));
    }

    fn subscribe(&self, topic: &str, _qos: QoS) {
        self.subscribed.lock().unwrap().push(topic.to_string());
    }

    fn disconnect(&self, done: oneshot::Sender<()>) {
        let _ = done.send(());
    }
}

const CONFIG: &str = r#"
brokers:
  home:
    host: localhost
devices:
  relays:
    broker: home
    device: D
    outputs: 4
  plug:
    broker: home
    device: P
"#;

fn switch(node: &str) -> (SwitchNode<FakeBroker>, FakeBroker, mpsc::UnboundedReceiver<Outgoing>) {
    let config = Config::from_yaml(CONFIG).unwrap();
    let broker = FakeBroker::default();
    let (host, events) = mpsc::unbounded_channel();
    let node = SwitchController::node(&config.devices[node], broker.clone(), host);
    (node, broker, events)
}

fn mqtt(topic: &str, payload: &str) -> MqttEvent {
    MqttEvent::Message {
        topic: topic.to_string(),
        payload: payload.to_string(),
    }
}

fn drain(events: &mut mpsc::UnboundedReceiver<Outgoing>) -> Vec<Outgoing> {
    let mut result = vec![];
    while let Ok(event) = events.try_recv() {
        result.push(event);
    }
    result
}

#[test]
fn subscribes_to_lwt_and_stat() {
    let (_node, broker, _events) = switch("relays");
    assert_eq!(
        *broker.subscribed.lock().unwrap(),
        vec!["tele/D/LWT".to_string(), "stat/D/+".to_string()]
    );
}

#[test]
fn structured_command_on_second_channel() {
    let (mut node, broker, _events) = switch("relays");
    node.handle_input(InputMessage::new(Some("switch2"), json!({"state": "on"})));
    assert_eq!(broker.published(), vec![("cmnd/D/POWER2".to_string(), "ON".to_string())]);
}

#[test]
fn bare_boolean_goes_to_first_channel() {
    let (mut node, broker, _events) = switch("relays");
    node.handle_input(InputMessage::new(None, json!(true)));
    assert_eq!(broker.published(), vec![("cmnd/D/POWER1".to_string(), "ON".to_string())]);
}

#[test]
fn stat_report_goes_to_its_output() {
    let (mut node, _broker, mut events) = switch("relays");
    node.handle_mqtt(mqtt("tele/D/LWT", "Online"));
    drain(&mut events);

    node.handle_mqtt(mqtt("stat/D/POWER3", "OFF"));
    let sends: Vec<Outgoing> = drain(&mut events)
        .into_iter()
        .filter(|e| matches!(e, Outgoing::Send { .. }))
        .collect();
    assert_eq!(
        sends,
        vec![Outgoing::Send {
            outputs: vec![
                None,
                None,
                Some(OutputMessage {
                    topic: "switch3".into(),
                    payload: false,
                }),
                None,
            ]
        }]
    );
}

#[test]
fn online_lwt_requests_full_state() {
    let (mut node, broker, mut events) = switch("plug");
    node.handle_mqtt(mqtt("tele/P/LWT", "Online"));

    assert_eq!(node.tracker().state(), AvailabilityState::Online);
    assert_eq!(broker.published(), vec![("cmnd/P/POWER0".to_string(), String::new())]);
    assert_eq!(
        drain(&mut events),
        vec![Outgoing::Status(NodeStatus::new(Fill::Green, Shape::Ring, "Online"))]
    );
}

#[test]
fn banana_is_rejected() {
    let (mut node, broker, mut events) = switch("plug");
    node.handle_input(InputMessage::new(None, json!("banana")));

    assert!(broker.published().is_empty());
    assert_eq!(
        drain(&mut events),
        vec![Outgoing::Warn {
            text: "Invalid payload received on input".into()
        }]
    );
}

#[test]
fn offline_device_shows_lwt_instead_of_state() {
    let (mut node, _broker, mut events) = switch("plug");
    node.handle_mqtt(mqtt("tele/P/LWT", "Online"));
    node.handle_mqtt(mqtt("tele/P/LWT", "Offline"));
    drain(&mut events);

    node.handle_mqtt(mqtt("stat/P/POWER", "ON"));
    assert_eq!(
        drain(&mut events),
        vec![
            Outgoing::Status(NodeStatus::new(Fill::Red, Shape::Ring, "Offline")),
            Outgoing::Send {
                outputs: vec![Some(OutputMessage {
                    topic: "switch1".into(),
                    payload: true,
                })]
            },
        ]
    );
}

#[tokio::test]
async fn close_waits_for_disconnect_and_keeps_lwt() {
    let (mut node, _broker, mut events) = switch("plug");
    node.handle_mqtt(mqtt("tele/P/LWT", "Online"));
    drain(&mut events);

    let (done, ack) = oneshot::channel();
    node.close(done);
    ack.await.unwrap();

    node.handle_mqtt(MqttEvent::BrokerDisconnected);
    assert!(drain(&mut events).is_empty());

    node.handle_mqtt(mqtt("tele/P/LWT", "Offline"));
    assert_eq!(node.tracker().state(), AvailabilityState::Offline);
    assert_eq!(
        drain(&mut events),
        vec![Outgoing::Status(NodeStatus::new(Fill::Red, Shape::Ring, "Offline"))]
    );
}

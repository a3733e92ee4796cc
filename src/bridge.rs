//! Stand-in for the flow host: JSON lines on stdin are node inputs, node
//! events are written to stdout as JSON lines.
use crate::config::{BrokerConfig, Config, DeviceConfig};
use crate::flow::{InputMessage, Outgoing};
use crate::mqtt::Connection;
use crate::switch::SwitchController;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

/// Input line: `{"node": "kitchen", "topic": "switch2", "payload": "on"}`
#[derive(Deserialize, Debug)]
pub struct InputLine {
    pub node: String,
    #[serde(flatten)]
    pub message: InputMessage,
}

#[derive(Serialize)]
struct EventLine<'a> {
    node: &'a str,
    #[serde(flatten)]
    event: &'a Outgoing,
}

pub fn parse_line(line: &str) -> anyhow::Result<InputLine> {
    Ok(serde_json::from_str(line)?)
}

pub fn format_event(node: &str, event: &Outgoing) -> anyhow::Result<String> {
    Ok(serde_json::to_string(&EventLine { node, event })?)
}

fn forward(node: &str, events: &mut mpsc::UnboundedReceiver<Outgoing>, lines: &mpsc::UnboundedSender<String>) {
    while let Ok(event) = events.try_recv() {
        match format_event(node, &event) {
            Ok(line) => {
                if lines.send(line).is_err() {
                    warn!("Output writer is gone");
                }
            }
            Err(err) => error!("Unable to serialize {:?}: {}", event, err),
        }
    }
}

/// Drive a single switch node until its input queue closes, then close it
/// and wait for the broker disconnect.
#[tracing::instrument(skip_all, fields(node = %name))]
async fn run_node(
    name: String,
    config: DeviceConfig,
    broker: BrokerConfig,
    client_id: String,
    mut inputs: mpsc::Receiver<InputMessage>,
    lines: mpsc::UnboundedSender<String>,
) {
    let (connection, mut mqtt) = Connection::connect(&client_id, &broker);
    let (host, mut events) = mpsc::unbounded_channel();
    let mut node = SwitchController::node(&config, connection, host);
    info!("Node started for device {}", config.device);

    loop {
        tokio::select! {
            Some(event) = mqtt.recv() => node.handle_mqtt(event),
            input = inputs.recv() => match input {
                Some(msg) => node.handle_input(msg),
                None => break,
            },
        }
        forward(&name, &mut events, &lines);
    }

    let (done, mut ack) = oneshot::channel();
    node.close(done);
    // Keep consuming events, a final LWT may still arrive.
    loop {
        tokio::select! {
            _ = &mut ack => break,
            Some(event) = mqtt.recv() => node.handle_mqtt(event),
        }
        forward(&name, &mut events, &lines);
    }
    forward(&name, &mut events, &lines);
    info!("Node closed");
}

async fn writer(mut lines: mpsc::UnboundedReceiver<String>) -> anyhow::Result<()> {
    let mut stdout = tokio::io::stdout();
    while let Some(line) = lines.recv().await {
        stdout.write_all(line.as_bytes()).await?;
        stdout.write_all(b"\n").await?;
        stdout.flush().await?;
    }
    Ok(())
}

async fn read_inputs(nodes: &HashMap<String, mpsc::Sender<InputMessage>>) -> anyhow::Result<()> {
    let mut stdin = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = stdin.next_line().await? {
        if line.trim().is_empty() {
            continue;
        }
        let input = match parse_line(&line) {
            Ok(input) => input,
            Err(err) => {
                warn!("Skipping invalid input line '{}': {}", line, err);
                continue;
            }
        };
        let Some(node) = nodes.get(&input.node) else {
            warn!("Skipping input for unknown node {}", input.node);
            continue;
        };
        if node.send(input.message).await.is_err() {
            error!("Node {} is gone", input.node);
        }
    }
    info!("Input closed");
    Ok(())
}

/// Run every configured node until stdin closes or the process is
/// interrupted.
pub async fn run(config: Config, client_prefix: &str) -> anyhow::Result<()> {
    let (lines_tx, lines_rx) = mpsc::unbounded_channel();
    let writer_handle = tokio::spawn(writer(lines_rx));

    let mut nodes = HashMap::new();
    let mut tasks: Vec<JoinHandle<()>> = vec![];
    for (name, device) in config.devices {
        let Some(broker) = config.brokers.get(&device.broker) else {
            anyhow::bail!("Device {} refers to unknown broker {}", name, device.broker);
        };
        let (tx, rx) = mpsc::channel(16);
        let client_id = format!("{}-{}", client_prefix, name);
        tasks.push(tokio::spawn(run_node(
            name.clone(),
            device,
            broker.clone(),
            client_id,
            rx,
            lines_tx.clone(),
        )));
        nodes.insert(name, tx);
    }
    info!("{} node(s) started", tasks.len());

    tokio::select! {
        result = read_inputs(&nodes) => result?,
        _ = tokio::signal::ctrl_c() => info!("Interrupted"),
    }

    // Closing the input queues starts the shutdown of every node.
    drop(nodes);
    for task in tasks {
        task.await?;
    }
    drop(lines_tx);
    writer_handle.await??;
    info!("All nodes closed");
    Ok(())
}

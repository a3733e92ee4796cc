//! Device availability driven by the Tasmota LWT topic, and the status
//! rendering rule shared by all device nodes.
use crate::consts::{LWT_OFFLINE, LWT_ONLINE};
use crate::flow::{HostSender, Outgoing};
use crate::status::{Fill, NodeStatus, Shape};
use tracing::{debug, info, warn};

#[derive(Copy, Clone, Eq, PartialEq, Debug, Default)]
pub enum AvailabilityState {
    Online,
    #[default]
    Offline,
}

/// Hooks a device variant gets called on availability changes.
pub trait DeviceLifecycle {
    fn on_device_online(&mut self) {}
    fn on_device_offline(&mut self) {}
}

pub struct AvailabilityTracker {
    state: AvailabilityState,
    /// Raw payload of the last LWT message.
    last_lwt: String,
    closing: bool,
    host: HostSender,
}

impl AvailabilityTracker {
    pub fn new(host: HostSender) -> Self {
        Self {
            state: AvailabilityState::Offline,
            last_lwt: LWT_OFFLINE.to_string(),
            closing: false,
            host,
        }
    }

    pub fn state(&self) -> AvailabilityState {
        self.state
    }

    pub fn last_lwt(&self) -> &str {
        &self.last_lwt
    }

    pub fn is_closing(&self) -> bool {
        self.closing
    }

    /// LWT message received. Only the exact `Online` payload means online.
    pub fn handle_lwt(&mut self, payload: &str, device: &mut dyn DeviceLifecycle) {
        self.last_lwt = payload.to_string();
        if payload == LWT_ONLINE {
            info!("Device is online");
            self.state = AvailabilityState::Online;
            self.set_status(Fill::Green, payload, Some(Shape::Ring));
            device.on_device_online();
        } else {
            info!("Device is offline: '{}'", payload);
            self.state = AvailabilityState::Offline;
            self.set_status(Fill::Red, payload, Some(Shape::Ring));
            device.on_device_offline();
        }
    }

    /// Informational only, the LWT is most likely still offline at this point.
    pub fn broker_connected(&self) {
        self.set_status(Fill::Yellow, "Broker connected", Some(Shape::Ring));
    }

    /// Forces an offline indicator regardless of the LWT, unless closing. The
    /// availability state is left alone: the next LWT is authoritative.
    pub fn broker_disconnected(&self, device: &mut dyn DeviceLifecycle) {
        if self.closing {
            debug!("Broker disconnected while closing");
            return;
        }
        warn!("Broker disconnected");
        self.emit(NodeStatus::new(Fill::Red, Shape::Ring, "Broker disconnected"));
        device.on_device_offline();
    }

    pub fn begin_close(&mut self) {
        self.closing = true;
    }

    /// Apply the status rule: a requested status is shown only while online,
    /// otherwise the offline indicator with the last LWT text wins.
    pub fn render(&self, requested: NodeStatus) -> NodeStatus {
        match self.state {
            AvailabilityState::Online => requested,
            AvailabilityState::Offline => {
                let text = if self.last_lwt.is_empty() {
                    LWT_OFFLINE
                } else {
                    self.last_lwt.as_str()
                };
                NodeStatus::new(Fill::Red, Shape::Ring, text)
            }
        }
    }

    /// Request a node status. Shape defaults to a dot.
    pub fn set_status(&self, fill: Fill, text: &str, shape: Option<Shape>) {
        let requested = NodeStatus::new(fill, shape.unwrap_or_default(), text);
        self.emit(self.render(requested));
    }

    fn emit(&self, status: NodeStatus) {
        debug!("Status: {:?}", status);
        if self.host.send(Outgoing::Status(status)).is_err() {
            debug!("Host is gone, status dropped");
        }
    }
}

/// Software version
pub const GATE_VERSION: &str = env!("CARGO_PKG_VERSION");
pub const GATE_NAME: &str = "tasmota-gate";

/// LWT payloads published by Tasmota.
pub const LWT_ONLINE: &str = "Online";
pub const LWT_OFFLINE: &str = "Offline";
/// Last segment of the availability topic: tele/<device>/LWT
pub const LWT_COMMAND: &str = "LWT";

/// Tasmota relay command. `POWER<N>` addresses channel N, bare `POWER` is
/// channel 1 and `POWER0` addresses all channels at once.
pub const POWER_COMMAND: &str = "POWER";
/// Empty-payload command asking the device to report every relay state.
pub const POWER_REFRESH_COMMAND: &str = "POWER0";
/// Highest relay channel a Tasmota device reports.
pub const MAX_CHANNEL: u32 = 32;

/// Values of the POWER command.
pub const POWER_ON: &str = "ON";
pub const POWER_OFF: &str = "OFF";
pub const POWER_TOGGLE: &str = "TOGGLE";

/// Flow message topic prefix for a channel: switch<N>
pub const SWITCH_TOPIC_PREFIX: &str = "switch";

// Defaults of the device configuration.
pub const DEFAULT_FULL_TOPIC: &str = "%prefix%/%topic%/";
pub const DEFAULT_CMND_PREFIX: &str = "cmnd";
pub const DEFAULT_STAT_PREFIX: &str = "stat";
pub const DEFAULT_TELE_PREFIX: &str = "tele";
pub const DEFAULT_MQTT_PORT: u16 = 1883;
pub const DEFAULT_KEEP_ALIVE_SECS: u64 = 5;

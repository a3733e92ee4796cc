use clap::Parser;
use tasmota_gate::bridge;
use tasmota_gate::config::Config;
use tasmota_gate::consts;
use tracing::info;
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::{fmt, EnvFilter};

#[derive(Parser, Debug)]
#[command(version, about = "Bridge between a flow host and Tasmota devices over MQTT")]
struct Args {
    #[arg(long, default_value = "config.yaml")]
    config_path: String,

    /// MQTT client id prefix; each node connects as <prefix>-<node name>.
    #[arg(long, default_value = consts::GATE_NAME)]
    client_prefix: String,
}

fn init_log() -> anyhow::Result<()> {
    let timer = fmt::time::ChronoLocal::new("%H:%M:%S%.3f".to_string());

    // Configure a custom event formatter
    let format = fmt::format()
        .with_level(true)
        .with_target(false)
        .with_thread_ids(false)
        .with_thread_names(false)
        .with_file(false)
        .with_source_location(true)
        .with_timer(timer)
        .compact();

    let filter = EnvFilter::builder()
        .with_default_directive(LevelFilter::DEBUG.into())
        .from_env()?
        .add_directive("rumqttc=info".parse()?);

    // Stdout carries the node events.
    fmt()
        .event_format(format)
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_log()?;
    let args = Args::parse();

    let config = Config::from_file(&args.config_path)?;
    info!(
        "Starting {} {}. Args: {:?} Devices: {:?}",
        consts::GATE_NAME,
        consts::GATE_VERSION,
        args,
        config.devices.keys().collect::<Vec<_>>()
    );

    bridge::run(config, &args.client_prefix).await
}

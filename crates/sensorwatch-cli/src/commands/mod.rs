pub mod monitor;
pub mod serve;
pub mod watch;

use std::path::PathBuf;

use clap::Args;
use sensorwatch_core::{ConfigError, MonitorConfig, MqttTransport, Pipeline, TransportError};

/// Settings shared by every subcommand. Flags win over `SENSORWATCH_*`
/// environment variables, which win over the config file.
#[derive(Args, Debug, Default)]
pub struct Settings {
    /// JSON config file
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// MQTT broker host
    #[arg(long, global = true)]
    broker: Option<String>,

    /// MQTT broker port
    #[arg(long, global = true)]
    port: Option<u16>,

    /// Topic the sensor publishes to
    #[arg(long, global = true)]
    topic: Option<String>,

    /// Seconds between chart refreshes
    #[arg(long, global = true)]
    interval: Option<f64>,

    /// Number of samples kept in the window
    #[arg(long, global = true)]
    max_points: Option<usize>,
}

impl Settings {
    /// Layer defaults, file, environment and flags into a validated config.
    pub fn resolve(&self) -> Result<MonitorConfig, ConfigError> {
        self.resolve_with_env(|key| std::env::var(key).ok())
    }

    fn resolve_with_env<F>(&self, lookup: F) -> Result<MonitorConfig, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = match &self.config {
            Some(path) => MonitorConfig::load_from_path(path)?,
            None => MonitorConfig::default(),
        };
        config.apply_env_from(lookup)?;

        if let Some(broker) = &self.broker {
            config.broker_host = broker.clone();
        }
        if let Some(port) = self.port {
            config.broker_port = port;
        }
        if let Some(topic) = &self.topic {
            config.topic = topic.clone();
        }
        if let Some(interval) = self.interval {
            config.read_interval_secs = interval;
        }
        if let Some(max_points) = self.max_points {
            config.max_points = max_points;
        }

        config.validate()?;
        Ok(config)
    }
}

/// Connect to the broker, subscribe, and start ingesting.
pub fn start_pipeline(config: &MonitorConfig) -> Result<Pipeline<MqttTransport>, TransportError> {
    let transport = MqttTransport::connect(config)?;
    Pipeline::start(config, transport)
}

/// Print the startup banner shared by every subcommand.
pub fn print_banner(config: &MonitorConfig) {
    println!("sensorwatch v{}", sensorwatch_core::VERSION);
    println!(
        "   Connecting to MQTT broker at {}:{}...",
        config.broker_host, config.broker_port
    );
    println!("   Topic: {}", config.topic);
    println!(
        "   Refresh every {}s, keeping {} points",
        config.read_interval_secs, config.max_points
    );
}

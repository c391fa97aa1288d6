//! # sensorwatch-core
//!
//! **Live temperature and humidity from a single MQTT sensor.**
//!
//! `sensorwatch-core` ingests JSON readings published by a remote device, keeps a
//! bounded recent history in memory, and drives a periodic renderer over that
//! history.
//!
//! ## Quick Start
//!
//! ```no_run
//! use std::sync::atomic::AtomicBool;
//! use sensorwatch_core::{MonitorConfig, MqttTransport, Pipeline, RenderLoop};
//!
//! # struct Console;
//! # impl sensorwatch_core::ChartSink for Console {
//! #     fn waiting(&mut self) {}
//! #     fn render(&mut self, _: &sensorwatch_core::WindowSnapshot) -> std::io::Result<()> { Ok(()) }
//! # }
//! let config = MonitorConfig::default();
//! let transport = MqttTransport::connect(&config).expect("broker reachable");
//! let pipeline = Pipeline::start(&config, transport).expect("subscribed");
//!
//! let running = AtomicBool::new(true);
//! RenderLoop::new(config.read_interval()).run(pipeline.window(), &mut Console, &running);
//! pipeline.shutdown();
//! ```
//!
//! ## Architecture
//!
//! Broker → [`Transport`] → bounded queue → [`Ingestor`] → [`SampleWindow`] → [`RenderLoop`] → [`ChartSink`]
//!
//! The transport's network thread only forwards raw payloads. A single ingest
//! worker decodes them in arrival order and appends to the window. The render
//! loop never waits for data: each cycle it copies whatever the window holds and
//! hands the copy to the sink.

pub mod config;
pub mod ingest;
pub mod pipeline;
pub mod render;
pub mod sample;
pub mod transport;
pub mod window;

pub use config::{
    ConfigError, DEFAULT_BROKER_HOST, DEFAULT_BROKER_PORT, DEFAULT_TOPIC, MAX_READ_INTERVAL_SECS,
    MonitorConfig,
};
pub use ingest::{
    IngestError, IngestOutcome, IngestStats, Ingestor, PayloadSender, Reading, StatsSnapshot,
    channel, parse_payload, spawn_ingest_worker,
};
pub use pipeline::Pipeline;
pub use render::{ChartSink, RenderLoop, RenderOutcome, render_step};
pub use sample::Sample;
pub use transport::{MqttTransport, Transport, TransportError};
pub use window::{DEFAULT_MAX_POINTS, SampleWindow, WindowSnapshot};

/// Library version (from Cargo.toml).
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

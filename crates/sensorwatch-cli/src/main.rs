//! CLI for sensorwatch — live temperature and humidity from an MQTT sensor.

mod commands;
mod logging;
mod tui;

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "sensorwatch")]
#[command(about = "sensorwatch — live temperature and humidity from an MQTT sensor")]
#[command(version = sensorwatch_core::VERSION)]
struct Cli {
    #[command(flatten)]
    settings: commands::Settings,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Live dual-axis chart in the terminal (default)
    Monitor,

    /// Print a summary line every render cycle (pipe-friendly)
    Watch,

    /// Ingest in the background and serve the window over HTTP
    Serve {
        /// Bind address
        #[arg(long, default_value = "127.0.0.1")]
        host: String,

        /// Port to listen on
        #[arg(long, default_value = "8086")]
        http_port: u16,
    },
}

fn main() {
    let cli = Cli::parse();

    let config = match cli.settings.resolve() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error: {e}");
            std::process::exit(1);
        }
    };

    match cli.command.unwrap_or(Commands::Monitor) {
        Commands::Monitor => commands::monitor::run(&config),
        Commands::Watch => commands::watch::run(&config),
        Commands::Serve { host, http_port } => commands::serve::run(&config, &host, http_port),
    }
}

use std::sync::Arc;

use sensorwatch_core::MonitorConfig;
use sensorwatch_server::{AppState, run_server};

pub fn run(config: &MonitorConfig, host: &str, port: u16) {
    crate::logging::init_stderr();
    super::print_banner(config);

    let pipeline = match super::start_pipeline(config) {
        Ok(p) => p,
        Err(e) => {
            eprintln!("Error: {e}");
            std::process::exit(1);
        }
    };

    println!("   Serving on http://{host}:{port}  (Ctrl+C to stop)");
    println!("   Endpoints: /  /health  /api/v1/samples  /api/v1/latest");

    let state = AppState::new(
        Arc::clone(pipeline.window()),
        Arc::clone(pipeline.stats()),
        config.topic.clone(),
    );

    let rt = match tokio::runtime::Runtime::new() {
        Ok(rt) => rt,
        Err(e) => {
            eprintln!("Error starting async runtime: {e}");
            pipeline.shutdown();
            std::process::exit(1);
        }
    };

    let result = rt.block_on(run_server(state, host, port, async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            log::error!("failed to listen for Ctrl+C: {e}");
        }
        log::info!("shutting down");
    }));

    pipeline.shutdown();

    if let Err(e) = result {
        eprintln!("Server error: {e}");
        std::process::exit(1);
    }
}

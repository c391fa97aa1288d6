use sensorwatch_core::MonitorConfig;

use crate::logging::{CAPTURED_LINES, LogBuffer};
use crate::tui::app::App;

pub fn run(config: &MonitorConfig) {
    let logs = LogBuffer::new(CAPTURED_LINES);
    crate::logging::init_captured(logs.clone());
    super::print_banner(config);

    let pipeline = match super::start_pipeline(config) {
        Ok(p) => p,
        Err(e) => {
            eprintln!("Error: {e}");
            std::process::exit(1);
        }
    };

    let mut app = App::new(
        std::sync::Arc::clone(pipeline.window()),
        std::sync::Arc::clone(pipeline.stats()),
        logs,
        config,
    );
    let result = app.run();

    println!("Stopping MQTT client...");
    pipeline.shutdown();

    if let Err(e) = result {
        eprintln!("TUI error: {e}");
        std::process::exit(1);
    }
}

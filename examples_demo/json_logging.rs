use tracing::{error, info};
use tracing_log_format::init::{init_logging_with_config, LayerConfig};

fn main() {
    let config = LayerConfig {
        properties: vec!["correlation_id".to_string()],
        ..LayerConfig::default()
    };
    if let Err(e) = init_logging_with_config(config) {
        eprintln!("failed to initialize logging: {}", e);
        return;
    }

    info!("Hi there");

    match "injected error".parse::<u32>() {
        Ok(_) => {}
        Err(err) => error!(
            error = &err as &(dyn std::error::Error + 'static),
            correlation_id = "3f1c6a",
            "Includes exception stack"
        ),
    }
}

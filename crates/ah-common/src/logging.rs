//! Centralized logging initialization for all alert-history services.
//!
//! Controlled by two environment variables:
//! - `LOG_FORMAT`: `json` or `text` (default: `text`)
//! - `RUST_LOG`: standard tracing env-filter syntax (default: `info`)

use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Initialize global tracing subscriber for the given service.
pub fn init_logging(service_name: &str) {
    let format = std::env::var("LOG_FORMAT").unwrap_or_else(|_| "text".to_string());

    match format.as_str() {
        "json" => init_json_logging(service_name),
        _ => init_text_logging(service_name),
    }
}

fn env_filter() -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
}

fn init_json_logging(service_name: &str) {
    let filter = env_filter();

    tracing_subscriber::registry()
        .with(filter)
        .with(
            fmt::layer()
                .json()
                .with_current_span(true)
                .with_span_list(true)
                .with_target(true),
        )
        .init();

    tracing::info!(service = service_name, format = "json", "Logging initialized");
}

fn init_text_logging(service_name: &str) {
    let filter = env_filter();

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(true).with_thread_ids(false))
        .init();

    tracing::info!(service = service_name, format = "text", "Logging initialized");
}

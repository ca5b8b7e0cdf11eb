use std::sync::Arc;

use tracing::info;

use feedwatch::notify::NotificationHistory;
use feedwatch::poll::PollService;
use feedwatch::sched::PollScheduler;
use feedwatch::{Config, Database};

#[tokio::main]
async fn main() {
    // Load configuration
    let config = match Config::load_with_env("config.toml") {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Failed to load config.toml: {e}");
            eprintln!("Using default configuration.");
            Config::default()
        }
    };

    if let Err(e) = config.validate() {
        eprintln!("Invalid configuration: {e}");
        std::process::exit(1);
    }

    // Initialize logging
    if let Err(e) = feedwatch::logging::init(&config.logging) {
        eprintln!("Failed to initialize logging: {e}");
        // Fall back to console-only logging
        feedwatch::logging::init_console_only(&config.logging.level);
    }

    info!("feedwatch - feed and timeline polling pipeline");

    let db = match Database::connect(&config.database.path).await {
        Ok(db) => Arc::new(db),
        Err(e) => {
            eprintln!("Failed to open database: {e}");
            std::process::exit(1);
        }
    };

    let history = Arc::new(NotificationHistory::new(config.notify.history_cap));
    let service = match PollService::new(db.clone(), &config, history) {
        Ok(service) => Arc::new(service),
        Err(e) => {
            eprintln!("Failed to build poll service: {e}");
            std::process::exit(1);
        }
    };

    let scheduler = PollScheduler::new(db, service, config.poll.clone());
    if let Err(e) = scheduler.start(config.poll.base_interval_mins).await {
        eprintln!("Failed to start scheduler: {e}");
        std::process::exit(1);
    }

    // Run until interrupted
    if let Err(e) = tokio::signal::ctrl_c().await {
        eprintln!("Failed to wait for shutdown signal: {e}");
    }

    info!("Shutting down");
    scheduler.stop();
}

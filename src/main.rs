use clap::error::ErrorKind;
use log::{error, info};
use std::sync::Arc;
use tcptap::configuration::Config;
use tcptap::network::NetworkListener;

#[tokio::main]
async fn main() {
    env_logger::Builder::from_default_env()
        .filter_level(log::LevelFilter::Info)
        .format_target(false)
        .init();

    let config = match Config::from_args() {
        Ok(config) => config,
        Err(e) => {
            let _ = e.print();
            let status = match e.kind() {
                ErrorKind::DisplayHelp | ErrorKind::DisplayVersion => 0,
                _ => 1,
            };
            std::process::exit(status);
        }
    };

    if let Err(e) = config.validate() {
        error!("Invalid configuration: {}", e);
        std::process::exit(1);
    }

    info!(
        "tcptap v{}: logs are written to {}",
        env!("CARGO_PKG_VERSION"),
        config.log_dir.display()
    );

    let listener = NetworkListener::bind(Arc::new(config))
        .await
        .unwrap_or_else(|e| {
            error!("{}", e);
            std::process::exit(1);
        });

    // Only a fatal session error ends the accept loop.
    if let Err(e) = listener.run().await {
        error!("{}, exiting...", e);
        std::process::exit(1);
    }
}

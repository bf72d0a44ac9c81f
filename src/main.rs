use std::error::Error;
use std::sync::Arc;

use live_poll::backend::Backends;
use live_poll::bus::FanoutBus;
use live_poll::config::Config;
use live_poll::db::Database;
use live_poll::http::{AppState, router};
use log::{error, info};

async fn run(config: Config) -> Result<(), Box<dyn Error + Send + Sync>> {
    let database = Arc::new(Database::new(&config.database_url).await?);
    let backends = Backends::from_config(&config, database).await?;
    let bus = Arc::new(FanoutBus::new(config.bus_capacity));

    let state = Arc::new(AppState::new(
        backends.catalog,
        backends.ledger,
        backends.scores,
        bus,
    ));
    let app = router(state);

    let listener = tokio::net::TcpListener::bind(&config.bind_addr).await?;
    info!("Listening on {}", config.bind_addr);
    axum::serve(listener, app).await?;

    Ok(())
}

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();
    env_logger::init();

    let config = Config::from_env();

    if let Err(e) = run(config).await {
        error!("Server error: {}", e);
        std::process::exit(1);
    }
}

use anyhow::Result;
use std::sync::Arc;
use tracing::{error, info, warn};
use vtc_api::{axum_http::http_serve, config::config_loader};
use vtc_core::infra::db::postgres::postgres_connection;

#[tokio::main]
async fn main() {
    if let Err(error) = run().await {
        error!("Backend exited with error: {:#}", error);
        std::process::exit(1);
    }
}

async fn run() -> Result<()> {
    dotenvy::dotenv().ok();
    vtc_core::observability::init_observability("vtc-api")?;

    let dotenvy_env = config_loader::load()?;
    info!("ENV has been loaded");

    let postgres_pool = match dotenvy_env.database.url.as_deref() {
        Some(database_url) => {
            let pool = postgres_connection::establish_connection(database_url);
            info!(
                database = %postgres_connection::redact_database_url(database_url),
                "Postgres pool has been created"
            );
            Some(Arc::new(pool))
        }
        None => {
            warn!("DATABASE_URL is not set, payment records will not be persisted");
            None
        }
    };

    http_serve::start(Arc::new(dotenvy_env), postgres_pool).await?;

    Ok(())
}

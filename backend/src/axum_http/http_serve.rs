use crate::{
    axum_http::{default_routers, routers},
    config::config_model::DotEnvyConfig,
    usecases::payments::PaymentUseCase,
};
use anyhow::{Context, Result};
use axum::{
    Router,
    http::{
        Method,
        header::{AUTHORIZATION, CONTENT_TYPE},
    },
    routing::get,
};
use std::{net::SocketAddr, sync::Arc, time::Duration};
use tokio::net::TcpListener;
use tower_http::{
    cors::{Any, CorsLayer},
    limit::RequestBodyLimitLayer,
    timeout::TimeoutLayer,
    trace::TraceLayer,
};
use tracing::{error, info, warn};
use vtc_core::{
    infra::db::{postgres::postgres_connection::PgPoolSquad, repositories::payments::PaymentPostgres},
    payments::stripe_client::StripeClient,
};

pub async fn start(config: Arc<DotEnvyConfig>, db_pool: Option<Arc<PgPoolSquad>>) -> Result<()> {
    let payment_repository = PaymentPostgres::new(db_pool);
    let stripe_client = StripeClient::new(
        config.stripe.secret_key.clone(),
        config.stripe.webhook_secret.clone(),
    )
    .with_api_base(config.stripe.api_base.clone())
    .with_webhook_tolerance(config.stripe.webhook_tolerance_secs);

    if !stripe_client.payments_enabled() {
        warn!("STRIPE_SECRET_KEY is not set, payment intents are disabled");
    }
    if !stripe_client.webhooks_enabled() {
        warn!("STRIPE_WEBHOOK_SECRET is not set, webhooks will be acknowledged but ignored");
    }

    let payments_usecase =
        PaymentUseCase::new(Arc::new(payment_repository), Arc::new(stripe_client));

    let app = build_app(
        &config,
        routers::payments::routes(Arc::new(payments_usecase)),
    )?;

    let addr = SocketAddr::from(([0, 0, 0, 0], config.backend_server.port));
    let listener = TcpListener::bind(addr).await?;

    info!("Server is running on port {}", config.backend_server.port);
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

pub fn build_app(config: &DotEnvyConfig, payments_router: Router) -> Result<Router> {
    let body_limit: usize = config
        .backend_server
        .body_limit
        .checked_mul(1024 * 1024)
        .and_then(|bytes| usize::try_from(bytes).ok())
        .context("SERVER_BODY_LIMIT is too large")?;

    let app = Router::new()
        .fallback(default_routers::not_found)
        .route("/", get(default_routers::root))
        .route("/api/health-check", get(default_routers::health_check))
        .nest("/api/payments", payments_router)
        .layer(TimeoutLayer::new(Duration::from_secs(
            config.backend_server.timeout,
        )))
        .layer(RequestBodyLimitLayer::new(body_limit))
        .layer(
            CorsLayer::new()
                .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
                .allow_headers([AUTHORIZATION, CONTENT_TYPE])
                .allow_origin(Any),
        )
        .layer(TraceLayer::new_for_http());

    Ok(app)
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            error!(error = %err, "Failed to install CTRL+C signal handler");
            std::future::pending::<()>().await;
        }
    };

    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received ctrl+C signal"),
        _ = terminate => info!("Received terminate signal"),
    }
}

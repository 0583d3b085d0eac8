use std::sync::Arc;

use dental_scheduler::{
    config::Config,
    db,
    identity::PgIdentityProvider,
    models::AppState,
    routes,
    scheduling::SchedulingEngine,
    store::PgAppointmentStore,
};

use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use axum::http::header;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("info".parse()?))
        .init();

    let cfg = Config::from_env()?;
    let pool = db::connect_pg(&cfg.database_url, cfg.db_max_connections).await?;
    if cfg.run_migrations {
        db::migrate(&pool).await?;
    }

    let store = Arc::new(PgAppointmentStore::new(pool.clone()));
    let state = AppState {
        engine: Arc::new(SchedulingEngine::new(store, cfg.default_timezone)),
        identity: Arc::new(PgIdentityProvider::new(pool)),
    };

    // Browser clients of the front desk call the API cross-origin.
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers([
            header::CONTENT_TYPE,
            header::AUTHORIZATION,
            header::ACCEPT,
        ]);

    let app = routes::router(state)
        .layer(cors)
        .layer(TraceLayer::new_for_http());

    tracing::info!(
        "Listening on http://{} (default timezone {})",
        cfg.bind_addr,
        cfg.default_timezone.name()
    );
    let listener = tokio::net::TcpListener::bind(&cfg.bind_addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!("failed to listen for ctrl-c: {e}");
        std::future::pending::<()>().await;
    }
    tracing::info!("shutting down");
}

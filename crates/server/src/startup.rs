use std::{net::SocketAddr, sync::Arc, time::Duration};

use axum::Router;
use common::utils::logging::init_logging_from_env;
use configs::AppConfig;
use dotenvy::dotenv;
use migration::{Migrator, MigratorTrait};
use tower_http::cors::CorsLayer;
use tracing::info;

use crate::routes::{self, auth};
use service::reviews::repo::seaorm::SeaOrmReviewRepository;
use service::reviews::ReviewService;
use service::storage;
use service::uploads::UploadLimits;

fn build_cors() -> CorsLayer {
    CorsLayer::very_permissive()
}

fn bind_addr(cfg: &AppConfig) -> anyhow::Result<SocketAddr> {
    Ok(format!("{}:{}", cfg.server.host, cfg.server.port).parse()?)
}

/// Wire the review pipeline from configuration: database, object store, service.
pub async fn build_state(cfg: &AppConfig) -> anyhow::Result<auth::ServerState> {
    let db = models::db::connect_with_config(&models::db::DatabaseConfig::from(&cfg.database)).await?;
    if cfg.database.auto_migrate {
        Migrator::up(&db, None).await?;
        info!("database migrations applied");
    }

    let store = storage::from_config(&cfg.storage).await?;
    let repo = Arc::new(SeaOrmReviewRepository { db });
    let reviews = ReviewService::new(
        repo,
        store,
        UploadLimits::from(&cfg.uploads),
        Duration::from_secs(cfg.storage.operation_timeout_secs),
    );

    Ok(auth::ServerState {
        reviews: Arc::new(reviews),
        auth: auth::ServerAuthConfig { jwt_secret: cfg.auth.jwt_secret.clone() },
    })
}

/// Public entry: build the app and run the HTTP server until `shutdown` resolves.
pub async fn run_until<F>(shutdown: F) -> anyhow::Result<()>
where
    F: std::future::Future<Output = ()> + Send + 'static,
{
    dotenv().ok();
    init_logging_from_env();

    let cfg = AppConfig::load_or_env()?;
    let state = build_state(&cfg).await?;
    let app: Router = routes::build_router(state, build_cors());

    let addr = bind_addr(&cfg)?;
    info!(%addr, backend = ?cfg.storage.backend, "starting review server");
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).with_graceful_shutdown(shutdown).await?;
    info!("review server stopped");
    Ok(())
}

pub async fn run() -> anyhow::Result<()> {
    run_until(async {
        let _ = tokio::signal::ctrl_c().await;
    })
    .await
}

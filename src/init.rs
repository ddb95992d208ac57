use std::{str::FromStr, sync::Arc};

use axum::{
    routing::{get, post},
    Router,
};
use sqlx::{
    sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions},
    Pool, Sqlite,
};
use tokio::{net::TcpListener, signal};
use tower_http::trace::TraceLayer;

use crate::{config::Config, error::AppError, routes, Data};

pub async fn init_database(config: &Config) -> anyhow::Result<Pool<Sqlite>> {
    tracing::info!("initializing database connection...");
    let opts = SqliteConnectOptions::from_str(&config.database_url)?
        .journal_mode(SqliteJournalMode::Wal)
        .foreign_keys(true)
        .create_if_missing(true);
    let db = SqlitePoolOptions::new()
        .max_connections(config.max_connections)
        .connect_with(opts)
        .await
        .inspect_err(|e| tracing::error!(err = ?e, "an error occurred when connecting to database"))?;

    run_migrations(&db).await?;

    Ok(db)
}

async fn run_migrations(db: &Pool<Sqlite>) -> Result<(), AppError> {
    tracing::info!("running migrations...");
    sqlx::migrate!("./migrations")
        .run(db)
        .await
        .inspect_err(|e| tracing::error!(err = ?e, "an error occurred when running migrations"))?;
    tracing::info!("finished running migrations!");

    Ok(())
}

pub async fn init(config: Config) -> anyhow::Result<Data> {
    tracing::info!("initializing quotebook...");

    let db = init_database(&config).await?;

    Ok(Data {
        db,
        config: Arc::new(config),
    })
}

pub fn router(data: Data) -> Router {
    Router::new()
        .route("/", get(routes::random_quote))
        .route("/top", get(routes::top_quotes))
        .route("/top/", get(routes::top_quotes))
        .route("/quote/:id/react", post(routes::react))
        .route("/quote/:id/react/", post(routes::react))
        .route("/status", get(routes::status))
        .route("/health", get(routes::health))
        .layer(TraceLayer::new_for_http())
        .with_state(data)
}

pub async fn serve(data: Data) -> anyhow::Result<()> {
    let address = data.config.listen_address();
    let app = router(data);

    tracing::info!("binding to {address}");
    let listener = TcpListener::bind(&address)
        .await
        .inspect_err(|e| tracing::error!(err = ?e, address = %address, "an error occurred when binding"))?;

    tracing::info!("finished initializing! serving quotes on {address}");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("server shut down");

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!(err = ?e, "an error occurred when installing the ctrl+c handler");
            std::future::pending::<()>().await;
        }

        tracing::info!("received ctrl+c, shutting down");
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut terminate) => {
                terminate.recv().await;
                tracing::info!("received terminate signal, shutting down");
            }
            Err(e) => {
                tracing::error!(err = ?e, "an error occurred when installing the signal handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}

/// Fresh in-memory store with the schema applied. A single connection keeps every query on
/// the same database.
#[cfg(test)]
pub async fn test_pool() -> Pool<Sqlite> {
    let opts = SqliteConnectOptions::from_str("sqlite::memory:")
        .unwrap()
        .foreign_keys(true);
    let db = SqlitePoolOptions::new()
        .max_connections(1)
        .idle_timeout(None)
        .max_lifetime(None)
        .connect_with(opts)
        .await
        .unwrap();

    run_migrations(&db).await.unwrap();

    db
}

/// File-backed WAL store set up exactly like the served one, for tests that need several
/// connections writing at once. Remove it with [`drop_file_pool`].
#[cfg(test)]
pub async fn file_pool(max_connections: u32) -> (Pool<Sqlite>, std::path::PathBuf) {
    let path = std::env::temp_dir().join(format!("quotebook-{}.db", uuid::Uuid::new_v4()));
    let config = Config {
        database_url: format!("sqlite://{}", path.display()),
        max_connections,
        ..Config::for_tests()
    };

    let db = init_database(&config).await.unwrap();

    (db, path)
}

#[cfg(test)]
pub async fn drop_file_pool(db: Pool<Sqlite>, path: std::path::PathBuf) {
    db.close().await;

    for suffix in ["", "-wal", "-shm"] {
        let mut file = path.clone().into_os_string();
        file.push(suffix);
        let _ = std::fs::remove_file(file);
    }
}

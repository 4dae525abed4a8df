use axum::{
    routing::get,
    Router,
};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::sync::Mutex;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use crate::storage::SqliteStore;

pub mod error;
pub mod extract;
pub mod routes;

/// Server state
///
/// One connection serves every request; SQLite serializes writers anyway.
pub struct AppState {
    pub store: Mutex<SqliteStore>,
}

pub type SharedState = Arc<AppState>;

impl AppState {
    pub fn new(store: SqliteStore) -> SharedState {
        Arc::new(Self { store: Mutex::new(store) })
    }
}

/// HTTP listener settings
#[derive(Debug, Clone)]
pub struct ServerOptions {
    pub addr: SocketAddr,
    pub cors_permissive: bool,
}

/// Resource routes, mounted at the root and under `/api`
fn api_routes() -> Router<SharedState> {
    Router::new()
        .route("/counties", get(routes::list_counties).post(routes::create_county))
        .route(
            "/counties/{id}",
            get(routes::show_county).put(routes::update_county).delete(routes::delete_county),
        )
        .route("/places", get(routes::list_places).post(routes::create_place))
        .route(
            "/places/{id}",
            get(routes::show_place).put(routes::update_place).delete(routes::delete_place),
        )
        .route("/postal-codes", get(routes::list_postal_codes).post(routes::create_postal_code))
        .route(
            "/postal-codes/{id}",
            get(routes::show_postal_code)
                .put(routes::update_postal_code)
                .delete(routes::delete_postal_code),
        )
}

pub fn router(state: SharedState, cors_permissive: bool) -> Router {
    let app = Router::new()
        .route("/health", get(routes::health))
        .merge(api_routes())
        .nest("/api", api_routes())
        .layer(TraceLayer::new_for_http());

    let app = if cors_permissive {
        app.layer(CorsLayer::permissive())
    } else {
        app
    };

    app.with_state(state)
}

pub async fn start_server(options: ServerOptions, store: SqliteStore) -> anyhow::Result<()> {
    let app = router(AppState::new(store), options.cors_permissive);

    tracing::info!("Starting server on {}", options.addr);

    let listener = tokio::net::TcpListener::bind(options.addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
    }
}

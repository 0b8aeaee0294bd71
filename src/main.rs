use gatehouse::config::{CONNECTION_TARGET_VAR, ServerConfig};
use gatehouse::{routes, state};

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt::init();

    let config = ServerConfig::from_env();
    if config.database.target.is_none() {
        tracing::warn!("{CONNECTION_TARGET_VAR} not defined in .env file");
    }

    // The database is connected lazily by the first request that needs it.
    let state = state::AppState::from_config(&config);

    let app = routes::app(state);
    let port = config.port;
    let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{port}"))
        .await
        .expect("failed to bind");

    tracing::info!(%port, "gatehouse listening");
    axum::serve(listener, app).await.expect("server failed");
}

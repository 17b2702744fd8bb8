use axum::Router;
use sqlx::sqlite::SqlitePoolOptions;
use stemchat::{AppState, chat, config::Config};
use tower_sessions::{MemoryStore, SessionManagerLayer, cookie::SameSite};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let config = Config::from_env();

    let session_store = MemoryStore::default();
    let session_layer = SessionManagerLayer::new(session_store)
        .with_secure(false)
        .with_same_site(SameSite::Lax);

    let db_pool = SqlitePoolOptions::new()
        .max_connections(16)
        .connect(&config.database_url)
        .await
        .unwrap();
    chat::store::init_schema(&db_pool).await.unwrap();
    chat::store::ensure_admin(&db_pool, &config.admin_username)
        .await
        .unwrap();

    let hub = chat::Hub::new();
    let presence = chat::Presence::new(hub.clone());
    let app_state = AppState {
        db_pool,
        hub,
        presence,
    };

    let app = Router::new()
        .nest("/chat", chat::router())
        .with_state(app_state)
        .layer(session_layer);

    let addr = config.bind_address();
    tracing::info!(%addr, "stemchat listening");
    let listener = tokio::net::TcpListener::bind(&addr).await.unwrap();
    axum::serve(listener, app).await.unwrap();
}

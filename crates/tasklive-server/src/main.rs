use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use axum::http::{HeaderValue, Method, header};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::info;

use tasklive_api::auth::{AppState, AppStateInner};
use tasklive_gateway::dispatcher::Dispatcher;
use tasklive_server::router;

struct Config {
    jwt_secret: String,
    /// Token lifetime; the revocation-entry TTL is the same constant.
    token_ttl: chrono::Duration,
    db_path: String,
    host: String,
    port: u16,
    allowed_origin: String,
}

impl Config {
    fn from_env() -> anyhow::Result<Self> {
        let jwt_secret = std::env::var("TASKLIVE_JWT_SECRET")
            .unwrap_or_else(|_| "dev-secret-change-me".into());
        let token_ttl_secs: i64 = std::env::var("TASKLIVE_TOKEN_TTL_SECS")
            .unwrap_or_else(|_| "3600".into())
            .parse()?;
        let db_path = std::env::var("TASKLIVE_DB_PATH").unwrap_or_else(|_| "tasklive.db".into());
        let host = std::env::var("TASKLIVE_HOST").unwrap_or_else(|_| "0.0.0.0".into());
        let port: u16 = std::env::var("TASKLIVE_PORT")
            .unwrap_or_else(|_| "3000".into())
            .parse()?;
        let allowed_origin = std::env::var("TASKLIVE_ALLOWED_ORIGIN")
            .unwrap_or_else(|_| "http://localhost:4200".into());

        Ok(Self {
            jwt_secret,
            token_ttl: chrono::Duration::seconds(token_ttl_secs),
            db_path,
            host,
            port,
            allowed_origin,
        })
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present
    let _ = dotenvy::dotenv();

    // Init logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "tasklive=debug,tower_http=debug".into()),
        )
        .init();

    let config = Config::from_env()?;

    // Init database
    let db = tasklive_db::Database::open(&PathBuf::from(&config.db_path))?;

    // Shared state
    let dispatcher = Dispatcher::new();
    let state: AppState = Arc::new(AppStateInner {
        db,
        jwt_secret: config.jwt_secret.clone(),
        token_ttl: config.token_ttl,
        dispatcher,
    });

    let cors = CorsLayer::new()
        .allow_origin(config.allowed_origin.parse::<HeaderValue>()?)
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE]);

    let app = router(state).layer(cors).layer(TraceLayer::new_for_http());

    let addr: SocketAddr = format!("{}:{}", config.host, config.port).parse()?;
    info!("tasklive server listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

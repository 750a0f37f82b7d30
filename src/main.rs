use advisory_backend::{
    config::Config,
    database::{memory::MemoryStore, pool::create_pool, postgres::PgStore},
    middleware::cors::api_cors,
    routes,
    services::{email_service::HttpEmailSender, storage_service::LocalBlobStorage},
    AppState,
};
use reqwest::Client;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::{services::ServeDir, trace::TraceLayer};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info,sqlx=warn"));
    let json = std::env::var("LOG_FORMAT").is_ok_and(|v| v.eq_ignore_ascii_case("json"));
    if json {
        tracing_subscriber::fmt().with_env_filter(filter).json().init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::from_env()?;
    init_tracing();

    tokio::fs::create_dir_all(&config.uploads_dir).await?;
    let blobs = Arc::new(LocalBlobStorage::new(&config.uploads_dir, config.public_base_url.clone()));

    let http_client = Client::builder().timeout(config.email.timeout).build()?;
    let mailer = Arc::new(HttpEmailSender::new(http_client, config.email.clone()));

    let uploads_dir = config.uploads_dir.clone();
    let addr: SocketAddr = config.server_address.parse()?;

    let app_state = if config.database_url.is_some() {
        let pool = create_pool(&config).await?;
        sqlx::migrate!("./migrations").run(&pool).await?;

        let store = Arc::new(PgStore::new(pool));
        store.spawn_change_listener().await?;
        info!("Using PostgreSQL store");
        AppState::new(config, store, blobs, mailer).await?
    } else {
        warn!("DATABASE_URL is not set; data is kept in memory and lost on restart");
        AppState::new(config, Arc::new(MemoryStore::new()), blobs, mailer).await?
    };

    info!("Serving uploads from: {}", uploads_dir.display());
    let app = routes::router(app_state)
        .nest_service("/uploads", ServeDir::new(uploads_dir))
        .layer(api_cors())
        .layer(TraceLayer::new_for_http());

    info!("Server listening on {}", addr);
    let listener = TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

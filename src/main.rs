use asset_ledger::{
    api::{self, AppState, HOST_IDENTITY},
    config::Config,
    dispatch::Chaincode,
    schema::SchemaRegistry,
    stub::MemoryLedger,
};
use axum::{routing::{get, post}, Router};
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tracing::info;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    info!("Asset ledger {} starting...", env!("CARGO_PKG_VERSION"));
    let config = Config::from_env();

    // Schema conflicts are configuration errors: refuse to start.
    let registry = SchemaRegistry::standard(config.address_key_attempts)?;
    info!("Registered types: {:?}", registry.type_names());

    let ledger = match &config.db_file {
        Some(path) => MemoryLedger::open(path)?,
        None => MemoryLedger::new(),
    };
    let chaincode = Chaincode::new(registry);

    ledger.invoke(HOST_IDENTITY, |stub| chaincode.init(stub))?;
    ledger.commit().await?;

    let bind = config.bind.clone();
    let state = Arc::new(AppState { ledger, chaincode, config });

    let app = Router::new()
        .route("/health", get(api::health))
        .route("/init", post(api::init))
        .route("/invoke/:fcn", post(api::invoke))
        .layer(CorsLayer::permissive())
        .with_state(state);

    let listener = tokio::net::TcpListener::bind(&bind).await?;
    info!("Listening on {}", bind);
    axum::serve(listener, app).await?;

    Ok(())
}

use std::sync::Arc;

use anyhow::Context;

use bazaar_api::app::{build_app, build_services};
use bazaar_api::config::ApiConfig;
use bazaar_infra::VariantSeed;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    bazaar_observability::init();

    let config = ApiConfig::from_env()?;

    let seed: Vec<VariantSeed> = match &config.catalog_seed {
        Some(path) => {
            let raw = std::fs::read_to_string(path)
                .with_context(|| format!("failed to read catalog seed {}", path.display()))?;
            serde_json::from_str(&raw)
                .with_context(|| format!("invalid catalog seed {}", path.display()))?
        }
        None => Vec::new(),
    };

    let services = Arc::new(build_services(config.engine.clone(), seed)?);
    let app = build_app(&config.jwt_secret, services);

    let listener = tokio::net::TcpListener::bind(config.bind_addr)
        .await
        .with_context(|| format!("failed to bind {}", config.bind_addr))?;

    tracing::info!("listening on {}", listener.local_addr()?);

    axum::serve(listener, app).await?;
    Ok(())
}

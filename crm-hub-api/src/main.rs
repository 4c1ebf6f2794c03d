//! CRM Hub - Main Application Entry Point
//!
//! Customer targeting and campaign delivery service.

use anyhow::Context;
use crm_hub_api::{AppConfig, AppState, StorageKind};
use crm_hub_delivery::LogChannel;
use crm_hub_rulegen::{DisabledRuleGenerator, HttpRuleGenerator, RuleGenerator};
use crm_hub_storage::Storage;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info,crm_hub=debug".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = AppConfig::from_env().context("Invalid configuration")?;

    tracing::info!("Starting CRM Hub server on {}", config.bind_addr());

    // Initialize storage backend
    let storage: Arc<dyn Storage> = match config.storage {
        StorageKind::Couchbase => connect_couchbase().await?,
        StorageKind::Memory => {
            tracing::info!("Initializing InMemory storage...");
            Arc::new(crm_hub_storage::InMemoryStorage::new())
        }
    };

    let rule_generator: Arc<dyn RuleGenerator> = match &config.rulegen_url {
        Some(url) => {
            tracing::info!("Rule generation via {} (timeout {:?})", url, config.rulegen_timeout);
            Arc::new(
                HttpRuleGenerator::new(url.clone(), config.rulegen_timeout)
                    .context("Failed to create rule generation client")?,
            )
        }
        None => {
            tracing::warn!("RULEGEN_URL not set, rule generation is disabled");
            Arc::new(DisabledRuleGenerator)
        }
    };

    // Create shared application state
    let app_state = Arc::new(AppState::with_components(
        storage,
        rule_generator,
        Arc::new(LogChannel),
    ));

    // Build our application with routes
    let app = crm_hub_api::create_router(app_state);

    // Run it
    let listener = tokio::net::TcpListener::bind(config.bind_addr())
        .await
        .with_context(|| format!("Failed to bind {}", config.bind_addr()))?;
    axum::serve(listener, app).await?;

    Ok(())
}

#[cfg(feature = "couchbase")]
async fn connect_couchbase() -> anyhow::Result<Arc<dyn Storage>> {
    tracing::info!("Initializing Couchbase storage...");
    let store = crm_hub_storage::CouchbaseStorage::from_env()
        .await
        .context("Failed to connect to Couchbase")?;
    Ok(Arc::new(store))
}

#[cfg(not(feature = "couchbase"))]
async fn connect_couchbase() -> anyhow::Result<Arc<dyn Storage>> {
    anyhow::bail!("Couchbase storage requested but the 'couchbase' feature is not enabled")
}

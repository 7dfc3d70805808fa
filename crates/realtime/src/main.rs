/// ERD Studio Realtime Service - Main Entry Point
use anyhow::Context;
use erd_studio_cache::{build_store, CacheConfig, IdempotencyGuard};
use erd_studio_core::auth::SessionResolver;
use erd_studio_core::config::{load_dotenv, ConfigLoader, RedisConfig, ServiceConfig};
use erd_studio_realtime::hierarchy::SchemaHierarchy;
use erd_studio_realtime::{
    build_transport, init_tracing, start_server, AppState, Broadcaster, DeliveryHandler,
    HierarchyConfig, HttpSchemaHierarchy, SessionRegistry, StoreSessionResolver,
};
use std::sync::Arc;

#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    load_dotenv();

    let service_config = ServiceConfig::from_env()?;
    service_config.validate()?;

    init_tracing(&service_config.log_level);

    let cache_config = CacheConfig::from_env()?;
    cache_config.validate()?;

    let redis_config = RedisConfig::from_env()?;
    redis_config.validate()?;

    let hierarchy_config = HierarchyConfig::from_env()?;
    hierarchy_config.validate()?;

    tracing::info!(
        provider = %cache_config.provider,
        "Initializing store and broadcast transport"
    );

    let store = build_store(&cache_config, &redis_config)
        .await
        .context("failed to initialize store provider")?;

    let transport = build_transport(cache_config.provider, &redis_config)
        .await
        .context("failed to initialize broadcast transport")?;

    let hierarchy: Arc<dyn SchemaHierarchy> = Arc::new(
        HttpSchemaHierarchy::new(&hierarchy_config)
            .context("failed to build schema service client")?,
    );

    let registry = Arc::new(SessionRegistry::new());
    let delivery = Arc::new(DeliveryHandler::new(registry.clone()));
    let broadcaster = Arc::new(Broadcaster::new(hierarchy, transport.clone()));
    let sessions: Arc<dyn SessionResolver> = Arc::new(StoreSessionResolver::new(store.clone()));
    let idempotency = IdempotencyGuard::new(store.clone(), cache_config.default_ttl);

    let state = AppState {
        registry,
        transport,
        broadcaster,
        delivery,
        store,
        sessions,
        idempotency,
        provider: cache_config.provider,
    };

    start_server(state, &service_config.host, service_config.port)
        .await
        .context("server terminated abnormally")
}

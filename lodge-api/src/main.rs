use anyhow::Context;
use lodge_api::{app, state::{AppState, CapacityFeed}, worker};
use lodge_core::SessionCacheFactory;
use lodge_store::{
    app_config::Config, DbClient, EventProducer, MemoryHub, MemorySessionCaches, RedisClient,
    StoreBackend,
};
use std::net::SocketAddr;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| {
                    "lodge_api=debug,lodge_notify=debug,lodge_store=info,tower_http=debug".into()
                }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::load().context("Failed to load config")?;
    tracing::info!("Starting Lodge realtime API on port {}", config.server.port);

    let hub = MemoryHub::new();
    let mut backend = StoreBackend::new(hub.clone());

    // Postgres
    if let Some(db_config) = &config.database {
        let db = DbClient::new(&db_config.url).await.context("Failed to connect to Postgres")?;
        if db_config.run_migrations {
            db.migrate().await.context("Failed to run migrations")?;
        }
        backend = backend.with_db(Arc::new(db));
    }

    // Redis
    let caches: Arc<dyn SessionCacheFactory> = match &config.redis {
        Some(redis_config) => {
            let redis = Arc::new(
                RedisClient::new(&redis_config.url, redis_config.session_ttl_seconds)
                    .await
                    .context("Failed to connect to Redis")?,
            );
            backend = backend.with_redis(redis.clone());
            redis as Arc<dyn SessionCacheFactory>
        }
        None => {
            tracing::info!("No Redis configured, reservation caches stay in memory");
            Arc::new(MemorySessionCaches::new())
        }
    };

    let mut app_state =
        AppState::new(backend, caches, config.realtime.clone(), config.retry.clone());

    // Kafka
    if let Some(kafka) = &config.kafka {
        let producer =
            EventProducer::new(&kafka.brokers).context("Failed to create Kafka producer")?;
        app_state = app_state.with_capacity_feed(CapacityFeed {
            producer: Arc::new(producer),
            topic: kafka.capacity_topic.clone(),
        });

        let (brokers, group_id, topic) = (
            kafka.brokers.clone(),
            kafka.group_id.clone(),
            kafka.capacity_topic.clone(),
        );
        let bus = app_state.bus.clone();
        tokio::spawn(async move {
            if let Err(e) =
                worker::start_capacity_worker(brokers, group_id, topic, hub, bus).await
            {
                tracing::error!("Capacity worker stopped: {}", e);
            }
        });
    }

    let app = app(app_state);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.server.port));
    tracing::info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}

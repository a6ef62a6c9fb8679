//! Metadata Depot - Main Entry Point

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use metadata_depot::{
    api::{self, routes},
    config::Config,
    db,
    error::Result,
    handlers::HandlerRegistry,
    models::schedule::ScheduleInfo,
    repository::maven::{MavenRepositoryClient, RetryConfig},
    services::{
        notification_consumer, notification_queue::NotificationQueue,
        purge_service::ArtifactPurgeService,
        reconciliation_service::VersionsReconciliationService,
        refresh_orchestrator::RefreshOrchestrator,
        refresh_status_tracker::RefreshStatusTracker,
        scheduler::{self, SweepScheduler},
    },
    store::{postgres::PgDepotStore, DepotStore},
};

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment variables
    dotenvy::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "metadata_depot=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration
    let config = Config::from_env()?;
    tracing::info!("Starting Metadata Depot");

    // Connect to database
    let db_pool = db::create_pool(&config.database_url).await?;
    tracing::info!("Connected to database");

    // Run migrations
    sqlx::migrate!("./migrations").run(&db_pool).await?;
    tracing::info!("Database migrations complete");

    let store: Arc<dyn DepotStore> = Arc::new(PgDepotStore::new(db_pool));
    let repository = Arc::new(MavenRepositoryClient::new(
        &config.repository_url,
        Duration::from_secs(config.repository_timeout_secs),
        RetryConfig::default(),
    )?);

    let registry = Arc::new(HandlerRegistry::default_set(store.clone()));
    let tracker = RefreshStatusTracker::new(
        store.clone(),
        Duration::from_secs(config.claim_abandon_secs),
    );
    let queue = NotificationQueue::new(store.clone(), config.max_event_retries);
    let orchestrator = Arc::new(RefreshOrchestrator::new(
        store.clone(),
        repository.clone(),
        registry.clone(),
        tracker.clone(),
        config.sweep_concurrency,
    ));
    let reconciliation = Arc::new(VersionsReconciliationService::new(
        store.clone(),
        repository,
    ));
    let purge = Arc::new(ArtifactPurgeService::new(
        store.clone(),
        tracker.clone(),
        registry,
    ));
    let sweep_scheduler = Arc::new(SweepScheduler::new(
        store.clone(),
        queue.clone(),
        reconciliation.clone(),
        ScheduleInfo {
            name: scheduler::SNAPSHOT_SWEEP.to_string(),
            frequency_secs: config.snapshot_sweep_secs,
            disabled: false,
            single_instance: true,
        },
        ScheduleInfo {
            name: scheduler::RECONCILE_SWEEP.to_string(),
            frequency_secs: config.reconcile_sweep_secs,
            disabled: false,
            single_instance: true,
        },
        Duration::from_secs(config.schedule_lease_secs),
    ));

    // Background workers
    notification_consumer::spawn_consumer(
        queue.clone(),
        orchestrator.clone(),
        Duration::from_secs(config.queue_poll_secs),
    );
    scheduler::spawn_schedulers(sweep_scheduler.clone());

    let state: api::SharedState = Arc::new(api::AppState {
        config: config.clone(),
        store,
        orchestrator,
        reconciliation,
        purge,
        queue,
        tracker,
        scheduler: sweep_scheduler,
    });

    let app = routes::create_router(state);

    let addr: SocketAddr = config.bind_address.parse()?;
    tracing::info!("Listening on {addr}");
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

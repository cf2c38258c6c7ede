use std::process::ExitCode;
use std::sync::Arc;

use chrono::Utc;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use transit_aggregator::config::AppConfig;
use transit_aggregator::dataset::{CredentialSource, DatasetRegistry, EnvCredentials};
use transit_aggregator::domain::{EventBody, ServiceAlert, ServiceAlertType};
use transit_aggregator::events::{
    ConsumerError, ConsumerPool, EventPublisher, EventsLogger, MemoryBroker, QueueBroker, drain,
};
use transit_aggregator::import::{HttpFetcher, ImportManager, ParserRegistry};
use transit_aggregator::realtime::RealtimeFold;
use transit_aggregator::store::{MemoryStore, Store};

const USAGE: &str = "usage: transit-aggregator <import|events [--import]|test-event>";

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = match AppConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            error!(error = %e, "Invalid configuration");
            return ExitCode::FAILURE;
        }
    };

    let store: Arc<dyn Store> = Arc::new(MemoryStore::new());
    let broker = MemoryBroker::new();

    // Store and broker live in this process, so every command that
    // produces queue traffic also consumes it before returning.
    let args: Vec<String> = std::env::args().skip(1).collect();
    let args: Vec<&str> = args.iter().map(String::as_str).collect();
    let result = match args.as_slice() {
        ["import"] => import_and_drain(&config, store, &broker).await,
        ["events"] => events(&config, store, &broker).await,
        ["events", "--import"] => match import(&config, store.clone(), &broker).await {
            Ok(()) => events(&config, store, &broker).await,
            Err(e) => Err(e),
        },
        ["test-event"] => test_event(&config, &broker).await,
        _ => {
            eprintln!("{USAGE}");
            return ExitCode::from(2);
        }
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(message) => {
            error!("{message}");
            ExitCode::FAILURE
        }
    }
}

/// Import once, then fold everything realtime datasets published and log
/// the events that produced.
async fn import_and_drain(
    config: &AppConfig,
    store: Arc<dyn Store>,
    broker: &MemoryBroker,
) -> Result<(), String> {
    import(config, store.clone(), broker).await?;

    let events_queue = broker
        .open_queue(&config.events_consumer.queue_name)
        .await
        .map_err(|e| e.to_string())?;
    let fold = RealtimeFold::new(store).with_events(EventPublisher::new(events_queue));

    let realtime = broker.memory_queue(&config.realtime_consumer.queue_name).await;
    drain(realtime, Arc::new(fold), &config.realtime_consumer)
        .await
        .map_err(|e| format!("consumer failed: {e}"))?;

    let events = broker.memory_queue(&config.events_consumer.queue_name).await;
    drain(events, Arc::new(EventsLogger), &config.events_consumer)
        .await
        .map_err(|e| format!("consumer failed: {e}"))?;
    Ok(())
}

/// Validate the registry and credentials, then import every dataset once.
async fn import(config: &AppConfig, store: Arc<dyn Store>, broker: &MemoryBroker) -> Result<(), String> {
    let registry = DatasetRegistry::load(&config.registry_path).map_err(|e| e.to_string())?;

    let credentials: Arc<dyn CredentialSource> = Arc::new(EnvCredentials);
    registry
        .check_credentials(credentials.as_ref())
        .map_err(|e| e.to_string())?;

    info!(datasets = registry.len(), path = %config.registry_path.display(), "Loaded dataset registry");

    let fetcher = HttpFetcher::new(&config.fetch, credentials).map_err(|e| e.to_string())?;
    let realtime = broker
        .open_queue(&config.realtime_consumer.queue_name)
        .await
        .map_err(|e| e.to_string())?;

    let manager = ImportManager::new(
        Arc::new(fetcher),
        ParserRegistry::new(),
        store,
        EventPublisher::new(realtime),
        config.import.clone(),
    );

    let report = manager.run(&registry).await;
    info!(
        imported = report.imported_count(),
        failed = report.failed_count(),
        skipped = report.skipped_count(),
        "Import finished"
    );
    Ok(())
}

/// Run the events and realtime consumer pools until interrupted.
///
/// The first interrupt stops pulling new batches and waits for in-flight
/// ones; a second interrupt exits immediately.
async fn events(config: &AppConfig, store: Arc<dyn Store>, broker: &MemoryBroker) -> Result<(), String> {
    let events_queue = broker
        .open_queue(&config.events_consumer.queue_name)
        .await
        .map_err(|e| e.to_string())?;
    let realtime_queue = broker
        .open_queue(&config.realtime_consumer.queue_name)
        .await
        .map_err(|e| e.to_string())?;

    let fold = RealtimeFold::new(store).with_events(EventPublisher::new(events_queue.clone()));

    let events_pool = ConsumerPool::start(events_queue, Arc::new(EventsLogger), &config.events_consumer);
    let realtime_pool = ConsumerPool::start(realtime_queue, Arc::new(fold), &config.realtime_consumer);

    let handles = [events_pool.shutdown_handle(), realtime_pool.shutdown_handle()];
    let pools = async { tokio::try_join!(events_pool.wait(), realtime_pool.wait()) };
    tokio::pin!(pools);

    let result: Result<_, ConsumerError> = tokio::select! {
        result = &mut pools => result,
        _ = tokio::signal::ctrl_c() => {
            info!("Interrupt received, finishing in-flight batches (interrupt again to force)");
            for handle in &handles {
                handle.stop_accepting();
            }
            tokio::select! {
                result = &mut pools => result,
                _ = tokio::signal::ctrl_c() => {
                    warn!("Second interrupt, exiting without waiting");
                    std::process::exit(1);
                }
            }
        }
    };

    result.map(|_| ()).map_err(|e| format!("consumer failed: {e}"))
}

/// Publish a sample service alert on the events queue, then consume it.
async fn test_event(config: &AppConfig, broker: &MemoryBroker) -> Result<(), String> {
    let queue = broker.memory_queue(&config.events_consumer.queue_name).await;
    let now = Utc::now();

    let alert = ServiceAlert {
        primary_identifier: "GB:SERVICEALERT:TEST".to_string(),
        creation_time: Some(now),
        modification_time: Some(now),
        data_source: None,
        alert_type: ServiceAlertType::ServiceSuspended,
        title: "Line Suspended".to_string(),
        text: "Northern Line has been suspended due to a fault on the line".to_string(),
        matched_identifiers: vec!["GB:NOC:LDLUNTN".to_string()],
        valid_from: Some(now),
        valid_until: None,
    };

    let event = EventPublisher::new(queue.clone())
        .publish(&EventBody::ServiceAlertCreated(alert))
        .await
        .map_err(|e| e.to_string())?;
    info!(event_type = ?event.event_type, "Published test event");

    drain(queue, Arc::new(EventsLogger), &config.events_consumer)
        .await
        .map_err(|e| format!("consumer failed: {e}"))?;
    Ok(())
}

//! # Listener Bootstrap
//!
//! Wires configuration, storage, the producer, both outbox relay paths and
//! the HTTP server into one running system, and tears it down in order.

use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use crate::config::ConfigManager;
use crate::database::DatabaseConnection;
use crate::error::{ListenerError, Result};
use crate::events::{EventIngestService, EventRepository, PgEventRepository};
use crate::outbox::{OutboxDispatcher, OutboxProcessor, OutboxStore, PgOutboxStore};
use crate::producer::{sink_from_config, MessageSink, ProducerService};
use crate::web::{create_app, AppState};

/// Running system handle
pub struct ListenerHandle {
    local_addr: SocketAddr,
    shutdown_sender: Option<oneshot::Sender<()>>,
    server_task: Option<JoinHandle<std::io::Result<()>>>,
    processor: Option<OutboxProcessor>,
    dispatcher: Option<OutboxDispatcher>,
    producer: Arc<ProducerService>,
    database: Option<DatabaseConnection>,
    config_manager: Arc<ConfigManager>,
}

/// System status information
#[derive(Debug, Clone)]
pub struct SystemStatus {
    pub running: bool,
    pub environment: String,
    pub local_addr: SocketAddr,
    pub producer_running: bool,
    pub outbox_processor_running: bool,
    pub dispatcher_enabled: bool,
    pub database_pool_size: Option<u32>,
}

impl ListenerHandle {
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    pub fn is_running(&self) -> bool {
        self.shutdown_sender.is_some()
    }

    pub fn producer(&self) -> &Arc<ProducerService> {
        &self.producer
    }

    pub fn status(&self) -> SystemStatus {
        SystemStatus {
            running: self.is_running(),
            environment: self.config_manager.environment().to_string(),
            local_addr: self.local_addr,
            producer_running: self.producer.is_running(),
            outbox_processor_running: self
                .processor
                .as_ref()
                .is_some_and(OutboxProcessor::is_running),
            dispatcher_enabled: self.dispatcher.is_some(),
            database_pool_size: self.database.as_ref().map(|db| db.pool().size()),
        }
    }

    /// Stop the server, then the sweep, the dispatcher and finally the
    /// producer (which flushes pending deliveries)
    pub async fn stop(mut self) -> Result<()> {
        info!("Event Listener is shutting down...");

        if let Some(sender) = self.shutdown_sender.take() {
            if sender.send(()).is_err() {
                warn!("HTTP server already stopped");
            }
        }
        if let Some(task) = self.server_task.take() {
            match task.await {
                Ok(Ok(())) => info!("HTTP server stopped"),
                Ok(Err(e)) => error!(error = %e, "HTTP server exited with error"),
                Err(e) => error!(error = %e, "HTTP server task failed"),
            }
        }

        if let Some(mut processor) = self.processor.take() {
            processor.stop().await;
        }
        if let Some(dispatcher) = self.dispatcher.take() {
            dispatcher.stop().await;
        }
        self.producer.stop().await;

        if let Some(database) = self.database.take() {
            database.close().await;
        }

        info!("🛑 Event listener stopped");
        Ok(())
    }
}

pub struct ListenerSystem;

impl ListenerSystem {
    /// Connect to PostgreSQL, apply migrations and start everything
    pub async fn bootstrap(config_manager: Arc<ConfigManager>) -> Result<ListenerHandle> {
        info!("Event Listener is starting up...");
        let config = config_manager.config();
        config.require_database_url()?;

        let database =
            DatabaseConnection::connect(&config.database, config.is_production()).await?;
        Self::start_with_database(config_manager, database).await
    }

    /// Start over an open database; the pool is closed when startup fails
    pub async fn start_with_database(
        config_manager: Arc<ConfigManager>,
        database: DatabaseConnection,
    ) -> Result<ListenerHandle> {
        match Self::start_on_database(config_manager, &database).await {
            Ok(mut handle) => {
                handle.database = Some(database);
                Ok(handle)
            }
            Err(e) => {
                error!(error = %e, "Startup failed, closing database pool");
                database.close().await;
                Err(e)
            }
        }
    }

    async fn start_on_database(
        config_manager: Arc<ConfigManager>,
        database: &DatabaseConnection,
    ) -> Result<ListenerHandle> {
        if !database.health_check().await? {
            return Err(ListenerError::Startup(
                "database health check returned an unexpected result".to_string(),
            ));
        }
        let config = config_manager.config();
        if config.database.run_migrations {
            database.run_migrations().await?;
        }

        let repository: Arc<dyn EventRepository> =
            Arc::new(PgEventRepository::new(database.pool().clone()));
        let store: Arc<dyn OutboxStore> = Arc::new(PgOutboxStore::new(database.pool().clone()));
        let sink = sink_from_config(&config.kafka);

        Self::start_with(config_manager, repository, store, sink).await
    }

    /// Start over caller-provided storage and sink
    pub async fn start_with(
        config_manager: Arc<ConfigManager>,
        repository: Arc<dyn EventRepository>,
        store: Arc<dyn OutboxStore>,
        sink: Arc<dyn MessageSink>,
    ) -> Result<ListenerHandle> {
        let config = Arc::new(config_manager.config().clone());
        let source = config.events.source.clone();

        let bind_address = config.server.socket_addr()?;
        let listener = TcpListener::bind(bind_address)
            .await
            .map_err(|e| ListenerError::Startup(format!("cannot bind {bind_address}: {e}")))?;
        let local_addr = listener
            .local_addr()
            .map_err(|e| ListenerError::Startup(format!("cannot read bound address: {e}")))?;

        let producer = Arc::new(ProducerService::new(config.kafka.clone(), sink));
        producer.start().await?;

        let dispatcher = (config.outbox.enabled && config.outbox.immediate_publish).then(|| {
            OutboxDispatcher::start(
                config.outbox.clone(),
                store.clone(),
                producer.clone(),
                source.clone(),
            )
        });

        let processor = config.outbox.enabled.then(|| {
            let mut processor = OutboxProcessor::new(
                config.outbox.clone(),
                store.clone(),
                producer.clone(),
                source.clone(),
            );
            processor.start();
            processor
        });

        let ingest = Arc::new(EventIngestService::new(
            repository,
            dispatcher.as_ref().map(OutboxDispatcher::handle),
            config.events.clone(),
        ));

        let mut app_state = AppState::new(config.clone(), ingest, producer.clone());
        if let Some(processor) = &processor {
            app_state = app_state.with_outbox(processor.monitor());
        }
        if let Some(dispatcher) = &dispatcher {
            app_state = app_state.with_dispatcher(dispatcher.handle());
        }
        let app = create_app(app_state);

        let (shutdown_sender, shutdown_receiver) = oneshot::channel::<()>();
        let server_task = tokio::spawn(async move {
            axum::serve(listener, app)
                .with_graceful_shutdown(async {
                    let _ = shutdown_receiver.await;
                })
                .await
        });

        info!(
            address = %local_addr,
            environment = %config_manager.environment(),
            dispatcher = dispatcher.is_some(),
            outbox_processor = processor.is_some(),
            "🚀 Event listener serving"
        );

        Ok(ListenerHandle {
            local_addr,
            shutdown_sender: Some(shutdown_sender),
            server_task: Some(server_task),
            processor,
            dispatcher,
            producer,
            database: None,
            config_manager,
        })
    }
}

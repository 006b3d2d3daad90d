use std::sync::Arc;

use thiserror::Error;
use tracing::info;

use helpdevil_core::config::{AppConfig, ConfigError, LoadOptions};
use helpdevil_slack::callbacks::CallbackRouter;
use helpdevil_slack::commands::{CommandRouter, StoreBackedHelpdeskService};
use helpdevil_slack::connections::{
    reconnect_all, ConnectionRegistry, NoopRealtimeConnector, RealtimeConnector,
};
use helpdevil_slack::conversation::NoopConversationEngine;
use helpdevil_slack::events::{
    BotProvisionedHandler, EventDispatcher, HelpdeskEventType, InteractiveCallbackHandler,
    SlashCommandHandler,
};
use helpdevil_slack::socket::{NoopRealtimeTransport, RealtimeRunner, ReconnectPolicy};
use helpdevil_store::{
    connect_with_settings, migrations, JsonFileTeamStore, SqliteTeamStore, StoreError, TeamStore,
};

pub struct Application {
    pub config: AppConfig,
    pub store: Arc<dyn TeamStore>,
    pub registry: Arc<ConnectionRegistry>,
    pub runner: RealtimeRunner,
}

#[derive(Debug, Error)]
pub enum BootstrapError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("database connection failed: {0}")]
    DatabaseConnect(#[source] sqlx::Error),
    #[error("database migration failed: {0}")]
    Migration(#[source] sqlx::migrate::MigrateError),
    #[error("store initialization failed: {0}")]
    Store(#[source] StoreError),
}

pub async fn bootstrap(options: LoadOptions) -> Result<Application, BootstrapError> {
    let config = AppConfig::load(options)?;
    bootstrap_with_config(config).await
}

pub async fn bootstrap_with_config(config: AppConfig) -> Result<Application, BootstrapError> {
    info!(
        event_name = "system.bootstrap.start",
        correlation_id = "bootstrap",
        "starting application bootstrap"
    );

    let store = build_store(&config).await?;

    let registry = Arc::new(ConnectionRegistry::new());
    let connector: Arc<dyn RealtimeConnector> = Arc::new(NoopRealtimeConnector);

    let reconnected = reconnect_all(store.as_ref(), connector.as_ref(), registry.as_ref()).await;
    info!(
        event_name = "system.bootstrap.reconnect_sweep",
        correlation_id = "bootstrap",
        reconnected,
        "reopened realtime sessions for stored teams"
    );

    let dispatcher = build_dispatcher(&config, store.clone(), connector, registry.clone());
    let runner = RealtimeRunner::new(
        Arc::new(NoopRealtimeTransport),
        Arc::new(dispatcher),
        ReconnectPolicy::default(),
    );

    Ok(Application { config, store, registry, runner })
}

/// A configured database URL selects the SQLite backend; otherwise team
/// records land as JSON files under the configured directory.
async fn build_store(config: &AppConfig) -> Result<Arc<dyn TeamStore>, BootstrapError> {
    match &config.store.database_url {
        Some(url) => {
            let pool = connect_with_settings(
                url,
                config.store.max_connections,
                config.store.timeout_secs,
            )
            .await
            .map_err(BootstrapError::DatabaseConnect)?;
            info!(
                event_name = "system.bootstrap.database_connected",
                correlation_id = "bootstrap",
                "database connection established"
            );

            migrations::run_pending(&pool).await.map_err(BootstrapError::Migration)?;
            info!(
                event_name = "system.bootstrap.migrations_applied",
                correlation_id = "bootstrap",
                "database migrations applied"
            );

            Ok(Arc::new(SqliteTeamStore::new(pool)))
        }
        None => {
            let store = JsonFileTeamStore::new(&config.store.json_file_dir);
            store.ensure_dir().await.map_err(BootstrapError::Store)?;
            info!(
                event_name = "system.bootstrap.json_store_ready",
                correlation_id = "bootstrap",
                dir = %config.store.json_file_dir.display(),
                "flat-file team store initialized"
            );
            Ok(Arc::new(store))
        }
    }
}

fn build_dispatcher(
    config: &AppConfig,
    store: Arc<dyn TeamStore>,
    connector: Arc<dyn RealtimeConnector>,
    registry: Arc<ConnectionRegistry>,
) -> EventDispatcher {
    let mut dispatcher = EventDispatcher::new();

    let command_router = CommandRouter::new(Arc::new(StoreBackedHelpdeskService::new(store.clone())));
    dispatcher.register(
        HelpdeskEventType::SlashCommand,
        Arc::new(SlashCommandHandler::new(
            command_router,
            config.slack.verification_token.clone(),
        )),
    );

    let callback_router = CallbackRouter::new(store.clone(), Arc::new(NoopConversationEngine));
    dispatcher.register(
        HelpdeskEventType::InteractiveCallback,
        Arc::new(InteractiveCallbackHandler::new(callback_router)),
    );

    dispatcher.register(
        HelpdeskEventType::BotProvisioned,
        Arc::new(BotProvisionedHandler::new(store, connector, registry)),
    );

    dispatcher
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use helpdevil_core::config::{ConfigOverrides, LoadOptions};

    use crate::bootstrap::bootstrap;

    fn valid_options(database_url: Option<&str>, json_dir: Option<PathBuf>) -> LoadOptions {
        LoadOptions {
            overrides: ConfigOverrides {
                client_id: Some("123.456".to_string()),
                client_secret: Some("shhh".to_string()),
                verification_token: Some("tok".to_string()),
                database_url: database_url.map(|url| url.to_string()),
                json_file_dir: json_dir,
                ..ConfigOverrides::default()
            },
            ..LoadOptions::default()
        }
    }

    #[tokio::test]
    async fn bootstrap_fails_fast_without_required_slack_settings() {
        let result = bootstrap(LoadOptions {
            overrides: ConfigOverrides {
                database_url: Some("sqlite::memory:".to_string()),
                ..ConfigOverrides::default()
            },
            ..LoadOptions::default()
        })
        .await;

        assert!(result.is_err());
        let message = result.err().expect("error").to_string();
        assert!(message.contains("slack.client_id"));
    }

    #[tokio::test]
    async fn bootstrap_with_database_url_migrates_and_wires_handlers() {
        let app = bootstrap(valid_options(Some("sqlite::memory:?cache=shared"), None))
            .await
            .expect("bootstrap should succeed with valid overrides");

        assert_eq!(app.registry.tracked_count().await, 0);
        assert!(app.store.all().await.expect("store is usable").is_empty());
    }

    #[tokio::test]
    async fn bootstrap_without_database_url_uses_the_flat_file_store() {
        let dir = tempfile::TempDir::new().expect("tempdir");
        let app = bootstrap(valid_options(None, Some(dir.path().join("records"))))
            .await
            .expect("bootstrap should succeed with a json dir");

        assert!(dir.path().join("records").is_dir(), "store directory is created up front");
        assert!(app.store.all().await.expect("store is usable").is_empty());
    }
}

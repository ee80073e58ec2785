use std::sync::Arc;

use leadflow_agent::calendar::{CalendarProvider, HttpCalendar, NoopCalendar};
use leadflow_agent::notify::{NoopNotifier, StaffNotifier, WebhookNotifier};
use leadflow_agent::orchestrator::Orchestrator;
use leadflow_agent::TracingAuditSink;
use leadflow_core::config::{AppConfig, ConfigError};
use leadflow_db::{connect_from_config, migrations, DbPool, Stores};
use thiserror::Error;
use tracing::info;

pub struct Application {
    pub config: AppConfig,
    pub db_pool: DbPool,
    pub orchestrator: Arc<Orchestrator>,
}

#[derive(Debug, Error)]
pub enum BootstrapError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("database connection failed: {0}")]
    DatabaseConnect(#[source] sqlx::Error),
    #[error("database migration failed: {0}")]
    Migration(#[source] sqlx::migrate::MigrateError),
    #[error("integration setup failed: {0}")]
    Integration(String),
}

pub async fn bootstrap_with_config(config: AppConfig) -> Result<Application, BootstrapError> {
    info!(
        event_name = "system.bootstrap.start",
        correlation_id = "bootstrap",
        lead_id = "unknown",
        "starting application bootstrap"
    );

    let db_pool =
        connect_from_config(&config.database).await.map_err(BootstrapError::DatabaseConnect)?;
    info!(
        event_name = "system.bootstrap.database_connected",
        correlation_id = "bootstrap",
        lead_id = "unknown",
        "database connection established"
    );

    migrations::run_pending(&db_pool).await.map_err(BootstrapError::Migration)?;
    info!(
        event_name = "system.bootstrap.migrations_applied",
        correlation_id = "bootstrap",
        lead_id = "unknown",
        "database migrations applied"
    );

    let calendar = calendar_provider(&config)?;
    let notifier = staff_notifier(&config)?;
    info!(
        event_name = "system.bootstrap.integrations",
        correlation_id = "bootstrap",
        lead_id = "unknown",
        calendar = if calendar.enabled() { "http" } else { "disabled" },
        notifications = if notifier.enabled() { "webhook" } else { "disabled" },
        "external integrations configured"
    );

    let orchestrator = Orchestrator::new(
        &config,
        Stores::sql(db_pool.clone()),
        calendar,
        notifier,
        Arc::new(TracingAuditSink),
    )?;

    Ok(Application { config, db_pool, orchestrator: Arc::new(orchestrator) })
}

fn calendar_provider(config: &AppConfig) -> Result<Arc<dyn CalendarProvider>, BootstrapError> {
    if !config.calendar.enabled {
        return Ok(Arc::new(NoopCalendar));
    }
    let calendar = HttpCalendar::from_config(&config.calendar)
        .map_err(|error| BootstrapError::Integration(error.to_string()))?;
    Ok(Arc::new(calendar))
}

fn staff_notifier(config: &AppConfig) -> Result<Arc<dyn StaffNotifier>, BootstrapError> {
    if !config.notifications.enabled {
        return Ok(Arc::new(NoopNotifier));
    }
    let notifier = WebhookNotifier::from_config(&config.notifications)
        .map_err(|error| BootstrapError::Integration(error.to_string()))?;
    Ok(Arc::new(notifier))
}

//! Services bundle - composition root for the assistant's collaborators.
//!
//! Generalizes the teacher's single top-level client struct (spec §9 design
//! note: avoid global singletons, pass an explicit bundle) into a group of
//! `Arc`-shared collaborators any request handler or scheduled job can hold.

use std::sync::Arc;

use sqlx::PgPool;

use crate::cache::TtlCache;
use crate::config::Settings;
use crate::database::Database;
use crate::error::{Error, Result};
use crate::llm::{build_gateway, GenerativeGateway};
use crate::notifications::NotificationManager;
use crate::product_search::{CatalogGateway, HttpCatalogGateway};
use crate::scheduler::Scheduler;
use crate::session::InMemorySessionStore;

/// Shared services any request or job needs to do its work.
pub struct Services {
    pub settings: Arc<Settings>,
    pub database: Database,
    pub cache: Arc<TtlCache>,
    pub sessions: Arc<InMemorySessionStore>,
    pub catalog: Arc<dyn CatalogGateway>,
    pub llm: Arc<dyn GenerativeGateway>,
    pub notifier: Arc<NotificationManager>,
}

impl Services {
    pub fn builder() -> ServicesBuilder {
        ServicesBuilder::default()
    }

    pub fn pool(&self) -> &PgPool {
        self.database.pool()
    }

    pub async fn initialize(&self) -> Result<()> {
        self.database.initialize().await
    }

    /// Builds a scheduler wired to this bundle's catalog, database pool, and
    /// notifier. Kept out of `Services` itself since only the long-running
    /// server process needs one; one-shot CLI calls never start it.
    pub async fn build_scheduler(&self) -> Result<Scheduler> {
        Scheduler::new(self.pool().clone(), self.catalog.clone(), self.notifier.clone()).await
    }
}

#[derive(Default)]
pub struct ServicesBuilder {
    settings: Option<Settings>,
}

impl ServicesBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn settings(mut self, settings: Settings) -> Self {
        self.settings = Some(settings);
        self
    }

    pub async fn build(self) -> Result<Services> {
        let settings = match self.settings {
            Some(s) => s,
            None => Settings::from_env()?,
        };

        let database = Database::new(&settings.database_url)?;
        let cache = Arc::new(TtlCache::new(settings.cache_ttl_seconds));
        let sessions = Arc::new(InMemorySessionStore::new(settings.session_ttl_minutes));

        let catalog: Arc<dyn CatalogGateway> = if settings.catalog_configured() {
            Arc::new(HttpCatalogGateway::new(&settings)?)
        } else {
            return Err(Error::Configuration(
                "catalog client id/secret are required".into(),
            ));
        };

        let llm: Arc<dyn GenerativeGateway> = Arc::from(build_gateway(&settings)?);
        let notifier = Arc::new(NotificationManager::new(&settings));

        Ok(Services {
            settings: Arc::new(settings),
            database,
            cache,
            sessions,
            catalog,
            llm,
            notifier,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn builder_requires_catalog_credentials() {
        std::env::set_var("DATABASE_URL", "postgres://localhost/test");
        std::env::remove_var("CATALOG_CLIENT_ID");
        std::env::remove_var("CATALOG_CLIENT_SECRET");
        let settings = Settings::from_env().unwrap();
        let result = Services::builder().settings(settings).build().await;
        assert!(result.is_err());
    }
}

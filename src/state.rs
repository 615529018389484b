use shared::{Config, ConfigStore, MemoryStore, PgStore, SessionStore, WebhookClient};
use std::sync::Arc;
use std::time::Instant;
use tracing::info;

/// Estado compartido de la aplicación.
/// Holds the immutable config snapshot, the storage collaborators and the
/// outbound HTTP client. Cloning is cheap.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub sessions: Arc<dyn SessionStore>,
    pub config_store: Arc<dyn ConfigStore>,
    pub webhook_client: WebhookClient,
    pub store_kind: &'static str,
    pub started_at: Instant,
}

impl AppState {
    /// Build the state from a loaded config, connecting to PostgreSQL when a
    /// database URL is configured.
    pub async fn new(config: Config) -> anyhow::Result<Self> {
        let webhook_client = WebhookClient::new()?;

        let state = match &config.database {
            Some(db_config) => {
                let store = Arc::new(PgStore::new(db_config).await?);
                info!("Using PostgreSQL session store");
                Self::with_stores(config, store.clone(), store, webhook_client, "postgres")
            }
            None => {
                let store = Arc::new(MemoryStore::new());
                info!("DATABASE_URL not set, using in-memory session store");
                Self::with_stores(config, store.clone(), store, webhook_client, "memory")
            }
        };

        Ok(state)
    }

    /// State backed by a fresh in-memory store.
    pub fn in_memory(config: Config) -> anyhow::Result<Self> {
        let store = Arc::new(MemoryStore::new());
        Ok(Self::with_stores(
            config,
            store.clone(),
            store,
            WebhookClient::new()?,
            "memory",
        ))
    }

    pub fn with_stores(
        config: Config,
        sessions: Arc<dyn SessionStore>,
        config_store: Arc<dyn ConfigStore>,
        webhook_client: WebhookClient,
        store_kind: &'static str,
    ) -> Self {
        Self {
            config: Arc::new(config),
            sessions,
            config_store,
            webhook_client,
            store_kind,
            started_at: Instant::now(),
        }
    }
}

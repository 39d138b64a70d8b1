use std::sync::Arc;

use sqlx::SqlitePool;
use xsi_monitor_core::{EventDispatcher, MonitorSupervisor, PushConnector};

use crate::config::ServerConfig;
use crate::error::Result;
use crate::token_store::SqliteTokenStore;

#[derive(Clone)]
pub struct AppState {
    pub supervisor: Arc<MonitorSupervisor>,
    pub push: PushConnector,
    pub db: SqlitePool,
}

impl AppState {
    /// Wire the supervisor to the token store and the HTTP push channel
    pub fn new(
        tokens: SqliteTokenStore,
        dispatcher: EventDispatcher,
        config: &ServerConfig,
    ) -> Self {
        let push = PushConnector::new();
        let db = tokens.pool().clone();
        let supervisor = MonitorSupervisor::new(
            Arc::new(tokens),
            Arc::new(push.clone()),
            dispatcher,
            config.monitor.clone(),
        );
        Self {
            supervisor: Arc::new(supervisor),
            push,
            db,
        }
    }

    /// Open the token database named in `config`
    pub async fn from_config(config: &ServerConfig, dispatcher: EventDispatcher) -> Result<Self> {
        let tokens = SqliteTokenStore::connect(&config.database_url).await?;
        Ok(Self::new(tokens, dispatcher, config))
    }
}

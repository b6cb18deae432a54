use std::sync::Arc;
use std::time::Duration;

use tokio::sync::broadcast;

use orderline_catalog::{InMemoryInventory, InMemoryUserDirectory};
use orderline_core::{InventoryStore, UserDirectory};
use orderline_order::orchestrator::DEFAULT_CALL_TIMEOUT;
use orderline_order::{InMemoryOrderStore, OrderCoordinator};
use orderline_shared::OrderPlacedEvent;
use orderline_store::app_config::{Config, InventoryBackend, Role};
use orderline_store::{CircuitBreaker, RedisInventoryStore, RemoteInventoryStore, RemoteUserDirectory};

#[derive(Clone)]
pub struct AppState {
    pub role: Role,
    pub users: Arc<dyn UserDirectory>,
    pub inventory: Arc<dyn InventoryStore>,
    pub coordinator: Arc<OrderCoordinator>,
    pub sse_tx: broadcast::Sender<OrderPlacedEvent>,
}

impl AppState {
    pub fn new(role: Role, users: Arc<dyn UserDirectory>, inventory: Arc<dyn InventoryStore>) -> Self {
        Self::with_call_timeout(role, users, inventory, DEFAULT_CALL_TIMEOUT)
    }

    /// Wire a coordinator (and its event channel) over the given user and inventory stores.
    pub fn with_call_timeout(
        role: Role,
        users: Arc<dyn UserDirectory>,
        inventory: Arc<dyn InventoryStore>,
        call_timeout: Duration,
    ) -> Self {
        let (sse_tx, _) = broadcast::channel(100);
        let coordinator = OrderCoordinator::new(users.clone(), inventory.clone(), Arc::new(InMemoryOrderStore::new()))
            .with_call_timeout(call_timeout)
            .with_events(sse_tx.clone());

        Self {
            role,
            users,
            inventory,
            coordinator: Arc::new(coordinator),
            sse_tx,
        }
    }

    /// Every store in process memory, serving all routes.
    pub fn in_memory() -> Self {
        Self::new(
            Role::All,
            Arc::new(InMemoryUserDirectory::new()),
            Arc::new(InMemoryInventory::new()),
        )
    }

    pub fn from_config(config: &Config) -> anyhow::Result<Self> {
        let role = config.server.role;

        let (users, inventory): (Arc<dyn UserDirectory>, Arc<dyn InventoryStore>) = match role {
            Role::Orders => {
                let timeout = config.upstream.call_timeout();
                let breaker = |name: &str| {
                    Arc::new(CircuitBreaker::new(
                        name,
                        config.resiliency.failure_threshold,
                        config.resiliency.reset_timeout(),
                    ))
                };
                tracing::info!(
                    "Using remote users at {} and inventory at {}",
                    config.upstream.users_url,
                    config.upstream.inventory_url
                );
                (
                    Arc::new(RemoteUserDirectory::new(&config.upstream.users_url, timeout, breaker("users"))?),
                    Arc::new(RemoteInventoryStore::new(&config.upstream.inventory_url, timeout, breaker("inventory"))?),
                )
            }
            _ => {
                let inventory: Arc<dyn InventoryStore> = match config.inventory.backend {
                    InventoryBackend::Memory => Arc::new(InMemoryInventory::new()),
                    InventoryBackend::Redis => {
                        tracing::info!("Using Redis inventory at {}", config.inventory.redis_url);
                        Arc::new(RedisInventoryStore::new(&config.inventory.redis_url)?)
                    }
                };
                (Arc::new(InMemoryUserDirectory::new()), inventory)
            }
        };

        Ok(Self::with_call_timeout(role, users, inventory, config.upstream.call_timeout()))
    }
}

//! HTTP clients for the user and inventory services, used when orders run in their own process.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{RequestBuilder, Url};
use serde::de::DeserializeOwned;
use tracing::warn;

use orderline_core::model::require_id;
use orderline_core::{
    CoreResult, ErrorBody, InventoryStore, Item, NewItem, NewUser, Reservation, ServiceError, StockRequest,
    User, UserDirectory,
};

use crate::resiliency::CircuitBreaker;

/// One remote endpoint: base URL, a client with a per-call timeout and its breaker.
#[derive(Clone)]
struct Upstream {
    base_url: Url,
    client: reqwest::Client,
    breaker: Arc<CircuitBreaker>,
}

impl Upstream {
    fn new(base_url: &str, timeout: Duration, breaker: Arc<CircuitBreaker>) -> CoreResult<Self> {
        let base_url = Url::parse(base_url)
            .map_err(|e| ServiceError::internal(format!("invalid upstream url {:?}: {}", base_url, e)))?;
        if base_url.cannot_be_a_base() {
            return Err(ServiceError::internal(format!("invalid upstream url {:?}", base_url.as_str())));
        }
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());
        Ok(Self { base_url, client, breaker })
    }

    fn url(&self, segments: &[&str]) -> Url {
        let mut url = self.base_url.clone();
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        url
    }

    /// Send through the breaker. Transport failures and 5xx answers count against it;
    /// a well-formed 4xx is a healthy reply and is decoded back into a `ServiceError`.
    async fn send<T: DeserializeOwned>(&self, request: RequestBuilder) -> CoreResult<T> {
        if !self.breaker.check().await {
            return Err(ServiceError::unavailable(format!("{} circuit open", self.breaker.name)));
        }

        let response = match request.send().await {
            Ok(response) => response,
            Err(e) => {
                self.breaker.record_failure().await;
                warn!("Call to {} failed: {}", self.breaker.name, e);
                return Err(ServiceError::unavailable(format!("{} unreachable: {}", self.breaker.name, e)));
            }
        };

        let status = response.status();
        if status.is_server_error() {
            self.breaker.record_failure().await;
        } else {
            self.breaker.record_success().await;
        }

        if status.is_success() {
            return response
                .json::<T>()
                .await
                .map_err(|e| ServiceError::internal(format!("invalid response from {}: {}", self.breaker.name, e)));
        }

        let body = response.bytes().await.unwrap_or_default();
        match serde_json::from_slice::<ErrorBody>(&body) {
            Ok(error) => Err(error.into_error()),
            Err(_) if status.is_server_error() => Err(ServiceError::unavailable(format!(
                "{} answered {}",
                self.breaker.name, status
            ))),
            Err(_) => Err(ServiceError::internal(format!(
                "{} answered {}: {}",
                self.breaker.name,
                status,
                String::from_utf8_lossy(&body)
            ))),
        }
    }
}

#[derive(Clone)]
pub struct RemoteUserDirectory {
    upstream: Upstream,
}

impl RemoteUserDirectory {
    pub fn new(base_url: &str, timeout: Duration, breaker: Arc<CircuitBreaker>) -> CoreResult<Self> {
        Ok(Self { upstream: Upstream::new(base_url, timeout, breaker)? })
    }
}

#[async_trait]
impl UserDirectory for RemoteUserDirectory {
    async fn create_user(&self, new_user: NewUser) -> CoreResult<User> {
        let url = self.upstream.url(&["v1", "users"]);
        self.upstream.send(self.upstream.client.post(url).json(&new_user)).await
    }

    async fn get_user(&self, id: &str) -> CoreResult<User> {
        require_id(id)?;
        let url = self.upstream.url(&["v1", "users", id]);
        self.upstream.send(self.upstream.client.get(url)).await
    }
}

#[derive(Clone)]
pub struct RemoteInventoryStore {
    upstream: Upstream,
}

impl RemoteInventoryStore {
    pub fn new(base_url: &str, timeout: Duration, breaker: Arc<CircuitBreaker>) -> CoreResult<Self> {
        Ok(Self { upstream: Upstream::new(base_url, timeout, breaker)? })
    }

    async fn settle(&self, item_id: &str, reservation_id: &str, action: &str) -> CoreResult<Item> {
        require_id(item_id)?;
        require_id(reservation_id)?;
        let url = self.upstream.url(&["v1", "items", item_id, "reservations", reservation_id, action]);
        self.upstream.send(self.upstream.client.post(url)).await
    }
}

#[async_trait]
impl InventoryStore for RemoteInventoryStore {
    async fn create_item(&self, new_item: NewItem) -> CoreResult<Item> {
        let url = self.upstream.url(&["v1", "items"]);
        self.upstream.send(self.upstream.client.post(url).json(&new_item)).await
    }

    async fn get_item(&self, id: &str) -> CoreResult<Item> {
        require_id(id)?;
        let url = self.upstream.url(&["v1", "items", id]);
        self.upstream.send(self.upstream.client.get(url)).await
    }

    async fn reserve_stock(&self, item_id: &str, quantity: i64) -> CoreResult<Reservation> {
        require_id(item_id)?;
        let url = self.upstream.url(&["v1", "items", item_id, "reservations"]);
        let request = self.upstream.client.post(url).json(&StockRequest { quantity });
        self.upstream.send(request).await
    }

    async fn commit_stock(&self, item_id: &str, reservation_id: &str) -> CoreResult<Item> {
        self.settle(item_id, reservation_id, "commit").await
    }

    async fn release_stock(&self, item_id: &str, reservation_id: &str) -> CoreResult<Item> {
        self.settle(item_id, reservation_id, "release").await
    }
}

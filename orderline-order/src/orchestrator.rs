use std::sync::Arc;
use std::time::Duration;

use tokio::sync::broadcast;
use tokio::time::{timeout_at, Instant};
use tracing::{error, info, warn};

use orderline_core::{
    CoreResult, IdGenerator, InventoryStore, NewOrder, Order, OrderStore, Precondition, Reservation,
    ServiceError, UserDirectory, UuidGenerator,
};
use orderline_shared::OrderPlacedEvent;

pub const DEFAULT_CALL_TIMEOUT: Duration = Duration::from_secs(2);

/// Places orders across the user, inventory and order stores.
///
/// Protocol per request: look the user up, reserve stock (the one atomic cross-service
/// write), persist the order, then commit the reservation so its stock can no longer be
/// released. No lock is held across the dependency calls; the
/// inventory store alone serializes competing reservations for an item.
pub struct OrderCoordinator {
    users: Arc<dyn UserDirectory>,
    inventory: Arc<dyn InventoryStore>,
    orders: Arc<dyn OrderStore>,
    ids: Arc<dyn IdGenerator>,
    call_timeout: Duration,
    events: Option<broadcast::Sender<OrderPlacedEvent>>,
}

impl OrderCoordinator {
    pub fn new(
        users: Arc<dyn UserDirectory>,
        inventory: Arc<dyn InventoryStore>,
        orders: Arc<dyn OrderStore>,
    ) -> Self {
        Self {
            users,
            inventory,
            orders,
            ids: Arc::new(UuidGenerator),
            call_timeout: DEFAULT_CALL_TIMEOUT,
            events: None,
        }
    }

    pub fn with_id_generator(mut self, ids: Arc<dyn IdGenerator>) -> Self {
        self.ids = ids;
        self
    }

    /// Deadline applied to requests that do not bring their own
    pub fn with_call_timeout(mut self, call_timeout: Duration) -> Self {
        self.call_timeout = call_timeout;
        self
    }

    pub fn with_events(mut self, events: broadcast::Sender<OrderPlacedEvent>) -> Self {
        self.events = Some(events);
        self
    }

    pub fn call_timeout(&self) -> Duration {
        self.call_timeout
    }

    pub async fn create_order(&self, request: NewOrder) -> CoreResult<Order> {
        self.create_order_within(request, self.call_timeout).await
    }

    /// Place an order; every dependency call must finish within `budget` of now.
    pub async fn create_order_within(&self, request: NewOrder, budget: Duration) -> CoreResult<Order> {
        request.validate()?;
        let deadline = Instant::now() + budget;

        // 1. User must exist
        match timeout_at(deadline, self.users.get_user(&request.user_id)).await {
            Err(_) => {
                warn!("User lookup for {} timed out", request.user_id);
                return Err(ServiceError::unavailable("user directory did not answer before the deadline"));
            }
            Ok(Ok(_)) => {}
            Ok(Err(ServiceError::Unavailable(msg))) => {
                warn!("User directory unavailable: {}", msg);
                return Err(ServiceError::Unavailable(msg));
            }
            Ok(Err(e)) => {
                warn!("Rejecting order for user {}: {}", request.user_id, e);
                return Err(ServiceError::PreconditionFailed(Precondition::UserNotFound));
            }
        }

        // 2. Reserve stock (existence + sufficiency + decrement in one step)
        let reserve = self.inventory.reserve_stock(&request.item_id, request.quantity);
        let reservation = match timeout_at(deadline, reserve).await {
            Err(_) => {
                warn!("Stock reservation for {} timed out", request.item_id);
                return Err(ServiceError::unavailable("inventory did not answer before the deadline"));
            }
            Ok(Ok(reservation)) => reservation,
            Ok(Err(ServiceError::PreconditionFailed(reason @ Precondition::InsufficientStock { .. }))) => {
                warn!("Not enough stock of {} for {} units", request.item_id, request.quantity);
                return Err(ServiceError::PreconditionFailed(reason));
            }
            Ok(Err(ServiceError::Unavailable(msg))) => {
                warn!("Inventory unavailable: {}", msg);
                return Err(ServiceError::Unavailable(msg));
            }
            Ok(Err(e)) => {
                warn!("Rejecting order for item {}: {}", request.item_id, e);
                return Err(ServiceError::PreconditionFailed(Precondition::ItemNotFound));
            }
        };

        // 3. Persist, handing the stock back if the order cannot be stored
        let order = Order::new(self.ids.next_id(), &request);
        let order = match self.orders.insert_order(order).await {
            Ok(order) => order,
            Err(e) => {
                error!("Failed to store order for item {}: {}", request.item_id, e);
                self.release_reservation(&request.item_id, &reservation).await;
                return Err(ServiceError::internal("order could not be stored"));
            }
        };

        // 4. The stock now backs a stored order and can never be released
        self.commit_reservation(&order.item_id, &reservation).await;

        let remaining = reservation.item.quantity;
        info!(
            "Order placed: {} (user {}, item {}, quantity {}, {} left)",
            order.id, order.user_id, order.item_id, order.quantity, remaining
        );

        if let Some(events) = &self.events {
            // No subscribers is fine
            let _ = events.send(OrderPlacedEvent {
                order_id: order.id.clone(),
                user_id: order.user_id.clone(),
                item_id: order.item_id.clone(),
                quantity: order.quantity,
                remaining_stock: remaining,
                timestamp: chrono::Utc::now().timestamp(),
            });
        }

        Ok(order)
    }

    /// Pure lookup; an empty id simply matches no order.
    pub async fn get_order(&self, id: &str) -> CoreResult<Order> {
        if id.trim().is_empty() {
            return Err(ServiceError::not_found("order id is empty"));
        }
        self.orders.get_order(id).await
    }

    /// Compensating action for a reservation whose order was never stored.
    ///
    /// Runs on its own timeout, independent of the request deadline. A failure here leaves
    /// an abandoned reservation (stock is under-counted, never oversold) which is logged.
    async fn release_reservation(&self, item_id: &str, reservation: &Reservation) {
        let release = self.inventory.release_stock(item_id, &reservation.id);
        match tokio::time::timeout(self.call_timeout, release).await {
            Ok(Ok(item)) => {
                info!("Released {} units of {} ({} available)", reservation.quantity, item.id, item.quantity);
            }
            Ok(Err(e)) => {
                error!(
                    "Abandoned reservation {}: {} units of {} could not be released: {}",
                    reservation.id, reservation.quantity, item_id, e
                );
            }
            Err(_) => {
                error!(
                    "Abandoned reservation {}: releasing {} units of {} timed out",
                    reservation.id, reservation.quantity, item_id
                );
            }
        }
    }

    /// A failed commit leaves the order intact; the reservation just stays outstanding
    /// with nobody holding its id.
    async fn commit_reservation(&self, item_id: &str, reservation: &Reservation) {
        let commit = self.inventory.commit_stock(item_id, &reservation.id);
        match tokio::time::timeout(self.call_timeout, commit).await {
            Ok(Ok(_)) => {}
            Ok(Err(e)) => warn!("Reservation {} of {} not committed: {}", reservation.id, item_id, e),
            Err(_) => warn!("Committing reservation {} of {} timed out", reservation.id, item_id),
        }
    }
}

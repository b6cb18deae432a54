/// Published once an order has been persisted.
#[derive(Debug, serde::Serialize, serde::Deserialize, Clone, PartialEq, Eq)]
pub struct OrderPlacedEvent {
    pub order_id: String,
    pub user_id: String,
    pub item_id: String,
    pub quantity: i64,
    /// Item quantity left after the reservation for this order.
    pub remaining_stock: i64,
    pub timestamp: i64,
}

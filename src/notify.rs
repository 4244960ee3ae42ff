//! Boundary events for the external notification dispatcher.
//!
//! The engine only decides what happened and who should hear about it;
//! delivery (push, email, WhatsApp links) is a collaborator's concern.

use super::money::Currency;
use super::order::OrderStatus;
use super::trade::{TradeManifest, TradeStatus};

/// Emitted on every order status transition. The recipient is always the
/// non-acting party.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderEvent {
    pub order_id: String,
    pub new_status: OrderStatus,
    pub latest_price: Option<u64>,
    pub latest_currency: Option<Currency>,
    pub recipient: String,
}

/// Emitted on every trade transition, carrying the manifest snapshot the
/// transition applied to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TradeEvent {
    pub trade_id: String,
    pub new_status: TradeStatus,
    pub manifest: TradeManifest,
    pub recipient: String,
}

pub trait Notifier: Send + Sync {
    fn order_update(&self, event: OrderEvent);
    fn trade_update(&self, event: TradeEvent);
}

/// Drops every event. Useful for embedders that poll instead of push.
pub struct NullNotifier;

impl Notifier for NullNotifier {
    fn order_update(&self, _: OrderEvent) {}
    fn trade_update(&self, _: TradeEvent) {}
}

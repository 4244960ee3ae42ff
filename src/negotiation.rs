//! Service layer for order negotiation.
//!
//! Each operation loads the order, applies the pure state-machine op,
//! persists the result and emits an event to the non-acting party. The
//! ledger is never touched from here.

use super::error::EngineError;
use super::money::Currency;
use super::notify::{Notifier, OrderEvent};
use super::order::{Intent, LineItem, Order, Sender};
use std::sync::Arc;
use tracing::info;

pub const ORDERS_TREE: &str = "orders";

/// Opening user offer carried on an intent submission.
#[derive(Debug, Clone)]
pub struct OpeningOffer {
    pub price: u64,
    pub currency: Currency,
}

/// Intake payload from the storefront forms.
#[derive(Debug, Clone)]
pub struct IntentSubmission {
    pub owner_id: String,
    pub intent: Intent,
    pub line_items: Vec<LineItem>,
    pub initial_offer: Option<OpeningOffer>,
    pub message: Option<String>,
}

#[derive(Clone)]
pub struct OrderService {
    orders: sled::Tree,
    store_party_id: String,
    notifier: Arc<dyn Notifier>,
}

impl OrderService {
    pub fn new(
        db: Arc<sled::Db>,
        store_party_id: &str,
        notifier: Arc<dyn Notifier>,
    ) -> anyhow::Result<Self> {
        Ok(Self {
            orders: db.open_tree(ORDERS_TREE)?,
            store_party_id: store_party_id.to_string(),
            notifier,
        })
    }

    fn load(&self, order_id: &str) -> anyhow::Result<Order> {
        let raw = self
            .orders
            .get(order_id.as_bytes())?
            .ok_or_else(|| EngineError::NotFound(order_id.to_string()))?;
        let order = minicbor::decode(raw.as_ref())
            .map_err(|_| EngineError::CorruptRecord(order_id.to_string()))?;
        Ok(order)
    }

    fn save(&self, order: &Order) -> anyhow::Result<()> {
        self.orders
            .insert(order.id.as_bytes(), minicbor::to_vec(order)?)?;
        Ok(())
    }

    fn recipient_for(&self, order: &Order, actor: Sender) -> String {
        match actor {
            Sender::User => self.store_party_id.clone(),
            Sender::Admin => order.owner_id.clone(),
        }
    }

    fn emit(&self, order: &Order, actor: Sender) {
        let latest = order.latest_offer();
        self.notifier.order_update(OrderEvent {
            order_id: order.id.clone(),
            new_status: order.status,
            latest_price: latest.map(|o| o.price),
            latest_currency: latest.map(|o| o.currency),
            recipient: self.recipient_for(order, actor),
        });
    }

    /// Create an order from a buy/sell intent, with the optional opening
    /// user offer already on the history.
    pub fn submit_intent(&self, submission: IntentSubmission) -> anyhow::Result<Order> {
        let mut order = Order::new(
            &submission.owner_id,
            submission.intent,
            submission.line_items,
        )?;
        if let Some(opening) = submission.initial_offer {
            order.submit_initial_offer(
                opening.price,
                opening.currency,
                Sender::User,
                submission.message,
            )?;
        }

        self.save(&order)?;
        info!(order_id = %order.id, intent = ?order.intent, "order intent submitted");
        self.emit(&order, Sender::User);
        Ok(order)
    }

    pub fn get_order(&self, order_id: &str) -> anyhow::Result<Order> {
        self.load(order_id)
    }

    /// Store-side price on the lot.
    pub fn set_counter_offer(
        &self,
        order_id: &str,
        price: u64,
        currency: Currency,
        message: Option<String>,
    ) -> anyhow::Result<Order> {
        let mut order = self.load(order_id)?;
        order.set_counter_offer(price, currency, message)?;
        self.save(&order)?;
        info!(order_id = %order.id, status = ?order.status, price, "store countered");
        self.emit(&order, Sender::Admin);
        Ok(order)
    }

    /// Customer counter. Resubmitting the standing user price changes
    /// nothing and emits nothing.
    pub fn submit_user_counter(
        &self,
        order_id: &str,
        price: u64,
        currency: Currency,
        message: Option<String>,
    ) -> anyhow::Result<Order> {
        let mut order = self.load(order_id)?;
        let appended = order.submit_user_counter(price, currency, message)?;
        if appended {
            self.save(&order)?;
            info!(order_id = %order.id, price, "user countered");
            self.emit(&order, Sender::User);
        }
        Ok(order)
    }

    /// Either side takes the other's standing offer; terminal success.
    pub fn accept(&self, order_id: &str, actor: Sender) -> anyhow::Result<Order> {
        let mut order = self.load(order_id)?;
        order.accept(actor)?;
        self.save(&order)?;
        info!(order_id = %order.id, actor = ?actor, "order settled");
        self.emit(&order, actor);
        Ok(order)
    }

    pub fn cancel(&self, order_id: &str, actor: Sender) -> anyhow::Result<Order> {
        let mut order = self.load(order_id)?;
        order.cancel()?;
        self.save(&order)?;
        info!(order_id = %order.id, actor = ?actor, "order cancelled");
        self.emit(&order, actor);
        Ok(order)
    }
}

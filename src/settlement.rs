//! Service layer for trade resolution and the settlement step.
//!
//! Manifests are speculative until acceptance; nothing is reserved while a
//! trade sits open. Settlement is the single serialization point: the stock
//! of every manifest item is re-checked and decremented inside one ledger
//! transaction, so of two racing accepts over overlapping items exactly one
//! commits and the other fails with the ledger intact.

use super::error::EngineError;
use super::ledger::{InventoryItem, InventoryLedger};
use super::notify::{Notifier, TradeEvent};
use super::timestamp::TimeStamp;
use super::trade::{Trade, TradeManifest};
use chrono::Utc;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{info, warn};

pub const TRADES_TREE: &str = "trades";
pub const SETTLEMENTS_TREE: &str = "settlements";

/// Bookkeeping line written when a trade settles. No money moves; the cash
/// side of the barter is recorded for audit only.
#[derive(minicbor::Encode, minicbor::Decode, Debug, Clone, PartialEq, Eq)]
pub struct SettlementNote {
    #[n(0)]
    pub trade_id: String,
    #[n(1)]
    pub manifest_hash: String,
    #[n(2)]
    pub cash_adjustment: i64,
    #[n(3)]
    pub settled_at: TimeStamp<Utc>,
}

#[derive(Clone)]
pub struct TradeService {
    trades: sled::Tree,
    settlements: sled::Tree,
    ledger: InventoryLedger,
    store_party_id: String,
    notifier: Arc<dyn Notifier>,
}

impl TradeService {
    pub fn new(
        db: Arc<sled::Db>,
        store_party_id: &str,
        notifier: Arc<dyn Notifier>,
    ) -> anyhow::Result<Self> {
        Ok(Self {
            trades: db.open_tree(TRADES_TREE)?,
            settlements: db.open_tree(SETTLEMENTS_TREE)?,
            ledger: InventoryLedger::new(&db)?,
            store_party_id: store_party_id.to_string(),
            notifier,
        })
    }

    pub fn ledger(&self) -> &InventoryLedger {
        &self.ledger
    }

    fn load(&self, trade_id: &str) -> anyhow::Result<Trade> {
        let raw = self
            .trades
            .get(trade_id.as_bytes())?
            .ok_or_else(|| EngineError::NotFound(trade_id.to_string()))?;
        let trade = minicbor::decode(raw.as_ref())
            .map_err(|_| EngineError::CorruptRecord(trade_id.to_string()))?;
        Ok(trade)
    }

    fn save(&self, trade: &Trade) -> anyhow::Result<()> {
        self.trades
            .insert(trade.id.as_bytes(), minicbor::to_vec(trade)?)?;
        Ok(())
    }

    fn emit(&self, trade: &Trade, recipient: &str) {
        self.notifier.trade_update(TradeEvent {
            trade_id: trade.id.clone(),
            new_status: trade.status,
            manifest: trade.manifest().clone(),
            recipient: recipient.to_string(),
        });
    }

    /// Propose a barter. Without an explicit counterparty the trade goes to
    /// the store side.
    pub fn open_trade(
        &self,
        sender_id: &str,
        counterparty: Option<&str>,
        manifest: TradeManifest,
    ) -> anyhow::Result<Trade> {
        let counterparty = counterparty.unwrap_or(&self.store_party_id);
        let trade = Trade::open(sender_id, counterparty, manifest)?;

        self.save(&trade)?;
        info!(trade_id = %trade.id, sender = %sender_id, counterparty = %counterparty, "trade opened");
        self.emit(&trade, counterparty);
        Ok(trade)
    }

    pub fn get_trade(&self, trade_id: &str) -> anyhow::Result<Trade> {
        self.load(trade_id)
    }

    pub fn propose_counter(
        &self,
        trade_id: &str,
        manifest: TradeManifest,
        actor_id: &str,
    ) -> anyhow::Result<Trade> {
        let mut trade = self.load(trade_id)?;
        trade.propose_counter(manifest, actor_id)?;
        self.save(&trade)?;
        info!(trade_id = %trade.id, actor = %actor_id, "counter-offer proposed");
        self.emit(&trade, &trade.current_turn.clone());
        Ok(trade)
    }

    pub fn decline(&self, trade_id: &str, actor_id: &str) -> anyhow::Result<Trade> {
        let mut trade = self.load(trade_id)?;
        trade.decline(actor_id)?;
        self.save(&trade)?;
        info!(trade_id = %trade.id, actor = %actor_id, "trade declined");
        self.emit(&trade, trade.other_participant(actor_id));
        Ok(trade)
    }

    /// Accept the standing manifest and settle it. Stock moves for every
    /// listed item or for none; on any settlement failure the trade record
    /// is not written and stays exactly as loaded.
    pub fn accept(&self, trade_id: &str, actor_id: &str) -> anyhow::Result<Trade> {
        let mut trade = self.load(trade_id)?;
        trade.authorize_accept(actor_id)?;

        let item_ids = trade.manifest().item_ids();
        if let Err(e) = self.ledger.settle_decrement(&item_ids) {
            warn!(trade_id = %trade.id, error = %e, "settlement failed, trade left open");
            return Err(e);
        }

        let note = SettlementNote {
            trade_id: trade.id.clone(),
            manifest_hash: trade.current.hash.clone(),
            cash_adjustment: trade.manifest().cash_adjustment,
            settled_at: TimeStamp::now(),
        };
        self.settlements
            .insert(trade.id.as_bytes(), minicbor::to_vec(&note)?)?;

        trade.mark_accepted();
        self.save(&trade)?;
        info!(trade_id = %trade.id, items = item_ids.len(), cash = note.cash_adjustment, "trade settled");
        self.emit(&trade, trade.other_participant(actor_id));
        Ok(trade)
    }

    /// Audit line recorded at settlement, if the trade has settled.
    pub fn settlement_note(&self, trade_id: &str) -> anyhow::Result<Option<SettlementNote>> {
        match self.settlements.get(trade_id.as_bytes())? {
            Some(raw) => {
                let note = minicbor::decode(raw.as_ref())
                    .map_err(|_| EngineError::CorruptRecord(trade_id.to_string()))?;
                Ok(Some(note))
            }
            None => Ok(None),
        }
    }

    /// Resolve manifest items for display. Unknown IDs are omitted; the
    /// caller decides how to flag them.
    pub fn manifest_details(
        &self,
        manifest: &TradeManifest,
    ) -> anyhow::Result<BTreeMap<String, InventoryItem>> {
        let ids: Vec<String> = manifest.item_ids().into_iter().collect();
        self.ledger.get_items_by_ids(&ids)
    }
}

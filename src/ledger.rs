//! Inventory ledger: item identity, price, grading and stock.
//!
//! The ledger is the only shared mutable resource with a hard invariant
//! (stock never goes negative), so every read-then-write runs inside one
//! sled transaction. Trades over disjoint item sets settle without
//! contention; overlapping sets serialize on the transaction.

use super::error::EngineError;
use super::ids;
use super::money::Currency;
use sled::transaction::{ConflictableTransactionError, TransactionError};
use std::collections::{BTreeMap, BTreeSet};

pub const INVENTORY_TREE: &str = "inventory";

/// Goldmine-style record grading. `Mixed` covers bundle lots.
#[derive(minicbor::Encode, minicbor::Decode, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Condition {
    #[n(0)]
    Mint,
    #[n(1)]
    NearMint,
    #[n(2)]
    VgPlus,
    #[n(3)]
    VeryGood,
    #[n(4)]
    GoodPlus,
    #[n(5)]
    Good,
    #[n(6)]
    Fair,
    #[n(7)]
    Poor,
    #[n(8)]
    Mixed,
}

/// Items are archived rather than deleted so an open trade can always
/// resolve the IDs in its manifest.
#[derive(minicbor::Encode, minicbor::Decode, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ItemStatus {
    #[n(0)]
    Active,
    #[n(1)]
    SoldOut,
    #[n(2)]
    Archived,
}

#[derive(minicbor::Encode, minicbor::Decode, Debug, Clone, PartialEq, Eq)]
pub struct InventoryItem {
    #[n(0)]
    pub id: String,
    #[n(1)]
    pub title: String,
    #[n(2)]
    pub artist: String,
    #[n(3)]
    pub condition: Condition,
    #[n(4)]
    pub price: u64, // minor units
    #[n(5)]
    pub currency: Currency,
    #[n(6)]
    pub stock: u32,
    #[n(7)]
    pub status: ItemStatus,
}

impl InventoryItem {
    pub fn new(
        title: &str,
        artist: &str,
        condition: Condition,
        price: u64,
        currency: Currency,
        stock: u32,
    ) -> anyhow::Result<Self> {
        let status = if stock > 0 {
            ItemStatus::Active
        } else {
            ItemStatus::SoldOut
        };

        Ok(Self {
            id: ids::item_id()?,
            title: title.to_string(),
            artist: artist.to_string(),
            condition,
            price,
            currency,
            stock,
            status,
        })
    }
}

/// Inventory health summary for the admin console.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct LedgerAudit {
    pub total: usize,
    pub low_stock: Vec<String>,
    pub sold_out: Vec<String>,
    pub value_by_currency: BTreeMap<Currency, u64>,
}

/// Cloneable handle over the inventory tree. All stock mutation goes through
/// the transactional methods below.
#[derive(Clone)]
pub struct InventoryLedger {
    tree: sled::Tree,
}

impl InventoryLedger {
    pub fn new(db: &sled::Db) -> anyhow::Result<Self> {
        Ok(Self {
            tree: db.open_tree(INVENTORY_TREE)?,
        })
    }

    pub fn put_item(&self, item: &InventoryItem) -> anyhow::Result<()> {
        self.tree
            .insert(item.id.as_bytes(), minicbor::to_vec(item)?)?;
        Ok(())
    }

    pub fn get_item(&self, id: &str) -> anyhow::Result<Option<InventoryItem>> {
        match self.tree.get(id.as_bytes())? {
            Some(raw) => {
                let item = minicbor::decode(raw.as_ref())
                    .map_err(|_| EngineError::CorruptRecord(id.to_string()))?;
                Ok(Some(item))
            }
            None => Ok(None),
        }
    }

    /// Batch lookup for display. Unknown IDs are simply absent from the
    /// result; the caller decides how to flag missing entries.
    pub fn get_items_by_ids(
        &self,
        ids: &[String],
    ) -> anyhow::Result<BTreeMap<String, InventoryItem>> {
        let mut found = BTreeMap::new();
        for id in ids {
            if let Some(item) = self.get_item(id)? {
                found.insert(id.clone(), item);
            }
        }
        Ok(found)
    }

    /// Atomic check-and-decrement for the storefront purchase path.
    /// Re-reads stock inside the transaction, so two concurrent reservations
    /// of the last copy cannot both succeed.
    pub fn reserve(&self, id: &str, qty: u32) -> anyhow::Result<InventoryItem> {
        let result = self.tree.transaction(|tx| {
            let raw = tx.get(id.as_bytes())?.ok_or_else(|| {
                ConflictableTransactionError::Abort(EngineError::NotFound(id.to_string()))
            })?;
            let mut item: InventoryItem = minicbor::decode(raw.as_ref()).map_err(|_| {
                ConflictableTransactionError::Abort(EngineError::CorruptRecord(id.to_string()))
            })?;

            if item.stock < qty {
                return Err(ConflictableTransactionError::Abort(
                    EngineError::InsufficientStock(vec![id.to_string()]),
                ));
            }

            item.stock -= qty;
            if item.stock == 0 {
                item.status = ItemStatus::SoldOut;
            }

            let bytes = minicbor::to_vec(&item).map_err(|_| {
                ConflictableTransactionError::Abort(EngineError::CorruptRecord(id.to_string()))
            })?;
            tx.insert(id.as_bytes(), bytes)?;

            Ok(item)
        });

        match result {
            Ok(item) => Ok(item),
            Err(TransactionError::Abort(e)) => Err(e.into()),
            Err(TransactionError::Storage(e)) => Err(e.into()),
        }
    }

    /// Settlement batch: every listed item loses exactly one unit, or none
    /// do. All stocks are re-read and verified inside the same transaction
    /// that performs the decrements, so whichever settlement commits first
    /// wins and a racing one fails with `InsufficientStock`.
    pub fn settle_decrement(&self, ids: &BTreeSet<String>) -> anyhow::Result<()> {
        let result = self.tree.transaction(|tx| {
            let mut items = Vec::with_capacity(ids.len());
            let mut depleted: Vec<String> = Vec::new();

            for id in ids {
                let raw = tx.get(id.as_bytes())?.ok_or_else(|| {
                    ConflictableTransactionError::Abort(EngineError::NotFound(id.clone()))
                })?;
                let item: InventoryItem = minicbor::decode(raw.as_ref()).map_err(|_| {
                    ConflictableTransactionError::Abort(EngineError::CorruptRecord(id.clone()))
                })?;

                if item.stock == 0 {
                    depleted.push(id.clone());
                } else {
                    items.push(item);
                }
            }

            // every item must pass the stock check before the first write
            if !depleted.is_empty() {
                return Err(ConflictableTransactionError::Abort(
                    EngineError::InsufficientStock(depleted),
                ));
            }

            for mut item in items {
                item.stock -= 1;
                if item.stock == 0 {
                    item.status = ItemStatus::SoldOut;
                }
                let bytes = minicbor::to_vec(&item).map_err(|_| {
                    ConflictableTransactionError::Abort(EngineError::CorruptRecord(item.id.clone()))
                })?;
                tx.insert(item.id.as_bytes(), bytes)?;
            }

            Ok(())
        });

        match result {
            Ok(()) => {
                tracing::debug!(count = ids.len(), "settlement decremented stock");
                Ok(())
            }
            Err(TransactionError::Abort(e)) => Err(e.into()),
            Err(TransactionError::Storage(e)) => Err(e.into()),
        }
    }

    /// Soft delete. The record stays resolvable for open trades.
    pub fn archive_item(&self, id: &str) -> anyhow::Result<InventoryItem> {
        let mut item = self
            .get_item(id)?
            .ok_or_else(|| EngineError::NotFound(id.to_string()))?;
        item.status = ItemStatus::Archived;
        self.put_item(&item)?;
        Ok(item)
    }

    /// Inventory health summary: counts, low-stock and sold-out IDs, and
    /// catalog value per currency.
    pub fn audit(&self) -> anyhow::Result<LedgerAudit> {
        let mut audit = LedgerAudit::default();

        for entry in self.tree.iter() {
            let (key, raw) = entry?;
            let item: InventoryItem = minicbor::decode(raw.as_ref()).map_err(|_| {
                EngineError::CorruptRecord(String::from_utf8_lossy(key.as_ref()).into_owned())
            })?;

            audit.total += 1;
            if item.stock == 0 {
                audit.sold_out.push(item.id.clone());
            } else if item.stock <= 2 {
                audit.low_stock.push(item.id.clone());
            }
            let value = audit.value_by_currency.entry(item.currency).or_insert(0);
            *value += item.price * item.stock as u64;
        }

        Ok(audit)
    }
}

//! Barter trades: manifest construction and the two-party counter loop.
//!
//! A manifest is a value object; a counter-offer installs a whole new
//! manifest and the replaced revision is kept for audit. Each revision is
//! content-addressed by the sha256 of its CBOR encoding. Exactly one
//! participant holds the turn at any time; declining is the escape hatch
//! available to both sides regardless of turn.

use super::error::{EngineError, ValidationError};
use super::ids;
use super::timestamp::TimeStamp;
use chrono::Utc;
use std::collections::BTreeSet;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ManifestSide {
    Offered,
    Requested,
}

/// Item sets each side puts on the table plus a signed cash adjustment
/// (positive means the proposer receives cash). No item may sit on both
/// sides of one manifest.
#[derive(minicbor::Encode, minicbor::Decode, Debug, Clone, Default, PartialEq, Eq)]
pub struct TradeManifest {
    #[n(0)]
    pub offered_items: Vec<String>,
    #[n(1)]
    pub requested_items: Vec<String>,
    #[n(2)]
    pub cash_adjustment: i64,
}

impl TradeManifest {
    pub fn new() -> Self {
        Self::default()
    }

    fn side(&self, side: ManifestSide) -> &Vec<String> {
        match side {
            ManifestSide::Offered => &self.offered_items,
            ManifestSide::Requested => &self.requested_items,
        }
    }

    fn side_mut(&mut self, side: ManifestSide) -> &mut Vec<String> {
        match side {
            ManifestSide::Offered => &mut self.offered_items,
            ManifestSide::Requested => &mut self.requested_items,
        }
    }

    pub fn contains(&self, item_id: &str, side: ManifestSide) -> bool {
        self.side(side).iter().any(|id| id == item_id)
    }

    /// Adding to one side rejects an item already listed on the other;
    /// re-adding to the same side is a no-op.
    pub fn add_item(&mut self, item_id: &str, side: ManifestSide) -> Result<(), ValidationError> {
        let other = match side {
            ManifestSide::Offered => ManifestSide::Requested,
            ManifestSide::Requested => ManifestSide::Offered,
        };
        if self.contains(item_id, other) {
            return Err(ValidationError::OverlappingItem(item_id.to_string()));
        }
        if !self.contains(item_id, side) {
            self.side_mut(side).push(item_id.to_string());
        }
        Ok(())
    }

    pub fn remove_item(&mut self, item_id: &str, side: ManifestSide) {
        self.side_mut(side).retain(|id| id != item_id);
    }

    pub fn set_cash_adjustment(&mut self, amount: i64) {
        self.cash_adjustment = amount;
    }

    /// Deduplicated union of both sides, the set settlement operates on.
    pub fn item_ids(&self) -> BTreeSet<String> {
        self.offered_items
            .iter()
            .chain(self.requested_items.iter())
            .cloned()
            .collect()
    }

    /// Manifests arrive whole from callers, so the invariants are
    /// re-checked at the engine boundary as well as in the editor.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.offered_items.is_empty() && self.requested_items.is_empty() {
            return Err(ValidationError::EmptyManifest);
        }
        for id in &self.offered_items {
            if self.contains(id, ManifestSide::Requested) {
                return Err(ValidationError::OverlappingItem(id.clone()));
            }
        }
        Ok(())
    }
}

/// One attached manifest revision, content-addressed for audit references.
#[derive(minicbor::Encode, minicbor::Decode, Debug, Clone, PartialEq, Eq)]
pub struct ManifestRevision {
    #[n(0)]
    pub manifest: TradeManifest,
    #[n(1)]
    pub proposed_by: String,
    #[n(2)]
    pub proposed_at: TimeStamp<Utc>,
    #[n(3)]
    pub hash: String,
}

impl ManifestRevision {
    pub fn new(manifest: TradeManifest, proposed_by: &str) -> Result<Self, EngineError> {
        let hash = manifest_hash(&manifest)?;
        Ok(Self {
            manifest,
            proposed_by: proposed_by.to_string(),
            proposed_at: TimeStamp::now(),
            hash,
        })
    }
}

pub fn manifest_hash(manifest: &TradeManifest) -> Result<String, EngineError> {
    let cbor = minicbor::to_vec(manifest)
        .map_err(|_| EngineError::CorruptRecord("manifest".to_string()))?;
    Ok(sha256::digest(&cbor))
}

#[derive(minicbor::Encode, minicbor::Decode, Debug, Clone, Copy, PartialEq, Eq)]
pub enum TradeStatus {
    #[n(0)]
    Pending,
    #[n(1)]
    CounterOffer,
    #[n(2)]
    Accepted,
    #[n(3)]
    Cancelled,
}

impl TradeStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, TradeStatus::Accepted | TradeStatus::Cancelled)
    }
}

#[derive(minicbor::Encode, minicbor::Decode, Debug, Clone, PartialEq, Eq)]
pub struct Participants {
    #[n(0)]
    pub sender_id: String,
    #[n(1)]
    pub counterparty_id: String,
}

#[derive(minicbor::Encode, minicbor::Decode, Debug, Clone, PartialEq, Eq)]
pub struct Trade {
    #[n(0)]
    pub id: String,
    #[n(1)]
    pub participants: Participants,
    #[n(2)]
    pub current: ManifestRevision,
    #[n(3)]
    pub status: TradeStatus,
    #[n(4)]
    pub current_turn: String,
    #[n(5)]
    pub history: Vec<ManifestRevision>,
    #[n(6)]
    pub created_at: TimeStamp<Utc>,
}

impl Trade {
    /// A fresh trade waits on the receiving side, so the counterparty
    /// holds the opening turn.
    pub fn open(
        sender_id: &str,
        counterparty_id: &str,
        manifest: TradeManifest,
    ) -> anyhow::Result<Self> {
        manifest.validate()?;
        Ok(Self {
            id: ids::trade_id()?,
            participants: Participants {
                sender_id: sender_id.to_string(),
                counterparty_id: counterparty_id.to_string(),
            },
            current: ManifestRevision::new(manifest, sender_id)?,
            status: TradeStatus::Pending,
            current_turn: counterparty_id.to_string(),
            history: Vec::new(),
            created_at: TimeStamp::now(),
        })
    }

    pub fn manifest(&self) -> &TradeManifest {
        &self.current.manifest
    }

    pub fn is_participant(&self, actor_id: &str) -> bool {
        actor_id == self.participants.sender_id || actor_id == self.participants.counterparty_id
    }

    pub fn other_participant(&self, actor_id: &str) -> &str {
        if actor_id == self.participants.sender_id {
            &self.participants.counterparty_id
        } else {
            &self.participants.sender_id
        }
    }

    fn reject_if_terminal(&self) -> Result<(), EngineError> {
        if self.status.is_terminal() {
            return Err(EngineError::TerminalState {
                id: self.id.clone(),
                state: format!("{:?}", self.status),
            });
        }
        Ok(())
    }

    fn reject_out_of_turn(&self, actor_id: &str) -> Result<(), EngineError> {
        if actor_id != self.current_turn {
            return Err(EngineError::TurnViolation {
                actor: actor_id.to_string(),
                expected: self.current_turn.clone(),
            });
        }
        Ok(())
    }

    /// Replace the manifest with a new revision, archive the old one and
    /// hand the turn to the other participant.
    pub fn propose_counter(
        &mut self,
        manifest: TradeManifest,
        actor_id: &str,
    ) -> Result<(), EngineError> {
        self.reject_if_terminal()?;
        self.reject_out_of_turn(actor_id)?;
        manifest.validate()?;

        let next = ManifestRevision::new(manifest, actor_id)?;
        let previous = std::mem::replace(&mut self.current, next);
        self.history.push(previous);
        self.current_turn = self.other_participant(actor_id).to_string();
        self.status = TradeStatus::CounterOffer;
        Ok(())
    }

    /// Either participant may walk away at any non-terminal state; no turn
    /// check, so a counterparty is never stuck waiting.
    pub fn decline(&mut self, actor_id: &str) -> Result<(), EngineError> {
        self.reject_if_terminal()?;
        if !self.is_participant(actor_id) {
            return Err(ValidationError::NotAParticipant(actor_id.to_string()).into());
        }
        self.status = TradeStatus::Cancelled;
        Ok(())
    }

    /// Pre-settlement checks for an accept. State is untouched; the caller
    /// runs settlement and only then marks the trade accepted.
    pub fn authorize_accept(&self, actor_id: &str) -> Result<(), EngineError> {
        self.reject_if_terminal()?;
        self.reject_out_of_turn(actor_id)?;
        self.manifest().validate()?;
        Ok(())
    }

    pub(crate) fn mark_accepted(&mut self) {
        self.status = TradeStatus::Accepted;
    }
}

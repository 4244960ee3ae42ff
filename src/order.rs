//! Order negotiation: a two-party price-discovery loop over a single lot.
//!
//! The order keeps an append-only offer history as its audit trail. The
//! current standing offers per side are derived fields updated on every
//! append, so readers never scan the log. This subsystem never mutates the
//! inventory ledger; a settled order is flipped to fulfilment elsewhere.

use super::error::{EngineError, ValidationError};
use super::ids;
use super::money::Currency;
use super::timestamp::TimeStamp;
use chrono::Utc;

#[derive(minicbor::Encode, minicbor::Decode, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Intent {
    #[n(0)]
    Buy,
    #[n(1)]
    Sell,
}

#[derive(minicbor::Encode, minicbor::Decode, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Sender {
    #[n(0)]
    User,
    #[n(1)]
    Admin,
}

impl Sender {
    pub fn other(&self) -> Sender {
        match self {
            Sender::User => Sender::Admin,
            Sender::Admin => Sender::User,
        }
    }
}

/// Closed status set with a central transition table. `Settled` and
/// `Cancelled` are terminal; no transition leaves them.
#[derive(minicbor::Encode, minicbor::Decode, Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrderStatus {
    #[n(0)]
    Pending,
    #[n(1)]
    Quoted,
    #[n(2)]
    CounterOffered,
    #[n(3)]
    Negotiating,
    #[n(4)]
    Settled,
    #[n(5)]
    Cancelled,
}

impl OrderStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, OrderStatus::Settled | OrderStatus::Cancelled)
    }

    /// The only legal moves between statuses. Anything else is rejected
    /// centrally, so an undefined status path cannot be reached.
    pub fn may_transition(from: OrderStatus, to: OrderStatus) -> bool {
        use OrderStatus::*;
        match from {
            Pending => matches!(to, Quoted | CounterOffered | Negotiating | Settled | Cancelled),
            Quoted => matches!(to, CounterOffered | Negotiating | Settled | Cancelled),
            CounterOffered => {
                matches!(to, CounterOffered | Negotiating | Settled | Cancelled)
            }
            Negotiating => {
                matches!(to, Quoted | CounterOffered | Negotiating | Settled | Cancelled)
            }
            Settled | Cancelled => false,
        }
    }
}

/// Descriptive line item from the intake form. Free-text condition, not
/// linked to ledger stock.
#[derive(minicbor::Encode, minicbor::Decode, Debug, Clone, PartialEq, Eq)]
pub struct LineItem {
    #[n(0)]
    pub title: String,
    #[n(1)]
    pub artist: String,
    #[n(2)]
    pub format: String,
    #[n(3)]
    pub condition: String,
    #[n(4)]
    pub price: Option<u64>,
}

/// One negotiation-history entry. The timestamp is engine-assigned at
/// append time.
#[derive(minicbor::Encode, minicbor::Decode, Debug, Clone, PartialEq, Eq)]
pub struct Offer {
    #[n(0)]
    pub price: u64,
    #[n(1)]
    pub currency: Currency,
    #[n(2)]
    pub sender: Sender,
    #[n(3)]
    pub at: TimeStamp<Utc>,
    #[n(4)]
    pub message: Option<String>,
}

#[derive(minicbor::Encode, minicbor::Decode, Debug, Clone, PartialEq, Eq)]
pub struct Order {
    #[n(0)]
    pub id: String,
    #[n(1)]
    pub owner_id: String,
    #[n(2)]
    pub intent: Intent,
    #[n(3)]
    pub status: OrderStatus,
    #[n(4)]
    pub line_items: Vec<LineItem>,
    #[n(5)]
    pub history: Vec<Offer>,
    // derived from the history on every append, never written directly
    #[n(6)]
    pub last_admin_offer: Option<Offer>,
    #[n(7)]
    pub last_user_offer: Option<Offer>,
    #[n(8)]
    pub created_at: TimeStamp<Utc>,
}

impl Order {
    pub fn new(owner_id: &str, intent: Intent, line_items: Vec<LineItem>) -> anyhow::Result<Self> {
        Ok(Self {
            id: ids::order_id()?,
            owner_id: owner_id.to_string(),
            intent,
            status: OrderStatus::Pending,
            line_items,
            history: Vec::new(),
            last_admin_offer: None,
            last_user_offer: None,
            created_at: TimeStamp::now(),
        })
    }

    pub fn latest_offer(&self) -> Option<&Offer> {
        self.history.last()
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

    fn transition(&mut self, to: OrderStatus) -> Result<(), EngineError> {
        self.reject_if_terminal()?;
        if !OrderStatus::may_transition(self.status, to) {
            return Err(ValidationError::IllegalTransition {
                from: format!("{:?}", self.status),
                to: format!("{:?}", to),
            }
            .into());
        }
        self.status = to;
        Ok(())
    }

    fn append(&mut self, price: u64, currency: Currency, sender: Sender, message: Option<String>) {
        let offer = Offer {
            price,
            currency,
            sender,
            at: TimeStamp::now(),
            message,
        };
        match sender {
            Sender::Admin => self.last_admin_offer = Some(offer.clone()),
            Sender::User => self.last_user_offer = Some(offer.clone()),
        }
        self.history.push(offer);
    }

    /// Opening offer on a fresh order. Legal only while the history is
    /// empty; the status stays `Pending`.
    pub fn submit_initial_offer(
        &mut self,
        price: u64,
        currency: Currency,
        sender: Sender,
        message: Option<String>,
    ) -> Result<(), EngineError> {
        self.reject_if_terminal()?;
        if !self.history.is_empty() {
            return Err(ValidationError::AlreadyOpened.into());
        }
        if price == 0 {
            return Err(ValidationError::ZeroPrice.into());
        }

        self.append(price, currency, sender, message);
        Ok(())
    }

    /// Store-side counter. A BUY intent with no prior admin price gets
    /// `Quoted`; everything else moves to `CounterOffered`.
    pub fn set_counter_offer(
        &mut self,
        price: u64,
        currency: Currency,
        message: Option<String>,
    ) -> Result<(), EngineError> {
        self.reject_if_terminal()?;
        if price == 0 {
            return Err(ValidationError::ZeroPrice.into());
        }

        let next = if self.intent == Intent::Buy && self.last_admin_offer.is_none() {
            OrderStatus::Quoted
        } else {
            OrderStatus::CounterOffered
        };
        self.transition(next)?;
        self.append(price, currency, Sender::Admin, message);
        Ok(())
    }

    /// Customer-side counter. Resubmitting the price already standing as
    /// the user's last offer is a silent no-op; the return value reports
    /// whether an entry was appended.
    pub fn submit_user_counter(
        &mut self,
        price: u64,
        currency: Currency,
        message: Option<String>,
    ) -> Result<bool, EngineError> {
        self.reject_if_terminal()?;
        if price == 0 {
            return Err(ValidationError::ZeroPrice.into());
        }

        if let Some(last) = &self.last_user_offer {
            if last.price == price && last.currency == currency {
                return Ok(false);
            }
        }

        self.transition(OrderStatus::Negotiating)?;
        self.append(price, currency, Sender::User, message);
        Ok(true)
    }

    /// Either side accepts the other's last-standing offer. The only
    /// terminal-success transition; afterwards every append is rejected.
    pub fn accept(&mut self, actor: Sender) -> Result<(), EngineError> {
        self.reject_if_terminal()?;

        let standing = match actor {
            Sender::User => &self.last_admin_offer,
            Sender::Admin => &self.last_user_offer,
        };
        if standing.is_none() {
            return Err(ValidationError::NothingToAccept.into());
        }

        self.transition(OrderStatus::Settled)
    }

    pub fn cancel(&mut self) -> Result<(), EngineError> {
        self.transition(OrderStatus::Cancelled)
    }
}

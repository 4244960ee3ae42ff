//! Typed failure taxonomy for the negotiation and settlement engine.
//!
//! Every failure is returned to the caller; the engine never retries and a
//! failed operation leaves persisted state untouched.

#[derive(thiserror::Error, Debug)]
pub enum EngineError {
    #[error("actor {actor} acted out of turn, current turn belongs to {expected}")]
    TurnViolation { actor: String, expected: String },
    #[error("record {id} is terminal ({state}) and accepts no further mutation")]
    TerminalState { id: String, state: String },
    #[error("insufficient stock for item(s): {}", .0.join(", "))]
    InsufficientStock(Vec<String>),
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error("no record found for id {0}")]
    NotFound(String),
    #[error("stored record for {0} could not be decoded")]
    CorruptRecord(String),
}

#[derive(thiserror::Error, Debug)]
pub enum ValidationError {
    #[error("offer price must be greater than zero")]
    ZeroPrice,
    #[error("manifest lists no items on either side")]
    EmptyManifest,
    #[error("item {0} cannot be offered and requested in the same manifest")]
    OverlappingItem(String),
    #[error("{0} is not a participant of this trade")]
    NotAParticipant(String),
    #[error("order already has an opening offer")]
    AlreadyOpened,
    #[error("no standing offer from the other party to accept")]
    NothingToAccept,
    #[error("status cannot move from {from} to {to}")]
    IllegalTransition { from: String, to: String },
}

//! Identity minting for engine records.
//!
//! Every record family gets its own human-readable prefix so an ID is
//! recognisable in logs and audit output. The payload is a uuid7, encoded
//! with bech32m.

use bech32::Bech32m;
use uuid7::uuid7;

pub const ITEM_HRP: &str = "item_";
pub const ORDER_HRP: &str = "order_";
pub const TRADE_HRP: &str = "trade_";
pub const PARTY_HRP: &str = "user_";

fn mint(hrp: &str) -> anyhow::Result<String> {
    let hrp = bech32::Hrp::parse(hrp)?;
    let encoded = bech32::encode::<Bech32m>(hrp, uuid7().as_bytes())?;
    Ok(encoded)
}

pub fn item_id() -> anyhow::Result<String> {
    mint(ITEM_HRP)
}

pub fn order_id() -> anyhow::Result<String> {
    mint(ORDER_HRP)
}

pub fn trade_id() -> anyhow::Result<String> {
    mint(TRADE_HRP)
}

pub fn party_id() -> anyhow::Result<String> {
    mint(PARTY_HRP)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_carry_their_family_prefix() {
        assert!(item_id().unwrap().starts_with("item_1"));
        assert!(order_id().unwrap().starts_with("order_1"));
        assert!(trade_id().unwrap().starts_with("trade_1"));
        assert!(party_id().unwrap().starts_with("user_1"));
    }

    #[test]
    fn ids_are_unique() {
        let a = trade_id().unwrap();
        let b = trade_id().unwrap();
        assert_ne!(a, b);
    }
}

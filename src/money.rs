//! Currency tagging for prices and cash adjustments.
//!
//! Amounts are integer minor units everywhere in the engine: `u64` for
//! offer and catalog prices, `i64` for the signed trade cash adjustment.

#[derive(minicbor::Encode, minicbor::Decode, Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Currency {
    #[n(0)]
    Ars,
    #[n(1)]
    Usd,
}

impl Currency {
    /// Storefront display symbol.
    pub fn symbol(&self) -> &'static str {
        match self {
            Currency::Ars => "$",
            Currency::Usd => "US$",
        }
    }
}

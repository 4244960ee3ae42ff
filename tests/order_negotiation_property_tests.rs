//! Property-based tests for the order negotiation state machine.
//!
//! These drive the pure `Order` operations with randomly generated action
//! sequences and check the invariants that must hold for every sequence:
//! the history only ever grows, existing entries never change, terminal
//! states are final, and the derived standing-offer fields always agree
//! with a scan of the log.

use proptest::prelude::*;
use vinyl_exchange::error::EngineError;
use vinyl_exchange::money::Currency;
use vinyl_exchange::order::{Intent, Offer, Order, OrderStatus, Sender};

#[derive(Debug, Clone)]
enum Action {
    AdminCounter(u64),
    UserCounter(u64),
    AcceptAsUser,
    AcceptAsAdmin,
    Cancel,
}

fn action_strategy() -> impl Strategy<Value = Action> {
    prop_oneof![
        (1u64..=500).prop_map(Action::AdminCounter),
        (1u64..=500).prop_map(Action::UserCounter),
        Just(Action::AcceptAsUser),
        Just(Action::AcceptAsAdmin),
        Just(Action::Cancel),
    ]
}

fn intent_strategy() -> impl Strategy<Value = Intent> {
    prop::bool::ANY.prop_map(|b| if b { Intent::Buy } else { Intent::Sell })
}

fn apply(order: &mut Order, action: &Action) -> Result<(), EngineError> {
    match action {
        Action::AdminCounter(price) => order.set_counter_offer(*price, Currency::Ars, None),
        Action::UserCounter(price) => order
            .submit_user_counter(*price, Currency::Ars, None)
            .map(|_| ()),
        Action::AcceptAsUser => order.accept(Sender::User),
        Action::AcceptAsAdmin => order.accept(Sender::Admin),
        Action::Cancel => order.cancel(),
    }
}

fn last_by_sender(order: &Order, sender: Sender) -> Option<Offer> {
    order
        .history
        .iter()
        .rev()
        .find(|offer| offer.sender == sender)
        .cloned()
}

proptest! {
    /// P4: the history is append-only. Whatever sequence of operations
    /// runs, the log never shrinks and already-written entries are
    /// untouched.
    #[test]
    fn history_only_ever_grows(
        intent in intent_strategy(),
        actions in prop::collection::vec(action_strategy(), 1..40),
    ) {
        let mut order = Order::new("user_prop", intent, vec![]).unwrap();

        for action in &actions {
            let before = order.history.clone();
            let _ = apply(&mut order, action);

            prop_assert!(order.history.len() >= before.len());
            prop_assert_eq!(&order.history[..before.len()], &before[..]);
        }
    }

    /// P5: once an order is terminal, every mutating call fails with
    /// `TerminalState` and changes nothing.
    #[test]
    fn terminal_states_are_final(
        intent in intent_strategy(),
        actions in prop::collection::vec(action_strategy(), 1..40),
    ) {
        let mut order = Order::new("user_prop", intent, vec![]).unwrap();

        for action in &actions {
            let before_status = order.status;
            let before_history = order.history.clone();
            let result = apply(&mut order, action);

            if before_status.is_terminal() {
                let is_terminal_err = matches!(result, Err(EngineError::TerminalState { .. }));
                prop_assert!(is_terminal_err);
                prop_assert_eq!(order.status, before_status);
                prop_assert_eq!(&order.history, &before_history);
            }
        }
    }

    /// The standing-offer fields are derived on write and must always agree
    /// with a scan of the log, so readers never need to filter the history.
    #[test]
    fn standing_offers_agree_with_a_log_scan(
        intent in intent_strategy(),
        actions in prop::collection::vec(action_strategy(), 1..40),
    ) {
        let mut order = Order::new("user_prop", intent, vec![]).unwrap();

        for action in &actions {
            let _ = apply(&mut order, action);

            prop_assert_eq!(&order.last_admin_offer, &last_by_sender(&order, Sender::Admin));
            prop_assert_eq!(&order.last_user_offer, &last_by_sender(&order, Sender::User));
        }
    }

    /// The status can only ever hold values reachable through the
    /// transition table, and a settled order always has an offer to have
    /// accepted.
    #[test]
    fn settlement_implies_a_standing_offer(
        intent in intent_strategy(),
        actions in prop::collection::vec(action_strategy(), 1..40),
    ) {
        let mut order = Order::new("user_prop", intent, vec![]).unwrap();

        for action in &actions {
            let _ = apply(&mut order, action);
        }

        if order.status == OrderStatus::Settled {
            prop_assert!(!order.history.is_empty());
        }
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(1000))]

    /// Idempotence of the user counter: resubmitting the price standing as
    /// the user's last offer never appends, while a changed price always
    /// does (on a non-terminal order).
    #[test]
    fn user_counter_idempotence(
        first in 1u64..=500,
        second in 1u64..=500,
    ) {
        let mut order = Order::new("user_prop", Intent::Sell, vec![]).unwrap();

        prop_assert!(order.submit_user_counter(first, Currency::Ars, None).unwrap());
        let len = order.history.len();

        let appended = order.submit_user_counter(second, Currency::Ars, None).unwrap();
        if second == first {
            prop_assert!(!appended);
            prop_assert_eq!(order.history.len(), len);
        } else {
            prop_assert!(appended);
            prop_assert_eq!(order.history.len(), len + 1);
        }
    }
}

//! Property-based tests for the offer and order status machines
//!
//! Every pair of states is checked against the full transition tables, and the
//! persisted names are checked to load back into the same state.

use erp_documents::status::{DocumentStatus, OfferStatus, OrderStatus};
use proptest::prelude::*;

const OFFER_TRANSITIONS: &[(OfferStatus, OfferStatus)] = &[
    (OfferStatus::Draft, OfferStatus::Sent),
    (OfferStatus::Draft, OfferStatus::Cancelled),
    (OfferStatus::Sent, OfferStatus::Accepted),
    (OfferStatus::Sent, OfferStatus::Rejected),
    (OfferStatus::Sent, OfferStatus::Cancelled),
];

const ORDER_TRANSITIONS: &[(OrderStatus, OrderStatus)] = &[
    (OrderStatus::Draft, OrderStatus::Confirmed),
    (OrderStatus::Draft, OrderStatus::Cancelled),
    (OrderStatus::Confirmed, OrderStatus::InProgress),
    (OrderStatus::Confirmed, OrderStatus::Cancelled),
    (OrderStatus::InProgress, OrderStatus::Shipped),
    (OrderStatus::InProgress, OrderStatus::Cancelled),
    (OrderStatus::Shipped, OrderStatus::Completed),
];

fn offer_status_strategy() -> impl Strategy<Value = OfferStatus> {
    prop::sample::select(OfferStatus::ALL)
}

fn order_status_strategy() -> impl Strategy<Value = OrderStatus> {
    prop::sample::select(OrderStatus::ALL)
}

// lowercase words never collide with the stored names, which are capitalised
fn unknown_name_strategy() -> impl Strategy<Value = String> {
    "[a-z_ ]{0,16}"
}

#[test]
fn offer_table_is_complete() {
    for &from in OfferStatus::ALL {
        for &to in OfferStatus::ALL {
            assert_eq!(
                OfferStatus::is_transition_allowed(from, to),
                OFFER_TRANSITIONS.contains(&(from, to)),
                "{from} -> {to}"
            );
        }
    }
}

#[test]
fn order_table_is_complete() {
    for &from in OrderStatus::ALL {
        for &to in OrderStatus::ALL {
            assert_eq!(
                OrderStatus::is_transition_allowed(from, to),
                ORDER_TRANSITIONS.contains(&(from, to)),
                "{from} -> {to}"
            );
        }
    }
}

proptest! {
    /// Loading a stored name gives back the state it was stored from
    #[test]
    fn offer_db_name_round_trips(status in offer_status_strategy()) {
        prop_assert_eq!(OfferStatus::from_db(status.to_db()), status);
    }

    #[test]
    fn order_db_name_round_trips(status in order_status_strategy()) {
        prop_assert_eq!(OrderStatus::from_db(status.to_db()), status);
    }

    /// Anything that is not an exact stored name loads as Draft
    #[test]
    fn unknown_names_load_as_draft(name in unknown_name_strategy()) {
        prop_assert_eq!(OfferStatus::from_db(&name), OfferStatus::Draft);
        prop_assert_eq!(OrderStatus::from_db(&name), OrderStatus::Draft);
    }

    /// The lenient parser accepts any casing of a known name
    #[test]
    fn parse_ignores_case(status in order_status_strategy(), upper in any::<bool>()) {
        let name = if upper {
            status.to_db().to_uppercase()
        } else {
            status.to_db().to_lowercase()
        };
        prop_assert_eq!(OrderStatus::parse(&name).unwrap(), status);
    }

    /// A terminal state has no way out, every other state has at least one
    #[test]
    fn terminal_states_have_no_targets(
        from in offer_status_strategy(),
        to in offer_status_strategy()
    ) {
        if from.is_terminal() {
            prop_assert!(!OfferStatus::is_transition_allowed(from, to));
        } else {
            let has_target = OfferStatus::ALL
                .iter()
                .any(|t| OfferStatus::is_transition_allowed(from, *t));
            prop_assert!(has_target);
        }
    }

    /// No state may transition to itself
    #[test]
    fn no_self_transitions(offer in offer_status_strategy(), order in order_status_strategy()) {
        prop_assert!(!OfferStatus::is_transition_allowed(offer, offer));
        prop_assert!(!OrderStatus::is_transition_allowed(order, order));
    }
}

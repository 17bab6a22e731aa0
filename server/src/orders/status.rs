//! Order and item lifecycle vocabulary
//!
//! The DB string values are part of the external contract (reporting filters
//! on them); `as_db`/`from_db` are the only place they are spelled out.

use serde::{Deserialize, Serialize};

/// Lifecycle status of an order request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OrderStatus {
    Pending,
    Valuated,
    Checkout,
    Paid,
    Removed,
}

impl OrderStatus {
    pub fn as_db(&self) -> &'static str {
        match self {
            OrderStatus::Pending => "PENDING",
            OrderStatus::Valuated => "VALUATED",
            OrderStatus::Checkout => "CHECKOUT",
            OrderStatus::Paid => "PAID",
            OrderStatus::Removed => "REMOVED",
        }
    }

    pub fn from_db(s: &str) -> Option<Self> {
        match s {
            "PENDING" => Some(OrderStatus::Pending),
            "VALUATED" => Some(OrderStatus::Valuated),
            "CHECKOUT" => Some(OrderStatus::Checkout),
            "PAID" => Some(OrderStatus::Paid),
            "REMOVED" => Some(OrderStatus::Removed),
            _ => None,
        }
    }

    /// Explicit transition table for the staff-driven state machine.
    ///
    /// `CHECKOUT` is reachable only through the checkout assembler and `PAID`
    /// through settlement; neither appears here as a source. The restore edge
    /// `REMOVED -> PENDING` resets unconditionally, whatever status the order
    /// held before removal.
    pub fn can_transition_to(&self, target: OrderStatus) -> bool {
        use OrderStatus::*;
        matches!(
            (self, target),
            (Pending, Valuated)
                | (Pending, Removed)
                | (Valuated, Paid)
                | (Valuated, Removed)
                | (Paid, Removed)
                | (Removed, Pending)
        )
    }
}

/// Fulfillment state of one requested part line
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ItemState {
    Requested,
    Valuated,
    Purchased,
    Declined,
}

impl ItemState {
    pub fn as_db(&self) -> &'static str {
        match self {
            ItemState::Requested => "REQUESTED",
            ItemState::Valuated => "VALUATED",
            ItemState::Purchased => "PURCHASED",
            ItemState::Declined => "DECLINED",
        }
    }

    pub fn from_db(s: &str) -> Option<Self> {
        match s {
            "REQUESTED" => Some(ItemState::Requested),
            "VALUATED" => Some(ItemState::Valuated),
            "PURCHASED" => Some(ItemState::Purchased),
            "DECLINED" => Some(ItemState::Declined),
            _ => None,
        }
    }
}

/// One item's inputs to the PAID bulk update
#[derive(Debug, Clone)]
pub struct ItemOutcomeInput {
    pub item_id: String,
    pub state: ItemState,
    pub has_chosen_offer: bool,
}

/// Plan the bulk item-state update that accompanies the PAID transition:
/// a chosen offer wins the item, a valuated item without one is declined,
/// anything else keeps its state.
pub fn plan_paid_outcomes(items: &[ItemOutcomeInput]) -> Vec<(String, ItemState)> {
    items
        .iter()
        .filter_map(|item| {
            if item.has_chosen_offer {
                Some((item.item_id.clone(), ItemState::Purchased))
            } else if item.state == ItemState::Valuated {
                Some((item.item_id.clone(), ItemState::Declined))
            } else {
                None
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_db_round_trip() {
        for status in [
            OrderStatus::Pending,
            OrderStatus::Valuated,
            OrderStatus::Checkout,
            OrderStatus::Paid,
            OrderStatus::Removed,
        ] {
            assert_eq!(OrderStatus::from_db(status.as_db()), Some(status));
        }
        assert_eq!(OrderStatus::from_db("DONE"), None);
    }

    #[test]
    fn item_state_db_round_trip() {
        for state in [
            ItemState::Requested,
            ItemState::Valuated,
            ItemState::Purchased,
            ItemState::Declined,
        ] {
            assert_eq!(ItemState::from_db(state.as_db()), Some(state));
        }
    }

    #[test]
    fn transition_table_matches_lifecycle() {
        use OrderStatus::*;

        assert!(Pending.can_transition_to(Valuated));
        assert!(Pending.can_transition_to(Removed));
        assert!(Valuated.can_transition_to(Paid));
        assert!(Valuated.can_transition_to(Removed));
        assert!(Paid.can_transition_to(Removed));
        assert!(Removed.can_transition_to(Pending));

        // everything else is rejected
        assert!(!Pending.can_transition_to(Paid));
        assert!(!Pending.can_transition_to(Checkout));
        assert!(!Valuated.can_transition_to(Pending));
        assert!(!Checkout.can_transition_to(Paid));
        assert!(!Checkout.can_transition_to(Removed));
        assert!(!Paid.can_transition_to(Pending));
        assert!(!Paid.can_transition_to(Valuated));
        assert!(!Removed.can_transition_to(Paid));
        assert!(!Removed.can_transition_to(Valuated));
    }

    #[test]
    fn restore_always_targets_pending() {
        // A removed order restores to PENDING unconditionally, also when it
        // was PAID before removal.
        assert!(OrderStatus::Removed.can_transition_to(OrderStatus::Pending));
        assert!(!OrderStatus::Removed.can_transition_to(OrderStatus::Paid));
        assert!(!OrderStatus::Removed.can_transition_to(OrderStatus::Checkout));
    }

    fn input(id: &str, state: ItemState, chosen: bool) -> ItemOutcomeInput {
        ItemOutcomeInput {
            item_id: id.to_string(),
            state,
            has_chosen_offer: chosen,
        }
    }

    #[test]
    fn paid_outcomes_purchase_chosen_and_decline_valuated() {
        let plan = plan_paid_outcomes(&[
            input("a", ItemState::Valuated, true),
            input("b", ItemState::Valuated, false),
            input("c", ItemState::Requested, false),
        ]);
        assert_eq!(
            plan,
            vec![
                ("a".to_string(), ItemState::Purchased),
                ("b".to_string(), ItemState::Declined),
            ]
        );
    }

    #[test]
    fn paid_outcomes_purchase_even_without_valuated_state() {
        // a chosen offer always wins the item, whatever its recorded state
        let plan = plan_paid_outcomes(&[input("a", ItemState::Requested, true)]);
        assert_eq!(plan, vec![("a".to_string(), ItemState::Purchased)]);
    }

    #[test]
    fn paid_outcomes_ignore_untouched_items() {
        let plan = plan_paid_outcomes(&[
            input("a", ItemState::Requested, false),
            input("b", ItemState::Purchased, false),
            input("c", ItemState::Declined, false),
        ]);
        assert!(plan.is_empty());
    }
}

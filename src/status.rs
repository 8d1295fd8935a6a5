//! Offer and order status machines
//!
//! Both document kinds share the same shape: a closed set of states, a single
//! initial state and a static table of allowed transitions. Terminal states are
//! the ones without outgoing transitions.
use super::error::ValidationError;
use std::fmt;
use std::str::FromStr;

pub trait DocumentStatus: Copy + Eq + fmt::Debug + 'static {
    /// Document kind, used in log lines and error messages.
    const KIND: &'static str;
    const ALL: &'static [Self];
    const INITIAL: Self;

    /// States reachable from `self` in a single step.
    fn allowed_targets(self) -> &'static [Self];

    /// Name stored in the database.
    fn to_db(self) -> &'static str;

    fn is_transition_allowed(from: Self, to: Self) -> bool {
        from.allowed_targets().contains(&to)
    }

    fn is_terminal(self) -> bool {
        self.allowed_targets().is_empty()
    }

    /// Maps a persisted name back to a state. Unknown names load as the initial
    /// state; the fallback is logged so bad rows are noticed.
    fn from_db(value: &str) -> Self {
        match Self::ALL.iter().copied().find(|s| s.to_db() == value) {
            Some(status) => status,
            None => {
                tracing::warn!(
                    kind = Self::KIND,
                    value,
                    "unknown persisted status, loading as {}",
                    Self::INITIAL.to_db()
                );
                Self::INITIAL
            }
        }
    }

    /// Lenient parse for user input: case and `_`/`-` separators are ignored,
    /// unknown names are an error.
    fn parse(value: &str) -> Result<Self, ValidationError> {
        let wanted = normalise(value);
        Self::ALL
            .iter()
            .copied()
            .find(|s| normalise(s.to_db()) == wanted)
            .ok_or_else(|| ValidationError::UnknownValue {
                kind: Self::KIND,
                value: value.to_string(),
            })
    }
}

fn normalise(value: &str) -> String {
    value
        .chars()
        .filter(|c| *c != '_' && *c != '-' && !c.is_whitespace())
        .flat_map(char::to_lowercase)
        .collect()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum OfferStatus {
    Draft,
    Sent,
    Accepted,
    Rejected,
    Cancelled,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum OrderStatus {
    Draft,
    Confirmed,
    InProgress,
    Shipped,
    Completed,
    Cancelled,
}

impl DocumentStatus for OfferStatus {
    const KIND: &'static str = "Offer";
    const ALL: &'static [Self] = &[
        OfferStatus::Draft,
        OfferStatus::Sent,
        OfferStatus::Accepted,
        OfferStatus::Rejected,
        OfferStatus::Cancelled,
    ];
    const INITIAL: Self = OfferStatus::Draft;

    fn allowed_targets(self) -> &'static [Self] {
        use OfferStatus::*;
        match self {
            Draft => &[Sent, Cancelled],
            Sent => &[Accepted, Rejected, Cancelled],
            Accepted | Rejected | Cancelled => &[],
        }
    }

    fn to_db(self) -> &'static str {
        match self {
            OfferStatus::Draft => "Draft",
            OfferStatus::Sent => "Sent",
            OfferStatus::Accepted => "Accepted",
            OfferStatus::Rejected => "Rejected",
            OfferStatus::Cancelled => "Cancelled",
        }
    }
}

impl DocumentStatus for OrderStatus {
    const KIND: &'static str = "Order";
    const ALL: &'static [Self] = &[
        OrderStatus::Draft,
        OrderStatus::Confirmed,
        OrderStatus::InProgress,
        OrderStatus::Shipped,
        OrderStatus::Completed,
        OrderStatus::Cancelled,
    ];
    const INITIAL: Self = OrderStatus::Draft;

    fn allowed_targets(self) -> &'static [Self] {
        use OrderStatus::*;
        match self {
            Draft => &[Confirmed, Cancelled],
            Confirmed => &[InProgress, Cancelled],
            InProgress => &[Shipped, Cancelled],
            Shipped => &[Completed],
            Completed | Cancelled => &[],
        }
    }

    fn to_db(self) -> &'static str {
        match self {
            OrderStatus::Draft => "Draft",
            OrderStatus::Confirmed => "Confirmed",
            OrderStatus::InProgress => "InProgress",
            OrderStatus::Shipped => "Shipped",
            OrderStatus::Completed => "Completed",
            OrderStatus::Cancelled => "Cancelled",
        }
    }
}

impl fmt::Display for OfferStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.to_db())
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.to_db())
    }
}

impl FromStr for OfferStatus {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl FromStr for OrderStatus {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn offer_terminal_states() {
        assert!(!OfferStatus::Draft.is_terminal());
        assert!(!OfferStatus::Sent.is_terminal());
        assert!(OfferStatus::Accepted.is_terminal());
        assert!(OfferStatus::Rejected.is_terminal());
        assert!(OfferStatus::Cancelled.is_terminal());
    }

    #[test]
    fn order_terminal_states() {
        let terminal: Vec<_> = OrderStatus::ALL
            .iter()
            .copied()
            .filter(|s| s.is_terminal())
            .collect();
        assert_eq!(terminal, vec![OrderStatus::Completed, OrderStatus::Cancelled]);
    }

    #[test]
    fn same_state_is_not_a_transition() {
        for s in OfferStatus::ALL {
            assert!(!OfferStatus::is_transition_allowed(*s, *s));
        }
        for s in OrderStatus::ALL {
            assert!(!OrderStatus::is_transition_allowed(*s, *s));
        }
    }

    #[test]
    fn unknown_db_value_loads_as_draft() {
        assert_eq!(OfferStatus::from_db("Archived"), OfferStatus::Draft);
        assert_eq!(OrderStatus::from_db(""), OrderStatus::Draft);
        // persisted names are matched exactly
        assert_eq!(OrderStatus::from_db("inprogress"), OrderStatus::Draft);
    }

    #[test]
    fn parse_is_lenient_but_strict_about_unknowns() {
        assert_eq!("in_progress".parse::<OrderStatus>(), Ok(OrderStatus::InProgress));
        assert_eq!("SENT".parse::<OfferStatus>(), Ok(OfferStatus::Sent));
        assert!("archived".parse::<OfferStatus>().is_err());
    }

    #[test]
    fn display_matches_db_name() {
        assert_eq!(OrderStatus::InProgress.to_string(), "InProgress");
        assert_eq!(OfferStatus::Accepted.to_string(), "Accepted");
    }
}

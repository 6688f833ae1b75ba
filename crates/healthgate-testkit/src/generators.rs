//! Proptest strategies over domain values.

use proptest::prelude::*;
use rand::distributions::{Alphanumeric, DistString};

use healthgate_core::{Decision, Pseudonym};

/// Any decision value.
pub fn decision() -> impl Strategy<Value = Decision> {
    prop_oneof![
        Just(Decision::Undefined),
        Just(Decision::Unlimited),
        Just(Decision::NoAccess),
        Just(Decision::OneTime),
        Just(Decision::Custom),
    ]
}

/// A well-formed availability window: `from < until`, both non-negative.
pub fn window() -> impl Strategy<Value = (i64, i64)> {
    (0i64..1_000_000, 1i64..1_000_000)
        .prop_map(|(from, span)| (from, from + span))
}

/// A short pseudonym string.
pub fn pseudonym() -> impl Strategy<Value = Pseudonym> {
    "[a-z]{3,12}-[0-9]{1,4}".prop_map(Pseudonym::from)
}

/// A random pseudonym outside proptest, for ad-hoc fixtures.
pub fn random_pseudonym(rng: &mut impl rand::Rng) -> Pseudonym {
    Pseudonym::from(format!(
        "user-{}",
        Alphanumeric.sample_string(rng, 8).to_lowercase()
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    proptest! {
        #[test]
        fn window_is_ordered((from, until) in window()) {
            prop_assert!(from < until);
        }

        #[test]
        fn decision_round_trips_through_wire_form(d in decision()) {
            prop_assert_eq!(Decision::parse(d.as_str()).unwrap(), d);
        }
    }
}

//! Property tests for expansion invariants.

use proptest::prelude::*;
use std::collections::BTreeSet;

use solder_tokens::{StaticValue, TokenStrategies, Tokenizer};

fn known() -> TokenStrategies {
    TokenStrategies::new()
        .with("alpha", StaticValue::new("A"))
        .with("beta", StaticValue::new("B"))
}

/// Text that can never contain a `${`.
fn arb_plain_text() -> impl Strategy<Value = String> {
    "[a-zA-Z0-9 _.,;:!?(){}`'\\-\n]{0,80}".prop_map(|s| s.replace("${", "$ {"))
}

fn arb_key() -> impl Strategy<Value = String> {
    prop_oneof![
        Just("alpha".to_string()),
        Just("beta".to_string()),
        "[a-z_][a-z0-9_]{0,8}",
    ]
}

proptest! {
    /// Text without token expressions comes back unchanged in both modes.
    #[test]
    fn plain_text_is_identity(text in arb_plain_text()) {
        let strict = Tokenizer::new(known(), true);
        let loose = Tokenizer::new(known(), false);
        prop_assert_eq!(strict.expand_tokens(&text).unwrap(), text.clone());
        prop_assert_eq!(loose.expand_tokens(&text).unwrap(), text);
    }

    /// Loose mode always returns; the key record is the sorted set of lookup keys.
    #[test]
    fn loose_never_fails_and_records_keys(
        keys in prop::collection::vec(arb_key(), 0..6),
        filler in "[a-z ]{0,5}",
    ) {
        let input: String = keys
            .iter()
            .map(|k| format!("{filler}${{{k}.x}}"))
            .collect();
        let loose = Tokenizer::new(known(), false);

        let expansion = loose.expand(&input, None).unwrap();

        let expected: Vec<String> = keys.iter().cloned().collect::<BTreeSet<_>>().into_iter().collect();
        prop_assert_eq!(expansion.ordered_tokens(), expected.clone());
        prop_assert_eq!(loose.ordered_previous_expansion_tokens(), expected);
    }

    /// Every resolvable token is replaced exactly once.
    #[test]
    fn known_tokens_disappear(keys in prop::collection::vec(prop_oneof![Just("alpha"), Just("beta")], 1..8)) {
        let input: String = keys.iter().map(|k| format!("[${{{k}}}]")).collect();
        let expected: String = keys
            .iter()
            .map(|k| if *k == "alpha" { "[A]" } else { "[B]" })
            .collect();
        let strict = Tokenizer::new(known(), true);

        let out = strict.expand_tokens(&input).unwrap();
        prop_assert!(!out.contains("${"), "unexpanded token left in output: {}", out);
        prop_assert_eq!(out, expected);
    }
}

//! Property tests for the low-level pieces: value rendering, tokenization and
//! the description escape codec.

use proptest::prelude::*;
use swmm_inp::inp::describe;
use swmm_inp::inp::extract::tokenize;
use swmm_inp::{FieldType, Value};

proptest! {
    #[test]
    fn number_rendering_reparses_to_the_same_value(n in -1e12f64..1e12f64) {
        let rendered = Value::Number(n).render();
        let back: f64 = rendered.parse().unwrap();
        prop_assert_eq!(back, n);
    }

    #[test]
    fn integral_numbers_render_without_a_point(n in -1_000_000i64..1_000_000i64) {
        let rendered = Value::Number(n as f64).render();
        prop_assert!(!rendered.contains('.'));
        prop_assert_eq!(rendered.parse::<i64>().unwrap(), n);
    }

    #[test]
    fn text_fields_accept_anything(s in "[^\\s;]{1,20}") {
        prop_assert!(FieldType::Text.parse(&s).is_ok());
    }

    #[test]
    fn tokenize_never_returns_empty_tokens(line in "[ a-zA-Z0-9.:_-]{0,60}") {
        for cap in [None, Some(1), Some(2), Some(3)] {
            for token in tokenize(&line, cap) {
                prop_assert!(!token.is_empty());
            }
        }
    }

    #[test]
    fn capped_tokenize_preserves_all_words(line in "([a-z0-9]{1,8} ){1,6}[a-z0-9]{1,8}") {
        let full: Vec<String> = tokenize(&line, None);
        let capped = tokenize(&line, Some(2));
        let rejoined: Vec<String> = capped
            .iter()
            .flat_map(|t| t.split_whitespace().map(str::to_string))
            .collect();
        prop_assert_eq!(full, rejoined);
    }

    #[test]
    fn describe_escape_round_trips(s in "[a-zA-Z0-9 \\\\\n]{0,40}") {
        prop_assert_eq!(describe::unescape(&describe::escape(&s)), s);
    }
}

#[test]
fn number_rendering_handles_fractions() {
    assert_eq!(Value::Number(0.015).render(), "0.015");
    assert_eq!(Value::Number(20.5).render(), "20.5");
    assert_eq!(Value::Number(-0.0).render(), "0");
}

//! Property tests for atomization, attribution and quote verification.

use proptest::prelude::*;
use thread_forensics::{
    hash, normalize, verify_quote, AttributionEngine, AttributionMethod, Atom, Atomizer,
    RuleSegmenter, Segmenter, VisualStyle, UNRESOLVED_QUOTED_PARTY,
};

fn style_strategy() -> impl Strategy<Value = VisualStyle> {
    (
        any::<bool>(),
        prop::option::of(prop::sample::select(vec!["red", "blue", "#ff0000", "green", "crimson"])),
        any::<bool>(),
    )
        .prop_map(|(bold, color, uppercase)| VisualStyle {
            bold,
            color: color.map(str::to_string),
            uppercase,
        })
}

fn words() -> impl Strategy<Value = String> {
    prop::collection::vec("[A-Za-z]{1,8}", 1..8).prop_map(|w| w.join(" "))
}

proptest! {
    #[test]
    fn verify_quote_is_reflexive(text in ".{0,200}") {
        let result = verify_quote(&text, &text);
        prop_assert!(result.matched);
        prop_assert!(result.diff.is_none());
    }

    #[test]
    fn verify_quote_ignores_case_and_spacing(text in words()) {
        let shouted = text.to_uppercase().replace(' ', "  \t ");
        prop_assert!(verify_quote(&shouted, &text).matched);
        prop_assert_eq!(hash(&shouted), hash(&text));
    }

    #[test]
    fn normalize_is_idempotent(text in "[A-Za-z \t\n]{0,200}") {
        let once = normalize(&text);
        prop_assert_eq!(normalize(&once), once.clone());
    }

    #[test]
    fn mismatch_always_carries_diff(a in words(), b in words()) {
        let result = verify_quote(&a, &b);
        prop_assert_eq!(result.matched, normalize(&a) == normalize(&b));
        prop_assert_eq!(result.diff.is_some(), !result.matched);
    }

    #[test]
    fn attribution_depends_only_on_depth_and_style(
        depth in 0u32..5,
        style in style_strategy(),
        content_a in words(),
        content_b in words(),
    ) {
        let mut atoms = vec![
            Atom::new("m", 0, content_a, depth, style.clone()),
            Atom::new("other", 7, content_b, depth, style.clone()),
        ];
        AttributionEngine::default().attribute_atoms(&mut atoms, "s@x.com", None);

        prop_assert_eq!(atoms[0].attributed_to(), atoms[1].attributed_to());
        prop_assert_eq!(atoms[0].attribution_method(), atoms[1].attribution_method());

        let expected = match (depth, style.is_red() || style.bold || style.uppercase) {
            (0, _) => ("s@x.com", AttributionMethod::HeaderDepth0),
            (_, true) => ("s@x.com", AttributionMethod::StyleInferenceInterjection),
            (_, false) => (UNRESOLVED_QUOTED_PARTY, AttributionMethod::QuoteDepth),
        };
        prop_assert_eq!(atoms[0].attributed_to(), Some(expected.0));
        prop_assert_eq!(atoms[0].attribution_method(), Some(expected.1));
    }

    #[test]
    fn sequence_index_is_dense(paragraphs in prop::collection::vec(words(), 0..6), quoted in any::<bool>()) {
        let inner: String = paragraphs.iter().map(|p| format!("<p>{}.</p>", p)).collect();
        let html = if quoted {
            format!("<div>Intro.</div><blockquote>{}</blockquote>", inner)
        } else {
            inner
        };
        let atoms = Atomizer::default().atomize("m", &html, "", Some("s")).unwrap();
        for (i, atom) in atoms.iter().enumerate() {
            prop_assert_eq!(atom.sequence_index(), i);
        }
    }

    #[test]
    fn segments_are_trimmed_and_non_empty(text in "[A-Za-z .!?\n]{0,120}") {
        let sentences = RuleSegmenter::new().segment(&text).unwrap();
        for sentence in sentences {
            prop_assert!(!sentence.is_empty());
            prop_assert_eq!(sentence.trim(), sentence.as_str());
        }
    }
}

//! Property-based tests for mention handling

use super::*;
use proptest::prelude::*;

fn arb_tool() -> impl Strategy<Value = ToolMention> {
    ("[A-Z][a-z]{0,6}", "[A-Za-z]{1,8}Tool")
        .prop_map(|(name, id)| ToolMention::new(id, name, ""))
}

fn arb_catalog() -> impl Strategy<Value = Vec<ToolMention>> {
    proptest::collection::vec(arb_tool(), 1..5)
}

/// Inputs built from words and mentions of the given tools
fn arb_input(tools: Vec<ToolMention>) -> impl Strategy<Value = String> {
    let names: Vec<String> = tools.iter().map(ToolMention::mention_text).collect();
    proptest::collection::vec(
        prop_oneof![
            "[a-z@ ]{0,6}".boxed(),
            proptest::sample::select(names).boxed(),
        ],
        0..8,
    )
    .prop_map(|parts| parts.join(" "))
}

fn arb_key() -> impl Strategy<Value = Key> {
    prop_oneof![Just(Key::ArrowUp), Just(Key::ArrowDown)]
}

proptest! {
    #[test]
    fn prop_stripping_is_idempotent(
        (tools, input) in arb_catalog().prop_flat_map(|tools| {
            let input = arb_input(tools.clone());
            (Just(tools), input)
        })
    ) {
        let once = strip_mentions(&input, &tools);
        prop_assert_eq!(strip_mentions(&once, &tools), once.clone());
    }

    #[test]
    fn prop_stripped_text_has_no_selected_mentions(
        (tools, input) in arb_catalog().prop_flat_map(|tools| {
            let input = arb_input(tools.clone());
            (Just(tools), input)
        })
    ) {
        let stripped = strip_mentions(&input, &tools);
        for tool in &tools {
            prop_assert!(!stripped.contains(&tool.mention_text()));
        }
    }

    #[test]
    fn prop_highlight_preserves_text(
        (tools, input) in arb_catalog().prop_flat_map(|tools| {
            let input = arb_input(tools.clone());
            (Just(tools), input)
        })
    ) {
        let rebuilt: String = highlight(&input, &tools)
            .into_iter()
            .map(|segment| match segment {
                Segment::Plain(text) | Segment::Mention { text, .. } => text,
            })
            .collect();
        prop_assert_eq!(rebuilt, input);
    }

    #[test]
    fn prop_popup_index_stays_in_range(
        catalog in arb_catalog(),
        keys in proptest::collection::vec(arb_key(), 0..30),
    ) {
        let ctx = ComposerContext { catalog: &catalog, in_flight: false };
        let mut state = reduce(&ComposerState::default(), &ctx, ComposerEvent::Edit("@".to_string())).state;
        for key in keys {
            state = reduce(&state, &ctx, ComposerEvent::KeyDown { key, shift: false }).state;
            let popup = state.popup.expect("arrow keys keep the popup open");
            prop_assert!(popup.highlighted < catalog.len());
        }
    }

    #[test]
    fn prop_up_then_down_returns_to_start(catalog in arb_catalog(), steps in 0usize..10) {
        let ctx = ComposerContext { catalog: &catalog, in_flight: false };
        let mut state = reduce(&ComposerState::default(), &ctx, ComposerEvent::Edit("@".to_string())).state;
        for _ in 0..steps {
            state = reduce(&state, &ctx, ComposerEvent::KeyDown { key: Key::ArrowDown, shift: false }).state;
        }
        let before = state.popup;
        state = reduce(&state, &ctx, ComposerEvent::KeyDown { key: Key::ArrowUp, shift: false }).state;
        state = reduce(&state, &ctx, ComposerEvent::KeyDown { key: Key::ArrowDown, shift: false }).state;
        prop_assert_eq!(state.popup, before);
    }

    #[test]
    fn prop_popup_open_iff_trailing_at(input in "[a-z@ ]{0,12}") {
        let catalog = default_catalog();
        let ctx = ComposerContext { catalog: &catalog, in_flight: false };
        let state = reduce(&ComposerState::default(), &ctx, ComposerEvent::Edit(input.clone())).state;
        prop_assert_eq!(state.popup.is_some(), input.ends_with('@'));
    }
}

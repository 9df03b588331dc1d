// Copyright 2024 New Vector Ltd.
// Copyright 2022 The Matrix.org Foundation C.I.C.
//
// SPDX-License-Identifier: AGPL-3.0-only OR LicenseRef-Element-Commercial
// Please see LICENSE in the repository root for full details.

//! The default matchers: each one encodes a single rule for normalizing
//! pasted markup into change-set content.
//!
//! Matchers are pure `(node, accumulated delta) -> delta` functions. A
//! matcher that returns its input unchanged is a no-op, which is how
//! unhandled elements are ignored while their children's content still
//! flows through.

use std::collections::HashSet;

use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;

use crate::delta::{Attributes, Delta, Insert, Op};
use crate::dom::Node;
use crate::format::FormatRegistry;

/// Tag names treated as block-level layout regardless of styling.
static BLOCK_ELEMENTS: Lazy<HashSet<&'static str>> = Lazy::new(|| {
    HashSet::from([
        "address",
        "article",
        "aside",
        "blockquote",
        "canvas",
        "div",
        "dl",
        "fieldset",
        "figcaption",
        "figure",
        "footer",
        "form",
        "header",
        "h1",
        "h2",
        "h3",
        "h4",
        "h5",
        "h6",
        "hgroup",
        "hr",
        "li",
        "main",
        "nav",
        "noscript",
        "ol",
        "output",
        "p",
        "pre",
        "section",
        "table",
        "tfoot",
        "ul",
        "video",
    ])
});

static MULTI_WHITESPACE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\s\s+").expect("whitespace regex is valid"));

/// Whether the delta's accumulated content ends with `text`. Only a string
/// insert can end with text; an embed or an empty delta counts as not
/// ending with anything.
pub fn delta_ends_with(delta: &Delta, text: &str) -> bool {
    match delta.ops().last() {
        Some(Op::Insert {
            insert: Insert::Text(end),
            ..
        }) => end.ends_with(text),
        _ => false,
    }
}

/// Text normalizer: collapse every run of two or more whitespace characters
/// into a single space, without trimming, and insert the result.
pub fn match_text(node: Node<'_>, delta: Delta) -> Delta {
    let Some(data) = node.text() else {
        return delta;
    };
    let text = MULTI_WHITESPACE.replace_all(data, " ");
    delta.insert(text, None)
}

/// Block boundary: a known block tag, or anything the markup styles as
/// `display:block`, ends its line - unless the accumulated delta already
/// does.
pub fn match_newline(node: Node<'_>, delta: Delta) -> Delta {
    let is_block = node
        .tag_name()
        .is_some_and(|tag| BLOCK_ELEMENTS.contains(tag))
        || node.display_is_block();
    if is_block && !delta_ends_with(&delta, "\n") {
        delta.insert("\n", None)
    } else {
        delta
    }
}

/// Paragraph-spacing heuristic: approximate a visual gap below an element
/// (bottom padding, or bottom margin when not already followed by a blank
/// line) as one newline.
pub fn match_spacing(node: Node<'_>, delta: Delta) -> Delta {
    let nonzero = |property| {
        node.style_length(property).is_some_and(|value| value != 0.0)
    };
    if nonzero("padding-bottom")
        || (nonzero("margin-bottom") && !delta_ends_with(&delta, "\n\n"))
    {
        delta.insert("\n", None)
    } else {
        delta
    }
}

/// Tag aliases: `<b>` and `<i>` imply bold/italic over everything
/// accumulated so far in this subtree.
pub fn match_aliases(node: Node<'_>, delta: Delta) -> Delta {
    let formats = match node.tag_name() {
        Some("b") => attribute("bold", Value::Bool(true)),
        Some("i") => attribute("italic", Value::Bool(true)),
        _ => return delta,
    };
    let length = delta.len();
    delta.compose(&Delta::new().retain(length, Some(formats)))
}

/// Format-registry lookup: an embed definition inserts a one-key object
/// insert with its extracted value; a format definition marks the whole
/// accumulated subtree with its attributes.
pub fn match_formats(
    registry: &dyn FormatRegistry,
    node: Node<'_>,
    delta: Delta,
) -> Delta {
    let Some(definition) = registry.query(node) else {
        return delta;
    };
    if definition.is_embed() {
        return delta.insert_embed(
            definition.name(),
            definition.value(node),
            definition.formats(node),
        );
    }
    if let Some(formats) = definition.formats(node) {
        let length = delta.len();
        return delta.compose(&Delta::new().retain(length, Some(formats)));
    }
    delta
}

fn attribute(name: &str, value: Value) -> Attributes {
    let mut attributes = Attributes::new();
    attributes.insert(name.to_owned(), value);
    attributes
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::dom::Fragment;
    use serde_json::json;

    fn attrs(value: serde_json::Value) -> Attributes {
        value.as_object().expect("attrs fixture must be a map").clone()
    }

    fn first_node(html: &str) -> (Fragment, crate::dom::NodeId) {
        let fragment = Fragment::parse(html);
        let id = fragment.container().children()[0].id();
        (fragment, id)
    }

    #[test]
    fn text_collapses_internal_whitespace_without_trimming() {
        let (fragment, id) = first_node("a   b\n\nc");
        let delta = match_text(fragment.node(id), Delta::new());
        assert_eq!(delta, Delta::new().insert("a b c", None));

        let (fragment, id) = first_node("&#32;x ");
        let delta = match_text(fragment.node(id), Delta::new());
        assert_eq!(delta, Delta::new().insert(" x ", None));
    }

    #[test]
    fn newline_on_block_tag() {
        let (fragment, id) = first_node("<p>x</p>");
        let delta =
            match_newline(fragment.node(id), Delta::new().insert("x", None));
        assert_eq!(delta, Delta::new().insert("x\n", None));
    }

    #[test]
    fn newline_on_styled_block() {
        let (fragment, id) =
            first_node(r#"<span style="display: block">x</span>"#);
        let delta =
            match_newline(fragment.node(id), Delta::new().insert("x", None));
        assert_eq!(delta, Delta::new().insert("x\n", None));
    }

    #[test]
    fn no_duplicate_trailing_newline() {
        let (fragment, id) = first_node("<p>x</p>");
        let delta =
            match_newline(fragment.node(id), Delta::new().insert("x\n", None));
        assert_eq!(delta, Delta::new().insert("x\n", None));
    }

    #[test]
    fn inline_tag_inserts_nothing() {
        let (fragment, id) = first_node("<span>x</span>");
        let delta =
            match_newline(fragment.node(id), Delta::new().insert("x", None));
        assert_eq!(delta, Delta::new().insert("x", None));
    }

    #[test]
    fn embed_at_delta_end_counts_as_no_newline() {
        let (fragment, id) = first_node("<p>x</p>");
        let delta = Delta::new().insert_embed("image", json!("x.png"), None);
        let result = match_newline(fragment.node(id), delta.clone());
        assert_eq!(result, delta.insert("\n", None));
    }

    #[test]
    fn spacing_on_bottom_padding() {
        let (fragment, id) =
            first_node(r#"<span style="padding-bottom: 10px">x</span>"#);
        let delta =
            match_spacing(fragment.node(id), Delta::new().insert("x", None));
        assert_eq!(delta, Delta::new().insert("x\n", None));
    }

    #[test]
    fn spacing_on_bottom_margin_unless_blank_line_already_there() {
        let html = r#"<span style="margin-bottom: 1em">x</span>"#;
        let (fragment, id) = first_node(html);
        let delta =
            match_spacing(fragment.node(id), Delta::new().insert("x\n", None));
        assert_eq!(delta, Delta::new().insert("x\n\n", None));

        let (fragment, id) = first_node(html);
        let delta = match_spacing(
            fragment.node(id),
            Delta::new().insert("x\n\n", None),
        );
        assert_eq!(delta, Delta::new().insert("x\n\n", None));
    }

    #[test]
    fn zero_lengths_do_not_trigger_spacing() {
        let (fragment, id) = first_node(
            r#"<span style="padding-bottom: 0px; margin-bottom: 0">x</span>"#,
        );
        let delta =
            match_spacing(fragment.node(id), Delta::new().insert("x", None));
        assert_eq!(delta, Delta::new().insert("x", None));
    }

    #[test]
    fn aliases_format_the_accumulated_subtree() {
        let (fragment, id) = first_node("<b>hi</b>");
        let delta =
            match_aliases(fragment.node(id), Delta::new().insert("hi", None));
        assert_eq!(
            delta,
            Delta::new().insert("hi", Some(attrs(json!({ "bold": true }))))
        );
    }

    #[test]
    fn aliases_ignore_other_tags() {
        let (fragment, id) = first_node("<u>hi</u>");
        let delta = Delta::new().insert("hi", None);
        assert_eq!(match_aliases(fragment.node(id), delta.clone()), delta);
    }
}

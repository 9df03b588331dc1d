// Copyright 2024 New Vector Ltd.
// Copyright 2022 The Matrix.org Foundation C.I.C.
//
// SPDX-License-Identifier: AGPL-3.0-only OR LicenseRef-Element-Commercial
// Please see LICENSE in the repository root for full details.

//! The conversion traversal: a post-order walk over a parsed fragment that
//! threads each node through an ordered chain of matchers and folds the
//! children's deltas into the parent's.

use std::collections::HashMap;
use std::rc::Rc;

use crate::delta::Delta;
use crate::dom::{Fragment, Node, NodeId, NodeKind};
use crate::format::FormatRegistry;
use crate::matchers;
use crate::selector::Selector;

/// One normalization rule: maps a node and the delta accumulated so far to
/// a possibly-extended delta. Returning the input unchanged is a no-op.
pub type MatcherFn = Box<dyn Fn(Node<'_>, Delta) -> Delta>;

/// What a matcher is registered against.
pub enum MatcherTarget {
    /// Text nodes only.
    Text,
    /// Element nodes only.
    Element,
    /// Every node regardless of kind.
    Any,
    /// Elements matching a selector, resolved in a pre-pass.
    Selector(Selector),
}

impl From<NodeKind> for MatcherTarget {
    fn from(kind: NodeKind) -> Self {
        match kind {
            NodeKind::Text => MatcherTarget::Text,
            NodeKind::Element => MatcherTarget::Element,
        }
    }
}

impl From<&str> for MatcherTarget {
    fn from(selector: &str) -> Self {
        MatcherTarget::Selector(Selector::parse(selector))
    }
}

/// The matcher registry plus the traversal that runs it.
///
/// Matchers run in registration order, defaults first, so externally added
/// matchers compose on top of the defaults' results. There is no removal,
/// and registering the same selector twice legally runs its matcher twice.
pub struct Converter {
    matchers: Vec<(MatcherTarget, MatcherFn)>,
}

impl Converter {
    pub fn new(registry: Rc<dyn FormatRegistry>) -> Self {
        let mut converter = Self {
            matchers: Vec::new(),
        };
        converter.add_matcher(NodeKind::Text, Box::new(matchers::match_text));
        converter
            .add_matcher(NodeKind::Element, Box::new(matchers::match_newline));
        converter.add_matcher(
            NodeKind::Element,
            Box::new(move |node, delta| {
                matchers::match_formats(registry.as_ref(), node, delta)
            }),
        );
        converter
            .add_matcher(NodeKind::Element, Box::new(matchers::match_spacing));
        converter.add_matcher("b, i", Box::new(matchers::match_aliases));
        converter
    }

    /// Append a matcher. Evaluation order is registration order.
    pub fn add_matcher(
        &mut self,
        target: impl Into<MatcherTarget>,
        matcher: MatcherFn,
    ) {
        self.matchers.push((target.into(), matcher));
    }

    /// Convert a parsed fragment into the change-set describing its
    /// normalized content.
    pub fn convert(&self, fragment: &Fragment) -> Delta {
        // Selector applicability is resolved once per conversion call and
        // kept in a map keyed by node identity, never on the node itself,
        // so nothing can leak into a later pass.
        let mut annotations: HashMap<NodeId, Vec<usize>> = HashMap::new();
        let container = fragment.container();
        for (index, (target, _)) in self.matchers.iter().enumerate() {
            if let MatcherTarget::Selector(selector) = target {
                annotate_descendants(
                    container,
                    selector,
                    index,
                    &mut annotations,
                );
            }
        }
        self.traverse(container, &annotations)
    }

    /// Post-order: children before parent, each child's delta threaded
    /// through the kind-based matchers then its selector annotations, then
    /// concatenated onto the parent's accumulated delta in document order.
    /// The node itself receives no matchers - only its descendants do.
    fn traverse(
        &self,
        node: Node<'_>,
        annotations: &HashMap<NodeId, Vec<usize>>,
    ) -> Delta {
        let mut delta = Delta::new();
        for child in node.children() {
            let mut child_delta = self.traverse(child, annotations);
            for (target, matcher) in &self.matchers {
                let applies = match target {
                    MatcherTarget::Any => true,
                    MatcherTarget::Text => child.kind() == NodeKind::Text,
                    MatcherTarget::Element => {
                        child.kind() == NodeKind::Element
                    }
                    MatcherTarget::Selector(_) => false,
                };
                if applies {
                    child_delta = matcher(child, child_delta);
                }
            }
            if let Some(indices) = annotations.get(&child.id()) {
                for &index in indices {
                    child_delta = (self.matchers[index].1)(child, child_delta);
                }
            }
            delta = delta.concat(child_delta);
        }
        delta
    }
}

fn annotate_descendants(
    node: Node<'_>,
    selector: &Selector,
    index: usize,
    annotations: &mut HashMap<NodeId, Vec<usize>>,
) {
    for child in node.children() {
        if selector.matches(&child) {
            annotations.entry(child.id()).or_default().push(index);
        }
        annotate_descendants(child, selector, index, annotations);
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::delta::Attributes;
    use crate::format::{FormatDefinition, NullRegistry};
    use serde_json::{json, Value};

    fn attrs(value: serde_json::Value) -> Attributes {
        value.as_object().expect("attrs fixture must be a map").clone()
    }

    fn convert(html: &str) -> Delta {
        Converter::new(Rc::new(NullRegistry))
            .convert(&Fragment::parse(html))
    }

    struct ImageFormat;

    impl FormatDefinition for ImageFormat {
        fn name(&self) -> &str {
            "image"
        }

        fn is_embed(&self) -> bool {
            true
        }

        fn value(&self, node: Node<'_>) -> Value {
            Value::String(node.attr("src").unwrap_or_default().to_owned())
        }
    }

    struct CiteFormat;

    impl FormatDefinition for CiteFormat {
        fn name(&self) -> &str {
            "cite"
        }

        fn formats(&self, _node: Node<'_>) -> Option<Attributes> {
            Some(attrs(json!({ "italic": true, "bold": "registry" })))
        }
    }

    struct TestRegistry {
        image: ImageFormat,
        cite: CiteFormat,
    }

    impl TestRegistry {
        fn new() -> Self {
            Self {
                image: ImageFormat,
                cite: CiteFormat,
            }
        }
    }

    impl FormatRegistry for TestRegistry {
        fn query(&self, node: Node<'_>) -> Option<&dyn FormatDefinition> {
            match node.tag_name() {
                Some("img") => Some(&self.image),
                Some("cite") | Some("b") => Some(&self.cite),
                _ => None,
            }
        }
    }

    #[test]
    fn plain_text_flows_through() {
        assert_eq!(convert("hello"), Delta::new().insert("hello", None));
    }

    #[test]
    fn paragraphs_become_newlines() {
        assert_eq!(
            convert("<p>a</p><p>b</p>"),
            Delta::new().insert("a\nb\n", None)
        );
    }

    #[test]
    fn nested_blocks_do_not_double_newlines() {
        assert_eq!(
            convert("<div><div>a</div></div>"),
            Delta::new().insert("a\n", None)
        );
    }

    #[test]
    fn bold_and_italic_aliases() {
        assert_eq!(
            convert("<b>hi</b>"),
            Delta::new().insert("hi", Some(attrs(json!({ "bold": true }))))
        );
        assert_eq!(
            convert("x<i>y</i>z"),
            Delta::new()
                .insert("x", None)
                .insert("y", Some(attrs(json!({ "italic": true }))))
                .insert("z", None)
        );
    }

    #[test]
    fn unhandled_elements_pass_children_through() {
        assert_eq!(
            convert("<span><u>hi</u></span>"),
            Delta::new().insert("hi", None)
        );
    }

    #[test]
    fn whitespace_is_collapsed_inside_blocks() {
        assert_eq!(
            convert("<p>a   b\n\nc</p>"),
            Delta::new().insert("a b c\n", None)
        );
    }

    #[test]
    fn noop_matcher_never_changes_output() {
        let baseline = convert("<p>a <b>b</b></p>");
        let mut converter = Converter::new(Rc::new(NullRegistry));
        converter.add_matcher(
            MatcherTarget::Any,
            Box::new(|_node, delta| delta),
        );
        let with_noop = converter.convert(&Fragment::parse("<p>a <b>b</b></p>"));
        assert_eq!(with_noop, baseline);
    }

    #[test]
    fn later_matcher_wins_on_same_attribute_key() {
        // The registry matcher (kind-based) sets bold="registry" and
        // italic=true; the alias matcher (selector-based) runs later and
        // overwrites bold with true. Both attributes end up on the range.
        let converter = Converter::new(Rc::new(TestRegistry::new()));
        let delta = converter.convert(&Fragment::parse("<b>hi</b>"));
        assert_eq!(
            delta,
            Delta::new().insert(
                "hi",
                Some(attrs(json!({ "bold": true, "italic": true })))
            )
        );
    }

    #[test]
    fn registry_formats_mark_the_subtree() {
        let converter = Converter::new(Rc::new(TestRegistry::new()));
        let delta = converter.convert(&Fragment::parse("<cite>quote</cite>"));
        assert_eq!(
            delta,
            Delta::new().insert(
                "quote",
                Some(attrs(json!({ "italic": true, "bold": "registry" })))
            )
        );
    }

    #[test]
    fn embeds_become_a_single_object_insert() {
        let converter = Converter::new(Rc::new(TestRegistry::new()));
        let delta = converter
            .convert(&Fragment::parse(r#"<img src="https://x.test/a.png">"#));
        assert_eq!(
            delta,
            Delta::new().insert_embed(
                "image",
                json!("https://x.test/a.png"),
                None
            )
        );
        assert_eq!(delta.ops().len(), 1);
    }

    #[test]
    fn external_matchers_run_after_defaults() {
        let mut converter = Converter::new(Rc::new(NullRegistry));
        converter.add_matcher(
            "b",
            Box::new(|_node, delta| delta.insert("!", None)),
        );
        let delta = converter.convert(&Fragment::parse("<b>hi</b>"));
        // The alias matcher has already bolded the subtree by the time the
        // external matcher appends its marker.
        assert_eq!(
            delta,
            Delta::new()
                .insert("hi", Some(attrs(json!({ "bold": true }))))
                .insert("!", None)
        );
    }

    #[test]
    fn registering_the_same_selector_twice_runs_it_twice() {
        let mut converter = Converter::new(Rc::new(NullRegistry));
        for _ in 0..2 {
            converter.add_matcher(
                "b",
                Box::new(|_node, delta| delta.insert("!", None)),
            );
        }
        let delta = converter.convert(&Fragment::parse("<b>x</b>"));
        assert!(matchers::delta_ends_with(&delta, "!!"));
    }
}

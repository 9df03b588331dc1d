// Copyright 2024 New Vector Ltd.
// Copyright 2022 The Matrix.org Foundation C.I.C.
//
// SPDX-License-Identifier: AGPL-3.0-only OR LicenseRef-Element-Commercial
// Please see LICENSE in the repository root for full details.

//! CSS-like selectors for matcher registration.
//!
//! Only what matcher registration needs: comma-separated alternatives of
//! `tag`, `.class` and `tag.class`. Parsing never fails; an empty selector
//! simply matches nothing.

use crate::dom::{Node, NodeKind};

#[derive(Clone, Debug, PartialEq, Eq)]
struct SimpleSelector {
    tag: Option<String>,
    class: Option<String>,
}

impl SimpleSelector {
    fn parse(source: &str) -> Option<Self> {
        let source = source.trim();
        if source.is_empty() {
            return None;
        }
        let (tag, class) = match source.split_once('.') {
            Some((tag, class)) => (tag, Some(class.to_owned())),
            None => (source, None),
        };
        let tag = if tag.is_empty() {
            None
        } else {
            Some(tag.to_ascii_lowercase())
        };
        Some(Self { tag, class })
    }

    fn matches(&self, node: &Node<'_>) -> bool {
        if let Some(tag) = &self.tag {
            let matched = node
                .tag_name()
                .is_some_and(|name| name.eq_ignore_ascii_case(tag));
            if !matched {
                return false;
            }
        }
        if let Some(class) = &self.class {
            let matched = node.attr("class").is_some_and(|value| {
                value.split_ascii_whitespace().any(|c| c == class)
            });
            if !matched {
                return false;
            }
        }
        true
    }
}

/// A parsed selector string such as `"b, i"` or `"img.emoji"`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Selector {
    alternatives: Vec<SimpleSelector>,
}

impl Selector {
    pub fn parse(source: &str) -> Self {
        Self {
            alternatives: source
                .split(',')
                .filter_map(SimpleSelector::parse)
                .collect(),
        }
    }

    pub fn matches(&self, node: &Node<'_>) -> bool {
        node.kind() == NodeKind::Element
            && self.alternatives.iter().any(|s| s.matches(node))
    }
}

impl From<&str> for Selector {
    fn from(source: &str) -> Self {
        Selector::parse(source)
    }
}

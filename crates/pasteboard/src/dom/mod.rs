// Copyright 2024 New Vector Ltd.
// Copyright 2022 The Matrix.org Foundation C.I.C.
//
// SPDX-License-Identifier: AGPL-3.0-only OR LicenseRef-Element-Commercial
// Please see LICENSE in the repository root for full details.

//! A flat-arena DOM for browser-normalized clipboard markup.
//!
//! Nodes are owned in one list held by the [`Fragment`]; parents refer to
//! their children by [`NodeId`] handles. The arena is filled by an html5ever
//! `TreeSink` (see [`parse`]) and is read-only afterwards - the conversion
//! traversal only ever inspects it.

mod parse;

use html5ever::QualName;

/// Handle to a node inside a [`Fragment`]'s arena.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct NodeId(pub(crate) usize);

#[derive(Clone, Debug)]
pub(crate) enum FragmentNode {
    /// The fragment document; never visible to matchers.
    Document { children: Vec<NodeId> },
    Element(ElementData),
    Text(TextData),
    /// Comments, processing instructions and template contents land here and
    /// are invisible to the traversal.
    Ignored { children: Vec<NodeId> },
}

#[derive(Clone, Debug)]
pub(crate) struct ElementData {
    pub(crate) name: QualName,
    pub(crate) attrs: Vec<(String, String)>,
    pub(crate) children: Vec<NodeId>,
}

impl ElementData {
    pub(crate) fn get_attr(&self, name: &str) -> Option<&str> {
        self.attrs
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v.as_str())
    }
}

#[derive(Clone, Debug)]
pub(crate) struct TextData {
    pub(crate) content: String,
}

/// A parsed clipboard fragment: what the staging surface holds after the
/// platform populated it.
#[derive(Clone, Debug)]
pub struct Fragment {
    nodes: Vec<FragmentNode>,
    document: NodeId,
}

impl Fragment {
    /// Parse browser-normalized HTML, best effort. Clipboard markup is
    /// arbitrarily messy, so recoverable parse errors are logged and
    /// swallowed rather than surfaced.
    pub fn parse(html: &str) -> Fragment {
        parse::parse(html)
    }

    pub(crate) fn new() -> Self {
        Self {
            nodes: vec![FragmentNode::Document {
                children: Vec::new(),
            }],
            document: NodeId(0),
        }
    }

    pub(crate) fn add_node(&mut self, node: FragmentNode) -> NodeId {
        self.nodes.push(node);
        NodeId(self.nodes.len() - 1)
    }

    pub(crate) fn get(&self, id: NodeId) -> &FragmentNode {
        &self.nodes[id.0]
    }

    pub(crate) fn get_mut(&mut self, id: NodeId) -> &mut FragmentNode {
        &mut self.nodes[id.0]
    }

    pub(crate) fn document_id(&self) -> NodeId {
        self.document
    }

    pub fn node(&self, id: NodeId) -> Node<'_> {
        Node { fragment: self, id }
    }

    /// The node whose children are the pasted content: html5ever wraps a
    /// fragment in a single context element, which maps naturally onto the
    /// staging surface container. Matchers never run on the container
    /// itself, only on its descendants.
    pub fn container(&self) -> Node<'_> {
        let children = self.children_of(self.document);
        match children.first() {
            Some(&id) if matches!(self.get(id), FragmentNode::Element(_)) => {
                self.node(id)
            }
            _ => self.node(self.document),
        }
    }

    pub(crate) fn children_of(&self, id: NodeId) -> &[NodeId] {
        match self.get(id) {
            FragmentNode::Document { children }
            | FragmentNode::Ignored { children } => children,
            FragmentNode::Element(element) => &element.children,
            FragmentNode::Text(_) => &[],
        }
    }
}

/// The kind of node a matcher can be registered against.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum NodeKind {
    Text,
    Element,
}

/// A borrow of one node in a [`Fragment`], with the accessors matchers need.
#[derive(Clone, Copy)]
pub struct Node<'a> {
    fragment: &'a Fragment,
    id: NodeId,
}

impl<'a> Node<'a> {
    pub fn id(&self) -> NodeId {
        self.id
    }

    pub fn kind(&self) -> NodeKind {
        match self.fragment.get(self.id) {
            FragmentNode::Text(_) => NodeKind::Text,
            _ => NodeKind::Element,
        }
    }

    /// Lowercased tag name; `None` for text nodes and the document.
    pub fn tag_name(&self) -> Option<&'a str> {
        match self.fragment.get(self.id) {
            FragmentNode::Element(element) => {
                Some(element.name.local.as_ref())
            }
            _ => None,
        }
    }

    pub fn attr(&self, name: &str) -> Option<&'a str> {
        match self.fragment.get(self.id) {
            FragmentNode::Element(element) => element.get_attr(name),
            _ => None,
        }
    }

    /// Character data; `None` for anything but a text node.
    pub fn text(&self) -> Option<&'a str> {
        match self.fragment.get(self.id) {
            FragmentNode::Text(text) => Some(&text.content),
            _ => None,
        }
    }

    /// Children in document order, with ignored nodes (comments etc.)
    /// filtered out.
    pub fn children(&self) -> Vec<Node<'a>> {
        self.fragment
            .children_of(self.id)
            .iter()
            .filter(|&&id| {
                !matches!(self.fragment.get(id), FragmentNode::Ignored { .. })
            })
            .map(|&id| self.fragment.node(id))
            .collect()
    }

    /// Value of one property in the inline `style` attribute. Inline style
    /// is the stand-in for computed style: browser-normalized external
    /// markup carries the styles that matter inline.
    pub fn style_value(&self, property: &str) -> Option<&'a str> {
        let style = self.attr("style")?;
        for declaration in style.split(';') {
            if let Some((name, value)) = declaration.split_once(':') {
                if name.trim().eq_ignore_ascii_case(property) {
                    return Some(value.trim());
                }
            }
        }
        None
    }

    pub fn display_is_block(&self) -> bool {
        self.style_value("display")
            .is_some_and(|value| value.eq_ignore_ascii_case("block"))
    }

    /// Numeric magnitude of a CSS length property, unit ignored. `None`
    /// when the property is absent or not a length.
    pub fn style_length(&self, property: &str) -> Option<f32> {
        let value = self.style_value(property)?;
        let digits: String = value
            .chars()
            .take_while(|c| c.is_ascii_digit() || *c == '.' || *c == '-')
            .collect();
        digits.parse().ok()
    }
}

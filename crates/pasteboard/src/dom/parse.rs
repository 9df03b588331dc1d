// Copyright 2024 New Vector Ltd.
// Copyright 2022 The Matrix.org Foundation C.I.C.
//
// SPDX-License-Identifier: AGPL-3.0-only OR LicenseRef-Element-Commercial
// Please see LICENSE in the repository root for full details.

//! html5ever glue: a `TreeSink` that fills the [`Fragment`] arena.
//!
//! Unlike a parser for markup we produced ourselves, this one must accept
//! whatever a paste hands it. Recoverable parse errors are therefore logged
//! at debug level and otherwise ignored, misnested formatting tags go
//! through the adoption agency callbacks below, and comments / doctypes /
//! processing instructions become [`FragmentNode::Ignored`] nodes that the
//! traversal never sees.

use std::cell::{Ref, RefCell};
use std::collections::HashMap;

use html5ever::interface::NextParserState;
use html5ever::tendril::{StrTendril, TendrilSink};
use html5ever::tree_builder::{ElementFlags, NodeOrText, QuirksMode, TreeSink};
use html5ever::{
    namespace_url, ns, parse_fragment, Attribute, LocalName, QualName,
};
use tracing::debug;

use super::{ElementData, Fragment, FragmentNode, NodeId, TextData};

pub(super) fn parse(html: &str) -> Fragment {
    parse_fragment(
        FragmentSink::default(),
        Default::default(),
        html_qual_name("div"),
        vec![],
    )
    .from_utf8()
    .one(html.as_bytes())
}

fn html_qual_name(local: &str) -> QualName {
    QualName::new(None, ns!(html), LocalName::from(local))
}

struct SinkState {
    fragment: Fragment,
    parse_errors: Vec<String>,
    template_contents: HashMap<NodeId, NodeId>,
}

struct FragmentSink {
    state: RefCell<SinkState>,
}

impl Default for FragmentSink {
    fn default() -> Self {
        Self {
            state: RefCell::new(SinkState {
                fragment: Fragment::new(),
                parse_errors: Vec::new(),
                template_contents: HashMap::new(),
            }),
        }
    }
}

impl FragmentSink {
    /// Parent lookup by child-list scan. The arena stores no parent links;
    /// the trees involved are single pastes, small enough for this.
    fn parent_of(fragment: &Fragment, target: NodeId) -> Option<NodeId> {
        (0..fragment.nodes.len()).map(NodeId).find(|&id| {
            fragment.children_of(id).contains(&target)
        })
    }

    fn append_to(fragment: &mut Fragment, parent: NodeId, child: NodeId) {
        match fragment.get_mut(parent) {
            FragmentNode::Document { children }
            | FragmentNode::Ignored { children } => children.push(child),
            FragmentNode::Element(element) => element.children.push(child),
            FragmentNode::Text(_) => {
                unreachable!("text nodes cannot have children")
            }
        }
    }
}

impl TreeSink for FragmentSink {
    type Handle = NodeId;
    type Output = Fragment;
    type ElemName<'a> = Ref<'a, QualName>;

    fn finish(self) -> Self::Output {
        let state = self.state.into_inner();
        for error in &state.parse_errors {
            debug!(error = %error, "recovered clipboard parse error");
        }
        state.fragment
    }

    fn parse_error(&self, msg: std::borrow::Cow<'static, str>) {
        self.state.borrow_mut().parse_errors.push(String::from(msg));
    }

    fn get_document(&self) -> Self::Handle {
        self.state.borrow().fragment.document_id()
    }

    fn elem_name<'a>(&'a self, target: &'a Self::Handle) -> Self::ElemName<'a> {
        Ref::map(self.state.borrow(), |state| {
            match state.fragment.get(*target) {
                FragmentNode::Element(element) => &element.name,
                _ => panic!("elem_name called on a non-element"),
            }
        })
    }

    fn create_element(
        &self,
        name: QualName,
        attrs: Vec<Attribute>,
        _flags: ElementFlags,
    ) -> Self::Handle {
        let attrs = attrs
            .iter()
            .map(|attr| {
                (
                    attr.name.local.as_ref().to_owned(),
                    attr.value.as_ref().to_owned(),
                )
            })
            .collect();
        self.state
            .borrow_mut()
            .fragment
            .add_node(FragmentNode::Element(ElementData {
                name,
                attrs,
                children: Vec::new(),
            }))
    }

    fn create_comment(&self, _text: StrTendril) -> Self::Handle {
        self.state
            .borrow_mut()
            .fragment
            .add_node(FragmentNode::Ignored {
                children: Vec::new(),
            })
    }

    fn create_pi(
        &self,
        _target: StrTendril,
        _data: StrTendril,
    ) -> Self::Handle {
        self.state
            .borrow_mut()
            .fragment
            .add_node(FragmentNode::Ignored {
                children: Vec::new(),
            })
    }

    fn append(&self, parent: &Self::Handle, child: NodeOrText<Self::Handle>) {
        let fragment = &mut self.state.borrow_mut().fragment;
        match child {
            NodeOrText::AppendNode(child) => {
                Self::append_to(fragment, *parent, child);
            }
            NodeOrText::AppendText(tendril) => {
                // The tokenizer delivers text in chunks; merge consecutive
                // chunks into one text node.
                let last_text = fragment
                    .children_of(*parent)
                    .last()
                    .copied()
                    .filter(|&id| {
                        matches!(fragment.get(id), FragmentNode::Text(_))
                    });
                if let Some(id) = last_text {
                    if let FragmentNode::Text(text) = fragment.get_mut(id) {
                        text.content += tendril.as_ref();
                    }
                } else {
                    let id = fragment.add_node(FragmentNode::Text(TextData {
                        content: tendril.as_ref().to_owned(),
                    }));
                    Self::append_to(fragment, *parent, id);
                }
            }
        }
    }

    fn append_based_on_parent_node(
        &self,
        element: &Self::Handle,
        prev_element: &Self::Handle,
        child: NodeOrText<Self::Handle>,
    ) {
        let has_parent = {
            let fragment = &self.state.borrow().fragment;
            Self::parent_of(fragment, *element).is_some()
        };
        if has_parent {
            self.append_before_sibling(element, child);
        } else {
            self.append(prev_element, child);
        }
    }

    fn append_doctype_to_document(
        &self,
        _name: StrTendril,
        _public_id: StrTendril,
        _system_id: StrTendril,
    ) {
        // Doctypes in clipboard payloads carry nothing we need.
    }

    fn mark_script_already_started(&self, _node: &Self::Handle) {}

    fn pop(&self, _node: &Self::Handle) {}

    fn get_template_contents(&self, target: &Self::Handle) -> Self::Handle {
        let mut state = self.state.borrow_mut();
        if let Some(contents) = state.template_contents.get(target) {
            return *contents;
        }
        let contents = state.fragment.add_node(FragmentNode::Ignored {
            children: Vec::new(),
        });
        state.template_contents.insert(*target, contents);
        contents
    }

    fn same_node(&self, x: &Self::Handle, y: &Self::Handle) -> bool {
        x == y
    }

    fn set_quirks_mode(&self, _mode: QuirksMode) {}

    fn append_before_sibling(
        &self,
        sibling: &Self::Handle,
        new_node: NodeOrText<Self::Handle>,
    ) {
        let mut state = self.state.borrow_mut();
        let fragment = &mut state.fragment;
        let Some(parent) = Self::parent_of(fragment, *sibling) else {
            return;
        };
        let new_id = match new_node {
            NodeOrText::AppendNode(id) => id,
            NodeOrText::AppendText(tendril) => {
                fragment.add_node(FragmentNode::Text(TextData {
                    content: tendril.as_ref().to_owned(),
                }))
            }
        };
        let position = fragment
            .children_of(parent)
            .iter()
            .position(|&id| id == *sibling);
        match (fragment.get_mut(parent), position) {
            (FragmentNode::Document { children }, Some(at))
            | (FragmentNode::Ignored { children }, Some(at)) => {
                children.insert(at, new_id);
            }
            (FragmentNode::Element(element), Some(at)) => {
                element.children.insert(at, new_id);
            }
            _ => {}
        }
    }

    fn add_attrs_if_missing(
        &self,
        target: &Self::Handle,
        attrs: Vec<Attribute>,
    ) {
        let fragment = &mut self.state.borrow_mut().fragment;
        if let FragmentNode::Element(element) = fragment.get_mut(*target) {
            for attr in attrs {
                let name = attr.name.local.as_ref();
                if element.get_attr(name).is_none() {
                    element
                        .attrs
                        .push((name.to_owned(), attr.value.as_ref().to_owned()));
                }
            }
        }
    }

    fn associate_with_form(
        &self,
        _target: &Self::Handle,
        _form: &Self::Handle,
        _nodes: (&Self::Handle, Option<&Self::Handle>),
    ) {
    }

    fn remove_from_parent(&self, target: &Self::Handle) {
        let fragment = &mut self.state.borrow_mut().fragment;
        let Some(parent) = Self::parent_of(fragment, *target) else {
            return;
        };
        match fragment.get_mut(parent) {
            FragmentNode::Document { children }
            | FragmentNode::Ignored { children } => {
                children.retain(|&id| id != *target);
            }
            FragmentNode::Element(element) => {
                element.children.retain(|&id| id != *target);
            }
            FragmentNode::Text(_) => {}
        }
    }

    fn reparent_children(
        &self,
        node: &Self::Handle,
        new_parent: &Self::Handle,
    ) {
        let fragment = &mut self.state.borrow_mut().fragment;
        let moved: Vec<NodeId> = match fragment.get_mut(*node) {
            FragmentNode::Document { children }
            | FragmentNode::Ignored { children } => {
                std::mem::take(children)
            }
            FragmentNode::Element(element) => {
                std::mem::take(&mut element.children)
            }
            FragmentNode::Text(_) => Vec::new(),
        };
        for child in moved {
            Self::append_to(fragment, *new_parent, child);
        }
    }

    fn is_mathml_annotation_xml_integration_point(
        &self,
        _handle: &Self::Handle,
    ) -> bool {
        false
    }

    fn set_current_line(&self, _line_number: u64) {}

    fn complete_script(&self, _node: &Self::Handle) -> NextParserState {
        NextParserState::Continue
    }

    fn allow_declarative_shadow_roots(
        &self,
        _intended_parent: &Self::Handle,
    ) -> bool {
        false
    }

    fn attach_declarative_shadow(
        &self,
        _location: &Self::Handle,
        _template: &Self::Handle,
        _attrs: Vec<Attribute>,
    ) -> Result<(), String> {
        Err(String::from("declarative shadow roots are not supported"))
    }
}

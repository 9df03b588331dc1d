// Copyright 2024 New Vector Ltd.
// Copyright 2022 The Matrix.org Foundation C.I.C.
//
// SPDX-License-Identifier: AGPL-3.0-only OR LicenseRef-Element-Commercial
// Please see LICENSE in the repository root for full details.

//! Clipboard-to-document conversion for a rich text editor.
//!
//! The core is the HTML-to-change-set pipeline: pasted markup is routed
//! through a staging surface, parsed into a [`dom::Fragment`], and walked
//! post-order by [`convert::Converter`], whose chain of matchers
//! incrementally builds a [`delta::Delta`] describing the equivalent
//! structured content. The [`clipboard::Clipboard`] bridge wires the
//! pipeline to copy/cut/paste events against the host editor's
//! [`document::Document`] collaborator.

pub mod clipboard;
pub mod convert;
pub mod delta;
pub mod document;
pub mod dom;
pub mod format;
pub mod matchers;
pub mod selector;

pub use clipboard::{
    Clipboard, ClipboardEvent, DataTransfer, PasteOutcome, PendingPaste,
    StagingSurface, STRUCTURED_FORMAT, TEXT_FORMAT,
};
pub use convert::{Converter, MatcherFn, MatcherTarget};
pub use delta::{Attributes, Delta, Insert, Op};
pub use document::{Document, Range, Source};
pub use dom::{Fragment, Node, NodeId, NodeKind};
pub use format::{FormatDefinition, FormatRegistry, NullRegistry};
pub use selector::Selector;

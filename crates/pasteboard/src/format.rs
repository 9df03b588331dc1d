// Copyright 2024 New Vector Ltd.
// Copyright 2022 The Matrix.org Foundation C.I.C.
//
// SPDX-License-Identifier: AGPL-3.0-only OR LicenseRef-Element-Commercial
// Please see LICENSE in the repository root for full details.

//! The format registry boundary: how the host editor tells this crate which
//! DOM elements carry document formats or embedded atomic objects.

use serde_json::Value;

use crate::delta::Attributes;
use crate::dom::Node;

/// One registered format or embed kind.
///
/// Implementations must be total over well-formed DOM input: a panicking
/// definition is a programming error, not a recoverable condition.
pub trait FormatDefinition {
    /// The format name; for embeds this is the key of the one-key insert
    /// mapping, e.g. `"image"`.
    fn name(&self) -> &str;

    /// Whether matching elements are atomic embedded objects rather than
    /// formatting wrappers.
    fn is_embed(&self) -> bool {
        false
    }

    /// Extract the embed payload from a matching element.
    fn value(&self, _node: Node<'_>) -> Value {
        Value::Null
    }

    /// The formatting attributes a matching element implies, or `None` when
    /// this definition exposes no formats function at all.
    fn formats(&self, _node: Node<'_>) -> Option<Attributes> {
        None
    }
}

/// Lookup from a DOM element to its registered definition. Owned by the host
/// editor; this crate only queries it.
pub trait FormatRegistry {
    fn query(&self, node: Node<'_>) -> Option<&dyn FormatDefinition>;
}

/// Registry for hosts without any custom formats or embeds.
#[derive(Clone, Copy, Debug, Default)]
pub struct NullRegistry;

impl FormatRegistry for NullRegistry {
    fn query(&self, _node: Node<'_>) -> Option<&dyn FormatDefinition> {
        None
    }
}

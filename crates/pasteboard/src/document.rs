// Copyright 2024 New Vector Ltd.
// Copyright 2022 The Matrix.org Foundation C.I.C.
//
// SPDX-License-Identifier: AGPL-3.0-only OR LicenseRef-Element-Commercial
// Please see LICENSE in the repository root for full details.

//! The document collaborator boundary: the surface of the host editor's
//! storage/selection engine that the clipboard bridge drives.

use crate::delta::Delta;

/// A selected span of the document.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Range {
    pub index: usize,
    pub length: usize,
}

impl Range {
    pub fn new(index: usize, length: usize) -> Self {
        Self { index, length }
    }

    pub fn is_empty(&self) -> bool {
        self.length == 0
    }
}

/// Who triggered a change. `Silent` suppresses user-facing notifications,
/// which is how the bridge moves the selection without emitting events.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Source {
    User,
    Api,
    Silent,
}

/// The host editor's document and selection engine.
///
/// Every method is assumed to be an atomic single step that either succeeds
/// or panics; a host that violates that is a programming error, not a
/// condition the bridge recovers from.
pub trait Document {
    /// The current selection, or `None` when the editor has no focus.
    fn selection(&self) -> Option<Range>;

    /// Plain text of a range.
    fn text(&self, range: Range) -> String;

    /// Full structured content of a range, as a change-set of inserts.
    fn contents(&self, range: Range) -> Delta;

    /// Apply a change-set to the document.
    fn update_contents(&mut self, delta: Delta, source: Source);

    /// Delete a range outright.
    fn delete_text(&mut self, range: Range, source: Source);

    /// Collapse the selection to an index.
    fn set_selection(&mut self, index: usize, source: Source);

    /// Bring the selection into view after a programmatic move.
    fn scroll_selection_into_view(&mut self) {}
}

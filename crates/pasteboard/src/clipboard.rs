// Copyright 2024 New Vector Ltd.
// Copyright 2022 The Matrix.org Foundation C.I.C.
//
// SPDX-License-Identifier: AGPL-3.0-only OR LicenseRef-Element-Commercial
// Please see LICENSE in the repository root for full details.

//! The clipboard event bridge: copy, cut and paste against the platform
//! clipboard, with the HTML fallback routed through a staging surface.
//!
//! Paste is the only asynchronous path. The platform populates the staging
//! surface after the event handler has returned, so the handler snapshots
//! the selection and the delete-then-retain base delta immediately and
//! returns a [`PendingPaste`]; the host schedules
//! [`Clipboard::complete_paste`] for the next cooperative tick.

use std::rc::Rc;

use tracing::debug;

use crate::convert::{Converter, MatcherFn, MatcherTarget};
use crate::delta::Delta;
use crate::document::{Document, Source};
use crate::dom::Fragment;
use crate::format::FormatRegistry;

/// Clipboard slot carrying plain text.
pub const TEXT_FORMAT: &str = "text/plain";
/// Clipboard slot carrying a serialized change-set.
pub const STRUCTURED_FORMAT: &str = "application/json";

/// Platform clipboard payload of one event.
///
/// Capability reporting is inconsistent across platforms: the type list may
/// be absent entirely, and some platforms refuse to store anything but
/// plain text. Callers must treat both as ordinary states, not errors.
pub trait DataTransfer {
    /// Available slot types, or `None` when the platform does not report
    /// them. Callers normalize to an empty list before membership tests.
    fn types(&self) -> Option<Vec<String>>;

    fn get_data(&self, format: &str) -> Option<String>;

    fn set_data(&mut self, format: &str, data: &str);

    /// Whether non-text slots can be written at all.
    fn supports_custom_types(&self) -> bool {
        true
    }
}

/// A copy/cut/paste event: the payload plus the handled flag earlier
/// handlers may have set. A handler observing the flag skips all work.
pub struct ClipboardEvent<'a> {
    pub data: &'a mut dyn DataTransfer,
    handled: bool,
}

impl<'a> ClipboardEvent<'a> {
    pub fn new(data: &'a mut dyn DataTransfer) -> Self {
        Self {
            data,
            handled: false,
        }
    }

    pub fn is_handled(&self) -> bool {
        self.handled
    }

    pub fn mark_handled(&mut self) {
        self.handled = true;
    }
}

/// The off-screen editable container the platform's default paste behavior
/// populates with browser-normalized HTML. Routing the paste through a real
/// surface is what irons out cross-browser markup quirks; this type only
/// holds the result until the deferred conversion drains it.
#[derive(Debug, Default)]
pub struct StagingSurface {
    contents: Option<String>,
}

impl StagingSurface {
    /// Called by the host once the platform has landed the pasted markup.
    pub fn populate(&mut self, html: impl Into<String>) {
        self.contents = Some(html.into());
    }

    /// Drain the surface. Contents never survive a paste.
    pub fn take_html(&mut self) -> Option<String> {
        self.contents.take()
    }

    pub fn clear(&mut self) {
        self.contents = None;
    }
}

/// What [`Clipboard::on_paste`] did with the event.
pub enum PasteOutcome {
    /// Another handler already dealt with the event, or there was no
    /// selection to paste into; nothing happened.
    Ignored,
    /// The structured slot carried a valid change-set and it has been
    /// applied synchronously.
    Applied,
    /// The HTML fallback path is in flight: the host must let the platform
    /// populate the staging surface, then call
    /// [`Clipboard::complete_paste`] on the next tick.
    Deferred(PendingPaste),
}

/// The state snapshotted synchronously during the paste event, carried
/// across the one-tick deferral. The selection is captured here and never
/// re-read: by the time the continuation runs the user may have moved it.
pub struct PendingPaste {
    base: Delta,
    index: usize,
}

/// The clipboard module: owns the matcher chain, the staging surface, and
/// the three event handlers.
pub struct Clipboard {
    converter: Converter,
    staging: StagingSurface,
}

impl Clipboard {
    pub fn new(registry: Rc<dyn FormatRegistry>) -> Self {
        Self {
            converter: Converter::new(registry),
            staging: StagingSurface::default(),
        }
    }

    /// Register an additional matcher; it runs after the defaults and thus
    /// composes on top of their results.
    pub fn add_matcher(
        &mut self,
        target: impl Into<MatcherTarget>,
        matcher: MatcherFn,
    ) {
        self.converter.add_matcher(target, matcher);
    }

    /// The surface the host routes the platform's default paste into.
    pub fn staging_mut(&mut self) -> &mut StagingSurface {
        &mut self.staging
    }

    /// Parse browser-normalized HTML and run the matcher chain over it.
    pub fn convert(&self, html: &str) -> Delta {
        self.converter.convert(&Fragment::parse(html))
    }

    pub fn on_copy(&self, event: &mut ClipboardEvent<'_>, doc: &dyn Document) {
        let Some(range) = doc.selection() else {
            return;
        };
        if range.is_empty() || event.is_handled() {
            return;
        }
        event.data.set_data(TEXT_FORMAT, &doc.text(range));
        if event.data.supports_custom_types() {
            if let Ok(serialized) = serde_json::to_string(&doc.contents(range))
            {
                event.data.set_data(STRUCTURED_FORMAT, &serialized);
            }
        }
        event.mark_handled();
    }

    /// Copy's side effects happen strictly before the deletion is applied.
    pub fn on_cut(
        &self,
        event: &mut ClipboardEvent<'_>,
        doc: &mut dyn Document,
    ) {
        if event.is_handled() {
            return;
        }
        self.on_copy(event, doc);
        let Some(range) = doc.selection() else {
            return;
        };
        doc.delete_text(range, Source::User);
        doc.set_selection(range.index, Source::Silent);
    }

    pub fn on_paste(
        &self,
        event: &mut ClipboardEvent<'_>,
        doc: &mut dyn Document,
    ) -> PasteOutcome {
        if event.is_handled() {
            return PasteOutcome::Ignored;
        }
        let Some(range) = doc.selection() else {
            return PasteOutcome::Ignored;
        };
        // Snapshot now; the deferred continuation must not re-read the
        // selection after other work has run.
        let base = Delta::new().retain(range.index, None).delete(range.length);
        let types = event.data.types().unwrap_or_default();
        if types.iter().any(|t| t == STRUCTURED_FORMAT) {
            let pasted = event
                .data
                .get_data(STRUCTURED_FORMAT)
                .and_then(|raw| serde_json::from_str::<Delta>(&raw).ok());
            event.mark_handled();
            if let Some(pasted) = pasted {
                apply_paste(doc, base, range.index, pasted);
                return PasteOutcome::Applied;
            }
            // Malformed structured data is expected; fall through to the
            // staging-surface path.
        }
        PasteOutcome::Deferred(PendingPaste {
            base,
            index: range.index,
        })
    }

    /// The deferred half of the paste path, run by the host one tick after
    /// [`Clipboard::on_paste`] returned [`PasteOutcome::Deferred`].
    pub fn complete_paste(
        &mut self,
        pending: PendingPaste,
        doc: &mut dyn Document,
    ) {
        let html = self.staging.take_html().unwrap_or_default();
        let pasted = self.convert(&html);
        debug!(html = %html, delta = ?pasted, "paste");
        apply_paste(doc, pending.base, pending.index, pasted);
    }
}

fn apply_paste(
    doc: &mut dyn Document,
    base: Delta,
    index: usize,
    pasted: Delta,
) {
    // Cursor lands at the end of the pasted content.
    let cursor = index + pasted.len();
    doc.update_contents(base.concat(pasted), Source::User);
    doc.set_selection(cursor, Source::Silent);
    doc.scroll_selection_into_view();
}

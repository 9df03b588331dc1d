// Copyright 2024 New Vector Ltd.
// Copyright 2022 The Matrix.org Foundation C.I.C.
//
// SPDX-License-Identifier: AGPL-3.0-only OR LicenseRef-Element-Commercial
// Please see LICENSE in the repository root for full details.

//! Formatting attribute maps and their composition rules.

use serde_json::Value;

/// A formatting attribute mapping, e.g. `{"bold": true}`. Keys are format
/// names, values are whatever the format registry put there.
pub type Attributes = serde_json::Map<String, Value>;

/// Compose `b` over `a`: `b`'s entries win on key conflicts.
///
/// A `null` value in `b` removes the key, unless `keep_null` is set -
/// when composing over a retain base the `null` must survive so that it can
/// still cancel formatting further down the composition chain.
///
/// Returns `None` rather than an empty map so that callers can store the
/// result directly in an op's optional attributes slot.
pub fn compose_attributes(
    a: Option<&Attributes>,
    b: Option<&Attributes>,
    keep_null: bool,
) -> Option<Attributes> {
    let mut merged = a.cloned().unwrap_or_default();
    for (key, value) in b.iter().flat_map(|map| map.iter()) {
        merged.insert(key.clone(), value.clone());
    }
    if !keep_null {
        merged = merged
            .into_iter()
            .filter(|(_, value)| !value.is_null())
            .collect();
    }
    if merged.is_empty() {
        None
    } else {
        Some(merged)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use serde_json::json;

    fn attrs(value: serde_json::Value) -> Attributes {
        value.as_object().expect("attrs fixture must be a map").clone()
    }

    #[test]
    fn later_map_wins_on_conflicting_keys() {
        let a = attrs(json!({ "bold": true, "color": "red" }));
        let b = attrs(json!({ "color": "blue" }));
        assert_eq!(
            compose_attributes(Some(&a), Some(&b), false),
            Some(attrs(json!({ "bold": true, "color": "blue" })))
        );
    }

    #[test]
    fn null_removes_key_unless_kept() {
        let a = attrs(json!({ "bold": true }));
        let b = attrs(json!({ "bold": null }));
        assert_eq!(compose_attributes(Some(&a), Some(&b), false), None);
        assert_eq!(
            compose_attributes(Some(&a), Some(&b), true),
            Some(attrs(json!({ "bold": null })))
        );
    }

    #[test]
    fn absent_sides_are_identity() {
        let a = attrs(json!({ "italic": true }));
        assert_eq!(compose_attributes(Some(&a), None, false), Some(a.clone()));
        assert_eq!(compose_attributes(None, Some(&a), false), Some(a));
        assert_eq!(compose_attributes(None, None, false), None);
    }
}

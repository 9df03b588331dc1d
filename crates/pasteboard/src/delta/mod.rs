// Copyright 2024 New Vector Ltd.
// Copyright 2022 The Matrix.org Foundation C.I.C.
//
// SPDX-License-Identifier: AGPL-3.0-only OR LicenseRef-Element-Commercial
// Please see LICENSE in the repository root for full details.

//! The change-set model: an ordered sequence of insert/retain/delete
//! operations describing a document transformation.
//!
//! Deltas are kept in canonical form by [`Delta::push`]: adjacent deletes
//! merge, adjacent retains and text inserts with equal attributes merge, and
//! an insert pushed after a trailing delete is placed before it. The wire
//! shape is `{"ops":[{"insert":"a","attributes":{"bold":true}}, ...]}`, which
//! is what travels in the structured clipboard slot.

mod attributes;

pub use attributes::{compose_attributes, Attributes};

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// The payload of an insert op: plain text, or a one-key embed mapping such
/// as `{"image": "https://..."}` for atomic non-text content.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Insert {
    Text(String),
    Embed(Attributes),
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Op {
    Insert {
        insert: Insert,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        attributes: Option<Attributes>,
    },
    Retain {
        retain: usize,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        attributes: Option<Attributes>,
    },
    Delete {
        delete: usize,
    },
}

impl Op {
    /// Number of document positions this op covers. A text insert counts its
    /// characters, an embed counts one.
    pub fn len(&self) -> usize {
        match self {
            Op::Insert {
                insert: Insert::Text(text),
                ..
            } => text.chars().count(),
            Op::Insert { .. } => 1,
            Op::Retain { retain, .. } => *retain,
            Op::Delete { delete } => *delete,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn attributes(&self) -> Option<&Attributes> {
        match self {
            Op::Insert { attributes, .. } | Op::Retain { attributes, .. } => {
                attributes.as_ref()
            }
            Op::Delete { .. } => None,
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Delta {
    ops: Vec<Op>,
}

impl Delta {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn ops(&self) -> &[Op] {
        &self.ops
    }

    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    /// Sum of all op lengths, deletes included.
    pub fn len(&self) -> usize {
        self.ops.iter().map(Op::len).sum()
    }

    /// Number of positions this delta inserts.
    pub fn inserted_len(&self) -> usize {
        self.ops
            .iter()
            .filter(|op| matches!(op, Op::Insert { .. }))
            .map(Op::len)
            .sum()
    }

    pub fn insert(
        mut self,
        text: impl Into<String>,
        attributes: Option<Attributes>,
    ) -> Self {
        self.push(Op::Insert {
            insert: Insert::Text(text.into()),
            attributes,
        });
        self
    }

    pub fn insert_embed(
        mut self,
        kind: impl Into<String>,
        value: Value,
        attributes: Option<Attributes>,
    ) -> Self {
        let mut embed = Attributes::new();
        embed.insert(kind.into(), value);
        self.push(Op::Insert {
            insert: Insert::Embed(embed),
            attributes,
        });
        self
    }

    pub fn retain(
        mut self,
        length: usize,
        attributes: Option<Attributes>,
    ) -> Self {
        self.push(Op::Retain {
            retain: length,
            attributes,
        });
        self
    }

    pub fn delete(mut self, length: usize) -> Self {
        self.push(Op::Delete { delete: length });
        self
    }

    /// Append an op, maintaining canonical form. Empty ops are dropped.
    pub fn push(&mut self, new_op: Op) {
        if new_op.is_empty() {
            return;
        }
        if let Op::Delete { delete } = new_op {
            if let Some(Op::Delete { delete: last }) = self.ops.last_mut() {
                *last += delete;
            } else {
                self.ops.push(Op::Delete { delete });
            }
            return;
        }
        let mut index = self.ops.len();
        // An insert before a trailing delete is equivalent and canonical.
        if matches!(self.ops.last(), Some(Op::Delete { .. }))
            && matches!(new_op, Op::Insert { .. })
        {
            index -= 1;
        }
        if index > 0 {
            match (&mut self.ops[index - 1], &new_op) {
                (
                    Op::Insert {
                        insert: Insert::Text(last),
                        attributes: last_attrs,
                    },
                    Op::Insert {
                        insert: Insert::Text(text),
                        attributes,
                    },
                ) if last_attrs == attributes => {
                    last.push_str(text);
                    return;
                }
                (
                    Op::Retain {
                        retain: last,
                        attributes: last_attrs,
                    },
                    Op::Retain { retain, attributes },
                ) if last_attrs == attributes => {
                    *last += retain;
                    return;
                }
                _ => {}
            }
        }
        self.ops.insert(index, new_op);
    }

    /// Drop a trailing attribute-less retain, which is a no-op.
    pub fn chop(mut self) -> Self {
        if let Some(Op::Retain {
            attributes: None, ..
        }) = self.ops.last()
        {
            self.ops.pop();
        }
        self
    }

    /// Append `other`'s ops in document order, merging at the seam.
    pub fn concat(mut self, other: Delta) -> Self {
        let mut ops = other.ops.into_iter();
        if let Some(first) = ops.next() {
            self.push(first);
        }
        self.ops.extend(ops);
        self
    }

    /// Compose `other` on top of `self`, producing the delta equivalent to
    /// applying `self` then `other`. Composition is associative; retain
    /// attributes merge into existing formatting rather than replacing it.
    pub fn compose(&self, other: &Delta) -> Delta {
        let mut a = OpCursor::new(&self.ops);
        let mut b = OpCursor::new(&other.ops);
        let mut result = Delta::new();
        while a.has_next() || b.has_next() {
            if matches!(b.peek(), Some(Op::Insert { .. })) {
                result.push(b.next());
                continue;
            }
            if matches!(a.peek(), Some(Op::Delete { .. })) {
                result.push(a.next());
                continue;
            }
            let length = a.peek_len().min(b.peek_len());
            let a_op = a.next_len(length);
            let b_op = b.next_len(length);
            match b_op {
                Op::Retain {
                    attributes: b_attrs,
                    ..
                } => {
                    // Null attribute values survive over a retain base so
                    // they can still cancel formatting later in the chain.
                    let keep_null = matches!(a_op, Op::Retain { .. });
                    let attributes = compose_attributes(
                        a_op.attributes(),
                        b_attrs.as_ref(),
                        keep_null,
                    );
                    match a_op {
                        Op::Insert { insert, .. } => {
                            result.push(Op::Insert { insert, attributes });
                        }
                        Op::Retain { .. } => {
                            result.push(Op::Retain {
                                retain: length,
                                attributes,
                            });
                        }
                        Op::Delete { .. } => {
                            unreachable!("delete in a is consumed above")
                        }
                    }
                }
                Op::Delete { delete } => {
                    // Deleting what a inserted cancels both sides out.
                    if matches!(a_op, Op::Retain { .. }) {
                        result.push(Op::Delete { delete });
                    }
                }
                Op::Insert { .. } => {
                    unreachable!("insert in b is consumed above")
                }
            }
        }
        result.chop()
    }
}

/// Walks a slice of ops, handing out op prefixes of a requested length so
/// that compose can align the two sides.
struct OpCursor<'a> {
    ops: &'a [Op],
    index: usize,
    offset: usize,
}

impl<'a> OpCursor<'a> {
    fn new(ops: &'a [Op]) -> Self {
        Self {
            ops,
            index: 0,
            offset: 0,
        }
    }

    fn has_next(&self) -> bool {
        self.index < self.ops.len()
    }

    fn peek(&self) -> Option<&Op> {
        self.ops.get(self.index)
    }

    fn peek_len(&self) -> usize {
        match self.peek() {
            Some(op) => op.len() - self.offset,
            None => usize::MAX,
        }
    }

    fn next(&mut self) -> Op {
        self.next_len(usize::MAX)
    }

    /// Take up to `length` positions from the current op. Past the end of
    /// the ops an implicit retain is handed out, so an exhausted side acts
    /// as the identity.
    fn next_len(&mut self, length: usize) -> Op {
        let Some(op) = self.ops.get(self.index) else {
            return Op::Retain {
                retain: length,
                attributes: None,
            };
        };
        let offset = self.offset;
        let available = op.len() - offset;
        let take = length.min(available);
        if take == available {
            self.index += 1;
            self.offset = 0;
        } else {
            self.offset += take;
        }
        match op {
            Op::Delete { .. } => Op::Delete { delete: take },
            Op::Retain { attributes, .. } => Op::Retain {
                retain: take,
                attributes: attributes.clone(),
            },
            Op::Insert {
                insert: Insert::Text(text),
                attributes,
            } => Op::Insert {
                insert: Insert::Text(
                    text.chars().skip(offset).take(take).collect(),
                ),
                attributes: attributes.clone(),
            },
            Op::Insert {
                insert: embed,
                attributes,
            } => Op::Insert {
                insert: embed.clone(),
                attributes: attributes.clone(),
            },
        }
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
    fn push_merges_adjacent_text_inserts_with_equal_attributes() {
        let delta = Delta::new().insert("ab", None).insert("cd", None);
        assert_eq!(delta.ops().len(), 1);
        assert_eq!(delta, Delta::new().insert("abcd", None));
    }

    #[test]
    fn push_keeps_text_inserts_with_different_attributes_apart() {
        let delta = Delta::new()
            .insert("ab", None)
            .insert("cd", Some(attrs(json!({ "bold": true }))));
        assert_eq!(delta.ops().len(), 2);
    }

    #[test]
    fn push_merges_deletes_and_retains() {
        let delta = Delta::new().delete(2).delete(3);
        assert_eq!(delta, Delta::new().delete(5));
        let delta = Delta::new().retain(2, None).retain(3, None);
        assert_eq!(delta, Delta::new().retain(5, None));
    }

    #[test]
    fn push_places_insert_before_trailing_delete() {
        let delta = Delta::new().delete(2).insert("x", None);
        assert_eq!(
            delta.ops(),
            &[
                Op::Insert {
                    insert: Insert::Text("x".into()),
                    attributes: None,
                },
                Op::Delete { delete: 2 },
            ]
        );
    }

    #[test]
    fn empty_ops_are_dropped() {
        let delta = Delta::new().insert("", None).retain(0, None).delete(0);
        assert!(delta.is_empty());
    }

    #[test]
    fn len_counts_characters_and_embeds() {
        let delta = Delta::new()
            .insert("héllo", None)
            .insert_embed("image", json!("https://example.com/x.png"), None)
            .retain(2, None)
            .delete(3);
        assert_eq!(delta.len(), 11);
        assert_eq!(delta.inserted_len(), 6);
    }

    #[test]
    fn concat_merges_at_the_seam() {
        let left = Delta::new().insert("ab", None);
        let right = Delta::new().insert("cd", None).delete(1);
        let joined = left.concat(right);
        assert_eq!(joined, Delta::new().insert("abcd", None).delete(1));
    }

    #[test]
    fn compose_applies_retain_formats_over_inserts() {
        let base = Delta::new().insert("abc", None);
        let format = Delta::new().retain(3, Some(attrs(json!({ "bold": true }))));
        assert_eq!(
            base.compose(&format),
            Delta::new().insert("abc", Some(attrs(json!({ "bold": true }))))
        );
    }

    #[test]
    fn compose_retain_formats_merge_not_replace() {
        let base = Delta::new()
            .insert("abc", Some(attrs(json!({ "italic": true }))));
        let format = Delta::new().retain(3, Some(attrs(json!({ "bold": true }))));
        assert_eq!(
            base.compose(&format),
            Delta::new().insert(
                "abc",
                Some(attrs(json!({ "italic": true, "bold": true })))
            )
        );
    }

    #[test]
    fn compose_same_key_last_writer_wins() {
        let base = Delta::new()
            .insert("abc", Some(attrs(json!({ "color": "red" }))));
        let format =
            Delta::new().retain(3, Some(attrs(json!({ "color": "blue" }))));
        assert_eq!(
            base.compose(&format),
            Delta::new().insert("abc", Some(attrs(json!({ "color": "blue" }))))
        );
    }

    #[test]
    fn compose_partial_retain_splits_the_insert() {
        let base = Delta::new().insert("abcd", None);
        let format = Delta::new()
            .retain(1, None)
            .retain(2, Some(attrs(json!({ "bold": true }))));
        assert_eq!(
            base.compose(&format),
            Delta::new()
                .insert("a", None)
                .insert("bc", Some(attrs(json!({ "bold": true }))))
                .insert("d", None)
        );
    }

    #[test]
    fn compose_delete_cancels_insert() {
        let base = Delta::new().insert("abc", None);
        let removal = Delta::new().delete(2);
        assert_eq!(base.compose(&removal), Delta::new().insert("c", None));
    }

    #[test]
    fn compose_is_associative() {
        let a = Delta::new().insert("abc", None);
        let b = Delta::new().retain(1, None).delete(1);
        let c = Delta::new()
            .retain(2, Some(attrs(json!({ "bold": true }))));
        assert_eq!(a.compose(&b).compose(&c), a.compose(&b.compose(&c)));
    }

    #[test]
    fn serde_wire_shape() {
        let delta = Delta::new()
            .insert("hi", Some(attrs(json!({ "bold": true }))))
            .retain(3, None)
            .delete(1)
            .insert_embed("image", json!("https://example.com/x.png"), None);
        let json = serde_json::to_value(&delta).unwrap();
        assert_eq!(
            json,
            json!({ "ops": [
                { "insert": "hi", "attributes": { "bold": true } },
                { "retain": 3 },
                { "insert": { "image": "https://example.com/x.png" } },
                { "delete": 1 },
            ]})
        );
        let back: Delta = serde_json::from_value(json).unwrap();
        assert_eq!(back, delta);
    }
}

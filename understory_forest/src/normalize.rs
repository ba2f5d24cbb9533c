// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! The adapter between arbitrary raw option objects and canonical node fields.
//!
//! Option data comes from the host application in whatever shape it already
//! has. A [`Normalizer`] is the one place that knows that shape: it extracts an
//! id, a label and a few flags from a raw object, exposes its children, and can
//! write a loaded children list back into it.
//!
//! The capability check happens here, at the boundary: a raw object without a
//! usable id is rejected with a [`NormalizeError`] and never reaches the
//! registry.

use alloc::borrow::Cow;
use alloc::string::String;
use alloc::vec::Vec;

use crate::NodeId;

/// The children field of a raw option object.
#[derive(Debug)]
pub enum Children<'a, R> {
    /// No children field at all. The node is a leaf.
    Absent,
    /// The children field is present but null. The node is a branch whose
    /// children have not been fetched yet.
    Unloaded,
    /// The children field holds a (possibly empty) list.
    Loaded(&'a [R]),
}

impl<R> Clone for Children<'_, R> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<R> Copy for Children<'_, R> {}

impl<R> Children<'_, R> {
    /// Returns `true` unless the field is [`Children::Absent`].
    #[must_use]
    pub fn is_branch(&self) -> bool {
        !matches!(self, Self::Absent)
    }
}

/// Canonical fields extracted from one raw option object.
#[derive(Clone, Debug)]
pub struct NodeFields<'a> {
    /// Identity of the node.
    pub id: NodeId,
    /// Display text.
    pub label: Cow<'a, str>,
    /// Explicitly disabled.
    pub is_disabled: bool,
    /// Explicit expansion override. `None` defers to the default expand level.
    pub is_default_expanded: Option<bool>,
    /// The object carries a legacy "this is a branch" marker.
    ///
    /// The marker is only meaningful (and reported) when the object has no
    /// children field.
    pub declares_branch: bool,
}

/// A raw option object failed the capability check.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum NormalizeError {
    /// The id field is missing or has a type that cannot identify a node.
    #[error("option node has no usable `{key}` field")]
    MissingId {
        /// Name of the id field that was looked up.
        key: String,
    },
}

/// Maps raw option objects of type [`Normalizer::Raw`] to canonical fields.
///
/// Implementations must be pure: calling [`normalize`](Self::normalize) twice
/// on the same object returns the same fields.
pub trait Normalizer {
    /// The raw option object type supplied by the host.
    type Raw: Clone;

    /// Extracts the canonical fields of `raw`.
    fn normalize<'a>(&self, raw: &'a Self::Raw) -> Result<NodeFields<'a>, NormalizeError>;

    /// Returns the children field of `raw`.
    fn children<'a>(&self, raw: &'a Self::Raw) -> Children<'a, Self::Raw>;

    /// Returns the loaded children list of `raw` for in-place edits.
    fn children_mut<'a>(&self, raw: &'a mut Self::Raw) -> Option<&'a mut Vec<Self::Raw>>;

    /// Replaces the children field of `raw`. `None` writes a null field.
    fn set_children(&self, raw: &mut Self::Raw, children: Option<Vec<Self::Raw>>);

    /// Builds a raw object standing in for `id` when nothing else is known
    /// about it.
    fn synthesize(&self, id: &NodeId) -> Self::Raw;

    /// Returns the text of an additional searchable field.
    ///
    /// The registry resolves the `id` and `label` keys itself and only asks
    /// for other keys. `None` makes the field match nothing.
    fn match_field<'a>(&self, raw: &'a Self::Raw, key: &str) -> Option<Cow<'a, str>> {
        let _ = (raw, key);
        None
    }
}

#[cfg(feature = "json")]
pub use json::JsonNormalizer;

#[cfg(feature = "json")]
mod json {
    use alloc::borrow::Cow;
    use alloc::string::{String, ToString};
    use alloc::vec::Vec;

    use serde_json::{Map, Value};

    use super::{Children, NodeFields, NormalizeError, Normalizer};
    use crate::NodeId;

    /// A [`Normalizer`] for option trees held as [`serde_json::Value`].
    ///
    /// The field names default to `id`, `label`, `children`, `isDisabled`,
    /// `isDefaultExpanded` and `isBranch`, and can each be remapped.
    ///
    /// ```
    /// use serde_json::json;
    /// use understory_forest::{JsonNormalizer, Normalizer};
    ///
    /// let normalizer = JsonNormalizer::new().with_id_key("key").with_label_key("name");
    /// let raw = json!({ "key": 7, "name": "Seven" });
    /// let fields = normalizer.normalize(&raw).unwrap();
    /// assert_eq!(fields.id, 7.into());
    /// assert_eq!(fields.label, "Seven");
    /// ```
    #[derive(Clone, Debug)]
    pub struct JsonNormalizer {
        id_key: String,
        label_key: String,
        children_key: String,
        disabled_key: String,
        default_expanded_key: String,
        branch_marker_key: String,
    }

    impl Default for JsonNormalizer {
        fn default() -> Self {
            Self {
                id_key: "id".into(),
                label_key: "label".into(),
                children_key: "children".into(),
                disabled_key: "isDisabled".into(),
                default_expanded_key: "isDefaultExpanded".into(),
                branch_marker_key: "isBranch".into(),
            }
        }
    }

    impl JsonNormalizer {
        /// Creates a normalizer with the default field names.
        #[must_use]
        pub fn new() -> Self {
            Self::default()
        }

        /// Reads ids from `key`.
        #[must_use]
        pub fn with_id_key(mut self, key: impl Into<String>) -> Self {
            self.id_key = key.into();
            self
        }

        /// Reads labels from `key`.
        #[must_use]
        pub fn with_label_key(mut self, key: impl Into<String>) -> Self {
            self.label_key = key.into();
            self
        }

        /// Reads and writes children lists at `key`.
        #[must_use]
        pub fn with_children_key(mut self, key: impl Into<String>) -> Self {
            self.children_key = key.into();
            self
        }

        /// Reads the disabled flag from `key`.
        #[must_use]
        pub fn with_disabled_key(mut self, key: impl Into<String>) -> Self {
            self.disabled_key = key.into();
            self
        }

        /// Reads the expansion override from `key`.
        #[must_use]
        pub fn with_default_expanded_key(mut self, key: impl Into<String>) -> Self {
            self.default_expanded_key = key.into();
            self
        }

        fn id_of(&self, raw: &Value) -> Option<NodeId> {
            match raw.get(&self.id_key)? {
                Value::String(s) => Some(NodeId::from(s.as_str())),
                Value::Number(n) => Some(match n.as_i64() {
                    Some(i) => NodeId::Number(i),
                    None => NodeId::from(n.to_string()),
                }),
                _ => None,
            }
        }
    }

    fn text_of(value: &Value) -> Option<Cow<'_, str>> {
        match value {
            Value::String(s) => Some(Cow::Borrowed(s.as_str())),
            Value::Number(n) => Some(Cow::Owned(n.to_string())),
            _ => None,
        }
    }

    impl Normalizer for JsonNormalizer {
        type Raw = Value;

        fn normalize<'a>(&self, raw: &'a Value) -> Result<NodeFields<'a>, NormalizeError> {
            let id = self.id_of(raw).ok_or_else(|| NormalizeError::MissingId {
                key: self.id_key.clone(),
            })?;
            let label = raw
                .get(&self.label_key)
                .and_then(text_of)
                .unwrap_or_else(|| Cow::Owned(id.to_text()));
            Ok(NodeFields {
                label,
                is_disabled: raw.get(&self.disabled_key).and_then(Value::as_bool) == Some(true),
                is_default_expanded: raw.get(&self.default_expanded_key).and_then(Value::as_bool),
                declares_branch: raw.get(&self.branch_marker_key).and_then(Value::as_bool)
                    == Some(true),
                id,
            })
        }

        fn children<'a>(&self, raw: &'a Value) -> Children<'a, Value> {
            match raw.get(&self.children_key) {
                None => Children::Absent,
                Some(Value::Null) => Children::Unloaded,
                Some(Value::Array(items)) => Children::Loaded(items),
                // Anything else cannot hold children.
                Some(_) => Children::Absent,
            }
        }

        fn children_mut<'a>(&self, raw: &'a mut Value) -> Option<&'a mut Vec<Value>> {
            raw.get_mut(&self.children_key)?.as_array_mut()
        }

        fn set_children(&self, raw: &mut Value, children: Option<Vec<Value>>) {
            if let Value::Object(map) = raw {
                map.insert(
                    self.children_key.clone(),
                    children.map_or(Value::Null, Value::Array),
                );
            }
        }

        fn synthesize(&self, id: &NodeId) -> Value {
            let mut map = Map::new();
            let id = match id {
                NodeId::Number(n) => Value::from(*n),
                NodeId::Text(s) => Value::from(&**s),
            };
            map.insert(self.id_key.clone(), id);
            Value::Object(map)
        }

        fn match_field<'a>(&self, raw: &'a Value, key: &str) -> Option<Cow<'a, str>> {
            match raw.get(key)? {
                Value::Number(n) if n.as_f64().is_some_and(f64::is_finite) => {
                    Some(Cow::Owned(n.to_string()))
                }
                Value::String(s) => Some(Cow::Borrowed(s.as_str())),
                _ => None,
            }
        }
    }

}

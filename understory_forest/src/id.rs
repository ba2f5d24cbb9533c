// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Node identifiers.

use alloc::string::{String, ToString};
use alloc::sync::Arc;
use core::fmt;

/// Identifier of an option node, unique within one forest.
///
/// Option data typically keys nodes either by integer or by string. Both
/// forms are kept distinct: `NodeId::from(1)` and `NodeId::from("1")` do not
/// compare equal.
///
/// Text ids are reference-counted so that the many places an id is stored
/// (parent links, ancestor chains, the selection list) share one allocation.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum NodeId {
    /// An integer id.
    Number(i64),
    /// A string id.
    Text(Arc<str>),
}

impl NodeId {
    /// Returns the id as text, the way it is matched against a search query.
    #[must_use]
    pub fn to_text(&self) -> String {
        match self {
            Self::Number(n) => n.to_string(),
            Self::Text(s) => String::from(&**s),
        }
    }

    /// Returns the string form if this is a text id.
    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Number(_) => None,
            Self::Text(s) => Some(s),
        }
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Number(n) => write!(f, "{n}"),
            Self::Text(s) => f.write_str(s),
        }
    }
}

impl From<i64> for NodeId {
    fn from(value: i64) -> Self {
        Self::Number(value)
    }
}

impl From<&str> for NodeId {
    fn from(value: &str) -> Self {
        Self::Text(Arc::from(value))
    }
}

impl From<String> for NodeId {
    fn from(value: String) -> Self {
        Self::Text(Arc::from(value))
    }
}

impl From<Arc<str>> for NodeId {
    fn from(value: Arc<str>) -> Self {
        Self::Text(value)
    }
}

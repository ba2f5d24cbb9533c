// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Non-fatal problems found while normalizing option data.

use alloc::string::String;
use alloc::vec::Vec;

use crate::{NodeId, NormalizeError};

/// A problem with the option data. Never fatal; the registry applies a
/// recovery policy and carries on.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum ForestDiagnostic {
    /// The same id appeared twice. The first occurrence wins.
    #[error(
        "Detected duplicate presence of node id {id}. Their labels are \"{first_label}\" and \"{duplicate_label}\" respectively."
    )]
    DuplicateId {
        /// The repeated id.
        id: NodeId,
        /// Label of the node that was kept.
        first_label: String,
        /// Label of the node that was dropped.
        duplicate_label: String,
    },
    /// A node carries a branch marker but no children field. It is treated
    /// as a leaf.
    #[error(
        "Node {id} declares itself a branch without a children field; it is treated as a leaf. Use `children: null` to declare an unloaded branch."
    )]
    BranchMarkerWithoutChildren {
        /// The node in question.
        id: NodeId,
    },
    /// An unloaded branch exists but there is no loader to fetch its children.
    #[error("Unloaded branch node {id} detected. A children loader is required.")]
    UnloadedBranchWithoutLoader {
        /// The unloaded branch.
        id: NodeId,
    },
    /// A raw object failed the normalizer's capability check and was skipped.
    #[error(transparent)]
    InvalidNode(#[from] NormalizeError),
}

pub(crate) fn report(sink: &mut Vec<ForestDiagnostic>, diagnostic: ForestDiagnostic) {
    tracing::warn!(%diagnostic, "option data problem");
    sink.push(diagnostic);
}

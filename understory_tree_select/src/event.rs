// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Semantic events emitted for the host.

use alloc::string::String;

use crate::Value;

/// Something the host may want to react to.
///
/// Events queue up on the instance until drained with
/// [`TreeSelect::drain_events`](crate::TreeSelect::drain_events).
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Event<R> {
    /// A node was selected by a user action. Carries its raw option.
    Select(R),
    /// A node was deselected by a user action. Carries its raw option.
    Deselect(R),
    /// The external value changed.
    Input(Value<R>),
    /// The applied search query changed.
    SearchChange(String),
    /// The menu opened.
    Open,
    /// The menu closed.
    Close,
}

// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Diagnostics and error types.

use alloc::string::String;
use alloc::vec::Vec;

use understory_forest::{ForestDiagnostic, NormalizeError};

use crate::InstanceId;

/// A non-fatal problem reported on an instance's diagnostics channel.
///
/// Every diagnostic is also logged as a `tracing` warning. The instance
/// always recovers on its own; diagnostics exist so hosts can surface
/// misconfiguration during development.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum Diagnostic {
    /// A problem with the option data.
    #[error(transparent)]
    Forest(#[from] ForestDiagnostic),
    /// Async search was enabled on a non-searchable instance. Searching is
    /// turned on.
    #[error("For async search mode, the value of \"searchable\" must be true.")]
    AsyncSearchNotSearchable,
    /// Flat mode was requested without multiple selection. Flat mode is
    /// ignored.
    #[error("You are using flat mode. But you forgot to add \"multiple=true\"?")]
    FlatWithoutMultiple,
    /// An option that only applies to flat mode was set outside of it. The
    /// option is ignored.
    #[error("\"{option}\" only applies to flat mode.")]
    FlatOnlyOption {
        /// Name of the offending option.
        option: &'static str,
    },
    /// Root options are unset and nothing can load them.
    #[error("Root options are unset and no loader was provided to fetch them.")]
    OptionsWithoutLoader,
    /// An item of an object-format value failed the normalizer's capability
    /// check and was dropped.
    #[error("Value item {index} was dropped: {source}")]
    InvalidValueItem {
        /// Position of the item within the value.
        index: usize,
        /// Why the item could not be normalized.
        source: NormalizeError,
    },
}

pub(crate) fn report(sink: &mut Vec<Diagnostic>, diagnostic: Diagnostic) {
    tracing::warn!(%diagnostic, "tree select diagnostic");
    sink.push(diagnostic);
}

/// A loader failed to fetch options.
///
/// The message is what the failed scope reports as its loading error.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
#[error("{message}")]
pub struct LoadError {
    message: String,
}

impl LoadError {
    /// Creates an error with the given message.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    /// The error message.
    #[must_use]
    pub fn message(&self) -> &str {
        &self.message
    }
}

/// A load completion could not be applied.
///
/// Completions are idempotent: resolving a ticket twice yields
/// [`ResolveError::UnknownTicket`] the second time and changes nothing.
#[derive(Clone, Copy, Debug, PartialEq, Eq, thiserror::Error)]
pub enum ResolveError {
    /// The ticket was never issued by this instance, or was already resolved.
    #[error("unknown or already resolved load ticket")]
    UnknownTicket,
    /// The ticket was issued by another instance.
    #[error("load ticket belongs to instance {0}")]
    WrongInstance(InstanceId),
}

/// A load completion could not be routed to its instance.
#[derive(Clone, Copy, Debug, PartialEq, Eq, thiserror::Error)]
pub enum RouteError {
    /// No live instance is registered under the ticket's instance id.
    #[error("no live instance {0}")]
    UnknownInstance(InstanceId),
    /// The instance is currently borrowed, e.g. the completion arrived from
    /// inside one of its own calls.
    #[error("instance {0} is busy")]
    Busy(InstanceId),
    /// The instance rejected the completion.
    #[error(transparent)]
    Resolve(#[from] ResolveError),
}

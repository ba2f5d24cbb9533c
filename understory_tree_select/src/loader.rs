// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! The loader contract for lazily fetched options.
//!
//! An instance calls its [`OptionsLoader`] with a [`LoadRequest`] whenever
//! root options, a branch's children, or async search results are needed.
//! The loader either answers right away with [`LoadResponse::Ready`], or
//! returns [`LoadResponse::Pending`] and the host later hands the result to
//! [`TreeSelect::resolve`](crate::TreeSelect::resolve) together with the
//! request's [`LoadTicket`].
//!
//! At most one request per scope is in flight: per branch for children, one
//! for the root options, and one per search query.

use alloc::string::String;
use alloc::vec::Vec;

use hashbrown::HashMap;
use understory_forest::NodeId;

use crate::{InstanceId, LoadError};

/// What a loader is asked to fetch.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum LoadAction<R> {
    /// The root option list.
    LoadRootOptions,
    /// The children of an unloaded branch.
    LoadChildrenOptions {
        /// Id of the branch.
        parent_id: NodeId,
        /// The branch's raw option object.
        parent: R,
    },
    /// Options matching a search query.
    AsyncSearch {
        /// The query as entered.
        query: String,
    },
}

impl<R> LoadAction<R> {
    /// Conventional name of the action.
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Self::LoadRootOptions => "LOAD_ROOT_OPTIONS",
            Self::LoadChildrenOptions { .. } => "LOAD_CHILDREN_OPTIONS",
            Self::AsyncSearch { .. } => "ASYNC_SEARCH",
        }
    }
}

/// Identifies one issued request.
///
/// Tickets are single-use: the first completion is applied, later ones are
/// rejected without effect.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct LoadTicket {
    instance: InstanceId,
    serial: u64,
}

impl LoadTicket {
    /// The instance that issued the request.
    #[must_use]
    pub fn instance(&self) -> InstanceId {
        self.instance
    }

    /// Per-instance serial number of the request.
    #[must_use]
    pub fn serial(&self) -> u64 {
        self.serial
    }
}

/// A request handed to an [`OptionsLoader`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LoadRequest<R> {
    /// Completion handle for deferred answers.
    pub ticket: LoadTicket,
    /// What to fetch.
    pub action: LoadAction<R>,
}

/// A loader's answer to a request.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum LoadResponse<R> {
    /// The request completed synchronously.
    Ready(Result<Vec<R>, LoadError>),
    /// The host will call `resolve` with the request's ticket later.
    Pending,
}

/// Fetches options on demand.
///
/// Closures taking a [`LoadRequest`] implement this trait.
pub trait OptionsLoader<R> {
    /// Starts a load.
    fn load(&mut self, request: LoadRequest<R>) -> LoadResponse<R>;
}

impl<R, F> OptionsLoader<R> for F
where
    F: FnMut(LoadRequest<R>) -> LoadResponse<R>,
{
    fn load(&mut self, request: LoadRequest<R>) -> LoadResponse<R> {
        self(request)
    }
}

/// What a request loads into.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub(crate) enum LoadScope {
    Root,
    Children(NodeId),
    Search(String),
}

/// In-flight requests by serial.
#[derive(Debug, Default)]
pub(crate) struct PendingLoads {
    next_serial: u64,
    in_flight: HashMap<u64, LoadScope>,
}

impl PendingLoads {
    pub(crate) fn contains(&self, scope: &LoadScope) -> bool {
        self.in_flight.values().any(|pending| pending == scope)
    }

    /// Registers a request for `scope`, or returns `None` if one is in flight.
    pub(crate) fn issue(&mut self, instance: InstanceId, scope: LoadScope) -> Option<LoadTicket> {
        if self.contains(&scope) {
            return None;
        }
        let serial = self.next_serial;
        self.next_serial = self.next_serial.wrapping_add(1);
        self.in_flight.insert(serial, scope);
        Some(LoadTicket { instance, serial })
    }

    /// Consumes a ticket, returning its scope the first time only.
    pub(crate) fn complete(&mut self, ticket: LoadTicket) -> Option<LoadScope> {
        self.in_flight.remove(&ticket.serial)
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.in_flight.is_empty()
    }
}

// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Instance ids and routing of deferred load completions.
//!
//! A host that shares one loader between several instances receives tickets
//! from all of them. [`InstanceRouter`] maps each ticket back to the instance
//! that issued it. The router only holds weak references; instance state
//! lives in the instances themselves.

use alloc::rc::{Rc, Weak};
use alloc::vec::Vec;
use core::cell::RefCell;
use core::fmt;
use core::sync::atomic::{AtomicU64, Ordering};

use hashbrown::HashMap;
use understory_forest::Normalizer;

use crate::{LoadError, LoadTicket, RouteError, TreeSelect};

static NEXT_INSTANCE: AtomicU64 = AtomicU64::new(1);

/// Process-unique identity of a [`TreeSelect`] instance.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct InstanceId(u64);

impl InstanceId {
    /// Allocates a fresh id.
    #[must_use]
    pub fn next() -> Self {
        Self(NEXT_INSTANCE.fetch_add(1, Ordering::Relaxed))
    }

    /// The numeric value.
    #[must_use]
    pub fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for InstanceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Shared handle to an instance.
pub type SharedTreeSelect<N> = Rc<RefCell<TreeSelect<N>>>;

/// Routes load completions to the instance that requested them.
pub struct InstanceRouter<N: Normalizer> {
    instances: HashMap<InstanceId, Weak<RefCell<TreeSelect<N>>>>,
}

impl<N: Normalizer> fmt::Debug for InstanceRouter<N> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InstanceRouter")
            .field("instances", &self.instances.len())
            .finish()
    }
}

impl<N: Normalizer> Default for InstanceRouter<N> {
    fn default() -> Self {
        Self {
            instances: HashMap::new(),
        }
    }
}

impl<N: Normalizer> InstanceRouter<N> {
    /// Creates an empty router.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers an instance under its id and returns the id.
    pub fn register(&mut self, instance: &SharedTreeSelect<N>) -> InstanceId {
        let id = instance.borrow().id();
        self.instances.insert(id, Rc::downgrade(instance));
        id
    }

    /// Forgets an instance. Returns `true` if it was registered.
    pub fn unregister(&mut self, id: InstanceId) -> bool {
        self.instances.remove(&id).is_some()
    }

    /// Looks up a live instance.
    #[must_use]
    pub fn get(&self, id: InstanceId) -> Option<SharedTreeSelect<N>> {
        self.instances.get(&id)?.upgrade()
    }

    /// Hands a deferred load result to the instance that issued `ticket`.
    pub fn route(
        &self,
        ticket: LoadTicket,
        result: Result<Vec<N::Raw>, LoadError>,
    ) -> Result<(), RouteError> {
        let id = ticket.instance();
        let Some(instance) = self.get(id) else {
            tracing::debug!(instance = %id, "dropping completion for unknown instance");
            return Err(RouteError::UnknownInstance(id));
        };
        let mut instance = instance.try_borrow_mut().map_err(|_| RouteError::Busy(id))?;
        instance.resolve(ticket, result)?;
        Ok(())
    }

    /// Drops entries whose instance no longer exists.
    pub fn prune(&mut self) {
        self.instances.retain(|_, weak| weak.strong_count() > 0);
    }

    /// Number of registered instances, live or not.
    #[must_use]
    pub fn len(&self) -> usize {
        self.instances.len()
    }

    /// Returns `true` if nothing is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.instances.is_empty()
    }
}

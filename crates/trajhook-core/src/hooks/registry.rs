//! Hook registry for managing hooks
//!
//! Hooks are stored per event kind in priority-then-registration order. Each
//! kind's list is copy-on-write: mutations build a new list and swap it in, so a
//! [`HookSnapshot`] obtained from [`HookRegistry::resolve`] is never affected by
//! later registrations or removals.

use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};

use super::events::EventKind;
use super::types::{HookDescriptor, HookHandler, HookId};
use crate::error::{HookError, HookResult};

/// A descriptor once accepted by the registry
#[derive(Debug)]
pub struct RegisteredHook {
    descriptor: HookDescriptor,
    registration_order: u64,
    claimed: AtomicBool,
}

impl RegisteredHook {
    pub fn id(&self) -> &HookId {
        &self.descriptor.id
    }

    pub fn kind(&self) -> &EventKind {
        &self.descriptor.kind
    }

    pub fn priority(&self) -> i32 {
        self.descriptor.priority
    }

    pub fn is_once(&self) -> bool {
        self.descriptor.once
    }

    pub fn handler(&self) -> &Arc<dyn HookHandler> {
        &self.descriptor.handler
    }

    /// Position among all registrations of this registry
    pub fn registration_order(&self) -> u64 {
        self.registration_order
    }

    /// Claim a once-hook for invocation; only the first caller wins
    pub(crate) fn try_claim(&self) -> bool {
        !self.claimed.swap(true, Ordering::AcqRel)
    }

    fn sort_key(&self) -> (i32, u64) {
        (self.descriptor.priority, self.registration_order)
    }
}

/// Immutable, ordered view of the hooks registered for one kind
#[derive(Debug, Clone)]
pub struct HookSnapshot {
    kind: EventKind,
    hooks: Arc<[Arc<RegisteredHook>]>,
}

impl HookSnapshot {
    fn empty(kind: EventKind) -> Self {
        Self {
            kind,
            hooks: Arc::from(Vec::new()),
        }
    }

    pub fn kind(&self) -> &EventKind {
        &self.kind
    }

    pub fn len(&self) -> usize {
        self.hooks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.hooks.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Arc<RegisteredHook>> {
        self.hooks.iter()
    }

    /// Hook ids in invocation order
    pub fn ids(&self) -> Vec<HookId> {
        self.hooks.iter().map(|hook| hook.id().clone()).collect()
    }
}

impl<'a> IntoIterator for &'a HookSnapshot {
    type Item = &'a Arc<RegisteredHook>;
    type IntoIter = std::slice::Iter<'a, Arc<RegisteredHook>>;

    fn into_iter(self) -> Self::IntoIter {
        self.hooks.iter()
    }
}

#[derive(Debug, Default)]
struct RegistryInner {
    by_kind: HashMap<EventKind, Arc<[Arc<RegisteredHook>]>>,
    index: HashMap<HookId, EventKind>,
    next_order: u64,
}

impl RegistryInner {
    fn remove(&mut self, id: &HookId) -> bool {
        let Some(kind) = self.index.remove(id) else {
            return false;
        };

        if let Some(list) = self.by_kind.get(&kind) {
            let remaining: Vec<_> = list.iter().filter(|h| h.id() != id).cloned().collect();
            if remaining.is_empty() {
                self.by_kind.remove(&kind);
            } else {
                self.by_kind.insert(kind, Arc::from(remaining));
            }
        }
        true
    }
}

/// Registry for managing hooks with event-based organization
///
/// Cloning yields another handle to the same registry. Each trajectory owns its
/// own registry; there is no process-wide instance.
#[derive(Debug, Clone, Default)]
pub struct HookRegistry {
    inner: Arc<RwLock<RegistryInner>>,
}

impl HookRegistry {
    /// Create a new empty hook registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a hook
    ///
    /// Fails with [`HookError::DuplicateHookId`] if a hook with the same id is
    /// already present. Among hooks of the same kind the new one is placed
    /// after every hook with a lower or equal priority.
    pub fn register(&self, descriptor: HookDescriptor) -> HookResult<HookHandle> {
        let mut inner = self.inner.write();

        if inner.index.contains_key(&descriptor.id) {
            return Err(HookError::DuplicateHookId {
                id: descriptor.id.clone(),
            });
        }

        let registration_order = inner.next_order;
        inner.next_order += 1;

        let id = descriptor.id.clone();
        let kind = descriptor.kind.clone();
        let hook = Arc::new(RegisteredHook {
            descriptor,
            registration_order,
            claimed: AtomicBool::new(false),
        });

        let mut list: Vec<_> = inner
            .by_kind
            .get(&kind)
            .map(|existing| existing.to_vec())
            .unwrap_or_default();
        let position = list.partition_point(|h| h.sort_key() <= hook.sort_key());
        list.insert(position, hook);

        inner.by_kind.insert(kind.clone(), Arc::from(list));
        inner.index.insert(id.clone(), kind.clone());

        tracing::debug!(hook_id = %id, kind = %kind, "registered hook");

        Ok(HookHandle {
            id,
            kind,
            registry: Arc::downgrade(&self.inner),
        })
    }

    /// Remove a hook; returns whether it was present
    ///
    /// Removing an unknown id is a no-op so that racing unregisters are harmless.
    pub fn unregister(&self, id: &HookId) -> bool {
        let removed = self.inner.write().remove(id);
        if removed {
            tracing::debug!(hook_id = %id, "unregistered hook");
        }
        removed
    }

    /// Point-in-time ordered view of the hooks for a kind
    pub fn resolve(&self, kind: &EventKind) -> HookSnapshot {
        let inner = self.inner.read();
        match inner.by_kind.get(kind) {
            Some(hooks) => HookSnapshot {
                kind: kind.clone(),
                hooks: Arc::clone(hooks),
            },
            None => HookSnapshot::empty(kind.clone()),
        }
    }

    /// Whether a hook with this id is registered
    pub fn contains(&self, id: &HookId) -> bool {
        self.inner.read().index.contains_key(id)
    }

    /// Check if any hooks are registered for a kind
    pub fn has_hooks(&self, kind: &EventKind) -> bool {
        self.inner.read().by_kind.contains_key(kind)
    }

    /// List all kinds with registered hooks
    pub fn list_kinds(&self) -> Vec<EventKind> {
        self.inner.read().by_kind.keys().cloned().collect()
    }

    /// Get the number of registered hooks
    pub fn count(&self) -> usize {
        self.inner.read().index.len()
    }

    /// Remove every hook
    pub fn clear(&self) {
        let mut inner = self.inner.write();
        inner.by_kind.clear();
        inner.index.clear();
    }
}

/// Handle returned by registration, used to detach the hook later
///
/// The handle holds the registry weakly, so a handler that keeps its own handle
/// does not keep the registry alive.
#[derive(Debug, Clone)]
pub struct HookHandle {
    id: HookId,
    kind: EventKind,
    registry: Weak<RwLock<RegistryInner>>,
}

impl HookHandle {
    pub fn id(&self) -> &HookId {
        &self.id
    }

    pub fn kind(&self) -> &EventKind {
        &self.kind
    }

    /// Remove the hook; returns whether it was still registered
    pub fn unregister(&self) -> bool {
        match self.registry.upgrade() {
            Some(inner) => HookRegistry { inner }.unregister(&self.id),
            None => false,
        }
    }
}

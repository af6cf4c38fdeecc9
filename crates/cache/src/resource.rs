//! The cacheable GPU resource and its privileged mutation view
//!
//! [`GpuResource`] is the unit the cache tracks: an opaque backend object
//! (texture, buffer, render target) plus the lifecycle state, keys, and byte
//! size the cache needs for reuse and budget accounting.
//!
//! All key and budget mutation goes through [`ResourcePriv`], a capability
//! view that only this crate can construct. Pipeline code gets read access
//! (`is_budgeted`, key getters, backend downcast) and nothing else.

use std::any::Any;
use std::cell::RefCell;
use std::sync::atomic::{AtomicU64, Ordering};

use tracing::trace;

use crate::keys::{ContentKey, ScratchKey};

/// Lifecycle state of a cached resource
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifeCycle {
    /// Wraps an externally-owned GPU object; the cache never budgets or
    /// evicts it.
    Wrapped,
    /// Counts against the budget ceiling; eligible for key lookup and
    /// pressure-driven eviction.
    Cached,
    /// Allocated by the pipeline but not counted against the budget. May
    /// still carry a scratch key for opportunistic reuse.
    Uncached,
}

struct ResourceState {
    life_cycle: LifeCycle,
    content_key: ContentKey,
    scratch_key: ScratchKey,
}

/// A cacheable GPU resource
///
/// Created only by the [`ResourceCache`](crate::ResourceCache); shared with
/// pipeline code as `Rc<GpuResource>`. The cache's own clone of the `Rc` is
/// its back-reference to the resource — when it is the last one standing the
/// resource is idle and may be evicted or handed out for scratch reuse.
pub struct GpuResource {
    id: u64,
    byte_size: usize,
    backend: Box<dyn Any>,
    state: RefCell<ResourceState>,
}

impl GpuResource {
    pub(crate) fn new(
        backend: Box<dyn Any>,
        byte_size: usize,
        life_cycle: LifeCycle,
        scratch_key: ScratchKey,
    ) -> Self {
        static NEXT_ID: AtomicU64 = AtomicU64::new(1);
        Self {
            id: NEXT_ID.fetch_add(1, Ordering::Relaxed),
            byte_size,
            backend,
            state: RefCell::new(ResourceState {
                life_cycle,
                content_key: ContentKey::invalid(),
                scratch_key,
            }),
        }
    }

    /// Process-unique id, stable for the life of the resource.
    pub fn id(&self) -> u64 {
        self.id
    }

    /// GPU memory consumed by the backend object, in bytes.
    pub fn byte_size(&self) -> usize {
        self.byte_size
    }

    /// Current lifecycle state.
    pub fn life_cycle(&self) -> LifeCycle {
        self.state.borrow().life_cycle
    }

    /// Does this resource count against the cache's budget ceiling?
    ///
    /// Budgeted is synonymous with `LifeCycle::Cached`. A resource holding a
    /// valid content key is always budgeted; that consistency is a checked
    /// invariant in debug builds.
    pub fn is_budgeted(&self) -> bool {
        let state = self.state.borrow();
        let budgeted = state.life_cycle == LifeCycle::Cached;
        debug_assert!(
            budgeted || !state.content_key.is_valid(),
            "resource {} holds a content key but is not budgeted",
            self.id
        );
        budgeted
    }

    /// The resource's content key, or the invalid sentinel if none is set.
    pub fn content_key(&self) -> ContentKey {
        self.state.borrow().content_key.clone()
    }

    /// The resource's scratch key, or the null-scratch sentinel if it was
    /// never scratch-eligible or the key has been removed.
    pub fn scratch_key(&self) -> ScratchKey {
        self.state.borrow().scratch_key
    }

    /// Downcast the opaque backend handle to its concrete type.
    ///
    /// Returns `None` if `T` is not the type the backend registered.
    pub fn backend_as<T: 'static>(&self) -> Option<&T> {
        self.backend.downcast_ref::<T>()
    }

    /// Obtain the privileged mutation view.
    ///
    /// Crate-private on purpose: the cache and the resource's own internals
    /// are the only callers, which is what makes the invariants in this
    /// module enforceable.
    pub(crate) fn resource_priv(&self) -> ResourcePriv<'_> {
        ResourcePriv { resource: self }
    }
}

impl std::fmt::Debug for GpuResource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.state.borrow();
        f.debug_struct("GpuResource")
            .field("id", &self.id)
            .field("byte_size", &self.byte_size)
            .field("life_cycle", &state.life_cycle)
            .field("content_key", &state.content_key)
            .field("scratch_key", &state.scratch_key)
            .finish()
    }
}

/// Privileged access to a resource's cache keys and budget status
///
/// A thin, copyable view — copying it never duplicates the resource, and it
/// is handed out per call, never stored. Constructible only inside this
/// crate, so the cache is the sole mutator of lifecycle and key state.
#[derive(Clone, Copy)]
pub struct ResourcePriv<'a> {
    resource: &'a GpuResource,
}

impl ResourcePriv<'_> {
    /// Attach a content key, forcing the resource into the budget.
    ///
    /// Currently a key may be set at most once per resource; reassignment
    /// (and supplanting another resource's key) is a known future extension,
    /// not current behavior. Fails, leaving all state unchanged, if:
    /// - `key` is the invalid sentinel,
    /// - the resource is `Wrapped` (wrapped resources can never be budgeted,
    ///   and a keyed resource must be), or
    /// - this resource already holds a content key.
    ///
    /// Uniqueness against other live resources is the cache's half of the
    /// contract; see [`ResourceCache::assign_content_key`](crate::ResourceCache::assign_content_key).
    pub fn set_content_key(&self, key: &ContentKey) -> bool {
        if !key.is_valid() {
            return false;
        }
        let mut state = self.resource.state.borrow_mut();
        if state.life_cycle == LifeCycle::Wrapped || state.content_key.is_valid() {
            return false;
        }
        state.content_key = key.clone();
        state.life_cycle = LifeCycle::Cached;
        trace!(id = self.resource.id, "content key set, resource forced into budget");
        true
    }

    /// Remove the content key. Idempotent; the lifecycle is not reverted.
    pub fn remove_content_key(&self) {
        let mut state = self.resource.state.borrow_mut();
        if state.content_key.is_valid() {
            state.content_key = ContentKey::invalid();
            trace!(id = self.resource.id, "content key removed");
        }
    }

    /// Make an uncached resource count against the budget.
    ///
    /// No effect on resources that are wrapped or already cached.
    pub fn make_budgeted(&self) {
        let mut state = self.resource.state.borrow_mut();
        if state.life_cycle == LifeCycle::Uncached {
            state.life_cycle = LifeCycle::Cached;
            trace!(id = self.resource.id, "resource made budgeted");
        }
    }

    /// Take a cached resource out of the budget.
    ///
    /// No effect on resources that are wrapped or already uncached. A
    /// resource holding a valid content key must stay budgeted; calling this
    /// on one is a caller defect, trapped in debug builds and ignored in
    /// release builds.
    pub fn make_unbudgeted(&self) {
        let mut state = self.resource.state.borrow_mut();
        if state.life_cycle != LifeCycle::Cached {
            return;
        }
        if state.content_key.is_valid() {
            debug_assert!(
                false,
                "make_unbudgeted on resource {} while it holds a content key",
                self.resource.id
            );
            return;
        }
        state.life_cycle = LifeCycle::Uncached;
        trace!(id = self.resource.id, "resource made unbudgeted");
    }

    /// The resource's scratch key, or the null-scratch sentinel.
    ///
    /// A valid key means the resource *can* serve as scratch; it may
    /// currently be serving as a content resource instead.
    pub fn get_scratch_key(&self) -> ScratchKey {
        self.resource.state.borrow().scratch_key
    }

    /// Strip the scratch key.
    ///
    /// Scratch keys are installed at creation, so after this the resource can
    /// never again be found by scratch lookup. Idempotent.
    pub fn remove_scratch_key(&self) {
        let mut state = self.resource.state.borrow_mut();
        if state.scratch_key.is_valid() {
            state.scratch_key = ScratchKey::invalid();
            trace!(id = self.resource.id, "scratch key removed");
        }
    }

    /// Does the resource count against the budget? See
    /// [`GpuResource::is_budgeted`].
    pub fn is_budgeted(&self) -> bool {
        self.resource.is_budgeted()
    }
}

//! The resource cache: key indexes, budget enforcement, LRU eviction
//!
//! [`ResourceCache`] owns every resource it creates and is the single trusted
//! holder of the privileged accessor, so all key and budget mutation funnels
//! through it. Pipeline code asks for resources by content key (semantic
//! reuse) or by scratch shape (anonymous reuse) and gets `Rc` handles back.
//!
//! A resource is *idle* when the cache's own `Rc` is the only strong
//! reference. Only idle resources are eviction candidates; handing a clone to
//! a caller pins the resource until the caller drops it.
//!
//! Single-threaded by design: one cache per GPU context, no internal locking.
//! A multi-threaded port needs a mutex around each public operation, since
//! key-uniqueness checks must stay atomic with the index insert.

use std::any::Any;
use std::collections::{HashMap, VecDeque};
use std::rc::Rc;

use tracing::debug;

use crate::budget::{BudgetPressure, CacheBudget};
use crate::config::CacheConfig;
use crate::keys::{ContentKey, ScratchKey, ScratchShape};
use crate::resource::{GpuResource, LifeCycle};

/// Statistics about cache usage
#[derive(Debug, Clone, Copy, Default)]
pub struct CacheStats {
    /// Resources currently tracked (budgeted and uncached)
    pub resource_count: usize,
    /// Resources counted against the budget
    pub budgeted_count: usize,
    /// Bytes counted against the budget
    pub budgeted_bytes: usize,
    /// Byte ceiling
    pub max_bytes: usize,
    /// Resource-count ceiling
    pub max_resources: usize,
    /// Key and scratch lookup hits
    pub hits: u64,
    /// Key and scratch lookup misses
    pub misses: u64,
    /// Resources evicted under budget pressure
    pub evictions: u64,
}

impl CacheStats {
    /// Calculate the lookup hit rate (0.0 to 1.0).
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }

    /// Calculate budget byte utilization (0.0 to 1.0).
    pub fn utilization(&self) -> f64 {
        if self.max_bytes == 0 {
            0.0
        } else {
            self.budgeted_bytes as f64 / self.max_bytes as f64
        }
    }
}

/// GPU resource cache with dual-key reuse and LRU eviction
pub struct ResourceCache {
    budget: CacheBudget,
    /// Every tracked resource, keyed by resource id. The `Rc` stored here is
    /// the cache's back-reference; `strong_count == 1` means idle.
    resources: HashMap<u64, Rc<GpuResource>>,
    content_index: HashMap<ContentKey, u64>,
    scratch_index: HashMap<ScratchKey, Vec<u64>>,
    /// Least recently used at the front
    lru_queue: VecDeque<u64>,
    hits: u64,
    misses: u64,
    evictions: u64,
}

impl ResourceCache {
    /// Create a cache with the given configuration.
    pub fn new(config: CacheConfig) -> Self {
        Self {
            budget: CacheBudget::new(config.max_bytes, config.max_resources),
            resources: HashMap::new(),
            content_index: HashMap::new(),
            scratch_index: HashMap::new(),
            lru_queue: VecDeque::new(),
            hits: 0,
            misses: 0,
            evictions: 0,
        }
    }

    /// Create a cache with a byte ceiling in megabytes and the default
    /// resource-count ceiling.
    pub fn with_mb_limit(megabytes: usize) -> Self {
        Self::new(CacheConfig::default().with_max_mb(megabytes))
    }

    // -- Resource creation ---------------------------------------------------

    /// Allocate a new resource.
    ///
    /// `budgeted` chooses the initial lifecycle: `Cached` resources count
    /// against the ceilings immediately, `Uncached` ones do not. A scratch
    /// shape, if given, installs the resource's scratch key — this is the only
    /// point a scratch key can be attached.
    pub fn create_resource(
        &mut self,
        backend: Box<dyn Any>,
        byte_size: usize,
        scratch_shape: Option<ScratchShape>,
        budgeted: bool,
    ) -> Rc<GpuResource> {
        let life_cycle = if budgeted {
            LifeCycle::Cached
        } else {
            LifeCycle::Uncached
        };
        let scratch_key = scratch_shape.map(ScratchKey::new).unwrap_or_else(ScratchKey::invalid);
        let resource = Rc::new(GpuResource::new(backend, byte_size, life_cycle, scratch_key));
        let id = resource.id();

        self.resources.insert(id, Rc::clone(&resource));
        if scratch_key.is_valid() {
            self.scratch_index.entry(scratch_key).or_default().push(id);
        }
        self.lru_queue.push_back(id);

        if budgeted {
            self.budget.add(byte_size);
            // The caller's handle pins the new resource, so this can only
            // evict older idle ones.
            self.purge_to_fit();
        }
        resource
    }

    /// Wrap an externally-owned GPU object.
    ///
    /// Wrapped resources are never budgeted, never indexed, and never
    /// evicted; the cache has no ownership authority over them.
    pub fn wrap_backend_object(&mut self, backend: Box<dyn Any>, byte_size: usize) -> Rc<GpuResource> {
        Rc::new(GpuResource::new(
            backend,
            byte_size,
            LifeCycle::Wrapped,
            ScratchKey::invalid(),
        ))
    }

    // -- Lookup --------------------------------------------------------------

    /// Find the live resource holding `key`, if any.
    pub fn find_by_content_key(&mut self, key: &ContentKey) -> Option<Rc<GpuResource>> {
        if !key.is_valid() {
            return None;
        }
        match self.content_index.get(key).copied() {
            Some(id) => {
                self.hits += 1;
                self.touch(id);
                Some(Rc::clone(&self.resources[&id]))
            }
            None => {
                self.misses += 1;
                None
            }
        }
    }

    /// Find an idle resource of the given shape for anonymous reuse.
    ///
    /// Skips resources that are in use, that currently serve as content
    /// resources, or whose scratch key has been removed.
    pub fn find_by_scratch_shape(&mut self, shape: &ScratchShape) -> Option<Rc<GpuResource>> {
        let key = ScratchKey::new(*shape);
        let candidate = self.scratch_index.get(&key).and_then(|ids| {
            ids.iter()
                .copied()
                .find(|id| {
                    let resource = &self.resources[id];
                    Rc::strong_count(resource) == 1
                        && resource.scratch_key().is_valid()
                        && !resource.content_key().is_valid()
                })
        });
        match candidate {
            Some(id) => {
                self.hits += 1;
                self.touch(id);
                Some(Rc::clone(&self.resources[&id]))
            }
            None => {
                self.misses += 1;
                None
            }
        }
    }

    // -- Privileged mutation (key and budget maintenance) --------------------

    /// Attach a content key to a resource, registering it for content lookup.
    ///
    /// Returns `false` and changes nothing if another live resource already
    /// holds an equal key, or if the resource cannot take one (wrapped, or
    /// already keyed — keys are one-shot per resource and never supplant an
    /// existing holder). On success the resource is budgeted (forced
    /// `Cached`) and findable under `key`.
    pub fn assign_content_key(&mut self, resource: &Rc<GpuResource>, key: ContentKey) -> bool {
        if !key.is_valid() || self.content_index.contains_key(&key) {
            return false;
        }
        debug_assert!(
            self.resources.contains_key(&resource.id())
                || resource.life_cycle() == LifeCycle::Wrapped,
            "resource {} does not belong to this cache",
            resource.id()
        );
        let was_budgeted = resource.life_cycle() == LifeCycle::Cached;
        if !resource.resource_priv().set_content_key(&key) {
            return false;
        }
        self.content_index.insert(key, resource.id());
        if !was_budgeted {
            self.budget.add(resource.byte_size());
            self.purge_to_fit();
        }
        true
    }

    /// Remove a resource's content key and drop it from the content index.
    /// Idempotent; the resource stays budgeted.
    pub fn remove_content_key(&mut self, resource: &Rc<GpuResource>) {
        let key = resource.content_key();
        if key.is_valid() {
            self.content_index.remove(&key);
            resource.resource_priv().remove_content_key();
        }
    }

    /// Strip a resource's scratch key and unlink it from the scratch index.
    /// One-way: the resource can never be found by scratch lookup again.
    pub fn remove_scratch_key(&mut self, resource: &Rc<GpuResource>) {
        let key = resource.scratch_key();
        if key.is_valid() {
            if let Some(ids) = self.scratch_index.get_mut(&key) {
                ids.retain(|&id| id != resource.id());
                if ids.is_empty() {
                    self.scratch_index.remove(&key);
                }
            }
            resource.resource_priv().remove_scratch_key();
        }
    }

    /// Bring an uncached resource into the budget. No effect on wrapped or
    /// already-budgeted resources.
    pub fn make_budgeted(&mut self, resource: &Rc<GpuResource>) {
        if resource.life_cycle() != LifeCycle::Uncached {
            return;
        }
        resource.resource_priv().make_budgeted();
        self.budget.add(resource.byte_size());
        self.purge_to_fit();
    }

    /// Take a resource out of the budget. No effect on wrapped or
    /// already-uncached resources, or while the resource holds a content key
    /// (keyed resources must stay budgeted).
    pub fn make_unbudgeted(&mut self, resource: &Rc<GpuResource>) {
        if resource.life_cycle() != LifeCycle::Cached || resource.content_key().is_valid() {
            return;
        }
        resource.resource_priv().make_unbudgeted();
        self.budget.remove(resource.byte_size());
    }

    // -- Eviction ------------------------------------------------------------

    /// Evict idle budgeted resources, least recently used first, until both
    /// ceilings hold again. Runs automatically after every budget-increasing
    /// operation.
    pub fn purge_to_fit(&mut self) {
        while self.budget.over_budget() {
            match self.next_victim() {
                Some(id) => self.evict(id),
                None => break, // everything left is pinned by callers
            }
        }
    }

    /// Drop idle uncached resources. They are not under eviction scheduling,
    /// so this is how their GPU memory is actually reclaimed once the last
    /// user handle is gone.
    pub fn purge_unreferenced(&mut self) {
        let victims: Vec<u64> = self
            .lru_queue
            .iter()
            .copied()
            .filter(|id| {
                let resource = &self.resources[id];
                Rc::strong_count(resource) == 1 && resource.life_cycle() == LifeCycle::Uncached
            })
            .collect();
        for id in victims {
            self.drop_resource(id);
        }
    }

    /// Drop every idle resource, budgeted or not. In-use resources survive.
    pub fn purge_all_idle(&mut self) {
        let victims: Vec<u64> = self
            .lru_queue
            .iter()
            .copied()
            .filter(|id| Rc::strong_count(&self.resources[id]) == 1)
            .collect();
        for id in victims {
            if self.resources[&id].life_cycle() == LifeCycle::Cached {
                self.budget.remove(self.resources[&id].byte_size());
            }
            self.drop_resource(id);
        }
    }

    /// Replace the budget ceilings, evicting if the new ceilings are already
    /// exceeded.
    pub fn set_limits(&mut self, config: &CacheConfig) {
        self.budget.set_limits(config.max_bytes, config.max_resources);
        self.purge_to_fit();
    }

    // -- Introspection -------------------------------------------------------

    /// Current cache statistics.
    pub fn stats(&self) -> CacheStats {
        CacheStats {
            resource_count: self.resources.len(),
            budgeted_count: self.budget.budgeted_count(),
            budgeted_bytes: self.budget.budgeted_bytes(),
            max_bytes: self.budget.max_bytes(),
            max_resources: self.budget.max_count(),
            hits: self.hits,
            misses: self.misses,
            evictions: self.evictions,
        }
    }

    /// Current budget pressure level.
    pub fn pressure(&self) -> BudgetPressure {
        self.budget.pressure()
    }

    /// Number of resources currently tracked.
    pub fn resource_count(&self) -> usize {
        self.resources.len()
    }

    /// Bytes currently counted against the budget.
    pub fn budgeted_bytes(&self) -> usize {
        self.budget.budgeted_bytes()
    }

    // -- Internals -----------------------------------------------------------

    /// Move a resource to the most recently used position.
    fn touch(&mut self, id: u64) {
        self.lru_queue.retain(|&queued| queued != id);
        self.lru_queue.push_back(id);
    }

    /// The least recently used idle budgeted resource, if any.
    fn next_victim(&self) -> Option<u64> {
        self.lru_queue.iter().copied().find(|id| {
            let resource = &self.resources[id];
            Rc::strong_count(resource) == 1 && resource.life_cycle() == LifeCycle::Cached
        })
    }

    /// Evict a budgeted resource under pressure.
    fn evict(&mut self, id: u64) {
        debug_assert_eq!(self.resources[&id].life_cycle(), LifeCycle::Cached);
        self.budget.remove(self.resources[&id].byte_size());
        self.evictions += 1;
        debug!(
            id,
            budgeted_bytes = self.budget.budgeted_bytes(),
            "evicting resource under budget pressure"
        );
        self.drop_resource(id);
    }

    /// Unlink a resource from every index and release the cache's reference.
    /// Budget accounting is the caller's responsibility.
    fn drop_resource(&mut self, id: u64) {
        let resource = match self.resources.remove(&id) {
            Some(resource) => resource,
            None => return,
        };
        let content_key = resource.content_key();
        if content_key.is_valid() {
            self.content_index.remove(&content_key);
        }
        let scratch_key = resource.scratch_key();
        if scratch_key.is_valid() {
            if let Some(ids) = self.scratch_index.get_mut(&scratch_key) {
                ids.retain(|&queued| queued != id);
                if ids.is_empty() {
                    self.scratch_index.remove(&scratch_key);
                }
            }
        }
        self.lru_queue.retain(|&queued| queued != id);
    }
}

impl Default for ResourceCache {
    fn default() -> Self {
        Self::new(CacheConfig::default())
    }
}

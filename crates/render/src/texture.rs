//! Texture acquisition over the cache's non-privileged surface
//!
//! [`TextureProvider`] implements the pipeline's allocation discipline:
//! look the texture up by content key, fall back to reusing an idle scratch
//! texture of the right shape, and only then ask the backend to allocate.
//! All key and budget mutation happens inside the cache; this module can only
//! read resource state and call the cache's public operations.

use std::any::Any;
use std::rc::Rc;

use tracing::debug;

use glaze_cache::{CacheConfig, GpuResource, ResourceCache, ScratchShape, TextureFormat};

use crate::tile::{TileId, TILE_SIZE};

/// Shape of a texture the pipeline wants allocated
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TextureDesc {
    pub width: u32,
    pub height: u32,
    pub format: TextureFormat,
    /// Usable as a render target, not only sampled
    pub render_target: bool,
    pub sample_count: u32,
}

impl TextureDesc {
    /// The standard tile texture shape.
    pub fn tile(format: TextureFormat) -> Self {
        Self {
            width: TILE_SIZE,
            height: TILE_SIZE,
            format,
            render_target: false,
            sample_count: 1,
        }
    }

    /// The scratch shape equivalent of this descriptor.
    pub fn scratch_shape(&self) -> ScratchShape {
        ScratchShape::Texture {
            width: self.width,
            height: self.height,
            format: self.format,
            render_target: self.render_target,
            sample_count: self.sample_count,
        }
    }

    /// GPU memory this texture will occupy, in bytes.
    pub fn byte_size(&self) -> usize {
        self.scratch_shape().min_byte_size()
    }
}

/// Texture acquisition front-end over a [`ResourceCache`]
///
/// One provider per rendering context, same threading model as the cache it
/// owns. Backend allocation is delegated to a caller-supplied closure so this
/// crate stays independent of the GPU API in use.
pub struct TextureProvider {
    cache: ResourceCache,
}

impl TextureProvider {
    /// Create a provider with its own cache instance.
    pub fn new(config: CacheConfig) -> Self {
        Self {
            cache: ResourceCache::new(config),
        }
    }

    /// Read access to the underlying cache (stats, pressure).
    pub fn cache(&self) -> &ResourceCache {
        &self.cache
    }

    /// Mutable access for maintenance calls (purges, limit changes).
    pub fn cache_mut(&mut self) -> &mut ResourceCache {
        &mut self.cache
    }

    /// Get the texture holding a tile's content, rendering storage for it if
    /// needed.
    ///
    /// Resolution order: content hit, then idle scratch texture of the same
    /// shape (promoted to the tile's content key), then a fresh budgeted
    /// allocation via `allocate`. A scratch texture promoted here is keyed
    /// for good — content keys are one-shot per resource — so it leaves the
    /// anonymous reuse pool permanently.
    ///
    /// The returned resource is budgeted and findable under the tile's key
    /// until it is evicted under pressure.
    pub fn tile_texture(
        &mut self,
        tile: &TileId,
        desc: &TextureDesc,
        allocate: impl FnOnce(&TextureDesc) -> Box<dyn Any>,
    ) -> Rc<GpuResource> {
        let key = tile.content_key();
        if let Some(resource) = self.cache.find_by_content_key(&key) {
            return resource;
        }

        if let Some(resource) = self.cache.find_by_scratch_shape(&desc.scratch_shape()) {
            if self.cache.assign_content_key(&resource, key.clone()) {
                debug!(?tile, "promoted scratch texture to tile content");
                return resource;
            }
        }

        debug!(?tile, "allocating fresh tile texture");
        let resource =
            self.cache
                .create_resource(allocate(desc), desc.byte_size(), Some(desc.scratch_shape()), true);
        let assigned = self.cache.assign_content_key(&resource, key);
        debug_assert!(assigned, "fresh resource must accept the tile key");
        resource
    }

    /// Get an anonymous scratch texture of the given shape.
    ///
    /// Reuses an idle matching texture when one exists, otherwise allocates a
    /// budgeted one. The result carries no content key and returns to the
    /// scratch pool as soon as the handle is dropped.
    pub fn scratch_texture(
        &mut self,
        desc: &TextureDesc,
        allocate: impl FnOnce(&TextureDesc) -> Box<dyn Any>,
    ) -> Rc<GpuResource> {
        if let Some(resource) = self.cache.find_by_scratch_shape(&desc.scratch_shape()) {
            return resource;
        }
        debug!(?desc, "allocating fresh scratch texture");
        self.cache
            .create_resource(allocate(desc), desc.byte_size(), Some(desc.scratch_shape()), true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tile::{TileCoordinate, TileProfile};
    use std::cell::Cell;

    struct FakeTexture {
        #[allow(dead_code)]
        handle: u32,
    }

    fn provider() -> TextureProvider {
        TextureProvider::new(CacheConfig::default().with_max_mb(16))
    }

    fn tile(x: u32, y: u32) -> TileId {
        TileId::new(0, TileCoordinate::new(x, y), 100, TileProfile::Crisp)
    }

    fn counting_alloc(count: &Cell<u32>) -> impl FnOnce(&TextureDesc) -> Box<dyn Any> + '_ {
        move |_| {
            count.set(count.get() + 1);
            Box::new(FakeTexture { handle: count.get() })
        }
    }

    #[test]
    fn test_tile_texture_content_hit() {
        let mut provider = provider();
        let desc = TextureDesc::tile(TextureFormat::Rgba8);
        let allocations = Cell::new(0);

        let first = provider.tile_texture(&tile(0, 0), &desc, counting_alloc(&allocations));
        let second = provider.tile_texture(&tile(0, 0), &desc, counting_alloc(&allocations));

        assert!(Rc::ptr_eq(&first, &second));
        assert_eq!(allocations.get(), 1);
    }

    #[test]
    fn test_distinct_tiles_get_distinct_textures() {
        let mut provider = provider();
        let desc = TextureDesc::tile(TextureFormat::Rgba8);
        let allocations = Cell::new(0);

        let a = provider.tile_texture(&tile(0, 0), &desc, counting_alloc(&allocations));
        let b = provider.tile_texture(&tile(1, 0), &desc, counting_alloc(&allocations));

        assert!(!Rc::ptr_eq(&a, &b));
        assert_eq!(allocations.get(), 2);
    }

    #[test]
    fn test_scratch_texture_round_trips() {
        let mut provider = provider();
        let desc = TextureDesc::tile(TextureFormat::Rgba8);
        let allocations = Cell::new(0);

        drop(provider.scratch_texture(&desc, counting_alloc(&allocations)));
        let reused = provider.scratch_texture(&desc, counting_alloc(&allocations));

        // The dropped texture came back from the scratch pool.
        assert_eq!(allocations.get(), 1);
        assert!(!reused.content_key().is_valid());
    }

    #[test]
    fn test_scratch_promotion_to_tile() {
        let mut provider = provider();
        let desc = TextureDesc::tile(TextureFormat::Rgba8);
        let allocations = Cell::new(0);

        // An idle anonymous texture of the right shape exists...
        drop(provider.scratch_texture(&desc, counting_alloc(&allocations)));

        // ...so the tile request promotes it instead of allocating.
        let promoted = provider.tile_texture(&tile(2, 2), &desc, counting_alloc(&allocations));
        assert_eq!(allocations.get(), 1);
        assert_eq!(promoted.content_key(), tile(2, 2).content_key());

        // Once promoted it is out of the anonymous pool for good.
        drop(promoted);
        let fresh = provider.scratch_texture(&desc, counting_alloc(&allocations));
        assert_eq!(allocations.get(), 2);
        assert!(!fresh.content_key().is_valid());
    }

    #[test]
    fn test_shape_mismatch_misses_scratch_pool() {
        let mut provider = provider();
        let allocations = Cell::new(0);

        drop(provider.scratch_texture(&TextureDesc::tile(TextureFormat::Rgba8), counting_alloc(&allocations)));
        let mask = provider.scratch_texture(&TextureDesc::tile(TextureFormat::A8), counting_alloc(&allocations));

        assert_eq!(allocations.get(), 2);
        assert_eq!(mask.byte_size(), (TILE_SIZE * TILE_SIZE) as usize);
    }

    #[test]
    fn test_provider_textures_are_budgeted() {
        let mut provider = provider();
        let desc = TextureDesc::tile(TextureFormat::Rgba8);
        let allocations = Cell::new(0);

        let texture = provider.tile_texture(&tile(5, 5), &desc, counting_alloc(&allocations));
        assert!(texture.is_budgeted());
        assert_eq!(provider.cache().stats().budgeted_bytes, desc.byte_size());
    }

    #[test]
    fn test_eviction_forces_reallocation() {
        // Budget of exactly one tile: the second tile evicts the first.
        let config = CacheConfig {
            max_bytes: TextureDesc::tile(TextureFormat::Rgba8).byte_size(),
            max_resources: 64,
        };
        let mut provider = TextureProvider::new(config);
        let desc = TextureDesc::tile(TextureFormat::Rgba8);
        let allocations = Cell::new(0);

        drop(provider.tile_texture(&tile(0, 0), &desc, counting_alloc(&allocations)));
        drop(provider.tile_texture(&tile(1, 1), &desc, counting_alloc(&allocations)));
        assert_eq!(provider.cache().stats().evictions, 1);

        // Tile (0,0) is gone, so requesting it allocates again.
        drop(provider.tile_texture(&tile(0, 0), &desc, counting_alloc(&allocations)));
        assert_eq!(allocations.get(), 3);
    }
}

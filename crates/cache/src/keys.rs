//! Cache key types for the two resource reuse disciplines
//!
//! A [`ContentKey`] identifies a resource by the semantic content it holds
//! (a decoded image at a given scale, a rendered tile, ...). At most one live
//! resource in a cache may hold a given content key.
//!
//! A [`ScratchKey`] identifies a resource purely by its shape (extent, format,
//! usage), so that anonymous allocations of the same shape are interchangeable.
//! Any number of resources may share a scratch key.
//!
//! Both types have a distinguished invalid value meaning "no key assigned".

use std::sync::atomic::{AtomicU32, Ordering};

/// Allocate a new content key domain.
///
/// Each independent keyspace in the pipeline (tile textures, glyph atlases,
/// decoded images, ...) reserves its own domain once and builds all of its
/// keys in it, so keys from different subsystems can never collide. Domain 0
/// is reserved for the invalid key.
pub fn content_key_domain() -> u32 {
    static NEXT_DOMAIN: AtomicU32 = AtomicU32::new(1);
    NEXT_DOMAIN.fetch_add(1, Ordering::Relaxed)
}

/// Identity key for content-addressed resource reuse
///
/// Value-comparable and hashable; the content index of the cache is keyed by
/// this type. The payload words are opaque to the cache — their meaning is
/// whatever the owning keyspace encodes in them.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ContentKey {
    domain: u32,
    payload: Vec<u32>,
}

impl ContentKey {
    /// Create a key in `domain` with the given payload words.
    ///
    /// The domain must come from [`content_key_domain`]; domain 0 is reserved
    /// for [`ContentKey::invalid`].
    pub fn new(domain: u32, payload: &[u32]) -> Self {
        debug_assert_ne!(domain, 0, "domain 0 is reserved for the invalid key");
        Self {
            domain,
            payload: payload.to_vec(),
        }
    }

    /// The sentinel key meaning "no content key assigned".
    pub fn invalid() -> Self {
        Self {
            domain: 0,
            payload: Vec::new(),
        }
    }

    /// Returns true unless this is the invalid sentinel.
    pub fn is_valid(&self) -> bool {
        self.domain != 0
    }

    /// The domain this key was built in (0 for the invalid key).
    pub fn domain(&self) -> u32 {
        self.domain
    }
}

/// Pixel format of a cached texture
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TextureFormat {
    Rgba8,
    Bgra8,
    /// Single-channel alpha (glyph coverage masks)
    A8,
    Rgba16Float,
}

impl TextureFormat {
    /// Bytes per pixel for this format.
    pub fn bytes_per_pixel(&self) -> usize {
        match self {
            TextureFormat::Rgba8 | TextureFormat::Bgra8 => 4,
            TextureFormat::A8 => 1,
            TextureFormat::Rgba16Float => 8,
        }
    }
}

/// Intended use of a cached GPU buffer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BufferUsage {
    Vertex,
    Index,
    Uniform,
    /// CPU-readable staging/readback buffer
    Readback,
}

/// Shape descriptor for anonymous (scratch) resource reuse
///
/// Two resources with equal shapes are interchangeable as far as the GPU is
/// concerned, whatever they currently hold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ScratchShape {
    Texture {
        width: u32,
        height: u32,
        format: TextureFormat,
        /// Usable as a render target, not only sampled
        render_target: bool,
        sample_count: u32,
    },
    Buffer {
        len: usize,
        usage: BufferUsage,
    },
}

impl ScratchShape {
    /// Minimum GPU allocation size implied by this shape, in bytes.
    pub fn min_byte_size(&self) -> usize {
        match *self {
            ScratchShape::Texture {
                width,
                height,
                format,
                sample_count,
                ..
            } => {
                (width as usize)
                    * (height as usize)
                    * format.bytes_per_pixel()
                    * (sample_count.max(1) as usize)
            }
            ScratchShape::Buffer { len, .. } => len,
        }
    }
}

/// Identity key for shape-addressed (scratch) resource reuse
///
/// Either wraps a [`ScratchShape`] or is the null-scratch sentinel meaning
/// the resource is not eligible for scratch reuse.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ScratchKey(Option<ScratchShape>);

impl ScratchKey {
    /// Build a key for the given shape.
    pub fn new(shape: ScratchShape) -> Self {
        Self(Some(shape))
    }

    /// The null-scratch sentinel.
    pub fn invalid() -> Self {
        Self(None)
    }

    /// Returns true unless this is the null-scratch sentinel.
    pub fn is_valid(&self) -> bool {
        self.0.is_some()
    }

    /// The shape this key describes, if any.
    pub fn shape(&self) -> Option<ScratchShape> {
        self.0
    }
}

impl From<ScratchShape> for ScratchKey {
    fn from(shape: ScratchShape) -> Self {
        ScratchKey::new(shape)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::hash_map::DefaultHasher;
    use std::hash::{Hash, Hasher};

    fn hash_of<T: Hash>(value: &T) -> u64 {
        let mut hasher = DefaultHasher::new();
        value.hash(&mut hasher);
        hasher.finish()
    }

    #[test]
    fn test_domain_allocation_is_unique() {
        let a = content_key_domain();
        let b = content_key_domain();
        assert_ne!(a, 0);
        assert_ne!(b, 0);
        assert_ne!(a, b);
    }

    #[test]
    fn test_content_key_equality() {
        let domain = content_key_domain();
        let k1 = ContentKey::new(domain, &[1, 2, 3]);
        let k2 = ContentKey::new(domain, &[1, 2, 3]);
        let k3 = ContentKey::new(domain, &[1, 2, 4]);

        assert_eq!(k1, k2);
        assert_eq!(hash_of(&k1), hash_of(&k2));
        assert_ne!(k1, k3);
    }

    #[test]
    fn test_content_keys_in_different_domains_differ() {
        let d1 = content_key_domain();
        let d2 = content_key_domain();
        assert_ne!(ContentKey::new(d1, &[7]), ContentKey::new(d2, &[7]));
    }

    #[test]
    fn test_invalid_content_key() {
        let key = ContentKey::invalid();
        assert!(!key.is_valid());
        assert_eq!(key.domain(), 0);
        assert!(ContentKey::new(content_key_domain(), &[]).is_valid());
    }

    #[test]
    fn test_scratch_key_equality() {
        let shape = ScratchShape::Texture {
            width: 256,
            height: 256,
            format: TextureFormat::Rgba8,
            render_target: false,
            sample_count: 1,
        };
        let other = ScratchShape::Texture {
            width: 256,
            height: 256,
            format: TextureFormat::Rgba8,
            render_target: true,
            sample_count: 1,
        };

        assert_eq!(ScratchKey::new(shape), ScratchKey::new(shape));
        assert_eq!(hash_of(&ScratchKey::new(shape)), hash_of(&ScratchKey::new(shape)));
        assert_ne!(ScratchKey::new(shape), ScratchKey::new(other));
        assert_ne!(ScratchKey::new(shape), ScratchKey::invalid());
    }

    #[test]
    fn test_null_scratch_sentinel() {
        let key = ScratchKey::invalid();
        assert!(!key.is_valid());
        assert!(key.shape().is_none());
    }

    #[test]
    fn test_shape_byte_sizes() {
        let tex = ScratchShape::Texture {
            width: 256,
            height: 128,
            format: TextureFormat::Rgba8,
            render_target: false,
            sample_count: 1,
        };
        assert_eq!(tex.min_byte_size(), 256 * 128 * 4);

        let mask = ScratchShape::Texture {
            width: 64,
            height: 64,
            format: TextureFormat::A8,
            render_target: false,
            sample_count: 1,
        };
        assert_eq!(mask.min_byte_size(), 64 * 64);

        let buf = ScratchShape::Buffer {
            len: 4096,
            usage: BufferUsage::Vertex,
        };
        assert_eq!(buf.min_byte_size(), 4096);
    }
}

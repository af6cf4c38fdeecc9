//! Glaze GPU Resource Cache
//!
//! Cache and budget control plane for GPU-side objects (textures, buffers,
//! render targets): dual-key reuse (content-addressed and scratch), budget
//! accounting with LRU eviction, and a privileged accessor that restricts
//! key/budget mutation to the cache itself.

pub mod budget;
pub mod cache;
pub mod config;
pub mod keys;
pub mod resource;

pub use budget::{BudgetPressure, CacheBudget};
pub use cache::{CacheStats, ResourceCache};
pub use config::{CacheConfig, ConfigError};
pub use keys::{content_key_domain, BufferUsage, ContentKey, ScratchKey, ScratchShape, TextureFormat};
pub use resource::{GpuResource, LifeCycle};

//! Glaze Render Library
//!
//! Pipeline-side consumers of the GPU resource cache: tile identities that
//! derive content keys, and texture shape descriptors driving scratch reuse.

pub mod texture;
pub mod tile;

pub use texture::{TextureDesc, TextureProvider};
pub use tile::{tile_key_domain, TileCoordinate, TileId, TileProfile, TILE_SIZE};

//! Tile identities for content-addressed texture reuse
//!
//! Scenes are rendered in fixed-size tiles; a [`TileId`] names a tile's
//! semantic content (layer, position, zoom, profile), so the texture holding
//! it can be found again through the cache's content index instead of being
//! re-rendered.

use std::sync::OnceLock;

use glaze_cache::{content_key_domain, ContentKey};

/// Fixed tile size in pixels (256x256)
pub const TILE_SIZE: u32 = 256;

/// The content key domain reserved for tile textures.
///
/// Allocated once per process; every tile content key lives in it.
pub fn tile_key_domain() -> u32 {
    static DOMAIN: OnceLock<u32> = OnceLock::new();
    *DOMAIN.get_or_init(content_key_domain)
}

/// Tile coordinates within a layer
///
/// (0, 0) is the top-left tile.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TileCoordinate {
    pub x: u32,
    pub y: u32,
}

impl TileCoordinate {
    /// Create a new tile coordinate
    pub fn new(x: u32, y: u32) -> Self {
        Self { x, y }
    }

    /// Convert tile coordinate to pixel offset (top-left corner)
    pub fn to_pixel_offset(&self, tile_size: u32) -> (u32, u32) {
        (self.x * tile_size, self.y * tile_size)
    }
}

/// Render profile for tiles
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TileProfile {
    /// Fast, lower fidelity rendering for quick previews
    Preview,

    /// High fidelity rendering for final display
    Crisp,
}

impl TileProfile {
    fn as_u32(self) -> u32 {
        match self {
            TileProfile::Preview => 0,
            TileProfile::Crisp => 1,
        }
    }
}

/// Tile identity
///
/// Uniquely identifies a tile's content within a scene. Two requests with
/// equal `TileId`s want the same pixels, so their textures are
/// interchangeable — which is exactly what the content key encodes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TileId {
    /// Layer index (0-based)
    pub layer_index: u16,

    /// Tile coordinate within the layer
    pub coordinate: TileCoordinate,

    /// Zoom level (represented as percentage, e.g., 100 = 100%)
    pub zoom_level: u32,

    /// Render profile
    pub profile: TileProfile,
}

impl TileId {
    /// Create a new tile ID
    pub fn new(
        layer_index: u16,
        coordinate: TileCoordinate,
        zoom_level: u32,
        profile: TileProfile,
    ) -> Self {
        Self {
            layer_index,
            coordinate,
            zoom_level,
            profile,
        }
    }

    /// The content key identifying this tile's texture in the cache.
    ///
    /// Fields are encoded directly as payload words rather than hashed, so
    /// distinct tiles can never collide.
    pub fn content_key(&self) -> ContentKey {
        ContentKey::new(
            tile_key_domain(),
            &[
                self.layer_index as u32,
                self.coordinate.x,
                self.coordinate.y,
                self.zoom_level,
                self.profile.as_u32(),
            ],
        )
    }
}

/// Calculate the tile grid for a layer at a zoom level.
///
/// Returns (columns, rows).
pub fn tile_grid(layer_width: f32, layer_height: f32, zoom_level: u32) -> (u32, u32) {
    let zoomed_width = (layer_width * (zoom_level as f32 / 100.0)) as u32;
    let zoomed_height = (layer_height * (zoom_level as f32 / 100.0)) as u32;

    let columns = zoomed_width.div_ceil(TILE_SIZE);
    let rows = zoomed_height.div_ceil(TILE_SIZE);

    (columns, rows)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tile_coordinate() {
        let coord = TileCoordinate::new(2, 3);
        assert_eq!(coord.x, 2);
        assert_eq!(coord.y, 3);

        let (px, py) = coord.to_pixel_offset(256);
        assert_eq!(px, 512);
        assert_eq!(py, 768);
    }

    #[test]
    fn test_tile_content_keys() {
        let id1 = TileId::new(0, TileCoordinate::new(1, 2), 100, TileProfile::Preview);
        let id2 = TileId::new(0, TileCoordinate::new(1, 2), 100, TileProfile::Preview);
        let id3 = TileId::new(0, TileCoordinate::new(1, 2), 100, TileProfile::Crisp);

        // Same tile, same key.
        assert_eq!(id1.content_key(), id2.content_key());

        // Any differing field gives a different key.
        assert_ne!(id1.content_key(), id3.content_key());
        assert_ne!(
            id1.content_key(),
            TileId::new(1, TileCoordinate::new(1, 2), 100, TileProfile::Preview).content_key()
        );
        assert_ne!(
            id1.content_key(),
            TileId::new(0, TileCoordinate::new(2, 1), 100, TileProfile::Preview).content_key()
        );
    }

    #[test]
    fn test_tile_keys_live_in_tile_domain() {
        let key = TileId::new(0, TileCoordinate::new(0, 0), 100, TileProfile::Preview).content_key();
        assert!(key.is_valid());
        assert_eq!(key.domain(), tile_key_domain());
        // The domain is allocated once, not per key.
        assert_eq!(tile_key_domain(), tile_key_domain());
    }

    #[test]
    fn test_tile_grid() {
        // 612x792 points is US Letter size; at 100% zoom with 256px tiles
        // that takes 3 columns and 4 rows.
        let (cols, rows) = tile_grid(612.0, 792.0, 100);
        assert_eq!(cols, 3);
        assert_eq!(rows, 4);

        // At 200% zoom the layer is 1224x1584: 5 columns, 7 rows.
        let (cols, rows) = tile_grid(612.0, 792.0, 200);
        assert_eq!(cols, 5);
        assert_eq!(rows, 7);
    }
}

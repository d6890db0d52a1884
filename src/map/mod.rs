//! The arena: a grid of tiles loaded from a Tiled Lua export.

pub mod lua;

use std::path::{Path, PathBuf};

use bevy::prelude::*;
use thiserror::Error;

use crate::{
    assets::{FallbackColor, MISSING_TILE},
    config::GameConfig,
    render::layers,
};
use lua::{LuaParseError, LuaTable, LuaValue};

pub struct MapPlugin;

impl Plugin for MapPlugin {
    fn build(&self, app: &mut App) {
        app.add_systems(PreStartup, load_map)
            .add_systems(Startup, spawn_tiles);
    }
}

/// Tiled stores horizontal/vertical/diagonal flip flags in the top bits of
/// each gid. We draw tiles unflipped, so they are masked off.
pub const GID_MASK: u32 = 0x1FFF_FFFF;

pub const DEFAULT_WIDTH: u32 = 30;
pub const DEFAULT_HEIGHT: u32 = 20;
pub const DEFAULT_TILE_PIXELS: u32 = 32;

/// Tile indices used by the built-in arena.
pub const WALL_TILE: u32 = 0;
pub const FLOOR_TILE: u32 = 1;

/// Largest map we agree to build, in cells. Every cell can become a sprite.
pub const MAX_TILES: usize = 1 << 20;

#[derive(Error, Debug)]
pub enum MapError {
    #[error("could not read map file {path:?}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("map is not valid Lua: {0}")]
    Parse(#[from] LuaParseError),
    #[error("map file must return a table")]
    NotATable,
    #[error("layer '{layer}' uses unsupported encoding '{encoding}'")]
    UnsupportedEncoding { layer: String, encoding: String },
    #[error("layer '{layer}' has {found} tiles, expected {expected}")]
    LayerSizeMismatch {
        layer: String,
        expected: usize,
        found: usize,
    },
    #[error("layer '{layer}' has a non-numeric tile at index {index}")]
    InvalidTile { layer: String, index: usize },
    #[error("map has no tile layers")]
    NoTileLayers,
    #[error("map is {width}x{height} tiles, more than the {max} allowed")]
    TooLarge { width: u32, height: u32, max: usize },
}

/// One grid of tile indices, row-major with row 0 at the top (Tiled's
/// order). `None` is an empty cell.
#[derive(Debug, Clone, PartialEq)]
pub struct TileLayer {
    pub name: String,
    pub tiles: Vec<Option<u32>>,
}

/// The loaded map. Inserted as a Resource at PreStartup and never changed.
#[derive(Resource, Debug, Clone, PartialEq)]
pub struct TileMap {
    pub width: u32,
    pub height: u32,
    /// Size of one tile in the tileset image, in pixels
    pub tile_pixels: UVec2,
    /// Size of one tile in the world
    pub tile_size: f32,
    pub layers: Vec<TileLayer>,
}

impl TileMap {
    /// Walls around the border, floor everywhere else.
    pub fn default_arena(tile_size: f32) -> Self {
        let (width, height) = (DEFAULT_WIDTH, DEFAULT_HEIGHT);
        let tiles = (0..height)
            .flat_map(|row| (0..width).map(move |col| (col, row)))
            .map(|(col, row)| {
                let border = col == 0 || row == 0 || col == width - 1 || row == height - 1;
                Some(if border { WALL_TILE } else { FLOOR_TILE })
            })
            .collect();

        TileMap {
            width,
            height,
            tile_pixels: UVec2::splat(DEFAULT_TILE_PIXELS),
            tile_size,
            layers: vec![TileLayer {
                name: "ground".to_string(),
                tiles,
            }],
        }
    }

    pub fn from_lua(source: &str, tile_size: f32) -> Result<Self, MapError> {
        let root = lua::parse(source)?;
        let root = root.as_table().ok_or(MapError::NotATable)?;

        let width = dimension(root, "width", DEFAULT_WIDTH);
        let height = dimension(root, "height", DEFAULT_HEIGHT);
        let tile_pixels = UVec2::new(
            dimension(root, "tilewidth", DEFAULT_TILE_PIXELS),
            dimension(root, "tileheight", DEFAULT_TILE_PIXELS),
        );
        let cell_count = (width as usize)
            .checked_mul(height as usize)
            .filter(|count| *count <= MAX_TILES)
            .ok_or(MapError::TooLarge {
                width,
                height,
                max: MAX_TILES,
            })?;
        let first_gid = root
            .table("tilesets")
            .and_then(|sets| sets.array.first())
            .and_then(LuaValue::as_table)
            .and_then(|set| set.number("firstgid"))
            .map_or(1, |gid| gid.max(1.0) as u32);

        let mut layers = Vec::new();
        if let Some(layer_tables) = root.table("layers") {
            for layer in layer_tables.array.iter().filter_map(LuaValue::as_table) {
                if layer.string("type") != Some("tilelayer") {
                    continue;
                }
                if layer.get("visible").and_then(LuaValue::as_bool) == Some(false) {
                    continue;
                }
                layers.push(read_layer(layer, cell_count, first_gid)?);
            }
        }

        if layers.is_empty() {
            return Err(MapError::NoTileLayers);
        }

        Ok(TileMap {
            width,
            height,
            tile_pixels,
            tile_size,
            layers,
        })
    }

    /// Reads and parses a map file from disk.
    pub fn load(path: &Path, tile_size: f32) -> Result<Self, MapError> {
        let source = std::fs::read_to_string(path).map_err(|source| MapError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_lua(&source, tile_size)
    }

    pub fn pixel_size(&self) -> Vec2 {
        Vec2::new(self.width as f32, self.height as f32) * self.tile_size
    }

    /// The playable area. Bottom-left corner is the world origin.
    pub fn bounds(&self) -> Rect {
        Rect::from_corners(Vec2::ZERO, self.pixel_size())
    }

    pub fn center(&self) -> Vec2 {
        self.pixel_size() * 0.5
    }

    /// World position of a tile's centre. Row 0 is the top row, so rows
    /// count down from the top edge of the map.
    pub fn tile_center(&self, col: u32, row: u32) -> Vec2 {
        let ts = self.tile_size;
        Vec2::new(
            col as f32 * ts + ts * 0.5,
            self.height as f32 * ts - row as f32 * ts - ts * 0.5,
        )
    }

    pub fn tile(&self, layer: usize, col: u32, row: u32) -> Option<u32> {
        if col >= self.width || row >= self.height {
            return None;
        }
        let index = (row * self.width + col) as usize;
        self.layers.get(layer)?.tiles.get(index).copied().flatten()
    }
}

fn dimension(table: &LuaTable, key: &str, default: u32) -> u32 {
    table
        .number(key)
        .filter(|n| *n >= 1.0)
        .map_or(default, |n| n as u32)
}

fn read_layer(layer: &LuaTable, expected: usize, first_gid: u32) -> Result<TileLayer, MapError> {
    let name = layer.string("name").unwrap_or("unnamed").to_string();

    if let Some(encoding) = layer.string("encoding") {
        if encoding != "lua" {
            return Err(MapError::UnsupportedEncoding {
                layer: name,
                encoding: encoding.to_string(),
            });
        }
    }

    let data = layer.table("data").map(|d| d.array.as_slice()).unwrap_or(&[]);
    if data.len() != expected {
        return Err(MapError::LayerSizeMismatch {
            layer: name,
            expected,
            found: data.len(),
        });
    }

    let mut tiles = Vec::with_capacity(expected);
    for (index, value) in data.iter().enumerate() {
        let Some(raw) = value.as_number().filter(|n| *n >= 0.0) else {
            return Err(MapError::InvalidTile { layer: name, index });
        };
        tiles.push(gid_to_tile(raw as u64 as u32, first_gid));
    }

    Ok(TileLayer { name, tiles })
}

/// Gid 0 is an empty cell. Anything else becomes a 0-based index into the
/// tileset once the flip bits are stripped.
pub fn gid_to_tile(gid: u32, first_gid: u32) -> Option<u32> {
    let gid = gid & GID_MASK;
    if gid == 0 || gid < first_gid {
        return None;
    }
    Some(gid - first_gid)
}

/// The tileset image cut into an atlas.
#[derive(Resource, Debug, Clone)]
pub struct TileSheet {
    pub image: Handle<Image>,
    pub layout: Handle<TextureAtlasLayout>,
    pub tile_count: u32,
}

impl TileSheet {
    /// Sprite for one tile, drawn at `size` world units. `None` when the
    /// index is past the end of the sheet.
    pub fn sprite(&self, index: u32, size: f32) -> Option<Sprite> {
        if index >= self.tile_count {
            return None;
        }
        let mut sprite = Sprite::from_atlas_image(
            self.image.clone(),
            TextureAtlas {
                layout: self.layout.clone(),
                index: index as usize,
            },
        );
        sprite.custom_size = Some(Vec2::splat(size));
        Some(sprite)
    }
}

pub fn load_map(mut commands: Commands, config: Res<GameConfig>) {
    let path = Path::new("assets").join(&config.world.map_path);
    let map = match TileMap::load(&path, config.world.tile_size) {
        Ok(map) => {
            info!(
                "Loaded map {:?}: {}x{} tiles, {} layer(s)",
                path,
                map.width,
                map.height,
                map.layers.len()
            );
            map
        }
        Err(e) => {
            warn!("{}. Using the built-in arena.", e);
            TileMap::default_arena(config.world.tile_size)
        }
    };
    commands.insert_resource(map);
}

/// Placeholder shade for a tile when the tileset image is missing. Walls
/// come out darker than floor so the arena edge stays visible.
fn missing_tile_color(index: u32) -> Color {
    if index == WALL_TILE {
        Color::srgb(0.2, 0.2, 0.2)
    } else {
        MISSING_TILE
    }
}

pub fn spawn_tiles(
    mut commands: Commands,
    map: Res<TileMap>,
    config: Res<GameConfig>,
    asset_server: Res<AssetServer>,
    mut layouts: ResMut<Assets<TextureAtlasLayout>>,
) {
    let columns = config.world.tileset_columns.max(1);
    let rows = config.world.tileset_rows.max(1);
    let layout = layouts.add(TextureAtlasLayout::from_grid(
        map.tile_pixels,
        columns,
        rows,
        None,
        None,
    ));
    let sheet = TileSheet {
        image: asset_server.load(config.world.tileset_path.clone()),
        layout,
        tile_count: columns * rows,
    };

    let mut out_of_range = 0;
    for (layer_index, layer) in map.layers.iter().enumerate() {
        let z = layers::TILES + layer_index as f32 * 0.1;
        for row in 0..map.height {
            for col in 0..map.width {
                let Some(index) = map.tile(layer_index, col, row) else {
                    continue;
                };
                let Some(sprite) = sheet.sprite(index, map.tile_size) else {
                    out_of_range += 1;
                    continue;
                };
                commands.spawn((
                    sprite,
                    FallbackColor(missing_tile_color(index)),
                    Transform::from_translation(map.tile_center(col, row).extend(z)),
                ));
            }
        }
    }

    if out_of_range > 0 {
        warn!(
            "{} tile(s) reference indices past the {}-tile tileset and were skipped",
            out_of_range, sheet.tile_count
        );
    }
    commands.insert_resource(sheet);
}

use std::collections::HashMap;

use bevy::{asset::LoadState, prelude::*};

use crate::{enemy::EnemyKind, shaders_lite::BaseColor};

pub struct AssetsPlugin;

impl Plugin for AssetsPlugin {
    fn build(&self, app: &mut App) {
        app.add_systems(PreStartup, load_sprites)
            .add_systems(Update, resolve_fallback_sprites);
    }
}

pub const PLAYER_SPRITE: &str = "sprites/player.png";
pub const ORB_SPRITE: &str = "sprites/orb.png";
pub const CARROT_SPRITE: &str = "sprites/carrot.png";

/// Colour for any character sprite that failed to load.
pub const MISSING_CHARACTER: Color = Color::srgb(1.0, 0.0, 1.0);
/// Colour for a tile whose tileset failed to load.
pub const MISSING_TILE: Color = Color::srgb(0.35, 0.35, 0.35);

/// Image handles for every sprite, loaded once at startup.
#[derive(Resource)]
pub struct GameSprites {
    pub player: Handle<Image>,
    pub orb: Handle<Image>,
    pub carrot: Handle<Image>,
    enemies: HashMap<EnemyKind, Handle<Image>>,
}

impl GameSprites {
    pub fn enemy(&self, kind: EnemyKind) -> Handle<Image> {
        self.enemies.get(&kind).cloned().unwrap_or_default()
    }
}

pub fn load_sprites(mut commands: Commands, asset_server: Res<AssetServer>) {
    let enemies = EnemyKind::ALL
        .iter()
        .map(|kind| (*kind, asset_server.load(kind.sprite_path())))
        .collect();

    commands.insert_resource(GameSprites {
        player: asset_server.load(PLAYER_SPRITE),
        orb: asset_server.load(ORB_SPRITE),
        carrot: asset_server.load(CARROT_SPRITE),
        enemies,
    });
}

/// Placeholder colour for a sprite whose image might not load.
///
/// While the image is loading nothing changes. Once the load settles the
/// component is removed: a loaded image is kept as is, a failed one is
/// swapped for a plain coloured quad of the same size.
#[derive(Component, Copy, Clone, Debug, PartialEq)]
pub struct FallbackColor(pub Color);

pub fn resolve_fallback_sprites(
    mut commands: Commands,
    asset_server: Res<AssetServer>,
    mut sprites: Query<(Entity, &mut Sprite, &FallbackColor)>,
) {
    for (entity, mut sprite, fallback) in sprites.iter_mut() {
        match asset_server.load_state(sprite.image.id()) {
            LoadState::Loaded => {
                commands.entity(entity).try_remove::<FallbackColor>();
            }
            LoadState::Failed(_) => {
                // Handle::default() is Bevy's built-in white texture, so the
                // colour below becomes the whole sprite.
                sprite.image = Handle::default();
                sprite.texture_atlas = None;
                sprite.color = fallback.0;
                commands
                    .entity(entity)
                    .try_remove::<FallbackColor>()
                    .try_insert(BaseColor(fallback.0));
            }
            _ => {}
        }
    }
}

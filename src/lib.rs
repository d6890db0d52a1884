// lib.rs - Public API for the game crate.
// Every concern is its own plugin; GamePlugin adds them all so main.rs
// only has to configure the window and the config.

use bevy::prelude::*;

pub mod assets;
pub mod audio;
pub mod camera;
pub mod combat;
pub mod config;
pub mod enemy;
pub mod game_state;
pub mod health;
pub mod map;
pub mod movement;
pub mod pickups;
pub mod player;
pub mod progression;
pub mod render;
pub mod shaders_lite;
pub mod spawner;
pub mod ui;

/// Everything except the window and the config, which main.rs sets up.
pub struct GamePlugin;

impl Plugin for GamePlugin {
    fn build(&self, app: &mut App) {
        app.insert_resource(ClearColor(Color::BLACK))
            .add_plugins((
                game_state::GameStatePlugin,
                assets::AssetsPlugin,
                audio::AudioPlugin,
                map::MapPlugin,
                camera::CameraPlugin,
                render::RenderPlugin,
                shaders_lite::ShadersLitePlugin,
                health::HealthPlugin,
                movement::MovementPlugin,
                player::PlayerPlugin,
                enemy::EnemyPlugin,
                combat::CombatPlugin,
                pickups::PickupsPlugin,
                spawner::SpawnerPlugin,
                progression::ProgressionPlugin,
            ))
            .add_plugins(ui::UiPlugin);
    }
}

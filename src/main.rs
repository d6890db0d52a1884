use bevy::prelude::*;
use bevy::window::WindowResolution;

use carrot_survivors::{
    config::{load_config, ConfigPlugin},
    GamePlugin,
};

fn main() {
    // The window has to be configured before the App exists, so the config
    // is read here rather than in a Startup system.
    let (config, source) = load_config();

    let window = Window {
        title: config.window.title.clone(),
        resolution: WindowResolution::new(config.window.width, config.window.height),
        resizable: false,
        ..default()
    };

    App::new()
        .add_plugins(
            DefaultPlugins
                .set(WindowPlugin {
                    primary_window: Some(window),
                    ..default()
                })
                .set(ImagePlugin::default_nearest()),
        )
        .add_plugins(ConfigPlugin { config, source })
        .add_plugins(GamePlugin)
        .run();
}

use bevy::prelude::*;

use crate::{
    config::GameConfig,
    game_state::GameplaySet,
    map::TileMap,
    player::Player,
};

pub struct CameraPlugin;

impl Plugin for CameraPlugin {
    fn build(&self, app: &mut App) {
        app.add_systems(Startup, spawn_camera)
            .add_systems(Update, follow_player_system.after(GameplaySet::Movement));
    }
}

#[derive(Component)]
pub struct MainCamera;

/// The world-space rectangle visible from a camera centred on `center`.
pub fn view_rect(center: Vec2, view_size: Vec2) -> Rect {
    Rect::from_center_size(center, view_size)
}

/// Camera centre that keeps the view inside the map where possible. On an
/// axis where the map is smaller than the view, the map is centred instead.
pub fn camera_target(player: Vec2, view_size: Vec2, map_bounds: Rect) -> Vec2 {
    let half = view_size * 0.5;
    let axis = |p: f32, min: f32, max: f32, half: f32| {
        if max - min <= half * 2.0 {
            (min + max) * 0.5
        } else {
            p.clamp(min + half, max - half)
        }
    };
    Vec2::new(
        axis(player.x, map_bounds.min.x, map_bounds.max.x, half.x),
        axis(player.y, map_bounds.min.y, map_bounds.max.y, half.y),
    )
}

fn spawn_camera(mut commands: Commands, map: Res<TileMap>) {
    commands.spawn((
        Camera2d,
        MainCamera,
        Transform::from_translation(map.center().extend(0.0)),
    ));
}

fn follow_player_system(
    mut camera: Query<&mut Transform, (With<MainCamera>, Without<Player>)>,
    player: Query<&Transform, With<Player>>,
    config: Res<GameConfig>,
    map: Res<TileMap>,
) {
    let (Ok(mut camera_transform), Ok(player_transform)) = (camera.single_mut(), player.single()) else {
        return;
    };
    let target = camera_target(
        player_transform.translation.truncate(),
        config.window.view_size(),
        map.bounds(),
    );
    camera_transform.translation.x = target.x;
    camera_transform.translation.y = target.y;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn view_is_centred() {
        let view = view_rect(Vec2::new(100.0, 50.0), Vec2::new(200.0, 100.0));
        assert_eq!(view.min, Vec2::new(0.0, 0.0));
        assert_eq!(view.max, Vec2::new(200.0, 100.0));
    }

    #[test]
    fn camera_stops_at_map_edges() {
        let map = Rect::new(0.0, 0.0, 3000.0, 2000.0);
        let view = Vec2::new(1280.0, 720.0);
        assert_eq!(camera_target(Vec2::new(10.0, 10.0), view, map), Vec2::new(640.0, 360.0));
        assert_eq!(camera_target(Vec2::new(1500.0, 1000.0), view, map), Vec2::new(1500.0, 1000.0));
    }

    #[test]
    fn small_map_is_centred() {
        let map = Rect::new(0.0, 0.0, 960.0, 640.0);
        let view = Vec2::new(1280.0, 720.0);
        assert_eq!(camera_target(Vec2::new(10.0, 600.0), view, map), Vec2::new(480.0, 320.0));
    }
}

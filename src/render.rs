use bevy::prelude::*;

use crate::{enemy::Enemy, player::Player};

pub struct RenderPlugin;

impl Plugin for RenderPlugin {
    fn build(&self, app: &mut App) {
        app.add_systems(Update, (y_sort_system, face_player_system, spawn_pop_system));
    }
}

/// Draw order for the world. Tiles sit below everything; y-sorted actors
/// live in a narrow band above them; effects are drawn on top.
pub mod layers {
    pub const TILES: f32 = -10.0;
    pub const PICKUPS: f32 = 1.0;
    pub const ACTORS: f32 = 5.0;
    pub const EFFECTS: f32 = 20.0;
}

/// Opt-in marker for y-sorting. Tiles and effects keep a fixed z.
#[derive(Component, Copy, Clone, Default)]
pub struct YSort;

/// Sorts sprites by y position so lower actors appear in front
fn y_sort_system(mut query: Query<&mut Transform, With<YSort>>) {
    for mut transform in &mut query {
        // Lower y (bottom of screen) -> higher z (drawn in front).
        // Scaled down so even a large map stays inside the actor band.
        transform.translation.z = layers::ACTORS - transform.translation.y * 0.0001;
    }
}

/// Flips enemy sprites horizontally so they face the player.
fn face_player_system(
    mut enemies: Query<(&Transform, &mut Sprite), (With<Enemy>, Without<Player>)>,
    player: Query<&Transform, With<Player>>,
) {
    let Ok(player_transform) = player.single() else {
        return;
    };
    for (transform, mut sprite) in &mut enemies {
        let flip = player_transform.translation.x < transform.translation.x;
        // Only write on change so Changed<Sprite> stays meaningful
        if sprite.flip_x != flip {
            sprite.flip_x = flip;
        }
    }
}

/// Scale-in when something appears in the world.
#[derive(Component)]
pub struct SpawnPop(pub Timer);

impl SpawnPop {
    pub fn new(seconds: f32) -> Self {
        SpawnPop(Timer::from_seconds(seconds, TimerMode::Once))
    }
}

/// BackOut easing from 25% to 100%. Overshoots past 1.0 then settles back.
pub fn pop_scale(t: f32) -> f32 {
    let eased = EaseFunction::BackOut.sample_clamped(t);
    0.25 + (1.0 - 0.25) * eased
}

fn spawn_pop_system(
    mut commands: Commands,
    mut query: Query<(Entity, &mut Transform, &mut SpawnPop)>,
    time: Res<Time>,
) {
    for (entity, mut transform, mut pop) in query.iter_mut() {
        pop.0.tick(time.delta());

        if pop.0.just_finished() {
            // Snap to exact final scale and remove the component
            transform.scale = Vec3::ONE;
            commands.entity(entity).try_remove::<SpawnPop>();
        } else {
            transform.scale = Vec3::splat(pop_scale(pop.0.fraction()));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pop_starts_small_and_ends_at_full_size() {
        assert!((pop_scale(0.0) - 0.25).abs() < 1e-4);
        assert!((pop_scale(1.0) - 1.0).abs() < 1e-4);
    }

    #[test]
    fn pop_overshoots_in_the_middle() {
        let peak = (1..20).map(|i| pop_scale(i as f32 / 20.0)).fold(0.0, f32::max);
        assert!(peak > 1.0);
    }

    #[test]
    fn lower_sprites_draw_in_front() {
        let mut app = App::new();
        app.add_plugins(MinimalPlugins).add_plugins(RenderPlugin);
        let high = app
            .world_mut()
            .spawn((Transform::from_xyz(0.0, 500.0, 0.0), YSort))
            .id();
        let low = app
            .world_mut()
            .spawn((Transform::from_xyz(0.0, 20.0, 0.0), YSort))
            .id();
        let tile = app
            .world_mut()
            .spawn(Transform::from_xyz(0.0, 0.0, layers::TILES))
            .id();
        app.update();

        let z = |e: Entity| app.world().get::<Transform>(e).unwrap().translation.z;
        assert!(z(low) > z(high));
        assert!(z(high) > layers::TILES);
        assert_eq!(z(tile), layers::TILES);
    }
}

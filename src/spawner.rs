//! Enemy waves: what spawns, how often, and where.

use std::time::Duration;

use bevy::prelude::*;
use rand::{seq::SliceRandom, Rng};

use crate::{
    assets::GameSprites,
    camera::{view_rect, MainCamera},
    config::{GameConfig, SpawnerConfig},
    enemy::{spawn_enemy, Enemy, EnemyKind},
    game_state::{AppState, GameplaySet},
    map::TileMap,
    player::Player,
    progression::UpgradeManager,
};

pub struct SpawnerPlugin;

impl Plugin for SpawnerPlugin {
    fn build(&self, app: &mut App) {
        app.add_systems(OnExit(AppState::Menu), reset_spawn_timer)
            .add_systems(
                Update,
                spawn_timer_system
                    .in_set(GameplaySet::Resolve)
                    .run_if(resource_exists::<SpawnTimer>),
            )
            .add_observer(on_boss_spawn_requested);
    }
}

/// Triggered by progression when the boss level is reached.
#[derive(Event, Copy, Clone, Debug)]
pub struct BossSpawnRequested;

/// Enemies that can spawn at a given level. Duplicates act as weights.
pub fn spawn_table(level: u32) -> &'static [EnemyKind] {
    use EnemyKind::*;
    match level {
        0 | 1 => &[Slime],
        2 => &[Slime, Slime, Bat],
        3 => &[Slime, Bat, Goblin],
        4 => &[Slime, Bat, Goblin, Golem],
        5 | 6 => &[Bat, Goblin, Goblin, Golem, Wraith],
        _ => &[Goblin, Golem, Wraith, Wraith],
    }
}

pub fn choose_enemy_kind(level: u32, rng: &mut impl Rng) -> EnemyKind {
    spawn_table(level)
        .choose(rng)
        .copied()
        .unwrap_or(EnemyKind::Slime)
}

/// Seconds between spawns. Shrinks linearly with level down to a floor.
pub fn spawn_interval(level: u32, config: &SpawnerConfig) -> f32 {
    let steps = level.saturating_sub(1) as f32;
    (config.base_interval - steps * config.interval_step).max(config.min_interval)
}

/// Pick a spawn point outside the camera view but inside the map.
///
/// Candidates are sampled around the player in a ring that starts just past
/// the corner of the view. If nothing fits after `max_attempts` tries (a map
/// smaller than the screen, or the player in a corner) the last direction
/// tried is used at the ring's inner radius and clamped onto the map.
pub fn sample_spawn_position(
    player: Vec2,
    view: Rect,
    map_bounds: Rect,
    config: &SpawnerConfig,
    rng: &mut impl Rng,
) -> Vec2 {
    let min_radius = view.half_size().length() + config.band_margin;
    let max_radius = min_radius + config.band_width.max(0.0);
    let mut angle = 0.0;

    for _ in 0..config.max_attempts.max(1) {
        angle = rng.gen_range(0.0..std::f32::consts::TAU);
        let radius = if max_radius > min_radius {
            rng.gen_range(min_radius..max_radius)
        } else {
            min_radius
        };
        let candidate = player + Vec2::from_angle(angle) * radius;
        if map_bounds.contains(candidate) && !view.contains(candidate) {
            return candidate;
        }
    }

    let fallback = player + Vec2::from_angle(angle) * min_radius;
    fallback.clamp(map_bounds.min, map_bounds.max)
}

/// Repeating spawn timer. The level it was last sized for is remembered so
/// the duration only changes on a level-up.
#[derive(Resource)]
pub struct SpawnTimer {
    pub timer: Timer,
    pub level: u32,
}

impl SpawnTimer {
    pub fn new(level: u32, config: &SpawnerConfig) -> Self {
        Self {
            timer: Timer::from_seconds(spawn_interval(level, config), TimerMode::Repeating),
            level,
        }
    }

    /// Resizes the timer if the player levelled up since the last call.
    /// Time already elapsed carries over. True when the size changed.
    pub fn sync_level(&mut self, level: u32, config: &SpawnerConfig) -> bool {
        if self.level == level {
            return false;
        }
        self.level = level;
        let interval = spawn_interval(level, config);
        self.timer.set_duration(Duration::from_secs_f32(interval));
        debug!("Spawn interval is now {:.2}s", interval);
        true
    }
}

/// What the camera can see right now. Falls back to a view centred on the
/// player if there is no camera.
fn visible_rect(
    camera: &Query<&Transform, With<MainCamera>>,
    player: Vec2,
    config: &GameConfig,
) -> Rect {
    let center = camera
        .single()
        .map_or(player, |transform| transform.translation.truncate());
    view_rect(center, config.window.view_size())
}

fn reset_spawn_timer(mut commands: Commands, config: Res<GameConfig>) {
    commands.insert_resource(SpawnTimer::new(1, &config.spawner));
}

#[allow(clippy::too_many_arguments)]
fn spawn_timer_system(
    mut commands: Commands,
    mut spawn_timer: ResMut<SpawnTimer>,
    manager: Res<UpgradeManager>,
    config: Res<GameConfig>,
    map: Res<TileMap>,
    sprites: Res<GameSprites>,
    player: Query<&Transform, With<Player>>,
    camera: Query<&Transform, With<MainCamera>>,
    enemies: Query<(), With<Enemy>>,
    time: Res<Time>,
) {
    spawn_timer.sync_level(manager.level, &config.spawner);
    spawn_timer.timer.tick(time.delta());
    if !spawn_timer.timer.just_finished() {
        return;
    }
    if enemies.iter().count() >= config.spawner.max_enemies {
        return;
    }
    let Ok(player_transform) = player.single() else {
        return;
    };

    let mut rng = rand::thread_rng();
    let player_pos = player_transform.translation.truncate();
    let view = visible_rect(&camera, player_pos, &config);
    let kind = choose_enemy_kind(manager.level, &mut rng);
    let position = sample_spawn_position(player_pos, view, map.bounds(), &config.spawner, &mut rng);
    spawn_enemy(&mut commands, &sprites, kind, position);
}

fn on_boss_spawn_requested(
    _trigger: On<BossSpawnRequested>,
    mut commands: Commands,
    config: Res<GameConfig>,
    map: Res<TileMap>,
    sprites: Res<GameSprites>,
    player: Query<&Transform, With<Player>>,
    camera: Query<&Transform, With<MainCamera>>,
) {
    let Ok(player_transform) = player.single() else {
        warn!("Boss requested with no player on the field");
        return;
    };
    let mut rng = rand::thread_rng();
    let player_pos = player_transform.translation.truncate();
    let view = visible_rect(&camera, player_pos, &config);
    let position = sample_spawn_position(player_pos, view, map.bounds(), &config.spawner, &mut rng);
    spawn_enemy(&mut commands, &sprites, EnemyKind::OgreKing, position);
    info!("Spawned {:?} at {:?}", EnemyKind::OgreKing, position);
}

#[cfg(test)]
mod tests {
    use rand::{rngs::StdRng, SeedableRng};

    use super::*;

    #[test]
    fn interval_follows_the_linear_schedule() {
        let config = SpawnerConfig::default();
        assert!((spawn_interval(1, &config) - 2.0).abs() < 1e-5);
        assert!((spawn_interval(3, &config) - 1.7).abs() < 1e-5);
        for level in 1..60 {
            let expected = (config.base_interval
                - (level - 1) as f32 * config.interval_step)
                .max(config.min_interval);
            assert!((spawn_interval(level, &config) - expected).abs() < 1e-5);
            assert!(spawn_interval(level + 1, &config) <= spawn_interval(level, &config));
        }
        assert_eq!(spawn_interval(100, &config), config.min_interval);
    }

    #[test]
    fn timer_resizes_only_on_level_up() {
        let config = SpawnerConfig::default();
        let mut spawn_timer = SpawnTimer::new(1, &config);
        spawn_timer.timer.tick(Duration::from_secs_f32(0.1));

        assert!(!spawn_timer.sync_level(1, &config));
        assert!((spawn_timer.timer.duration().as_secs_f32() - spawn_interval(1, &config)).abs() < 1e-5);

        assert!(spawn_timer.sync_level(4, &config));
        assert_eq!(spawn_timer.level, 4);
        assert!((spawn_timer.timer.duration().as_secs_f32() - spawn_interval(4, &config)).abs() < 1e-5);
        assert!((spawn_timer.timer.elapsed_secs() - 0.1).abs() < 1e-5);
        assert!(!spawn_timer.sync_level(4, &config));
    }

    #[test]
    fn tables_only_grow_stronger() {
        assert_eq!(spawn_table(1), &[EnemyKind::Slime]);
        assert!(spawn_table(4).contains(&EnemyKind::Golem));
        assert!(!spawn_table(5).contains(&EnemyKind::Slime));
        assert!(spawn_table(9).contains(&EnemyKind::Wraith));
        for level in 1..20 {
            assert!(!spawn_table(level).is_empty());
            assert!(spawn_table(level).iter().all(|kind| !kind.is_boss()));
        }
    }

    #[test]
    fn chosen_kind_comes_from_the_table() {
        let mut rng = StdRng::seed_from_u64(3);
        for level in 1..10 {
            for _ in 0..50 {
                let kind = choose_enemy_kind(level, &mut rng);
                assert!(spawn_table(level).contains(&kind));
            }
        }
    }

    #[test]
    fn spawns_land_off_screen_and_on_the_map() {
        let config = SpawnerConfig::default();
        let map = Rect::new(0.0, 0.0, 4000.0, 4000.0);
        let player = Vec2::new(2000.0, 2000.0);
        let view = view_rect(player, Vec2::new(1280.0, 720.0));
        let mut rng = StdRng::seed_from_u64(17);

        for _ in 0..200 {
            let position = sample_spawn_position(player, view, map, &config, &mut rng);
            assert!(map.contains(position));
            assert!(!view.contains(position));
        }
    }

    #[test]
    fn tiny_map_falls_back_to_a_clamped_point() {
        let config = SpawnerConfig::default();
        // Whole map fits on screen, so every candidate is rejected
        let map = Rect::new(0.0, 0.0, 960.0, 640.0);
        let player = Vec2::new(480.0, 320.0);
        let view = view_rect(player, Vec2::new(1280.0, 720.0));
        let mut rng = StdRng::seed_from_u64(8);

        let position = sample_spawn_position(player, view, map, &config, &mut rng);
        assert!(map.contains(position));
    }
}

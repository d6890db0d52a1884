use std::path::PathBuf;

use bevy::prelude::*;
use serde::{Deserialize, Serialize};

/// Every tunable number in the game, loaded once from `config.ron`.
///
/// ## How loading works
///
/// `load_config()` runs in `main()` *before* the App is built, because the
/// window size has to be known when `WindowPlugin` is configured. The result
/// is then inserted as a Resource so systems can read it with `Res<GameConfig>`.
///
/// #[serde(default)] on the struct means a config file only has to mention the
/// values it wants to change. Anything missing keeps its `Default` value, so
/// an empty `()` file is a valid config.
#[derive(Resource, Serialize, Deserialize, Debug, Clone, PartialEq, Default)]
#[serde(default)]
pub struct GameConfig {
    pub window: WindowConfig,
    pub world: WorldConfig,
    pub player: PlayerConfig,
    pub spawner: SpawnerConfig,
    pub progression: ProgressionConfig,
    pub combat: CombatConfig,
    pub audio: AudioConfig,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct WindowConfig {
    pub title: String,
    pub width: u32,
    pub height: u32,
}

impl Default for WindowConfig {
    fn default() -> Self {
        Self {
            title: "Carrot Survivors".to_string(),
            width: 1280,
            height: 720,
        }
    }
}

impl WindowConfig {
    /// Size of the visible area in world units. The camera is unscaled, so
    /// one logical pixel is one world unit.
    pub fn view_size(&self) -> Vec2 {
        Vec2::new(self.width as f32, self.height as f32)
    }
}

/// Paths are relative to the `assets/` folder, the same root Bevy's
/// AssetServer uses.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct WorldConfig {
    pub tile_size: f32,
    pub map_path: String,
    pub tileset_path: String,
    pub tileset_columns: u32,
    pub tileset_rows: u32,
}

impl Default for WorldConfig {
    fn default() -> Self {
        Self {
            tile_size: 32.0,
            map_path: "maps/arena.lua".to_string(),
            tileset_path: "tiles/tiles.png".to_string(),
            tileset_columns: 8,
            tileset_rows: 8,
        }
    }
}

/// Starting stats for a fresh run. Upgrades modify a copy of these on the
/// player entity; the config itself never changes at runtime.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct PlayerConfig {
    pub max_health: i32,
    /// Pixels per second
    pub speed: f32,
    pub attack_damage: i32,
    pub attack_cooldown_ms: u32,
    pub radius: f32,
}

impl Default for PlayerConfig {
    fn default() -> Self {
        Self {
            max_health: 100,
            speed: 180.0,
            attack_damage: 20,
            attack_cooldown_ms: 500,
            radius: 14.0,
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct SpawnerConfig {
    /// Seconds between spawns at level 1
    pub base_interval: f32,
    /// Seconds shaved off the interval for each level past the first
    pub interval_step: f32,
    /// The interval never drops below this
    pub min_interval: f32,
    /// Extra distance beyond the screen corner where the spawn band starts
    pub band_margin: f32,
    /// Thickness of the spawn band
    pub band_width: f32,
    pub max_attempts: u32,
    pub max_enemies: usize,
}

impl Default for SpawnerConfig {
    fn default() -> Self {
        Self {
            base_interval: 2.0,
            interval_step: 0.15,
            min_interval: 0.4,
            band_margin: 48.0,
            band_width: 160.0,
            max_attempts: 20,
            max_enemies: 150,
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct ProgressionConfig {
    /// Pickups needed for the first level-up
    pub initial_threshold: u32,
    /// Each level-up multiplies the threshold by this (rounded)
    pub growth_factor: f32,
    pub offer_count: usize,
    pub boss_level: u32,
}

impl Default for ProgressionConfig {
    fn default() -> Self {
        Self {
            initial_threshold: 5,
            growth_factor: 1.5,
            offer_count: 3,
            boss_level: 5,
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct CombatConfig {
    /// Full opening angle of the swing, in degrees
    pub swing_arc_degrees: f32,
    /// Swing reach before the size multiplier, in tiles
    pub swing_reach_tiles: f32,
    pub swing_min_radius: f32,
    /// How long an attack volume stays live, in milliseconds
    pub melee_duration_ms: u32,
    /// Slam cooldown as a multiple of the swing cooldown
    pub slam_cooldown_factor: f32,
    pub splash_radius: f32,
    pub knockback_distance: f32,
    pub stagger_secs: f32,
    pub carrot_speed: f32,
    pub carrot_lifetime_secs: f32,
    pub carrot_cooldown_secs: f32,
    pub carrot_damage: i32,
    /// Angle between neighbouring carrots in a volley, in degrees
    pub carrot_spread_degrees: f32,
    pub lightning_cooldown_secs: f32,
    pub lightning_range: f32,
    pub lightning_damage: i32,
    pub lightning_thickness: f32,
    pub orb_magnet_tiles: f32,
    pub orb_speed: f32,
}

impl Default for CombatConfig {
    fn default() -> Self {
        Self {
            swing_arc_degrees: 120.0,
            swing_reach_tiles: 2.0,
            swing_min_radius: 0.0,
            melee_duration_ms: 200,
            slam_cooldown_factor: 2.0,
            splash_radius: 60.0,
            knockback_distance: 24.0,
            stagger_secs: 0.2,
            carrot_speed: 420.0,
            carrot_lifetime_secs: 1.6,
            carrot_cooldown_secs: 1.2,
            carrot_damage: 15,
            carrot_spread_degrees: 12.0,
            lightning_cooldown_secs: 1.5,
            lightning_range: 320.0,
            lightning_damage: 25,
            lightning_thickness: 10.0,
            orb_magnet_tiles: 2.0,
            orb_speed: 120.0,
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct AudioConfig {
    pub effects_volume_percent: u8,
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            effects_volume_percent: 70,
        }
    }
}

impl GameConfig {
    /// Clamp values that would break game rules if taken literally.
    /// A hand-edited config should degrade, not crash or soft-lock the game.
    pub fn sanitized(mut self) -> Self {
        self.audio.effects_volume_percent = self.audio.effects_volume_percent.min(100);
        self.progression.growth_factor = self.progression.growth_factor.max(1.0);
        self.progression.initial_threshold = self.progression.initial_threshold.max(1);
        self.progression.offer_count = self.progression.offer_count.max(1);
        self.spawner.min_interval = self.spawner.min_interval.max(0.05);
        self.spawner.base_interval = self.spawner.base_interval.max(self.spawner.min_interval);
        self.spawner.interval_step = self.spawner.interval_step.max(0.0);
        self.spawner.max_attempts = self.spawner.max_attempts.max(1);
        self.world.tile_size = self.world.tile_size.max(1.0);

        // These all end up in a Timer, which rejects negative durations.
        let combat = &mut self.combat;
        for seconds in [
            &mut combat.stagger_secs,
            &mut combat.carrot_lifetime_secs,
            &mut combat.carrot_cooldown_secs,
            &mut combat.lightning_cooldown_secs,
        ] {
            *seconds = seconds.max(0.0);
        }
        combat.slam_cooldown_factor = combat.slam_cooldown_factor.max(0.0);
        self
    }
}

/// Candidate locations for config.ron, in the order we try them.
fn config_file_paths() -> Vec<PathBuf> {
    let mut paths = vec![PathBuf::from("config.ron")];
    if let Some(dir) = dirs::config_dir() {
        paths.push(dir.join("carrot-survivors").join("config.ron"));
    }
    paths
}

/// Parse a config from RON text. Split out from `load_config` so tests can
/// feed it strings instead of files.
pub fn parse_config(contents: &str) -> Result<GameConfig, ron::error::SpannedError> {
    ron::from_str::<GameConfig>(contents).map(GameConfig::sanitized)
}

/// Where the active config came from. `load_config` runs before logging is
/// up, so it records the outcome here and `log_config_source` reports it
/// once the App is running.
#[derive(Resource, Debug, Clone, PartialEq)]
pub enum ConfigSource {
    File(PathBuf),
    Defaults,
    Unreadable { path: PathBuf, reason: String },
}

/// Reads the first config.ron we can find, or returns defaults.
///
/// A broken file is skipped rather than treated as fatal, the same way a
/// corrupted save would be.
pub fn load_config() -> (GameConfig, ConfigSource) {
    for path in config_file_paths() {
        if !path.exists() {
            continue;
        }

        let contents = match std::fs::read_to_string(&path) {
            Ok(contents) => contents,
            Err(e) => {
                return (
                    GameConfig::default(),
                    ConfigSource::Unreadable { path, reason: e.to_string() },
                );
            }
        };

        return match parse_config(&contents) {
            Ok(config) => (config, ConfigSource::File(path)),
            Err(e) => (
                GameConfig::default(),
                ConfigSource::Unreadable { path, reason: e.to_string() },
            ),
        };
    }

    (GameConfig::default(), ConfigSource::Defaults)
}

/// Inserts the already-loaded config as Resources.
pub struct ConfigPlugin {
    pub config: GameConfig,
    pub source: ConfigSource,
}

impl Plugin for ConfigPlugin {
    fn build(&self, app: &mut App) {
        app.insert_resource(self.config.clone())
            .insert_resource(self.source.clone())
            .add_systems(Startup, log_config_source);
    }
}

fn log_config_source(source: Res<ConfigSource>) {
    match source.as_ref() {
        ConfigSource::File(path) => info!("Loaded config from {:?}", path),
        ConfigSource::Defaults => info!("No config.ron found. Using defaults."),
        ConfigSource::Unreadable { path, reason } => {
            warn!("Failed to load {:?}: {}. Using defaults.", path, reason)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_config_is_all_defaults() {
        let config = parse_config("()").unwrap();
        assert_eq!(config, GameConfig::default());
    }

    #[test]
    fn partial_config_overrides_only_named_fields() {
        let config = parse_config("(spawner: (base_interval: 3.0), audio: (effects_volume_percent: 40))")
            .unwrap();
        assert!((config.spawner.base_interval - 3.0).abs() < 0.001);
        assert!((config.spawner.min_interval - 0.4).abs() < 0.001);
        assert_eq!(config.audio.effects_volume_percent, 40);
        assert_eq!(config.player, PlayerConfig::default());
    }

    #[test]
    fn out_of_range_values_are_sanitized() {
        let config = parse_config(
            "(audio: (effects_volume_percent: 250), progression: (growth_factor: 0.5, initial_threshold: 0))",
        )
        .unwrap();
        assert_eq!(config.audio.effects_volume_percent, 100);
        assert!((config.progression.growth_factor - 1.0).abs() < 0.001);
        assert_eq!(config.progression.initial_threshold, 1);
    }

    #[test]
    fn negative_durations_are_clamped_to_zero() {
        let config = parse_config(
            "(combat: (stagger_secs: -1.0, carrot_lifetime_secs: -0.5, carrot_cooldown_secs: -2.0, \
             lightning_cooldown_secs: -3.0, slam_cooldown_factor: -1.0))",
        )
        .unwrap();
        assert_eq!(config.combat.stagger_secs, 0.0);
        assert_eq!(config.combat.carrot_lifetime_secs, 0.0);
        assert_eq!(config.combat.carrot_cooldown_secs, 0.0);
        assert_eq!(config.combat.lightning_cooldown_secs, 0.0);
        assert_eq!(config.combat.slam_cooldown_factor, 0.0);
        // Untouched values keep their defaults
        assert_eq!(config.combat.knockback_distance, CombatConfig::default().knockback_distance);
        // Safe to hand to a Timer now
        let _ = Timer::from_seconds(config.combat.stagger_secs, TimerMode::Once);
    }

    #[test]
    fn shipped_config_parses() {
        let config = parse_config(include_str!("../config.ron")).unwrap();
        assert_eq!(config.world.map_path, "maps/arena.lua");
        assert_eq!(config.progression.boss_level, 5);
    }

    #[test]
    fn malformed_config_is_an_error() {
        assert!(parse_config("(spawner: (base_interval: \"fast\"))").is_err());
    }
}

use std::collections::{HashMap, HashSet};

use bevy::{asset::LoadState, audio::Volume, prelude::*};

use crate::{config::GameConfig, game_state::AppState};

pub struct AudioPlugin;

impl Plugin for AudioPlugin {
    fn build(&self, app: &mut App) {
        app.add_systems(Startup, setup_audio)
            .add_systems(
                Update,
                volume_keys_system
                    .run_if(resource_exists::<SoundSettings>)
                    .run_if(in_state(AppState::Menu).or(in_state(AppState::Paused))),
            )
            .add_observer(on_play_sound);
    }
}

/// Every sound the game can make. Each maps to one file under assets/audio/.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub enum SoundEffect {
    Swing,
    Slam,
    Hit,
    CriticalHit,
    EnemyDeath,
    PlayerHurt,
    Dodge,
    Pickup,
    LevelUp,
    Select,
    Carrot,
    Lightning,
    GameOver,
}

impl SoundEffect {
    pub const ALL: [SoundEffect; 13] = [
        Self::Swing,
        Self::Slam,
        Self::Hit,
        Self::CriticalHit,
        Self::EnemyDeath,
        Self::PlayerHurt,
        Self::Dodge,
        Self::Pickup,
        Self::LevelUp,
        Self::Select,
        Self::Carrot,
        Self::Lightning,
        Self::GameOver,
    ];

    pub fn path(&self) -> &'static str {
        match self {
            Self::Swing => "audio/swing.wav",
            Self::Slam => "audio/slam.wav",
            Self::Hit => "audio/hit.wav",
            Self::CriticalHit => "audio/crit.wav",
            Self::EnemyDeath => "audio/enemy_death.wav",
            Self::PlayerHurt => "audio/player_hurt.wav",
            Self::Dodge => "audio/dodge.wav",
            Self::Pickup => "audio/pickup.wav",
            Self::LevelUp => "audio/level_up.wav",
            Self::Select => "audio/select.wav",
            Self::Carrot => "audio/carrot.wav",
            Self::Lightning => "audio/lightning.wav",
            Self::GameOver => "audio/game_over.wav",
        }
    }
}

/// Trigger with `commands.trigger(PlaySound(SoundEffect::Hit))`.
#[derive(Event, Clone, Copy, Debug)]
pub struct PlaySound(pub SoundEffect);

/// Effects volume, adjusted at runtime with the - and = keys.
#[derive(Resource, Debug, Clone, Copy, PartialEq, Eq)]
pub struct SoundSettings {
    pub effects_volume_percent: u8,
}

impl SoundSettings {
    pub const STEP: u8 = 10;

    pub fn set_volume(&mut self, percent: u8) {
        self.effects_volume_percent = percent.min(100);
    }

    pub fn louder(&mut self) {
        self.set_volume(self.effects_volume_percent.saturating_add(Self::STEP));
    }

    pub fn quieter(&mut self) {
        self.set_volume(self.effects_volume_percent.saturating_sub(Self::STEP));
    }

    /// Linear gain for PlaybackSettings
    pub fn volume_multiplier(&self) -> f32 {
        self.effects_volume_percent.min(100) as f32 / 100.0
    }
}

/// Pre-loaded sound handles.
///
/// A missing or broken file is not fatal. The first time it is asked for we
/// log a warning and remember it; after that it is skipped silently.
#[derive(Resource)]
pub struct GameAudio {
    /// Handle<T> is Bevy's way of referencing assets.
    handles: HashMap<SoundEffect, Handle<AudioSource>>,
    unavailable: HashSet<SoundEffect>,
}

impl GameAudio {
    /// Returns true only the first time a given effect is reported missing.
    fn mark_unavailable(&mut self, effect: SoundEffect) -> bool {
        self.unavailable.insert(effect)
    }
}

pub fn setup_audio(mut commands: Commands, asset_server: Res<AssetServer>, config: Res<GameConfig>) {
    // asset_server.load() returns immediately with a Handle that will be
    // valid once loading completes in the background.
    let handles = SoundEffect::ALL
        .iter()
        .map(|effect| (*effect, asset_server.load(effect.path())))
        .collect();

    commands.insert_resource(GameAudio {
        handles,
        unavailable: HashSet::new(),
    });
    commands.insert_resource(SoundSettings {
        effects_volume_percent: config.audio.effects_volume_percent.min(100),
    });
}

pub fn on_play_sound(
    trigger: On<PlaySound>,
    mut commands: Commands,
    audio: Option<ResMut<GameAudio>>,
    settings: Option<Res<SoundSettings>>,
    asset_server: Res<AssetServer>,
) {
    let (Some(mut audio), Some(settings)) = (audio, settings) else {
        return;
    };
    let effect = trigger.0;
    if audio.unavailable.contains(&effect) {
        return;
    }
    let Some(handle) = audio.handles.get(&effect).cloned() else {
        return;
    };

    if let LoadState::Failed(err) = asset_server.load_state(handle.id()) {
        if audio.mark_unavailable(effect) {
            warn!("Sound {:?} ({}) is unavailable: {}", effect, effect.path(), err);
        }
        return;
    }

    if settings.effects_volume_percent == 0 {
        return;
    }

    // DESPAWN cleans up the entity once playback finishes.
    // Volume::Linear: 1.0 = original volume, 0.5 = half.
    commands.spawn((
        AudioPlayer::new(handle),
        PlaybackSettings::DESPAWN.with_volume(Volume::Linear(settings.volume_multiplier())),
    ));
}

/// - and = nudge the effects volume by 10%.
pub fn volume_keys_system(
    keys: Res<ButtonInput<KeyCode>>,
    mut settings: ResMut<SoundSettings>,
    mut commands: Commands,
) {
    let before = *settings;
    if keys.just_pressed(KeyCode::Minus) {
        settings.quieter();
    }
    if keys.just_pressed(KeyCode::Equal) {
        settings.louder();
    }
    if *settings != before {
        info!("Effects volume {}%", settings.effects_volume_percent);
        commands.trigger(PlaySound(SoundEffect::Select));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn volume_steps_are_clamped() {
        let mut settings = SoundSettings {
            effects_volume_percent: 95,
        };
        settings.louder();
        assert_eq!(settings.effects_volume_percent, 100);
        settings.louder();
        assert_eq!(settings.effects_volume_percent, 100);

        settings.effects_volume_percent = 5;
        settings.quieter();
        assert_eq!(settings.effects_volume_percent, 0);
        assert_eq!(settings.volume_multiplier(), 0.0);
    }

    #[test]
    fn every_effect_has_its_own_file() {
        let paths: HashSet<_> = SoundEffect::ALL.iter().map(|e| e.path()).collect();
        assert_eq!(paths.len(), SoundEffect::ALL.len());
    }

    #[test]
    fn missing_sound_is_reported_once() {
        let mut audio = GameAudio {
            handles: HashMap::new(),
            unavailable: HashSet::new(),
        };
        assert!(audio.mark_unavailable(SoundEffect::Hit));
        assert!(!audio.mark_unavailable(SoundEffect::Hit));
        assert!(audio.mark_unavailable(SoundEffect::Swing));
    }
}

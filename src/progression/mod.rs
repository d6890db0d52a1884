//! Experience, level-ups and the upgrade offer state machine.
//!
//! `UpgradeManager` holds all of the rules and none of the ECS plumbing, so
//! it can be driven directly from tests. The plugin feeds it orb pickups,
//! switches to `AppState::LevelUp` while a choice is open, and applies the
//! chosen upgrade to the player.

pub mod upgrades;

use bevy::prelude::*;
use rand::Rng;

use crate::{
    audio::{PlaySound, SoundEffect},
    config::{GameConfig, ProgressionConfig},
    game_state::AppState,
    health::Health,
    pickups::OrbCollected,
    player::{Player, PlayerStats},
    spawner::BossSpawnRequested,
    ui::UpgradeCard,
};
use upgrades::{UpgradeId, UpgradePool};

pub struct ProgressionPlugin;

impl Plugin for ProgressionPlugin {
    fn build(&self, app: &mut App) {
        app.init_resource::<UpgradePool>()
            .add_systems(Startup, reset_progression)
            .add_systems(OnExit(AppState::Menu), reset_progression)
            .add_systems(
                Update,
                select_upgrade_system.run_if(in_state(AppState::LevelUp)),
            )
            .add_observer(on_orb_collected);
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ProgressionPhase {
    Accumulating,
    OfferingChoice { options: Vec<UpgradeId> },
}

/// What a call into the manager set off, for the caller to act on.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ProgressEvents {
    pub leveled_up: bool,
    pub spawn_boss: bool,
}

#[derive(Resource, Debug, Clone)]
pub struct UpgradeManager {
    pub level: u32,
    /// Pickups collected since the last level-up
    pub experience: u32,
    /// Pickups needed for the next level-up
    pub threshold: u32,
    pub kills: u32,
    pub boss_spawned: bool,
    /// Every upgrade taken this run, in order
    pub history: Vec<UpgradeId>,
    pub phase: ProgressionPhase,
    growth_factor: f32,
    offer_count: usize,
    boss_level: u32,
}

impl UpgradeManager {
    pub fn new(config: &ProgressionConfig) -> Self {
        Self {
            level: 1,
            experience: 0,
            threshold: config.initial_threshold.max(1),
            kills: 0,
            boss_spawned: false,
            history: Vec::new(),
            phase: ProgressionPhase::Accumulating,
            growth_factor: config.growth_factor.max(1.0),
            offer_count: config.offer_count.max(1),
            boss_level: config.boss_level,
        }
    }

    /// Multiplies and rounds, but always grows by at least one so a growth
    /// factor of 1.0 can't make level-ups free.
    pub fn next_threshold(current: u32, growth_factor: f32) -> u32 {
        let grown = (current as f32 * growth_factor).round() as u32;
        grown.max(current + 1)
    }

    pub fn is_offering(&self) -> bool {
        matches!(self.phase, ProgressionPhase::OfferingChoice { .. })
    }

    pub fn options(&self) -> &[UpgradeId] {
        match &self.phase {
            ProgressionPhase::OfferingChoice { options } => options,
            ProgressionPhase::Accumulating => &[],
        }
    }

    /// 0.0..=1.0 towards the next level, for the HUD
    pub fn progress(&self) -> f32 {
        (self.experience as f32 / self.threshold as f32).clamp(0.0, 1.0)
    }

    pub fn times_taken(&self, id: UpgradeId) -> usize {
        self.history.iter().filter(|taken| **taken == id).count()
    }

    pub fn record_kill(&mut self) {
        self.kills += 1;
    }

    /// Bank experience. While a choice is open nothing else happens; the
    /// banked amount is checked again once the choice is made.
    pub fn add_experience(
        &mut self,
        amount: u32,
        pool: &UpgradePool,
        rng: &mut impl Rng,
    ) -> ProgressEvents {
        self.experience += amount;
        self.check_level_up(pool, rng)
    }

    /// Take option `index` from the open offer. Returns the chosen upgrade
    /// and whatever the banked experience set off afterwards. `None` if no
    /// offer is open or the index is out of range.
    pub fn select(
        &mut self,
        index: usize,
        pool: &UpgradePool,
        rng: &mut impl Rng,
    ) -> Option<(UpgradeId, ProgressEvents)> {
        let id = *self.options().get(index)?;
        self.history.push(id);
        self.phase = ProgressionPhase::Accumulating;
        let events = self.check_level_up(pool, rng);
        Some((id, events))
    }

    fn check_level_up(&mut self, pool: &UpgradePool, rng: &mut impl Rng) -> ProgressEvents {
        let mut events = ProgressEvents::default();

        while !self.is_offering() && self.experience >= self.threshold {
            self.experience -= self.threshold;
            self.level += 1;
            self.threshold = Self::next_threshold(self.threshold, self.growth_factor);
            events.leveled_up = true;

            if !self.boss_spawned && self.level >= self.boss_level {
                self.boss_spawned = true;
                events.spawn_boss = true;
            }

            // An empty offer means everything has been taken. The level
            // still counts, there is just nothing to choose.
            let options = pool.sample_offer(&self.history, self.offer_count, rng);
            if !options.is_empty() {
                self.phase = ProgressionPhase::OfferingChoice { options };
            }
        }

        events
    }
}

fn reset_progression(mut commands: Commands, config: Res<GameConfig>) {
    commands.insert_resource(UpgradeManager::new(&config.progression));
}

/// Log, sound, boss trigger and state switch for whatever just happened.
fn announce(
    events: ProgressEvents,
    manager: &UpgradeManager,
    pool: &UpgradePool,
    commands: &mut Commands,
    next_state: &mut NextState<AppState>,
) {
    if events.spawn_boss {
        info!("Level {} reached. The boss is coming.", manager.level);
        commands.trigger(BossSpawnRequested);
    }
    if events.leveled_up {
        info!("Level up! Now level {}, next at {}", manager.level, manager.threshold);
        commands.trigger(PlaySound(SoundEffect::LevelUp));
    }
    if manager.is_offering() {
        let names: Vec<&str> = manager
            .options()
            .iter()
            .filter_map(|id| pool.get(*id))
            .map(|upgrade| upgrade.name)
            .collect();
        info!("Offering upgrades: {}", names.join(", "));
        next_state.set(AppState::LevelUp);
    }
}

fn on_orb_collected(
    trigger: On<OrbCollected>,
    mut manager: ResMut<UpgradeManager>,
    pool: Res<UpgradePool>,
    mut commands: Commands,
    mut next_state: ResMut<NextState<AppState>>,
) {
    let mut rng = rand::thread_rng();
    let events = manager.add_experience(trigger.value, &pool, &mut rng);
    announce(events, &manager, &pool, &mut commands, &mut next_state);
}

const CHOICE_KEYS: [KeyCode; 9] = [
    KeyCode::Digit1,
    KeyCode::Digit2,
    KeyCode::Digit3,
    KeyCode::Digit4,
    KeyCode::Digit5,
    KeyCode::Digit6,
    KeyCode::Digit7,
    KeyCode::Digit8,
    KeyCode::Digit9,
];

fn select_upgrade_system(
    keys: Res<ButtonInput<KeyCode>>,
    cards: Query<(&Interaction, &UpgradeCard), Changed<Interaction>>,
    mut manager: ResMut<UpgradeManager>,
    pool: Res<UpgradePool>,
    mut player: Query<(&mut PlayerStats, &mut Health), With<Player>>,
    mut commands: Commands,
    mut next_state: ResMut<NextState<AppState>>,
) {
    let pressed_key = CHOICE_KEYS.iter().position(|key| keys.just_pressed(*key));
    let clicked_card = cards
        .iter()
        .find(|(interaction, _)| **interaction == Interaction::Pressed)
        .map(|(_, card)| card.0);
    let Some(index) = pressed_key.or(clicked_card) else {
        return;
    };

    let mut rng = rand::thread_rng();
    let Some((id, events)) = manager.select(index, &pool, &mut rng) else {
        return;
    };

    if let Some(upgrade) = pool.get(id) {
        info!("Picked {} ({})", upgrade.name, upgrade.rarity.label());
        if let Ok((mut stats, mut health)) = player.single_mut() {
            stats.apply(&upgrade.effect, &mut health);
        }
    }
    commands.trigger(PlaySound(SoundEffect::Select));

    announce(events, &manager, &pool, &mut commands, &mut next_state);
    if !manager.is_offering() {
        next_state.set(AppState::Playing);
    }
}

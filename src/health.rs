use bevy::prelude::*;

use crate::{
    audio::{PlaySound, SoundEffect},
    player::Player,
    shaders_lite::DamageTint,
};

pub struct HealthPlugin;

impl Plugin for HealthPlugin {
    fn build(&self, app: &mut App) {
        app.add_observer(on_damaged_event);
    }
}

/// Health component, shared by the player and every enemy.
#[derive(Component, Copy, Clone, Debug, PartialEq, Eq)]
pub struct Health {
    pub current: i32,
    pub max: i32,
}

/// What a single hit did. Only the hit that crosses from alive to dead
/// reports `Killed`, so a death is announced exactly once even when several
/// attacks land on the same frame.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum DamageOutcome {
    /// Already dead, or the hit had no damage in it
    Ignored,
    Wounded,
    Killed,
}

impl Health {
    pub fn new(amount: i32) -> Self {
        Health {
            current: amount,
            max: amount,
        }
    }

    pub fn take_damage(&mut self, damage: i32) -> DamageOutcome {
        if self.current <= 0 || damage <= 0 {
            return DamageOutcome::Ignored;
        }
        self.current -= damage;
        if self.current <= 0 {
            DamageOutcome::Killed
        } else {
            DamageOutcome::Wounded
        }
    }

    /// Heals up to max. Does nothing for the dead.
    pub fn heal(&mut self, amount: i32) {
        if self.current > 0 && amount > 0 {
            self.current = (self.current + amount).min(self.max);
        }
    }

    pub fn is_dead(&self) -> bool {
        self.current <= 0
    }

    /// 0.0..=1.0, for health bars
    pub fn fraction(&self) -> f32 {
        if self.max <= 0 {
            return 0.0;
        }
        (self.current.max(0) as f32 / self.max as f32).clamp(0.0, 1.0)
    }
}

/// Marker added on the killing blow. Systems filter with Without<Dying> so a
/// corpse waiting for its deferred despawn can't be hit, chase or bite.
#[derive(Component, Copy, Clone, PartialEq, Eq, Hash)]
pub struct Dying;

#[derive(Event)]
pub struct DamagedEvent {
    pub entity: Entity,
    pub amount: i32,
    pub critical: bool,
}

pub fn on_damaged_event(
    trigger: On<DamagedEvent>,
    mut commands: Commands,
    players: Query<(), With<Player>>,
) {
    let sound = if players.get(trigger.entity).is_ok() {
        SoundEffect::PlayerHurt
    } else if trigger.critical {
        SoundEffect::CriticalHit
    } else {
        SoundEffect::Hit
    };
    commands.trigger(PlaySound(sound));

    // try_insert: the entity may be despawned by the time this command runs
    // (the killing blow queues a despawn in the same frame).
    commands
        .entity(trigger.entity)
        .try_insert(DamageTint(Timer::from_seconds(0.08, TimerMode::Once)));
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn killing_blow_is_reported_once() {
        let mut health = Health::new(30);
        assert_eq!(health.take_damage(20), DamageOutcome::Wounded);
        assert_eq!(health.take_damage(20), DamageOutcome::Killed);
        assert_eq!(health.take_damage(20), DamageOutcome::Ignored);
        assert!(health.is_dead());
    }

    #[test]
    fn zero_damage_is_ignored() {
        let mut health = Health::new(10);
        assert_eq!(health.take_damage(0), DamageOutcome::Ignored);
        assert_eq!(health.current, 10);
    }

    #[test]
    fn heal_is_capped_and_skips_the_dead() {
        let mut health = Health::new(100);
        health.take_damage(30);
        health.heal(50);
        assert_eq!(health.current, 100);

        health.take_damage(200);
        health.heal(50);
        assert!(health.is_dead());
    }

    #[test]
    fn fraction_handles_overkill() {
        let mut health = Health::new(40);
        health.take_damage(10);
        assert!((health.fraction() - 0.75).abs() < 1e-6);
        health.take_damage(100);
        assert_eq!(health.fraction(), 0.0);
    }
}

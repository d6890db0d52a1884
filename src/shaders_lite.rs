use bevy::prelude::*;

pub struct ShadersLitePlugin;

impl Plugin for ShadersLitePlugin {
    fn build(&self, app: &mut App) {
        app.add_systems(
            Update,
            (
                on_add_damage_tint,
                damage_tint_system,
                on_add_flash,
                flash_system,
            ),
        );
    }
}

const DAMAGE_TINT: Color = Color::srgba(1.0, 0.55, 0.55, 1.0);
const DODGE_FLASH: Color = Color::srgba(0.8, 0.85, 1.0, 1.0);

/// The colour a sprite returns to once a tint wears off. Only placeholder
/// sprites carry one; everything else goes back to WHITE.
#[derive(Component, Copy, Clone, Debug, PartialEq)]
pub struct BaseColor(pub Color);

fn rest_color(base: Option<&BaseColor>) -> Color {
    base.map_or(Color::WHITE, |base| base.0)
}

/// Short red tint on anything that took damage.
#[derive(Component, Default)]
pub struct DamageTint(pub Timer);

pub fn on_add_damage_tint(mut query: Query<&mut Sprite, Added<DamageTint>>) {
    for mut sprite in query.iter_mut() {
        sprite.color = DAMAGE_TINT;
    }
}

pub fn damage_tint_system(
    mut commands: Commands,
    mut query: Query<(Entity, &mut Sprite, &mut DamageTint, Option<&BaseColor>)>,
    time: Res<Time>,
) {
    for (entity, mut sprite, mut damage_tint, base) in query.iter_mut() {
        damage_tint.0.tick(time.delta());
        if damage_tint.0.is_finished() {
            commands.entity(entity).try_remove::<DamageTint>();
            sprite.color = rest_color(base);
        }
    }
}

/// Same as DamageTint but pale blue. Shown on the player when a dodge roll
/// turns a bite into a miss, so "dodged" reads differently from "hurt".
#[derive(Component, Default)]
pub struct Flash(pub Timer);

pub fn on_add_flash(mut query: Query<&mut Sprite, Added<Flash>>) {
    for mut sprite in query.iter_mut() {
        sprite.color = DODGE_FLASH;
    }
}

pub fn flash_system(
    mut commands: Commands,
    mut query: Query<(Entity, &mut Sprite, &mut Flash, Option<&BaseColor>)>,
    time: Res<Time>,
) {
    for (entity, mut sprite, mut flash, base) in query.iter_mut() {
        flash.0.tick(time.delta());
        if flash.0.is_finished() {
            commands.entity(entity).try_remove::<Flash>();
            sprite.color = rest_color(base);
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    fn app() -> App {
        let mut app = App::new();
        app.add_plugins(MinimalPlugins).add_plugins(ShadersLitePlugin);
        app
    }

    #[test]
    fn damage_tint_is_applied_on_insert() {
        let mut app = app();
        let entity = app
            .world_mut()
            .spawn((Sprite::default(), DamageTint(Timer::from_seconds(10.0, TimerMode::Once))))
            .id();
        app.update();

        let sprite = app.world().get::<Sprite>(entity).unwrap();
        assert_eq!(sprite.color, DAMAGE_TINT);
    }

    #[test]
    fn finished_tint_restores_the_base_color() {
        let mut app = app();
        let magenta = Color::srgb(1.0, 0.0, 1.0);
        let mut timer = Timer::from_seconds(0.01, TimerMode::Once);
        timer.tick(Duration::from_secs(1));
        let entity = app
            .world_mut()
            .spawn((Sprite::default(), BaseColor(magenta), DamageTint(timer)))
            .id();
        app.update();

        let sprite = app.world().get::<Sprite>(entity).unwrap();
        assert_eq!(sprite.color, magenta);
        assert!(app.world().get::<DamageTint>(entity).is_none());
    }
}

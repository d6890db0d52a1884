//! The upgrade catalogue and the offer sampler.
//!
//! Upgrades are static game data, the same every run. They live in a Vec
//! inside the `UpgradePool` resource and are referred to by `UpgradeId`,
//! their index in that Vec.

use bevy::prelude::*;
use rand::{seq::SliceRandom, Rng};

/// Index into `UpgradePool::upgrades`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct UpgradeId(pub usize);

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Rarity {
    Common,
    Uncommon,
    Rare,
    Epic,
    Legendary,
}

impl Rarity {
    /// Relative chance of being offered. A Common upgrade is ten times as
    /// likely to show up as a Legendary one.
    pub fn weight(&self) -> f64 {
        match self {
            Rarity::Common => 10.0,
            Rarity::Uncommon => 6.0,
            Rarity::Rare => 3.0,
            Rarity::Epic => 2.0,
            Rarity::Legendary => 1.0,
        }
    }

    pub fn color(&self) -> Color {
        match self {
            Rarity::Common => Color::srgb_u8(200, 200, 200),
            Rarity::Uncommon => Color::srgb_u8(100, 255, 100),
            Rarity::Rare => Color::srgb_u8(100, 100, 255),
            Rarity::Epic => Color::srgb_u8(200, 100, 255),
            Rarity::Legendary => Color::srgb_u8(255, 200, 100),
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Rarity::Common => "Common",
            Rarity::Uncommon => "Uncommon",
            Rarity::Rare => "Rare",
            Rarity::Epic => "Epic",
            Rarity::Legendary => "Legendary",
        }
    }
}

/// How often an upgrade may be taken in one run.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Availability {
    Repeatable,
    /// Once per run
    Unique,
    /// At most this many times per run
    Limited(u32),
}

/// What picking the upgrade does to the player.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum UpgradeEffect {
    MaxHealth(i32),
    Speed(f32),
    AttackDamage(i32),
    /// Milliseconds taken off the swing cooldown
    AttackCooldown(u32),
    AttackSize(f32),
    /// Health restored per kill
    Vampirism(i32),
    CriticalChance(f32),
    DodgeChance(f32),
    ExplosiveAttack,
    Knockback,
    PiercingCarrots,
    Lightning,
    ExtraProjectile,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Upgrade {
    pub id: UpgradeId,
    pub name: &'static str,
    pub description: &'static str,
    pub rarity: Rarity,
    pub availability: Availability,
    pub effect: UpgradeEffect,
}

#[derive(Resource, Debug, Clone)]
pub struct UpgradePool {
    pub upgrades: Vec<Upgrade>,
}

impl UpgradePool {
    pub fn empty() -> Self {
        Self { upgrades: Vec::new() }
    }

    /// Add an upgrade and return its ID
    pub fn add(
        &mut self,
        name: &'static str,
        description: &'static str,
        rarity: Rarity,
        availability: Availability,
        effect: UpgradeEffect,
    ) -> UpgradeId {
        let id = UpgradeId(self.upgrades.len());
        self.upgrades.push(Upgrade {
            id,
            name,
            description,
            rarity,
            availability,
            effect,
        });
        id
    }

    /// Look up an upgrade by ID
    pub fn get(&self, id: UpgradeId) -> Option<&Upgrade> {
        self.upgrades.get(id.0)
    }

    /// Can this upgrade still be offered, given everything taken so far?
    pub fn is_available(&self, upgrade: &Upgrade, history: &[UpgradeId]) -> bool {
        let taken = history.iter().filter(|id| **id == upgrade.id).count() as u32;
        match upgrade.availability {
            Availability::Repeatable => true,
            Availability::Unique => taken == 0,
            Availability::Limited(max) => taken < max,
        }
    }

    pub fn eligible<'a>(&'a self, history: &'a [UpgradeId]) -> impl Iterator<Item = &'a Upgrade> + 'a {
        self.upgrades
            .iter()
            .filter(move |upgrade| self.is_available(upgrade, history))
    }

    /// Draw up to `count` distinct eligible upgrades, weighted by rarity.
    ///
    /// Sampling is without replacement, so one offer never shows the same
    /// card twice. If fewer than `count` upgrades are eligible, all of them
    /// are offered.
    pub fn sample_offer(
        &self,
        history: &[UpgradeId],
        count: usize,
        rng: &mut impl Rng,
    ) -> Vec<UpgradeId> {
        let eligible: Vec<&Upgrade> = self.eligible(history).collect();
        let count = count.min(eligible.len());
        match eligible.choose_multiple_weighted(rng, count, |upgrade| upgrade.rarity.weight()) {
            Ok(chosen) => chosen.map(|upgrade| upgrade.id).collect(),
            // Only fails on bad weights, and every rarity weight is positive
            Err(_) => eligible.iter().take(count).map(|upgrade| upgrade.id).collect(),
        }
    }
}

impl Default for UpgradePool {
    fn default() -> Self {
        use Availability::*;
        use Rarity::*;
        use UpgradeEffect::*;

        let mut pool = Self::empty();

        pool.add("Iron Heart", "+25 max health", Common, Repeatable, MaxHealth(25));
        pool.add("Titanium Heart", "+50 max health", Uncommon, Repeatable, MaxHealth(50));
        pool.add("Divine Heart", "+100 max health", Rare, Repeatable, MaxHealth(100));

        pool.add("Quick Feet", "+30 movement speed", Common, Repeatable, Speed(30.0));
        pool.add("Wind Stride", "+60 movement speed", Uncommon, Repeatable, Speed(60.0));
        pool.add("Lightning Legs", "+120 movement speed", Rare, Repeatable, Speed(120.0));

        pool.add("Sharp Blade", "+5 attack damage", Common, Repeatable, AttackDamage(5));
        pool.add("Blood Blade", "+10 attack damage", Uncommon, Repeatable, AttackDamage(10));
        pool.add("Excalibur", "+20 attack damage", Rare, Repeatable, AttackDamage(20));

        pool.add("Quick Hand", "Attack 100ms faster", Common, Repeatable, AttackCooldown(100));
        pool.add("Sword Master", "Attack 200ms faster", Uncommon, Repeatable, AttackCooldown(200));
        pool.add("Berserker", "Attack 300ms faster", Rare, Repeatable, AttackCooldown(300));

        pool.add("Long Sword", "+10% attack size", Common, Repeatable, AttackSize(0.1));
        pool.add("Giant Blade", "+20% attack size", Uncommon, Repeatable, AttackSize(0.2));
        pool.add("Cosmic Sword", "+50% attack size", Rare, Repeatable, AttackSize(0.5));

        pool.add("Vampirism", "Heal 5 on every kill", Epic, Unique, Vampirism(5));
        pool.add("Critical Strike", "20% chance to deal double damage", Epic, Unique, CriticalChance(0.2));
        pool.add("Immortality", "10% chance to dodge a hit", Legendary, Unique, DodgeChance(0.1));
        pool.add("Explosive Attack", "Hits splash half damage nearby", Legendary, Unique, ExplosiveAttack);
        pool.add("Heavy Blows", "Hits knock enemies back", Epic, Unique, Knockback);
        pool.add("Piercing Carrots", "Throw carrots automatically", Legendary, Unique, PiercingCarrots);
        pool.add("Storm Caller", "Lightning strikes the nearest enemy", Legendary, Unique, Lightning);

        pool.add("Extra Carrot", "+1 carrot per throw", Rare, Limited(3), ExtraProjectile);

        pool
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use rand::{rngs::StdRng, SeedableRng};

    use super::*;

    fn find(pool: &UpgradePool, name: &str) -> UpgradeId {
        pool.upgrades
            .iter()
            .find(|u| u.name == name)
            .map(|u| u.id)
            .unwrap()
    }

    #[test]
    fn ids_match_positions() {
        let pool = UpgradePool::default();
        assert_eq!(pool.upgrades.len(), 23);
        for (index, upgrade) in pool.upgrades.iter().enumerate() {
            assert_eq!(upgrade.id, UpgradeId(index));
            assert_eq!(pool.get(upgrade.id), Some(upgrade));
        }
    }

    #[test]
    fn unique_upgrade_disappears_once_taken() {
        let pool = UpgradePool::default();
        let vampirism = find(&pool, "Vampirism");
        let history = vec![vampirism];
        assert!(pool.eligible(&history).all(|u| u.id != vampirism));
        assert!(pool.eligible(&[]).any(|u| u.id == vampirism));
    }

    #[test]
    fn limited_upgrade_allows_its_count() {
        let pool = UpgradePool::default();
        let extra = find(&pool, "Extra Carrot");
        let upgrade = pool.get(extra).unwrap();
        assert!(pool.is_available(upgrade, &[extra, extra]));
        assert!(!pool.is_available(upgrade, &[extra, extra, extra]));
    }

    #[test]
    fn offers_are_distinct() {
        let pool = UpgradePool::default();
        let mut rng = StdRng::seed_from_u64(7);
        for _ in 0..200 {
            let offer = pool.sample_offer(&[], 3, &mut rng);
            assert_eq!(offer.len(), 3);
            let distinct: HashSet<_> = offer.iter().collect();
            assert_eq!(distinct.len(), 3);
        }
    }

    #[test]
    fn small_pool_offers_everything_left() {
        let mut pool = UpgradePool::empty();
        let a = pool.add("A", "", Rarity::Common, Availability::Unique, UpgradeEffect::Knockback);
        let b = pool.add("B", "", Rarity::Epic, Availability::Repeatable, UpgradeEffect::Speed(1.0));
        let mut rng = StdRng::seed_from_u64(1);

        let mut offer = pool.sample_offer(&[], 3, &mut rng);
        offer.sort();
        assert_eq!(offer, vec![a, b]);

        assert_eq!(pool.sample_offer(&[a], 3, &mut rng), vec![b]);
    }

    #[test]
    fn rarity_weights_show_up_in_offers() {
        let mut pool = UpgradePool::empty();
        let common = pool.add("C", "", Rarity::Common, Availability::Repeatable, UpgradeEffect::Speed(1.0));
        pool.add("L", "", Rarity::Legendary, Availability::Repeatable, UpgradeEffect::Speed(2.0));
        let mut rng = StdRng::seed_from_u64(42);

        let trials = 2000;
        let commons = (0..trials)
            .filter(|_| pool.sample_offer(&[], 1, &mut rng) == vec![common])
            .count();
        // Expected share is 10/11, about 1818 of 2000
        assert!(commons > 1650, "common offered {} times", commons);
    }
}

/*!
 * Game Character
 *
 * Health and armor are hammered from many threads without a lock.
 * Every mutation is a single atomic read-modify-write, except `empower`,
 * which runs its own compare-and-swap retry loop.
 */

use crate::core::sync::{AtomicCell, EscalationPolicy, SpinWait, SwapCell};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::thread;
use tracing::{info, trace};

pub const STARTING_HEALTH: i32 = 100;

/// Threads doubling the champion's armor at once
const EMPOWER_ROUNDS: u32 = 8;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Weapon {
    pub name: String,
    pub damage: i32,
}

impl Weapon {
    pub fn new(name: impl Into<String>, damage: i32) -> Self {
        Self {
            name: name.into(),
            damage,
        }
    }

    pub fn fists() -> Self {
        Self::new("fists", 1)
    }
}

#[derive(Debug)]
pub struct Character {
    health: AtomicCell<i32>,
    armor: AtomicCell<i32>,
    weapon: SwapCell<Weapon>,
}

impl Character {
    pub fn new() -> Self {
        Self {
            health: AtomicCell::new(STARTING_HEALTH),
            armor: AtomicCell::new(0),
            weapon: SwapCell::new(Weapon::fists()),
        }
    }

    pub fn health(&self) -> i32 {
        self.health.load()
    }

    pub fn armor(&self) -> i32 {
        self.armor.load()
    }

    /// Take `damage` reduced by current armor; returns the new health
    pub fn hit(&self, damage: i32) -> i32 {
        let absorbed = (damage - self.armor.load()).max(0);
        self.health.add(-absorbed) - absorbed
    }

    /// Returns the new health
    pub fn heal(&self, amount: i32) -> i32 {
        self.health.add(amount) + amount
    }

    /// Raise or lower armor by one; returns the new armor
    pub fn cast_armor_spell(&self, positive: bool) -> i32 {
        if positive {
            self.armor.increment()
        } else {
            self.armor.decrement()
        }
    }

    /// Multiply armor by `factor` atomically; returns the new armor
    pub fn empower(&self, factor: i32) -> i32 {
        self.empower_with(factor, &EscalationPolicy::default())
    }

    /// [`empower`](Self::empower), backing off between retries per `policy`
    pub fn empower_with(&self, factor: i32, policy: &EscalationPolicy) -> i32 {
        let mut spinner = SpinWait::with_policy(*policy);
        loop {
            let snapshot = self.armor.load();
            let boosted = snapshot.wrapping_mul(factor);
            if self.armor.compare_and_swap(snapshot, boosted) {
                return boosted;
            }
            trace!(attempt = spinner.count(), "armor changed underneath, retrying");
            spinner.spin_once();
        }
    }

    /// Swap in a new weapon; returns the one put down
    pub fn equip(&self, weapon: Weapon) -> Arc<Weapon> {
        self.weapon.swap(weapon)
    }

    pub fn weapon(&self) -> Arc<Weapon> {
        self.weapon.load()
    }
}

impl Default for Character {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CharacterReport {
    pub armor: i32,
    pub health: i32,
    pub weapon: Weapon,
    /// Armor of a second character after concurrent doublings from 1
    pub empowered_armor: i32,
}

/// `pairs` threads raise armor while as many lower it, `casts` times each
///
/// Armor ends exactly where it started; health takes matching hits and
/// heals, so it does too. A second character then has its armor doubled
/// from several threads at once, retrying under `policy`.
pub fn armor_storm(pairs: usize, casts: usize, policy: &EscalationPolicy) -> CharacterReport {
    let character = Character::new();

    thread::scope(|scope| {
        for i in 0..pairs {
            let character = &character;
            scope.spawn(move || {
                for _ in 0..casts {
                    character.cast_armor_spell(true);
                }
            });
            scope.spawn(move || {
                for _ in 0..casts {
                    character.cast_armor_spell(false);
                }
            });
            scope.spawn(move || {
                character.heal(5);
                character.health.add(-5);
                if i == 0 {
                    character.equip(Weapon::new("sword", 12));
                }
            });
        }
    });

    let champion = Character::new();
    champion.cast_armor_spell(true);
    thread::scope(|scope| {
        for _ in 0..EMPOWER_ROUNDS {
            scope.spawn(|| champion.empower_with(2, policy));
        }
    });

    let report = CharacterReport {
        armor: character.armor(),
        health: character.health(),
        weapon: (*character.weapon()).clone(),
        empowered_armor: champion.armor(),
    };
    info!(
        armor = report.armor,
        health = report.health,
        weapon = %report.weapon.name,
        empowered_armor = report.empowered_armor,
        "armor storm settled"
    );
    report
}

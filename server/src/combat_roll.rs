use rand::Rng;

use crate::{ability::AbilityDefinition, combatant::Weapon, config::CombatConfig};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct AttackRoll {
    pub hit: bool,
    pub damage: i32,
    pub critical: bool,
    pub bashing: bool,
}

pub fn hit_chance(config: &CombatConfig, attack: i32, defense: i32) -> i32 {
    (config.base_hit_chance + (attack - defense) * config.hit_chance_per_point)
        .clamp(config.min_hit_chance, config.max_hit_chance)
}

/// Each point of attack over defense adds 5% to the rolled damage, each point
/// under takes 5% off, within a quarter and triple of the roll.
pub fn scale_damage(base: i32, attack: i32, defense: i32) -> i32 {
    let percent = (100 + 5 * (attack - defense)).clamp(25, 300);
    (base * percent / 100).max(1)
}

fn roll_range(rng: &mut impl Rng, min: i32, max: i32) -> i32 {
    let (low, high) = if min <= max { (min, max) } else { (max, min) };
    rng.gen_range(low..=high)
}

/// Hit roll, then damage, then (unless bashing) the crit roll. Bashing
/// multiplies damage but never crits; it does not change the hit chance.
pub fn roll_weapon_attack(
    rng: &mut impl Rng,
    config: &CombatConfig,
    attack: i32,
    weapon: &Weapon,
    defense: i32,
    bashing: bool,
) -> AttackRoll {
    let hit = rng.gen_range(0..100) < hit_chance(config, attack, defense);
    if !hit {
        return AttackRoll { hit, damage: 0, critical: false, bashing };
    }
    let mut damage =
        scale_damage(roll_range(rng, weapon.min_damage, weapon.max_damage), attack, defense);
    let critical = !bashing && rng.gen_bool(config.crit_chance.clamp(0.0, 1.0));
    if bashing {
        damage *= config.bash_multiplier;
    }
    if critical {
        damage *= config.crit_multiplier;
    }
    AttackRoll { hit, damage, critical, bashing }
}

/// Channelled abilities always land; only the crit is rolled.
pub fn roll_ability(rng: &mut impl Rng, definition: &AbilityDefinition) -> (i32, bool) {
    let damage = roll_range(rng, definition.min_damage, definition.max_damage).max(0);
    let critical = rng.gen_bool(definition.crit_chance.clamp(0.0, 1.0));
    (if critical { damage * 2 } else { damage }, critical)
}

use std::collections::BTreeMap;

use serde::Deserialize;

use crate::{combat_error::CombatRefusal, named::Named, player::Player, tick::Tick};

#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AbilityDefinition {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub aliases: Vec<String>,
    pub mp_cost_per_round: i32,
    pub duration_rounds: u32,
    #[serde(default)]
    pub cooldown_rounds: u32,
    #[serde(default = "default_min_level")]
    pub min_level: u32,
    pub min_damage: i32,
    pub max_damage: i32,
    /// Independent of weapon crits, so bash rules never apply here.
    #[serde(default)]
    pub crit_chance: f64,
}

fn default_min_level() -> u32 {
    1
}

impl Named for AbilityDefinition {
    fn get_name(&self) -> &str {
        &self.name
    }

    fn get_aliases(&self) -> &[String] {
        &self.aliases
    }
}

#[derive(Clone, Debug, Default)]
pub struct AbilityCatalog {
    by_id: BTreeMap<String, AbilityDefinition>,
}

impl AbilityCatalog {
    pub fn new(definitions: Vec<AbilityDefinition>) -> AbilityCatalog {
        AbilityCatalog {
            by_id: definitions.into_iter().map(|def| (def.id.clone(), def)).collect(),
        }
    }

    pub fn get(&self, id: &str) -> Option<&AbilityDefinition> {
        self.by_id.get(id)
    }

    /// Resolves what a player typed: exact id, then name or alias, then prefix.
    pub fn find(&self, str: &str) -> Option<&AbilityDefinition> {
        self.by_id
            .get(&str.to_ascii_lowercase())
            .or_else(|| self.by_id.values().find(|def| def.matches(str)))
            .or_else(|| self.by_id.values().find(|def| def.matches_prefix(str)))
    }
}

/// A channelled ability standing in for a combatant's weapon swing.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AbilityActivation {
    pub ability_id: String,
    pub remaining_rounds: u32,
    pub mp_cost_per_round: i32,
}

impl AbilityActivation {
    pub fn new(definition: &AbilityDefinition, duration_rounds: Option<u32>) -> AbilityActivation {
        AbilityActivation {
            ability_id: definition.id.clone(),
            remaining_rounds: duration_rounds.unwrap_or(definition.duration_rounds).max(1),
            mp_cost_per_round: definition.mp_cost_per_round,
        }
    }

    /// Mana to take if the ability lands this round, or `None` when the caster
    /// is dry and should swing their weapon instead. The last cast drains
    /// whatever is left rather than requiring the full cost.
    pub fn charge_for(&self, mana: i32) -> Option<i32> {
        if self.mp_cost_per_round <= 0 {
            Some(0)
        } else if mana > 0 {
            Some(self.mp_cost_per_round.min(mana))
        } else {
            None
        }
    }

    /// Returns true once the activation has run out.
    pub fn count_down(&mut self) -> bool {
        self.remaining_rounds = self.remaining_rounds.saturating_sub(1);
        self.remaining_rounds == 0
    }
}

pub fn has_mana(player: &Player, cost: i32) -> bool {
    player.mana >= cost
}

pub fn can_use_ability(
    player: &Player,
    definition: &AbilityDefinition,
    now: Tick,
) -> Result<(), CombatRefusal> {
    if player.unconscious || player.hp <= 0 {
        Err(CombatRefusal::Incapacitated)
    } else if player.level < definition.min_level {
        Err(CombatRefusal::LevelTooLow(definition.name.clone()))
    } else if player.ability_ready_at.get(&definition.id).map_or(false, |ready| *ready > now) {
        Err(CombatRefusal::OnCooldown(definition.name.clone()))
    } else if definition.mp_cost_per_round > 0 && !has_mana(player, 1) {
        Err(CombatRefusal::InsufficientMana)
    } else {
        Ok(())
    }
}

use crate::config::CombatConfig;

/// Action economy for one combatant while they are in a session.
///
/// A fresh tracker starts with exactly one threshold of energy so the opening
/// swing lands on the first round. Each round the owner first tries to pay for
/// an attack, then accrues their weapon speed. Leftover energy carries over.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EnergyTracker {
    energy: i32,
    is_bashing: bool,
}

#[derive(Clone, Copy, Debug)]
pub struct EnergyRules {
    pub threshold: i32,
    pub bash_multiplier: i32,
}

impl EnergyRules {
    pub fn from_config(config: &CombatConfig) -> EnergyRules {
        EnergyRules {
            threshold: config.energy_threshold.max(1),
            bash_multiplier: config.bash_multiplier.max(1),
        }
    }

    /// Enough headroom to save up for one bash, no more.
    fn cap(&self) -> i32 {
        self.threshold * self.bash_multiplier
    }
}

impl EnergyTracker {
    pub fn new(rules: EnergyRules) -> EnergyTracker {
        EnergyTracker { energy: rules.threshold, is_bashing: false }
    }

    pub fn energy(&self) -> i32 {
        self.energy
    }

    pub fn is_bashing(&self) -> bool {
        self.is_bashing
    }

    pub fn set_bashing(&mut self, bashing: bool) {
        self.is_bashing = bashing;
    }

    pub fn action_cost(&self, rules: EnergyRules) -> i32 {
        if self.is_bashing {
            rules.threshold * rules.bash_multiplier
        } else {
            rules.threshold
        }
    }

    /// Deducts the cost of one attack if there is enough energy banked.
    pub fn try_spend(&mut self, rules: EnergyRules) -> bool {
        let cost = self.action_cost(rules);
        if self.energy >= cost {
            self.energy -= cost;
            true
        } else {
            false
        }
    }

    pub fn accrue(&mut self, speed: i32, rules: EnergyRules) {
        self.energy = (self.energy + speed.max(0)).min(rules.cap());
    }
}

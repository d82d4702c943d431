use std::collections::BTreeMap;

use serde::Deserialize;

/// How an NPC picks among the players it is hostile to.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum TargetPolicy {
    /// Weakest first; ties go to whoever provoked it most recently.
    #[default]
    LowestHealth,
    MostRecent,
}

#[derive(Clone, Debug)]
struct AggressionEntry {
    /// Bumped every time the player provokes the NPC again.
    seq: u64,
    last_seen_round: u64,
}

/// A player the NPC could hit this round: present in its room and able to fight.
#[derive(Clone, Copy, Debug)]
pub struct Candidate<'a> {
    pub name: &'a str,
    pub hp: i32,
}

/// Usernames an NPC is hostile to. Keys are lowercase so a reconnecting
/// player maps onto the same entry.
#[derive(Clone, Debug, Default)]
pub struct AggressionTable {
    entries: BTreeMap<String, AggressionEntry>,
    next_seq: u64,
}

impl AggressionTable {
    pub fn new() -> AggressionTable {
        AggressionTable::default()
    }

    pub fn provoke(&mut self, name: &str, round: u64) {
        let seq = self.next_seq;
        self.next_seq += 1;
        self.entries
            .insert(name.to_ascii_lowercase(), AggressionEntry { seq, last_seen_round: round });
    }

    pub fn remove(&mut self, name: &str) -> bool {
        self.entries.remove(&name.to_ascii_lowercase()).is_some()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(&name.to_ascii_lowercase())
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> + '_ {
        self.entries.keys().map(|name| name.as_str())
    }

    /// Marks `present` as seen this round and forgets anyone who has been gone
    /// for more than `forget_after` rounds. Returns the forgotten names.
    pub fn refresh<'a>(
        &mut self,
        present: impl IntoIterator<Item = &'a str>,
        round: u64,
        forget_after: u64,
    ) -> Vec<String> {
        for name in present {
            if let Some(entry) = self.entries.get_mut(&name.to_ascii_lowercase()) {
                entry.last_seen_round = round;
            }
        }
        let forgotten = self
            .entries
            .iter()
            .filter(|(_, entry)| round.saturating_sub(entry.last_seen_round) > forget_after)
            .map(|(name, _)| name.clone())
            .collect::<Vec<_>>();
        for name in &forgotten {
            self.entries.remove(name);
        }
        forgotten
    }

    /// Picks a target among `candidates` that this NPC is hostile to. Anyone
    /// not listed (offline, elsewhere, knocked out) is never chosen.
    pub fn select_target<'a>(
        &self,
        policy: TargetPolicy,
        candidates: &[Candidate<'a>],
    ) -> Option<&'a str> {
        let eligible = candidates.iter().filter_map(|candidate| {
            self.entries
                .get(&candidate.name.to_ascii_lowercase())
                .map(|entry| (candidate, entry.seq))
        });
        let chosen = match policy {
            TargetPolicy::LowestHealth => eligible
                .min_by(|(a, a_seq), (b, b_seq)| a.hp.cmp(&b.hp).then(b_seq.cmp(a_seq))),
            TargetPolicy::MostRecent => eligible.max_by_key(|(_, seq)| *seq),
        };
        chosen.map(|(candidate, _)| candidate.name)
    }
}

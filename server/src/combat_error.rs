use thiserror::Error;

use crate::{combat_session::CombatSession, combatant::CombatantId, game_state::Room, id::Id};

/// An expected "no": the caller tells the player and moves on. The display
/// text is exactly what the player sees.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CombatRefusal {
    #[error("You can't fight here.")]
    SafeRoom,
    #[error("You do not see that here.")]
    TargetNotFound,
    #[error("You cannot attack {0}.")]
    NotHostile(String),
    #[error("You can't attack yourself.")]
    TargetIsSelf,
    #[error("{0} is already dead.")]
    TargetDead(String),
    #[error("You are in no shape to fight.")]
    Incapacitated,
    #[error("{0} whom?")]
    SpecifyTarget(&'static str),
    #[error("You aren't fighting anyone.")]
    NotInCombat,
    #[error("You don't know any ability called '{0}'.")]
    UnknownAbility(String),
    #[error("You aren't experienced enough to use {0}.")]
    LevelTooLow(String),
    #[error("You can't use {0} again yet.")]
    OnCooldown(String),
    #[error("You don't have enough mana.")]
    InsufficientMana,
}

/// Something the round resolver cannot reconcile. Confined to the session it
/// happened in; the session is torn down and the tick carries on.
#[derive(Debug, Error)]
pub enum CombatError {
    #[error("session {0:?} vanished mid-tick")]
    SessionMissing(Id<CombatSession>),
    #[error("session {session:?} is in room {room:?}, which does not exist")]
    RoomMissing { session: Id<CombatSession>, room: Id<Room> },
    #[error("{combatant} is indexed to session {session:?} but not listed in it")]
    IndexMismatch { session: Id<CombatSession>, combatant: CombatantId },
}

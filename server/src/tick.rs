use std::{ops::Add, time::Duration};

pub static TICK_INTERVAL: Duration = Duration::from_millis(1000 / TICKS_PER_SECOND as u64);
const TICKS_PER_SECOND: i64 = 8;

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Tick(i64);

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub struct TickDuration(i64);

impl Tick {
    pub fn zero() -> Tick {
        Tick(0)
    }

    pub fn is_on_division(&self, divide: TickDuration, offset: TickDuration) -> bool {
        self.0 % divide.0 == offset.0 % divide.0
    }

    pub fn increase(&self) -> Tick {
        Tick(self.0 + 1)
    }
}

impl TickDuration {
    pub fn zero() -> TickDuration {
        TickDuration(0)
    }

    /// Never shorter than one tick, so it is always safe to divide by.
    pub fn from_secs(secs: f32) -> TickDuration {
        TickDuration(((secs / TICK_INTERVAL.as_secs_f32()) as i64).max(1))
    }

    pub fn times(&self, count: u32) -> TickDuration {
        TickDuration(self.0 * count as i64)
    }
}

impl Add<TickDuration> for Tick {
    type Output = Tick;

    fn add(self, rhs: TickDuration) -> Self::Output {
        Tick(self.0 + rhs.0)
    }
}

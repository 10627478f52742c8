//! Two countdown timers, one running at a time.

use crate::types::{format_clock, Side};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument};

/// Period between clock ticks.
pub const TICK_PERIOD: std::time::Duration = std::time::Duration::from_secs(1);

/// Result of one clock tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    /// Clock not running; nothing happened.
    Idle,
    /// One second came off the active side.
    Running,
    /// The active side ran out of time.
    Expired {
        /// Side whose flag fell.
        loser: Side,
    },
}

/// Match clock.
///
/// `player_seconds` belongs to the human, `opponent_seconds` to the engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Clock {
    player_seconds: u32,
    opponent_seconds: u32,
    human_side: Side,
    active_side: Side,
    running: bool,
}

impl Clock {
    /// A stopped clock with `seconds` on both sides.
    pub fn new(seconds: u32, human_side: Side) -> Self {
        Self {
            player_seconds: seconds,
            opponent_seconds: seconds,
            human_side,
            active_side: Side::White,
            running: false,
        }
    }

    /// Human's remaining seconds.
    pub fn player_seconds(&self) -> u32 {
        self.player_seconds
    }

    /// Engine's remaining seconds.
    pub fn opponent_seconds(&self) -> u32 {
        self.opponent_seconds
    }

    /// Side whose time is running down.
    pub fn active_side(&self) -> Side {
        self.active_side
    }

    /// Whether ticks currently count.
    pub fn running(&self) -> bool {
        self.running
    }

    /// Remaining seconds for `side`.
    pub fn seconds_for(&self, side: Side) -> u32 {
        if side == self.human_side {
            self.player_seconds
        } else {
            self.opponent_seconds
        }
    }

    /// Human's clock as `m:ss`.
    pub fn player_display(&self) -> String {
        format_clock(self.player_seconds)
    }

    /// Engine's clock as `m:ss`.
    pub fn opponent_display(&self) -> String {
        format_clock(self.opponent_seconds)
    }

    /// Resets both sides and starts counting for `first_to_move`.
    #[instrument(skip(self))]
    pub fn start(&mut self, seconds: u32, human_side: Side, first_to_move: Side) {
        info!("Starting clock");
        *self = Self {
            player_seconds: seconds,
            opponent_seconds: seconds,
            human_side,
            active_side: first_to_move,
            running: true,
        };
    }

    /// Halts the clock without changing remaining time.
    pub fn stop(&mut self) {
        self.running = false;
    }

    /// Hands the running clock to `side`.
    pub fn switch_to(&mut self, side: Side) {
        self.active_side = side;
    }

    /// Takes one second off the active side.
    #[instrument(skip(self), fields(active = %self.active_side))]
    pub fn tick(&mut self) -> TickOutcome {
        if !self.running {
            return TickOutcome::Idle;
        }
        let remaining = if self.active_side == self.human_side {
            &mut self.player_seconds
        } else {
            &mut self.opponent_seconds
        };
        *remaining = remaining.saturating_sub(1);
        if *remaining == 0 {
            self.running = false;
            info!(loser = %self.active_side, "Flag fell");
            TickOutcome::Expired {
                loser: self.active_side,
            }
        } else {
            debug!(remaining = *remaining, "Tick");
            TickOutcome::Running
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stopped_clock_is_inert() {
        let mut clock = Clock::new(60, Side::White);
        assert_eq!(clock.tick(), TickOutcome::Idle);
        assert_eq!(clock.player_seconds(), 60);
    }

    #[test]
    fn test_only_active_side_drains() {
        let mut clock = Clock::new(0, Side::White);
        clock.start(60, Side::White, Side::White);
        assert_eq!(clock.tick(), TickOutcome::Running);
        clock.switch_to(Side::Black);
        clock.tick();
        clock.tick();
        assert_eq!(clock.player_seconds(), 59);
        assert_eq!(clock.opponent_seconds(), 58);
        assert_eq!(clock.seconds_for(Side::Black), 58);
    }

    #[test]
    fn test_expiry_stops_clock() {
        let mut clock = Clock::new(0, Side::Black);
        clock.start(1, Side::Black, Side::Black);
        assert_eq!(clock.tick(), TickOutcome::Expired { loser: Side::Black });
        assert!(!clock.running());
        assert_eq!(clock.player_seconds(), 0);
        assert_eq!(clock.tick(), TickOutcome::Idle);
    }

    #[test]
    fn test_display_format() {
        let mut clock = Clock::new(0, Side::White);
        clock.start(180, Side::White, Side::White);
        assert_eq!(clock.player_display(), "3:00");
        assert_eq!(clock.opponent_display(), "3:00");
    }
}

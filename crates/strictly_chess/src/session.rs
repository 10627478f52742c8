//! Match session lifecycle: generation stamp, configuration and status.

use crate::types::{Outcome, Side, SideChoice, TimeControl};
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::{info, instrument};

/// Generation stamp of a match.
///
/// Every deferred callback carries one and is compared with the current
/// session before it may touch match state.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(u64);

impl SessionId {
    /// The following generation.
    pub fn next(self) -> Self {
        Self(self.0.wrapping_add(1))
    }

    /// Raw counter value.
    pub fn value(self) -> u64 {
        self.0
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// What the human asked for when starting a match.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, derive_getters::Getters)]
pub struct MatchConfig {
    /// Starting seconds on each clock.
    time_control_seconds: u32,
    /// Requested side.
    side: SideChoice,
}

impl MatchConfig {
    /// Config with explicit seconds.
    pub fn new(time_control_seconds: u32, side: SideChoice) -> Self {
        Self {
            time_control_seconds,
            side,
        }
    }

    /// Config from a named preset.
    pub fn preset(time_control: TimeControl, side: SideChoice) -> Self {
        Self::new(time_control.seconds(), side)
    }

    /// Resolves the side choice, flipping a fair coin for `Random`.
    pub fn resolve_side(&self, rng: &mut impl Rng) -> Side {
        match self.side {
            SideChoice::White => Side::White,
            SideChoice::Black => Side::Black,
            SideChoice::Random => {
                if rng.random_bool(0.5) {
                    Side::White
                } else {
                    Side::Black
                }
            }
        }
    }
}

impl Default for MatchConfig {
    fn default() -> Self {
        Self::preset(TimeControl::default(), SideChoice::default())
    }
}

/// Lifecycle state of a match.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "status", content = "outcome", rename_all = "snake_case")]
pub enum MatchStatus {
    /// No match has started yet.
    #[default]
    NotStarted,
    /// Moves are being played.
    InProgress,
    /// The match ended.
    Over(Outcome),
}

/// The current match: its generation, assigned side and status.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct MatchSession {
    id: SessionId,
    config: MatchConfig,
    human_side: Option<Side>,
    status: MatchStatus,
}

impl MatchSession {
    /// Session id.
    pub fn id(&self) -> SessionId {
        self.id
    }

    /// Configuration of the current match.
    pub fn config(&self) -> &MatchConfig {
        &self.config
    }

    /// Side the human plays. White until a match has started.
    pub fn human_side(&self) -> Side {
        self.human_side.unwrap_or(Side::White)
    }

    /// Lifecycle status.
    pub fn status(&self) -> MatchStatus {
        self.status
    }

    /// Whether moves are being accepted.
    pub fn is_in_progress(&self) -> bool {
        self.status == MatchStatus::InProgress
    }

    /// Whether `id` names the current, running session.
    pub fn accepts(&self, id: SessionId) -> bool {
        self.id == id && self.is_in_progress()
    }

    /// Outcome once the match is over.
    pub fn outcome(&self) -> Option<Outcome> {
        match self.status {
            MatchStatus::Over(outcome) => Some(outcome),
            _ => None,
        }
    }

    /// Begins a new generation.
    #[instrument(skip(self))]
    pub(crate) fn begin(&mut self, config: MatchConfig, human_side: Side) -> SessionId {
        self.id = self.id.next();
        self.config = config;
        self.human_side = Some(human_side);
        self.status = MatchStatus::InProgress;
        info!(session = %self.id, %human_side, "Session started");
        self.id
    }

    /// Ends the running match.
    pub(crate) fn finish(&mut self, outcome: Outcome) {
        info!(session = %self.id, %outcome, "Session over");
        self.status = MatchStatus::Over(outcome);
    }
}

//! Lifecycle states and the legal transitions between them.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Lifecycle phase of a game.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum GameState {
    /// Nothing set yet. Only seen before the first game exists, and as the
    /// roster value of a connection that has not confirmed anything.
    #[default]
    None,
    /// Pre-game, inactive
    Ready,
    /// Game is running
    Active,
    /// Post-game, inactive
    Stopped,
}

impl fmt::Display for GameState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            GameState::None => "None",
            GameState::Ready => "Ready",
            GameState::Active => "Active",
            GameState::Stopped => "Stopped",
        };
        f.write_str(name)
    }
}

/// A legal state machine operation.
///
/// State is never assigned directly; reaching a target state always goes
/// through these.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    Begin,
    End,
    Complete,
    Reset,
}

impl fmt::Display for Transition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Transition::Begin => "begin",
            Transition::End => "end",
            Transition::Complete => "complete",
            Transition::Reset => "reset",
        };
        f.write_str(name)
    }
}

/// Minimal sequence of operations taking a game in `local` to `target`.
///
/// Skipped or reordered broadcasts are repaired by composing legal operations
/// rather than by force-assigning state. `None` on either side yields an
/// empty plan.
pub fn reconciliation_plan(local: GameState, target: GameState) -> &'static [Transition] {
    use GameState::*;
    use Transition::*;

    match (local, target) {
        (Ready, Active) => &[Begin],
        (Ready, Stopped) => &[End],
        (Active, Ready) => &[End, Reset],
        (Active, Stopped) => &[End],
        (Stopped, Ready) => &[Reset],
        (Stopped, Active) => &[Reset, Begin],
        _ => &[],
    }
}

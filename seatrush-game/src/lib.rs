//! Seat Rush Game Engine
//!
//! Platform-agnostic core for Seat Rush, an arcade game about getting a seat
//! on a crowded commuter train before your stop. This crate holds the
//! compartment model, station advancement, the reaction-time grab contest and
//! the clock-driven phase and grab timers. Rendering and audio live with the
//! caller.

pub mod constants;
pub mod difficulty;
pub mod generator;
pub mod grab;
pub mod grab_timer;
pub mod numbers;
pub mod phase;
pub mod session;
pub mod state;
pub mod stations;
pub mod transition;

use std::fmt;

use serde::{Deserialize, Serialize};

// Re-export commonly used types
pub use difficulty::{
    BoardingConfig, CountRange, Difficulty, DifficultyConfig, DifficultyConfigError,
    DifficultyTable, ReactionRange, UnknownDifficulty,
};
pub use generator::generate;
pub use grab::{CompetitorTime, GrabResult, GrabWinner, effective_time, resolve_many, resolve_one};
pub use grab_timer::{GrabSession, GrabTick, GrabTimer};
pub use phase::{PhaseEvent, PhaseSequencer, PhaseTick, TransitionCue, TransitionPhase};
pub use session::{
    ActionOutcome, GrabSignal, PlayerAction, SeatRushSession, SessionError, SessionSnapshot,
    TickReport,
};
pub use state::{GameState, GameStatus, Occupant, Seat, SeatId, SlotId, StandingCompetitor};
pub use stations::{STATIONS, StationIndex, is_valid_route, last_station_index, station_name};
pub use transition::{
    AdvancePreview, Departure, PassiveClaim, advance, apply_advance, apply_grab_results,
    claim_seat, preview_advance, reveal_destination, set_watched_seat,
};

/// Audible moments the session reports to its host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SoundCue {
    Arrival,
    Departure,
    PassiveClaim,
    GrabWindowOpened,
    GrabWon,
    GrabLost,
    GameWon,
    GameLost,
}

impl fmt::Display for SoundCue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Arrival => "arrival",
            Self::Departure => "departure",
            Self::PassiveClaim => "passive_claim",
            Self::GrabWindowOpened => "grab_window_opened",
            Self::GrabWon => "grab_won",
            Self::GrabLost => "grab_lost",
            Self::GameWon => "game_won",
            Self::GameLost => "game_lost",
        })
    }
}

/// Trait for abstracting audio playback
/// Platform-specific implementations should provide this
pub trait Notifier {
    fn notify(&mut self, cue: SoundCue);
}

/// Discards every cue.
#[derive(Debug, Clone, Copy, Default)]
pub struct SilentNotifier;

impl Notifier for SilentNotifier {
    fn notify(&mut self, _cue: SoundCue) {}
}

/// Forwards cues to the `log` facade at info level.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn notify(&mut self, cue: SoundCue) {
        log::info!("sound cue: {cue}");
    }
}

impl<T: Notifier + ?Sized> Notifier for &mut T {
    fn notify(&mut self, cue: SoundCue) {
        (**self).notify(cue);
    }
}

/// Keeps every cue in order; handy for hosts that batch audio per frame.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RecordingNotifier {
    pub cues: Vec<SoundCue>,
}

impl RecordingNotifier {
    #[must_use]
    pub fn drain(&mut self) -> Vec<SoundCue> {
        std::mem::take(&mut self.cues)
    }
}

impl Notifier for RecordingNotifier {
    fn notify(&mut self, cue: SoundCue) {
        self.cues.push(cue);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recording_notifier_keeps_order() {
        fn play<N: Notifier>(mut notifier: N, cues: &[SoundCue]) {
            for &cue in cues {
                notifier.notify(cue);
            }
        }

        let mut notifier = RecordingNotifier::default();
        play(&mut notifier, &[SoundCue::Arrival, SoundCue::GrabWon]);
        assert_eq!(notifier.drain(), vec![SoundCue::Arrival, SoundCue::GrabWon]);
        assert!(notifier.cues.is_empty());
    }

    #[test]
    fn log_notifier_accepts_every_cue() {
        let mut notifier = LogNotifier;
        for cue in [SoundCue::Arrival, SoundCue::GrabLost, SoundCue::GameWon] {
            notifier.notify(cue);
        }
    }

    #[test]
    fn cue_names_are_snake_case() {
        assert_eq!(SoundCue::GrabWindowOpened.to_string(), "grab_window_opened");
        assert_eq!(
            serde_json::to_string(&SoundCue::PassiveClaim).unwrap(),
            "\"passive_claim\""
        );
    }
}

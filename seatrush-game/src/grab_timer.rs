//! Countdown for the interactive grab window.
//!
//! The timer never schedules anything itself. The caller samples a monotonic
//! millisecond clock and passes it to [`GrabTimer::tick`]; cancelling is a
//! field reset, so a cancelled window can never resolve later.
use serde::{Deserialize, Serialize};

use crate::constants::GRAB_WINDOW_MS;
use crate::grab::{GrabResult, resolve_many};
use crate::numbers::ms_to_f64;
use crate::state::{GameState, SeatId};

/// One open grab window.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GrabSession {
    pub is_active: bool,
    pub open_seat_ids: Vec<SeatId>,
    pub window_duration_ms: u64,
    pub elapsed_ms: u64,
    pub player_tapped_seat_id: Option<SeatId>,
    /// Milliseconds from window start to the tap.
    pub player_tap_time_ms: Option<u64>,
    pub player_watched_seat_id: Option<SeatId>,
    started_at_ms: u64,
}

impl GrabSession {
    #[must_use]
    pub const fn remaining_ms(&self) -> u64 {
        self.window_duration_ms.saturating_sub(self.elapsed_ms)
    }

    #[must_use]
    pub const fn has_tapped(&self) -> bool {
        self.player_tapped_seat_id.is_some()
    }

    /// Clock reading when the window opened.
    #[must_use]
    pub const fn started_at_ms(&self) -> u64 {
        self.started_at_ms
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum GrabTick {
    Idle,
    Counting { remaining_ms: u64 },
    Resolved(Vec<GrabResult>),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GrabTimer {
    window_ms: u64,
    session: Option<GrabSession>,
}

impl Default for GrabTimer {
    fn default() -> Self {
        Self::new()
    }
}

impl GrabTimer {
    #[must_use]
    pub const fn new() -> Self {
        Self::with_window(GRAB_WINDOW_MS)
    }

    #[must_use]
    pub const fn with_window(window_ms: u64) -> Self {
        Self {
            window_ms,
            session: None,
        }
    }

    /// Open a window over `open_seat_ids`, replacing any running one. An empty
    /// seat list leaves the timer untouched.
    ///
    /// `watched_seat_id` is the player's watched seat at the moment the window
    /// opens; it decides the player's watching bonus at resolution.
    pub fn start(&mut self, open_seat_ids: &[SeatId], watched_seat_id: Option<SeatId>, now_ms: u64) {
        if open_seat_ids.is_empty() {
            return;
        }
        if self.session.is_some() {
            log::debug!("grab window replaced before resolving");
        }
        self.session = Some(GrabSession {
            is_active: true,
            open_seat_ids: open_seat_ids.to_vec(),
            window_duration_ms: self.window_ms,
            elapsed_ms: 0,
            player_tapped_seat_id: None,
            player_tap_time_ms: None,
            player_watched_seat_id: watched_seat_id,
            started_at_ms: now_ms,
        });
        log::debug!("grab window opened over seats {open_seat_ids:?}");
    }

    /// Record the player's tap. Returns whether it was accepted: only the
    /// first tap on an open seat of an active window counts.
    pub fn tap(&mut self, seat_id: SeatId, now_ms: u64) -> bool {
        let Some(session) = self.session.as_mut() else {
            return false;
        };
        if session.has_tapped() || !session.open_seat_ids.contains(&seat_id) {
            return false;
        }
        let since_start = now_ms.saturating_sub(session.started_at_ms);
        if since_start >= session.window_duration_ms {
            return false;
        }
        session.player_tapped_seat_id = Some(seat_id);
        session.player_tap_time_ms = Some(since_start);
        true
    }

    /// Drop the window without resolving. Safe to call repeatedly.
    pub fn cancel(&mut self) {
        if self.session.take().is_some() {
            log::debug!("grab window cancelled");
        }
    }

    /// Advance the countdown. Resolves exactly once, on the first tick at or
    /// past the end of the window, against the competitors in `state`.
    pub fn tick(&mut self, now_ms: u64, state: &GameState) -> GrabTick {
        let Some(session) = self.session.as_mut() else {
            return GrabTick::Idle;
        };
        let elapsed = now_ms.saturating_sub(session.started_at_ms);
        session.elapsed_ms = elapsed.min(session.window_duration_ms);
        if elapsed < session.window_duration_ms {
            return GrabTick::Counting {
                remaining_ms: session.remaining_ms(),
            };
        }

        let Some(finished) = self.session.take() else {
            return GrabTick::Idle;
        };
        let results = resolve_many(
            &finished.open_seat_ids,
            finished.player_tap_time_ms.map(ms_to_f64),
            finished.player_tapped_seat_id,
            state.player_slot,
            finished.player_watched_seat_id,
            &state.standing,
        );
        GrabTick::Resolved(results)
    }

    #[must_use]
    pub const fn is_active(&self) -> bool {
        self.session.is_some()
    }

    #[must_use]
    pub const fn session(&self) -> Option<&GrabSession> {
        self.session.as_ref()
    }

    #[must_use]
    pub fn remaining_ms(&self) -> Option<u64> {
        self.session.as_ref().map(GrabSession::remaining_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::difficulty::Difficulty;
    use crate::grab::GrabWinner;
    use crate::state::StandingCompetitor;

    fn crowd() -> GameState {
        let mut state = GameState::empty(0, 4, Difficulty::Normal, 0);
        state.standing.push(StandingCompetitor {
            id: "stander-3".into(),
            watched_seat_id: None,
            base_reaction_ms: 600.0,
            visual_variant: 1,
            slot: 5,
        });
        state
    }

    #[test]
    fn empty_start_is_a_no_op() {
        let mut timer = GrabTimer::new();
        timer.start(&[], None, 10);
        assert!(!timer.is_active());
        assert_eq!(timer.tick(5_000, &crowd()), GrabTick::Idle);
    }

    #[test]
    fn counts_down_then_resolves_once() {
        let state = crowd();
        let mut timer = GrabTimer::new();
        timer.start(&[1], None, 1_000);
        assert_eq!(
            timer.tick(1_500, &state),
            GrabTick::Counting {
                remaining_ms: 2_500
            }
        );
        assert_eq!(timer.remaining_ms(), Some(2_500));
        let GrabTick::Resolved(results) = timer.tick(4_000, &state) else {
            panic!("window should resolve at its deadline");
        };
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].winner, GrabWinner::Competitor("stander-3".into()));
        assert_eq!(timer.tick(4_001, &state), GrabTick::Idle);
        assert_eq!(timer.tick(9_000, &state), GrabTick::Idle);
    }

    #[test]
    fn second_tap_is_ignored() {
        let mut timer = GrabTimer::new();
        timer.start(&[0, 2], Some(0), 0);
        assert!(timer.tap(0, 100));
        assert!(!timer.tap(2, 150));
        assert!(!timer.tap(0, 200));
        let session = timer.session().unwrap();
        assert_eq!(session.player_tapped_seat_id, Some(0));
        assert_eq!(session.player_tap_time_ms, Some(100));
    }

    #[test]
    fn taps_on_closed_seats_or_idle_timer_are_ignored() {
        let mut timer = GrabTimer::new();
        assert!(!timer.tap(1, 0));
        timer.start(&[3], None, 0);
        assert!(!timer.tap(1, 10));
        assert!(!timer.tap(3, 3_000), "tap after the deadline");
        assert!(!timer.session().unwrap().has_tapped());
    }

    #[test]
    fn quick_tap_beats_the_crowd() {
        let state = crowd();
        let mut timer = GrabTimer::new();
        timer.start(&[0], Some(0), 0);
        assert!(timer.tap(0, 100));
        let GrabTick::Resolved(results) = timer.tick(3_000, &state) else {
            panic!("expected resolution");
        };
        assert!(results[0].is_player_winner());
    }

    #[test]
    fn cancel_is_idempotent_and_suppresses_resolution() {
        let state = crowd();
        let mut timer = GrabTimer::new();
        timer.start(&[1], None, 0);
        timer.cancel();
        timer.cancel();
        assert_eq!(timer.tick(10_000, &state), GrabTick::Idle);
    }

    #[test]
    fn restarting_replaces_the_window() {
        let mut timer = GrabTimer::with_window(1_000);
        timer.start(&[1], None, 0);
        assert!(timer.tap(1, 10));
        timer.start(&[4], None, 500);
        let session = timer.session().unwrap();
        assert_eq!(session.open_seat_ids, vec![4]);
        assert!(!session.has_tapped());
        assert_eq!(
            timer.tick(1_000, &crowd()),
            GrabTick::Counting { remaining_ms: 500 }
        );
    }
}

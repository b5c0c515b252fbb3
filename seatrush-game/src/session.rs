//! Composing layer that ties the engine, the phase sequencer and the grab
//! timer to a single ride.
//!
//! [`SeatRushSession`] owns the only mutable copy of the ride. Player actions
//! enter through [`SeatRushSession::dispatch`] and are held back while a
//! station transition is animating; the caller drives both timers by passing
//! its monotonic clock to [`SeatRushSession::tick`].
use rand::SeedableRng;
use rand_chacha::ChaCha20Rng;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::difficulty::Difficulty;
use crate::generator::generate;
use crate::grab::GrabResult;
use crate::grab_timer::{GrabTick, GrabTimer};
use crate::phase::{PhaseEvent, PhaseSequencer, TransitionCue, TransitionPhase};
use crate::state::{GameState, GameStatus, SeatId};
use crate::stations::{StationIndex, is_valid_route, last_station_index};
use crate::transition::{
    AdvancePreview, apply_advance, apply_grab_results, claim_seat, preview_advance,
    reveal_destination, set_watched_seat,
};
use crate::{Notifier, SoundCue};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "seat", rename_all = "snake_case")]
pub enum PlayerAction {
    AdvanceStation,
    RevealDestination(SeatId),
    ClaimSeat(SeatId),
    WatchSeat(Option<SeatId>),
    TapGrabSeat(SeatId),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ActionOutcome {
    /// The action changed the session.
    Applied,
    /// A transition is animating; the action runs when it completes.
    Queued,
    /// The action had no target or arrived at the wrong time.
    Ignored,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SessionError {
    #[error("no ride in progress; start a game first")]
    NotStarted,
    #[error("invalid route {boarding} -> {destination} (stations run 0..={last})")]
    InvalidRoute {
        boarding: StationIndex,
        destination: StationIndex,
        last: StationIndex,
    },
    #[error("the ride is over ({status})")]
    GameOver { status: GameStatus },
}

/// Countdown signal for the renderer while a grab window is open.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GrabSignal {
    pub remaining_ms: u64,
    pub open_seat_ids: Vec<SeatId>,
    pub player_tapped: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionSnapshot {
    pub state: GameState,
    pub phase: TransitionPhase,
    pub cue: Option<TransitionCue>,
    pub claim_pulse: bool,
    pub grab: Option<GrabSignal>,
    pub queued: usize,
}

/// What happened during one [`SeatRushSession::tick`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TickReport {
    pub phase_events: Vec<PhaseEvent>,
    /// Set on the tick that applies a previewed advance.
    pub arrived_at: Option<StationIndex>,
    pub grab_window_opened: Vec<SeatId>,
    pub grab_results: Vec<GrabResult>,
    /// Outcomes of interactions replayed after the transition finished.
    pub replayed: Vec<Result<ActionOutcome, SessionError>>,
}

pub struct SeatRushSession<N: Notifier> {
    rng: ChaCha20Rng,
    notifier: N,
    state: Option<GameState>,
    sequencer: PhaseSequencer<QueuedAction>,
    grab: GrabTimer,
    pending: Option<PendingAdvance>,
    clock_ms: u64,
}

/// An action held back by a running transition, stamped with its dispatch time.
#[derive(Debug, Clone, Copy)]
struct QueuedAction {
    action: PlayerAction,
    queued_at_ms: u64,
}

struct PendingAdvance {
    preview: AdvancePreview,
    watched_seat_id: Option<SeatId>,
}

impl<N: Notifier> SeatRushSession<N> {
    #[must_use]
    pub fn new(seed: u64, notifier: N) -> Self {
        Self::with_rng(ChaCha20Rng::seed_from_u64(seed), notifier)
    }

    #[must_use]
    pub fn from_entropy(notifier: N) -> Self {
        Self::with_rng(ChaCha20Rng::from_entropy(), notifier)
    }

    fn with_rng(rng: ChaCha20Rng, notifier: N) -> Self {
        Self {
            rng,
            notifier,
            state: None,
            sequencer: PhaseSequencer::new(),
            grab: GrabTimer::new(),
            pending: None,
            clock_ms: 0,
        }
    }

    /// Generate a fresh ride, discarding anything in flight.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::InvalidRoute`] unless
    /// `boarding < destination <= last station`.
    pub fn start_game(
        &mut self,
        boarding: StationIndex,
        destination: StationIndex,
        difficulty: Difficulty,
    ) -> Result<&GameState, SessionError> {
        if !is_valid_route(boarding, destination) {
            return Err(SessionError::InvalidRoute {
                boarding,
                destination,
                last: last_station_index(),
            });
        }
        self.sequencer = PhaseSequencer::new();
        self.grab.cancel();
        self.pending = None;
        let state = generate(boarding, destination, difficulty, &mut self.rng);
        log::info!(
            "ride started: {boarding} -> {destination} on {difficulty}, {} seats taken",
            state.occupied_count()
        );
        Ok(&*self.state.insert(state))
    }

    #[must_use]
    pub const fn state(&self) -> Option<&GameState> {
        self.state.as_ref()
    }

    #[must_use]
    pub const fn notifier(&self) -> &N {
        &self.notifier
    }

    pub const fn notifier_mut(&mut self) -> &mut N {
        &mut self.notifier
    }

    #[must_use]
    pub const fn phase(&self) -> TransitionPhase {
        self.sequencer.phase()
    }

    #[must_use]
    pub const fn grab_timer(&self) -> &GrabTimer {
        &self.grab
    }

    /// Submit a player action at clock `now_ms`.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::NotStarted`] before [`Self::start_game`] and
    /// [`SessionError::GameOver`] when advancing a finished ride.
    pub fn dispatch(
        &mut self,
        action: PlayerAction,
        now_ms: u64,
    ) -> Result<ActionOutcome, SessionError> {
        self.observe_clock(now_ms);
        if self.state.is_none() {
            return Err(SessionError::NotStarted);
        }
        let queued = QueuedAction {
            action,
            queued_at_ms: now_ms,
        };
        match self.sequencer.queue_interaction(queued) {
            Some(queued) => self.perform(queued.action, now_ms),
            None => {
                log::debug!("queued {action:?} behind running transition");
                Ok(ActionOutcome::Queued)
            }
        }
    }

    /// Drive the phase sequencer and the grab countdown to `now_ms`.
    pub fn tick(&mut self, now_ms: u64) -> TickReport {
        self.observe_clock(now_ms);
        let mut report = TickReport::default();

        let phase_tick = self.sequencer.tick(now_ms);
        for event in &phase_tick.events {
            self.announce_phase(*event);
            if *event == PhaseEvent::Completed {
                self.finish_advance(now_ms, &mut report);
            }
        }
        report.phase_events = phase_tick.events;

        for queued in phase_tick.drained {
            let outcome = match self.sequencer.queue_interaction(queued) {
                Some(queued) => self.replay(queued, now_ms),
                None => Ok(ActionOutcome::Queued),
            };
            report.replayed.push(outcome);
        }

        if let Some(state) = self.state.as_ref()
            && let GrabTick::Resolved(results) = self.grab.tick(now_ms, state)
        {
            self.settle_grab(&results, now_ms);
            report.grab_results = results;
        }
        report
    }

    /// Current view for the renderer; `None` before a ride starts.
    #[must_use]
    pub fn snapshot(&self) -> Option<SessionSnapshot> {
        let state = self.state.as_ref()?;
        let grab = self.grab.session().map(|session| GrabSignal {
            remaining_ms: session.remaining_ms(),
            open_seat_ids: session.open_seat_ids.clone(),
            player_tapped: session.has_tapped(),
        });
        Some(SessionSnapshot {
            state: state.clone(),
            phase: self.sequencer.phase(),
            cue: self.sequencer.cue().cloned(),
            claim_pulse: self.sequencer.claim_pulse_active(self.clock_ms),
            grab,
            queued: self.sequencer.queued_len(),
        })
    }

    fn observe_clock(&mut self, now_ms: u64) {
        self.clock_ms = self.clock_ms.max(now_ms);
    }

    /// Run an action that waited out a transition. A tap only counts for a
    /// window that was already open when the player made it.
    fn replay(
        &mut self,
        queued: QueuedAction,
        now_ms: u64,
    ) -> Result<ActionOutcome, SessionError> {
        let is_tap = match queued.action {
            PlayerAction::TapGrabSeat(_) => true,
            PlayerAction::ClaimSeat(_) => self.grab.is_active(),
            _ => false,
        };
        let window_opened_later = self
            .grab
            .session()
            .is_some_and(|session| session.started_at_ms() >= queued.queued_at_ms);
        if is_tap && window_opened_later {
            log::debug!("dropped {:?} made before the grab window opened", queued.action);
            return Ok(ActionOutcome::Ignored);
        }
        self.perform(queued.action, now_ms)
    }

    fn perform(&mut self, action: PlayerAction, now_ms: u64) -> Result<ActionOutcome, SessionError> {
        let Some(state) = self.state.as_ref() else {
            return Err(SessionError::NotStarted);
        };
        match action {
            PlayerAction::AdvanceStation => self.begin_advance(now_ms),
            PlayerAction::RevealDestination(seat_id) => {
                let revealed = reveal_destination(state, seat_id);
                Ok(self.replace_state(revealed))
            }
            PlayerAction::ClaimSeat(seat_id) if self.grab.is_active() => {
                Ok(self.tap(seat_id, now_ms))
            }
            PlayerAction::ClaimSeat(seat_id) => {
                if state.is_terminal() || state.player_seated || !state.is_seat_free(seat_id) {
                    return Ok(ActionOutcome::Ignored);
                }
                let claimed = claim_seat(state, seat_id);
                self.sequencer.trigger_claim_success_pulse(now_ms);
                log::info!("player sat down in seat {seat_id}");
                Ok(self.replace_state(claimed))
            }
            PlayerAction::WatchSeat(seat_id) => {
                if state.is_terminal() || state.player_seated {
                    return Ok(ActionOutcome::Ignored);
                }
                let watched = set_watched_seat(state, seat_id);
                Ok(self.replace_state(watched))
            }
            PlayerAction::TapGrabSeat(seat_id) => Ok(self.tap(seat_id, now_ms)),
        }
    }

    fn tap(&mut self, seat_id: SeatId, now_ms: u64) -> ActionOutcome {
        if self.grab.tap(seat_id, now_ms) {
            ActionOutcome::Applied
        } else {
            ActionOutcome::Ignored
        }
    }

    fn replace_state(&mut self, next: GameState) -> ActionOutcome {
        match self.state.as_ref() {
            Some(current) if *current == next => ActionOutcome::Ignored,
            _ => {
                self.state = Some(next);
                ActionOutcome::Applied
            }
        }
    }

    fn begin_advance(&mut self, now_ms: u64) -> Result<ActionOutcome, SessionError> {
        let Some(state) = self.state.as_ref() else {
            return Err(SessionError::NotStarted);
        };
        if state.is_terminal() {
            return Err(SessionError::GameOver {
                status: state.status,
            });
        }
        if self.grab.is_active() || self.pending.is_some() {
            return Ok(ActionOutcome::Ignored);
        }
        let preview = preview_advance(state, &mut self.rng);
        let cue = TransitionCue {
            departing_ids: preview.departing_ids(),
            claiming_id: preview.claiming_id().map(str::to_string),
            claimed_seat_id: preview.claimed_seat_id(),
        };
        if !self.sequencer.start_transition(cue, now_ms) {
            return Ok(ActionOutcome::Ignored);
        }
        self.pending = Some(PendingAdvance {
            preview,
            watched_seat_id: state.watched_seat_id,
        });
        Ok(ActionOutcome::Applied)
    }

    fn announce_phase(&mut self, event: PhaseEvent) {
        let Some(pending) = self.pending.as_ref() else {
            return;
        };
        let cue = match event {
            PhaseEvent::Entered(TransitionPhase::Arriving) => Some(SoundCue::Arrival),
            PhaseEvent::Entered(TransitionPhase::Departing)
                if !pending.preview.departing.is_empty() =>
            {
                Some(SoundCue::Departure)
            }
            PhaseEvent::Entered(TransitionPhase::Claiming) if pending.preview.claim.is_some() => {
                Some(SoundCue::PassiveClaim)
            }
            _ => None,
        };
        if let Some(cue) = cue {
            self.notifier.notify(cue);
        }
    }

    fn finish_advance(&mut self, now_ms: u64, report: &mut TickReport) {
        let (Some(pending), Some(state)) = (self.pending.take(), self.state.as_ref()) else {
            return;
        };
        let next = apply_advance(state, &pending.preview);
        report.arrived_at = Some(next.current_station);

        if next.is_terminal() {
            self.grab.cancel();
            log::info!(
                "ride finished at station {} ({})",
                next.current_station,
                next.status
            );
            self.notifier.notify(if next.status == GameStatus::Won {
                SoundCue::GameWon
            } else {
                SoundCue::GameLost
            });
        } else if !next.player_seated {
            let open: Vec<SeatId> = pending
                .preview
                .open_seat_ids()
                .into_iter()
                .filter(|&id| next.is_seat_free(id))
                .collect();
            if !open.is_empty() {
                self.grab.start(&open, pending.watched_seat_id, now_ms);
                self.notifier.notify(SoundCue::GrabWindowOpened);
                report.grab_window_opened = open;
            }
        }
        self.state = Some(next);
    }

    fn settle_grab(&mut self, results: &[GrabResult], now_ms: u64) {
        let Some(state) = self.state.as_ref() else {
            return;
        };
        let next = apply_grab_results(state, results, &mut self.rng);
        if results.iter().any(GrabResult::is_player_winner) {
            self.sequencer.trigger_claim_success_pulse(now_ms);
            self.notifier.notify(SoundCue::GrabWon);
        } else {
            self.notifier.notify(SoundCue::GrabLost);
        }
        self.state = Some(next);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::SilentNotifier;
    use crate::constants::{GRAB_WINDOW_MS, TRAVELING_MS};

    const FULL_SEQUENCE_MS: u64 = 3_500;

    #[test]
    fn dispatch_before_start_is_rejected() {
        let mut session = SeatRushSession::new(1, SilentNotifier);
        assert_eq!(
            session.dispatch(PlayerAction::AdvanceStation, 0),
            Err(SessionError::NotStarted)
        );
        assert!(session.snapshot().is_none());
    }

    #[test]
    fn backwards_route_is_rejected() {
        let mut session = SeatRushSession::new(1, SilentNotifier);
        let err = session.start_game(4, 4, Difficulty::Easy).unwrap_err();
        assert!(matches!(err, SessionError::InvalidRoute { last: 7, .. }));
        assert!(session.start_game(0, 8, Difficulty::Easy).is_err());
    }

    #[test]
    fn advance_applies_only_after_sequence() {
        let mut session = SeatRushSession::new(3, SilentNotifier);
        session.start_game(0, 4, Difficulty::Normal).unwrap();
        assert_eq!(
            session.dispatch(PlayerAction::AdvanceStation, 0),
            Ok(ActionOutcome::Applied)
        );
        assert_eq!(session.phase(), TransitionPhase::Traveling);
        assert_eq!(session.state().unwrap().current_station, 0);

        let report = session.tick(TRAVELING_MS);
        assert_eq!(
            report.phase_events,
            vec![PhaseEvent::Entered(TransitionPhase::Arriving)]
        );
        assert_eq!(session.state().unwrap().current_station, 0);

        let report = session.tick(FULL_SEQUENCE_MS);
        assert_eq!(report.arrived_at, Some(1));
        assert_eq!(session.state().unwrap().current_station, 1);
        assert!(session.sequencer.is_idle());
    }

    #[test]
    fn actions_during_transition_queue_and_replay_in_order() {
        let mut session = SeatRushSession::new(9, SilentNotifier);
        session.start_game(0, 6, Difficulty::Rush).unwrap();
        session.dispatch(PlayerAction::AdvanceStation, 0).unwrap();
        assert_eq!(
            session.dispatch(PlayerAction::RevealDestination(0), 10),
            Ok(ActionOutcome::Queued)
        );
        assert_eq!(
            session.dispatch(PlayerAction::RevealDestination(1), 20),
            Ok(ActionOutcome::Queued)
        );
        assert_eq!(session.snapshot().unwrap().queued, 2);
        let report = session.tick(FULL_SEQUENCE_MS);
        assert_eq!(report.replayed.len(), 2);
        assert_eq!(session.snapshot().unwrap().queued, 0);
    }

    #[test]
    fn claim_outside_window_needs_free_seat() {
        let mut session = SeatRushSession::new(5, SilentNotifier);
        session.start_game(0, 3, Difficulty::Rush).unwrap();
        assert_eq!(
            session.dispatch(PlayerAction::ClaimSeat(0), 0),
            Ok(ActionOutcome::Ignored),
            "rush starts with every seat taken"
        );
        assert_eq!(
            session.dispatch(PlayerAction::ClaimSeat(40), 0),
            Ok(ActionOutcome::Ignored)
        );
    }

    #[test]
    fn seated_ride_ends_in_victory_and_rejects_further_advance() {
        let mut session = SeatRushSession::new(12, SilentNotifier);
        let free = session
            .start_game(0, 2, Difficulty::Easy)
            .unwrap()
            .free_seat_ids()[0];
        assert_eq!(
            session.dispatch(PlayerAction::ClaimSeat(free), 0),
            Ok(ActionOutcome::Applied)
        );
        assert!(session.snapshot().unwrap().claim_pulse);

        let mut now = 0;
        for _ in 0..2 {
            now += 10_000;
            session.dispatch(PlayerAction::AdvanceStation, now).unwrap();
            now += 10_000;
            session.tick(now);
        }
        assert_eq!(session.state().unwrap().status, GameStatus::Won);
        assert_eq!(
            session.dispatch(PlayerAction::AdvanceStation, now + 1),
            Err(SessionError::GameOver {
                status: GameStatus::Won
            })
        );
    }

    #[test]
    fn tap_queued_during_transition_does_not_enter_the_window() {
        let mut windows = 0;
        for seed in 0..64 {
            let mut session = SeatRushSession::new(seed, SilentNotifier);
            session.start_game(0, 7, Difficulty::Rush).unwrap();
            session.dispatch(PlayerAction::AdvanceStation, 0).unwrap();
            let departing = session
                .snapshot()
                .and_then(|snapshot| snapshot.cue)
                .map(|cue| cue.departing_ids)
                .unwrap_or_default();
            let Some(seat) = session.state().unwrap().seats.iter().find_map(|seat| {
                seat.occupant
                    .as_ref()
                    .filter(|occupant| departing.contains(&occupant.id))
                    .map(|_| seat.id)
            }) else {
                continue;
            };
            assert_eq!(
                session.dispatch(PlayerAction::TapGrabSeat(seat), 10),
                Ok(ActionOutcome::Queued)
            );
            assert_eq!(
                session.dispatch(PlayerAction::ClaimSeat(seat), 20),
                Ok(ActionOutcome::Queued)
            );

            let report = session.tick(FULL_SEQUENCE_MS);
            if report.grab_window_opened.is_empty() {
                continue;
            }
            windows += 1;
            assert_eq!(
                report.replayed,
                vec![Ok(ActionOutcome::Ignored), Ok(ActionOutcome::Ignored)]
            );
            let grab = session.grab_timer().session().unwrap();
            assert!(!grab.has_tapped());
            assert_eq!(grab.player_tap_time_ms, None);
            assert!(!session.state().unwrap().player_seated);
        }
        assert!(windows > 0, "no seed opened a grab window");
    }

    #[test]
    fn grab_window_blocks_advance_until_resolved() {
        let mut session = SeatRushSession::new(0, SilentNotifier);
        session.start_game(0, 7, Difficulty::Easy).unwrap();
        let mut now = 0;
        for _ in 0..6 {
            session.dispatch(PlayerAction::AdvanceStation, now).unwrap();
            now += FULL_SEQUENCE_MS;
            let report = session.tick(now);
            if let Some(&seat) = report.grab_window_opened.first() {
                assert!(session.grab_timer().is_active());
                assert_eq!(
                    session.dispatch(PlayerAction::AdvanceStation, now),
                    Ok(ActionOutcome::Ignored)
                );
                assert_eq!(
                    session.dispatch(PlayerAction::TapGrabSeat(seat), now + 1),
                    Ok(ActionOutcome::Applied)
                );
                assert_eq!(
                    session.dispatch(PlayerAction::TapGrabSeat(seat), now + 2),
                    Ok(ActionOutcome::Ignored)
                );
                now += GRAB_WINDOW_MS;
                let report = session.tick(now);
                assert!(!report.grab_results.is_empty());
                assert!(!session.grab_timer().is_active());
                return;
            }
            if session.state().unwrap().is_terminal() {
                break;
            }
        }
    }
}

//! Station-to-station animation sequencing and interaction queuing.
//!
//! [`PhaseSequencer`] is an explicit state machine over [`TransitionPhase`]
//! driven by the caller's monotonic clock. Each tick reports every phase
//! boundary crossed since the previous tick, in order, so a large clock jump
//! still walks through every phase. Interactions that arrive mid-sequence are
//! held in a FIFO and handed back once, when the sequence returns to idle.
use std::collections::VecDeque;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::constants::{
    ARRIVING_MS, CLAIM_PULSE_MS, CLAIMING_MS, DEPARTING_MS, SETTLING_MS, TRAVELING_MS,
};
use crate::state::SeatId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum TransitionPhase {
    #[default]
    Idle,
    Traveling,
    Arriving,
    Departing,
    Claiming,
    Settling,
}

impl TransitionPhase {
    /// Dwell time; `None` for idle, which lasts until the next transition.
    #[must_use]
    pub const fn duration_ms(self) -> Option<u64> {
        match self {
            Self::Idle => None,
            Self::Traveling => Some(TRAVELING_MS),
            Self::Arriving => Some(ARRIVING_MS),
            Self::Departing => Some(DEPARTING_MS),
            Self::Claiming => Some(CLAIMING_MS),
            Self::Settling => Some(SETTLING_MS),
        }
    }

    #[must_use]
    pub const fn next(self) -> Self {
        match self {
            Self::Idle | Self::Settling => Self::Idle,
            Self::Traveling => Self::Arriving,
            Self::Arriving => Self::Departing,
            Self::Departing => Self::Claiming,
            Self::Claiming => Self::Settling,
        }
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Traveling => "traveling",
            Self::Arriving => "arriving",
            Self::Departing => "departing",
            Self::Claiming => "claiming",
            Self::Settling => "settling",
        }
    }
}

impl fmt::Display for TransitionPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Who the renderer should animate during the current sequence.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransitionCue {
    pub departing_ids: Vec<String>,
    pub claiming_id: Option<String>,
    pub claimed_seat_id: Option<SeatId>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PhaseEvent {
    Entered(TransitionPhase),
    /// The sequence finished and the sequencer is idle again.
    Completed,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PhaseTick<I> {
    pub events: Vec<PhaseEvent>,
    /// Interactions queued during the sequence, oldest first. Non-empty only
    /// on the tick that completes it.
    pub drained: Vec<I>,
}

impl<I> PhaseTick<I> {
    #[must_use]
    pub fn completed(&self) -> bool {
        self.events.contains(&PhaseEvent::Completed)
    }
}

#[derive(Debug, Clone)]
pub struct PhaseSequencer<I> {
    phase: TransitionPhase,
    phase_started_ms: u64,
    cue: Option<TransitionCue>,
    queue: VecDeque<I>,
    pulse_until_ms: Option<u64>,
}

impl<I> Default for PhaseSequencer<I> {
    fn default() -> Self {
        Self::new()
    }
}

impl<I> PhaseSequencer<I> {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            phase: TransitionPhase::Idle,
            phase_started_ms: 0,
            cue: None,
            queue: VecDeque::new(),
            pulse_until_ms: None,
        }
    }

    #[must_use]
    pub const fn phase(&self) -> TransitionPhase {
        self.phase
    }

    #[must_use]
    pub const fn is_idle(&self) -> bool {
        matches!(self.phase, TransitionPhase::Idle)
    }

    #[must_use]
    pub const fn cue(&self) -> Option<&TransitionCue> {
        self.cue.as_ref()
    }

    #[must_use]
    pub fn queued_len(&self) -> usize {
        self.queue.len()
    }

    /// Begin a sequence at `traveling`. Returns `false` and changes nothing
    /// when a sequence is already running.
    pub fn start_transition(&mut self, cue: TransitionCue, now_ms: u64) -> bool {
        if !self.is_idle() {
            return false;
        }
        self.phase = TransitionPhase::Traveling;
        self.phase_started_ms = now_ms;
        self.cue = Some(cue);
        log::debug!("phase -> {}", self.phase);
        true
    }

    /// Run `interaction` now (returned) when idle, otherwise hold it until the
    /// running sequence completes.
    pub fn queue_interaction(&mut self, interaction: I) -> Option<I> {
        if self.is_idle() {
            return Some(interaction);
        }
        self.queue.push_back(interaction);
        None
    }

    pub fn tick(&mut self, now_ms: u64) -> PhaseTick<I> {
        let mut events = Vec::new();
        while let Some(dwell) = self.phase.duration_ms() {
            let ends_at = self.phase_started_ms.saturating_add(dwell);
            if now_ms < ends_at {
                break;
            }
            self.phase = self.phase.next();
            self.phase_started_ms = ends_at;
            log::debug!("phase -> {}", self.phase);
            if self.is_idle() {
                self.cue = None;
                events.push(PhaseEvent::Completed);
            } else {
                events.push(PhaseEvent::Entered(self.phase));
            }
        }
        let drained = if events.contains(&PhaseEvent::Completed) {
            self.queue.drain(..).collect()
        } else {
            Vec::new()
        };
        PhaseTick { events, drained }
    }

    /// Flag the player's own successful grab for a short flourish.
    pub const fn trigger_claim_success_pulse(&mut self, now_ms: u64) {
        self.pulse_until_ms = Some(now_ms.saturating_add(CLAIM_PULSE_MS));
    }

    #[must_use]
    pub fn claim_pulse_active(&self, now_ms: u64) -> bool {
        self.pulse_until_ms.is_some_and(|until| now_ms < until)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cue() -> TransitionCue {
        TransitionCue {
            departing_ids: vec!["rider-2".into()],
            claiming_id: Some("stander-4".into()),
            claimed_seat_id: Some(2),
        }
    }

    #[test]
    fn phases_follow_fixed_order() {
        let mut seq: PhaseSequencer<u8> = PhaseSequencer::new();
        assert!(seq.start_transition(cue(), 0));
        assert_eq!(seq.phase(), TransitionPhase::Traveling);

        let mut now = 0;
        let mut seen = Vec::new();
        for phase in [
            TransitionPhase::Traveling,
            TransitionPhase::Arriving,
            TransitionPhase::Departing,
            TransitionPhase::Claiming,
            TransitionPhase::Settling,
        ] {
            now += phase.duration_ms().unwrap();
            seen.extend(seq.tick(now).events);
        }
        assert_eq!(
            seen,
            vec![
                PhaseEvent::Entered(TransitionPhase::Arriving),
                PhaseEvent::Entered(TransitionPhase::Departing),
                PhaseEvent::Entered(TransitionPhase::Claiming),
                PhaseEvent::Entered(TransitionPhase::Settling),
                PhaseEvent::Completed,
            ]
        );
        assert!(seq.is_idle());
        assert!(seq.cue().is_none());
    }

    #[test]
    fn large_clock_jump_still_walks_every_phase() {
        let mut seq: PhaseSequencer<u8> = PhaseSequencer::new();
        seq.start_transition(cue(), 100);
        let tick = seq.tick(1_000_000);
        assert_eq!(tick.events.len(), 5);
        assert!(tick.completed());
    }

    #[test]
    fn partial_ticks_report_nothing() {
        let mut seq: PhaseSequencer<u8> = PhaseSequencer::new();
        seq.start_transition(cue(), 0);
        assert!(seq.tick(TRAVELING_MS - 1).events.is_empty());
        assert_eq!(seq.phase(), TransitionPhase::Traveling);
        assert_eq!(seq.cue().unwrap().claimed_seat_id, Some(2));
    }

    #[test]
    fn start_is_refused_mid_sequence() {
        let mut seq: PhaseSequencer<u8> = PhaseSequencer::new();
        assert!(seq.start_transition(cue(), 0));
        assert!(!seq.start_transition(TransitionCue::default(), 10));
        assert_eq!(seq.cue(), Some(&cue()));
    }

    #[test]
    fn queued_interactions_drain_once_in_order() {
        let mut seq = PhaseSequencer::new();
        assert_eq!(seq.queue_interaction(7), Some(7));
        seq.start_transition(cue(), 0);
        assert_eq!(seq.queue_interaction(1), None);
        assert_eq!(seq.queue_interaction(2), None);
        assert_eq!(seq.queued_len(), 2);
        assert!(seq.tick(500).drained.is_empty());

        let done = seq.tick(10_000);
        assert_eq!(done.drained, vec![1, 2]);
        assert!(seq.tick(20_000).drained.is_empty());
        assert_eq!(seq.queued_len(), 0);
    }

    #[test]
    fn claim_pulse_clears_itself() {
        let mut seq: PhaseSequencer<u8> = PhaseSequencer::new();
        assert!(!seq.claim_pulse_active(0));
        seq.trigger_claim_success_pulse(1_000);
        assert!(seq.claim_pulse_active(1_500));
        assert!(!seq.claim_pulse_active(1_000 + CLAIM_PULSE_MS));
        assert!(seq.is_idle(), "pulse does not touch the phase machine");
    }
}

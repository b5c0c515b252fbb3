use anyhow::{Result, anyhow, bail};
use seatrush_game::{
    ActionOutcome, Difficulty, GameState, GrabResult, PhaseEvent, PlayerAction,
    RecordingNotifier, SeatId, SeatRushSession, SoundCue, StationIndex, last_station_index,
};

use crate::logic::policy::{GameplayStrategy, GrabTap, PlayerPolicy};

/// Rounds of station actions a policy gets before the train moves on.
const MAX_POLICY_ROUNDS: usize = 4;
/// Upper bound on simulated time for one transition or grab window.
const MAX_WAIT_MS: u64 = 10_000;

/// Configuration for a simulation session.
#[derive(Debug, Clone, Copy)]
pub struct SimulationConfig {
    pub seed: u64,
    pub difficulty: Difficulty,
    pub strategy: GameplayStrategy,
    pub boarding: StationIndex,
    pub destination: StationIndex,
    /// Simulated frame length fed to the session clock.
    pub frame_ms: u64,
}

impl SimulationConfig {
    #[must_use]
    pub fn new(difficulty: Difficulty, strategy: GameplayStrategy, seed: u64) -> Self {
        Self {
            seed,
            difficulty,
            strategy,
            boarding: 0,
            destination: last_station_index(),
            frame_ms: 16,
        }
    }

    #[must_use]
    pub const fn with_route(mut self, boarding: StationIndex, destination: StationIndex) -> Self {
        self.boarding = boarding;
        self.destination = destination;
        self
    }

    #[must_use]
    pub const fn with_frame_ms(mut self, frame_ms: u64) -> Self {
        self.frame_ms = frame_ms;
        self
    }
}

/// Everything that happened between two stations.
#[derive(Debug, Clone, Default)]
pub struct StopOutcome {
    pub arrived_at: Option<StationIndex>,
    pub actions_applied: u32,
    pub actions_ignored: u32,
    pub cues: Vec<SoundCue>,
    pub grab_window: Vec<SeatId>,
    pub tap: Option<GrabTap>,
    pub tap_accepted: bool,
    pub grab_results: Vec<GrabResult>,
    pub game_ended: bool,
}

impl StopOutcome {
    #[must_use]
    pub fn heard(&self, cue: SoundCue) -> bool {
        self.cues.contains(&cue)
    }

    #[must_use]
    pub fn grab_won(&self) -> bool {
        self.grab_results.iter().any(GrabResult::is_player_winner)
    }
}

/// Frame-stepped harness around a [`SeatRushSession`] with a simulated clock.
pub struct SimulationSession {
    session: SeatRushSession<RecordingNotifier>,
    clock_ms: u64,
    frame_ms: u64,
}

impl SimulationSession {
    /// Start a ride for `config`.
    ///
    /// # Errors
    ///
    /// Fails when the configured route is not a valid ride.
    pub fn new(config: SimulationConfig) -> Result<Self> {
        let mut session = SeatRushSession::new(config.seed, RecordingNotifier::default());
        session.start_game(config.boarding, config.destination, config.difficulty)?;
        Ok(Self {
            session,
            clock_ms: 0,
            frame_ms: config.frame_ms.max(1),
        })
    }

    #[must_use]
    pub fn state(&self) -> Option<&GameState> {
        self.session.state()
    }

    #[must_use]
    pub const fn clock_ms(&self) -> u64 {
        self.clock_ms
    }

    /// Let the policy act at the current station, ride to the next one and
    /// play out any grab window that opens there.
    ///
    /// # Errors
    ///
    /// Fails when the ride is already over or a timer never settles.
    pub fn ride_one_stop(&mut self, policy: &mut dyn PlayerPolicy) -> Result<StopOutcome> {
        let mut outcome = StopOutcome::default();
        self.act_at_station(policy, &mut outcome)?;

        match self
            .session
            .dispatch(PlayerAction::AdvanceStation, self.clock_ms)?
        {
            ActionOutcome::Applied => {}
            other => bail!("advance was not accepted: {other:?}"),
        }
        self.run_transition(&mut outcome)?;

        if !outcome.grab_window.is_empty() {
            let state = self.current_state()?;
            outcome.tap = policy.on_grab_window(state, &outcome.grab_window);
            self.run_grab_window(&mut outcome)?;
        }

        outcome.cues = self.session.notifier_mut().drain();
        outcome.game_ended = self.current_state()?.is_terminal();
        log::debug!(
            "{} arrived at {:?}: cues {:?}",
            policy.name(),
            outcome.arrived_at,
            outcome.cues
        );
        Ok(outcome)
    }

    fn current_state(&self) -> Result<&GameState> {
        self.session
            .state()
            .ok_or_else(|| anyhow!("simulation has no ride in progress"))
    }

    fn act_at_station(
        &mut self,
        policy: &mut dyn PlayerPolicy,
        outcome: &mut StopOutcome,
    ) -> Result<()> {
        for _ in 0..MAX_POLICY_ROUNDS {
            let actions = policy.at_station(self.current_state()?);
            if actions.is_empty() {
                break;
            }
            for action in actions {
                match self.session.dispatch(action, self.clock_ms)? {
                    ActionOutcome::Applied => outcome.actions_applied += 1,
                    ActionOutcome::Queued | ActionOutcome::Ignored => outcome.actions_ignored += 1,
                }
            }
        }
        Ok(())
    }

    fn run_transition(&mut self, outcome: &mut StopOutcome) -> Result<()> {
        let started = self.clock_ms;
        loop {
            self.clock_ms += self.frame_ms;
            let report = self.session.tick(self.clock_ms);
            if let Some(station) = report.arrived_at {
                outcome.arrived_at = Some(station);
            }
            outcome.grab_window.extend(report.grab_window_opened);
            if report.phase_events.contains(&PhaseEvent::Completed) {
                return Ok(());
            }
            if self.clock_ms - started > MAX_WAIT_MS {
                bail!("station transition did not finish within {MAX_WAIT_MS}ms");
            }
        }
    }

    fn run_grab_window(&mut self, outcome: &mut StopOutcome) -> Result<()> {
        let opened = self.clock_ms;
        let mut pending_tap = outcome.tap;
        loop {
            self.clock_ms += self.frame_ms;
            if let Some(tap) = pending_tap
                && self.clock_ms >= opened + tap.delay_ms
            {
                pending_tap = None;
                let result = self
                    .session
                    .dispatch(PlayerAction::TapGrabSeat(tap.seat_id), self.clock_ms)?;
                outcome.tap_accepted = result == ActionOutcome::Applied;
            }
            let report = self.session.tick(self.clock_ms);
            if !report.grab_results.is_empty() {
                outcome.grab_results = report.grab_results;
                return Ok(());
            }
            if self.clock_ms - opened > MAX_WAIT_MS {
                bail!("grab window did not resolve within {MAX_WAIT_MS}ms");
            }
        }
    }

    /// Ride until the game ends, collecting every stop.
    ///
    /// # Errors
    ///
    /// Propagates [`Self::ride_one_stop`] failures, and fails if the ride
    /// outlasts the line.
    pub fn run_to_end(&mut self, policy: &mut dyn PlayerPolicy) -> Result<Vec<StopOutcome>> {
        let mut stops = Vec::new();
        let limit = usize::from(self.current_state()?.stations_remaining());
        while !self.current_state()?.is_terminal() {
            if stops.len() >= limit {
                bail!("ride did not end after {limit} stops");
            }
            stops.push(self.ride_one_stop(policy)?);
        }
        Ok(stops)
    }

    #[must_use]
    pub fn into_state(self) -> Option<GameState> {
        self.session.state().cloned()
    }
}

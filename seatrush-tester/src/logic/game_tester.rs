use std::sync::Arc;

use anyhow::{Result, anyhow};
use serde::{Deserialize, Serialize};
use seatrush_game::{
    Difficulty, GameState, GameStatus, LogNotifier, Notifier, SoundCue, StationIndex,
    last_station_index, station_name,
};

use crate::logic::policy::GameplayStrategy;
use crate::logic::simulation::{SimulationConfig, SimulationSession, StopOutcome};

const DEFAULT_FRAME_MS: u64 = 16;

/// Declarative plan for running a simulation session.
#[derive(Debug, Clone)]
pub struct SimulationPlan {
    pub difficulty: Difficulty,
    pub strategy: GameplayStrategy,
    pub boarding: StationIndex,
    pub destination: StationIndex,
    pub frame_ms: u64,
    pub expectations: Vec<SimulationExpectation>,
}

impl SimulationPlan {
    /// Full-line ride from the first station to the terminus.
    #[must_use]
    pub fn new(difficulty: Difficulty, strategy: GameplayStrategy) -> Self {
        Self {
            difficulty,
            strategy,
            boarding: 0,
            destination: last_station_index(),
            frame_ms: DEFAULT_FRAME_MS,
            expectations: Vec::new(),
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

    #[must_use]
    pub const fn with_difficulty(mut self, difficulty: Difficulty) -> Self {
        self.difficulty = difficulty;
        self
    }

    #[must_use]
    pub fn with_expectation(mut self, expectation: impl Into<SimulationExpectation>) -> Self {
        self.expectations.push(expectation.into());
        self
    }
}

/// Assertion hook run after a simulation completes.
type SimulationExpectationFn =
    Arc<dyn Fn(&SimulationSummary) -> Result<()> + Send + Sync + 'static>;

#[derive(Clone)]
pub struct SimulationExpectation(SimulationExpectationFn);

impl std::fmt::Debug for SimulationExpectation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SimulationExpectation").finish()
    }
}

impl SimulationExpectation {
    /// Run the check against a finished ride.
    ///
    /// # Errors
    ///
    /// Returns whatever the wrapped check reports.
    pub fn evaluate(&self, summary: &SimulationSummary) -> Result<()> {
        (self.0)(summary)
    }
}

impl<F> From<F> for SimulationExpectation
where
    F: Fn(&SimulationSummary) -> Result<()> + Send + Sync + 'static,
{
    fn from(f: F) -> Self {
        Self(Arc::new(f))
    }
}

/// Per-ride counters the playability report aggregates.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RideMetrics {
    pub stops: u32,
    pub departures: u32,
    pub passive_claims: u32,
    pub grab_windows: u32,
    pub taps: u32,
    pub grabs_won: u32,
    pub grabs_lost: u32,
    pub actions_applied: u32,
    pub actions_ignored: u32,
    /// Stops ridden standing before the first seat; `Some(0)` means seated at boarding.
    pub stops_before_seated: Option<u32>,
    pub final_status: GameStatus,
    pub simulated_ms: u64,
}

impl RideMetrics {
    fn record_stop(&mut self, stop: &StopOutcome, seated_now: bool) {
        let stops_before = self.stops;
        self.stops += 1;
        self.departures += u32::from(stop.heard(SoundCue::Departure));
        self.passive_claims += u32::from(stop.heard(SoundCue::PassiveClaim));
        self.actions_applied += stop.actions_applied;
        self.actions_ignored += stop.actions_ignored;
        if !stop.grab_window.is_empty() {
            self.grab_windows += 1;
            self.taps += u32::from(stop.tap_accepted);
            if stop.grab_won() {
                self.grabs_won += 1;
            } else {
                self.grabs_lost += 1;
            }
        }
        if seated_now && self.stops_before_seated.is_none() {
            self.stops_before_seated = Some(if stop.grab_won() {
                self.stops
            } else {
                stops_before
            });
        }
    }
}

/// Complete record of a simulation run.
#[derive(Debug, Clone)]
pub struct SimulationSummary {
    pub seed: u64,
    pub difficulty: Difficulty,
    pub strategy: GameplayStrategy,
    pub stops: Vec<StopOutcome>,
    pub metrics: RideMetrics,
    pub final_state: GameState,
    pub ending_message: String,
    pub game_ended: bool,
}

impl SimulationSummary {
    #[must_use]
    pub fn won(&self) -> bool {
        self.final_state.status == GameStatus::Won
    }

    /// Every cue the ride produced, in order.
    pub fn cues(&self) -> impl Iterator<Item = SoundCue> + '_ {
        self.stops.iter().flat_map(|stop| stop.cues.iter().copied())
    }
}

/// Headless deterministic runner for the core game logic.
#[derive(Debug, Clone, Copy)]
pub struct GameTester {
    verbose: bool,
}

impl GameTester {
    #[must_use]
    pub const fn new(verbose: bool) -> Self {
        Self { verbose }
    }

    #[must_use]
    pub const fn verbose(&self) -> bool {
        self.verbose
    }

    /// Ride `plan` to the end with `seed`.
    ///
    /// # Errors
    ///
    /// Fails when the plan's route is invalid or the session stalls.
    pub fn run_plan(&self, plan: &SimulationPlan, seed: u64) -> Result<SimulationSummary> {
        let config = SimulationConfig::new(plan.difficulty, plan.strategy, seed)
            .with_route(plan.boarding, plan.destination)
            .with_frame_ms(plan.frame_ms);
        let mut session = SimulationSession::new(config)?;
        let mut policy = plan.strategy.create_policy(seed);

        if self.verbose
            && let Some(state) = session.state()
        {
            log_initial_state(seed, plan, state);
        }

        let mut metrics = RideMetrics::default();
        let mut stops = Vec::new();
        let limit = session
            .state()
            .map_or(0, |state| usize::from(state.stations_remaining()));
        let mut cue_log = LogNotifier;
        while session.state().is_some_and(|state| !state.is_terminal()) {
            if stops.len() >= limit {
                return Err(anyhow!("ride did not end after {limit} stops"));
            }
            let stop = session.ride_one_stop(policy.as_mut())?;
            let seated = session.state().is_some_and(|state| state.player_seated);
            metrics.record_stop(&stop, seated);
            if self.verbose {
                for &cue in &stop.cues {
                    cue_log.notify(cue);
                }
            }
            stops.push(stop);
        }

        metrics.simulated_ms = session.clock_ms();
        let final_state = session
            .into_state()
            .ok_or_else(|| anyhow!("ride vanished before it finished"))?;
        metrics.final_status = final_state.status;
        let ending_message = ending_message(&final_state);
        log::debug!(
            "seed {seed} {} on {}: {ending_message}",
            plan.strategy,
            plan.difficulty
        );

        Ok(SimulationSummary {
            seed,
            difficulty: plan.difficulty,
            strategy: plan.strategy,
            stops,
            metrics,
            game_ended: final_state.is_terminal(),
            final_state,
            ending_message,
        })
    }
}

fn ending_message(state: &GameState) -> String {
    let station = station_name(state.current_station).unwrap_or("unknown station");
    match state.status {
        GameStatus::Won => format!("Seated on arrival at {station}"),
        GameStatus::Lost => format!("Still standing at {station}"),
        GameStatus::Playing => format!("Halted at {station}"),
    }
}

fn log_initial_state(seed: u64, plan: &SimulationPlan, state: &GameState) {
    println!(
        "🚆 Seed {seed}: {} riding {} -> {} ({} stops) on {} ({} seated, {} standing)",
        plan.strategy,
        station_name(plan.boarding).unwrap_or("?"),
        station_name(plan.destination).unwrap_or("?"),
        state.stations_remaining(),
        plan.difficulty,
        state.occupied_count(),
        state.standing.len()
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn expectations_see_the_finished_ride() {
        let plan = SimulationPlan::new(Difficulty::Rush, GameplayStrategy::Passive)
            .with_route(0, 3)
            .with_expectation(|summary: &SimulationSummary| {
                anyhow::ensure!(summary.game_ended, "ride should end");
                Ok(())
            });
        let summary = GameTester::new(false).run_plan(&plan, 11).unwrap();
        for expectation in &plan.expectations {
            expectation.evaluate(&summary).unwrap();
        }
        assert_eq!(summary.metrics.stops, 3);
        assert_eq!(summary.metrics.final_status, GameStatus::Lost);
        assert_eq!(summary.metrics.taps, 0);
        assert!(summary.ending_message.starts_with("Still standing"));
        assert_eq!(summary.cues().last(), Some(SoundCue::GameLost));
    }

    #[test]
    fn seating_at_boarding_counts_zero_standing_stops() {
        let plan = SimulationPlan::new(Difficulty::Easy, GameplayStrategy::Opportunist)
            .with_route(0, 2);
        let summary = GameTester::new(false).run_plan(&plan, 2).unwrap();
        assert!(summary.won());
        assert_eq!(summary.metrics.stops_before_seated, Some(0));
        assert_eq!(summary.metrics.grab_windows, 0);
    }

    #[test]
    fn verbose_runs_match_quiet_runs() {
        let plan = SimulationPlan::new(Difficulty::Normal, GameplayStrategy::Watcher)
            .with_route(2, 6);
        let quiet = GameTester::new(false).run_plan(&plan, 8).unwrap();
        let loud = GameTester::new(true).run_plan(&plan, 8).unwrap();
        assert_eq!(loud.metrics, quiet.metrics);
        assert_eq!(loud.metrics.stops, 4);
    }

    #[test]
    fn grab_windows_are_all_settled() {
        for seed in 0..12 {
            let plan = SimulationPlan::new(Difficulty::Normal, GameplayStrategy::Sprinter);
            let summary = GameTester::new(false).run_plan(&plan, seed).unwrap();
            let metrics = &summary.metrics;
            assert_eq!(metrics.grab_windows, metrics.grabs_won + metrics.grabs_lost);
            assert!(metrics.grabs_won <= 1, "a seated rider never sees another window");
            assert!(metrics.taps <= metrics.grab_windows);
        }
    }
}

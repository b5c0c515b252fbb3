use anyhow::Result;

pub mod catalog;

use crate::logic::game_tester::SimulationSummary;
use crate::logic::playability::full_line_plan;
use crate::logic::{GameplayStrategy, SimulationPlan};
use catalog::find_catalog_scenario;
use seatrush_game::{Difficulty, SoundCue, last_station_index};

// Logic test scenario
#[derive(Debug, Clone)]
pub struct TestScenario {
    pub name: String,
    pub plan: SimulationPlan,
}

impl TestScenario {
    #[must_use]
    pub fn simulation(name: impl Into<String>, plan: SimulationPlan) -> Self {
        Self {
            name: name.into(),
            plan,
        }
    }
}

#[derive(Debug, Clone)]
pub struct SimulationScenario {
    name: &'static str,
    plan: SimulationPlan,
}

impl SimulationScenario {
    #[must_use]
    pub const fn new(name: &'static str, plan: SimulationPlan) -> Self {
        Self { name, plan }
    }

    #[must_use]
    pub const fn name(&self) -> &'static str {
        self.name
    }

    /// Logic scenario with the plan's difficulty replaced.
    #[must_use]
    pub fn for_difficulty(&self, difficulty: Difficulty) -> TestScenario {
        TestScenario::simulation(self.name, self.plan.clone().with_difficulty(difficulty))
    }
}

fn smoke_expectation(summary: &SimulationSummary) -> Result<()> {
    anyhow::ensure!(summary.game_ended, "Smoke ride should finish");
    anyhow::ensure!(
        summary.metrics.stops == 3,
        "Smoke ride should take 3 stops, took {}",
        summary.metrics.stops
    );
    anyhow::ensure!(
        summary.cues().filter(|cue| *cue == SoundCue::Arrival).count() == 3,
        "Every stop should announce its arrival"
    );
    let last = summary.cues().last();
    anyhow::ensure!(
        matches!(last, Some(SoundCue::GameWon | SoundCue::GameLost)),
        "Ride should end on a game-over cue, got {last:?}"
    );
    Ok(())
}

fn smoke_scenario() -> SimulationScenario {
    SimulationScenario::new(
        "Smoke Test",
        SimulationPlan::new(Difficulty::Normal, GameplayStrategy::Watcher)
            .with_route(0, 3)
            .with_expectation(smoke_expectation),
    )
}

fn terminus_hop_expectation(summary: &SimulationSummary) -> Result<()> {
    anyhow::ensure!(summary.metrics.stops == 1, "Hop should be a single stop");
    anyhow::ensure!(
        summary.metrics.grab_windows == 0,
        "No grab window opens on arrival at the destination"
    );
    anyhow::ensure!(
        summary.metrics.passive_claims == 0,
        "Nobody claims a seat at the end of the line"
    );
    Ok(())
}

fn terminus_hop_scenario() -> SimulationScenario {
    let last = last_station_index();
    SimulationScenario::new(
        "Terminus Hop",
        SimulationPlan::new(Difficulty::Rush, GameplayStrategy::Sprinter)
            .with_route(last - 1, last)
            .with_expectation(terminus_hop_expectation),
    )
}

fn strategy_scenario(name: &'static str, strategy: GameplayStrategy) -> SimulationScenario {
    SimulationScenario::new(name, full_line_plan(Difficulty::Normal, strategy))
}

pub fn get_scenario(name: &str) -> Option<SimulationScenario> {
    match name.to_lowercase().as_str() {
        "smoke" => Some(smoke_scenario()),
        "terminus-hop" | "hop" => Some(terminus_hop_scenario()),
        "passive-rider" | "passive" => Some(strategy_scenario(
            "Full Line - Passive Rider",
            GameplayStrategy::Passive,
        )),
        "opportunist-rider" | "opportunist" => Some(strategy_scenario(
            "Full Line - Opportunist Rider",
            GameplayStrategy::Opportunist,
        )),
        "watcher-rider" | "watcher" => Some(strategy_scenario(
            "Full Line - Watcher Rider",
            GameplayStrategy::Watcher,
        )),
        "sprinter-rider" | "sprinter" => Some(strategy_scenario(
            "Full Line - Sprinter Rider",
            GameplayStrategy::Sprinter,
        )),

        // Engine checks
        "compartment-generation" | "generation" => {
            find_catalog_scenario("Compartment Generation")
        }
        "destination-reveal" | "reveal" => find_catalog_scenario("Destination Reveal"),
        "grab-resolution" | "grab" => find_catalog_scenario("Grab Resolution"),
        "phase-sequence" | "phases" => find_catalog_scenario("Phase Sequence Order"),
        "grab-window-timer" | "timer" => find_catalog_scenario("Grab Window Timer"),
        "difficulty-tags" | "difficulty" => find_catalog_scenario("Difficulty Tags"),
        "deterministic-replay" | "deterministic" => find_catalog_scenario("Deterministic Replay"),
        _ => None,
    }
}

pub fn list_scenarios() -> Vec<(&'static str, &'static str)> {
    vec![
        ("smoke", "Smoke Test"),
        ("terminus-hop", "Terminus Hop"),
        ("passive-rider", "Full Line - Passive Rider"),
        ("opportunist-rider", "Full Line - Opportunist Rider"),
        ("watcher-rider", "Full Line - Watcher Rider"),
        ("sprinter-rider", "Full Line - Sprinter Rider"),
        ("compartment-generation", "Compartment Generation"),
        ("destination-reveal", "Destination Reveal"),
        ("grab-resolution", "Grab Resolution"),
        ("phase-sequence", "Phase Sequence Order"),
        ("grab-window-timer", "Grab Window Timer"),
        ("difficulty-tags", "Difficulty Tags"),
        ("deterministic-replay", "Deterministic Replay"),
    ]
}

use anyhow::{Result, anyhow};
use rand::SeedableRng;
use rand_chacha::ChaCha20Rng;

use crate::common::scenario::SimulationScenario;
use crate::logic::game_tester::{GameTester, SimulationSummary};
use crate::logic::{GameplayStrategy, SimulationPlan};
use seatrush_game::constants::{GRAB_WINDOW_MS, MIN_EFFECTIVE_TIME_MS, SEAT_COUNT};
use seatrush_game::{
    Difficulty, GrabTick, GrabTimer, GrabWinner, PhaseEvent, PhaseSequencer, StandingCompetitor,
    TransitionCue, TransitionPhase, effective_time, generate, last_station_index, resolve_many,
    resolve_one, reveal_destination,
};

pub fn catalog_scenarios() -> Vec<SimulationScenario> {
    vec![
        SimulationScenario::new(
            "Compartment Generation",
            base_plan().with_expectation(compartment_generation_expectation),
        ),
        SimulationScenario::new(
            "Destination Reveal",
            base_plan().with_expectation(destination_reveal_expectation),
        ),
        SimulationScenario::new(
            "Grab Resolution",
            base_plan().with_expectation(grab_resolution_expectation),
        ),
        SimulationScenario::new(
            "Phase Sequence Order",
            base_plan().with_expectation(phase_sequence_expectation),
        ),
        SimulationScenario::new(
            "Grab Window Timer",
            base_plan().with_expectation(grab_window_timer_expectation),
        ),
        SimulationScenario::new(
            "Difficulty Tags",
            base_plan().with_expectation(difficulty_tags_expectation),
        ),
        SimulationScenario::new(
            "Deterministic Replay",
            base_plan().with_expectation(deterministic_replay_expectation),
        ),
    ]
}

pub fn find_catalog_scenario(name: &str) -> Option<SimulationScenario> {
    catalog_scenarios()
        .into_iter()
        .find(|scenario| scenario.name() == name)
}

fn base_plan() -> SimulationPlan {
    SimulationPlan::new(Difficulty::Normal, GameplayStrategy::Watcher).with_route(0, 2)
}

fn rival(id: &str, base_reaction_ms: f64, slot: u8) -> StandingCompetitor {
    StandingCompetitor {
        id: id.to_string(),
        watched_seat_id: None,
        base_reaction_ms,
        visual_variant: 0,
        slot,
    }
}

fn compartment_generation_expectation(summary: &SimulationSummary) -> Result<()> {
    let mut rng = ChaCha20Rng::seed_from_u64(summary.seed);
    let last = last_station_index();

    for boarding in 0..last {
        for destination in boarding + 1..=last {
            for difficulty in Difficulty::ALL {
                let state = generate(boarding, destination, difficulty, &mut rng);
                anyhow::ensure!(
                    state.seats.len() == usize::from(SEAT_COUNT),
                    "Compartment must have {SEAT_COUNT} seats"
                );
                let seated = u8::try_from(state.occupied_count())?;
                anyhow::ensure!(
                    difficulty.config().seated.contains(seated),
                    "{difficulty} seated {seated} riders outside its range"
                );
                anyhow::ensure!(
                    state
                        .seats
                        .iter()
                        .filter_map(|seat| seat.occupant.as_ref())
                        .all(|occupant| occupant.destination > boarding
                            && occupant.destination <= last),
                    "Seated riders must leave after boarding at {boarding}"
                );
                anyhow::ensure!(
                    !state.player_seated && state.player_seat_id.is_none(),
                    "The player boards standing"
                );
                anyhow::ensure!(
                    state
                        .standing
                        .iter()
                        .all(|competitor| competitor.slot != state.player_slot),
                    "Standers never share the player's slot"
                );
            }
        }
    }
    Ok(())
}

fn destination_reveal_expectation(summary: &SimulationSummary) -> Result<()> {
    let mut rng = ChaCha20Rng::seed_from_u64(summary.seed);
    let state = generate(0, 5, Difficulty::Normal, &mut rng);

    let seat = state
        .seats
        .iter()
        .find(|seat| seat.occupant.is_some())
        .ok_or_else(|| anyhow!("Normal rides always seat someone"))?;
    let once = reveal_destination(&state, seat.id);
    anyhow::ensure!(
        once.seat(seat.id)
            .and_then(|seat| seat.occupant.as_ref())
            .is_some_and(|occupant| occupant.destination_revealed),
        "Reveal should flag the occupant"
    );
    anyhow::ensure!(
        reveal_destination(&once, seat.id) == once,
        "Revealing twice should change nothing"
    );
    anyhow::ensure!(
        reveal_destination(&state, SEAT_COUNT + 3) == state,
        "Revealing an unknown seat should be a no-op"
    );
    Ok(())
}

fn grab_resolution_expectation(_summary: &SimulationSummary) -> Result<()> {
    anyhow::ensure!(
        (effective_time(0.0, true, true) - MIN_EFFECTIVE_TIME_MS).abs() < f64::EPSILON,
        "Effective time should floor at {MIN_EFFECTIVE_TIME_MS}ms"
    );
    anyhow::ensure!(
        effective_time(400.0, true, true) < effective_time(400.0, false, false),
        "Watching and reach should both speed a grab"
    );

    let rivals = [rival("stander-0", 500.0, 5), rival("stander-1", 300.0, 2)];
    let result = resolve_one(1, Some(100.0), 1, Some(1), &rivals);
    anyhow::ensure!(
        result.is_player_winner(),
        "A fast, watching, adjacent tap should beat the crowd"
    );

    let results = resolve_many(&[0, 4], None, None, 3, None, &rivals);
    anyhow::ensure!(results.len() == 2, "Every open seat should resolve");
    anyhow::ensure!(
        results[0].winner != results[1].winner,
        "A rider can win at most one seat"
    );

    let empty = resolve_one(2, None, 0, None, &[]);
    anyhow::ensure!(
        empty.winner == GrabWinner::Unclaimed,
        "A seat nobody reaches for stays open"
    );
    Ok(())
}

fn phase_sequence_expectation(_summary: &SimulationSummary) -> Result<()> {
    let mut sequencer: PhaseSequencer<u8> = PhaseSequencer::new();
    anyhow::ensure!(
        sequencer.start_transition(TransitionCue::default(), 0),
        "Idle sequencer should start"
    );
    anyhow::ensure!(
        !sequencer.start_transition(TransitionCue::default(), 1),
        "A running sequence cannot restart"
    );
    anyhow::ensure!(
        sequencer.queue_interaction(7).is_none(),
        "Interactions wait while animating"
    );

    let total: u64 = [
        TransitionPhase::Traveling,
        TransitionPhase::Arriving,
        TransitionPhase::Departing,
        TransitionPhase::Claiming,
        TransitionPhase::Settling,
    ]
    .iter()
    .filter_map(|phase| phase.duration_ms())
    .sum();
    let tick = sequencer.tick(total);
    let expected = vec![
        PhaseEvent::Entered(TransitionPhase::Arriving),
        PhaseEvent::Entered(TransitionPhase::Departing),
        PhaseEvent::Entered(TransitionPhase::Claiming),
        PhaseEvent::Entered(TransitionPhase::Settling),
        PhaseEvent::Completed,
    ];
    anyhow::ensure!(
        tick.events == expected,
        "Phases should run in order, got {:?}",
        tick.events
    );
    anyhow::ensure!(tick.drained == vec![7_u8], "Queued interactions drain once");
    anyhow::ensure!(sequencer.is_idle(), "Sequencer should rest at idle");
    Ok(())
}

fn grab_window_timer_expectation(_summary: &SimulationSummary) -> Result<()> {
    let mut rng = ChaCha20Rng::seed_from_u64(11);
    let mut state = generate(0, 4, Difficulty::Easy, &mut rng);
    state.standing.clear();

    let mut timer = GrabTimer::new();
    timer.start(&[], None, 0);
    anyhow::ensure!(!timer.is_active(), "No open seats, no window");

    timer.start(&[2, 4], Some(2), 1_000);
    anyhow::ensure!(!timer.tap(3, 1_100), "Taps on closed seats are refused");
    anyhow::ensure!(timer.tap(2, 1_200), "First tap on an open seat counts");
    anyhow::ensure!(!timer.tap(4, 1_300), "Only the first tap counts");

    anyhow::ensure!(
        matches!(timer.tick(1_500, &state), GrabTick::Counting { .. }),
        "Window should still be counting"
    );
    let GrabTick::Resolved(results) = timer.tick(1_000 + GRAB_WINDOW_MS, &state) else {
        anyhow::bail!("Window should resolve at its deadline");
    };
    anyhow::ensure!(
        results.first().is_some_and(|result| result.is_player_winner()),
        "Uncontested tap should win"
    );
    anyhow::ensure!(
        matches!(timer.tick(9_999, &state), GrabTick::Idle),
        "A window resolves only once"
    );
    Ok(())
}

fn difficulty_tags_expectation(_summary: &SimulationSummary) -> Result<()> {
    anyhow::ensure!(
        Difficulty::from_tag(None) == Difficulty::Normal,
        "Missing tag falls back to normal"
    );
    anyhow::ensure!(
        Difficulty::from_tag(Some("panic")) == Difficulty::Normal,
        "Unknown tag falls back to normal"
    );
    for difficulty in Difficulty::ALL {
        let parsed: Difficulty = difficulty.as_str().parse()?;
        anyhow::ensure!(parsed == difficulty, "{difficulty} should parse back");
        let cfg = difficulty.config();
        anyhow::ensure!(
            (0.0..=1.0).contains(&cfg.claim_probability),
            "{difficulty} claim probability out of range"
        );
    }
    anyhow::ensure!(
        Difficulty::Rush.config().reaction_ms.max <= Difficulty::Easy.config().reaction_ms.min,
        "Rush crowds should react faster than easy ones"
    );
    Ok(())
}

fn deterministic_replay_expectation(summary: &SimulationSummary) -> Result<()> {
    let replay = GameTester::new(false)
        .run_plan(&base_plan().with_difficulty(summary.difficulty), summary.seed)?;
    anyhow::ensure!(
        replay.metrics == summary.metrics,
        "Same seed should replay the same ride"
    );
    anyhow::ensure!(
        replay.final_state == summary.final_state,
        "Same seed should end in the same compartment"
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn catalog_expectations_pass_on_a_real_ride() {
        let tester = GameTester::new(false);
        for scenario in catalog_scenarios() {
            let test = scenario.for_difficulty(Difficulty::Normal);
            let summary = tester.run_plan(&test.plan, 1337).unwrap();
            for expectation in &test.plan.expectations {
                expectation
                    .evaluate(&summary)
                    .unwrap_or_else(|err| panic!("{}: {err}", scenario.name()));
            }
        }
    }

    #[test]
    fn catalog_lookup_by_name() {
        assert!(find_catalog_scenario("Grab Resolution").is_some());
        assert!(find_catalog_scenario("Share Codes").is_none());
    }
}

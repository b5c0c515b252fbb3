use anyhow::{Context, Result, ensure};
use serde::Serialize;
use std::collections::BTreeMap;

use crate::logic::game_tester::{GameTester, RideMetrics, SimulationPlan, SimulationSummary};
use crate::logic::policy::GameplayStrategy;
use seatrush_game::{Difficulty, last_station_index};

/// Warnings of one kind printed before the rest are only counted.
const WARN_LIMIT: usize = 3;

#[derive(Debug, Clone, Serialize)]
pub struct PlayabilityRecord {
    pub scenario_name: String,
    pub difficulty: Difficulty,
    pub strategy: GameplayStrategy,
    pub seed_value: u64,
    pub metrics: RideMetrics,
}

#[derive(Debug, Clone, Serialize)]
pub struct PlayabilityAggregate {
    pub scenario_name: String,
    pub difficulty: Difficulty,
    pub strategy: GameplayStrategy,
    pub iterations: usize,
    pub win_rate: f64,
    pub mean_stops_before_seated: f64,
    pub std_stops_before_seated: f64,
    pub mean_grab_windows: f64,
    pub grab_win_rate: f64,
    pub mean_passive_claims: f64,
    pub mean_departures: f64,
    pub never_seated_pct: f64,
}

pub fn run_playability_analysis(
    tester: &GameTester,
    seeds: &[u64],
    iterations: usize,
    difficulties: &[Difficulty],
) -> Result<Vec<PlayabilityRecord>> {
    let iterations = iterations.max(1);
    let mut records =
        Vec::with_capacity(seeds.len() * difficulties.len() * GameplayStrategy::ALL.len());

    for &difficulty in difficulties {
        for strategy in GameplayStrategy::ALL {
            let plan = full_line_plan(difficulty, strategy);
            for &seed in seeds {
                for iteration in 0..iterations {
                    let iteration_seed =
                        seed.wrapping_add(u64::try_from(iteration).unwrap_or(0));
                    let context = format!(
                        "Playability run failed for difficulty {difficulty}, strategy {strategy}, seed {seed} (iteration {})",
                        iteration + 1
                    );
                    let summary = tester
                        .run_plan(&plan, iteration_seed)
                        .with_context(|| context.clone())?;
                    for expectation in &plan.expectations {
                        expectation
                            .evaluate(&summary)
                            .with_context(|| context.clone())?;
                    }

                    records.push(PlayabilityRecord {
                        scenario_name: scenario_label(difficulty, strategy),
                        difficulty,
                        strategy,
                        seed_value: iteration_seed,
                        metrics: summary.metrics,
                    });
                }
            }
        }
    }

    Ok(records)
}

/// Ride the whole line with the invariants every strategy must respect.
#[must_use]
pub fn full_line_plan(difficulty: Difficulty, strategy: GameplayStrategy) -> SimulationPlan {
    let plan = SimulationPlan::new(difficulty, strategy)
        .with_expectation(ride_completes_expectation)
        .with_expectation(seat_is_kept_expectation);
    match strategy {
        GameplayStrategy::Passive => plan.with_expectation(passive_never_sits_expectation),
        GameplayStrategy::Opportunist | GameplayStrategy::Watcher | GameplayStrategy::Sprinter => {
            plan
        }
    }
}

fn ride_completes_expectation(summary: &SimulationSummary) -> Result<()> {
    let metrics = &summary.metrics;
    ensure!(summary.game_ended, "ride should reach a terminal status");
    let expected_stops = u32::from(
        summary
            .final_state
            .destination_station
            .saturating_sub(summary.final_state.boarding_station),
    );
    ensure!(
        metrics.stops == expected_stops,
        "ride took {} stops, expected {expected_stops}",
        metrics.stops
    );
    ensure!(
        metrics.grab_windows == metrics.grabs_won + metrics.grabs_lost,
        "every grab window must settle ({} windows, {} won, {} lost)",
        metrics.grab_windows,
        metrics.grabs_won,
        metrics.grabs_lost
    );
    Ok(())
}

fn seat_is_kept_expectation(summary: &SimulationSummary) -> Result<()> {
    let seated = summary.metrics.stops_before_seated.is_some();
    ensure!(
        seated == summary.won(),
        "a rider who finds a seat keeps it to the end (seated {seated}, status {})",
        summary.final_state.status
    );
    Ok(())
}

fn passive_never_sits_expectation(summary: &SimulationSummary) -> Result<()> {
    ensure!(!summary.won(), "a passive rider cannot win");
    ensure!(summary.metrics.taps == 0, "a passive rider never taps");
    Ok(())
}

fn scenario_label(difficulty: Difficulty, strategy: GameplayStrategy) -> String {
    format!("{} - {strategy}", difficulty_label(difficulty))
}

const fn difficulty_label(difficulty: Difficulty) -> &'static str {
    match difficulty {
        Difficulty::Easy => "Easy",
        Difficulty::Normal => "Normal",
        Difficulty::Rush => "Rush",
    }
}

fn push_limited_warn(warn_counts: &mut BTreeMap<String, usize>, key: &str, message: String) {
    let count = warn_counts.entry(key.to_string()).or_default();
    *count += 1;
    if *count <= WARN_LIMIT {
        log::warn!("{message}");
    } else if *count == WARN_LIMIT + 1 {
        log::warn!("further '{key}' warnings suppressed");
    }
}

fn emit_record_warnings(record: &PlayabilityRecord, warn_counts: &mut BTreeMap<String, usize>) {
    let metrics = &record.metrics;
    if record.strategy != GameplayStrategy::Passive && metrics.taps < metrics.grab_windows {
        push_limited_warn(
            warn_counts,
            "missed-taps",
            format!(
                "{} seed {} tapped {} of {} grab windows",
                record.scenario_name, record.seed_value, metrics.taps, metrics.grab_windows
            ),
        );
    }
    if metrics.actions_ignored > 0 {
        push_limited_warn(
            warn_counts,
            "ignored-actions",
            format!(
                "{} seed {} had {} ignored actions",
                record.scenario_name, record.seed_value, metrics.actions_ignored
            ),
        );
    }
}

pub fn aggregate_playability(records: &[PlayabilityRecord]) -> Vec<PlayabilityAggregate> {
    let mut aggregates: BTreeMap<(Difficulty, GameplayStrategy), AggregateBuilder> =
        BTreeMap::new();
    let mut warn_counts: BTreeMap<String, usize> = BTreeMap::new();

    for record in records {
        aggregates
            .entry((record.difficulty, record.strategy))
            .or_insert_with(|| AggregateBuilder::new(record))
            .ingest(&record.metrics);
        emit_record_warnings(record, &mut warn_counts);
    }

    aggregates
        .into_values()
        .map(AggregateBuilder::finish)
        .collect()
}

pub fn validate_playability_targets(
    aggregates: &[PlayabilityAggregate],
    records: &[PlayabilityRecord],
) -> Result<()> {
    for aggregate in aggregates {
        for (label, rate) in [
            ("win rate", aggregate.win_rate),
            ("grab win rate", aggregate.grab_win_rate),
            ("never-seated share", aggregate.never_seated_pct),
        ] {
            ensure!(
                (0.0..=1.0).contains(&rate),
                "{} {label} {rate} outside [0, 1]",
                aggregate.scenario_name
            );
        }
        ensure!(
            (aggregate.win_rate + aggregate.never_seated_pct - 1.0).abs() < 1e-9,
            "{} wins and never-seated rides must partition the runs",
            aggregate.scenario_name
        );
        if aggregate.strategy == GameplayStrategy::Passive {
            ensure!(
                aggregate.win_rate == 0.0,
                "{} won {:.0}% of rides without reaching for a seat",
                aggregate.scenario_name,
                aggregate.win_rate * 100.0
            );
        }
    }

    let max_stops = u32::from(last_station_index());
    for record in records {
        ensure!(
            record.metrics.stops <= max_stops,
            "{} seed {} rode {} stops on a {max_stops}-stop line",
            record.scenario_name,
            record.seed_value,
            record.metrics.stops
        );
        if let Some(stops) = record.metrics.stops_before_seated {
            ensure!(
                stops <= record.metrics.stops,
                "{} seed {} sat down after the ride ended",
                record.scenario_name,
                record.seed_value
            );
        }
    }
    Ok(())
}

#[derive(Debug, Clone)]
struct AggregateBuilder {
    scenario_name: String,
    difficulty: Difficulty,
    strategy: GameplayStrategy,
    stats_seated: RunningStats,
    iterations: u32,
    wins: u32,
    never_seated: u32,
    grab_window_sum: u32,
    grabs_won_sum: u32,
    passive_claim_sum: u32,
    departure_sum: u32,
}

impl AggregateBuilder {
    fn new(record: &PlayabilityRecord) -> Self {
        Self {
            scenario_name: record.scenario_name.clone(),
            difficulty: record.difficulty,
            strategy: record.strategy,
            stats_seated: RunningStats::default(),
            iterations: 0,
            wins: 0,
            never_seated: 0,
            grab_window_sum: 0,
            grabs_won_sum: 0,
            passive_claim_sum: 0,
            departure_sum: 0,
        }
    }

    fn ingest(&mut self, metrics: &RideMetrics) {
        self.iterations += 1;
        if metrics.final_status == seatrush_game::GameStatus::Won {
            self.wins += 1;
        }
        match metrics.stops_before_seated {
            Some(stops) => self.stats_seated.add(f64::from(stops)),
            None => self.never_seated += 1,
        }
        self.grab_window_sum = self.grab_window_sum.saturating_add(metrics.grab_windows);
        self.grabs_won_sum = self.grabs_won_sum.saturating_add(metrics.grabs_won);
        self.passive_claim_sum = self
            .passive_claim_sum
            .saturating_add(metrics.passive_claims);
        self.departure_sum = self.departure_sum.saturating_add(metrics.departures);
    }

    fn finish(self) -> PlayabilityAggregate {
        let iterations = usize::try_from(self.iterations).unwrap_or(usize::MAX);
        let denom = f64::from(self.iterations.max(1));
        PlayabilityAggregate {
            scenario_name: self.scenario_name,
            difficulty: self.difficulty,
            strategy: self.strategy,
            iterations,
            win_rate: f64::from(self.wins) / denom,
            mean_stops_before_seated: self.stats_seated.mean(),
            std_stops_before_seated: self.stats_seated.std_dev(),
            mean_grab_windows: f64::from(self.grab_window_sum) / denom,
            grab_win_rate: if self.grab_window_sum == 0 {
                0.0
            } else {
                f64::from(self.grabs_won_sum) / f64::from(self.grab_window_sum)
            },
            mean_passive_claims: f64::from(self.passive_claim_sum) / denom,
            mean_departures: f64::from(self.departure_sum) / denom,
            never_seated_pct: f64::from(self.never_seated) / denom,
        }
    }
}

#[derive(Debug, Default, Clone)]
struct RunningStats {
    count: u32,
    mean: f64,
    m2: f64,
}

impl RunningStats {
    fn add(&mut self, value: f64) {
        self.count += 1;
        let count = f64::from(self.count);
        let delta = value - self.mean;
        self.mean += delta / count;
        let delta2 = value - self.mean;
        self.m2 += delta * delta2;
    }

    const fn mean(&self) -> f64 {
        if self.count == 0 { 0.0 } else { self.mean }
    }

    fn variance(&self) -> f64 {
        if self.count > 1 {
            self.m2 / f64::from(self.count - 1)
        } else {
            0.0
        }
    }

    fn std_dev(&self) -> f64 {
        self.variance().sqrt()
    }
}

use std::fmt;
use std::str::FromStr;

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha20Rng;
use seatrush_game::state::is_adjacent;
use seatrush_game::{GameState, PlayerAction, SeatId};
use serde::{Deserialize, Serialize};

/// Tap the policy wants to make once a grab window opens.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GrabTap {
    pub seat_id: SeatId,
    /// Milliseconds after the window opens.
    pub delay_ms: u64,
}

/// Policy interface for automated riders.
pub trait PlayerPolicy {
    /// Name used for logging/debug output.
    fn name(&self) -> &'static str;

    /// Actions to take while the train is standing at a station. Called
    /// repeatedly until it returns nothing.
    fn at_station(&mut self, state: &GameState) -> Vec<PlayerAction>;

    /// Pick a seat to tap in a freshly opened grab window.
    fn on_grab_window(&mut self, state: &GameState, open_seat_ids: &[SeatId]) -> Option<GrabTap>;
}

/// Built-in riding strategies for automated runs.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum GameplayStrategy {
    /// Never reaches for a seat.
    Passive,
    /// Sits in any free seat, taps slowly.
    Opportunist,
    /// Asks riders where they get off and watches the next seat to open.
    Watcher,
    /// Taps the closest open seat as fast as possible.
    Sprinter,
}

impl GameplayStrategy {
    pub const ALL: [Self; 4] = [
        Self::Passive,
        Self::Opportunist,
        Self::Watcher,
        Self::Sprinter,
    ];

    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Passive => "Passive",
            Self::Opportunist => "Opportunist",
            Self::Watcher => "Watcher",
            Self::Sprinter => "Sprinter",
        }
    }

    #[must_use]
    pub fn create_policy(self, seed: u64) -> Box<dyn PlayerPolicy + Send> {
        match self {
            Self::Passive => Box::new(PassivePolicy),
            Self::Opportunist => Box::new(OpportunistPolicy {
                reflexes: Reflexes::new(seed, 450, 900),
            }),
            Self::Watcher => Box::new(WatcherPolicy {
                reflexes: Reflexes::new(seed, 250, 500),
                watching: None,
            }),
            Self::Sprinter => Box::new(SprinterPolicy {
                reflexes: Reflexes::new(seed, 120, 320),
            }),
        }
    }
}

impl fmt::Display for GameplayStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for GameplayStrategy {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|strategy| strategy.label().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| anyhow::anyhow!("unknown strategy '{s}'"))
    }
}

/// Seeded human-like tap latency.
struct Reflexes {
    rng: ChaCha20Rng,
    min_ms: u64,
    max_ms: u64,
}

impl Reflexes {
    fn new(seed: u64, min_ms: u64, max_ms: u64) -> Self {
        Self {
            rng: ChaCha20Rng::seed_from_u64(seed),
            min_ms,
            max_ms,
        }
    }

    fn delay(&mut self) -> u64 {
        self.rng.gen_range(self.min_ms..=self.max_ms)
    }
}

fn sit_if_free(state: &GameState) -> Vec<PlayerAction> {
    if state.player_seated {
        return Vec::new();
    }
    state
        .free_seat_ids()
        .first()
        .map(|&seat| vec![PlayerAction::ClaimSeat(seat)])
        .unwrap_or_default()
}

/// Adjacent seats first, then by id.
fn closest_open(state: &GameState, open_seat_ids: &[SeatId]) -> Option<SeatId> {
    open_seat_ids
        .iter()
        .copied()
        .min_by_key(|&seat| (!is_adjacent(state.player_slot, seat), seat))
}

struct PassivePolicy;

struct OpportunistPolicy {
    reflexes: Reflexes,
}

struct WatcherPolicy {
    reflexes: Reflexes,
    watching: Option<SeatId>,
}

struct SprinterPolicy {
    reflexes: Reflexes,
}

impl PlayerPolicy for PassivePolicy {
    fn name(&self) -> &'static str {
        "Passive"
    }

    fn at_station(&mut self, _state: &GameState) -> Vec<PlayerAction> {
        Vec::new()
    }

    fn on_grab_window(&mut self, _state: &GameState, _open: &[SeatId]) -> Option<GrabTap> {
        None
    }
}

impl PlayerPolicy for OpportunistPolicy {
    fn name(&self) -> &'static str {
        "Opportunist"
    }

    fn at_station(&mut self, state: &GameState) -> Vec<PlayerAction> {
        sit_if_free(state)
    }

    fn on_grab_window(&mut self, _state: &GameState, open: &[SeatId]) -> Option<GrabTap> {
        open.first().map(|&seat_id| GrabTap {
            seat_id,
            delay_ms: self.reflexes.delay(),
        })
    }
}

impl WatcherPolicy {
    /// Seat whose revealed rider gets off soonest; lowest id on ties.
    fn soonest_vacancy(state: &GameState) -> Option<SeatId> {
        state
            .seats
            .iter()
            .filter_map(|seat| {
                seat.occupant
                    .as_ref()
                    .filter(|occupant| occupant.destination_revealed)
                    .map(|occupant| (occupant.destination, seat.id))
            })
            .min()
            .map(|(_, seat)| seat)
    }
}

impl PlayerPolicy for WatcherPolicy {
    fn name(&self) -> &'static str {
        "Watcher"
    }

    fn at_station(&mut self, state: &GameState) -> Vec<PlayerAction> {
        let sit = sit_if_free(state);
        if !sit.is_empty() || state.player_seated {
            return sit;
        }

        let unrevealed: Vec<PlayerAction> = state
            .seats
            .iter()
            .filter(|seat| {
                seat.occupant
                    .as_ref()
                    .is_some_and(|occupant| !occupant.destination_revealed)
            })
            .map(|seat| PlayerAction::RevealDestination(seat.id))
            .collect();
        if !unrevealed.is_empty() {
            return unrevealed;
        }

        let target = Self::soonest_vacancy(state);
        if target.is_some() && state.watched_seat_id != target {
            self.watching = target;
            return vec![PlayerAction::WatchSeat(target)];
        }
        Vec::new()
    }

    fn on_grab_window(&mut self, state: &GameState, open: &[SeatId]) -> Option<GrabTap> {
        let seat_id = self
            .watching
            .take()
            .filter(|seat| open.contains(seat))
            .or_else(|| closest_open(state, open))?;
        Some(GrabTap {
            seat_id,
            delay_ms: self.reflexes.delay(),
        })
    }
}

impl PlayerPolicy for SprinterPolicy {
    fn name(&self) -> &'static str {
        "Sprinter"
    }

    fn at_station(&mut self, state: &GameState) -> Vec<PlayerAction> {
        sit_if_free(state)
    }

    fn on_grab_window(&mut self, state: &GameState, open: &[SeatId]) -> Option<GrabTap> {
        closest_open(state, open).map(|seat_id| GrabTap {
            seat_id,
            delay_ms: self.reflexes.delay(),
        })
    }
}

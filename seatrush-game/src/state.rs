//! Aggregate game state and the passengers that populate it.
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::constants::{SEAT_COUNT, SEATS_PER_BENCH, STANDING_SLOT_COUNT};
use crate::difficulty::Difficulty;
use crate::stations::StationIndex;

/// Seat identifier, `0..SEAT_COUNT`.
pub type SeatId = u8;
/// Standing position along the aisle, `0..STANDING_SLOT_COUNT`.
pub type SlotId = u8;

/// Seated passenger with a known (possibly hidden) stop.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Occupant {
    pub id: String,
    pub destination: StationIndex,
    #[serde(default)]
    pub destination_revealed: bool,
    pub visual_variant: u8,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Seat {
    pub id: SeatId,
    #[serde(default)]
    pub occupant: Option<Occupant>,
}

impl Seat {
    #[must_use]
    pub const fn empty(id: SeatId) -> Self {
        Self { id, occupant: None }
    }

    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.occupant.is_none()
    }
}

/// Passenger on their feet, competing for the next free seat.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StandingCompetitor {
    pub id: String,
    #[serde(default)]
    pub watched_seat_id: Option<SeatId>,
    pub base_reaction_ms: f64,
    pub visual_variant: u8,
    pub slot: SlotId,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum GameStatus {
    #[default]
    Playing,
    Won,
    Lost,
}

impl GameStatus {
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        !matches!(self, Self::Playing)
    }
}

impl fmt::Display for GameStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Playing => "playing",
            Self::Won => "won",
            Self::Lost => "lost",
        })
    }
}

/// Aggregate root for a single ride.
///
/// Engine functions take `&GameState` and return a fresh value; nothing
/// mutates a state that has already been handed out.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GameState {
    pub current_station: StationIndex,
    pub boarding_station: StationIndex,
    pub destination_station: StationIndex,
    pub player_seated: bool,
    #[serde(default)]
    pub player_seat_id: Option<SeatId>,
    pub player_slot: SlotId,
    pub seats: Vec<Seat>,
    #[serde(default)]
    pub standing: Vec<StandingCompetitor>,
    #[serde(default)]
    pub watched_seat_id: Option<SeatId>,
    pub difficulty: Difficulty,
    #[serde(default)]
    pub status: GameStatus,
    #[serde(default)]
    pub last_claim_message: Option<String>,
    #[serde(default)]
    pub next_spawn_id: u32,
}

impl GameState {
    /// Bare compartment at `boarding` with every seat empty and nobody standing.
    #[must_use]
    pub fn empty(
        boarding: StationIndex,
        destination: StationIndex,
        difficulty: Difficulty,
        player_slot: SlotId,
    ) -> Self {
        Self {
            current_station: boarding,
            boarding_station: boarding,
            destination_station: destination,
            player_seated: false,
            player_seat_id: None,
            player_slot,
            seats: (0..SEAT_COUNT).map(Seat::empty).collect(),
            standing: Vec::new(),
            watched_seat_id: None,
            difficulty,
            status: GameStatus::Playing,
            last_claim_message: None,
            next_spawn_id: 0,
        }
    }

    #[must_use]
    pub fn seat(&self, id: SeatId) -> Option<&Seat> {
        self.seats.get(usize::from(id))
    }

    pub(crate) fn seat_mut(&mut self, id: SeatId) -> Option<&mut Seat> {
        self.seats.get_mut(usize::from(id))
    }

    /// True only for a seat that exists and has no occupant. The player's
    /// own seat counts as taken.
    #[must_use]
    pub fn is_seat_free(&self, id: SeatId) -> bool {
        self.seat(id).is_some_and(Seat::is_empty) && self.player_seat_id != Some(id)
    }

    #[must_use]
    pub fn occupied_count(&self) -> usize {
        self.seats.iter().filter(|seat| !seat.is_empty()).count()
    }

    #[must_use]
    pub fn free_seat_ids(&self) -> Vec<SeatId> {
        self.seats
            .iter()
            .map(|seat| seat.id)
            .filter(|&id| self.is_seat_free(id))
            .collect()
    }

    #[must_use]
    pub const fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    #[must_use]
    pub const fn stations_remaining(&self) -> StationIndex {
        self.destination_station
            .saturating_sub(self.current_station)
    }

    /// Standing slots not taken by the player or a competitor, ascending.
    #[must_use]
    pub fn free_standing_slots(&self) -> Vec<SlotId> {
        (0..STANDING_SLOT_COUNT)
            .filter(|&slot| slot != self.player_slot)
            .filter(|&slot| self.standing.iter().all(|c| c.slot != slot))
            .collect()
    }

    /// Mint a session-unique passenger id.
    pub(crate) fn mint_id(&mut self, prefix: &str) -> String {
        let id = format!("{prefix}-{}", self.next_spawn_id);
        self.next_spawn_id = self.next_spawn_id.saturating_add(1);
        id
    }
}

/// Whether a standing slot is within arm's reach of a seat: same bench and at
/// most one position apart.
#[must_use]
pub const fn is_adjacent(slot: SlotId, seat: SeatId) -> bool {
    slot / SEATS_PER_BENCH == seat / SEATS_PER_BENCH && slot.abs_diff(seat) <= 1
}

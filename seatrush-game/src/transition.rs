//! Station advancement, departures, passive claims and player seat actions.
//!
//! Every function returns a new [`GameState`]. Advancement is split in two:
//! [`preview_advance`] draws all randomness and describes what will happen so
//! animation can start early, and [`apply_advance`] replays that description
//! without further draws.
use rand::Rng;
use rand::seq::SliceRandom;
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;

use crate::constants::{STANDING_ID_PREFIX, STANDING_VARIANT_POOL};
use crate::generator::{draw_destination, fresh_occupant_variant, spawn_competitor, wrap_variant};
use crate::grab::{GrabResult, GrabWinner};
use crate::state::{GameState, GameStatus, Occupant, SeatId, StandingCompetitor};
use crate::stations::StationIndex;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Departure {
    pub seat_id: SeatId,
    pub occupant_id: String,
}

/// A standing passenger sliding into a seat freed this stop.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PassiveClaim {
    pub competitor_id: String,
    pub seat_id: SeatId,
    pub destination: StationIndex,
    pub visual_variant: u8,
}

/// Everything one station advance will do, drawn up front.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AdvancePreview {
    pub from_station: StationIndex,
    pub next_station: StationIndex,
    pub departing: SmallVec<[Departure; 4]>,
    pub claim: Option<PassiveClaim>,
    pub boarding: SmallVec<[StandingCompetitor; 2]>,
}

impl AdvancePreview {
    #[must_use]
    pub fn departing_ids(&self) -> Vec<String> {
        self.departing
            .iter()
            .map(|d| d.occupant_id.clone())
            .collect()
    }

    #[must_use]
    pub fn claiming_id(&self) -> Option<&str> {
        self.claim.as_ref().map(|c| c.competitor_id.as_str())
    }

    #[must_use]
    pub fn claimed_seat_id(&self) -> Option<SeatId> {
        self.claim.as_ref().map(|c| c.seat_id)
    }

    /// Seats emptied this stop that the passive claim did not refill.
    #[must_use]
    pub fn open_seat_ids(&self) -> Vec<SeatId> {
        self.departing
            .iter()
            .map(|d| d.seat_id)
            .filter(|&id| self.claimed_seat_id() != Some(id))
            .collect()
    }
}

/// Describe the next advance without touching `state`.
///
/// Must only be called while the game is still playing.
pub fn preview_advance<R: Rng + ?Sized>(state: &GameState, rng: &mut R) -> AdvancePreview {
    debug_assert!(!state.is_terminal(), "advancing a finished ride");
    let cfg = state.difficulty.config();
    let next_station = state.current_station.saturating_add(1);

    let departing: SmallVec<[Departure; 4]> = state
        .seats
        .iter()
        .filter_map(|seat| {
            seat.occupant
                .as_ref()
                .filter(|occupant| occupant.destination <= next_station)
                .map(|occupant| Departure {
                    seat_id: seat.id,
                    occupant_id: occupant.id.clone(),
                })
        })
        .collect();

    // The ride ends on this advance, so nobody claims.
    let mut claim = None;
    let claimable = next_station < state.destination_station;
    for departure in departing.iter().filter(|_| claimable) {
        if state.watched_seat_id == Some(departure.seat_id) {
            continue;
        }
        let draw: f64 = rng.gen_range(0.0..1.0);
        if draw < cfg.claim_probability
            && let Some(head) = state.standing.first()
        {
            let in_use: Vec<u8> = state
                .seats
                .iter()
                .filter_map(|seat| seat.occupant.as_ref())
                .filter(|occupant| occupant.destination > next_station)
                .map(|occupant| occupant.visual_variant)
                .collect();
            claim = Some(PassiveClaim {
                competitor_id: head.id.clone(),
                seat_id: departure.seat_id,
                destination: draw_destination(next_station, rng),
                visual_variant: fresh_occupant_variant(&in_use, rng),
            });
            break;
        }
    }

    let boarding = draw_boarders(state, next_station, claim.as_ref(), rng);

    AdvancePreview {
        from_station: state.current_station,
        next_station,
        departing,
        claim,
        boarding,
    }
}

fn draw_boarders<R: Rng + ?Sized>(
    state: &GameState,
    next_station: StationIndex,
    claim: Option<&PassiveClaim>,
    rng: &mut R,
) -> SmallVec<[StandingCompetitor; 2]> {
    let cfg = state.difficulty.config();
    let mut boarders = SmallVec::new();
    if cfg.boarding.max_per_station == 0 || !rng.gen_bool(cfg.boarding.chance) {
        return boarders;
    }

    let claimant_slot = claim.and_then(|c| {
        state
            .standing
            .iter()
            .find(|s| s.id == c.competitor_id)
            .map(|s| s.slot)
    });
    let mut slots = state.free_standing_slots();
    slots.extend(claimant_slot);
    slots.sort_unstable();
    slots.shuffle(rng);

    let count = usize::from(rng.gen_range(1..=cfg.boarding.max_per_station)).min(slots.len());
    let occupied_after: Vec<SeatId> = state
        .seats
        .iter()
        .filter(|seat| {
            seat.occupant
                .as_ref()
                .is_some_and(|o| o.destination > next_station)
        })
        .map(|seat| seat.id)
        .chain(claim.map(|c| c.seat_id))
        .collect();

    let offset = u8::try_from(state.next_spawn_id % u32::from(STANDING_VARIANT_POOL)).unwrap_or(0);
    for (n, &slot) in slots.iter().take(count).enumerate() {
        let serial = state.next_spawn_id.saturating_add(u32::try_from(n).unwrap_or(u32::MAX));
        let id = format!("{STANDING_ID_PREFIX}-{serial}");
        boarders.push(spawn_competitor(
            id,
            cfg,
            slot,
            wrap_variant(offset, n),
            &occupied_after,
            rng,
        ));
    }
    boarders
}

/// Apply a preview produced from this same `state`.
#[must_use]
pub fn apply_advance(state: &GameState, preview: &AdvancePreview) -> GameState {
    debug_assert_eq!(
        state.current_station, preview.from_station,
        "preview was drawn for a different stop"
    );
    let mut next = state.clone();
    next.current_station = preview.next_station;
    next.watched_seat_id = None;
    next.last_claim_message = None;

    for departure in &preview.departing {
        if let Some(seat) = next.seat_mut(departure.seat_id) {
            seat.occupant = None;
        }
    }

    if let Some(claim) = &preview.claim
        && let Some(pos) = next.standing.iter().position(|c| c.id == claim.competitor_id)
    {
        let competitor = next.standing.remove(pos);
        if let Some(seat) = next.seat_mut(claim.seat_id) {
            seat.occupant = Some(Occupant {
                id: competitor.id,
                destination: claim.destination,
                destination_revealed: false,
                visual_variant: claim.visual_variant,
            });
        }
        next.last_claim_message = Some(format!(
            "A standing passenger grabbed seat {} before you could.",
            claim.seat_id + 1
        ));
    }

    next.standing.extend(preview.boarding.iter().cloned());
    let boarded = u32::try_from(preview.boarding.len()).unwrap_or(u32::MAX);
    next.next_spawn_id = next.next_spawn_id.saturating_add(boarded);

    if next.current_station >= next.destination_station {
        next.status = if next.player_seated {
            GameStatus::Won
        } else {
            GameStatus::Lost
        };
    }
    next
}

/// Move the train one stop. Must only be called while the game is playing.
pub fn advance<R: Rng + ?Sized>(state: &GameState, rng: &mut R) -> GameState {
    let preview = preview_advance(state, rng);
    apply_advance(state, &preview)
}

/// Ask the passenger in `seat_id` where they get off. Empty or unknown
/// seats leave the state unchanged.
#[must_use]
pub fn reveal_destination(state: &GameState, seat_id: SeatId) -> GameState {
    let mut next = state.clone();
    if let Some(occupant) = next
        .seat_mut(seat_id)
        .and_then(|seat| seat.occupant.as_mut())
    {
        occupant.destination_revealed = true;
    }
    next
}

/// Seat the player. The caller is responsible for checking the seat is free.
#[must_use]
pub fn claim_seat(state: &GameState, seat_id: SeatId) -> GameState {
    let mut next = state.clone();
    next.player_seated = true;
    next.player_seat_id = Some(seat_id);
    next.watched_seat_id = None;
    next
}

/// Point the player's attention at a seat, or clear it. Unknown seat ids
/// clear the selection.
#[must_use]
pub fn set_watched_seat(state: &GameState, seat_id: Option<SeatId>) -> GameState {
    let mut next = state.clone();
    next.watched_seat_id = seat_id.filter(|&id| next.seat(id).is_some());
    next
}

/// Seat the winners of a resolved grab window.
pub fn apply_grab_results<R: Rng + ?Sized>(
    state: &GameState,
    results: &[GrabResult],
    rng: &mut R,
) -> GameState {
    let mut next = state.clone();
    let mut lost_to_others = Vec::new();
    for result in results {
        match &result.winner {
            GrabWinner::Player => next = claim_seat(&next, result.seat_id),
            GrabWinner::Competitor(id) => {
                let Some(pos) = next.standing.iter().position(|c| &c.id == id) else {
                    continue;
                };
                if !next.is_seat_free(result.seat_id) {
                    continue;
                }
                let competitor = next.standing.remove(pos);
                let in_use: Vec<u8> = next
                    .seats
                    .iter()
                    .filter_map(|seat| seat.occupant.as_ref().map(|o| o.visual_variant))
                    .collect();
                let occupant = Occupant {
                    id: competitor.id,
                    destination: draw_destination(next.current_station, rng),
                    destination_revealed: false,
                    visual_variant: fresh_occupant_variant(&in_use, rng),
                };
                if let Some(seat) = next.seat_mut(result.seat_id) {
                    seat.occupant = Some(occupant);
                }
                lost_to_others.push(result.seat_id + 1);
            }
            GrabWinner::Unclaimed => {}
        }
    }
    if !lost_to_others.is_empty() {
        let seats = lost_to_others
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join(", ");
        next.last_claim_message = Some(format!("Other passengers were quicker to seat {seats}."));
    }
    next
}

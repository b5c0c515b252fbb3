//! Procedural population of a fresh compartment.
use rand::Rng;
use rand::seq::{IteratorRandom, SliceRandom};

use crate::constants::{
    OCCUPANT_ID_PREFIX, OCCUPANT_VARIANT_POOL, SEAT_COUNT, STANDING_ID_PREFIX,
    STANDING_SLOT_COUNT, STANDING_VARIANT_POOL,
};
use crate::difficulty::{Difficulty, DifficultyConfig};
use crate::state::{GameState, Occupant, SeatId, SlotId, StandingCompetitor};
use crate::stations::{StationIndex, is_valid_route, last_station_index};

/// Build the opening state for a ride from `boarding` to `destination`.
///
/// The route must satisfy [`is_valid_route`]; the caller validates external
/// input before it reaches the engine.
pub fn generate<R: Rng + ?Sized>(
    boarding: StationIndex,
    destination: StationIndex,
    difficulty: Difficulty,
    rng: &mut R,
) -> GameState {
    debug_assert!(
        is_valid_route(boarding, destination),
        "route {boarding}->{destination} must move forward on the line"
    );
    let cfg = difficulty.config();
    let player_slot = rng.gen_range(0..STANDING_SLOT_COUNT);
    let mut state = GameState::empty(boarding, destination, difficulty, player_slot);

    seat_initial_riders(&mut state, cfg, rng);
    place_initial_standers(&mut state, cfg, rng);

    log::debug!(
        "generated {difficulty} ride {boarding}->{destination}: {} seated, {} standing",
        state.occupied_count(),
        state.standing.len()
    );
    state
}

fn seat_initial_riders<R: Rng + ?Sized>(
    state: &mut GameState,
    cfg: &DifficultyConfig,
    rng: &mut R,
) {
    let count = cfg.seated.sample(rng).min(SEAT_COUNT);
    let mut seat_ids: Vec<SeatId> = (0..SEAT_COUNT).collect();
    seat_ids.shuffle(rng);
    let mut variants: Vec<u8> = (0..OCCUPANT_VARIANT_POOL).collect();
    variants.shuffle(rng);

    let boarding = state.boarding_station;
    for (n, &seat_id) in seat_ids.iter().take(usize::from(count)).enumerate() {
        let occupant = Occupant {
            id: state.mint_id(OCCUPANT_ID_PREFIX),
            destination: draw_destination(boarding, rng),
            destination_revealed: false,
            visual_variant: variants[n % variants.len()],
        };
        if let Some(seat) = state.seat_mut(seat_id) {
            seat.occupant = Some(occupant);
        }
    }
}

fn place_initial_standers<R: Rng + ?Sized>(
    state: &mut GameState,
    cfg: &DifficultyConfig,
    rng: &mut R,
) {
    let mut slots = state.free_standing_slots();
    slots.shuffle(rng);
    let count = usize::from(cfg.standing.sample(rng)).min(slots.len());
    let offset = rng.gen_range(0..STANDING_VARIANT_POOL);
    let occupied: Vec<SeatId> = state
        .seats
        .iter()
        .filter(|seat| !seat.is_empty())
        .map(|seat| seat.id)
        .collect();
    for (n, &slot) in slots.iter().take(count).enumerate() {
        let id = state.mint_id(STANDING_ID_PREFIX);
        let competitor = spawn_competitor(id, cfg, slot, wrap_variant(offset, n), &occupied, rng);
        state.standing.push(competitor);
    }
}

/// Build a new standing passenger at `slot`. When they arrive already
/// watching someone, the watched seat is drawn from `occupied_seats`.
pub(crate) fn spawn_competitor<R: Rng + ?Sized>(
    id: String,
    cfg: &DifficultyConfig,
    slot: SlotId,
    visual_variant: u8,
    occupied_seats: &[SeatId],
    rng: &mut R,
) -> StandingCompetitor {
    let watched_seat_id = if cfg.watch_chance > 0.0 && rng.gen_bool(cfg.watch_chance) {
        occupied_seats.choose(rng).copied()
    } else {
        None
    };
    StandingCompetitor {
        id,
        watched_seat_id,
        base_reaction_ms: cfg.reaction_ms.sample(rng),
        visual_variant,
        slot,
    }
}

/// Uniform stop strictly after `after`, at most the last station. Riders
/// boarding at the terminus are assigned the terminus itself.
pub(crate) fn draw_destination<R: Rng + ?Sized>(after: StationIndex, rng: &mut R) -> StationIndex {
    let last = last_station_index();
    if after >= last {
        return last;
    }
    rng.gen_range(after + 1..=last)
}

/// Pick an occupant look not in `in_use` if one is left, otherwise any.
pub(crate) fn fresh_occupant_variant<R: Rng + ?Sized>(in_use: &[u8], rng: &mut R) -> u8 {
    (0..OCCUPANT_VARIANT_POOL)
        .filter(|variant| !in_use.contains(variant))
        .choose(rng)
        .unwrap_or_else(|| rng.gen_range(0..OCCUPANT_VARIANT_POOL))
}

pub(crate) fn wrap_variant(offset: u8, n: usize) -> u8 {
    let pool = usize::from(STANDING_VARIANT_POOL);
    let wrapped = (usize::from(offset) + n) % pool;
    u8::try_from(wrapped).unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::GameStatus;
    use rand::SeedableRng;
    use rand::rngs::SmallRng;
    use std::collections::HashSet;

    #[test]
    fn rush_generation_fills_every_seat() {
        let mut rng = SmallRng::seed_from_u64(11);
        let state = generate(0, 5, Difficulty::Rush, &mut rng);
        assert_eq!(state.occupied_count(), 6);
        assert!(state.free_seat_ids().is_empty());
        assert_eq!(state.status, GameStatus::Playing);
    }

    #[test]
    fn occupants_and_standers_respect_configuration() {
        for seed in 0..64 {
            let mut rng = SmallRng::seed_from_u64(seed);
            for difficulty in Difficulty::ALL {
                let cfg = difficulty.config();
                let state = generate(1, 6, difficulty, &mut rng);
                let seated = u8::try_from(state.occupied_count()).unwrap();
                assert!(cfg.seated.contains(seated), "{difficulty}: {seated} seated");
                assert!(cfg.standing.contains(u8::try_from(state.standing.len()).unwrap()));

                for seat in &state.seats {
                    if let Some(occupant) = &seat.occupant {
                        assert!(occupant.destination > 1);
                        assert!(occupant.destination <= last_station_index());
                        assert!(!occupant.destination_revealed);
                    }
                }

                let slots: HashSet<_> = state.standing.iter().map(|c| c.slot).collect();
                assert_eq!(slots.len(), state.standing.len(), "slots must be unique");
                assert!(!slots.contains(&state.player_slot));

                let ids: HashSet<_> = state
                    .seats
                    .iter()
                    .filter_map(|s| s.occupant.as_ref().map(|o| o.id.clone()))
                    .chain(state.standing.iter().map(|c| c.id.clone()))
                    .collect();
                assert_eq!(ids.len(), state.occupied_count() + state.standing.len());
            }
        }
    }

    #[test]
    fn occupant_variants_do_not_repeat_within_the_pool() {
        let mut rng = SmallRng::seed_from_u64(5);
        let state = generate(0, 4, Difficulty::Rush, &mut rng);
        let variants: HashSet<_> = state
            .seats
            .iter()
            .filter_map(|s| s.occupant.as_ref().map(|o| o.visual_variant))
            .collect();
        assert_eq!(variants.len(), state.occupied_count());
    }

    #[test]
    fn watched_seats_point_at_occupied_seats() {
        for seed in 0..32 {
            let mut rng = SmallRng::seed_from_u64(seed);
            let state = generate(0, 7, Difficulty::Rush, &mut rng);
            for competitor in &state.standing {
                if let Some(seat_id) = competitor.watched_seat_id {
                    assert!(!state.seat(seat_id).unwrap().is_empty());
                }
            }
        }
    }

    #[test]
    fn destination_draw_clamps_at_terminus() {
        let mut rng = SmallRng::seed_from_u64(3);
        assert_eq!(
            draw_destination(last_station_index(), &mut rng),
            last_station_index()
        );
        for _ in 0..50 {
            let stop = draw_destination(5, &mut rng);
            assert!(stop > 5 && stop <= last_station_index());
        }
    }

    #[test]
    fn fresh_variants_avoid_seated_looks_until_exhausted() {
        let mut rng = SmallRng::seed_from_u64(8);
        let in_use: Vec<u8> = (0..OCCUPANT_VARIANT_POOL - 1).collect();
        assert_eq!(
            fresh_occupant_variant(&in_use, &mut rng),
            OCCUPANT_VARIANT_POOL - 1
        );
        let all: Vec<u8> = (0..OCCUPANT_VARIANT_POOL).collect();
        assert!(fresh_occupant_variant(&all, &mut rng) < OCCUPANT_VARIANT_POOL);
    }

    #[test]
    fn standing_variants_wrap_around_the_pool() {
        assert_eq!(wrap_variant(STANDING_VARIANT_POOL - 1, 1), 0);
        assert_eq!(wrap_variant(0, usize::from(STANDING_VARIANT_POOL) + 2), 2);
    }
}

use rand::rngs::SmallRng;
use rand::rngs::mock::StepRng;
use rand::{Rng, SeedableRng};
use seatrush_game::constants::SEAT_COUNT;
use seatrush_game::{
    Difficulty, GameState, GameStatus, GrabWinner, Occupant, StandingCompetitor, advance,
    claim_seat, effective_time, generate, is_valid_route, last_station_index, resolve_many,
    resolve_one, reveal_destination,
};
use std::collections::HashSet;

fn routes() -> impl Iterator<Item = (u8, u8)> {
    let last = last_station_index();
    (0..last).flat_map(move |boarding| (boarding + 1..=last).map(move |dest| (boarding, dest)))
}

fn ride_to_end<R: Rng>(mut state: GameState, rng: &mut R) -> GameState {
    while !state.is_terminal() {
        state = advance(&state, rng);
    }
    state
}

#[test]
fn generation_respects_layout_and_ranges_on_every_route() {
    let mut rng = SmallRng::seed_from_u64(0x5EA7);
    for (boarding, destination) in routes() {
        assert!(is_valid_route(boarding, destination));
        for difficulty in Difficulty::ALL {
            let state = generate(boarding, destination, difficulty, &mut rng);
            assert_eq!(state.seats.len(), usize::from(SEAT_COUNT));
            let ids: HashSet<_> = state.seats.iter().map(|seat| seat.id).collect();
            assert_eq!(ids.len(), usize::from(SEAT_COUNT));

            let seated = u8::try_from(state.occupied_count()).unwrap();
            assert!(difficulty.config().seated.contains(seated));
            for occupant in state.seats.iter().filter_map(|s| s.occupant.as_ref()) {
                assert!(occupant.destination > boarding);
                assert!(occupant.destination <= last_station_index());
            }
            assert_eq!(state.player_seated, state.player_seat_id.is_some());
            assert_eq!(state.status, GameStatus::Playing);
        }
    }
}

#[test]
fn rush_from_first_station_fills_the_compartment() {
    for seed in 0..16 {
        let mut rng = SmallRng::seed_from_u64(seed);
        let state = generate(0, 5, Difficulty::Rush, &mut rng);
        assert_eq!(state.occupied_count(), 6);
        assert!(state.free_seat_ids().is_empty());
    }
}

#[test]
fn reveal_twice_matches_reveal_once() {
    let mut rng = SmallRng::seed_from_u64(77);
    let state = generate(1, 6, Difficulty::Normal, &mut rng);
    for seat in 0..SEAT_COUNT + 2 {
        let once = reveal_destination(&state, seat);
        assert_eq!(reveal_destination(&once, seat), once);
    }
}

#[test]
fn seated_player_wins_and_standing_player_loses() {
    for seed in 0..32 {
        let mut rng = SmallRng::seed_from_u64(seed);
        let start = generate(0, 4, Difficulty::Easy, &mut rng);
        let free = start.free_seat_ids()[0];

        let seated = ride_to_end(claim_seat(&start, free), &mut rng);
        assert_eq!(seated.status, GameStatus::Won);
        assert_eq!(seated.current_station, 4);
        assert_eq!(seated.player_seat_id, Some(free));
        assert!(seated.seats[usize::from(free)].occupant.is_none());

        let standing = ride_to_end(start, &mut rng);
        assert_eq!(standing.status, GameStatus::Lost);
    }
}

#[test]
fn advance_never_leaves_a_due_rider_seated() {
    for seed in 0..48 {
        let mut rng = SmallRng::seed_from_u64(seed);
        let mut state = generate(0, last_station_index(), Difficulty::Rush, &mut rng);
        while !state.is_terminal() {
            state = advance(&state, &mut rng);
            for occupant in state.seats.iter().filter_map(|s| s.occupant.as_ref()) {
                assert!(
                    occupant.destination > state.current_station,
                    "{} overstayed at {}",
                    occupant.id,
                    state.current_station
                );
            }
        }
    }
}

#[test]
fn rider_due_at_three_leaves_when_arriving_at_three() {
    let mut state = GameState::empty(0, 6, Difficulty::Normal, 5);
    state.current_station = 2;
    state.seats[0].occupant = Some(Occupant {
        id: "rider-0".into(),
        destination: 3,
        destination_revealed: true,
        visual_variant: 2,
    });
    // No standers, so nobody can slide into the vacancy.
    let mut rng = StepRng::new(0, 0);
    let next = advance(&state, &mut rng);
    assert_eq!(next.current_station, 3);
    assert!(next.seats[0].occupant.is_none());
}

#[test]
fn effective_time_is_monotone_with_floor() {
    for base in [50.0, 180.0, 400.0, 900.0] {
        let plain = effective_time(base, false, false);
        let watching = effective_time(base, true, false);
        let adjacent = effective_time(base, false, true);
        let both = effective_time(base, true, true);
        assert!(watching <= plain && adjacent <= plain);
        assert!(both <= watching && both <= adjacent);
        assert!(both >= 50.0);
    }
}

#[test]
fn attentive_player_tap_beats_distant_rival() {
    let rival = StandingCompetitor {
        id: "stander-0".into(),
        watched_seat_id: None,
        base_reaction_ms: 600.0,
        visual_variant: 0,
        slot: 4,
    };
    let result = resolve_one(0, Some(100.0), 0, Some(0), &[rival]);
    assert!(result.is_player_winner());
}

#[test]
fn resolve_many_hands_each_rival_at_most_one_seat() {
    let mut rng = SmallRng::seed_from_u64(404);
    for _ in 0..200 {
        let pool: Vec<StandingCompetitor> = (0..rng.gen_range(0..5u8))
            .map(|n| StandingCompetitor {
                id: format!("stander-{n}"),
                watched_seat_id: rng.gen_bool(0.5).then(|| rng.gen_range(0..SEAT_COUNT)),
                base_reaction_ms: rng.gen_range(300.0..900.0),
                visual_variant: n,
                slot: rng.gen_range(0..6),
            })
            .collect();
        let open: Vec<u8> = (0..SEAT_COUNT).filter(|_| rng.gen_bool(0.5)).collect();
        let tapped = open.first().copied();
        let results = resolve_many(
            &open,
            Some(rng.gen_range(50.0..1_500.0)),
            tapped,
            rng.gen_range(0..6),
            None,
            &pool,
        );

        let winners: Vec<_> = results.iter().filter_map(|r| r.winner_id()).collect();
        let unique: HashSet<_> = winners.iter().collect();
        assert_eq!(winners.len(), unique.len());
        if let Some(pos) = results.iter().position(|r| r.winner == GrabWinner::Player) {
            assert_eq!(pos + 1, results.len(), "nothing resolves after a player win");
        } else {
            assert_eq!(results.len(), open.len());
        }
    }
}

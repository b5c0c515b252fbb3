//! Reaction-time contest for freshly vacated seats.
//!
//! Everything here is a pure function over the entrants. Each entrant's base
//! reaction time is adjusted for attentiveness (watching the seat) and reach
//! (standing next to it); the strictly fastest adjusted time takes the seat.
use serde::{Deserialize, Serialize};

use crate::constants::{
    ADJACENCY_BONUS_MS, MIN_EFFECTIVE_TIME_MS, NON_ADJACENCY_PENALTY_MS, WATCHING_BONUS_MS,
};
use crate::state::{SeatId, SlotId, StandingCompetitor, is_adjacent};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "id", rename_all = "snake_case")]
pub enum GrabWinner {
    Player,
    Competitor(String),
    /// Nobody reached for the seat.
    Unclaimed,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompetitorTime {
    pub competitor_id: String,
    pub effective_ms: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GrabResult {
    pub seat_id: SeatId,
    pub winner: GrabWinner,
    pub player_effective_ms: Option<f64>,
    pub competitor_times: Vec<CompetitorTime>,
}

impl GrabResult {
    #[must_use]
    pub const fn is_player_winner(&self) -> bool {
        matches!(self.winner, GrabWinner::Player)
    }

    #[must_use]
    pub fn winner_id(&self) -> Option<&str> {
        match &self.winner {
            GrabWinner::Competitor(id) => Some(id),
            GrabWinner::Player | GrabWinner::Unclaimed => None,
        }
    }
}

/// Adjusted reaction time, never below [`MIN_EFFECTIVE_TIME_MS`].
#[must_use]
pub fn effective_time(base_ms: f64, is_watching: bool, is_adjacent: bool) -> f64 {
    let mut t = base_ms;
    if is_watching {
        t -= WATCHING_BONUS_MS;
    }
    if is_adjacent {
        t -= ADJACENCY_BONUS_MS;
    } else {
        t += NON_ADJACENCY_PENALTY_MS;
    }
    t.max(MIN_EFFECTIVE_TIME_MS)
}

/// Decide who takes `seat_id`.
///
/// The player only competes when `player_tap_ms` is present. Ties go to the
/// first entrant enumerated, competitors before the player.
#[must_use]
pub fn resolve_one(
    seat_id: SeatId,
    player_tap_ms: Option<f64>,
    player_slot: SlotId,
    player_watched_seat_id: Option<SeatId>,
    competitors: &[StandingCompetitor],
) -> GrabResult {
    let competitor_times: Vec<CompetitorTime> = competitors
        .iter()
        .map(|competitor| CompetitorTime {
            competitor_id: competitor.id.clone(),
            effective_ms: effective_time(
                competitor.base_reaction_ms,
                competitor.watched_seat_id == Some(seat_id),
                is_adjacent(competitor.slot, seat_id),
            ),
        })
        .collect();

    let mut best: Option<(GrabWinner, f64)> = None;
    for entry in &competitor_times {
        if best.as_ref().is_none_or(|(_, t)| entry.effective_ms < *t) {
            best = Some((
                GrabWinner::Competitor(entry.competitor_id.clone()),
                entry.effective_ms,
            ));
        }
    }

    let player_effective_ms = player_tap_ms.map(|tap| {
        effective_time(
            tap,
            player_watched_seat_id == Some(seat_id),
            is_adjacent(player_slot, seat_id),
        )
    });
    if let Some(player_ms) = player_effective_ms
        && best.as_ref().is_none_or(|(_, t)| player_ms < *t)
    {
        best = Some((GrabWinner::Player, player_ms));
    }

    let winner = match best {
        Some((winner, _)) => winner,
        None => competitors
            .first()
            .map_or(GrabWinner::Unclaimed, |c| GrabWinner::Competitor(c.id.clone())),
    };

    GrabResult {
        seat_id,
        winner,
        player_effective_ms,
        competitor_times,
    }
}

/// Resolve a whole grab window, seat by seat in the given order.
///
/// The player's tap counts only for `player_tapped_seat_id`. A competitor
/// that wins leaves the pool, and processing stops once the player has a
/// seat, so the result may be shorter than `open_seat_ids`.
#[must_use]
pub fn resolve_many(
    open_seat_ids: &[SeatId],
    player_tap_ms: Option<f64>,
    player_tapped_seat_id: Option<SeatId>,
    player_slot: SlotId,
    player_watched_seat_id: Option<SeatId>,
    competitors: &[StandingCompetitor],
) -> Vec<GrabResult> {
    let mut pool = competitors.to_vec();
    let mut results = Vec::with_capacity(open_seat_ids.len());
    for &seat_id in open_seat_ids {
        let tap = player_tap_ms.filter(|_| player_tapped_seat_id == Some(seat_id));
        let result = resolve_one(seat_id, tap, player_slot, player_watched_seat_id, &pool);
        if let Some(id) = result.winner_id() {
            pool.retain(|c| c.id != id);
        }
        let player_won = result.is_player_winner();
        log::debug!("seat {seat_id} grab resolved: {:?}", result.winner);
        results.push(result);
        if player_won {
            break;
        }
    }
    results
}

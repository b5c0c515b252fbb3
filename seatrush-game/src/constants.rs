//! Centralized balance and tuning constants for Seat Rush game logic.
//!
//! Layout, reaction modifiers and animation timings live here so gameplay
//! can only be adjusted via reviewed code changes. Per-difficulty tuning is
//! data and lives in `assets/difficulty.json`.

// Compartment layout -------------------------------------------------------
pub const SEAT_COUNT: u8 = 6;
pub const SEATS_PER_BENCH: u8 = 3;
pub const STANDING_SLOT_COUNT: u8 = 6;

// Visual variant pools -----------------------------------------------------
pub(crate) const OCCUPANT_VARIANT_POOL: u8 = 8;
pub(crate) const STANDING_VARIANT_POOL: u8 = 6;

// Grab competition ---------------------------------------------------------
pub const WATCHING_BONUS_MS: f64 = 150.0;
pub const ADJACENCY_BONUS_MS: f64 = 100.0;
pub const NON_ADJACENCY_PENALTY_MS: f64 = 150.0;
pub const MIN_EFFECTIVE_TIME_MS: f64 = 50.0;
pub const GRAB_WINDOW_MS: u64 = 3_000;

// Phase sequencing ---------------------------------------------------------
pub const TRAVELING_MS: u64 = 1_200;
pub const ARRIVING_MS: u64 = 600;
pub const DEPARTING_MS: u64 = 700;
pub const CLAIMING_MS: u64 = 600;
pub const SETTLING_MS: u64 = 400;
pub const CLAIM_PULSE_MS: u64 = 800;

// Id prefixes --------------------------------------------------------------
pub(crate) const OCCUPANT_ID_PREFIX: &str = "rider";
pub(crate) const STANDING_ID_PREFIX: &str = "stander";

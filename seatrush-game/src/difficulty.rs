//! Difficulty tags and their generation/competition tuning.
use std::fmt;
use std::str::FromStr;
use std::sync::OnceLock;

use rand::Rng;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::constants::{SEAT_COUNT, STANDING_SLOT_COUNT};

const DEFAULT_DIFFICULTY_DATA: &str = include_str!("../assets/difficulty.json");

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Default,
)]
#[serde(rename_all = "lowercase")]
pub enum Difficulty {
    Easy,
    #[default]
    Normal,
    Rush,
}

impl Difficulty {
    pub const ALL: [Self; 3] = [Self::Easy, Self::Normal, Self::Rush];

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Easy => "easy",
            Self::Normal => "normal",
            Self::Rush => "rush",
        }
    }

    /// Lenient lookup used at the boundary: absent or unknown tags fall back
    /// to [`Difficulty::Normal`].
    #[must_use]
    pub fn from_tag(tag: Option<&str>) -> Self {
        tag.and_then(|raw| raw.parse().ok()).unwrap_or_default()
    }

    /// Tuning for this difficulty from the shared static table.
    #[must_use]
    pub fn config(self) -> &'static DifficultyConfig {
        DifficultyTable::shared().get(self)
    }
}

impl fmt::Display for Difficulty {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown difficulty tag '{0}'")]
pub struct UnknownDifficulty(pub String);

impl FromStr for Difficulty {
    type Err = UnknownDifficulty;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "easy" => Ok(Self::Easy),
            "normal" => Ok(Self::Normal),
            "rush" => Ok(Self::Rush),
            _ => Err(UnknownDifficulty(s.to_string())),
        }
    }
}

/// Inclusive integer range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CountRange {
    pub min: u8,
    pub max: u8,
}

impl CountRange {
    #[must_use]
    pub const fn new(min: u8, max: u8) -> Self {
        Self { min, max }
    }

    #[must_use]
    pub const fn contains(self, value: u8) -> bool {
        value >= self.min && value <= self.max
    }

    pub fn sample<R: Rng + ?Sized>(self, rng: &mut R) -> u8 {
        if self.min >= self.max {
            return self.min;
        }
        rng.gen_range(self.min..=self.max)
    }
}

/// Inclusive millisecond range for base reaction times.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ReactionRange {
    pub min: f64,
    pub max: f64,
}

impl ReactionRange {
    pub fn sample<R: Rng + ?Sized>(self, rng: &mut R) -> f64 {
        if self.min >= self.max {
            return self.min;
        }
        rng.gen_range(self.min..=self.max)
    }
}

/// How many new standing passengers may board at each stop.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoardingConfig {
    pub chance: f64,
    pub max_per_station: u8,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DifficultyConfig {
    pub seated: CountRange,
    pub standing: CountRange,
    pub claim_probability: f64,
    pub reaction_ms: ReactionRange,
    #[serde(default)]
    pub watch_chance: f64,
    pub boarding: BoardingConfig,
}

/// Errors raised when the difficulty table violates compartment invariants.
#[derive(Debug, Error)]
pub enum DifficultyConfigError {
    #[error("difficulty table is not valid JSON: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("{difficulty}: {field} range invalid (min {min} > max {max})")]
    CountRange {
        difficulty: Difficulty,
        field: &'static str,
        min: u8,
        max: u8,
    },
    #[error("{difficulty}: {field} max {max} exceeds capacity {capacity}")]
    Capacity {
        difficulty: Difficulty,
        field: &'static str,
        max: u8,
        capacity: u8,
    },
    #[error("{difficulty}: {field} must be between 0 and 1 (got {value:.2})")]
    Probability {
        difficulty: Difficulty,
        field: &'static str,
        value: f64,
    },
    #[error("{difficulty}: reaction range invalid ({min:.0}ms..{max:.0}ms)")]
    ReactionRange {
        difficulty: Difficulty,
        min: f64,
        max: f64,
    },
}

impl DifficultyConfig {
    /// Check the record against the fixed compartment layout.
    ///
    /// # Errors
    ///
    /// Returns the first violated invariant.
    pub fn validate(&self, difficulty: Difficulty) -> Result<(), DifficultyConfigError> {
        let standing_capacity = STANDING_SLOT_COUNT - 1;
        for (field, range, capacity) in [
            ("seated", self.seated, SEAT_COUNT),
            ("standing", self.standing, standing_capacity),
        ] {
            if range.min > range.max {
                return Err(DifficultyConfigError::CountRange {
                    difficulty,
                    field,
                    min: range.min,
                    max: range.max,
                });
            }
            if range.max > capacity {
                return Err(DifficultyConfigError::Capacity {
                    difficulty,
                    field,
                    max: range.max,
                    capacity,
                });
            }
        }
        if self.boarding.max_per_station > standing_capacity {
            return Err(DifficultyConfigError::Capacity {
                difficulty,
                field: "boarding.max_per_station",
                max: self.boarding.max_per_station,
                capacity: standing_capacity,
            });
        }
        for (field, value) in [
            ("claim_probability", self.claim_probability),
            ("watch_chance", self.watch_chance),
            ("boarding.chance", self.boarding.chance),
        ] {
            if !(0.0..=1.0).contains(&value) {
                return Err(DifficultyConfigError::Probability {
                    difficulty,
                    field,
                    value,
                });
            }
        }
        let reaction = self.reaction_ms;
        if !(reaction.min > 0.0 && reaction.min <= reaction.max) {
            return Err(DifficultyConfigError::ReactionRange {
                difficulty,
                min: reaction.min,
                max: reaction.max,
            });
        }
        Ok(())
    }
}

/// Per-tag lookup table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DifficultyTable {
    pub easy: DifficultyConfig,
    pub normal: DifficultyConfig,
    pub rush: DifficultyConfig,
}

impl DifficultyTable {
    /// Parse and validate a table.
    ///
    /// # Errors
    ///
    /// Returns an error if the JSON is malformed or any record is invalid.
    pub fn from_json(json: &str) -> Result<Self, DifficultyConfigError> {
        let table: Self = serde_json::from_str(json)?;
        table.validate()?;
        Ok(table)
    }

    /// Table shipped with the crate, falling back to [`DifficultyTable::builtin`]
    /// if the embedded asset fails to parse or validate.
    #[must_use]
    pub fn load_from_static() -> Self {
        Self::from_json(DEFAULT_DIFFICULTY_DATA).unwrap_or_else(|err| {
            log::warn!("falling back to builtin difficulty table: {err}");
            Self::builtin()
        })
    }

    /// Process-wide table, loaded once.
    #[must_use]
    pub fn shared() -> &'static Self {
        static TABLE: OnceLock<DifficultyTable> = OnceLock::new();
        TABLE.get_or_init(Self::load_from_static)
    }

    #[must_use]
    pub fn builtin() -> Self {
        Self {
            easy: DifficultyConfig {
                seated: CountRange::new(2, 3),
                standing: CountRange::new(1, 2),
                claim_probability: 0.25,
                reaction_ms: ReactionRange {
                    min: 650.0,
                    max: 900.0,
                },
                watch_chance: 0.2,
                boarding: BoardingConfig {
                    chance: 0.2,
                    max_per_station: 1,
                },
            },
            normal: DifficultyConfig {
                seated: CountRange::new(3, 5),
                standing: CountRange::new(2, 3),
                claim_probability: 0.45,
                reaction_ms: ReactionRange {
                    min: 500.0,
                    max: 750.0,
                },
                watch_chance: 0.35,
                boarding: BoardingConfig {
                    chance: 0.35,
                    max_per_station: 1,
                },
            },
            rush: DifficultyConfig {
                seated: CountRange::new(6, 6),
                standing: CountRange::new(4, 5),
                claim_probability: 0.7,
                reaction_ms: ReactionRange {
                    min: 350.0,
                    max: 600.0,
                },
                watch_chance: 0.5,
                boarding: BoardingConfig {
                    chance: 0.5,
                    max_per_station: 2,
                },
            },
        }
    }

    #[must_use]
    pub const fn get(&self, difficulty: Difficulty) -> &DifficultyConfig {
        match difficulty {
            Difficulty::Easy => &self.easy,
            Difficulty::Normal => &self.normal,
            Difficulty::Rush => &self.rush,
        }
    }

    /// # Errors
    ///
    /// Returns the first invalid record.
    pub fn validate(&self) -> Result<(), DifficultyConfigError> {
        Difficulty::ALL
            .into_iter()
            .try_for_each(|difficulty| self.get(difficulty).validate(difficulty))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn embedded_table_matches_builtin() {
        let parsed = DifficultyTable::from_json(DEFAULT_DIFFICULTY_DATA).unwrap();
        assert_eq!(parsed, DifficultyTable::builtin());
    }

    #[test]
    fn rush_fills_every_seat() {
        let rush = Difficulty::Rush.config();
        assert_eq!(rush.seated, CountRange::new(SEAT_COUNT, SEAT_COUNT));
    }

    #[test]
    fn unknown_or_missing_tags_default_to_normal() {
        assert_eq!(Difficulty::from_tag(None), Difficulty::Normal);
        assert_eq!(Difficulty::from_tag(Some("nightmare")), Difficulty::Normal);
        assert_eq!(Difficulty::from_tag(Some(" RUSH ")), Difficulty::Rush);
        assert_eq!(
            "brutal".parse::<Difficulty>(),
            Err(UnknownDifficulty("brutal".to_string()))
        );
    }

    #[test]
    fn validation_rejects_oversized_ranges() {
        let mut table = DifficultyTable::builtin();
        table.easy.seated = CountRange::new(2, SEAT_COUNT + 1);
        assert!(matches!(
            table.validate(),
            Err(DifficultyConfigError::Capacity {
                difficulty: Difficulty::Easy,
                field: "seated",
                ..
            })
        ));

        let mut table = DifficultyTable::builtin();
        table.normal.standing = CountRange::new(3, 1);
        assert!(matches!(
            table.validate(),
            Err(DifficultyConfigError::CountRange { .. })
        ));
    }

    #[test]
    fn validation_rejects_bad_probabilities_and_reactions() {
        let mut table = DifficultyTable::builtin();
        table.rush.claim_probability = 1.5;
        assert!(matches!(
            table.validate(),
            Err(DifficultyConfigError::Probability {
                field: "claim_probability",
                ..
            })
        ));

        let mut table = DifficultyTable::builtin();
        table.easy.reaction_ms = ReactionRange {
            min: 0.0,
            max: 10.0,
        };
        assert!(matches!(
            table.validate(),
            Err(DifficultyConfigError::ReactionRange { .. })
        ));
    }

    #[test]
    fn malformed_json_reports_parse_error() {
        let err = DifficultyTable::from_json("{ nope").unwrap_err();
        assert!(matches!(err, DifficultyConfigError::Parse(_)));
        assert!(err.to_string().contains("not valid JSON"));
    }
}

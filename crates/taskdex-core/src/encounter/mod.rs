//! Encounter generation.
//!
//! A work phase that ends (naturally or by skip) produces one
//! [`EncounterBatch`]: `floor(work_minutes / 10)` draws from an
//! [`ItemSource`] plus a fixed experience reward. The batch is what the
//! break phase offers for catching.

mod pool;

pub use pool::{Rarity, WildPool};

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::ValidationError;

/// Creature category. A session is themed on one category and its
/// encounters are drawn mostly from that category's pool.
///
/// Deserializes case-insensitively so hand-edited config files work.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Default)]
pub enum Category {
    #[default]
    Fire,
    Water,
    Grass,
    Electric,
    Psychic,
    Ghost,
}

impl Category {
    pub const ALL: [Category; 6] = [
        Category::Fire,
        Category::Water,
        Category::Grass,
        Category::Electric,
        Category::Psychic,
        Category::Ghost,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Fire => "Fire",
            Category::Water => "Water",
            Category::Grass => "Grass",
            Category::Electric => "Electric",
            Category::Psychic => "Psychic",
            Category::Ghost => "Ghost",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Category {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Category::ALL
            .into_iter()
            .find(|c| c.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| ValidationError::UnknownName {
                kind: "category",
                value: s.to_string(),
            })
    }
}

impl<'de> Deserialize<'de> for Category {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

/// One wild creature offered during a break.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncounterItem {
    pub name: String,
    pub category: Category,
}

/// The items generated at a single work→break transition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct EncounterBatch {
    /// Monotonic within a session; every batch, empty or not, gets a new id.
    pub id: u64,
    pub items: Vec<EncounterItem>,
    /// Experience awarded alongside whatever is caught from this batch.
    pub experience: u32,
}

impl EncounterBatch {
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }
}

/// Source of random encounter items.
///
/// Returning `None` means the category pool had nothing to offer; the
/// batch is simply shorter than the formula predicts.
pub trait ItemSource: Send {
    fn generate_random_item(&mut self, category: Category) -> Option<EncounterItem>;
}

/// Number of encounter draws for a work phase of `work_minutes`.
pub fn encounter_count(work_minutes: u32) -> u32 {
    work_minutes / 10
}

/// Experience for a work phase: `floor(work_minutes / 30 * 100)`.
///
/// Computed in floating point, divide first, so values like 69 minutes
/// round down to 229 rather than the exact-ratio 230.
pub fn experience_gain(work_minutes: u32) -> u32 {
    // `as` saturates for out-of-range floats.
    (f64::from(work_minutes) / 30.0 * 100.0).floor() as u32
}

/// Build the batch for a completed work phase.
pub fn generate_encounters(
    batch_id: u64,
    work_minutes: u32,
    category: Category,
    source: &mut dyn ItemSource,
) -> EncounterBatch {
    let items = (0..encounter_count(work_minutes))
        .filter_map(|_| source.generate_random_item(category))
        .collect();
    EncounterBatch {
        id: batch_id,
        items,
        experience: experience_gain(work_minutes),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    /// Yields a fixed name, or nothing once `remaining` runs out.
    struct Countdown {
        remaining: usize,
    }

    impl ItemSource for Countdown {
        fn generate_random_item(&mut self, category: Category) -> Option<EncounterItem> {
            if self.remaining == 0 {
                return None;
            }
            self.remaining -= 1;
            Some(EncounterItem {
                name: format!("Wild{}", self.remaining),
                category,
            })
        }
    }

    #[test]
    fn thirty_minutes_gives_three_items_and_100_exp() {
        let mut source = Countdown { remaining: 10 };
        let batch = generate_encounters(1, 30, Category::Fire, &mut source);
        assert_eq!(batch.len(), 3);
        assert_eq!(batch.experience, 100);
        assert!(batch.items.iter().all(|i| i.category == Category::Fire));
    }

    #[test]
    fn short_work_gives_empty_batch() {
        let mut source = Countdown { remaining: 10 };
        let batch = generate_encounters(1, 5, Category::Water, &mut source);
        assert!(batch.is_empty());
        assert_eq!(batch.experience, 16);
    }

    #[test]
    fn empty_pool_shortens_batch() {
        let mut source = Countdown { remaining: 1 };
        let batch = generate_encounters(7, 45, Category::Ghost, &mut source);
        assert_eq!(batch.len(), 1);
        assert_eq!(batch.id, 7);
        assert_eq!(batch.experience, 150);
    }

    #[test]
    fn experience_divides_before_scaling() {
        assert_eq!(experience_gain(30), 100);
        assert_eq!(experience_gain(45), 150);
        assert_eq!(experience_gain(69), 229);
        assert_eq!(experience_gain(0), 0);
    }

    #[test]
    fn category_parses_case_insensitively() {
        assert_eq!("psychic".parse::<Category>().unwrap(), Category::Psychic);
        assert_eq!(" GHOST ".parse::<Category>().unwrap(), Category::Ghost);
        assert!("Dragon".parse::<Category>().is_err());
    }

    proptest! {
        #[test]
        fn formulas_match_floor_division(work in 0u32..100_000) {
            prop_assert_eq!(encounter_count(work), (f64::from(work) / 10.0).floor() as u32);
            prop_assert_eq!(
                experience_gain(work),
                (f64::from(work) / 30.0 * 100.0).floor() as u32
            );
            // Never more than the exact ratio, and at most one below it.
            let exact = u64::from(work) * 100 / 30;
            prop_assert!(u64::from(experience_gain(work)) <= exact);
            prop_assert!(u64::from(experience_gain(work)) + 1 >= exact);
        }

        #[test]
        fn batch_never_exceeds_formula(work in 0u32..500, available in 0usize..100) {
            let mut source = Countdown { remaining: available };
            let batch = generate_encounters(1, work, Category::Grass, &mut source);
            prop_assert!(batch.len() <= encounter_count(work) as usize);
            prop_assert_eq!(batch.len(), available.min(encounter_count(work) as usize));
        }
    }
}

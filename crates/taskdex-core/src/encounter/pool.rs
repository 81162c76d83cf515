//! Built-in wild creature pools.

use rand::distributions::{Distribution, WeightedIndex};
use rand::{Rng, SeedableRng};
use rand_pcg::Pcg64;
use serde::{Deserialize, Serialize};

use super::{Category, EncounterItem, ItemSource};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Rarity {
    Common,
    Uncommon,
    Rare,
}

impl Rarity {
    fn weight(self) -> u32 {
        match self {
            Rarity::Common => 60,
            Rarity::Uncommon => 30,
            Rarity::Rare => 10,
        }
    }
}

const FIRE: &[(&str, Rarity)] = &[
    ("Vulpix", Rarity::Common),
    ("Growlithe", Rarity::Common),
    ("Ponyta", Rarity::Common),
    ("Charmander", Rarity::Uncommon),
    ("Magmar", Rarity::Uncommon),
    ("Arcanine", Rarity::Rare),
    ("Flareon", Rarity::Rare),
];

const WATER: &[(&str, Rarity)] = &[
    ("Magikarp", Rarity::Common),
    ("Psyduck", Rarity::Common),
    ("Poliwag", Rarity::Common),
    ("Horsea", Rarity::Common),
    ("Squirtle", Rarity::Uncommon),
    ("Staryu", Rarity::Uncommon),
    ("Lapras", Rarity::Rare),
    ("Vaporeon", Rarity::Rare),
];

const GRASS: &[(&str, Rarity)] = &[
    ("Oddish", Rarity::Common),
    ("Bellsprout", Rarity::Common),
    ("Exeggcute", Rarity::Common),
    ("Bulbasaur", Rarity::Uncommon),
    ("Tangela", Rarity::Uncommon),
    ("Vileplume", Rarity::Rare),
    ("Leafeon", Rarity::Rare),
];

const ELECTRIC: &[(&str, Rarity)] = &[
    ("Voltorb", Rarity::Common),
    ("Magnemite", Rarity::Common),
    ("Pichu", Rarity::Common),
    ("Pikachu", Rarity::Uncommon),
    ("Electabuzz", Rarity::Uncommon),
    ("Raichu", Rarity::Rare),
    ("Jolteon", Rarity::Rare),
];

const PSYCHIC: &[(&str, Rarity)] = &[
    ("Abra", Rarity::Common),
    ("Drowzee", Rarity::Common),
    ("Slowpoke", Rarity::Common),
    ("Mr. Mime", Rarity::Uncommon),
    ("Jynx", Rarity::Uncommon),
    ("Alakazam", Rarity::Rare),
    ("Espeon", Rarity::Rare),
];

const GHOST: &[(&str, Rarity)] = &[
    ("Gastly", Rarity::Common),
    ("Shuppet", Rarity::Common),
    ("Duskull", Rarity::Common),
    ("Haunter", Rarity::Uncommon),
    ("Misdreavus", Rarity::Uncommon),
    ("Gengar", Rarity::Rare),
];

fn table(category: Category) -> &'static [(&'static str, Rarity)] {
    match category {
        Category::Fire => FIRE,
        Category::Water => WATER,
        Category::Grass => GRASS,
        Category::Electric => ELECTRIC,
        Category::Psychic => PSYCHIC,
        Category::Ghost => GHOST,
    }
}

/// Rarity-weighted random draws from the built-in pools.
///
/// With probability `off_category_chance` a draw comes from a different
/// category than the session's, so long sessions occasionally turn up
/// something unexpected.
#[derive(Debug, Clone)]
pub struct WildPool {
    rng: Pcg64,
    off_category_chance: f64,
}

impl WildPool {
    pub const DEFAULT_OFF_CATEGORY_CHANCE: f64 = 0.1;

    /// Deterministic pool for a given seed.
    pub fn seeded(seed: u64) -> Self {
        Self {
            rng: Pcg64::seed_from_u64(seed),
            off_category_chance: Self::DEFAULT_OFF_CATEGORY_CHANCE,
        }
    }

    /// Pool seeded from the thread RNG.
    pub fn from_entropy() -> Self {
        Self::seeded(rand::random())
    }

    pub fn with_off_category_chance(mut self, chance: f64) -> Self {
        self.off_category_chance = if chance.is_finite() {
            chance.clamp(0.0, 1.0)
        } else {
            0.0
        };
        self
    }

    /// Every creature the pool can produce for `category`.
    pub fn species(category: Category) -> impl Iterator<Item = (&'static str, Rarity)> {
        table(category).iter().copied()
    }

    fn pick_category(&mut self, category: Category) -> Category {
        if self.off_category_chance > 0.0 && self.rng.gen_bool(self.off_category_chance) {
            let others: Vec<Category> = Category::ALL
                .into_iter()
                .filter(|c| *c != category)
                .collect();
            others[self.rng.gen_range(0..others.len())]
        } else {
            category
        }
    }
}

impl ItemSource for WildPool {
    fn generate_random_item(&mut self, category: Category) -> Option<EncounterItem> {
        let drawn_from = self.pick_category(category);
        let entries = table(drawn_from);
        let weights = WeightedIndex::new(entries.iter().map(|(_, r)| r.weight())).ok()?;
        let (name, _) = entries[weights.sample(&mut self.rng)];
        Some(EncounterItem {
            name: name.to_string(),
            category: drawn_from,
        })
    }
}

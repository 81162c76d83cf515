use clap::Subcommand;
use serde::Serialize;
use taskdex_core::{catch_capacity, generate_encounters, Category, Config, EncounterItem, WildPool};

#[derive(Subcommand)]
pub enum EncounterAction {
    /// Generate the batch a finished work phase would offer
    Preview {
        /// Work phase length in minutes
        #[arg(long, default_value = "30")]
        work: u32,
        /// Creature category
        #[arg(long, default_value = "Fire")]
        category: Category,
        /// Seed for a reproducible batch (defaults to the configured seed)
        #[arg(long)]
        seed: Option<u64>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

#[derive(Serialize)]
struct Preview {
    work_minutes: u32,
    category: Category,
    capacity: usize,
    experience: u32,
    items: Vec<EncounterItem>,
}

pub fn run(action: EncounterAction) -> Result<(), Box<dyn std::error::Error>> {
    match action {
        EncounterAction::Preview {
            work,
            category,
            seed,
            json,
        } => {
            let config = Config::load_or_default();
            let mut pool = match seed {
                Some(seed) => WildPool::seeded(seed)
                    .with_off_category_chance(config.encounters.off_category_chance),
                None => config.wild_pool(),
            };
            let batch = generate_encounters(1, work, category, &mut pool);
            let preview = Preview {
                work_minutes: work,
                category,
                capacity: catch_capacity(work),
                experience: batch.experience,
                items: batch.items,
            };

            if json {
                println!("{}", serde_json::to_string_pretty(&preview)?);
            } else if preview.items.is_empty() {
                println!("{work} minutes of {category} work: no encounters.");
            } else {
                println!(
                    "{work} minutes of {category} work: catch up to {} for +{} exp",
                    preview.capacity, preview.experience
                );
                for (i, item) in preview.items.iter().enumerate() {
                    println!("  [{}] {} ({})", i + 1, item.name, item.category);
                }
            }
        }
    }
    Ok(())
}

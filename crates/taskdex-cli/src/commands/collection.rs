use clap::Subcommand;
use taskdex_core::storage::Database;

#[derive(Subcommand)]
pub enum CollectionAction {
    /// Every caught creature, oldest first
    List {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Collection and work totals
    Stats,
}

pub fn run(action: CollectionAction) -> Result<(), Box<dyn std::error::Error>> {
    let db = Database::open()?;

    match action {
        CollectionAction::List { json } => {
            let caught = db.collection()?;
            if json {
                println!("{}", serde_json::to_string_pretty(&caught)?);
            } else if caught.is_empty() {
                println!("Nothing caught yet.");
            } else {
                for record in caught {
                    println!(
                        "{:>4}  {:<12} {}",
                        record.id,
                        record.name,
                        record
                            .caught_at
                            .with_timezone(&chrono::Local)
                            .format("%Y-%m-%d %H:%M")
                    );
                }
            }
        }
        CollectionAction::Stats => {
            let stats = db.stats()?;
            println!("{}", serde_json::to_string_pretty(&stats)?);
        }
    }
    Ok(())
}

use clap::Subcommand;
use focusguard_core::storage::Database;

#[derive(Subcommand)]
pub enum HistoryAction {
    /// Most recent finished sessions
    Recent {
        /// Maximum rows to print
        #[arg(long, default_value = "10")]
        limit: usize,
    },
    /// Aggregate counts and total focused time
    Stats,
}

pub fn run(action: HistoryAction) -> Result<(), Box<dyn std::error::Error>> {
    let db = Database::open()?;

    match action {
        HistoryAction::Recent { limit } => {
            let rows = db.recent_sessions(limit)?;
            println!("{}", serde_json::to_string_pretty(&rows)?);
        }
        HistoryAction::Stats => {
            let stats = db.stats()?;
            println!("{}", serde_json::to_string_pretty(&stats)?);
        }
    }
    Ok(())
}

use chrono::Utc;
use clap::Subcommand;
use focusguard_core::AppConfig;
use serde_json::json;

#[derive(Subcommand)]
pub enum StrictAction {
    /// Current commitment policy, exit count and next exit price
    Status,
    /// Price of the next several emergency exits
    PriceTable {
        /// How many rows to print
        #[arg(long, default_value = "8")]
        count: u32,
    },
}

pub fn run(action: StrictAction) -> Result<(), Box<dyn std::error::Error>> {
    let config = AppConfig::load()?;
    let now = Utc::now();

    match action {
        StrictAction::Status => {
            let commitment = &config.commitment;
            let out = json!({
                "enabled": commitment.enabled,
                "allow_exits": commitment.allow_exits,
                "require_entitlement": commitment.require_entitlement,
                "minimum_commitment_minutes": commitment.minimum_commitment_minutes,
                "exits_used_this_month": commitment.effective_exit_count(now),
                "next_exit_price": commitment.current_price(now),
            });
            println!("{}", serde_json::to_string_pretty(&out)?);
        }
        StrictAction::PriceTable { count } => {
            // Simulated charges against a throwaway copy; config on disk is
            // untouched.
            let mut commitment = config.commitment.clone();
            let mut rows = Vec::new();
            for _ in 0..count {
                rows.push(json!({
                    "exit": commitment.effective_exit_count(now) + 1,
                    "price": commitment.current_price(now),
                }));
                commitment.record_exit(now);
            }
            println!("{}", serde_json::to_string_pretty(&rows)?);
        }
    }
    Ok(())
}

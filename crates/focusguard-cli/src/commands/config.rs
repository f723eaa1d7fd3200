use clap::Subcommand;
use focusguard_core::AppConfig;

#[derive(Subcommand)]
pub enum ConfigAction {
    /// Print the full configuration as JSON
    Show,
    /// Set a config value
    Set {
        /// Dotted key, e.g. "defaults.duration_minutes"
        key: String,
        /// New value
        value: String,
    },
    /// Reset config to defaults
    Reset,
}

fn apply(config: &mut AppConfig, key: &str, value: &str) -> Result<(), Box<dyn std::error::Error>> {
    match key {
        "user_id" => config.user_id = value.to_string(),
        "defaults.duration_minutes" => config.defaults.duration_minutes = value.parse()?,
        "defaults.strict" => config.defaults.strict = value.parse()?,
        "defaults.mode" => config.defaults.mode = value.to_string(),
        "commitment.enabled" => config.commitment.enabled = value.parse()?,
        "commitment.allow_exits" => config.commitment.allow_exits = value.parse()?,
        "commitment.require_entitlement" => config.commitment.require_entitlement = value.parse()?,
        "commitment.minimum_commitment_minutes" => {
            config.commitment.minimum_commitment_minutes = value.parse()?
        }
        "blocked_items" => {
            config.blocked_items = value
                .split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
                .collect()
        }
        _ => return Err(format!("unknown key: {key}").into()),
    }
    Ok(())
}

pub fn run(action: ConfigAction) -> Result<(), Box<dyn std::error::Error>> {
    match action {
        ConfigAction::Show => {
            let config = AppConfig::load()?;
            println!("{}", serde_json::to_string_pretty(&config)?);
        }
        ConfigAction::Set { key, value } => {
            let mut config = AppConfig::load()?;
            apply(&mut config, &key, &value)?;
            config.save()?;
            println!("ok");
        }
        ConfigAction::Reset => {
            let config = AppConfig::default();
            config.save()?;
            println!("config reset to defaults");
        }
    }
    Ok(())
}

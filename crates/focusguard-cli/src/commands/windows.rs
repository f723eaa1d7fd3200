use chrono::Utc;
use clap::Subcommand;
use focusguard_core::storage::Database;
use focusguard_core::{local_now, AppConfig, ClockTime, RegretEvaluator, RegretWindow};
use serde_json::json;

const REGRET_KEY: &str = "regret_evaluator";

#[derive(Subcommand)]
pub enum WindowsAction {
    /// List configured regret-prevention windows
    List,
    /// Add a window: either a daily time range or a post-session cooldown
    Add {
        /// Human-readable name
        name: String,
        /// Start time, HH:MM (time-of-day window)
        #[arg(long, requires = "end")]
        start: Option<String>,
        /// End time, HH:MM (time-of-day window; may wrap midnight)
        #[arg(long, requires = "start")]
        end: Option<String>,
        /// Minutes of protection after each session (post-session window)
        #[arg(long, conflicts_with_all = ["start", "end"])]
        after_session: Option<u32>,
    },
    /// Remove a window by id or name
    Rm {
        /// Window id or name
        target: String,
    },
    /// Show the window active right now, if any
    Check,
}

pub fn run(action: WindowsAction) -> Result<(), Box<dyn std::error::Error>> {
    match action {
        WindowsAction::List => {
            let config = AppConfig::load()?;
            println!("{}", serde_json::to_string_pretty(&config.regret_windows)?);
        }
        WindowsAction::Add {
            name,
            start,
            end,
            after_session,
        } => {
            let window = match (start, end, after_session) {
                (Some(start), Some(end), None) => {
                    let start =
                        ClockTime::parse(&start).ok_or("invalid start time, expected HH:MM")?;
                    let end = ClockTime::parse(&end).ok_or("invalid end time, expected HH:MM")?;
                    RegretWindow::time_of_day(name, start, end)
                }
                (None, None, Some(minutes)) => RegretWindow::post_session(name, minutes),
                _ => return Err("pass either --start/--end or --after-session".into()),
            };
            let mut config = AppConfig::load()?;
            config.regret_windows.push(window.clone());
            config.save()?;
            println!("{}", serde_json::to_string_pretty(&window)?);
        }
        WindowsAction::Rm { target } => {
            let mut config = AppConfig::load()?;
            let before = config.regret_windows.len();
            config
                .regret_windows
                .retain(|w| w.id != target && w.name != target);
            if config.regret_windows.len() == before {
                eprintln!("no window matching {target}");
                std::process::exit(1);
            }
            config.save()?;
            println!("removed {}", before - config.regret_windows.len());
        }
        WindowsAction::Check => {
            let config = AppConfig::load()?;
            let db = Database::open()?;
            let evaluator = db
                .kv_get(REGRET_KEY)?
                .and_then(|json| serde_json::from_str::<RegretEvaluator>(&json).ok())
                .unwrap_or_default();
            let active = evaluator.active_window(&config.regret_windows, Utc::now(), local_now());
            let out = json!({ "active": active });
            println!("{}", serde_json::to_string_pretty(&out)?);
        }
    }
    Ok(())
}

use clap::Subcommand;
use focusguard_core::{active_schedule, local_now, parse_days, AppConfig, ClockTime, Schedule};
use serde_json::json;

#[derive(Subcommand)]
pub enum ScheduleAction {
    /// List configured schedules
    List,
    /// Add a schedule
    Add {
        /// Human-readable name
        name: String,
        /// Start time, HH:MM
        #[arg(long)]
        start: String,
        /// End time, HH:MM (must be after start)
        #[arg(long)]
        end: String,
        /// Comma-separated weekdays, e.g. mon,tue,wed
        #[arg(long)]
        days: String,
        /// Route sessions through the strict commitment lock
        #[arg(long)]
        strict: bool,
        /// App/domain identifiers to block (repeatable)
        #[arg(long = "block")]
        blocked: Vec<String>,
    },
    /// Remove a schedule by id or name
    Rm {
        /// Schedule id or name
        target: String,
    },
    /// Show the schedule active right now, and the next upcoming one
    Check,
}

pub fn run(action: ScheduleAction) -> Result<(), Box<dyn std::error::Error>> {
    match action {
        ScheduleAction::List => {
            let config = AppConfig::load()?;
            println!("{}", serde_json::to_string_pretty(&config.schedules)?);
        }
        ScheduleAction::Add {
            name,
            start,
            end,
            days,
            strict,
            blocked,
        } => {
            let start = ClockTime::parse(&start).ok_or("invalid start time, expected HH:MM")?;
            let end = ClockTime::parse(&end).ok_or("invalid end time, expected HH:MM")?;
            let days = parse_days(&days).ok_or("invalid day list, expected e.g. mon,wed,fri")?;

            let mut schedule = Schedule::new(name, start, end);
            schedule.days = days;
            schedule.strict = strict;
            schedule.blocked_items = blocked.into_iter().collect();
            schedule.validate()?;

            let mut config = AppConfig::load()?;
            config.schedules.push(schedule.clone());
            config.save()?;
            println!("{}", serde_json::to_string_pretty(&schedule)?);
        }
        ScheduleAction::Rm { target } => {
            let mut config = AppConfig::load()?;
            let before = config.schedules.len();
            config.schedules.retain(|s| s.id != target && s.name != target);
            if config.schedules.len() == before {
                eprintln!("no schedule matching {target}");
                std::process::exit(1);
            }
            config.save()?;
            println!("removed {}", before - config.schedules.len());
        }
        ScheduleAction::Check => {
            let config = AppConfig::load()?;
            // Schedules are wall-clock ranges; check them against local time.
            let now = local_now();
            match active_schedule(&config.schedules, now) {
                Some(active) => {
                    let out = json!({ "active": active });
                    println!("{}", serde_json::to_string_pretty(&out)?);
                }
                None => {
                    let next = config
                        .schedules
                        .iter()
                        .filter(|s| s.enabled)
                        .filter_map(|s| s.next_occurrence(now).map(|t| (t, &s.name)))
                        .min();
                    let out = match next {
                        Some((at, name)) => json!({ "active": null, "next": { "name": name, "at": at } }),
                        None => json!({ "active": null, "next": null }),
                    };
                    println!("{}", serde_json::to_string_pretty(&out)?);
                }
            }
        }
    }
    Ok(())
}

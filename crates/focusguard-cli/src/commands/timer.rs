use chrono::{DateTime, Utc};
use clap::Subcommand;
use focusguard_core::storage::{data_dir, Database};
use focusguard_core::sync::load_or_create_device_id;
use focusguard_core::{AppConfig, RegretEvaluator, SessionTimer, StartSession, TickOutcome};
use serde_json::json;

const TIMER_KEY: &str = "session_timer";
const REGRET_KEY: &str = "regret_evaluator";

#[derive(Subcommand)]
pub enum TimerAction {
    /// Start a focus session
    Start {
        /// Planned duration in minutes (defaults to config)
        #[arg(long)]
        minutes: Option<u32>,
        /// Run under the strict commitment lock
        #[arg(long)]
        strict: bool,
        /// Session mode label
        #[arg(long)]
        mode: Option<String>,
        /// Extra app/domain identifiers to block (repeatable)
        #[arg(long = "block")]
        blocked: Vec<String>,
    },
    /// Tick the timer and print its state as JSON
    Status,
    /// End the running session (strict sessions consult the exit policy)
    End {
        /// Declare an active premium entitlement
        #[arg(long)]
        entitled: bool,
    },
    /// Push the planned end forward
    Extend {
        /// Minutes to add
        #[arg(long, default_value = "5")]
        minutes: u32,
    },
}

fn load_timer(db: &Database) -> SessionTimer {
    if let Ok(Some(json)) = db.kv_get(TIMER_KEY) {
        if let Ok(timer) = serde_json::from_str::<SessionTimer>(&json) {
            return timer;
        }
    }
    SessionTimer::new()
}

fn save_timer(db: &Database, timer: &SessionTimer) -> Result<(), Box<dyn std::error::Error>> {
    db.kv_set(TIMER_KEY, &serde_json::to_string(timer)?)?;
    Ok(())
}

/// Re-arm post-session regret protection at a terminal transition.
fn arm_regret(db: &Database, now: DateTime<Utc>) -> Result<(), Box<dyn std::error::Error>> {
    let mut evaluator = db
        .kv_get(REGRET_KEY)?
        .and_then(|json| serde_json::from_str::<RegretEvaluator>(&json).ok())
        .unwrap_or_default();
    evaluator.arm(now);
    db.kv_set(REGRET_KEY, &serde_json::to_string(&evaluator)?)?;
    Ok(())
}

pub fn run(action: TimerAction) -> Result<(), Box<dyn std::error::Error>> {
    let db = Database::open()?;
    let mut timer = load_timer(&db);
    let now = Utc::now();

    match action {
        TimerAction::Start {
            minutes,
            strict,
            mode,
            blocked,
        } => {
            let config = AppConfig::load()?;
            let device_id = load_or_create_device_id(&data_dir()?)?;
            let mut blocked_items = config.blocked_items.clone();
            blocked_items.extend(blocked);
            let minutes = minutes.unwrap_or(config.defaults.duration_minutes);
            let session = timer.start(
                StartSession {
                    user_id: config.user_id.clone(),
                    device_id,
                    planned_duration_secs: u64::from(minutes) * 60,
                    strict: strict || config.defaults.strict,
                    blocked_items,
                    mode: mode.unwrap_or_else(|| config.defaults.mode.clone()),
                },
                now,
            )?;
            println!("{}", serde_json::to_string_pretty(session)?);
        }
        TimerAction::Status => match timer.tick(now) {
            TickOutcome::Idle => println!("{}", json!({ "state": "idle" })),
            TickOutcome::Running { remaining_secs } => {
                let config = AppConfig::load()?;
                let exit_status = timer.exit_status(now, false, &config.commitment);
                let out = json!({
                    "state": "running",
                    "remaining_secs": remaining_secs,
                    "exit_status": exit_status,
                });
                println!("{}", serde_json::to_string_pretty(&out)?);
            }
            TickOutcome::Completed(session) => {
                save_timer(&db, &timer)?;
                if let Err(e) = db.insert_session(&session) {
                    eprintln!("warning: session not recorded in history: {e}");
                }
                if let Err(e) = arm_regret(&db, now) {
                    eprintln!("warning: regret window not re-armed: {e}");
                }
                let out = json!({ "state": "completed", "session": session });
                println!("{}", serde_json::to_string_pretty(&out)?);
            }
        },
        TimerAction::End { entitled } => {
            let mut config = AppConfig::load()?;
            let (session, price) = timer.request_end(now, entitled, &mut config.commitment)?;
            // The exit charge and the now-idle timer must land on disk
            // together, before anything else can fail: a persisted charge
            // next to a still-running timer would charge again on retry.
            config.save()?;
            save_timer(&db, &timer)?;
            if let Err(e) = db.insert_session(&session) {
                eprintln!("warning: session not recorded in history: {e}");
            }
            if let Err(e) = arm_regret(&db, now) {
                eprintln!("warning: regret window not re-armed: {e}");
            }
            let out = json!({ "session": session, "exit_price": price });
            println!("{}", serde_json::to_string_pretty(&out)?);
        }
        TimerAction::Extend { minutes } => match timer.extend(u64::from(minutes) * 60) {
            Some(new_end) => println!("{}", json!({ "new_end": new_end })),
            None => {
                eprintln!("no running session");
                std::process::exit(1);
            }
        },
    }

    save_timer(&db, &timer)?;
    Ok(())
}

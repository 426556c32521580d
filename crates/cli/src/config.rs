#![forbid(unsafe_code)]

use ritual_core::ids::{HabitId, UserId};
use ritual_core::zone::parse_utc_offset;
use ritual_core::{Cadence, GoalKind, LogDate};
use ritual_sync::DEFAULT_STREAK_LOOKBACK_DAYS;
use std::path::PathBuf;
use time::UtcOffset;

pub(crate) const DEFAULT_STORAGE_DIR: &str = ".ritual";
pub(crate) const DEFAULT_USER: &str = "guest-user-1";

#[derive(Debug)]
pub(crate) struct CliConfig {
    pub(crate) storage_dir: PathBuf,
    pub(crate) remote_dir: PathBuf,
    pub(crate) user: UserId,
    pub(crate) zone: UtcOffset,
    pub(crate) offline: bool,
    pub(crate) lookback_days: u32,
    pub(crate) command: Command,
}

#[derive(Debug, PartialEq)]
pub(crate) struct AddArgs {
    pub(crate) name: String,
    pub(crate) color: Option<String>,
    pub(crate) category: Option<String>,
    pub(crate) icon: Option<String>,
    pub(crate) cadence: Cadence,
    pub(crate) goal_kind: GoalKind,
    pub(crate) target_value: Option<f64>,
    pub(crate) reminder_time: Option<String>,
}

#[derive(Debug, PartialEq)]
pub(crate) enum Command {
    Add(AddArgs),
    Log {
        habit_id: HabitId,
        date: Option<LogDate>,
        completed: bool,
        value: Option<f64>,
    },
    Archive {
        habit_id: HabitId,
        restore: bool,
    },
    Delete {
        habit_id: HabitId,
    },
    Sync,
    Pending,
    Habits {
        all: bool,
    },
    Streak {
        habit_id: HabitId,
    },
    Stats,
    Insights {
        recent: Vec<String>,
    },
    Refresh,
}

pub(crate) fn usage() -> &'static str {
    "ritual: offline-first habit tracker\n\n\
USAGE:\n\
  ritual [--storage-dir DIR] [--remote-dir DIR] [--user ID]\n\
         [--utc-offset +HH:MM] [--offline] [--lookback-days N] COMMAND\n\n\
COMMANDS:\n\
  add NAME [--color #RRGGBB] [--category C] [--icon I]\n\
           [--cadence daily|weekly|custom] [--goal binary|quantitative]\n\
           [--target N] [--reminder HH:MM]\n\
  log HABIT_ID [--date YYYY-MM-DD] [--undo] [--value N]\n\
  archive HABIT_ID [--restore]\n\
  delete HABIT_ID\n\
  sync | pending | refresh | stats\n\
  habits [--all]\n\
  streak HABIT_ID\n\
  insights [--recent TITLE]...\n\n\
ENVIRONMENT:\n\
  RITUAL_STORAGE_DIR, RITUAL_REMOTE_DIR, RITUAL_USER, RITUAL_UTC_OFFSET,\n\
  RITUAL_OFFLINE, RITUAL_LOOKBACK_DAYS, RITUAL_LOG (default warn)\n"
}

fn env_var(name: &str) -> Option<String> {
    std::env::var(name)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn truthy(raw: &str) -> bool {
    matches!(
        raw.to_ascii_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}

pub(crate) fn parse_args() -> Result<CliConfig, String> {
    let args = std::env::args().skip(1).collect::<Vec<_>>();
    if args.iter().any(|a| a == "-h" || a == "--help") {
        print!("{}", usage());
        std::process::exit(0);
    }
    parse_args_from(&args, env_var)
}

/// Flags win over environment variables, which win over defaults.
pub(crate) fn parse_args_from(
    args: &[String],
    env: impl Fn(&str) -> Option<String>,
) -> Result<CliConfig, String> {
    let mut storage_dir: Option<PathBuf> = env("RITUAL_STORAGE_DIR").map(PathBuf::from);
    let mut remote_dir: Option<PathBuf> = env("RITUAL_REMOTE_DIR").map(PathBuf::from);
    let mut user: String = env("RITUAL_USER").unwrap_or_else(|| DEFAULT_USER.to_string());
    let mut zone: Option<String> = env("RITUAL_UTC_OFFSET");
    let mut offline = env("RITUAL_OFFLINE").is_some_and(|v| truthy(&v));
    let mut lookback_days: u32 = match env("RITUAL_LOOKBACK_DAYS") {
        Some(v) => v
            .parse()
            .map_err(|_| "RITUAL_LOOKBACK_DAYS must be a positive integer")?,
        None => DEFAULT_STREAK_LOOKBACK_DAYS,
    };

    let mut rest = Vec::new();
    let mut i = 0usize;
    while i < args.len() {
        let a = args[i].as_str();
        match a {
            "--storage-dir" => {
                i += 1;
                let v = args.get(i).ok_or("--storage-dir requires DIR")?;
                storage_dir = Some(PathBuf::from(v));
            }
            "--remote-dir" => {
                i += 1;
                let v = args.get(i).ok_or("--remote-dir requires DIR")?;
                remote_dir = Some(PathBuf::from(v));
            }
            "--user" => {
                i += 1;
                let v = args.get(i).ok_or("--user requires ID")?;
                user = v.to_string();
            }
            "--utc-offset" => {
                i += 1;
                let v = args.get(i).ok_or("--utc-offset requires +HH:MM")?;
                zone = Some(v.to_string());
            }
            "--offline" => offline = true,
            "--lookback-days" => {
                i += 1;
                let v = args.get(i).ok_or("--lookback-days requires N")?;
                lookback_days = v
                    .parse::<u32>()
                    .map_err(|_| "--lookback-days must be a positive integer")?;
            }
            _ => rest.push(args[i].clone()),
        }
        i += 1;
    }

    if lookback_days == 0 {
        return Err("lookback days must be at least 1".to_string());
    }
    let storage_dir = storage_dir.unwrap_or_else(|| PathBuf::from(DEFAULT_STORAGE_DIR));
    let remote_dir = remote_dir.unwrap_or_else(|| storage_dir.join("remote"));
    let user = UserId::try_new(user).map_err(|err| format!("invalid user id: {err}"))?;
    let zone = match zone {
        Some(raw) => parse_utc_offset(&raw).map_err(|err| err.to_string())?,
        None => UtcOffset::UTC,
    };
    let command = parse_command(&rest)?;

    Ok(CliConfig {
        storage_dir,
        remote_dir,
        user,
        zone,
        offline,
        lookback_days,
        command,
    })
}

fn parse_habit_id(raw: Option<&String>, command: &str) -> Result<HabitId, String> {
    let raw = raw.ok_or_else(|| format!("{command} requires HABIT_ID"))?;
    HabitId::try_new(raw.as_str()).map_err(|err| format!("invalid habit id: {err}"))
}

fn parse_number(flag: &str, raw: Option<&String>) -> Result<f64, String> {
    raw.ok_or_else(|| format!("{flag} requires N"))?
        .parse::<f64>()
        .map_err(|_| format!("{flag} must be a number"))
}

fn parse_command(args: &[String]) -> Result<Command, String> {
    let (name, rest) = args.split_first().ok_or("missing COMMAND (see --help)")?;
    match name.as_str() {
        "add" => parse_add(rest),
        "log" => {
            let habit_id = parse_habit_id(rest.first(), "log")?;
            let mut date = None;
            let mut completed = true;
            let mut value = None;
            let mut i = 1usize;
            while i < rest.len() {
                match rest[i].as_str() {
                    "--date" => {
                        i += 1;
                        let v = rest.get(i).ok_or("--date requires YYYY-MM-DD")?;
                        date = Some(LogDate::parse(v).map_err(|err| format!("--date: {err}"))?);
                    }
                    "--undo" => completed = false,
                    "--value" => {
                        i += 1;
                        value = Some(parse_number("--value", rest.get(i))?);
                    }
                    other => return Err(format!("log: unexpected argument {other:?}")),
                }
                i += 1;
            }
            Ok(Command::Log {
                habit_id,
                date,
                completed,
                value,
            })
        }
        "archive" => {
            let habit_id = parse_habit_id(rest.first(), "archive")?;
            let restore = match rest.get(1).map(String::as_str) {
                None => false,
                Some("--restore") => true,
                Some(other) => return Err(format!("archive: unexpected argument {other:?}")),
            };
            Ok(Command::Archive { habit_id, restore })
        }
        "delete" => Ok(Command::Delete {
            habit_id: parse_habit_id(rest.first(), "delete")?,
        }),
        "streak" => Ok(Command::Streak {
            habit_id: parse_habit_id(rest.first(), "streak")?,
        }),
        "habits" => Ok(Command::Habits {
            all: rest.iter().any(|a| a == "--all"),
        }),
        "insights" => {
            let mut recent = Vec::new();
            let mut i = 0usize;
            while i < rest.len() {
                if rest[i] != "--recent" {
                    return Err(format!("insights: unexpected argument {:?}", rest[i]));
                }
                i += 1;
                recent.push(rest.get(i).ok_or("--recent requires TITLE")?.clone());
                i += 1;
            }
            Ok(Command::Insights { recent })
        }
        "sync" => Ok(Command::Sync),
        "pending" => Ok(Command::Pending),
        "stats" => Ok(Command::Stats),
        "refresh" => Ok(Command::Refresh),
        other => Err(format!("unknown command {other:?} (see --help)")),
    }
}

fn parse_add(rest: &[String]) -> Result<Command, String> {
    let name = rest.first().ok_or("add requires NAME")?.clone();
    let mut add = AddArgs {
        name,
        color: None,
        category: None,
        icon: None,
        cadence: Cadence::Daily,
        goal_kind: GoalKind::Binary,
        target_value: None,
        reminder_time: None,
    };

    let mut i = 1usize;
    while i < rest.len() {
        let flag = rest[i].as_str();
        i += 1;
        let value = rest.get(i);
        match flag {
            "--color" => add.color = Some(value.ok_or("--color requires #RRGGBB")?.clone()),
            "--category" => add.category = Some(value.ok_or("--category requires C")?.clone()),
            "--icon" => add.icon = Some(value.ok_or("--icon requires I")?.clone()),
            "--reminder" => add.reminder_time = Some(value.ok_or("--reminder requires HH:MM")?.clone()),
            "--target" => add.target_value = Some(parse_number("--target", value)?),
            "--cadence" => {
                let raw = value.ok_or("--cadence requires daily|weekly|custom")?;
                add.cadence = Cadence::parse(raw)
                    .ok_or("--cadence must be daily, weekly or custom")?;
            }
            "--goal" => {
                let raw = value.ok_or("--goal requires binary|quantitative")?;
                add.goal_kind = GoalKind::parse(raw)
                    .ok_or("--goal must be binary or quantitative")?;
            }
            other => return Err(format!("add: unexpected argument {other:?}")),
        }
        i += 1;
    }
    Ok(Command::Add(add))
}

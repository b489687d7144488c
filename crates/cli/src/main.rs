//! studytrack CLI - goals, study sessions, streaks and rewards.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use anyhow::{anyhow, Context, Result};
use chrono::{DateTime, Duration, NaiveDate, Utc};
use clap::{Parser, Subcommand};
use serde::Serialize;
use studytrack_core::calendar::start_of_day;
use studytrack_core::{
    Goal, GoalId, GoalSpec, GoalStatus, MilestoneSpec, Period, SessionCompleted, SubTaskId, Time,
    Timeframe, UserId,
};
use studytrack_engine::{EngineConfig, LogSink, StudyEngine};
use studytrack_progress::Granularity;
use studytrack_storage::JsonStorage;
use tracing::debug;
use tracing_subscriber::EnvFilter;

const MAX_SESSION_MINUTES: u64 = 24 * 60;

#[derive(Parser)]
#[command(name = "studytrack")]
#[command(about = "Study goals, streaks and rewards", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Storage path for studytrack data
    #[arg(short, long, default_value = ".studytrack", global = true)]
    storage: PathBuf,

    /// Acting user
    #[arg(short, long, default_value = "me", global = true)]
    user: String,

    /// Evaluate as of this time (RFC 3339 or YYYY-MM-DD) instead of now
    #[arg(long, global = true)]
    at: Option<String>,

    /// Print JSON instead of text
    #[arg(long, global = true)]
    json: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Manage goals
    Goal {
        #[command(subcommand)]
        action: GoalCommand,
    },
    /// Record a completed study session
    Session {
        /// Length in minutes
        #[arg(long)]
        minutes: u64,
        /// Subject studied
        #[arg(long)]
        subject: Option<String>,
        /// Start time; defaults to `minutes` before now
        #[arg(long)]
        started: Option<String>,
    },
    /// Show the current streak
    Streak,
    /// Show the leaderboard
    Leaderboard {
        /// alltime, weekly or monthly
        #[arg(long, default_value = "alltime")]
        timeframe: String,
        /// Rows to show
        #[arg(long, default_value = "10")]
        limit: usize,
    },
    /// Show your rank
    Rank {
        /// alltime, weekly or monthly
        #[arg(long, default_value = "alltime")]
        timeframe: String,
    },
    /// Show points, level, earned rewards and statistics
    Rewards,
    /// List the reward catalog
    Catalog,
    /// Grant bonus points
    Bonus {
        /// Points to grant
        points: u64,
        /// Why
        #[arg(long)]
        reason: String,
    },
    /// Get a motivational tip
    Tip,
    /// Catch-up suggestions for goals behind pace
    Catchup,
    /// Deliver and clear queued notifications
    Notifications,
}

#[derive(Subcommand)]
enum GoalCommand {
    /// Create a goal
    Create {
        /// Title
        title: String,
        /// Numeric target
        #[arg(long)]
        target: f64,
        /// Unit label, e.g. hours, minutes, sessions, pages
        #[arg(long)]
        unit: String,
        /// daily, weekly, monthly or custom
        #[arg(long, default_value = "weekly")]
        period: String,
        /// Only sessions on this subject count
        #[arg(long)]
        subject: Option<String>,
        /// Description
        #[arg(long, default_value = "")]
        description: String,
        /// Custom window start
        #[arg(long)]
        start: Option<String>,
        /// Custom window end
        #[arg(long)]
        due: Option<String>,
        /// Milestone as TITLE:TARGET (repeatable)
        #[arg(long = "milestone")]
        milestones: Vec<String>,
        /// Subtask title (repeatable)
        #[arg(long = "subtask")]
        subtasks: Vec<String>,
    },
    /// List goals
    List {
        /// Filter by status
        #[arg(long)]
        status: Option<String>,
    },
    /// Show goal details and pace
    Show {
        /// Goal ID
        id: String,
    },
    /// Add (or with a negative value, correct) progress
    Progress {
        /// Goal ID
        id: String,
        /// Amount in the goal's unit
        #[arg(allow_hyphen_values = true)]
        delta: f64,
        /// Note for the audit trail
        #[arg(long, default_value = "")]
        note: String,
    },
    /// Add a milestone
    Milestone {
        /// Goal ID
        id: String,
        /// Title
        title: String,
        /// Progress threshold
        target: f64,
        /// Deadline
        #[arg(long)]
        due: Option<String>,
    },
    /// Add a subtask
    Subtask {
        /// Goal ID
        id: String,
        /// Title
        title: String,
    },
    /// Toggle a subtask
    Toggle {
        /// Goal ID
        id: String,
        /// Subtask ID
        subtask: String,
    },
    /// Change status: active, paused, cancelled or completed
    Status {
        /// Goal ID
        id: String,
        /// New status
        status: String,
    },
    /// Reopen a completed or cancelled goal
    Reopen {
        /// Goal ID
        id: String,
    },
    /// Delete a goal permanently
    Delete {
        /// Goal ID
        id: String,
    },
    /// Progress per week or month
    Breakdown {
        /// Goal ID
        id: String,
        /// week or month
        #[arg(long, default_value = "week")]
        by: String,
    },
}

fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    init_logging();
    let cli = Cli::parse();

    let config = load_config(&cli.storage).await?;
    let storage = JsonStorage::new(&cli.storage).await?;
    let engine = StudyEngine::new(storage)
        .with_config(config)
        .with_sink(Arc::new(LogSink));
    engine.seed_catalog().await?;

    let user = UserId::new(cli.user.clone());
    let now = match &cli.at {
        Some(s) => parse_time(s)?,
        None => Utc::now(),
    };
    debug!(user = %user, %now, "running command");

    match cli.command {
        Commands::Goal { action } => run_goal(&engine, &user, action, now, cli.json).await?,
        Commands::Session { minutes, subject, started } => {
            let seconds = session_seconds(minutes)?;
            let started_at = match started {
                Some(s) => parse_time(&s)?,
                None => now - Duration::seconds(seconds as i64),
            };
            let mut event = SessionCompleted::new(user.clone(), seconds, started_at);
            event.subject = subject;
            let outcome = engine.on_session_completed(event).await?;
            emit(cli.json, &outcome, || {
                if outcome.duplicate {
                    println!("Session {} was already recorded", outcome.session_id);
                    return;
                }
                println!("Recorded session {}", outcome.session_id);
                for g in &outcome.goals {
                    let done = if g.just_completed { " (completed!)" } else { "" };
                    println!("  goal {} +{:.2}{}", g.goal_id, g.applied_delta, done);
                }
                if let Some(streak) = &outcome.streak {
                    println!("  streak: {} day(s)", streak.current_streak);
                }
                for r in &outcome.newly_earned {
                    println!("  earned: {} (+{} points)", r.name, r.points);
                }
            })?;
        }
        Commands::Streak => {
            let streak = engine.get_streak(&user, now).await?;
            emit(cli.json, &streak, || {
                println!("Current streak: {} day(s) ({:?})", streak.current_streak, streak.status);
                println!("Longest streak: {} day(s)", streak.longest_streak);
                if let Some(next) = streak.next_milestone {
                    println!("Next milestone: {next} days");
                }
            })?;
        }
        Commands::Leaderboard { timeframe, limit } => {
            let timeframe: Timeframe = timeframe.parse()?;
            let board = engine.get_leaderboard(timeframe, limit, now).await?;
            emit(cli.json, &board, || {
                println!("Leaderboard ({timeframe:?})");
                for row in &board {
                    println!("  #{:<3} {:<20} {}", row.rank, row.user_id, row.points);
                }
            })?;
        }
        Commands::Rank { timeframe } => {
            let timeframe: Timeframe = timeframe.parse()?;
            let pos = engine.get_rank(&user, timeframe, now).await?;
            emit(cli.json, &pos, || {
                println!("Rank #{} with {} points", pos.rank, pos.points);
            })?;
        }
        Commands::Rewards => {
            let rewards = engine.user_rewards(&user).await?;
            emit(cli.json, &rewards, || {
                println!("Points: {}", rewards.total_points);
                println!("Level: {} ({:.0}% to next)", rewards.current_level, rewards.level_progress);
                let s = &rewards.lifetime_stats;
                println!(
                    "Sessions: {}  Hours: {:.1}  Goals completed: {}",
                    s.total_sessions, s.total_study_hours, s.total_goals_completed
                );
                println!("Earned ({})", rewards.earned_rewards.len());
                for r in &rewards.earned_rewards {
                    println!("  {} +{} at {}", r.reward_id, r.points, r.earned_at);
                }
                for g in &rewards.bonus_grants {
                    println!("  bonus +{} ({})", g.points, g.reason);
                }
            })?;
        }
        Commands::Catalog => {
            let catalog = engine.catalog().await?;
            emit(cli.json, &catalog, || {
                for r in &catalog {
                    println!("  {:<18} {:<16} {:>4} pts  {}", r.id, r.name, r.points_value, r.description);
                }
            })?;
        }
        Commands::Bonus { points, reason } => {
            let rewards = engine.grant_bonus(&user, points, &reason, now).await?;
            emit(cli.json, &rewards, || {
                println!("Granted {points} points; total {}", rewards.total_points);
            })?;
        }
        Commands::Tip => {
            let tip = engine.pick_tip(&user, now).await?;
            emit(cli.json, &tip, || println!("{}", tip.text))?;
        }
        Commands::Catchup => {
            let suggestions = engine.get_catch_up_suggestions(&user, now).await?;
            emit(cli.json, &suggestions, || {
                if suggestions.is_empty() {
                    println!("All goals on track");
                }
                for s in &suggestions {
                    println!("{} ({}): {}", s.title, s.goal_id, s.suggestion.message);
                }
            })?;
        }
        Commands::Notifications => {
            let drained = engine.drain_notifications(&user).await?;
            emit(cli.json, &drained, || {
                if drained.is_empty() {
                    println!("No notifications");
                }
                for n in &drained {
                    println!("[{}] {}", n.created_at.format("%Y-%m-%d %H:%M"), n.message);
                }
            })?;
        }
    }

    Ok(())
}

async fn run_goal(
    engine: &StudyEngine<JsonStorage>,
    user: &UserId,
    action: GoalCommand,
    now: Time,
    json: bool,
) -> Result<()> {
    match action {
        GoalCommand::Create {
            title,
            target,
            unit,
            period,
            subject,
            description,
            start,
            due,
            milestones,
            subtasks,
        } => {
            let spec = GoalSpec {
                title,
                description,
                target: Some(target),
                progress_unit: Some(unit),
                period: Some(period.parse::<Period>()?),
                subject,
                start_date: start.as_deref().map(parse_time).transpose()?,
                due_date: due.as_deref().map(parse_time).transpose()?,
                milestones: milestones
                    .iter()
                    .map(String::as_str)
                    .map(parse_milestone)
                    .collect::<Result<Vec<_>>>()?,
                subtasks,
                ..Default::default()
            };
            let goal = engine.create_goal(user, spec, now).await?;
            emit(json, &goal, || println!("Created goal: {} - {}", goal.id, goal.title))?;
        }
        GoalCommand::List { status } => {
            let status = status.map(|s| s.parse::<GoalStatus>()).transpose()?;
            let goals = engine.list_goals(user, status.map(|s| vec![s])).await?;
            emit(json, &goals, || {
                println!("Goals ({})", goals.len());
                for g in &goals {
                    println!(
                        "  {} | {:<9} | {:>5.1}% | {}",
                        g.id,
                        g.status.as_str().to_uppercase(),
                        g.completion_rate,
                        g.title
                    );
                }
            })?;
        }
        GoalCommand::Show { id } => {
            let goal = engine.get_goal(parse_goal_id(&id)?).await?;
            let insight = engine.goal_insight(goal.id, now).await?;
            if json {
                print_json(&serde_json::json!({ "goal": goal, "insight": insight }))?;
            } else {
                print_goal(&goal);
                println!("  Expected by now: {:.1}", insight.expected_progress);
                println!("  Days remaining: {}", insight.days_remaining);
                if insight.is_overdue {
                    println!("  Behind pace");
                }
                for s in &insight.catch_up_suggestions {
                    println!("  > {}", s.message);
                }
            }
        }
        GoalCommand::Progress { id, delta, note } => {
            let update = engine.apply_progress(parse_goal_id(&id)?, delta, &note, now).await?;
            emit(json, &update, || {
                let g = &update.goal;
                println!(
                    "{}: {:.1}/{:.1} {} ({:.1}%)",
                    g.title, g.current_progress, g.target, g.progress_unit, g.completion_rate
                );
                if !update.completed_milestones.is_empty() {
                    println!("  {} milestone(s) reached", update.completed_milestones.len());
                }
                if update.just_completed {
                    println!("  Goal completed!");
                }
            })?;
        }
        GoalCommand::Milestone { id, title, target, due } => {
            let spec = MilestoneSpec {
                title,
                target,
                due_date: due.as_deref().map(parse_time).transpose()?,
                reward: None,
            };
            let goal = engine.add_milestone(parse_goal_id(&id)?, spec, now).await?;
            emit(json, &goal, || print_goal(&goal))?;
        }
        GoalCommand::Subtask { id, title } => {
            let (goal, subtask) = engine.add_subtask(parse_goal_id(&id)?, &title, now).await?;
            emit(json, &goal, || println!("Added subtask {subtask} to {}", goal.id))?;
        }
        GoalCommand::Toggle { id, subtask } => {
            let subtask: SubTaskId = subtask.parse().map_err(|_| anyhow!("Invalid subtask ID"))?;
            let goal = engine.toggle_subtask(parse_goal_id(&id)?, subtask, now).await?;
            emit(json, &goal, || print_goal(&goal))?;
        }
        GoalCommand::Status { id, status } => {
            let goal = engine
                .set_status(parse_goal_id(&id)?, status.parse::<GoalStatus>()?, now)
                .await?;
            emit(json, &goal, || println!("Goal {} is now {}", goal.id, goal.status))?;
        }
        GoalCommand::Reopen { id } => {
            let goal = engine.reopen_goal(parse_goal_id(&id)?, now).await?;
            emit(json, &goal, || println!("Goal {} reopened", goal.id))?;
        }
        GoalCommand::Delete { id } => {
            let goal_id = parse_goal_id(&id)?;
            engine.delete_goal(goal_id).await?;
            if !json {
                println!("Deleted goal {goal_id}");
            }
        }
        GoalCommand::Breakdown { id, by } => {
            let granularity: Granularity = by.parse()?;
            let buckets = engine.period_breakdown(parse_goal_id(&id)?, granularity, now).await?;
            emit(json, &buckets, || {
                for b in &buckets {
                    println!(
                        "  {} .. {}  target {:>7.2}  actual {:>7.2}",
                        b.period_start, b.period_end, b.target_for_period, b.actual_for_period
                    );
                }
            })?;
        }
    }
    Ok(())
}

async fn load_config(root: &Path) -> Result<EngineConfig> {
    let path = root.join("config.json");
    match tokio::fs::read_to_string(&path).await {
        Ok(text) => serde_json::from_str(&text).with_context(|| format!("invalid {}", path.display())),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(EngineConfig::default()),
        Err(e) => Err(e.into()),
    }
}

fn parse_time(s: &str) -> Result<Time> {
    if let Ok(t) = DateTime::parse_from_rfc3339(s) {
        return Ok(t.with_timezone(&Utc));
    }
    let date = NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .map_err(|_| anyhow!("Invalid time '{s}': expected RFC 3339 or YYYY-MM-DD"))?;
    Ok(start_of_day(date))
}

/// Session length in seconds; sessions run from one minute to a full day.
fn session_seconds(minutes: u64) -> Result<u64> {
    if !(1..=MAX_SESSION_MINUTES).contains(&minutes) {
        return Err(anyhow!("--minutes must be between 1 and {MAX_SESSION_MINUTES}, got {minutes}"));
    }
    Ok(minutes * 60)
}

fn parse_goal_id(s: &str) -> Result<GoalId> {
    s.parse().map_err(|_| anyhow!("Invalid goal ID"))
}

fn parse_milestone(s: &str) -> Result<MilestoneSpec> {
    let (title, target) = s
        .rsplit_once(':')
        .ok_or_else(|| anyhow!("Milestone must be TITLE:TARGET, got '{s}'"))?;
    Ok(MilestoneSpec {
        title: title.to_string(),
        target: target.trim().parse().with_context(|| format!("Invalid milestone target in '{s}'"))?,
        ..Default::default()
    })
}

fn emit<T: Serialize>(json: bool, value: &T, text: impl FnOnce()) -> Result<()> {
    if json {
        print_json(value)
    } else {
        text();
        Ok(())
    }
}

fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn print_goal(goal: &Goal) {
    println!("Goal: {}", goal.id);
    println!("  Title: {}", goal.title);
    println!("  Status: {}", goal.status);
    println!(
        "  Progress: {:.1}/{:.1} {} ({:.1}%)",
        goal.current_progress, goal.target, goal.progress_unit, goal.completion_rate
    );
    if let Some(due) = goal.due_date {
        println!("  Due: {due}");
    }
    for m in &goal.milestones {
        let mark = if m.completed { "x" } else { " " };
        println!("  [{mark}] {} @ {:.1}", m.title, m.target);
    }
    for t in &goal.subtasks {
        let mark = if t.completed { "x" } else { " " };
        println!("  [{mark}] {} ({})", t.title, t.id);
    }
}

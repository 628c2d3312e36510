//! Stride Coach CLI
//!
//! Runs the engagement engine against simulated sensors.

use anyhow::{bail, Context};
use chrono::Utc;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use stride_coach::{
    alerts::{ConsoleHaptics, ConsoleNotifier, FixedAuthorizer},
    clock::{Clock, ScaledClock, ThreadTimer, MAX_SPEED, MIN_SPEED},
    collector::{
        ActivityClassifier, ActivityPlan, SimulatedClassifier, SimulatedStepCounter, StepCounter,
        UnavailableClassifier, UnavailableStepCounter,
    },
    config::{Config, SourceConfig},
    core::{ActivityState, Collaborators, EngagementEngine, EngagementSnapshot},
    VERSION,
};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "stride-coach")]
#[command(version = VERSION)]
#[command(about = "Coaches you toward a daily step goal", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a coaching session against simulated sensors
    Start {
        /// Activity plan to simulate (JSON); defaults to the built-in sample
        #[arg(long)]
        plan: Option<PathBuf>,

        /// How many times faster than real time the simulation runs
        #[arg(long, default_value = "60")]
        speed: f64,

        /// Sensors to use (activity, steps, or all)
        #[arg(long, default_value = "all")]
        sources: String,

        /// Override the configured step goal for this session
        #[arg(long)]
        goal: Option<u32>,

        /// Override the configured inactivity threshold (minutes)
        #[arg(long)]
        threshold: Option<u32>,

        /// Deny notification permission for this session
        #[arg(long)]
        no_notifications: bool,
    },

    /// Change saved settings
    Set {
        /// Daily step goal
        #[arg(long)]
        goal: Option<u32>,

        /// Minutes of stillness between reminders
        #[arg(long)]
        threshold: Option<u32>,

        /// IANA timezone that defines the start of the day
        #[arg(long)]
        timezone: Option<String>,
    },

    /// Show the adaptive sampling policy
    Policy,

    /// Print the built-in activity plan as JSON
    SamplePlan,

    /// Show configuration
    Config,
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("stride_coach=info")),
        )
        .with_target(false)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Start {
            plan,
            speed,
            sources,
            goal,
            threshold,
            no_notifications,
        } => cmd_start(plan, speed, &sources, goal, threshold, no_notifications),
        Commands::Set {
            goal,
            threshold,
            timezone,
        } => cmd_set(goal, threshold, timezone),
        Commands::Policy => {
            cmd_policy();
            Ok(())
        }
        Commands::SamplePlan => cmd_sample_plan(),
        Commands::Config => cmd_config(),
    }
}

fn cmd_start(
    plan_path: Option<PathBuf>,
    speed: f64,
    sources: &str,
    goal: Option<u32>,
    threshold: Option<u32>,
    no_notifications: bool,
) -> anyhow::Result<()> {
    println!("Stride Coach v{VERSION}");
    println!();

    if !(MIN_SPEED..=MAX_SPEED).contains(&speed) {
        bail!("--speed must be between {MIN_SPEED} and {MAX_SPEED}");
    }

    let source_config = SourceConfig::from_csv(sources);
    if !source_config.any_enabled() {
        bail!("at least one source must be enabled (activity or steps)");
    }

    let mut config = Config::load().context("loading config")?;
    if let Some(goal) = goal {
        config.step_goal = goal;
    }
    if let Some(threshold) = threshold {
        config.inactivity_alert_threshold_minutes = threshold;
    }
    let settings = config.engine_settings()?;

    let plan = match plan_path {
        Some(path) => ActivityPlan::load(&path)
            .with_context(|| format!("loading plan {}", path.display()))?,
        None => ActivityPlan::sample(),
    };
    let plan_length = plan.total_duration();
    let plan = Arc::new(plan);

    println!("Starting session...");
    println!("  Step goal: {}", settings.step_goal);
    println!(
        "  Inactivity reminder every: {} min",
        settings.inactivity_alert_threshold
    );
    println!(
        "  Activity sensor: {}",
        if source_config.activity { "enabled" } else { "disabled" }
    );
    println!(
        "  Step sensor: {}",
        if source_config.steps { "enabled" } else { "disabled" }
    );
    println!(
        "  Plan: {} legs, {} simulated minutes at {speed}x",
        plan.legs.len(),
        plan_length.num_minutes()
    );
    println!();
    println!("Press Ctrl+C to stop");
    println!();

    let clock: Arc<dyn Clock> = Arc::new(ScaledClock::new(Utc::now(), speed));
    let started_at = clock.now();

    let classifier: Box<dyn ActivityClassifier> = if source_config.activity {
        Box::new(SimulatedClassifier::new(
            Arc::clone(&plan),
            Arc::clone(&clock),
            started_at,
            speed,
        ))
    } else {
        Box::new(UnavailableClassifier::new("disabled by --sources"))
    };
    let step_counter: Box<dyn StepCounter> = if source_config.steps {
        Box::new(SimulatedStepCounter::new(
            Arc::clone(&plan),
            Arc::clone(&clock),
            started_at,
            speed,
        ))
    } else {
        Box::new(UnavailableStepCounter::new("disabled by --sources"))
    };

    let collab = Collaborators {
        classifier,
        step_counter,
        timer: Box::new(ThreadTimer::with_speed(speed)),
        clock: Arc::clone(&clock),
        notifications: Box::new(ConsoleNotifier::new()),
        haptics: Box::new(ConsoleHaptics::new()),
    };

    let mut engine = EngagementEngine::new(settings, collab);
    let stats = engine.stats();
    let changes = engine.subscribe();
    engine.request_notification_authorization(FixedAuthorizer::new(
        config.notifications && !no_notifications,
    ));

    let running = Arc::new(AtomicBool::new(true));
    ctrlc_handler(Arc::clone(&running))?;

    engine.start();

    let mut last_printed: Option<(ActivityState, u64, bool, u32)> = None;
    while running.load(Ordering::SeqCst) && clock.now() - started_at < plan_length {
        engine.pump(Duration::from_millis(100));

        // Only the latest snapshot matters for the progress line.
        if let Some(snapshot) = changes.try_iter().last() {
            print_progress(&snapshot, &mut last_printed);
        }
    }

    println!();
    println!("Stopping session...");
    engine.stop();
    engine.process_pending();

    println!();
    println!("Final: {}", engine.snapshot().status_line());
    println!();
    println!("{}", stats.summary());
    Ok(())
}

fn print_progress(
    snapshot: &EngagementSnapshot,
    last_printed: &mut Option<(ActivityState, u64, bool, u32)>,
) {
    let key = (
        snapshot.current_activity,
        snapshot.steps / 100,
        snapshot.celebrating,
        snapshot.inactivity_minutes,
    );
    if last_printed.as_ref() == Some(&key) {
        return;
    }
    *last_printed = Some(key);
    println!("{}", snapshot.status_line());
}

fn cmd_set(
    goal: Option<u32>,
    threshold: Option<u32>,
    timezone: Option<String>,
) -> anyhow::Result<()> {
    let mut config = Config::load().context("loading config")?;
    if let Some(goal) = goal {
        config.step_goal = goal;
    }
    if let Some(threshold) = threshold {
        config.inactivity_alert_threshold_minutes = threshold;
    }
    if let Some(timezone) = timezone {
        config.timezone = timezone;
    }
    config.validate()?;
    config.save().context("saving config")?;

    println!(
        "Saved: goal {} steps, reminder every {} min, day starts at midnight {}",
        config.step_goal, config.inactivity_alert_threshold_minutes, config.timezone
    );
    Ok(())
}

fn cmd_policy() {
    println!("Adaptive sampling policy");
    println!("========================");
    println!();
    for activity in ActivityState::ALL {
        println!(
            "  {:<11} {:>3} s",
            activity.label(),
            activity.poll_interval().as_secs()
        );
    }
}

fn cmd_sample_plan() -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(&ActivityPlan::sample())?);
    Ok(())
}

fn cmd_config() -> anyhow::Result<()> {
    let config = Config::load().context("loading config")?;

    println!("Configuration");
    println!("=============");
    println!();
    println!("Config file: {:?}", Config::config_path());
    println!();
    println!("{}", serde_json::to_string_pretty(&config)?);

    if let Err(e) = config.validate() {
        eprintln!("Warning: {e}");
    }
    Ok(())
}

/// Set up Ctrl+C handler.
fn ctrlc_handler(running: Arc<AtomicBool>) -> anyhow::Result<()> {
    ctrlc::set_handler(move || {
        running.store(false, Ordering::SeqCst);
    })
    .context("setting Ctrl+C handler")
}

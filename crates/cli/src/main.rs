use std::io::Write as _;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use browser::{BrowserDriver, DriverConfig, SandboxConfig, ScriptSandbox};
use clap::{Parser, Subcommand};
use colored::Colorize;
use llm::{GeminiClient, LlmConfig};
use orchestrator::{
    DomCleaner, EngineConfig, EngineStatus, HumanPatch, RunContext, RunReport, WorkflowEngine,
};
use testpilot_core::{CheckpointStore, Run, RunStatus, SuspendPoint};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use uuid::Uuid;

const PILOT_DIR: &str = ".testpilot";
const DEFAULT_DB_NAME: &str = "testpilot.db";

#[derive(Parser)]
#[command(name = "testpilot")]
#[command(about = "Autonomous browser-testing agent", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Explore a page, design a test, then generate and verify it.
    Run {
        url: String,

        /// Skip both human checkpoints and run fully autonomously.
        #[arg(long)]
        auto: bool,

        /// Show the browser window during exploration.
        #[arg(long)]
        headful: bool,

        #[arg(long, default_value_t = 3)]
        max_attempts: u32,

        /// Persist the run and its checkpoints under .testpilot/.
        #[arg(long)]
        persist: bool,
    },
    /// Resume a persisted run that is parked at a checkpoint.
    Resume {
        run_id: Uuid,

        /// Critique to fold into a revised test plan.
        #[arg(long)]
        feedback: Option<String>,

        /// Approve the result at the final-review checkpoint.
        #[arg(long)]
        approve: bool,

        /// Grant a fresh attempt budget for the next design cycle.
        #[arg(long)]
        reset_attempts: bool,
    },
    /// List persisted runs.
    List {
        /// Only runs parked at a human checkpoint.
        #[arg(long)]
        suspended: bool,
    },
    /// Abandon a persisted run that is parked at a checkpoint.
    Abandon { run_id: Uuid },
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    init_tracing();

    let cli = Cli::parse();
    match cli.command {
        Commands::Run {
            url,
            auto,
            headful,
            max_attempts,
            persist,
        } => run(&url, auto, headful, max_attempts, persist).await,
        Commands::Resume {
            run_id,
            feedback,
            approve,
            reset_attempts,
        } => resume(run_id, feedback, approve, reset_attempts).await,
        Commands::List { suspended } => list(suspended).await,
        Commands::Abandon { run_id } => abandon(run_id).await,
    }
}

async fn run(url: &str, auto: bool, headful: bool, max_attempts: u32, persist: bool) -> Result<()> {
    let (engine, driver) = build_engine(headful, max_attempts, auto, persist).await?;

    println!();
    println!("{} {}", "Testing".bold(), url);
    println!();

    let outcome = drive_interactive(&engine, url).await;
    driver.close().await;
    outcome
}

/// Drive the run, prompting on stdin at each checkpoint.
async fn drive_interactive(engine: &WorkflowEngine, url: &str) -> Result<()> {
    let mut status = engine.start(url).await?;

    loop {
        match status {
            EngineStatus::Completed(report) => {
                print_report(&report);
                return Ok(());
            }
            EngineStatus::Suspended { run, point } => {
                show_checkpoint(engine, &run, point).await?;

                let input = prompt_line(&format!(
                    "{} ",
                    "[Enter] continue, type feedback, or 'abandon':".bold()
                ))?;

                if input.eq_ignore_ascii_case("abandon") {
                    let mut run = run;
                    engine.abandon(&mut run).await?;
                    println!("{}", "Run abandoned.".yellow());
                    return Ok(());
                }

                let patch = if input.is_empty() {
                    match point {
                        SuspendPoint::PlanReview => HumanPatch::default(),
                        SuspendPoint::FinalReview => HumanPatch::approve(),
                    }
                } else {
                    HumanPatch::feedback(input)
                };
                status = engine.resume(run, patch).await?;
            }
        }
    }
}

async fn resume(
    run_id: Uuid,
    feedback: Option<String>,
    approve: bool,
    reset_attempts: bool,
) -> Result<()> {
    let (engine, driver) = build_engine(false, 3, false, true).await?;

    let repository = engine
        .context()
        .run_repository
        .as_ref()
        .context("run persistence is not configured")?;
    let run = repository
        .find_by_id(run_id)
        .await?
        .with_context(|| format!("no run {run_id}"))?;

    if !run.status.is_suspended() {
        anyhow::bail!(
            "run {} is {} and cannot be resumed",
            run_id,
            run.status.as_str()
        );
    }

    let patch = HumanPatch {
        user_feedback: feedback,
        approved: approve.then_some(true),
        reset_attempts,
    };

    let outcome = match engine.resume(run, patch).await? {
        EngineStatus::Completed(report) => {
            print_report(&report);
            Ok(())
        }
        EngineStatus::Suspended { run, point } => {
            println!(
                "Run {} suspended again at {}. Resume with 'testpilot resume {}'.",
                run.id,
                point.as_str().bold(),
                run.id
            );
            Ok(())
        }
    };
    driver.close().await;
    outcome
}

async fn list(suspended: bool) -> Result<()> {
    let pool = open_pool().await?;
    let repository = db::RunRepository::new(pool);
    let runs = if suspended {
        repository.find_suspended().await?
    } else {
        repository.find_all().await?
    };

    if runs.is_empty() {
        println!("No runs yet.");
        return Ok(());
    }

    println!();
    println!("Runs ({}):", runs.len());
    for run in &runs {
        println!(
            "  {} {} [{}] {}",
            status_icon(run.status),
            run.id,
            run.status.as_str(),
            run.url
        );
    }
    println!();
    Ok(())
}

async fn abandon(run_id: Uuid) -> Result<()> {
    let pool = open_pool().await?;
    let repository = db::RunRepository::new(pool.clone());
    let run = repository
        .find_by_id(run_id)
        .await?
        .with_context(|| format!("no run {run_id}"))?;

    if run.status.is_terminal() {
        anyhow::bail!("run {} is already {}", run_id, run.status.as_str());
    }

    repository.update_status(run_id, RunStatus::Abandoned).await?;
    let checkpoints = db::SqliteCheckpointStore::new(pool);
    checkpoints.clear(run_id).await?;

    println!("{} run {}", "Abandoned".yellow(), run_id);
    Ok(())
}

async fn build_engine(
    headful: bool,
    max_attempts: u32,
    auto: bool,
    persist: bool,
) -> Result<(WorkflowEngine, Arc<BrowserDriver>)> {
    let llm_config = LlmConfig::from_env()?;

    let data_dir = data_dir();
    let screenshot_dir = data_dir.join("screenshots");
    tokio::fs::create_dir_all(&screenshot_dir).await?;

    let driver = Arc::new(BrowserDriver::new(DriverConfig {
        headless: !headful,
        screenshot_dir,
        ..Default::default()
    }));
    let sandbox = Arc::new(ScriptSandbox::new(SandboxConfig::default()));
    let generator = Arc::new(GeminiClient::new(llm_config));

    let config = if auto {
        EngineConfig::autonomous()
    } else {
        EngineConfig::default()
    }
    .with_max_attempts(max_attempts);

    let mut ctx = RunContext::new(driver.clone(), Arc::new(DomCleaner), generator, sandbox)
        .with_config(config);

    if persist {
        let pool = open_pool().await?;
        ctx = ctx
            .with_run_repository(Arc::new(db::RunRepository::new(pool.clone())))
            .with_checkpoint_store(Arc::new(db::SqliteCheckpointStore::new(pool)));
    }

    Ok((WorkflowEngine::new(ctx), driver))
}

async fn open_pool() -> Result<db::SqlitePool> {
    let data_dir = data_dir();
    tokio::fs::create_dir_all(&data_dir).await?;
    let db_path = data_dir.join(DEFAULT_DB_NAME);

    let pool = db::create_pool(&format!("sqlite:{}", db_path.display()))
        .await
        .context("Failed to open database")?;
    db::run_migrations(&pool).await?;
    Ok(pool)
}

fn data_dir() -> PathBuf {
    std::env::current_dir()
        .unwrap_or_else(|_| PathBuf::from("."))
        .join(PILOT_DIR)
}

async fn show_checkpoint(engine: &WorkflowEngine, run: &Run, point: SuspendPoint) -> Result<()> {
    let checkpoint = engine
        .context()
        .checkpoints
        .load(run.id)
        .await?
        .context("suspended run has no checkpoint")?;
    let state = checkpoint.state;

    println!();
    match point {
        SuspendPoint::PlanReview => {
            println!("{}", "Test plan awaiting review".bold().cyan());
            println!("{}", "─".repeat(40));
            println!("{}", state.test_plan);
        }
        SuspendPoint::FinalReview => {
            println!("{}", "Passing run awaiting sign-off".bold().cyan());
            println!("{}", "─".repeat(40));
            println!("{}", state.execution_log);
        }
    }
    println!("{}", "─".repeat(40));
    Ok(())
}

fn print_report(report: &RunReport) {
    let status = match report.status {
        RunStatus::Passed => report.status.as_str().to_uppercase().green().bold(),
        _ => report.status.as_str().to_uppercase().red().bold(),
    };

    println!();
    println!("{}", "TestPilot report".bold());
    println!("{}", "═".repeat(40));
    println!("  URL:      {}", report.url);
    println!("  Status:   {status}");
    println!("  Attempts: {}", report.attempt_count);
    println!("  Tokens:   {}", report.total_tokens);
    println!("  Duration: {:.1}s", report.duration.as_secs_f64());
    if let Some(path) = &report.screenshot_path {
        println!("  Screenshot: {path}");
    }

    if !report.steps.is_empty() {
        println!();
        println!("  Steps:");
        for step in &report.steps {
            println!(
                "    {:<16} {:>6.1}s (total {:>6.1}s)",
                step.step,
                step.elapsed.as_secs_f64(),
                step.cumulative.as_secs_f64()
            );
        }
    }

    if report.status != RunStatus::Passed && !report.execution_log.is_empty() {
        println!();
        println!("  Last execution log:");
        for line in report.execution_log.lines().rev().take(15).collect::<Vec<_>>().iter().rev() {
            println!("    {line}");
        }
    }
    println!();
}

fn status_icon(status: RunStatus) -> &'static str {
    match status {
        RunStatus::Pending => "○",
        RunStatus::Exploring | RunStatus::Designing => "◐",
        RunStatus::Implementing | RunStatus::Verifying => "◑",
        RunStatus::PlanReview | RunStatus::FinalReview => "◕",
        RunStatus::Passed => "●",
        RunStatus::Failed => "✗",
        RunStatus::Abandoned => "−",
    }
}

fn prompt_line(message: &str) -> Result<String> {
    print!("{message}");
    std::io::stdout().flush()?;
    let mut line = String::new();
    std::io::stdin().read_line(&mut line)?;
    Ok(line.trim().to_string())
}

fn init_tracing() {
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "testpilot=info,orchestrator=info,browser=info".into()),
        )
        .init();
}

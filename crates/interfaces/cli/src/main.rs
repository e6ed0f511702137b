use std::io::{self, IsTerminal};

use anyhow::{Result, bail};
use clap::{Parser, Subcommand};
use tracing::debug;
use tracing_subscriber::EnvFilter;

use dayokr_config::AppConfig;
use dayokr_runtime::{Controller, ViewCommand};
use dayokr_store::{CompletionLog, CompletionRecord, GoalStore, StoreError};
use dayokr_ui::app::App;
use dayokr_ui::tui::run_app_with;

const CONFIG_PATH: &str = "config/default.toml";

#[derive(Debug, Parser)]
#[command(
    name = "dayokr",
    version,
    about = "A daily goal checklist with weighted key results"
)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Open today's checklist in the terminal UI (the default).
    Open,
    /// Print today's goal without opening the UI.
    Status,
    /// Finalize today: append it to the completion log and prune old files.
    Archive {
        /// Total focused time, free form (e.g. "6h 40m").
        #[arg(long)]
        total_time: String,
        /// Working time range, free form (e.g. "09:00 - 18:30").
        #[arg(long)]
        time_range: String,
    },
    /// Print past days from the completion log.
    Log {
        /// Show only the most recent N days.
        #[arg(long)]
        last: Option<usize>,
    },
    /// Inspect the effective configuration.
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },
}

#[derive(Debug, Subcommand)]
enum ConfigCommands {
    /// Print the effective settings.
    Show,
    /// Print the configuration file path.
    Path,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let config = AppConfig::load_from(CONFIG_PATH)?;
    debug!(path = CONFIG_PATH, "configuration loaded");

    let cli = Cli::parse();
    match cli.command.unwrap_or(Commands::Open) {
        Commands::Open => run_open(config).await?,
        Commands::Status => run_status(&config)?,
        Commands::Archive {
            total_time,
            time_range,
        } => run_archive(&config, total_time, time_range).await?,
        Commands::Log { last } => run_log(&config, last)?,
        Commands::Config { command } => match command {
            ConfigCommands::Show => {
                println!("dayokr configuration");
                println!("- workspace: {}", config.workspace.path);
                println!("- rewriter enabled: {}", config.rewriter.enabled);
                println!("- rewriter model: {}", config.rewriter.model);
                println!(
                    "- api key: {}",
                    if config.rewriter.api_key.is_empty() {
                        "(not set)"
                    } else {
                        "(set)"
                    }
                );
                println!("- ui theme: {}", config.ui.theme);
                println!("- ui tick: {}ms", config.ui.tick_ms);
            }
            ConfigCommands::Path => println!("{CONFIG_PATH}"),
        },
    }

    Ok(())
}

async fn run_open(config: AppConfig) -> Result<()> {
    if !io::stdin().is_terminal() || !io::stdout().is_terminal() {
        bail!("the checklist needs an interactive terminal, use `dayokr status` instead");
    }

    let (controller, handle) = Controller::from_config(&config);
    tokio::spawn(controller.run());

    let mut app = App::new(handle.attach_view(), &config);
    handle.send(ViewCommand::Init);

    let command_handle = handle.clone();
    run_app_with(&mut app, move |command| {
        let handle = command_handle.clone();
        async move {
            handle.send(command);
            Ok(())
        }
    })
    .await
}

fn run_status(config: &AppConfig) -> Result<()> {
    let store = GoalStore::new(&config.workspace.path);
    let goal = match store.load() {
        Ok(goal) => goal,
        Err(StoreError::NotFound(_)) => {
            println!("no goal for today, run `dayokr` to plan one");
            return Ok(());
        }
        Err(err) => return Err(err.into()),
    };

    println!("{}  {}", goal.date, goal.objective);
    println!("progress: {}%", goal.progress());
    for (idx, kr) in goal.key_results.iter().enumerate() {
        let checkbox = if kr.completed { "[x]" } else { "[ ]" };
        match &kr.completion_time {
            Some(time) => println!(
                "  {checkbox} KR{}: {} ({}%, done {time})",
                idx + 1,
                kr.content,
                kr.weight
            ),
            None => println!("  {checkbox} KR{}: {} ({}%)", idx + 1, kr.content, kr.weight),
        }
    }
    Ok(())
}

async fn run_archive(config: &AppConfig, total_time: String, time_range: String) -> Result<()> {
    let store = GoalStore::new(&config.workspace.path);
    let goal = match store.load() {
        Ok(goal) => goal,
        Err(StoreError::NotFound(_)) => bail!("no goal file for today, nothing to archive"),
        Err(err) => return Err(err.into()),
    };

    let log = CompletionLog::in_dir(store.dir());
    let record = CompletionRecord::from_goal(&goal, total_time, time_range);
    log.append(&record).await?;
    let removed = store.prune_old()?;

    println!("day {} archived to {}", goal.date, log.path().display());
    if removed > 0 {
        println!("pruned {removed} old goal file(s)");
    }
    Ok(())
}

fn run_log(config: &AppConfig, last: Option<usize>) -> Result<()> {
    let store = GoalStore::new(&config.workspace.path);
    let log = CompletionLog::in_dir(store.dir());
    let records = log.load()?;
    if records.is_empty() {
        println!("completion log is empty");
        return Ok(());
    }

    let skip = last.map_or(0, |n| records.len().saturating_sub(n));
    for record in &records[skip..] {
        let done = record.tasks.iter().filter(|task| task.completed).count();
        println!(
            "{}  {}  ({done}/{} done, {})",
            record.date,
            record.objective,
            record.tasks.len(),
            record.total_time
        );
    }
    Ok(())
}

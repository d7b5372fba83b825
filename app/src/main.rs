use clap::{Parser, Subcommand};
use kit::{Config, Engine, FrameworkError, Schedule, Server, Tick, WorkflowConfig, WorkflowWorker, DB};
use sea_orm_migration::MigratorTrait;
use serde_json::json;

use openalt::config::{self, ScheduleConfig};
use openalt::events::Event;
use openalt::migrations::Migrator;
use openalt::{routes, schedule, AppState};

#[derive(Parser)]
#[command(name = "openalt")]
#[command(about = "Workflow pipeline of the OpenAlternative tool directory", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Serve the event ingestion endpoint
    Serve,
    /// Run pending migrations
    Migrate,
    /// Drop every table and re-run all migrations
    #[command(name = "migrate:fresh")]
    MigrateFresh,
    /// Process queued workflow executions until ctrl-c
    #[command(name = "workflow:work")]
    WorkflowWork,
    /// Run one workflow to completion in this process
    #[command(name = "workflow:run")]
    WorkflowRun {
        /// Workflow name (e.g., tool.scheduled, publish-tools)
        workflow: String,
        /// Tool slug, for event workflows
        slug: Option<String>,
    },
    /// Run the scheduler daemon
    #[command(name = "schedule:work")]
    ScheduleWork,
    /// Run due scheduled tasks once, or one task by name
    #[command(name = "schedule:run")]
    ScheduleRun {
        /// Task name (e.g., publish-tools)
        task: Option<String>,
    },
    /// List scheduled tasks
    #[command(name = "schedule:list")]
    ScheduleList,
    /// Enqueue a trigger event
    #[command(name = "event:send")]
    EventSend {
        /// Event name (e.g., tool.scheduled)
        name: String,
        /// Tool slug
        slug: String,
    },
}

#[tokio::main]
async fn main() {
    let root = std::env::current_dir().unwrap_or_else(|_| ".".into());
    let environment = Config::init(&root);
    kit::logging::init();

    let cli = Cli::parse();
    tracing::debug!(environment = environment.as_str(), "configuration loaded");

    if let Err(err) = run(cli.command).await {
        tracing::error!(error = %err, "command failed");
        std::process::exit(1);
    }
}

async fn run(command: Commands) -> Result<(), FrameworkError> {
    config::register_all()?;

    match command {
        Commands::Migrate => {
            let db = DB::connect().await?;
            Migrator::up(db.inner(), None).await?;
            tracing::info!("migrations completed");
            db.close().await
        }
        Commands::MigrateFresh => {
            let db = DB::connect().await?;
            tracing::warn!("dropping all tables and re-running migrations");
            Migrator::fresh(db.inner()).await?;
            db.close().await
        }
        Commands::Serve => {
            let state = AppState::init().await?;
            let router = routes::router(state.deps.events.clone());
            let served = Server::from_config(router)
                .run_until(async {
                    let _ = tokio::signal::ctrl_c().await;
                })
                .await;
            state.shutdown().await?;
            served.map_err(|e| FrameworkError::internal(e.to_string()))
        }
        Commands::WorkflowWork => {
            let state = AppState::init().await?;
            let config = Config::get::<WorkflowConfig>().unwrap_or_default();
            WorkflowWorker::new(state.db.clone(), state.registry.clone(), config)
                .run()
                .await?;
            state.shutdown().await
        }
        Commands::WorkflowRun { workflow, slug } => {
            let state = AppState::init().await?;
            let input = match slug {
                Some(slug) => json!({ "slug": slug }),
                None => json!({}),
            };
            let report = Engine::new(state.registry.clone())
                .run_inline(&workflow, input)
                .await?;

            println!(
                "execution {} {} after {} attempt(s)",
                report.execution_id,
                report.status.as_str(),
                report.attempts
            );
            for failure in &report.caught {
                println!("  caught {}: {}", failure.label, failure.error);
            }
            if let Some(output) = &report.output {
                println!("{}", serde_json::to_string_pretty(output)?);
            }
            state.shutdown().await
        }
        Commands::ScheduleWork => {
            let state = AppState::init().await?;
            build_schedule(&state)?.work().await?;
            state.shutdown().await
        }
        Commands::ScheduleRun { task } => {
            let state = AppState::init().await?;
            let schedule = build_schedule(&state)?;
            let tick = Tick::now();
            match task {
                Some(name) => match schedule.run_task(&name, &tick).await {
                    Some(result) => result?,
                    None => println!("No scheduled task named '{}'", name),
                },
                None => {
                    let ran = schedule.run_due_tasks(&tick).await;
                    println!("Ran {} due task(s) for {}", ran.len(), tick.key());
                }
            }
            state.shutdown().await
        }
        Commands::ScheduleList => {
            let state = AppState::init().await?;
            let schedule = build_schedule(&state)?;
            println!("{:<16} {:<28} DESCRIPTION", "TASK", "SCHEDULE");
            for task in schedule.tasks() {
                println!(
                    "{:<16} {:<28} {}",
                    task.name,
                    task.schedule_description(),
                    task.description.as_deref().unwrap_or("")
                );
            }
            state.shutdown().await
        }
        Commands::EventSend { name, slug } => {
            let state = AppState::init().await?;
            let event = Event::parse(&name, &json!({ "slug": slug }))?;
            state.deps.events.send(&event).await?;
            println!("Enqueued {} for {}", event.name(), event.slug());
            state.shutdown().await
        }
    }
}

fn build_schedule(state: &AppState) -> Result<Schedule, FrameworkError> {
    let config = match Config::get::<ScheduleConfig>() {
        Some(config) => config,
        None => ScheduleConfig::from_env()?,
    };
    let mut schedule = Schedule::new();
    schedule::register(&mut schedule, &state.executions, &config);
    Ok(schedule)
}

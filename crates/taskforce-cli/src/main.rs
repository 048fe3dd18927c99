use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use taskforce_core::WorkUnit;
use taskforce_orchestrator::{
    Handler, InvocationPlanner, Orchestrator, OrchestratorConfig, TeamAssembler, TeamFlags,
};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

const DEFAULT_CONFIG: &str = "taskforce.toml";

#[derive(Parser)]
#[command(name = "taskforce", about = "Taskforce — role-based task orchestration")]
struct Cli {
    /// Path to config file (defaults to ./taskforce.toml when present)
    #[arg(short, long)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a single work unit and print its result as JSON
    Submit {
        /// What needs doing
        description: String,
        /// Pin the unit to a handler role
        #[arg(short, long)]
        role: Option<String>,
        /// Required expertise (repeatable)
        #[arg(short, long)]
        expertise: Vec<String>,
        /// Print handler metrics after the run
        #[arg(long)]
        metrics: bool,
    },
    /// Assemble a team for a feature identifier such as 4.8.5.4.5.7
    Assemble {
        identifier: String,
        #[arg(long)]
        customer_facing: bool,
        #[arg(long)]
        personal_data: bool,
    },
    /// Plan a bulk invocation from a free-text request
    Plan {
        request: String,
        /// Run every planned role on this description and verify the outcome
        #[arg(long)]
        execute: Option<String>,
    },
    /// Inspect registered handlers
    Handlers {
        #[command(subcommand)]
        action: HandlersAction,
    },
}

#[derive(Subcommand)]
enum HandlersAction {
    /// List registered handlers
    List,
}

fn load_config(path: Option<&Path>) -> anyhow::Result<OrchestratorConfig> {
    let path = match path {
        Some(path) => path.to_path_buf(),
        None if Path::new(DEFAULT_CONFIG).exists() => PathBuf::from(DEFAULT_CONFIG),
        None => {
            warn!("No config file found, using built-in defaults");
            return Ok(OrchestratorConfig::default());
        }
    };
    let config = OrchestratorConfig::load(&path)
        .map_err(|e| anyhow::anyhow!("Failed to load config '{}': {}", path.display(), e))?;
    info!(path = %path.display(), handlers = config.handlers.len(), "Config loaded");
    Ok(config)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .json()
        .init();

    let cli = Cli::parse();
    let config = load_config(cli.config.as_deref())?;

    match cli.command {
        Commands::Submit {
            description,
            role,
            expertise,
            metrics,
        } => {
            let orchestrator = Orchestrator::from_config(&config)?;
            let mut unit = WorkUnit::new(description).with_expertise(expertise);
            if let Some(role) = role {
                unit = unit.with_role(role);
            }

            let run = orchestrator.submit(unit).await?;
            println!("{}", serde_json::to_string_pretty(&run)?);
            if metrics {
                let snapshot = orchestrator.monitor().to_json().await;
                println!("{}", serde_json::to_string_pretty(&snapshot)?);
            }
        }
        Commands::Assemble {
            identifier,
            customer_facing,
            personal_data,
        } => {
            let assembler = TeamAssembler::new(config.team.clone())?;
            let flags = TeamFlags {
                customer_facing,
                handles_personal_data: personal_data,
            };
            let team = assembler.assemble(&identifier, &flags)?;
            let registry = config.build_registry()?;
            let unstaffed = assembler.unstaffed_roles(&team, &registry);

            println!("Team for {identifier} ({} roles):", team.len());
            for role in &team {
                let marker = if unstaffed.contains(role) { " (unstaffed)" } else { "" };
                println!("  {role}{marker}");
            }
        }
        Commands::Plan { request, execute } => {
            let planner = InvocationPlanner::new(config.invocation.clone())?;
            let orchestrator = Orchestrator::from_config(&config)?;
            let plan = planner.plan(&request, orchestrator.registry());
            println!("{}", serde_json::to_string_pretty(&plan)?);

            if let Some(description) = execute {
                let summary = orchestrator.submit_team(&plan.roles, &description).await;
                let report =
                    planner.verify(&plan, &summary.completed_roles(), &summary.failed_roles());
                println!("{}", serde_json::to_string_pretty(&report)?);
            }
        }
        Commands::Handlers { action } => match action {
            HandlersAction::List => {
                let registry = config.build_registry()?;
                if registry.is_empty() {
                    println!("No handlers registered.");
                } else {
                    println!("Registered handlers:");
                    for handler in registry.all() {
                        let caps = handler.capabilities();
                        println!("  {} [{}] - {}", caps.name, caps.role, caps.description);
                        if !caps.collaborators.is_empty() {
                            println!("    Collaborators: {}", caps.collaborators.join(", "));
                        }
                    }
                    println!("\nTotal: {} handler(s)", registry.len());
                }
            }
        },
    }

    Ok(())
}

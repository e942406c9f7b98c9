//! # LLM-DECO CLI
//!
//! Command-line interface for the edge compute orchestrator.
//!
//! Usage:
//!   deco plan [--provider rule|openai|anthropic|local] [--mission <text>] [--state <file.json>]
//!   deco simulate [--node <id>] [--harvest 0.8]
//!   deco run [--cycles N] [--journal <path>]
//!   deco schema | prompt | init-config
//!
//! Examples:
//!   deco plan
//!   deco plan -p openai -m "Keep the river gauges fresh"
//!   deco run --cycles 48 --journal logs/decisions.jsonl
//!   RUST_LOG=deco_commander=debug deco run -p anthropic

use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use deco_commander::{
    build_prompt, command_schema, system_prompt, AnthropicProvider, Command, CycleReport,
    DecisionJournal, DecoConfig, DispatchOutcome, FallbackPlanner, LlmPlanner, Mission,
    OpenAIProvider, Orchestrator, Planner, PresetTuner, ProviderKind, RulePlanner,
    DEFAULT_CONFIG_PATH,
};
use deco_error::Error;
use deco_node::{NodeSimulator, NodeTelemetry, Policy};
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "deco")]
#[command(author, version, about = "LLM-DECO - LLM-driven orchestration of battery-powered edge nodes")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Config file (default: simulator/config.json when present)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Debug logging
    #[arg(short, long, global = true, conflicts_with = "quiet")]
    verbose: bool,

    /// Warnings only
    #[arg(short, long, global = true)]
    quiet: bool,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Plan a single command for the current network state
    Plan {
        /// Planner backend (overrides the config)
        #[arg(short, long, value_parser = parse_provider)]
        provider: Option<ProviderKind>,

        /// Mission goal text (overrides the config)
        #[arg(short, long)]
        mission: Option<String>,

        /// JSON array of node telemetry to plan against
        #[arg(short, long)]
        state: Option<PathBuf>,
    },
    /// Walk one node through a sleep window and a sensing burst
    Simulate {
        #[arg(short, long, default_value = "Node_42")]
        node: String,

        /// Starting battery level in percent
        #[arg(short, long, default_value = "100")]
        battery: f64,

        /// Harvest potential during the sleep window
        #[arg(long, default_value = "0.8")]
        harvest: f64,

        #[arg(long, default_value = "3600")]
        sleep_s: f64,

        #[arg(long, default_value = "60")]
        active_s: f64,
    },
    /// Run the closed planning loop against the simulated network
    Run {
        /// Number of cycles (overrides the config)
        #[arg(short = 'n', long)]
        cycles: Option<usize>,

        /// Append every cycle to this JSON-lines file
        #[arg(short, long)]
        journal: Option<PathBuf>,

        #[arg(short, long, value_parser = parse_provider)]
        provider: Option<ProviderKind>,

        /// Print each cycle report as a JSON line instead of a summary
        #[arg(long)]
        json: bool,
    },
    /// Show the command JSON schema
    Schema,
    /// Show the prompt a model would receive
    Prompt {
        #[arg(short, long)]
        mission: Option<String>,

        #[arg(short, long)]
        state: Option<PathBuf>,
    },
    /// Write the default config file
    InitConfig {
        #[arg(long, default_value = DEFAULT_CONFIG_PATH)]
        path: PathBuf,
    },
}

fn parse_provider(s: &str) -> Result<ProviderKind, String> {
    s.parse::<ProviderKind>().map_err(|e| e.message().to_string())
}

fn init_tracing(verbose: bool, quiet: bool) {
    let level = if verbose {
        "debug"
    } else if quiet {
        "warn"
    } else {
        "info"
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

// ============================================================================
// Planner selection
// ============================================================================

/// Whichever planner the config or the command line asked for.
///
/// LLM planners always fall back to the rule planner so a bad reply never
/// leaves the network without a decision.
enum CommanderPlanner {
    Rule(RulePlanner),
    OpenAI(FallbackPlanner<LlmPlanner<OpenAIProvider>, RulePlanner>),
    Anthropic(FallbackPlanner<LlmPlanner<AnthropicProvider>, RulePlanner>),
}

impl CommanderPlanner {
    fn build(config: &DecoConfig, kind: ProviderKind) -> anyhow::Result<Self> {
        let rule = RulePlanner::with_tuner(PresetTuner::new(config.tuning.clone()));

        let mut settings = config.provider.clone();
        if settings.kind != kind {
            settings.kind = kind;
            settings.api_key_env = None;
        }

        let planner = match kind {
            ProviderKind::Rule => CommanderPlanner::Rule(rule),
            ProviderKind::OpenAI | ProviderKind::Local => {
                let provider = OpenAIProvider::new(settings.provider_config()?).map_err(Error::from)?;
                let llm = LlmPlanner::with_config(provider, settings.planner_config());
                CommanderPlanner::OpenAI(FallbackPlanner::new(llm, rule))
            }
            ProviderKind::Anthropic => {
                let provider =
                    AnthropicProvider::new(settings.provider_config()?).map_err(Error::from)?;
                let llm = LlmPlanner::with_config(provider, settings.planner_config());
                CommanderPlanner::Anthropic(FallbackPlanner::new(llm, rule))
            }
        };
        tracing::debug!(planner = planner.name(), "planner ready");
        Ok(planner)
    }
}

impl Planner for CommanderPlanner {
    fn name(&self) -> &str {
        match self {
            CommanderPlanner::Rule(p) => p.name(),
            CommanderPlanner::OpenAI(p) => p.name(),
            CommanderPlanner::Anthropic(p) => p.name(),
        }
    }

    async fn plan(&self, rows: &[NodeTelemetry], mission: &Mission) -> deco_error::Result<Command> {
        match self {
            CommanderPlanner::Rule(p) => p.plan(rows, mission).await,
            CommanderPlanner::OpenAI(p) => p.plan(rows, mission).await,
            CommanderPlanner::Anthropic(p) => p.plan(rows, mission).await,
        }
    }
}

// ============================================================================
// Helpers
// ============================================================================

fn mission_for(config: &DecoConfig, goal: Option<String>) -> Mission {
    match goal {
        Some(goal) => config.mission.clone().with_goal(goal),
        None => config.mission.clone(),
    }
}

/// Telemetry from a state file, or from the configured node roster.
fn load_rows(config: &DecoConfig, state: Option<&Path>) -> anyhow::Result<Vec<NodeTelemetry>> {
    match state {
        Some(path) => {
            let text = std::fs::read_to_string(path)
                .with_context(|| format!("reading state file {}", path.display()))?;
            Ok(NodeTelemetry::parse_many(&text)?)
        }
        None => Ok(config.build_network()?.telemetry()),
    }
}

fn format_duration(seconds: f64) -> String {
    if seconds >= 3600.0 && seconds % 3600.0 == 0.0 {
        let hours = seconds / 3600.0;
        format!("{} hour{}", hours, if hours == 1.0 { "" } else { "s" })
    } else if seconds >= 60.0 && seconds % 60.0 == 0.0 {
        let minutes = seconds / 60.0;
        format!("{} minute{}", minutes, if minutes == 1.0 { "" } else { "s" })
    } else {
        format!("{} s", seconds)
    }
}

fn format_cycle(report: &CycleReport) -> String {
    let decision = match &report.outcome {
        DispatchOutcome::Woke { node_id, policy, .. } => format!("WAKE {} {}", node_id, policy),
        DispatchOutcome::Idle => "DO_NOTHING".to_string(),
    };
    let batteries: Vec<String> = report
        .telemetry
        .iter()
        .map(|row| {
            format!(
                "{}={:.2}%/u{:.2}",
                row.node_id, row.battery_percent, row.data_uncertainty
            )
        })
        .collect();
    format!("cycle {:>3}  {:<26} {}", report.cycle, decision, batteries.join("  "))
}

// ============================================================================
// Subcommands
// ============================================================================

async fn plan(
    config: &DecoConfig,
    provider: ProviderKind,
    goal: Option<String>,
    state: Option<&Path>,
) -> anyhow::Result<()> {
    let mission = mission_for(config, goal);
    mission.validate()?;
    let rows = load_rows(config, state)?;

    println!("## Input Network State (for LLM) ##");
    println!("{}", NodeTelemetry::to_json_array(&rows)?);
    println!("\n## Mission Goal ##\n{}", mission.goal);
    println!("\n-------------------------------------------------\n");

    let planner = CommanderPlanner::build(config, provider)?;
    let command = planner.plan(&rows, &mission).await?;

    println!("## LLM-DECO Final Command (JSON for Control Hub) ##");
    println!("{}", command.to_json_pretty()?);
    Ok(())
}

fn simulate(
    config: &DecoConfig,
    node_id: &str,
    battery: f64,
    harvest: f64,
    sleep_s: f64,
    active_s: f64,
) -> anyhow::Result<()> {
    if !(0.0..=100.0).contains(&battery) {
        bail!("--battery must be within [0, 100], got {}", battery);
    }
    config.energy.validate()?;

    let mut node = NodeSimulator::with_percent(node_id, battery, config.energy.clone());
    node.set_harvest_potential(harvest);
    println!("[{}] Initial State:\n{}", node.id(), node.to_json()?);

    node.update_state(sleep_s)?;
    println!(
        "\n--- After {} of SLEEP with {:.0}% Harvest ---",
        format_duration(sleep_s),
        node.state().harvest_potential * 100.0
    );
    println!("{}", node.to_json()?);

    node.set_policy(Policy::SenseHigh);
    node.set_harvest_potential(0.0);
    node.update_state(active_s)?;
    node.set_policy(Policy::Sleep);
    println!("\n--- After {} of SENSE_HIGH at Night ---", format_duration(active_s));
    println!("{}", node.to_json()?);
    Ok(())
}

async fn run_loop(
    config: &DecoConfig,
    provider: ProviderKind,
    cycles: Option<usize>,
    journal: Option<&Path>,
    json: bool,
) -> anyhow::Result<()> {
    let mut loop_config = config.loop_config.clone();
    if let Some(cycles) = cycles {
        loop_config.cycles = cycles;
    }
    let total = loop_config.cycles;

    let planner = CommanderPlanner::build(config, provider)?;
    let mut orchestrator = Orchestrator::new(planner, config.build_network()?, config.mission.clone())
        .with_loop_config(loop_config)
        .with_uncertainty_model(config.uncertainty.clone());
    if let Some(path) = journal {
        orchestrator = orchestrator.with_journal(DecisionJournal::open(path)?);
    }

    tracing::info!(cycles = total, planner = %provider, "starting orchestration loop");
    let mut woken = 0usize;
    for _ in 0..total {
        let report = orchestrator.step().await?;
        if report.outcome.woken_node().is_some() {
            woken += 1;
        }
        if json {
            println!("{}", serde_json::to_string(&report)?);
        } else {
            println!("{}", format_cycle(&report));
        }
    }

    if !json {
        println!("\n{} cycles, {} wake-ups", total, woken);
    }
    Ok(())
}

fn prompt(config: &DecoConfig, goal: Option<String>, state: Option<&Path>) -> anyhow::Result<()> {
    let mission = mission_for(config, goal);
    let rows = load_rows(config, state)?;
    let state_json = NodeTelemetry::to_json_array(&rows)?;

    println!("=== SYSTEM ===\n{}", system_prompt());
    println!("=== USER ===\n{}", build_prompt(&state_json, &mission.goal));
    Ok(())
}

fn init_config(path: &Path) -> anyhow::Result<()> {
    if path.exists() {
        bail!("{} already exists, refusing to overwrite", path.display());
    }
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("creating {}", parent.display()))?;
    }
    std::fs::write(path, DecoConfig::default().to_json_pretty()? + "\n")
        .with_context(|| format!("writing {}", path.display()))?;
    println!("Wrote default config to {}", path.display());
    Ok(())
}

async fn execute(cli: Cli) -> anyhow::Result<()> {
    match cli.command {
        Commands::Schema => {
            println!("{}", serde_json::to_string_pretty(&command_schema())?);
            Ok(())
        }
        Commands::InitConfig { path } => init_config(&path),
        command => {
            let config = DecoConfig::discover(cli.config.as_deref())?;
            match command {
                Commands::Plan { provider, mission, state } => {
                    let kind = provider.unwrap_or(config.provider.kind);
                    plan(&config, kind, mission, state.as_deref()).await
                }
                Commands::Simulate { node, battery, harvest, sleep_s, active_s } => {
                    simulate(&config, &node, battery, harvest, sleep_s, active_s)
                }
                Commands::Run { cycles, journal, provider, json } => {
                    let kind = provider.unwrap_or(config.provider.kind);
                    run_loop(&config, kind, cycles, journal.as_deref(), json).await
                }
                Commands::Prompt { mission, state } => prompt(&config, mission, state.as_deref()),
                Commands::Schema | Commands::InitConfig { .. } => Ok(()),
            }
        }
    }
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose, cli.quiet);

    if let Err(e) = execute(cli).await {
        eprintln!("Error: {:#}", e);
        std::process::exit(1);
    }
}

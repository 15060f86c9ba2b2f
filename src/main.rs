use clap::Parser;
use colored::*;
use eyre::{Context, Result, eyre};
use log::info;
use std::fs;
use std::path::{Path, PathBuf};

mod cli;
mod config;

use cli::Cli;
use cli::commands::Commands;
use config::Config;

use swarm_dispatch::budget::{BudgetStatus, micro_to_usd};
use swarm_dispatch::checkpoint::{FileCheckpointStore, RetryDecision, Tracker, TransitionJournal, TransitionOutcome};
use swarm_dispatch::diagnostics::diagnose;
use swarm_dispatch::domain::Transition;
use swarm_dispatch::graph::{TaskGraph, mark_critical_path, validate_graph};
use swarm_dispatch::plan::{check_fields, load_plan};
use swarm_dispatch::scheduler::{Dispatcher, StopReason, select_model_tier};
use swarm_dispatch::simulate::{SimulationOutcome, Simulator};

/// `RUST_LOG` wins over the configured level.
fn setup_logging(level: Option<&str>) -> Result<()> {
    let log_dir = dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("swarm-dispatch")
        .join("logs");

    fs::create_dir_all(&log_dir).context("Failed to create log directory")?;

    let log_file = log_dir.join("swarm-dispatch.log");

    let target = Box::new(
        fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&log_file)
            .context("Failed to open log file")?,
    );

    let env = env_logger::Env::default().default_filter_or(level.unwrap_or("info"));
    env_logger::Builder::from_env(env)
        .target(env_logger::Target::Pipe(target))
        .init();

    info!("Logging initialized, writing to: {}", log_file.display());
    Ok(())
}

fn run_application(cli: &Cli, config: &Config) -> Result<()> {
    info!("Starting application");

    if cli.is_verbose() {
        println!("{}", "Verbose mode enabled".yellow());
    }

    match &cli.command {
        Commands::Validate { plan } => handle_validate_command(plan, config),
        Commands::Waves { plan } => handle_waves_command(plan, config),
        Commands::Dispatch { plan, dry_run } => handle_dispatch_command(plan, *dry_run, config),
        Commands::Report { plan, task, status } => handle_report_command(plan, task, status, config),
        Commands::Retry { plan, task } => handle_retry_command(plan, task, config),
        Commands::Simulate { plan, barrier } => handle_simulate_command(plan, *barrier, config),
        Commands::Cost { plan } => handle_cost_command(plan, config),
    }
}

/// Load, check and validate a plan, then flag its critical path.
fn load_graph(plan: &Path, config: &Config) -> Result<TaskGraph> {
    let doc = load_plan(plan).context(format!("Failed to load plan {}", plan.display()))?;

    let report = check_fields(&doc);
    for warning in &report.warnings {
        log::warn!("{}", warning);
    }
    if !report.is_ok() {
        return Err(swarm_dispatch::DispatchError::Validation(report.errors).into());
    }

    let mut graph = TaskGraph::new(doc.tasks);
    let validated = validate_graph(&graph, config.planning.dangling_policy())?;
    for warning in &validated.warnings {
        log::warn!("{}", warning);
    }
    mark_critical_path(&mut graph);
    Ok(graph)
}

fn open_tracker(graph: &TaskGraph, config: &Config) -> Result<Tracker<FileCheckpointStore>> {
    let dir = &config.checkpoint.dir;
    let store = FileCheckpointStore::new(dir).context(format!("Failed to open checkpoint dir {}", dir.display()))?;
    let journal = TransitionJournal::in_dir(dir)?;
    let tracker = Tracker::resume(store, graph, config.planning.auto_spawn_budget)?
        .with_pricing(config.pricing.clone())
        .with_budget(config.budget.ceiling_usd)
        .with_journal(journal);
    Ok(tracker)
}

fn dispatcher(config: &Config, barrier: bool) -> Dispatcher {
    Dispatcher::new(config.quotas.clone())
        .with_barrier(barrier || config.planning.barrier)
        .with_pricing(config.pricing.clone())
}

fn handle_validate_command(plan: &Path, config: &Config) -> Result<()> {
    info!("Validating plan: {}", plan.display());
    let doc = load_plan(plan).context(format!("Failed to load plan {}", plan.display()))?;

    let report = check_fields(&doc);
    let mut errors = report.errors.clone();
    let graph = TaskGraph::new(doc.tasks);
    if let Err(swarm_dispatch::DispatchError::Validation(issues)) =
        validate_graph(&graph, config.planning.dangling_policy())
    {
        for issue in issues {
            if !errors.contains(&issue) {
                errors.push(issue);
            }
        }
    }

    for warning in &report.warnings {
        println!("{} {}", "warning:".yellow(), warning);
    }
    for (task, dep) in graph.dangling_dependencies() {
        if config.planning.allow_dangling_dependencies {
            println!("{} Task {} depends on {} which is not in the plan", "warning:".yellow(), task, dep);
        }
    }
    for error in &errors {
        println!("{} {}", "error:".red(), error);
    }

    if errors.is_empty() {
        println!("{} {} task(s) valid", "OK".green().bold(), graph.len());
        Ok(())
    } else {
        Err(eyre!("{} validation error(s)", errors.len()))
    }
}

fn handle_waves_command(plan: &Path, config: &Config) -> Result<()> {
    let graph = load_graph(plan, config)?;
    let diag = diagnose(&graph);

    println!("{}", "Waves".cyan().bold());
    for (i, wave) in diag.waves.waves.iter().enumerate() {
        println!("  {} {}", format!("Wave {}:", i + 1).green(), wave.join(", "));
    }
    if !diag.waves.unscheduled.is_empty() {
        println!("  {} {}", "Unscheduled:".red(), diag.waves.unscheduled.join(", "));
    }

    println!(
        "{} {} ({} min)",
        "Critical path:".cyan().bold(),
        diag.critical_path.tasks.join(" -> "),
        diag.critical_path.total_minutes
    );
    println!(
        "{} serial {} min, parallel {} min, speedup {:.2}x",
        "Estimates:".cyan().bold(),
        diag.estimates.serial_minutes,
        diag.estimates.parallel_minutes,
        diag.estimates.speedup
    );

    if !diag.lock_plan.is_empty() {
        println!("{}", "Lock plan".cyan().bold());
        for (resource, writers) in &diag.lock_plan {
            println!("  {} {}", resource.yellow(), writers.join(" -> "));
        }
    }
    if !diag.bottlenecks.is_empty() {
        println!("{}", "Bottlenecks".cyan().bold());
        for b in diag.bottlenecks.iter().take(5) {
            println!("  {} ({} dependents)", b.task_id, b.dependents);
        }
    }
    for warning in &diag.warnings {
        println!("{} {}", "warning:".yellow(), warning);
    }
    Ok(())
}

fn handle_dispatch_command(plan: &Path, dry_run: bool, config: &Config) -> Result<()> {
    let graph = load_graph(plan, config)?;
    let mut tracker = open_tracker(&graph, config)?;

    let budget = tracker.budget().status();
    let gates_met = tracker.gates_met(&config.gates);
    let dispatch = dispatcher(config, false).plan_iteration(&graph, tracker.checkpoint(), budget, gates_met);

    if let Some(reason) = dispatch.stop {
        let message = match reason {
            StopReason::AllComplete => "All tasks complete".green(),
            StopReason::GatesMet => "Quality gates met".green(),
            StopReason::BudgetExhausted => "Budget exhausted, not dispatching".red(),
            StopReason::Stalled => format!("Stalled; no task can become ready: {}", dispatch.stalled.join(", ")).red(),
        };
        println!("{}", message);
        return Ok(());
    }

    if dispatch.budget == BudgetStatus::Warning {
        let governor = tracker.budget();
        println!(
            "{} ${:.2} of ${:.2} spent, {:.0}% of the ceiling",
            "budget warning:".yellow().bold(),
            micro_to_usd(governor.spent()),
            micro_to_usd(governor.ceiling()),
            governor.fraction_consumed() * 100.0
        );
    }

    if dispatch.launches.is_empty() {
        println!("{}", "Nothing to launch until running work reports back".yellow());
    }
    for order in &dispatch.launches {
        println!(
            "{} {} {} (score {}, ~${:.2})",
            "launch".green(),
            order.launch.task_id.bold(),
            order.launch.mode,
            order.launch.score,
            micro_to_usd(order.estimated_cost)
        );
    }
    if !dispatch.locks.is_empty() {
        let locks: Vec<&str> = dispatch.locks.iter().map(String::as_str).collect();
        println!("{} {}", "locks:".cyan(), locks.join(", "));
    }

    if !dry_run && let TransitionOutcome::Applied { iteration } = tracker.record_launches(&graph, &dispatch.launches)? {
        info!("Recorded {} launch(es) at iteration {}", dispatch.launches.len(), iteration);
    }
    Ok(())
}

fn handle_report_command(plan: &Path, task: &str, status: &str, config: &Config) -> Result<()> {
    let graph = load_graph(plan, config)?;
    let transition: Transition = status.parse()?;
    let mut tracker = open_tracker(&graph, config)?;

    match tracker.apply(&graph, task, transition)? {
        TransitionOutcome::Applied { iteration } => {
            println!("{} {} {} (iteration {})", "recorded".green(), task.bold(), transition, iteration);
        }
        TransitionOutcome::Unchanged => {
            println!("{} {} already {}", "unchanged".yellow(), task.bold(), transition);
        }
    }

    let governor = tracker.budget();
    println!(
        "{} ${:.2} of ${:.2}, {:.0}% ({})",
        "budget:".cyan(),
        micro_to_usd(governor.spent()),
        micro_to_usd(governor.ceiling()),
        governor.fraction_consumed() * 100.0,
        governor.status()
    );
    Ok(())
}

fn handle_retry_command(plan: &Path, task: &str, config: &Config) -> Result<()> {
    let graph = load_graph(plan, config)?;
    let mut tracker = open_tracker(&graph, config)?;

    match tracker.record_retry(&graph, task)? {
        RetryDecision::Allowed { attempt } => {
            println!("{} {} attempt {}", "retry".green(), task.bold(), attempt);
            Ok(())
        }
        RetryDecision::Refused { attempts } => Err(eyre!(
            "Task {} already retried {} times; manual intervention required",
            task,
            attempts
        )),
    }
}

fn handle_simulate_command(plan: &Path, barrier: bool, config: &Config) -> Result<()> {
    let graph = load_graph(plan, config)?;
    let simulator = Simulator::new(dispatcher(config, barrier), config.simulation.clone());
    let report = simulator.run(&graph);

    println!("{}", "Schedule".cyan().bold());
    for s in &report.schedule {
        println!(
            "  {:>6} - {:<6} {} ({}, {})",
            s.start,
            s.end,
            s.task_id.bold(),
            s.mode,
            s.tier
        );
    }

    let outcome = match report.outcome {
        SimulationOutcome::Completed => "completed".green(),
        SimulationOutcome::Deadlock => "deadlock".red(),
        SimulationOutcome::IterationCap => "iteration cap reached".red(),
    };
    println!(
        "{} {} in {} min ({} iterations, peak {} parallel)",
        "Outcome:".cyan().bold(),
        outcome,
        report.makespan,
        report.iterations,
        report.peak_parallelism()
    );
    if !report.unfinished.is_empty() {
        println!("{} {}", "Unfinished:".red(), report.unfinished.join(", "));
    }
    for b in report.bottlenecks.iter().take(5) {
        println!("  {} {} ({} dependents)", "bottleneck".yellow(), b.task_id, b.dependents);
    }
    Ok(())
}

fn handle_cost_command(plan: &Path, config: &Config) -> Result<()> {
    let graph = load_graph(plan, config)?;

    let mut total = 0;
    for task in graph.tasks() {
        let cost = config.pricing.estimate_task(task);
        total += cost;
        println!(
            "  {:<12} {:<3} {:<9} ${:.2}",
            task.id,
            format!("{:?}", task.size_class()),
            select_model_tier(task).to_string(),
            micro_to_usd(cost)
        );
    }

    let governor = swarm_dispatch::budget::BudgetGovernor::from_usd(config.budget.ceiling_usd);
    println!(
        "{} ${:.2} against ${:.2} ceiling ({})",
        "Projected:".cyan().bold(),
        micro_to_usd(total),
        micro_to_usd(governor.ceiling()),
        governor.projected(total)
    );
    Ok(())
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = Config::load(cli.config.as_ref()).context("Failed to load configuration")?;

    setup_logging(config.log_level.as_deref()).context("Failed to setup logging")?;

    info!("Starting with config from: {:?}", cli.config);

    run_application(&cli, &config).context("Application failed")?;

    Ok(())
}

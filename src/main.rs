use clap::Parser;
use colored::*;
use eyre::{Context, Result};
use log::info;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

mod cli;
mod config;

use cli::{Cli, Commands};
use config::Config;

use taskq::executor::CommandExecutor;
use taskq::limiter::RateLimiter;
use taskq::queue::TaskQueue;
use taskq::seed;
use taskq::task::{Task, TaskStatus, TemplateType};

fn setup_logging(verbose: bool) {
    let default_filter = if verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_filter)).init();
}

fn open_queue(config: &Config) -> Result<TaskQueue> {
    let limiter = RateLimiter::new(config.rate_limit.clone())?;
    let executor = Arc::new(CommandExecutor::new(config.executor.clone()));
    Ok(
        TaskQueue::open(&config.queue.file, config.queue.max_parallel, limiter, executor)
            .with_default_context(config.queue.default_context.clone()),
    )
}

fn status_colored(status: TaskStatus) -> ColoredString {
    match status {
        TaskStatus::Pending => status.as_str().yellow(),
        TaskStatus::InProgress => status.as_str().blue(),
        TaskStatus::Completed => status.as_str().green(),
        TaskStatus::Failed => status.as_str().red(),
    }
}

async fn run_queue(config: &Config) -> Result<()> {
    let queue = Arc::new(open_queue(config)?);
    info!("Starting queue from {}", queue.queue_file().display());

    let mut runner = {
        let queue = queue.clone();
        tokio::spawn(async move { queue.run().await })
    };

    tokio::select! {
        result = &mut runner => {
            result.context("queue task panicked")??;
        }
        _ = tokio::signal::ctrl_c() => {
            println!("{}", "Shutdown signal received, stopping queue...".yellow());
            queue.stop().await;
            runner.await.context("queue task panicked")??;
        }
    }

    println!("{}", "Queue processing finished".green());
    Ok(())
}

fn handle_init(config: &Config) -> Result<()> {
    let queue = open_queue(config)?;
    seed::initialize_queue(&queue);
    println!(
        "{}",
        format!("Initialized queue at {}", queue.queue_file().display()).green()
    );
    Ok(())
}

fn handle_add(
    config: &Config,
    name: &str,
    description: &str,
    template: &str,
    priority: i64,
    depends: Vec<String>,
    context: Vec<String>,
) -> Result<()> {
    let template_type: TemplateType = template.parse().map_err(|e: String| eyre::eyre!(e))?;

    let task = Task::new(name, description, template_type)
        .with_priority(priority)
        .with_dependencies(depends)
        .with_context_paths(context);

    let queue = open_queue(config)?;
    queue.add_task(task);
    println!("{}", format!("Added task: {name}").green());
    Ok(())
}

fn handle_list(config: &Config, status: Option<&str>) -> Result<()> {
    let filter = match status {
        Some(s) => Some(s.parse::<TaskStatus>().map_err(|e| eyre::eyre!(e))?),
        None => None,
    };

    let queue = open_queue(config)?;
    let tasks: Vec<_> = queue
        .tasks()
        .into_iter()
        .filter(|t| filter.is_none_or(|f| t.status == f))
        .collect();

    if tasks.is_empty() {
        println!("No tasks found");
        return Ok(());
    }

    for task in tasks {
        println!(
            "{} ({}) priority={}",
            task.name.bold(),
            status_colored(task.status),
            task.priority
        );
    }
    Ok(())
}

fn handle_update(
    config: &Config,
    name: &str,
    status: Option<&str>,
    priority: Option<i64>,
    add_dep: Vec<String>,
    remove_dep: Vec<String>,
) -> Result<()> {
    let queue = open_queue(config)?;
    queue.require_task(name)?;

    let mut changes = Vec::new();
    if let Some(s) = status {
        let status: TaskStatus = s.parse().map_err(|e: String| eyre::eyre!(e))?;
        queue.update_status(name, status, None);
        changes.push("status");
    }
    if let Some(priority) = priority {
        queue.set_priority(name, priority)?;
        changes.push("priority");
    }
    if !add_dep.is_empty() || !remove_dep.is_empty() {
        for dep in add_dep {
            queue.add_dependency(name, dep)?;
        }
        for dep in &remove_dep {
            queue.remove_dependency(name, dep)?;
        }
        changes.push("dependencies");
    }

    if changes.is_empty() {
        println!("No changes specified");
    } else {
        println!("{}", format!("Updated task {name}: {}", changes.join(", ")).green());
    }
    Ok(())
}

fn handle_deps(config: &Config, name: Option<&str>) -> Result<()> {
    let queue = open_queue(config)?;
    let tasks: BTreeMap<String, Task> = queue
        .tasks()
        .into_iter()
        .map(|t| (t.name.clone(), t))
        .collect();

    fn print_tree(tasks: &BTreeMap<String, Task>, name: &str, level: usize, seen: &BTreeSet<String>) {
        let indent = "  ".repeat(level);
        let Some(task) = tasks.get(name) else {
            println!("{indent}? {name} (not found)");
            return;
        };
        if seen.contains(name) {
            println!("{indent}{name} (circular dependency)");
            return;
        }

        let prefix = if level > 0 { "└─ " } else { "" };
        println!("{indent}{prefix}{} ({})", name.bold(), status_colored(task.status));

        let mut seen = seen.clone();
        seen.insert(name.to_string());
        for dep in &task.dependencies {
            print_tree(tasks, dep, level + 1, &seen);
        }
    }

    match name {
        Some(name) => {
            queue.require_task(name)?;
            print_tree(&tasks, name, 0, &BTreeSet::new());
        }
        None => {
            // Roots are tasks no other task depends on
            let roots = tasks
                .keys()
                .filter(|name| !tasks.values().any(|t| t.dependencies.contains(name.as_str())));
            for root in roots {
                print_tree(&tasks, root, 0, &BTreeSet::new());
            }
        }
    }
    Ok(())
}

fn handle_stats(config: &Config) -> Result<()> {
    let queue = open_queue(config)?;
    let tasks = queue.tasks();
    if tasks.is_empty() {
        println!("No tasks found");
        return Ok(());
    }

    println!("{}", "Task Statistics".bold());
    println!("{}", "-".repeat(40));

    println!("Status distribution:");
    for status in [
        TaskStatus::Pending,
        TaskStatus::InProgress,
        TaskStatus::Completed,
        TaskStatus::Failed,
    ] {
        let count = tasks.iter().filter(|t| t.status == status).count();
        let pct = count as f64 * 100.0 / tasks.len() as f64;
        println!("  {}: {count} tasks ({pct:.1}%)", status_colored(status));
    }

    let finished = tasks.iter().filter(|t| t.status.is_terminal()).count();
    println!("Finished: {finished} of {} tasks", tasks.len());

    let avg_priority = tasks.iter().map(|t| t.priority).sum::<i64>() as f64 / tasks.len() as f64;
    println!("Priority average: {avg_priority:.1}");

    let durations: Vec<f64> = tasks
        .iter()
        .filter(|t| t.status == TaskStatus::Completed)
        .filter_map(|t| t.completed_at.map(|done| (done - t.created_at).num_seconds() as f64 / 3600.0))
        .collect();
    if !durations.is_empty() {
        let avg = durations.iter().sum::<f64>() / durations.len() as f64;
        println!("Average completion time: {avg:.1} hours ({} tasks)", durations.len());
    }
    Ok(())
}

fn handle_status(config: &Config, name: &str) -> Result<()> {
    let queue = open_queue(config)?;
    let task = queue.require_task(name)?;

    println!("{}", format!("Task: {}", task.name).bold());
    println!("{}", "-".repeat(40));
    println!("status:       {}", status_colored(task.status));
    println!("template:     {}", task.template_type);
    println!("priority:     {}", task.priority);
    println!("created:      {}", task.created_at.to_rfc3339());
    if let Some(completed_at) = task.completed_at {
        println!("completed:    {}", completed_at.to_rfc3339());
    }
    if !task.dependencies.is_empty() {
        println!("depends on:   {}", task.dependencies.iter().cloned().collect::<Vec<_>>().join(", "));
    }
    let dependents = queue.dependents_of(name);
    if !dependents.is_empty() {
        println!("required by:  {}", dependents.iter().cloned().collect::<Vec<_>>().join(", "));
    }
    if !task.context_paths.is_empty() {
        println!("context:      {}", task.context_paths.iter().cloned().collect::<Vec<_>>().join(", "));
    }
    if !task.outputs.is_empty() {
        println!("outputs:      {}", task.outputs.iter().cloned().collect::<Vec<_>>().join(", "));
    }
    for (key, value) in &task.metadata {
        println!("meta {key}: {value}");
    }
    println!();
    println!("{}", task.description);
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    setup_logging(cli.verbose);

    let config = Config::load(cli.config.as_ref())?;

    match cli.command {
        Commands::Init => handle_init(&config),
        Commands::Run => run_queue(&config).await,
        Commands::Add {
            name,
            description,
            template,
            priority,
            depends,
            context,
        } => handle_add(&config, &name, &description, &template, priority, depends, context),
        Commands::Update {
            name,
            status,
            priority,
            add_dep,
            remove_dep,
        } => handle_update(&config, &name, status.as_deref(), priority, add_dep, remove_dep),
        Commands::List { status } => handle_list(&config, status.as_deref()),
        Commands::Status { name } => handle_status(&config, &name),
        Commands::Deps { name } => handle_deps(&config, name.as_deref()),
        Commands::Stats => handle_stats(&config),
    }
}

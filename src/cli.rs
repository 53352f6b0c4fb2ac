//! CLI command definitions using clap.
//!
//! Subcommands:
//! - init: seed the queue with the starter task set
//! - run: process the queue until done or interrupted
//! - add: add a single task
//! - update: change status, priority, or dependencies of a task
//! - list: list tasks, optionally filtered by status
//! - status: show one task in detail
//! - deps: show dependency trees
//! - stats: show queue statistics

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// taskq - task queue for AI-assisted development
#[derive(Parser, Debug)]
#[command(name = "taskq")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Optional config file path
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,
}

/// Main subcommands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Seed the queue with the starter task set
    Init,

    /// Process the queue until no pending tasks remain
    Run,

    /// Add a task to the queue
    Add {
        /// Unique task name
        name: String,

        /// Task description handed to the assistant
        description: String,

        /// Template type (description, analysis, code, optimize, document, test, review, improve)
        #[arg(short, long, default_value = "description")]
        template: String,

        /// Priority; lower runs first
        #[arg(short, long, default_value_t = 100)]
        priority: i64,

        /// Names of tasks this task depends on
        #[arg(short, long = "depends")]
        depends: Vec<String>,

        /// Extra context file paths
        #[arg(long = "context")]
        context: Vec<String>,
    },

    /// Update properties of an existing task
    Update {
        /// Task name
        name: String,

        /// New status (pending, in_progress, completed, failed); resetting a
        /// failed task to pending makes it schedulable again
        #[arg(short, long)]
        status: Option<String>,

        /// New priority; lower runs first
        #[arg(short, long)]
        priority: Option<i64>,

        /// Dependency names to add
        #[arg(short = 'a', long = "add-dep")]
        add_dep: Vec<String>,

        /// Dependency names to remove
        #[arg(short = 'x', long = "remove-dep")]
        remove_dep: Vec<String>,
    },

    /// List tasks in the queue
    List {
        /// Filter by status (pending, in_progress, completed, failed)
        #[arg(short, long)]
        status: Option<String>,
    },

    /// Show details of a single task
    Status {
        /// Task name
        name: String,
    },

    /// Show task dependencies as a tree
    Deps {
        /// Task name; omitted shows a tree for every root task
        name: Option<String>,
    },

    /// Show queue statistics
    Stats,
}

//! Starter task set for a fresh queue.
//!
//! `initialize_queue` seeds the fixed set of bootstrap tasks, organized in
//! phases with dependencies and priorities that force the intended execution
//! order: structure, core functionality, user interface, then testing and
//! documentation.

use crate::queue::TaskQueue;
use crate::task::{Task, TemplateType};

/// Build the fixed starter task set.
pub fn starter_tasks() -> Vec<Task> {
    vec![
        // Phase 1: project structure and setup
        Task::new(
            "project_structure",
            "Create the initial project structure: project metadata, dependency \
             management, development tooling, directory layout, logging \
             directory, and repository initialization.",
            TemplateType::Description,
        )
        .with_priority(10),
        Task::new(
            "config_system",
            "Create a configuration system handling config file management, \
             environment variable integration, security-aware filtering, and \
             validation of configuration values with sensible defaults.",
            TemplateType::Description,
        )
        .with_priority(20)
        .with_dependencies(["project_structure"]),
        Task::new(
            "git_integration",
            "Implement Git integration: dedicated branch management for \
             AI-generated changes, safe commit operations with validation, \
             change tracking, and rollback capabilities.",
            TemplateType::Description,
        )
        .with_priority(30)
        .with_dependencies(["config_system"]),
        // Phase 2: core functionality
        Task::new(
            "context_manager",
            "Create a context management system controlling which directories \
             are included for AI context, filtering sensitive content, and \
             keeping context size within model limits.",
            TemplateType::Description,
        )
        .with_priority(40)
        .with_dependencies(["git_integration"]),
        Task::new(
            "security_system",
            "Implement a security layer that protects credentials and personal \
             information, supports custom filter patterns, and logs every \
             security-relevant decision.",
            TemplateType::Description,
        )
        .with_priority(50)
        .with_dependencies(["context_manager"]),
        // Phase 3: user interface
        Task::new(
            "cli_interface",
            "Design and implement a CLI with an intuitive command structure \
             covering task management, context control, and system monitoring, \
             with helpful error messages.",
            TemplateType::Description,
        )
        .with_priority(60)
        .with_dependencies(["security_system"]),
        Task::new(
            "system_prompt",
            "Create a prompt management system handling custom system prompts, \
             template variables, and context integration, with validation of \
             template definitions.",
            TemplateType::Description,
        )
        .with_priority(70)
        .with_dependencies(["cli_interface"]),
        // Phase 4: testing and documentation
        Task::new(
            "test_suite",
            "Create a comprehensive test suite: unit tests for all components, \
             integration tests for workflows, and mocking of AI interactions.",
            TemplateType::Test,
        )
        .with_priority(80)
        .with_dependencies(["system_prompt"]),
        Task::new(
            "documentation",
            "Create complete system documentation: installation and setup \
             guides, configuration reference, usage examples, and a \
             troubleshooting section.",
            TemplateType::Document,
        )
        .with_priority(90)
        .with_dependencies(["test_suite"]),
    ]
}

/// Seed a queue with the starter task set.
pub fn initialize_queue(queue: &TaskQueue) {
    for task in starter_tasks() {
        queue.add_task(task);
    }
    tracing::info!("Queue initialized with starter tasks");
}

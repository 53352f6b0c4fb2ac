//! Prompt templates per task template type.
//!
//! Each `TemplateType` maps to a prompt skeleton with a `{task_description}`
//! placeholder. The scheduler treats the result as opaque text; only the
//! executor hands it to the external assistant.

use crate::task::TemplateType;

/// Prompt skeleton for a template type.
pub fn prompt(template_type: TemplateType) -> &'static str {
    match template_type {
        TemplateType::Description => {
            "Analyze and describe how to implement the following task:\n\n\
             {task_description}\n\n\
             Explain the core functionality needed, the required components and \
             their interactions, potential challenges, and prerequisites. Provide \
             a structured breakdown of the implementation steps."
        }
        TemplateType::Analysis => {
            "Create a detailed technical design for:\n\n\
             {task_description}\n\n\
             Cover the component structure (key types, data structures, file \
             organization), the interaction and data flow including error paths, \
             and the implementation strategy with testing and integration points."
        }
        TemplateType::Code => {
            "Write code to implement:\n\n\
             {task_description}\n\n\
             The code should be well-structured and modular, validate its inputs, \
             handle errors and edge cases, and be testable. Keep interfaces clear."
        }
        TemplateType::Optimize => {
            "Review and optimize the following:\n\n\
             {task_description}\n\n\
             Focus on algorithm efficiency, resource usage, readability, and \
             robustness. Provide the optimized version along with the reasoning \
             behind each change."
        }
        TemplateType::Document => {
            "Create documentation for:\n\n\
             {task_description}\n\n\
             Include an overview of purpose and key features, technical details \
             of the architecture, API documentation, and usage guidelines with \
             practical examples."
        }
        TemplateType::Test => {
            "Create comprehensive tests for:\n\n\
             {task_description}\n\n\
             Cover core functionality, edge cases, and error conditions with \
             clear test descriptions and proper isolation. Use mocks where \
             external systems are involved."
        }
        TemplateType::Review => {
            "Review the following and provide analysis:\n\n\
             {task_description}\n\n\
             Examine code quality, potential issues (security, performance, \
             maintainability), documentation, and test coverage. Provide specific \
             improvements with reasoning and priority."
        }
        TemplateType::Improve => {
            "Analyze and improve the following component:\n\n\
             {task_description}\n\n\
             Consider architecture, implementation quality, API design, and the \
             development experience. Provide specific improvements with \
             implementation guidance."
        }
    }
}

/// Render the prompt for a task description.
pub fn render(template_type: TemplateType, task_description: &str) -> String {
    prompt(template_type).replace("{task_description}", task_description)
}

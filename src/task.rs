//! Task data model.
//!
//! A `Task` is the unit of work managed by the queue: identity, dependency
//! set, priority, lifecycle status, and outputs. The scheduler owns all
//! mutation of status, outputs, and `completed_at`; everything else is set at
//! construction or via explicit queue operations.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Lifecycle status of a task.
///
/// Transitions are monotone: `Pending -> InProgress -> {Completed, Failed}`.
/// The scheduler never moves a task backward; resetting a Failed task to
/// Pending is an external management operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Pending,
    InProgress,
    Completed,
    Failed,
}

impl TaskStatus {
    /// String form used in the queue file and CLI output.
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskStatus::Pending => "pending",
            TaskStatus::InProgress => "in_progress",
            TaskStatus::Completed => "completed",
            TaskStatus::Failed => "failed",
        }
    }

    /// Whether the task has finished, successfully or not.
    pub fn is_terminal(&self) -> bool {
        matches!(self, TaskStatus::Completed | TaskStatus::Failed)
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TaskStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(TaskStatus::Pending),
            "in_progress" => Ok(TaskStatus::InProgress),
            "completed" => Ok(TaskStatus::Completed),
            "failed" => Ok(TaskStatus::Failed),
            other => Err(format!("unknown task status: {other}")),
        }
    }
}

/// Which prompt template the executor uses for a task.
///
/// Opaque to scheduling logic; only the template layer interprets it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TemplateType {
    Description,
    Analysis,
    Code,
    Optimize,
    Document,
    Test,
    Review,
    Improve,
}

impl TemplateType {
    pub fn as_str(&self) -> &'static str {
        match self {
            TemplateType::Description => "description",
            TemplateType::Analysis => "analysis",
            TemplateType::Code => "code",
            TemplateType::Optimize => "optimize",
            TemplateType::Document => "document",
            TemplateType::Test => "test",
            TemplateType::Review => "review",
            TemplateType::Improve => "improve",
        }
    }
}

impl fmt::Display for TemplateType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TemplateType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "description" => Ok(TemplateType::Description),
            "analysis" => Ok(TemplateType::Analysis),
            "code" => Ok(TemplateType::Code),
            "optimize" => Ok(TemplateType::Optimize),
            "document" => Ok(TemplateType::Document),
            "test" => Ok(TemplateType::Test),
            "review" => Ok(TemplateType::Review),
            "improve" => Ok(TemplateType::Improve),
            other => Err(format!("unknown template type: {other}")),
        }
    }
}

/// Default priority for tasks that do not specify one.
pub const DEFAULT_PRIORITY: i64 = 100;

fn default_priority() -> i64 {
    DEFAULT_PRIORITY
}

fn default_status() -> TaskStatus {
    TaskStatus::Pending
}

/// A single task in the queue.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Task {
    /// Unique task identifier; primary key within a queue.
    pub name: String,

    /// Free-text instruction payload handed to the executor.
    pub description: String,

    /// Prompt template selector.
    pub template_type: TemplateType,

    /// Lower value = scheduled first.
    #[serde(default = "default_priority")]
    pub priority: i64,

    /// Current lifecycle status.
    #[serde(default = "default_status")]
    pub status: TaskStatus,

    /// Auxiliary file paths handed to the executor as context.
    #[serde(default)]
    pub context_paths: BTreeSet<String>,

    /// Names of tasks that must complete before this one is runnable.
    #[serde(default)]
    pub dependencies: BTreeSet<String>,

    /// Set at construction, immutable afterwards.
    pub created_at: DateTime<Utc>,

    /// Set exactly once, on the transition into Completed.
    #[serde(default)]
    pub completed_at: Option<DateTime<Utc>>,

    /// File paths the executor reported as created or modified. Append-only.
    #[serde(default)]
    pub outputs: BTreeSet<String>,

    /// Free-form annotations, never interpreted by the scheduler.
    #[serde(default)]
    pub metadata: BTreeMap<String, String>,

    /// Insertion order within the owning queue, used as the deterministic
    /// priority tie-break. Assigned by the queue and persisted so the
    /// tie-break survives a reload.
    #[serde(default)]
    pub(crate) seq: u64,
}

impl Task {
    /// Create a new pending task with default priority.
    pub fn new(name: impl Into<String>, description: impl Into<String>, template_type: TemplateType) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            template_type,
            priority: DEFAULT_PRIORITY,
            status: TaskStatus::Pending,
            context_paths: BTreeSet::new(),
            dependencies: BTreeSet::new(),
            created_at: Utc::now(),
            completed_at: None,
            outputs: BTreeSet::new(),
            metadata: BTreeMap::new(),
            seq: 0,
        }
    }

    /// Set the priority.
    pub fn with_priority(mut self, priority: i64) -> Self {
        self.priority = priority;
        self
    }

    /// Add dependency names.
    pub fn with_dependencies<I, S>(mut self, deps: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.dependencies.extend(deps.into_iter().map(Into::into));
        self
    }

    /// Add context file paths.
    pub fn with_context_paths<I, S>(mut self, paths: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.context_paths.extend(paths.into_iter().map(Into::into));
        self
    }

    /// Attach a metadata entry.
    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_task_new_defaults() {
        let task = Task::new("setup", "Set up the project", TemplateType::Description);
        assert_eq!(task.name, "setup");
        assert_eq!(task.priority, DEFAULT_PRIORITY);
        assert_eq!(task.status, TaskStatus::Pending);
        assert!(task.dependencies.is_empty());
        assert!(task.context_paths.is_empty());
        assert!(task.outputs.is_empty());
        assert!(task.metadata.is_empty());
        assert!(task.completed_at.is_none());
    }

    #[test]
    fn test_task_builder() {
        let task = Task::new("impl", "Implement the core", TemplateType::Code)
            .with_priority(10)
            .with_dependencies(["setup"])
            .with_context_paths(["notes.md"])
            .with_metadata("phase", "1");

        assert_eq!(task.priority, 10);
        assert!(task.dependencies.contains("setup"));
        assert!(task.context_paths.contains("notes.md"));
        assert_eq!(task.metadata.get("phase"), Some(&"1".to_string()));
    }

    #[test]
    fn test_status_round_trip() {
        for status in [
            TaskStatus::Pending,
            TaskStatus::InProgress,
            TaskStatus::Completed,
            TaskStatus::Failed,
        ] {
            let parsed: TaskStatus = status.as_str().parse().unwrap();
            assert_eq!(parsed, status);
        }
        assert!("bogus".parse::<TaskStatus>().is_err());
    }

    #[test]
    fn test_status_is_terminal() {
        assert!(!TaskStatus::Pending.is_terminal());
        assert!(!TaskStatus::InProgress.is_terminal());
        assert!(TaskStatus::Completed.is_terminal());
        assert!(TaskStatus::Failed.is_terminal());
    }

    #[test]
    fn test_template_type_round_trip() {
        for ty in [
            TemplateType::Description,
            TemplateType::Analysis,
            TemplateType::Code,
            TemplateType::Optimize,
            TemplateType::Document,
            TemplateType::Test,
            TemplateType::Review,
            TemplateType::Improve,
        ] {
            let parsed: TemplateType = ty.as_str().parse().unwrap();
            assert_eq!(parsed, ty);
        }
        assert!("bogus".parse::<TemplateType>().is_err());
    }

    #[test]
    fn test_serde_uses_snake_case_strings() {
        let mut task = Task::new("t", "d", TemplateType::Code).with_priority(10);
        task.status = TaskStatus::InProgress;

        let json = serde_json::to_value(&task).unwrap();
        assert_eq!(json["template_type"], "code");
        assert_eq!(json["status"], "in_progress");
        assert_eq!(json["priority"], 10);
        assert!(json["completed_at"].is_null());
        // Sets serialize as lists
        assert!(json["dependencies"].is_array());
        assert!(json["outputs"].is_array());
    }

    #[test]
    fn test_deserialize_fills_defaults() {
        let json = r#"{
            "name": "t",
            "description": "d",
            "template_type": "optimize",
            "created_at": "2025-01-15T10:00:00Z"
        }"#;
        let task: Task = serde_json::from_str(json).unwrap();
        assert_eq!(task.template_type, TemplateType::Optimize);
        assert_eq!(task.priority, DEFAULT_PRIORITY);
        assert_eq!(task.status, TaskStatus::Pending);
        assert!(task.dependencies.is_empty());
        assert!(task.completed_at.is_none());
    }

    #[test]
    fn test_serde_round_trip() {
        let mut task = Task::new("build", "Build it", TemplateType::Test)
            .with_priority(42)
            .with_dependencies(["a", "b"])
            .with_metadata("k", "v");
        task.status = TaskStatus::Completed;
        task.completed_at = Some(Utc::now());
        task.outputs.insert("out.txt".to_string());

        let json = serde_json::to_string(&task).unwrap();
        let back: Task = serde_json::from_str(&json).unwrap();

        assert_eq!(back.name, task.name);
        assert_eq!(back.status, task.status);
        assert_eq!(back.priority, task.priority);
        assert_eq!(back.dependencies, task.dependencies);
        assert_eq!(back.outputs, task.outputs);
        assert_eq!(back.metadata, task.metadata);
        assert_eq!(back.created_at, task.created_at);
    }
}

//! Event types dispatched by the host runtime.
//!
//! This module defines the inbound contract between the orchestration
//! runtime and the callback: the entities a run is made of (tasks, hosts,
//! results) and the lifecycle events that carry them. The callback only
//! reads these; creation and ownership stay with the runtime.
//!
//! ## Event Categories
//!
//! - **Playbook Events**: run structure (start, play start, include, stats)
//! - **Runner Events**: per-host results (ok, failed, unreachable, skipped)
//! - **Item Events**: per-iteration results of looped tasks
//! - **Async Events**: fire-and-forget job status

use std::collections::HashMap;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::{Map as JsonMap, Value as JsonValue};
use uuid::Uuid;

// ============================================================================
// Payload Truthiness
// ============================================================================

/// Loose truthiness for payload flags.
///
/// Result payloads originate from modules that are sloppy about types: a
/// `changed` flag may arrive as a bool, a number, a string, or be absent
/// entirely. An absent key, `null`, `false`, `0`, an empty string, and an
/// empty collection all read as false; everything else reads as true.
#[must_use]
pub fn truthy(value: Option<&JsonValue>) -> bool {
    match value {
        None | Some(JsonValue::Null) => false,
        Some(JsonValue::Bool(b)) => *b,
        Some(JsonValue::Number(n)) => n.as_f64().is_some_and(|f| f != 0.0),
        Some(JsonValue::String(s)) => !s.is_empty(),
        Some(JsonValue::Array(a)) => !a.is_empty(),
        Some(JsonValue::Object(o)) => !o.is_empty(),
    }
}

// ============================================================================
// Entities
// ============================================================================

/// One declarative unit of work in an execution plan.
///
/// Owned by the runtime; the callback reads its identity, display name,
/// and the handful of flags that affect rendering.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Task {
    /// Unique task identifier (banner dedup key)
    pub id: Uuid,
    /// Display name
    pub name: String,
    /// Action (module) the task invokes
    pub action: String,
    /// Module arguments, in declaration order
    #[serde(default)]
    pub args: IndexMap<String, JsonValue>,
    /// Suppress argument display for this task
    #[serde(default)]
    pub no_log: bool,
    /// Source location ("file:line") for failure reporting
    #[serde(default)]
    pub path: Option<String>,
    /// Delegation target, when the task runs on a different host
    #[serde(default)]
    pub delegate_to: Option<String>,
    /// Whether the task originates from an include/import construct
    #[serde(default)]
    pub is_include: bool,
    /// Whether the task loops over items
    #[serde(default)]
    pub is_loop: bool,
    /// Whether unreachable hosts are tolerated for this task
    #[serde(default)]
    pub ignore_unreachable: bool,
}

impl Task {
    /// Create a new task with a fresh id.
    pub fn new(name: impl Into<String>, action: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            action: action.into(),
            args: IndexMap::new(),
            no_log: false,
            path: None,
            delegate_to: None,
            is_include: false,
            is_loop: false,
            ignore_unreachable: false,
        }
    }

    /// Set the task id (for correlating events in tests and embeddings).
    #[must_use]
    pub fn with_id(mut self, id: Uuid) -> Self {
        self.id = id;
        self
    }

    /// Set the module arguments.
    #[must_use]
    pub fn with_args(mut self, args: IndexMap<String, JsonValue>) -> Self {
        self.args = args;
        self
    }

    /// Set the `no_log` privacy flag.
    #[must_use]
    pub fn with_no_log(mut self, no_log: bool) -> Self {
        self.no_log = no_log;
        self
    }

    /// Set the source location.
    #[must_use]
    pub fn with_path(mut self, path: impl Into<String>) -> Self {
        self.path = Some(path.into());
        self
    }

    /// Set the delegation target.
    #[must_use]
    pub fn with_delegate_to(mut self, host: impl Into<String>) -> Self {
        self.delegate_to = Some(host.into());
        self
    }

    /// Mark the task as originating from an include construct.
    #[must_use]
    pub fn with_include(mut self, is_include: bool) -> Self {
        self.is_include = is_include;
        self
    }

    /// Mark the task as looping.
    #[must_use]
    pub fn with_loop(mut self, is_loop: bool) -> Self {
        self.is_loop = is_loop;
        self
    }

    /// Set whether unreachable hosts are tolerated.
    #[must_use]
    pub fn with_ignore_unreachable(mut self, ignore: bool) -> Self {
        self.ignore_unreachable = ignore;
        self
    }
}

/// Prior state of a host within the run, as tracked by the runtime.
///
/// Purely cosmetic: it only tints the host's label in output and carries
/// no semantic weight.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HostState {
    /// No failures so far
    #[default]
    Ok,
    /// At least one task failed on this host
    Failed,
    /// The host could not be reached
    Unreachable,
}

/// A target host, identified by name.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Host {
    /// Host name
    pub name: String,
    /// Cosmetic state marker maintained by the runtime
    #[serde(default)]
    pub state: HostState,
}

impl Host {
    /// Create a new host in the default (ok) state.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            state: HostState::Ok,
        }
    }

    /// Set the cosmetic state marker.
    #[must_use]
    pub fn with_state(mut self, state: HostState) -> Self {
        self.state = state;
        self
    }
}

/// The outcome of executing one task against one host.
///
/// The payload is an open map: modules put arbitrary keys in it. Status
/// flags are read with [`truthy`] semantics; everything else is passed
/// through to the output dump after sanitization.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskResult {
    /// The originating task
    pub task: Task,
    /// The target host
    pub host: Host,
    /// Module result payload
    #[serde(default)]
    pub payload: JsonMap<String, JsonValue>,
}

impl TaskResult {
    /// Create an empty result for a (task, host) pairing.
    #[must_use]
    pub fn new(task: Task, host: Host) -> Self {
        Self {
            task,
            host,
            payload: JsonMap::new(),
        }
    }

    /// Add a payload entry.
    #[must_use]
    pub fn with_value(mut self, key: impl Into<String>, value: JsonValue) -> Self {
        self.payload.insert(key.into(), value);
        self
    }

    /// Get a payload entry.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&JsonValue> {
        self.payload.get(key)
    }

    /// Whether the result is marked changed.
    #[must_use]
    pub fn is_changed(&self) -> bool {
        truthy(self.payload.get("changed"))
    }

    /// Whether the result is marked failed.
    #[must_use]
    pub fn is_failed(&self) -> bool {
        truthy(self.payload.get("failed"))
    }

    /// Whether the result is marked skipped.
    #[must_use]
    pub fn is_skipped(&self) -> bool {
        truthy(self.payload.get("skipped"))
    }
}

/// Per-host tallies carried by the stats event.
///
/// Received for interface completeness; the actionable callback never
/// renders them.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct RunTally {
    /// Tasks that completed without changes
    pub ok: u32,
    /// Tasks that made changes
    pub changed: u32,
    /// Tasks that failed
    pub failed: u32,
    /// Tasks that were skipped
    pub skipped: u32,
    /// Tasks where the host was unreachable
    pub unreachable: u32,
}

// ============================================================================
// Events
// ============================================================================

/// All lifecycle events the runtime dispatches to the callback.
///
/// The runtime dispatches hooks by name ("v2" naming convention); each
/// variant is renamed to the exact wire name so a mismatch surfaces as a
/// deserialization miss rather than a silently dropped event.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "hook")]
pub enum CallbackEvent {
    // -------------------------------------------------------------------------
    // Playbook Lifecycle Events
    // -------------------------------------------------------------------------
    /// The run started.
    #[serde(rename = "v2_playbook_on_start")]
    PlaybookOnStart {
        /// Name of the playbook
        playbook: String,
    },

    /// A play started.
    #[serde(rename = "v2_playbook_on_play_start")]
    PlaybookOnPlayStart {
        /// Name of the play
        play: String,
    },

    /// An ordinary task started.
    #[serde(rename = "v2_playbook_on_task_start")]
    PlaybookOnTaskStart {
        /// The task that is starting
        task: Task,
        /// Whether the task carries a condition
        is_conditional: bool,
    },

    /// A cleanup task started.
    #[serde(rename = "v2_playbook_on_cleanup_task_start")]
    PlaybookOnCleanupTaskStart {
        /// The cleanup task that is starting
        task: Task,
    },

    /// A handler task started.
    #[serde(rename = "v2_playbook_on_handler_task_start")]
    PlaybookOnHandlerTaskStart {
        /// The handler task that is starting
        task: Task,
    },

    /// No hosts matched the play's pattern.
    #[serde(rename = "v2_playbook_on_no_hosts_matched")]
    PlaybookOnNoHostsMatched,

    /// All hosts have failed out of the play.
    #[serde(rename = "v2_playbook_on_no_hosts_remaining")]
    PlaybookOnNoHostsRemaining,

    /// A handler was notified.
    #[serde(rename = "v2_playbook_on_notify")]
    PlaybookOnNotify {
        /// The notified handler task
        handler: Task,
        /// Host whose change triggered the notification
        host: Host,
    },

    /// A task file was included.
    #[serde(rename = "v2_playbook_on_include")]
    PlaybookOnInclude {
        /// Path of the included file
        included_file: String,
    },

    /// Final per-host statistics.
    #[serde(rename = "v2_playbook_on_stats")]
    PlaybookOnStats {
        /// Tallies keyed by host name
        stats: HashMap<String, RunTally>,
    },

    // -------------------------------------------------------------------------
    // Runner Events (per-host results)
    // -------------------------------------------------------------------------
    /// A task began executing on a host.
    #[serde(rename = "v2_runner_on_start")]
    RunnerOnStart {
        /// The target host
        host: Host,
        /// The task being executed
        task: Task,
    },

    /// A task completed successfully on a host.
    #[serde(rename = "v2_runner_on_ok")]
    RunnerOnOk {
        /// The result
        result: TaskResult,
    },

    /// A task failed on a host.
    #[serde(rename = "v2_runner_on_failed")]
    RunnerOnFailed {
        /// The result
        result: TaskResult,
        /// Whether the task marked the failure ignorable
        ignore_errors: bool,
    },

    /// A host was unreachable.
    #[serde(rename = "v2_runner_on_unreachable")]
    RunnerOnUnreachable {
        /// The result
        result: TaskResult,
    },

    /// A task was skipped on a host.
    #[serde(rename = "v2_runner_on_skipped")]
    RunnerOnSkipped {
        /// The result
        result: TaskResult,
    },

    /// A failed task is about to be retried.
    #[serde(rename = "v2_runner_retry")]
    RunnerRetry {
        /// The failed attempt's result, carrying `attempts` and `retries`
        result: TaskResult,
    },

    // -------------------------------------------------------------------------
    // Item Events (loop iterations)
    // -------------------------------------------------------------------------
    /// One loop iteration completed successfully.
    #[serde(rename = "v2_runner_item_on_ok")]
    RunnerItemOnOk {
        /// The item result
        result: TaskResult,
    },

    /// One loop iteration failed.
    #[serde(rename = "v2_runner_item_on_failed")]
    RunnerItemOnFailed {
        /// The item result
        result: TaskResult,
    },

    /// One loop iteration was skipped.
    #[serde(rename = "v2_runner_item_on_skipped")]
    RunnerItemOnSkipped {
        /// The item result
        result: TaskResult,
    },

    // -------------------------------------------------------------------------
    // Async Job Events
    // -------------------------------------------------------------------------
    /// An async job was polled.
    #[serde(rename = "v2_runner_on_async_poll")]
    RunnerOnAsyncPoll {
        /// The poll result
        result: TaskResult,
    },

    /// An async job completed successfully.
    #[serde(rename = "v2_runner_on_async_ok")]
    RunnerOnAsyncOk {
        /// The final result
        result: TaskResult,
    },

    /// An async job failed.
    #[serde(rename = "v2_runner_on_async_failed")]
    RunnerOnAsyncFailed {
        /// The final result, carrying the job id when known
        result: TaskResult,
    },

    // -------------------------------------------------------------------------
    // Diff Events
    // -------------------------------------------------------------------------
    /// A result carries file diff data.
    #[serde(rename = "v2_on_file_diff")]
    OnFileDiff {
        /// The result whose payload holds the diff
        result: TaskResult,
    },
}

impl CallbackEvent {
    /// Returns the wire name of the hook this event arrives on.
    #[must_use]
    pub fn hook_name(&self) -> &'static str {
        match self {
            CallbackEvent::PlaybookOnStart { .. } => "v2_playbook_on_start",
            CallbackEvent::PlaybookOnPlayStart { .. } => "v2_playbook_on_play_start",
            CallbackEvent::PlaybookOnTaskStart { .. } => "v2_playbook_on_task_start",
            CallbackEvent::PlaybookOnCleanupTaskStart { .. } => {
                "v2_playbook_on_cleanup_task_start"
            }
            CallbackEvent::PlaybookOnHandlerTaskStart { .. } => {
                "v2_playbook_on_handler_task_start"
            }
            CallbackEvent::PlaybookOnNoHostsMatched => "v2_playbook_on_no_hosts_matched",
            CallbackEvent::PlaybookOnNoHostsRemaining => "v2_playbook_on_no_hosts_remaining",
            CallbackEvent::PlaybookOnNotify { .. } => "v2_playbook_on_notify",
            CallbackEvent::PlaybookOnInclude { .. } => "v2_playbook_on_include",
            CallbackEvent::PlaybookOnStats { .. } => "v2_playbook_on_stats",
            CallbackEvent::RunnerOnStart { .. } => "v2_runner_on_start",
            CallbackEvent::RunnerOnOk { .. } => "v2_runner_on_ok",
            CallbackEvent::RunnerOnFailed { .. } => "v2_runner_on_failed",
            CallbackEvent::RunnerOnUnreachable { .. } => "v2_runner_on_unreachable",
            CallbackEvent::RunnerOnSkipped { .. } => "v2_runner_on_skipped",
            CallbackEvent::RunnerRetry { .. } => "v2_runner_retry",
            CallbackEvent::RunnerItemOnOk { .. } => "v2_runner_item_on_ok",
            CallbackEvent::RunnerItemOnFailed { .. } => "v2_runner_item_on_failed",
            CallbackEvent::RunnerItemOnSkipped { .. } => "v2_runner_item_on_skipped",
            CallbackEvent::RunnerOnAsyncPoll { .. } => "v2_runner_on_async_poll",
            CallbackEvent::RunnerOnAsyncOk { .. } => "v2_runner_on_async_ok",
            CallbackEvent::RunnerOnAsyncFailed { .. } => "v2_runner_on_async_failed",
            CallbackEvent::OnFileDiff { .. } => "v2_on_file_diff",
        }
    }

    /// Returns the subject host of this event, where one exists.
    #[must_use]
    pub fn host(&self) -> Option<&str> {
        match self {
            CallbackEvent::RunnerOnOk { result }
            | CallbackEvent::RunnerOnFailed { result, .. }
            | CallbackEvent::RunnerOnUnreachable { result }
            | CallbackEvent::RunnerOnSkipped { result }
            | CallbackEvent::RunnerRetry { result }
            | CallbackEvent::RunnerItemOnOk { result }
            | CallbackEvent::RunnerItemOnFailed { result }
            | CallbackEvent::RunnerItemOnSkipped { result }
            | CallbackEvent::RunnerOnAsyncPoll { result }
            | CallbackEvent::RunnerOnAsyncOk { result }
            | CallbackEvent::RunnerOnAsyncFailed { result }
            | CallbackEvent::OnFileDiff { result } => Some(&result.host.name),
            CallbackEvent::RunnerOnStart { host, .. }
            | CallbackEvent::PlaybookOnNotify { host, .. } => Some(&host.name),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn truthy_reads_loose_flags() {
        assert!(!truthy(None));
        assert!(!truthy(Some(&json!(null))));
        assert!(!truthy(Some(&json!(false))));
        assert!(!truthy(Some(&json!(0))));
        assert!(!truthy(Some(&json!(""))));
        assert!(!truthy(Some(&json!([]))));
        assert!(!truthy(Some(&json!({}))));

        assert!(truthy(Some(&json!(true))));
        assert!(truthy(Some(&json!(1))));
        assert!(truthy(Some(&json!("yes"))));
        assert!(truthy(Some(&json!([1]))));
        assert!(truthy(Some(&json!({"k": 1}))));
    }

    #[test]
    fn result_flags_use_truthiness() {
        let task = Task::new("install nginx", "package");
        let host = Host::new("web1");
        let result = TaskResult::new(task, host)
            .with_value("changed", json!(1))
            .with_value("failed", json!(""));

        assert!(result.is_changed());
        assert!(!result.is_failed());
        assert!(!result.is_skipped());
    }

    #[test]
    fn events_serialize_with_wire_hook_names() {
        let task = Task::new("install nginx", "package");
        let event = CallbackEvent::PlaybookOnTaskStart {
            task,
            is_conditional: false,
        };
        let value = serde_json::to_value(&event).unwrap();
        assert_eq!(value["hook"], "v2_playbook_on_task_start");
        assert_eq!(event.hook_name(), "v2_playbook_on_task_start");

        let back: CallbackEvent = serde_json::from_value(value).unwrap();
        assert_eq!(back.hook_name(), "v2_playbook_on_task_start");
    }

    #[test]
    fn host_accessor_covers_result_events() {
        let result = TaskResult::new(Task::new("t", "command"), Host::new("db1"));
        let event = CallbackEvent::RunnerOnOk { result };
        assert_eq!(event.host(), Some("db1"));

        assert_eq!(CallbackEvent::PlaybookOnNoHostsMatched.host(), None);
    }

    #[test]
    fn task_builder_defaults_are_plain() {
        let task = Task::new("  spaced  ", "debug");
        assert!(!task.no_log);
        assert!(!task.is_include);
        assert!(!task.is_loop);
        assert!(!task.ignore_unreachable);
        assert!(task.args.is_empty());

        let delegated = task.clone().with_delegate_to("proxy1");
        assert_eq!(delegated.delegate_to.as_deref(), Some("proxy1"));
        // Builder copies keep the original id so events still correlate.
        assert_eq!(delegated.id, task.id);
    }
}

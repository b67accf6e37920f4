//! The actionable callback renderer.
//!
//! [`ActionableCallback`] consumes the runtime's lifecycle events and prints
//! only what an operator has to act on: changes and failures. Unchanged-ok
//! results and skipped hosts stay silent unless explicitly re-enabled
//! through [`ActionableOptions`].
//!
//! Task banners are printed lazily: a task announces itself when its first
//! displayed result arrives, and a small amount of renderer-local state
//! (the last banner's task id, the last task name, a task-id → prefix
//! cache) keeps banners from repeating across the related result, item,
//! and diff events of the same task.
//!
//! # Example Output
//!
//! ```text
//! TASK [Install nginx] **********************************************************
//! changed: [web1]
//! fatal: [web2]: FAILED! => {"msg":"apt-get returned 100"}
//! ```

use std::collections::HashMap;

use colored::Colorize;
use parking_lot::RwLock;
use serde_json::{Map as JsonMap, Value as JsonValue};
use tracing::trace;
use uuid::Uuid;

use crate::config::ActionableOptions;
use crate::diff::format_diff;
use crate::display::{
    Display, COLOR_CHANGED, COLOR_DEBUG, COLOR_ERROR, COLOR_OK, COLOR_SKIP, COLOR_UNREACHABLE,
};
use crate::sanitize::{dump_result, item_label};
use crate::types::{truthy, CallbackEvent, HostState, Task, TaskResult};

/// Banner prefix for ordinary tasks.
const PREFIX_TASK: &str = "TASK";
/// Banner prefix for cleanup tasks.
const PREFIX_CLEANUP: &str = "CLEANUP TASK";
/// Banner prefix for handler tasks.
const PREFIX_HANDLER: &str = "RUNNING HANDLER";

/// Console callback that renders only actionable results.
///
/// One instance is attached per run. The renderer is `Send + Sync` so the
/// engine can hold it behind a shared handle; events are still delivered
/// one at a time, the locks only keep `render` at `&self`.
#[derive(Debug)]
pub struct ActionableCallback {
    /// Resolved display options
    options: ActionableOptions,
    /// Output sinks
    display: Display,
    /// Id of the task whose banner was printed most recently
    last_task_banner: RwLock<Option<Uuid>>,
    /// Display name cached at task start
    last_task_name: RwLock<Option<String>>,
    /// Task id → banner prefix, populated when a task is announced
    task_type_cache: RwLock<HashMap<Uuid, String>>,
}

impl ActionableCallback {
    /// Create a callback writing to the process stdout/stderr.
    #[must_use]
    pub fn new(options: ActionableOptions) -> Self {
        let display = Display::new(&options);
        Self::with_display(options, display)
    }

    /// Create a callback writing through an existing [`Display`].
    ///
    /// This is how tests capture output: build the display over injected
    /// sinks and hand it in.
    #[must_use]
    pub fn with_display(options: ActionableOptions, display: Display) -> Self {
        Self {
            options,
            display,
            last_task_banner: RwLock::new(None),
            last_task_name: RwLock::new(None),
            task_type_cache: RwLock::new(HashMap::new()),
        }
    }

    /// The options this callback was built with.
    #[must_use]
    pub fn options(&self) -> &ActionableOptions {
        &self.options
    }

    /// Render one lifecycle event.
    ///
    /// The single entry point the runtime drives. Events with no visible
    /// output (play structure, stats, skips, async polls) are consumed
    /// silently.
    pub fn render(&self, event: CallbackEvent) {
        trace!(hook = event.hook_name(), host = event.host(), "rendering event");

        match event {
            CallbackEvent::PlaybookOnTaskStart { task, .. } => {
                self.task_start(&task, PREFIX_TASK);
            }
            CallbackEvent::PlaybookOnCleanupTaskStart { task } => {
                self.task_start(&task, PREFIX_CLEANUP);
            }
            CallbackEvent::PlaybookOnHandlerTaskStart { task } => {
                self.task_start(&task, PREFIX_HANDLER);
            }
            CallbackEvent::RunnerOnOk { result } => self.runner_on_ok(result),
            CallbackEvent::RunnerOnFailed {
                result,
                ignore_errors,
            } => self.runner_on_failed(result, ignore_errors),
            CallbackEvent::RunnerOnUnreachable { result } => self.runner_on_unreachable(result),
            CallbackEvent::RunnerRetry { result } => self.runner_retry(&result),
            CallbackEvent::RunnerItemOnOk { result } => self.item_on_ok(result),
            CallbackEvent::RunnerItemOnFailed { result } => self.item_on_failed(result),
            CallbackEvent::OnFileDiff { result } => self.on_file_diff(&result),
            CallbackEvent::RunnerOnAsyncFailed { result } => self.async_failed(&result),

            // Skips are never actionable.
            CallbackEvent::RunnerOnSkipped { .. } | CallbackEvent::RunnerItemOnSkipped { .. } => {}

            // Structural events and healthy async jobs: extension points,
            // consumed without output.
            CallbackEvent::PlaybookOnStart { .. }
            | CallbackEvent::PlaybookOnPlayStart { .. }
            | CallbackEvent::PlaybookOnNoHostsMatched
            | CallbackEvent::PlaybookOnNoHostsRemaining
            | CallbackEvent::PlaybookOnNotify { .. }
            | CallbackEvent::PlaybookOnInclude { .. }
            | CallbackEvent::PlaybookOnStats { .. }
            | CallbackEvent::RunnerOnStart { .. }
            | CallbackEvent::RunnerOnAsyncPoll { .. }
            | CallbackEvent::RunnerOnAsyncOk { .. } => {}
        }
    }

    // ========================================================================
    // Task Start and Banners
    // ========================================================================

    fn task_start(&self, task: &Task, prefix: &str) {
        self.task_type_cache
            .write()
            .insert(task.id, prefix.to_string());
        *self.last_task_name.write() = Some(task.name.trim().to_string());

        // With both filters disabled there is nothing to wait for; print
        // the banner up front instead of deferring to the first result.
        if self.options.display_skipped_hosts && self.options.display_ok_hosts {
            self.print_task_banner(task);
        }
    }

    /// Print the banner for `task` unless it was the last one printed.
    ///
    /// Last-write-wins, not a set: re-visiting an earlier task after
    /// another task has rendered re-prints its banner.
    fn ensure_banner(&self, task: &Task) {
        if *self.last_task_banner.read() != Some(task.id) {
            self.print_task_banner(task);
        }
    }

    fn print_task_banner(&self, task: &Task) {
        // Task args can hold secrets; echo them only when the global toggle
        // asks for it and the task itself is not no_log.
        let mut args = String::new();
        if !task.no_log && self.options.display_args_to_stdout && !task.args.is_empty() {
            let joined = task
                .args
                .iter()
                .map(|(key, value)| format!("{key}={}", scalar_text(value)))
                .collect::<Vec<_>>()
                .join(", ");
            args = format!(" {joined}");
        }

        let prefix = self
            .task_type_cache
            .read()
            .get(&task.id)
            .cloned()
            .unwrap_or_else(|| PREFIX_TASK.to_string());

        let name = self
            .last_task_name
            .read()
            .clone()
            .unwrap_or_else(|| task.name.trim().to_string());

        self.display.banner(&format!("{prefix} [{name}{args}]"));
        *self.last_task_banner.write() = Some(task.id);
    }

    // ========================================================================
    // Per-Host Results
    // ========================================================================

    fn runner_on_ok(&self, mut result: TaskResult) {
        let label = self.host_label(&result);

        let (msg, color) = if result.is_changed() {
            self.ensure_banner(&result.task);
            (format!("changed: [{label}]"), COLOR_CHANGED)
        } else {
            if !self.options.display_ok_hosts {
                return;
            }
            self.ensure_banner(&result.task);
            (format!("ok: [{label}]"), COLOR_OK)
        };

        self.handle_warnings(&mut result.payload);

        if result.task.is_loop && result.payload.contains_key("results") {
            self.process_items(&result);
        } else {
            let mut msg = msg;
            if self.run_is_verbose(&result.payload, 0) {
                let dump = dump_result(&result.payload, self.display.verbosity());
                msg.push_str(&format!(" => {dump}"));
            }
            self.display.display(&msg, Some(color), false);
        }
    }

    fn runner_on_failed(&self, mut result: TaskResult, ignore_errors: bool) {
        let label = self.host_label(&result);
        let use_stderr = self.options.display_failed_stderr;

        self.ensure_banner(&result.task);
        self.handle_exception(&mut result.payload, use_stderr);
        self.handle_warnings(&mut result.payload);

        if result.task.is_loop && result.payload.contains_key("results") {
            self.process_items(&result);
        } else {
            if self.display.verbosity() < 2 && self.options.show_task_path_on_failure {
                self.print_task_path(&result.task, use_stderr);
            }
            let dump = dump_result(&result.payload, self.display.verbosity());
            let msg = format!("fatal: [{label}]: FAILED! => {dump}");
            self.display.display(&msg, Some(COLOR_ERROR), use_stderr);
        }

        if ignore_errors {
            self.display.display("...ignoring", Some(COLOR_SKIP), false);
        }
    }

    fn runner_on_unreachable(&self, result: TaskResult) {
        self.ensure_banner(&result.task);

        let label = self.host_label(&result);
        let dump = dump_result(&result.payload, self.display.verbosity());
        let msg = format!("fatal: [{label}]: UNREACHABLE! => {dump}");
        self.display.display(
            &msg,
            Some(COLOR_UNREACHABLE),
            self.options.display_failed_stderr,
        );

        if result.task.ignore_unreachable {
            self.display.display("...ignoring", Some(COLOR_SKIP), false);
        }
    }

    fn runner_retry(&self, result: &TaskResult) {
        let label = self.host_label(result);
        // Counters come from the module payload and may be absent or
        // malformed; read them as 0 rather than failing the line.
        let attempts = result.get("attempts").and_then(JsonValue::as_u64).unwrap_or(0);
        let retries = result.get("retries").and_then(JsonValue::as_u64).unwrap_or(0);
        let left = retries.saturating_sub(attempts);

        let mut msg = format!(
            "FAILED - RETRYING: [{label}]: {} ({left} retries left).",
            result.task.name
        );
        if self.run_is_verbose(&result.payload, 2) {
            let dump = dump_result(&result.payload, self.display.verbosity());
            msg.push_str(&format!("Result was: {dump}"));
        }
        self.display.display(&msg, Some(COLOR_DEBUG), false);
    }

    // ========================================================================
    // Loop Items
    // ========================================================================

    /// Fan a loop result's `results` array out to the per-item handlers.
    fn process_items(&self, result: &TaskResult) {
        let Some(JsonValue::Array(items)) = result.payload.get("results") else {
            return;
        };

        for item in items {
            let Some(payload) = item.as_object() else {
                continue;
            };
            let item_result = TaskResult {
                task: result.task.clone(),
                host: result.host.clone(),
                payload: payload.clone(),
            };

            if item_result.is_skipped() {
                // Skipped items never display.
            } else if item_result.is_failed() {
                self.item_on_failed(item_result);
            } else {
                self.item_on_ok(item_result);
            }
        }
    }

    fn item_on_ok(&self, mut result: TaskResult) {
        // Include constructs report their inclusion as items; not a result.
        if result.task.is_include {
            return;
        }

        let label = self.host_label(&result);
        let (status, color) = if result.is_changed() {
            self.ensure_banner(&result.task);
            ("changed", COLOR_CHANGED)
        } else {
            if !self.options.display_ok_hosts {
                return;
            }
            self.ensure_banner(&result.task);
            ("ok", COLOR_OK)
        };

        self.handle_warnings(&mut result.payload);

        let item = item_label(&result.payload);
        let msg = format!("{status}: [{label}] => (item={item})");
        self.display.display(&msg, Some(color), false);
    }

    fn item_on_failed(&self, mut result: TaskResult) {
        self.ensure_banner(&result.task);

        let label = self.host_label(&result);
        let use_stderr = self.options.display_failed_stderr;
        self.handle_exception(&mut result.payload, use_stderr);
        self.handle_warnings(&mut result.payload);

        let item = item_label(&result.payload);
        let dump = dump_result(&result.payload, self.display.verbosity());
        let msg = format!("failed: [{label}] (item={item}) => {dump}");
        self.display.display(&msg, Some(COLOR_ERROR), use_stderr);
    }

    // ========================================================================
    // Diffs and Async Jobs
    // ========================================================================

    fn on_file_diff(&self, result: &TaskResult) {
        if result.task.is_loop {
            if let Some(JsonValue::Array(items)) = result.payload.get("results") {
                for item in items {
                    let Some(payload) = item.as_object() else {
                        continue;
                    };
                    if truthy(payload.get("changed")) {
                        if let Some(diff) = payload.get("diff") {
                            self.display_diff(&result.task, diff);
                        }
                    }
                }
                return;
            }
        }

        if result.is_changed() {
            if let Some(diff) = result.payload.get("diff") {
                self.display_diff(&result.task, diff);
            }
        }
    }

    fn display_diff(&self, task: &Task, diff: &JsonValue) {
        if let Some(text) = format_diff(diff, self.display.use_color()) {
            self.ensure_banner(task);
            self.display
                .display(text.trim_end_matches('\n'), None, false);
        }
    }

    fn async_failed(&self, result: &TaskResult) {
        // The job id may still sit in the unparsed async_result when the
        // job outlived its timeout.
        let jid = result
            .get("job_id")
            .filter(|v| truthy(Some(*v)))
            .or_else(|| {
                result
                    .get("async_result")
                    .and_then(|nested| nested.get("job_id"))
                    .filter(|v| truthy(Some(*v)))
            })
            .map_or_else(|| "unknown".to_string(), scalar_text);

        let msg = format!("ASYNC FAILED on {}: jid={jid}", result.host.name);
        self.display.display(&msg, Some(COLOR_DEBUG), false);
    }

    // ========================================================================
    // Shared Rules
    // ========================================================================

    /// A host's display label: its name, tinted by prior state, plus the
    /// delegation target when the task ran elsewhere.
    fn host_label(&self, result: &TaskResult) -> String {
        let name = &result.host.name;
        let tinted = if self.display.use_color()
            && matches!(
                result.host.state,
                HostState::Failed | HostState::Unreachable
            ) {
            name.color(COLOR_ERROR).to_string()
        } else {
            name.clone()
        };

        match &result.task.delegate_to {
            Some(delegate) if delegate != name => format!("{tinted} -> {delegate}"),
            _ => tinted,
        }
    }

    fn print_task_path(&self, task: &Task, use_stderr: bool) {
        if let Some(path) = &task.path {
            self.display
                .display(&format!("task path: {path}"), Some(COLOR_DEBUG), use_stderr);
        }
    }

    /// Render and consume a payload's `exception`, if any.
    fn handle_exception(&self, payload: &mut JsonMap<String, JsonValue>, use_stderr: bool) {
        let Some(exception) = payload.get("exception") else {
            return;
        };
        let text = scalar_text(exception);

        let msg = if self.display.verbosity() < 3 {
            let last_line = text.trim_end().lines().last().unwrap_or("").trim();
            format!(
                "An exception occurred during task execution. To see the full traceback, \
                 use -vvv. The error was: {last_line}"
            )
        } else {
            // Full traceback shown; drop the key so dumps do not repeat it.
            payload.remove("exception");
            format!("An exception occurred during task execution. The full traceback is:\n{text}")
        };

        self.display.display(&msg, Some(COLOR_ERROR), use_stderr);
    }

    /// Render and consume a payload's `warnings`, if any.
    fn handle_warnings(&self, payload: &mut JsonMap<String, JsonValue>) {
        if !truthy(payload.get("warnings")) {
            return;
        }
        if let Some(JsonValue::Array(warnings)) = payload.remove("warnings") {
            for warning in &warnings {
                self.display.warning(&scalar_text(warning));
            }
        }
    }

    /// Whether a result dump should be appended at this verbosity.
    fn run_is_verbose(&self, payload: &JsonMap<String, JsonValue>, threshold: u8) -> bool {
        (self.display.verbosity() > threshold || truthy(payload.get("_verbose_always")))
            && !truthy(payload.get("_verbose_override"))
    }
}

/// Render a payload value for inline display: strings bare, everything
/// else as compact JSON.
fn scalar_text(value: &JsonValue) -> String {
    match value {
        JsonValue::String(s) => s.clone(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::RwLock as PlRwLock;
    use serde_json::json;
    use std::io::{self, Write};
    use std::sync::Arc;

    use crate::types::Host;

    #[derive(Debug, Clone, Default)]
    struct CaptureBuffer {
        inner: Arc<PlRwLock<Vec<u8>>>,
    }

    impl CaptureBuffer {
        fn contents(&self) -> String {
            String::from_utf8_lossy(&self.inner.read()).to_string()
        }
    }

    impl Write for CaptureBuffer {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.inner.write().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    fn callback(options: ActionableOptions) -> (ActionableCallback, CaptureBuffer, CaptureBuffer) {
        let out = CaptureBuffer::default();
        let err = CaptureBuffer::default();
        let options = ActionableOptions {
            use_colors: false,
            ..options
        };
        let display =
            Display::with_sinks(&options, Box::new(out.clone()), Box::new(err.clone()));
        (ActionableCallback::with_display(options, display), out, err)
    }

    fn changed_result(task: &Task, host: &str) -> TaskResult {
        TaskResult::new(task.clone(), Host::new(host)).with_value("changed", json!(true))
    }

    #[test]
    fn task_start_caches_trimmed_name_and_prefix() {
        let (cb, out, _) = callback(ActionableOptions::default());
        let task = Task::new("  Install nginx  ", "package");

        cb.render(CallbackEvent::PlaybookOnHandlerTaskStart { task: task.clone() });
        // Deferred: nothing printed yet with default options.
        assert!(out.contents().is_empty());

        cb.render(CallbackEvent::RunnerOnOk {
            result: changed_result(&task, "web1"),
        });
        assert!(out.contents().contains("RUNNING HANDLER [Install nginx]"));
    }

    #[test]
    fn banner_is_printed_once_per_task() {
        let (cb, out, _) = callback(ActionableOptions::default());
        let task = Task::new("t", "command");

        cb.render(CallbackEvent::RunnerOnOk {
            result: changed_result(&task, "a"),
        });
        cb.render(CallbackEvent::RunnerOnOk {
            result: changed_result(&task, "b"),
        });

        assert_eq!(out.contents().matches("TASK [t]").count(), 1);
        assert_eq!(out.contents().matches("changed:").count(), 2);
    }

    #[test]
    fn banner_echoes_args_only_when_asked_and_not_no_log() {
        let mut args = indexmap::IndexMap::new();
        args.insert("name".to_string(), json!("nginx"));
        args.insert("state".to_string(), json!("present"));

        let (cb, out, _) = callback(ActionableOptions {
            display_args_to_stdout: true,
            ..Default::default()
        });
        let task = Task::new("install", "package").with_args(args.clone());
        cb.render(CallbackEvent::RunnerOnOk {
            result: changed_result(&task, "web1"),
        });
        assert!(out.contents().contains("TASK [install name=nginx, state=present]"));

        let (cb, out, _) = callback(ActionableOptions {
            display_args_to_stdout: true,
            ..Default::default()
        });
        let secret = Task::new("install", "package")
            .with_args(args)
            .with_no_log(true);
        cb.render(CallbackEvent::RunnerOnOk {
            result: changed_result(&secret, "web1"),
        });
        assert!(out.contents().contains("TASK [install]"));
        assert!(!out.contents().contains("nginx"));
    }

    #[test]
    fn unchanged_ok_is_fully_suppressed_by_default() {
        let (cb, out, err) = callback(ActionableOptions::default());
        let task = Task::new("t", "command");
        let result = TaskResult::new(task, Host::new("web1"))
            .with_value("changed", json!(false))
            .with_value("warnings", json!(["should not appear"]));

        cb.render(CallbackEvent::RunnerOnOk { result });
        assert!(out.contents().is_empty());
        assert!(err.contents().is_empty());
    }

    #[test]
    fn immediate_banner_when_both_display_filters_are_off() {
        let (cb, out, _) = callback(ActionableOptions {
            display_ok_hosts: true,
            display_skipped_hosts: true,
            ..Default::default()
        });
        let task = Task::new("t", "command");
        cb.render(CallbackEvent::PlaybookOnTaskStart {
            task,
            is_conditional: false,
        });
        assert!(out.contents().contains("TASK [t]"));
    }

    #[test]
    fn exception_teaser_keeps_key_full_traceback_consumes_it() {
        let (cb, _, _) = callback(ActionableOptions::default());
        let mut payload = json!({"exception": "Trace\nlast line here"})
            .as_object()
            .unwrap()
            .clone();
        cb.handle_exception(&mut payload, false);
        assert!(payload.contains_key("exception"));

        let (cb, out, _) = callback(ActionableOptions::default().with_verbosity(3));
        cb.handle_exception(&mut payload, false);
        assert!(!payload.contains_key("exception"));
        assert!(out.contents().contains("The full traceback is:\nTrace\nlast line here"));
    }

    #[test]
    fn delegated_host_label_shows_both_ends() {
        let (cb, _, _) = callback(ActionableOptions::default());
        let task = Task::new("t", "command").with_delegate_to("proxy1");
        let result = TaskResult::new(task, Host::new("web1"));
        assert_eq!(cb.host_label(&result), "web1 -> proxy1");

        let task = Task::new("t", "command").with_delegate_to("web1");
        let result = TaskResult::new(task, Host::new("web1"));
        assert_eq!(cb.host_label(&result), "web1");
    }

    #[test]
    fn verbose_check_honors_payload_overrides() {
        let (cb, _, _) = callback(ActionableOptions::default());
        let always = json!({"_verbose_always": true}).as_object().unwrap().clone();
        let muted = json!({"_verbose_always": true, "_verbose_override": true})
            .as_object()
            .unwrap()
            .clone();
        let plain = JsonMap::new();

        assert!(cb.run_is_verbose(&always, 0));
        assert!(!cb.run_is_verbose(&muted, 0));
        assert!(!cb.run_is_verbose(&plain, 0));

        let (cb, _, _) = callback(ActionableOptions::default().with_verbosity(1));
        assert!(cb.run_is_verbose(&plain, 0));
        assert!(!cb.run_is_verbose(&plain, 2));
    }
}

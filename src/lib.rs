//! # Actionable - An Event-Driven Callback for Actionable Output
//!
//! Actionable is a console output formatter ("stdout callback") for
//! automation-orchestration runtimes. The runtime executes a declarative
//! sequence of tasks against remote hosts and dispatches lifecycle events;
//! this crate turns those events into human-readable status lines with one
//! defining policy: **only display results an operator has to act on** -
//! tasks that changed something or failed. Unchanged-ok results and skipped
//! hosts stay silent unless explicitly re-enabled.
//!
//! ## Event Flow
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────┐
//! │                     Orchestration Runtime                            │
//! │      (task execution, host connections, result collection)           │
//! └─────────────────────────────────────────────────────────────────────┘
//!                                 │
//!                       CallbackEvent (one at a time)
//!                                 ▼
//! ┌─────────────────────────────────────────────────────────────────────┐
//! │                      ActionableCallback                              │
//! │   banner dedup state · suppression filters · sanitization · diffs    │
//! └─────────────────────────────────────────────────────────────────────┘
//!                                 │
//!                        formatted lines
//!                                 ▼
//!                         stdout / stderr
//! ```
//!
//! The callback itself executes nothing and owns no results: tasks, hosts,
//! and payloads arrive fully computed. Its state is three small caches
//! used solely to avoid reprinting task banners.
//!
//! ## Quick Example
//!
//! ```rust
//! use actionable::prelude::*;
//! use serde_json::json;
//!
//! let callback = ActionableCallback::new(ActionableOptions::default());
//!
//! let task = Task::new("Install nginx", "package");
//! callback.render(CallbackEvent::PlaybookOnTaskStart {
//!     task: task.clone(),
//!     is_conditional: false,
//! });
//!
//! // Unchanged result: suppressed entirely under default options.
//! let quiet = TaskResult::new(task.clone(), Host::new("web1"));
//! callback.render(CallbackEvent::RunnerOnOk { result: quiet });
//!
//! // Changed result: banner plus a "changed" line.
//! let changed = TaskResult::new(task, Host::new("web2"))
//!     .with_value("changed", json!(true));
//! callback.render(CallbackEvent::RunnerOnOk { result: changed });
//! ```
//!
//! ## Display Options
//!
//! [`ActionableOptions`](config::ActionableOptions) is resolved once at
//! startup (defaults, then an optional TOML/YAML/JSON file, then
//! `ACTIONABLE_*` environment variables) and handed to the renderer as an
//! immutable struct. See the [`config`] module for the full option list.

#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod actionable;
pub mod config;
pub mod diff;
pub mod display;
pub mod error;
pub mod sanitize;
pub mod types;

pub use crate::actionable::ActionableCallback;
pub use crate::config::ActionableOptions;
pub use crate::display::Display;
pub use crate::error::{Error, Result};
pub use crate::types::{CallbackEvent, Host, HostState, RunTally, Task, TaskResult};

pub mod prelude {
    //! Convenient re-exports of commonly used types.
    //!
    //! # Example
    //!
    //! ```rust
    //! use actionable::prelude::*;
    //!
    //! let callback = ActionableCallback::new(ActionableOptions::default());
    //! let task = Task::new("Install nginx", "package");
    //! callback.render(CallbackEvent::PlaybookOnTaskStart {
    //!     task,
    //!     is_conditional: false,
    //! });
    //! ```

    pub use crate::actionable::ActionableCallback;
    pub use crate::config::ActionableOptions;
    pub use crate::display::Display;
    pub use crate::error::{Error, Result};
    pub use crate::types::{CallbackEvent, Host, HostState, RunTally, Task, TaskResult};
}

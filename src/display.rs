//! Terminal output layer.
//!
//! One [`Display`] owns the two output sinks for a run. By default they are
//! the process stdout/stderr; tests inject shared capture buffers instead.
//! Every line is written and flushed as its own unit, and write failures
//! are swallowed: if the console is gone there is nobody left to tell.

use std::collections::HashSet;
use std::io::{self, Write};

use colored::{Color, Colorize};
use is_terminal::IsTerminal;
use parking_lot::Mutex;

use crate::config::ActionableOptions;

/// Output width for banner padding (the conventional console width).
pub const OUTPUT_WIDTH: usize = 80;

// ============================================================================
// Palette
// ============================================================================

/// Color for unchanged-ok result lines.
pub const COLOR_OK: Color = Color::Green;
/// Color for changed result lines.
pub const COLOR_CHANGED: Color = Color::Yellow;
/// Color for failures.
pub const COLOR_ERROR: Color = Color::Red;
/// Color for unreachable hosts.
pub const COLOR_UNREACHABLE: Color = Color::BrightRed;
/// Color for skip notices ("...ignoring").
pub const COLOR_SKIP: Color = Color::Cyan;
/// Color for debug/retry lines.
pub const COLOR_DEBUG: Color = Color::BrightBlack;
/// Color for warnings.
pub const COLOR_WARN: Color = Color::Magenta;
/// Color for added diff lines.
pub const COLOR_DIFF_ADD: Color = Color::Green;
/// Color for removed diff lines.
pub const COLOR_DIFF_REMOVE: Color = Color::Red;
/// Color for diff hunk headers.
pub const COLOR_DIFF_META: Color = Color::Cyan;

// ============================================================================
// Display
// ============================================================================

/// The console sink pair used by the callback.
pub struct Display {
    stdout: Mutex<Box<dyn Write + Send>>,
    stderr: Mutex<Box<dyn Write + Send>>,
    use_color: bool,
    verbosity: u8,
    /// Warning texts already shown; repeats are dropped for the run.
    seen_warnings: Mutex<HashSet<String>>,
}

impl std::fmt::Debug for Display {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Display")
            .field("use_color", &self.use_color)
            .field("verbosity", &self.verbosity)
            .finish_non_exhaustive()
    }
}

impl Display {
    /// Create a display writing to the process stdout/stderr.
    ///
    /// Colors are enabled only when the options ask for them, `NO_COLOR`
    /// is unset, and stdout is a terminal.
    #[must_use]
    pub fn new(options: &ActionableOptions) -> Self {
        let use_color = options.use_colors
            && std::env::var("NO_COLOR").is_err()
            && io::stdout().is_terminal();

        Self::from_parts(
            Box::new(io::stdout()),
            Box::new(io::stderr()),
            use_color,
            options.verbosity,
        )
    }

    /// Create a display writing to injected sinks (the test seam).
    ///
    /// Color gating is not re-derived from the environment here; the caller
    /// decides, since the sinks are not terminals.
    #[must_use]
    pub fn with_sinks(
        options: &ActionableOptions,
        stdout: Box<dyn Write + Send>,
        stderr: Box<dyn Write + Send>,
    ) -> Self {
        Self::from_parts(stdout, stderr, options.use_colors, options.verbosity)
    }

    fn from_parts(
        stdout: Box<dyn Write + Send>,
        stderr: Box<dyn Write + Send>,
        use_color: bool,
        verbosity: u8,
    ) -> Self {
        Self {
            stdout: Mutex::new(stdout),
            stderr: Mutex::new(stderr),
            use_color,
            verbosity,
            seen_warnings: Mutex::new(HashSet::new()),
        }
    }

    /// Whether colored output is enabled.
    #[must_use]
    pub fn use_color(&self) -> bool {
        self.use_color
    }

    /// Current verbosity level (0-4).
    #[must_use]
    pub fn verbosity(&self) -> u8 {
        self.verbosity
    }

    /// Write one line, optionally colorized, to stdout or stderr.
    pub fn display(&self, msg: &str, color: Option<Color>, stderr: bool) {
        let line = match color {
            Some(c) if self.use_color => msg.color(c).to_string(),
            _ => msg.to_string(),
        };

        let mut sink = if stderr {
            self.stderr.lock()
        } else {
            self.stdout.lock()
        };
        let _ = writeln!(sink, "{line}");
        let _ = sink.flush();
    }

    /// Print a banner line: the message padded with `*` to the output
    /// width, preceded by a blank line.
    pub fn banner(&self, msg: &str) {
        let padding = OUTPUT_WIDTH.saturating_sub(msg.len() + 1).max(3);
        let stars = "*".repeat(padding);

        let line = if self.use_color {
            format!("{} {}", msg.bright_white().bold(), stars.bright_black())
        } else {
            format!("{msg} {stars}")
        };

        let mut sink = self.stdout.lock();
        let _ = writeln!(sink);
        let _ = writeln!(sink, "{line}");
        let _ = sink.flush();
    }

    /// Print a `[WARNING]:` line on stderr, once per distinct text.
    pub fn warning(&self, msg: &str) {
        if !self.seen_warnings.lock().insert(msg.to_string()) {
            return;
        }
        self.display(&format!("[WARNING]: {msg}"), Some(COLOR_WARN), true);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::RwLock;
    use std::sync::Arc;

    /// Shared buffer standing in for a console stream.
    #[derive(Debug, Clone, Default)]
    struct CaptureBuffer {
        inner: Arc<RwLock<Vec<u8>>>,
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

    fn capture_display(use_colors: bool) -> (Display, CaptureBuffer, CaptureBuffer) {
        let out = CaptureBuffer::default();
        let err = CaptureBuffer::default();
        let options = ActionableOptions {
            use_colors,
            ..Default::default()
        };
        let display = Display::with_sinks(&options, Box::new(out.clone()), Box::new(err.clone()));
        (display, out, err)
    }

    #[test]
    fn display_routes_to_the_requested_stream() {
        let (display, out, err) = capture_display(false);

        display.display("to stdout", None, false);
        display.display("to stderr", None, true);

        assert_eq!(out.contents(), "to stdout\n");
        assert_eq!(err.contents(), "to stderr\n");
    }

    #[test]
    fn banner_pads_to_output_width() {
        let (display, out, _) = capture_display(false);

        display.banner("TASK [install nginx]");
        let line = out.contents().lines().nth(1).unwrap().to_string();
        assert_eq!(line.len(), OUTPUT_WIDTH);
        assert!(line.starts_with("TASK [install nginx] **"));
        assert!(line.ends_with('*'));
    }

    #[test]
    fn oversized_banner_keeps_minimum_stars() {
        let (display, out, _) = capture_display(false);

        let long = "T".repeat(OUTPUT_WIDTH + 10);
        display.banner(&long);
        let line = out.contents().lines().nth(1).unwrap().to_string();
        assert!(line.ends_with(" ***"));
    }

    #[test]
    fn colored_lines_carry_ansi_codes() {
        let (display, out, _) = capture_display(true);
        colored::control::set_override(true);

        display.display("changed: [web1]", Some(COLOR_CHANGED), false);
        assert!(out.contents().contains("\x1b["));

        colored::control::unset_override();
    }

    #[test]
    fn warnings_go_to_stderr_and_dedup() {
        let (display, out, err) = capture_display(false);

        display.warning("deprecated module");
        display.warning("deprecated module");
        display.warning("another thing");

        assert!(out.contents().is_empty());
        let text = err.contents();
        assert_eq!(text.matches("[WARNING]: deprecated module").count(), 1);
        assert_eq!(text.matches("[WARNING]: another thing").count(), 1);
    }
}

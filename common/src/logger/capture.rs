use std::collections::VecDeque;
use std::fmt::{self, Write as _};
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::field::{Field, Visit};
use tracing::{Event, Level, Subscriber};
use tracing_subscriber::layer::{Context, Layer};

const DEFAULT_MAX_LINES: usize = 2_000;

/// In-memory copy of the INFO-and-above log lines of a run.
///
/// Cloning is cheap; all clones share the same buffer. The buffer is bounded,
/// oldest lines are dropped first.
#[derive(Clone)]
pub struct LogCapture {
    lines: Arc<Mutex<VecDeque<String>>>,
    max_lines: usize,
}

impl Default for LogCapture {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_LINES)
    }
}

impl LogCapture {
    pub fn new(max_lines: usize) -> Self {
        Self {
            lines: Arc::new(Mutex::new(VecDeque::new())),
            max_lines: max_lines.max(1),
        }
    }

    pub fn lines(&self) -> Vec<String> {
        self.lines.lock().iter().cloned().collect()
    }

    pub fn contents(&self) -> String {
        let g = self.lines.lock();
        let mut out = String::new();
        for line in g.iter() {
            out.push_str(line);
            out.push('\n');
        }
        out
    }

    /// Last `max_chars` characters of the log, cut on a char boundary.
    pub fn tail(&self, max_chars: usize) -> String {
        let all = self.contents();
        let count = all.chars().count();
        if count <= max_chars {
            return all;
        }
        all.chars().skip(count - max_chars).collect()
    }

    /// Appends a line directly, bypassing the subscriber.
    pub fn push(&self, line: String) {
        let mut g = self.lines.lock();
        if g.len() >= self.max_lines {
            g.pop_front();
        }
        g.push_back(line);
    }
}

#[derive(Default)]
struct LineVisitor {
    message: String,
    fields: String,
}

impl LineVisitor {
    fn push_field(&mut self, name: &str, value: fmt::Arguments<'_>) {
        let _ = write!(self.fields, " {name}={value}");
    }
}

impl Visit for LineVisitor {
    fn record_str(&mut self, field: &Field, value: &str) {
        if field.name() == "message" {
            self.message.push_str(value);
        } else {
            self.push_field(field.name(), format_args!("{value}"));
        }
    }

    fn record_debug(&mut self, field: &Field, value: &dyn fmt::Debug) {
        if field.name() == "message" {
            let _ = write!(self.message, "{value:?}");
        } else {
            self.push_field(field.name(), format_args!("{value:?}"));
        }
    }
}

impl<S: Subscriber> Layer<S> for LogCapture {
    fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
        let level = *event.metadata().level();
        if level > Level::INFO {
            return;
        }

        let mut visitor = LineVisitor::default();
        event.record(&mut visitor);

        let ts = chrono::Local::now().format("%Y-%m-%d %H:%M:%S%.3f");
        self.push(format!(
            "[{ts}] {level:>5} {}{}",
            visitor.message, visitor.fields
        ));
    }
}

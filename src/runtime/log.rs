/// Log conduit from the background tasks to the foreground
///
/// Every line carries a [`LogTag`] set by the code that emits it, so the
/// renderer never has to guess a category from the text. Lines are queued on
/// an unbounded channel: rendering may lag behind, but nothing is dropped.
use crossbeam_channel::{unbounded, Receiver, Sender};
use std::fmt;
use std::time::SystemTime;

const LOG_TARGET_BOT: &str = "encounter_scout::bot";

/// Category of a log line, used by the renderer for styling
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LogTag {
    Info,
    Success,
    Warning,
    Error,
    Fatal,
    Action,
    Scan,
    Status,
}

impl LogTag {
    /// Bracketed label shown in front of the message
    pub fn label(&self) -> &'static str {
        match self {
            LogTag::Info => "INFO",
            LogTag::Success => "SUCCESS",
            LogTag::Warning => "WARNING",
            LogTag::Error => "ERROR",
            LogTag::Fatal => "FATAL_ERROR",
            LogTag::Action => "ACTION",
            LogTag::Scan => "SCAN",
            LogTag::Status => "STATUS",
        }
    }
}

impl fmt::Display for LogTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}]", self.label())
    }
}

/// A single rendered line
#[derive(Debug, Clone, PartialEq)]
pub struct LogLine {
    pub tag: LogTag,
    pub message: String,
    pub at: SystemTime,
}

impl fmt::Display for LogLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.tag, self.message)
    }
}

/// Receiving end of the conduit, owned by the foreground
pub struct LogConduit {
    sender: Sender<LogLine>,
    receiver: Receiver<LogLine>,
}

impl LogConduit {
    pub fn new() -> Self {
        let (sender, receiver) = unbounded();
        Self { sender, receiver }
    }

    /// Handle for emitting lines from any thread
    pub fn logger(&self) -> BotLog {
        BotLog {
            sender: Some(self.sender.clone()),
        }
    }

    /// Take every line queued so far, oldest first
    pub fn drain(&self) -> Vec<LogLine> {
        self.receiver.try_iter().collect()
    }
}

impl Default for LogConduit {
    fn default() -> Self {
        Self::new()
    }
}

/// Cloneable emitter handed to background tasks.
///
/// Each line also goes to `tracing` so the rolling log file keeps a copy.
#[derive(Clone, Default)]
pub struct BotLog {
    sender: Option<Sender<LogLine>>,
}

impl BotLog {
    /// Logger that only writes to `tracing`
    pub fn detached() -> Self {
        Self { sender: None }
    }

    pub fn emit(&self, tag: LogTag, message: impl Into<String>) {
        let message = message.into();

        match tag {
            LogTag::Fatal | LogTag::Error => {
                tracing::error!(target: LOG_TARGET_BOT, "{} {}", tag, message)
            }
            LogTag::Warning => tracing::warn!(target: LOG_TARGET_BOT, "{} {}", tag, message),
            LogTag::Scan => tracing::debug!(target: LOG_TARGET_BOT, "{} {}", tag, message),
            _ => tracing::info!(target: LOG_TARGET_BOT, "{} {}", tag, message),
        }

        if let Some(sender) = &self.sender {
            // Receiver gone means the foreground shut down; tracing already has the line
            let _ = sender.send(LogLine {
                tag,
                message,
                at: SystemTime::now(),
            });
        }
    }

    pub fn info(&self, message: impl Into<String>) {
        self.emit(LogTag::Info, message);
    }

    pub fn success(&self, message: impl Into<String>) {
        self.emit(LogTag::Success, message);
    }

    pub fn warning(&self, message: impl Into<String>) {
        self.emit(LogTag::Warning, message);
    }

    pub fn error(&self, message: impl Into<String>) {
        self.emit(LogTag::Error, message);
    }

    pub fn fatal(&self, message: impl Into<String>) {
        self.emit(LogTag::Fatal, message);
    }

    pub fn action(&self, message: impl Into<String>) {
        self.emit(LogTag::Action, message);
    }

    pub fn scan(&self, message: impl Into<String>) {
        self.emit(LogTag::Scan, message);
    }

    pub fn status(&self, message: impl Into<String>) {
        self.emit(LogTag::Status, message);
    }
}

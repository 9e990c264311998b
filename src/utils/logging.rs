use std::io::Write;

/// Target used for messages that are already formatted for the console
pub const CONSOLE_TARGET: &str = "hdr_nightmode::console";

/// Log levels for console messages
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum LogLevel {
    Error,
    Warning,
    Info,
    Debug,
    Success,
}

impl LogLevel {
    fn as_tag(&self) -> &'static str {
        match self {
            LogLevel::Error => "error",
            LogLevel::Warning => "warn",
            LogLevel::Info => "info",
            LogLevel::Debug => "debug",
            LogLevel::Success => "success",
        }
    }

    fn as_log_level(&self) -> log::Level {
        match self {
            LogLevel::Error => log::Level::Error,
            LogLevel::Warning => log::Level::Warn,
            LogLevel::Info | LogLevel::Success => log::Level::Info,
            LogLevel::Debug => log::Level::Debug,
        }
    }
}

impl From<log::Level> for LogLevel {
    fn from(level: log::Level) -> Self {
        match level {
            log::Level::Error => LogLevel::Error,
            log::Level::Warn => LogLevel::Warning,
            log::Level::Info => LogLevel::Info,
            log::Level::Debug | log::Level::Trace => LogLevel::Debug,
        }
    }
}

/// Builder for creating formatted log messages
pub struct LogMessage {
    level: LogLevel,
    context: Option<String>,
    message: String,
}

impl LogMessage {
    /// Create a new log message with the specified level
    pub fn new(level: LogLevel, message: impl Into<String>) -> Self {
        Self {
            level,
            context: None,
            message: message.into(),
        }
    }

    /// Add context to the log message (e.g., "fusion", "denoise")
    pub fn with_context(mut self, context: impl Into<String>) -> Self {
        self.context = Some(context.into());
        self
    }

    fn format_for_console(&self) -> String {
        match &self.context {
            Some(ctx) => format!("[{}][{}] {}", self.level.as_tag(), ctx, self.message),
            None => format!("[{}] {}", self.level.as_tag(), self.message),
        }
    }

    /// Hand the message to the `log` facade
    pub fn send(self) {
        log::log!(
            target: CONSOLE_TARGET,
            self.level.as_log_level(),
            "{}",
            self.format_for_console()
        );
    }
}

pub fn error_ctx(context: &str, message: impl Into<String>) {
    LogMessage::new(LogLevel::Error, message).with_context(context).send();
}

pub fn warn_ctx(context: &str, message: impl Into<String>) {
    LogMessage::new(LogLevel::Warning, message).with_context(context).send();
}

pub fn info_ctx(context: &str, message: impl Into<String>) {
    LogMessage::new(LogLevel::Info, message).with_context(context).send();
}

pub fn success_ctx(context: &str, message: impl Into<String>) {
    LogMessage::new(LogLevel::Success, message).with_context(context).send();
}

pub fn debug_ctx(context: &str, message: impl Into<String>) {
    LogMessage::new(LogLevel::Debug, message).with_context(context).send();
}

/// Maps `-v` repetitions to a level filter: 0 = info, 1 = debug, 2+ = trace
pub fn level_for_verbosity(verbosity: u8) -> log::LevelFilter {
    match verbosity {
        0 => log::LevelFilter::Info,
        1 => log::LevelFilter::Debug,
        _ => log::LevelFilter::Trace,
    }
}

/// Installs the env_logger backend. `RUST_LOG` takes precedence over `verbosity`.
pub fn init_logging(verbosity: u8) -> anyhow::Result<()> {
    let mut builder = env_logger::Builder::new();
    builder.filter_level(level_for_verbosity(verbosity));
    if let Ok(spec) = std::env::var("RUST_LOG") {
        builder.parse_filters(&spec);
    }
    builder
        .format(|buf, record| {
            if record.target() == CONSOLE_TARGET {
                writeln!(buf, "{}", record.args())
            } else {
                let module = record.target().rsplit("::").next().unwrap_or(record.target());
                writeln!(
                    buf,
                    "[{}][{}] {}",
                    LogLevel::from(record.level()).as_tag(),
                    module,
                    record.args()
                )
            }
        })
        .try_init()?;
    Ok(())
}

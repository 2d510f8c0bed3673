//! Leveled, timestamped process logging: four levels, each with its own
//! single-character glyph. The sink (stdout vs a configured file) and
//! verbosity gate live behind a process-wide `Lazy<RwLock<_>>` rather than
//! being threaded through every call site.

use std::fmt;
use std::fs::OpenOptions;
use std::io::Write;
use std::str::FromStr;
use std::sync::RwLock;

use once_cell::sync::Lazy;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum LogLevel {
    Debug,
    Verbose,
    Notice,
    Warning,
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let ch = match self {
            LogLevel::Debug => '.',
            LogLevel::Verbose => '-',
            LogLevel::Notice => '*',
            LogLevel::Warning => '#',
        };
        write!(f, "{ch}")
    }
}

impl FromStr for LogLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "debug" => Ok(LogLevel::Debug),
            "verbose" => Ok(LogLevel::Verbose),
            "notice" => Ok(LogLevel::Notice),
            "warning" => Ok(LogLevel::Warning),
            other => Err(format!("unknown log verbosity '{other}'")),
        }
    }
}

struct LogState {
    verbosity: LogLevel,
    log_file: String,
}

static LOG_STATE: Lazy<RwLock<LogState>> = Lazy::new(|| {
    RwLock::new(LogState {
        verbosity: LogLevel::Notice,
        log_file: String::new(),
    })
});

/// Install the sink/verbosity a loaded `Config` specifies. Call once at
/// startup before the first `log()` call that should honor it.
pub fn init(verbosity: LogLevel, log_file: &str) {
    let mut state = LOG_STATE.write().unwrap();
    state.verbosity = verbosity;
    state.log_file = log_file.to_string();
}

pub fn log(level: LogLevel, body: &str) {
    let state = LOG_STATE.read().unwrap();
    if level < state.verbosity {
        return;
    }

    let now = chrono::Local::now().format("%d %b %H:%M:%S%.3f");
    let line = format!("{} {} {} {}\n", std::process::id(), now, level, body);

    if state.log_file.is_empty() {
        let _ = std::io::stdout().write_all(line.as_bytes());
    } else if let Ok(mut f) = OpenOptions::new().create(true).append(true).open(&state.log_file) {
        let _ = f.write_all(line.as_bytes());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn level_ordering_gates_correctly() {
        assert!(LogLevel::Debug < LogLevel::Verbose);
        assert!(LogLevel::Verbose < LogLevel::Notice);
        assert!(LogLevel::Notice < LogLevel::Warning);
    }

    #[test]
    fn parses_from_conf_directive_text() {
        assert_eq!("debug".parse::<LogLevel>().unwrap(), LogLevel::Debug);
        assert_eq!("WARNING".parse::<LogLevel>().unwrap(), LogLevel::Warning);
        assert!("nonsense".parse::<LogLevel>().is_err());
    }

    #[test]
    fn glyphs_match_teacher_convention() {
        assert_eq!(LogLevel::Debug.to_string(), ".");
        assert_eq!(LogLevel::Verbose.to_string(), "-");
        assert_eq!(LogLevel::Notice.to_string(), "*");
        assert_eq!(LogLevel::Warning.to_string(), "#");
    }
}

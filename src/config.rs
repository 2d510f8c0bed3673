//! Configuration loading: whitespace-separated directives, one per line,
//! `#` comments and blank lines skipped, first token is the directive
//! name. There are few enough knobs that one small match arm per
//! directive is still the whole function.

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::process::exit;

use crate::log::LogLevel;

pub const DEFAULT_PORT: u16 = 9001;
pub const DEFAULT_CAPACITY: usize = 1000;
pub const DEFAULT_FILTER_BITS: usize = 10_000;
pub const DEFAULT_DB_FILENAME: &str = "blinkdb_data.txt";

#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    pub capacity: usize,
    pub filter_bits: usize,
    pub db_filename: String,
    pub log_file: String,
    pub verbosity: LogLevel,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            port: DEFAULT_PORT,
            capacity: DEFAULT_CAPACITY,
            filter_bits: DEFAULT_FILTER_BITS,
            db_filename: DEFAULT_DB_FILENAME.to_string(),
            log_file: String::new(),
            verbosity: LogLevel::Notice,
        }
    }
}

impl Config {
    /// Load directives from `path`, applying them on top of the defaults.
    /// A missing file, a bad value, or an unknown directive is a fatal
    /// config-file error.
    pub fn load_from_file(path: &str) -> Config {
        let mut cfg = Config::default();

        let file = File::open(path).unwrap_or_else(|e| {
            eprintln!("*** FATAL CONFIG FILE ERROR ***");
            eprintln!("Can't open config file '{path}': {e}");
            exit(1);
        });

        let fatal = |err: &str, line: &str, line_num: usize| -> ! {
            eprintln!("*** FATAL CONFIG FILE ERROR ***");
            eprintln!("Reading the configuration file, at line {line_num}");
            eprintln!(">>> '{line}'");
            eprintln!("{err}");
            exit(1);
        };

        let reader = BufReader::new(file);
        for (line_num, line) in reader.lines().enumerate() {
            let line_num = line_num + 1;
            let line = match line {
                Ok(l) => l,
                Err(e) => fatal(&e.to_string(), "<unreadable line>", line_num),
            };
            let trimmed = line.trim();
            if trimmed.is_empty() || trimmed.starts_with('#') {
                continue;
            }

            let argv: Vec<&str> = trimmed.split_whitespace().collect();
            match (argv[0].to_ascii_lowercase().as_str(), argv.len()) {
                ("port", 2) => match argv[1].parse() {
                    Ok(p) => cfg.port = p,
                    Err(e) => fatal(&e.to_string(), trimmed, line_num),
                },
                ("capacity", 2) => match argv[1].parse() {
                    Ok(c) => cfg.capacity = c,
                    Err(e) => fatal(&e.to_string(), trimmed, line_num),
                },
                ("filterbits", 2) => match argv[1].parse() {
                    Ok(b) => cfg.filter_bits = b,
                    Err(e) => fatal(&e.to_string(), trimmed, line_num),
                },
                ("dbfilename", 2) => cfg.db_filename = argv[1].to_string(),
                ("logfile", 2) => cfg.log_file = argv[1].to_string(),
                ("verbosity", 2) => match argv[1].parse::<LogLevel>() {
                    Ok(v) => cfg.verbosity = v,
                    Err(e) => fatal(&e, trimmed, line_num),
                },
                (name, _) => fatal(&format!("unknown or malformed directive '{name}'"), trimmed, line_num),
            }
        }

        cfg
    }
}

/// Convenience used by `main` when no config path was given: defaults only.
pub fn default_config_with_warning(log: impl Fn(LogLevel, &str)) -> Config {
    log(
        LogLevel::Warning,
        "no config file specified, using the default config. In order to specify a config file use './blinkdb-server /path/to/blinkdb.conf'",
    );
    Config::default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn defaults_match_spec() {
        let cfg = Config::default();
        assert_eq!(cfg.port, 9001);
        assert_eq!(cfg.capacity, 1000);
        assert_eq!(cfg.filter_bits, 10_000);
        assert_eq!(cfg.db_filename, "blinkdb_data.txt");
    }

    #[test]
    fn parses_directives_and_skips_comments() {
        let dir = std::env::temp_dir().join(format!("blinkdb_test_conf_{}", std::process::id()));
        let mut f = File::create(&dir).unwrap();
        writeln!(f, "# a comment\n\nport 7000\ncapacity 5\nverbosity debug").unwrap();
        drop(f);

        let cfg = Config::load_from_file(dir.to_str().unwrap());
        assert_eq!(cfg.port, 7000);
        assert_eq!(cfg.capacity, 5);
        assert_eq!(cfg.verbosity, LogLevel::Debug);

        let _ = std::fs::remove_file(dir);
    }
}

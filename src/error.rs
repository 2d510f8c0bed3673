//! `WrongType` crosses the engine/dispatcher boundary as a value, never as
//! a panic or unwind. Bad arguments never reach the engine at all (the
//! dispatcher catches them first); I/O and startup failures are logged and
//! handled at the process boundary in `main.rs`.

use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineError {
    WrongType,
}

impl fmt::Display for EngineError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EngineError::WrongType => {
                write!(f, "WRONGTYPE Operation against a key holding the wrong kind of value")
            }
        }
    }
}

impl std::error::Error for EngineError {}

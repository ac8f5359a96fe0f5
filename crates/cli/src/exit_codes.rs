//! CLI Exit Code Registry
//!
//! Single source of truth for `tlens` exit codes. Scripts rely on them.
//!
//! | Code | Meaning                                              |
//! |------|------------------------------------------------------|
//! | 0    | Success                                              |
//! | 1    | General error (provider reported a failure, I/O)     |
//! | 2    | Usage error (bad arguments, invalid user input)      |
//! | 3    | Parse error (malformed JSON, unknown message)        |
//! | 4    | Precondition violated (engine invariant broken)      |

use tensorlens_engine::EngineError;

/// Command completed without errors.
pub const EXIT_SUCCESS: u8 = 0;

/// General error.
pub const EXIT_ERROR: u8 = 1;

/// Bad arguments, or input the engine rejected as user error.
pub const EXIT_USAGE: u8 = 2;

/// Input could not be decoded (JSON, protocol messages, replay scripts).
pub const EXIT_PARSE: u8 = 3;

/// An engine precondition was violated.
pub const EXIT_PRECONDITION: u8 = 4;

/// Map an engine error to its exit code.
pub fn engine_exit_code(err: &EngineError) -> u8 {
    match err {
        EngineError::UserInput(_) => EXIT_USAGE,
        EngineError::Source(_) => EXIT_ERROR,
        EngineError::Precondition(_) => EXIT_PRECONDITION,
        EngineError::Transport(_) => EXIT_PARSE,
    }
}

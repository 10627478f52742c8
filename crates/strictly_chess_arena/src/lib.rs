//! Strictly Chess arena - runs matches against a real engine
//!
//! Hosts a [`strictly_chess::MatchOrchestrator`] on a single tokio task,
//! wiring its commands to timers and to a [`SearchEngine`]: either a UCI
//! subprocess or the built-in random mover.

#![warn(missing_docs)]
#![forbid(unsafe_code)]

// Private module declarations
mod builtin;
mod config;
mod console;
mod driver;
mod logging;
mod search_engine;
mod uci_process;

// Crate-level exports - Configuration
pub use config::{
    ArenaConfig, ConfigError, ConfigOverrides, ConfigSource, TimeSetting, BUILTIN_ENGINE,
    DEFAULT_CONFIG_FILE,
};

// Crate-level exports - Engines
pub use builtin::{choose_move, SimpleEngine};
pub use search_engine::{ResponseReceiver, ResponseSender, SearchEngine};
pub use uci_process::{tag_message, UciEngine};

// Crate-level exports - Driver and console
pub use console::{
    describe_event, parse_command, print_events, render_board, run_console, CommandError,
    ConsoleCommand, HELP,
};
pub use driver::{InputSender, MatchDriver, UserInput};

// Crate-level exports - Logging
pub use logging::init_file_tracing;

//! hdist launcher
//!
//! A single executable installed under many symlinked names. Each invocation
//! works out which program the caller meant, interprets that program's
//! shebang itself, and replaces the process with the result.
//!
//! ## Architecture
//!
//! The launcher works by:
//! 1. Locating itself from `argv[0]`, searching `PATH` for bare names
//! 2. Walking the symlink chain to the last link before the launcher binary,
//!    noting the first directory holding an `is-profile-bin` marker
//! 3. Reading `<link>.link`, or falling back to `<link>.real`, to find the program
//! 4. Expanding `${ORIGIN}` and `${PROFILE_BIN_DIR}` in the program's shebang
//!    and trying each `:`-separated interpreter with `execv`
//!
//! Set `HDIST_LAUNCHER_DEBUG=1` to trace every step on stderr.
//!
//! ## Usage
//!
//! ```rust,no_run
//! fn main() -> std::process::ExitCode {
//!     hdist_launcher::main_entry()
//! }
//! ```

pub use context::LaunchContext;
pub use error::{Failure, LaunchError, ShebangError};
pub use exec::{main_entry, run_launcher, run_with, Execv, ProcessImage};

pub mod bounded;
pub mod chain;
pub mod context;
pub mod error;
pub mod exec;
pub mod indirection;
pub mod logger;
pub mod resolver;
pub mod shebang;

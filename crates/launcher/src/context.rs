//! Launch context and environment detection
//!
//! Everything the launcher reads from its process environment is captured
//! here once, at start-up, so the resolution steps work on plain values.

use crate::bounded::{BoundedPath, SEPARATOR};
use crate::error::{LaunchError, Result};
use crate::resolver::find_in_path;
use std::env;
use std::ffi::OsString;
use std::os::unix::ffi::OsStrExt;

/// Environment variable names read by the launcher
pub const DEBUG_VAR: &str = "HDIST_LAUNCHER_DEBUG"; // "1" enables debug lines on stderr
pub const LOG_FILTER_VAR: &str = "HDIST_LAUNCHER_LOG"; // EnvFilter directives for debug output
pub const PATH_VAR: &str = "PATH"; // Search list for bare argv[0]

/// Inputs of one launcher invocation
#[derive(Debug, Clone)]
pub struct LaunchContext {
    /// The full argument vector, `args[0]` being the name we were invoked as
    pub args: Vec<OsString>,
    /// Search list used when `args[0]` is a bare name
    pub search_path: Option<OsString>,
    /// Whether debug output was requested
    pub debug: bool,
}

impl LaunchContext {
    /// Create context from the current process arguments and environment
    pub fn from_env() -> Self {
        Self {
            args: env::args_os().collect(),
            search_path: env::var_os(PATH_VAR),
            debug: Self::is_debug_enabled(),
        }
    }

    /// Debug output is on only for the exact value `1`.
    pub fn is_debug_enabled() -> bool {
        env::var(DEBUG_VAR).as_deref() == Ok("1")
    }

    pub fn argv0(&self) -> Result<&OsString> {
        self.args
            .first()
            .ok_or(LaunchError::Invariant("empty argument vector"))
    }

    /// The path the launcher was started through.
    ///
    /// A name with a separator is used as given. A bare name is looked up in
    /// the search list, and a match in the current directory is anchored as
    /// `./name` so the symlink walk always starts from a path with a
    /// directory component.
    pub fn invocation_path(&self) -> Result<BoundedPath> {
        let argv0 = self.argv0()?.as_bytes();
        if argv0.contains(&SEPARATOR) {
            return BoundedPath::from_bytes(argv0);
        }

        let search = self.search_path.as_ref().map(|p| p.as_bytes());
        let mut found = find_in_path(argv0, search)?;
        if !found.has_separator() {
            found.prepend("./")?;
        }
        Ok(found)
    }
}

//! Error types for launcher resolution and relaunch.
//!
//! Components return [`LaunchError`]. The orchestrator pins each error to the
//! step that produced it with [`Locate::located`], giving a [`Failure`] that
//! carries a source location for the single diagnostic line printed on exit.

use std::fmt;
use std::io;
use std::panic::Location;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum LaunchError {
    #[error("path too long (limit {capacity} bytes): {preview}")]
    PathTooLong { preview: String, capacity: usize },

    #[error("'{0}' not found in PATH")]
    NotFound(String),

    #[error("broken link file '{}': {reason}", path.display())]
    BrokenLink { path: PathBuf, reason: String },

    #[error(transparent)]
    InvalidShebang(#[from] ShebangError),

    #[error("internal invariant violated: {0}")]
    Invariant(&'static str),

    #[error("{context}: {source}")]
    Io {
        context: String,
        #[source]
        source: io::Error,
    },

    #[error("Unable to launch '{}' ({source})", program.display())]
    Unlaunchable {
        program: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Unable to launch '{}' ({})", program.display(), errno.desc())]
    Exec {
        program: PathBuf,
        errno: nix::errno::Errno,
    },
}

/// Structural problems in a shebang line.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ShebangError {
    #[error("missing interpreter after '#!'")]
    MissingInterpreter,

    #[error("shebang variables must have form ${{VARNAME}}")]
    MissingBrace,

    #[error("unterminated variable reference '${{{0}'")]
    Unterminated(String),

    #[error("variable name in shebang longer than {max} characters")]
    NameTooLong { max: usize },

    #[error("unknown variable '{0}' in shebang")]
    UnknownVariable(String),

    #[error("too long string encountered in shebang parsing")]
    TooLong,
}

pub type Result<T, E = LaunchError> = std::result::Result<T, E>;

impl LaunchError {
    pub(crate) fn io(context: impl Into<String>, source: io::Error) -> Self {
        Self::Io {
            context: context.into(),
            source,
        }
    }

    pub(crate) fn too_long(bytes: &[u8], capacity: usize) -> Self {
        const PREVIEW: usize = 64;
        let shown = &bytes[..bytes.len().min(PREVIEW)];
        let mut preview = String::from_utf8_lossy(shown).into_owned();
        if bytes.len() > PREVIEW {
            preview.push_str("...");
        }
        Self::PathTooLong { preview, capacity }
    }
}

/// A [`LaunchError`] annotated with the orchestrator step that reported it.
#[derive(Debug)]
pub struct Failure {
    pub error: LaunchError,
    pub location: &'static Location<'static>,
}

impl fmt::Display for Failure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} ({}:{})",
            self.error,
            self.location.file(),
            self.location.line()
        )
    }
}

impl std::error::Error for Failure {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&self.error)
    }
}

pub trait Locate<T> {
    fn located(self) -> Result<T, Failure>;
}

impl<T> Locate<T> for Result<T, LaunchError> {
    #[track_caller]
    fn located(self) -> Result<T, Failure> {
        let location = Location::caller();
        self.map_err(|error| Failure { error, location })
    }
}

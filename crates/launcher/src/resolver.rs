//! Bare-name resolution against a PATH-like search list.
//!
//! Used only when the launcher was started through a PATH lookup, so that the
//! symlink walk starts from the same file the shell executed.

use crate::bounded::{is_executable, path_segments, BoundedPath, PATH_MAX, SEPARATOR};
use crate::error::{LaunchError, Result};

/// Find the first executable `progname` in `search_path`.
///
/// An empty segment means the current directory and yields `progname`
/// unjoined. A candidate that does not fit in [`PATH_MAX`] aborts the search.
pub fn find_in_path(progname: &[u8], search_path: Option<&[u8]>) -> Result<BoundedPath> {
    for segment in path_segments(search_path.unwrap_or_default()) {
        let candidate = candidate_path(segment, progname)?;
        if is_executable(candidate.as_path()) {
            return Ok(candidate);
        }
    }

    Err(LaunchError::NotFound(
        String::from_utf8_lossy(progname).into_owned(),
    ))
}

fn candidate_path(segment: &[u8], progname: &[u8]) -> Result<BoundedPath> {
    let mut candidate = BoundedPath::copy_from(segment, PATH_MAX)?;
    if !segment.is_empty() {
        candidate.push([SEPARATOR])?;
    }
    candidate.push(progname)?;
    Ok(candidate)
}

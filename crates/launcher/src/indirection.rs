//! Sidecar indirection: `<link>.link` and `<link>.real`.
//!
//! A `.link` file holds a single path, absolute or relative to the directory
//! of the `.link` file. When it does not exist the program is expected next
//! to the link as `<link>.real`.

use crate::bounded::{read_first_line, BoundedPath, SEPARATOR};
use crate::error::{LaunchError, Result};
use std::fmt;
use std::io;

pub const LINK_SUFFIX: &str = ".link";
pub const REAL_SUFFIX: &str = ".real";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndirectionSource {
    LinkFile,
    RealSibling,
}

impl fmt::Display for IndirectionSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::LinkFile => LINK_SUFFIX,
            Self::RealSibling => REAL_SUFFIX,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Indirection {
    pub program: BoundedPath,
    pub source: IndirectionSource,
}

/// Determine the real program behind `final_link`.
pub fn resolve_indirection(final_link: &BoundedPath) -> Result<Indirection> {
    let link_file = final_link.with_suffix(LINK_SUFFIX)?;

    match read_link_file(&link_file) {
        Ok(program) => Ok(Indirection {
            program,
            source: IndirectionSource::LinkFile,
        }),
        Err(LaunchError::Io { source, .. }) if source.kind() == io::ErrorKind::NotFound => {
            Ok(Indirection {
                program: final_link.with_suffix(REAL_SUFFIX)?,
                source: IndirectionSource::RealSibling,
            })
        }
        Err(e) => Err(e),
    }
}

/// Read the target path stored in a `.link` file.
pub fn read_link_file(link_file: &BoundedPath) -> Result<BoundedPath> {
    let line = read_first_line(link_file.as_path(), link_file.capacity())
        .map_err(|e| LaunchError::io(format!("reading {link_file}"), e))?;
    if !line.complete {
        return Err(LaunchError::too_long(&line.content, link_file.capacity()));
    }
    if line.content.is_empty() {
        return Err(LaunchError::BrokenLink {
            path: link_file.to_path_buf(),
            reason: "empty target".into(),
        });
    }

    let mut program = BoundedPath::copy_from(&line.content, link_file.capacity())?;
    if !program.is_absolute() {
        if let Some(dir) = link_file.dir() {
            let mut prefix = dir.to_vec();
            prefix.push(SEPARATOR);
            program.prepend(prefix)?;
        }
    }
    Ok(program)
}

//! Shebang handling done by the launcher instead of the kernel.
//!
//! Interpreting the `#!` line ourselves lets the interpreter path be written
//! relative to the program (`${ORIGIN}`) or to the profile it was reached
//! through (`${PROFILE_BIN_DIR}`), and lets a line name several fallback
//! interpreters separated by `:`.

use crate::bounded::{read_first_line, trim_end_whitespace, trim_start_blanks, BoundedPath};
use crate::error::{LaunchError, Result, ShebangError};
use std::path::Path;

/// Capacity of the shebang line and of each expanded field.
pub const SHEBANG_MAX: usize = 1024;

/// Variable names must be shorter than this: 39 characters is the longest
/// accepted name.
pub const MAX_VAR_NAME_LEN: usize = 40;

/// Value substituted for a variable that does not apply to this launch.
pub const NOT_APPLICABLE: &str = "__NA__";

const MARKER: &[u8] = b"#!";

/// The closed set of variables available to shebang expansion.
#[derive(Debug, Clone, Copy)]
pub struct Variables<'a> {
    /// Directory of the canonicalized program.
    pub origin: &'a [u8],
    /// The marker directory found on the symlink chain.
    pub profile_bin_dir: &'a [u8],
}

impl Variables<'_> {
    fn lookup(&self, name: &[u8]) -> Option<&[u8]> {
        match name {
            b"ORIGIN" => Some(self.origin),
            b"PROFILE_BIN_DIR" => Some(self.profile_bin_dir),
            _ => None,
        }
    }
}

/// Raw, unexpanded fields of a `#!` line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Directive<'a> {
    pub interpreter: &'a [u8],
    pub arg: Option<&'a [u8]>,
}

/// A directive with all variables substituted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Shebang {
    pub interpreter: BoundedPath,
    pub arg: Option<BoundedPath>,
}

impl Shebang {
    /// The `:`-separated interpreter candidates, in the order to try them.
    pub fn candidates(&self) -> impl Iterator<Item = &[u8]> {
        self.interpreter.as_bytes().split(|&b| b == b':')
    }
}

/// Read the first line of `program`.
///
/// Failing to open or read the file is an error; an empty file simply has
/// an empty first line.
pub fn read_shebang_line(program: &BoundedPath) -> Result<Vec<u8>> {
    let line = read_first_line(program.as_path(), SHEBANG_MAX).map_err(|source| {
        LaunchError::Unlaunchable {
            program: program.to_path_buf(),
            source,
        }
    })?;
    if !line.complete && line.content.starts_with(MARKER) {
        return Err(ShebangError::TooLong.into());
    }
    Ok(line.content)
}

/// Split a first line into its directive, or `None` without a `#!` marker.
pub fn parse(line: &[u8]) -> Result<Option<Directive<'_>>, ShebangError> {
    let Some(rest) = line.strip_prefix(MARKER) else {
        return Ok(None);
    };
    let rest = trim_start_blanks(rest);
    let end = rest
        .iter()
        .position(|&b| matches!(b, b' ' | b'\t' | b'\n'))
        .unwrap_or(rest.len());
    let (interpreter, remainder) = rest.split_at(end);
    if interpreter.is_empty() {
        return Err(ShebangError::MissingInterpreter);
    }

    let arg = match remainder.split_first() {
        Some((_, tail)) => trim_end_whitespace(trim_start_blanks(tail)),
        None => &[][..],
    };
    Ok(Some(Directive {
        interpreter,
        arg: (!arg.is_empty()).then_some(arg),
    }))
}

impl Directive<'_> {
    pub fn expand(&self, vars: &Variables<'_>) -> Result<Shebang, ShebangError> {
        Ok(Shebang {
            interpreter: expand_vars(self.interpreter, vars)?,
            arg: self.arg.map(|arg| expand_vars(arg, vars)).transpose()?,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Literal,
    InVarName,
}

/// Substitute `${NAME}` references in `src`.
///
/// Nothing is returned on error, so a partial expansion can never be used.
pub fn expand_vars(src: &[u8], vars: &Variables<'_>) -> Result<BoundedPath, ShebangError> {
    let mut out = BoundedPath::new(SHEBANG_MAX);
    let mut name: Vec<u8> = Vec::with_capacity(MAX_VAR_NAME_LEN);
    let mut state = State::Literal;
    let mut bytes = src.iter().copied();

    while let Some(b) = bytes.next() {
        match state {
            State::Literal if b == b'$' => {
                if bytes.next() != Some(b'{') {
                    return Err(ShebangError::MissingBrace);
                }
                name.clear();
                state = State::InVarName;
            }
            State::Literal => emit(&mut out, &[b])?,
            State::InVarName if b == b'}' => {
                let value = vars.lookup(&name).ok_or_else(|| {
                    ShebangError::UnknownVariable(String::from_utf8_lossy(&name).into_owned())
                })?;
                emit(&mut out, value)?;
                state = State::Literal;
            }
            State::InVarName => {
                name.push(b);
                if name.len() >= MAX_VAR_NAME_LEN {
                    return Err(ShebangError::NameTooLong {
                        max: MAX_VAR_NAME_LEN - 1,
                    });
                }
            }
        }
    }

    if state == State::InVarName {
        return Err(ShebangError::Unterminated(
            String::from_utf8_lossy(&name).into_owned(),
        ));
    }
    Ok(out)
}

fn emit(out: &mut BoundedPath, bytes: &[u8]) -> Result<(), ShebangError> {
    out.push(bytes).map(drop).map_err(|_| ShebangError::TooLong)
}

/// Read and expand the shebang of `program`, if it has one.
pub fn load(program: &BoundedPath, vars: &Variables<'_>) -> Result<Option<Shebang>> {
    let line = read_shebang_line(program)?;
    let Some(directive) = parse(&line)? else {
        return Ok(None);
    };
    let shebang = directive.expand(vars)?;
    tracing::debug!("shebang_cmd={}", shebang.interpreter);
    tracing::debug!(
        "shebang_arg={}",
        shebang.arg.as_ref().map(ToString::to_string).unwrap_or_default()
    );
    Ok(Some(shebang))
}

/// Directory of the canonicalized `program`, or [`NOT_APPLICABLE`] when the
/// program cannot be canonicalized.
pub fn origin_of(program: &Path) -> Result<BoundedPath> {
    let Ok(real) = std::fs::canonicalize(program) else {
        return BoundedPath::from_bytes(NOT_APPLICABLE);
    };
    let real = BoundedPath::from_os_str(real.as_os_str())?;
    let dir = real
        .dir()
        .ok_or(LaunchError::Invariant("canonical path without a directory"))?;
    BoundedPath::from_bytes(dir)
}

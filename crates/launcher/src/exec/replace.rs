//! Process image replacement.

use crate::bounded::BoundedPath;
use crate::error::{LaunchError, Result};
use crate::shebang::Shebang;
use nix::errno::Errno;
use std::convert::Infallible;
use std::ffi::{CStr, CString, OsStr, OsString};
use std::os::unix::ffi::OsStrExt;
use std::path::PathBuf;

/// Replaces the running process with another program.
///
/// On success the real implementation never returns; whatever it does return
/// is the reason the replacement failed.
pub trait ProcessImage {
    fn replace(&self, program: &CStr, argv: &[CString]) -> Errno;
}

/// `execv(2)`, with the environment inherited unchanged.
#[derive(Debug, Default, Clone, Copy)]
pub struct Execv;

impl ProcessImage for Execv {
    fn replace(&self, program: &CStr, argv: &[CString]) -> Errno {
        match nix::unistd::execv(program, argv) {
            Ok(never) => match never {},
            Err(errno) => errno,
        }
    }
}

fn c_arg(bytes: &[u8]) -> Result<CString> {
    CString::new(bytes).map_err(|_| LaunchError::Invariant("interior NUL byte in argument"))
}

/// Argument vector for an interpreted launch, with slot 0 left empty for the
/// interpreter candidate:
/// `[<interpreter>, arg?, program, args[1..]...]`.
pub fn interpreter_argv(
    arg: Option<&BoundedPath>,
    program: &BoundedPath,
    args: &[OsString],
) -> Result<Vec<CString>> {
    let mut argv = Vec::with_capacity(args.len() + 3);
    argv.push(CString::default());
    if let Some(arg) = arg {
        argv.push(c_arg(arg.as_bytes())?);
    }
    argv.push(program.to_cstring()?);
    for a in args.iter().skip(1) {
        argv.push(c_arg(a.as_bytes())?);
    }
    Ok(argv)
}

/// Try each interpreter candidate in turn with `argv`.
///
/// Only returns when every candidate failed, with the last failure.
pub fn launch_interpreted(
    image: &impl ProcessImage,
    shebang: &Shebang,
    program: &BoundedPath,
    args: &[OsString],
) -> Result<Infallible> {
    let mut argv = interpreter_argv(shebang.arg.as_ref(), program, args)?;
    let mut last = None;

    for candidate in shebang.candidates() {
        let interpreter = c_arg(candidate)?;
        argv[0] = interpreter.clone();
        tracing::debug!("exec={}", String::from_utf8_lossy(candidate));
        let errno = image.replace(&interpreter, &argv);
        last = Some(LaunchError::Exec {
            program: PathBuf::from(OsStr::from_bytes(candidate)),
            errno,
        });
    }

    Err(last.unwrap_or(LaunchError::Invariant(
        "shebang without interpreter candidates",
    )))
}

/// Replace the process with `program`, passing the original argv unchanged.
pub fn launch_plain(
    image: &impl ProcessImage,
    program: &BoundedPath,
    args: &[OsString],
) -> Result<Infallible> {
    let argv = args
        .iter()
        .map(|a| c_arg(a.as_bytes()))
        .collect::<Result<Vec<_>>>()?;
    tracing::debug!("exec={}", program);
    let errno = image.replace(&program.to_cstring()?, &argv);
    Err(LaunchError::Exec {
        program: program.to_path_buf(),
        errno,
    })
}

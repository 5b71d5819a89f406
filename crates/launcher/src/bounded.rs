//! Capacity-checked byte buffers for path assembly.
//!
//! Paths are handled as raw bytes so non-UTF-8 names survive untouched on
//! their way to `execv`. Every buffer carries the capacity of the C buffer it
//! replaces; overflowing it is a [`LaunchError::PathTooLong`], never a
//! truncation.

use crate::error::{LaunchError, Result};
use std::ffi::{CString, OsStr};
use std::fmt;
use std::fs::File;
use std::io::{self, BufRead, BufReader, Read};
use std::os::unix::ffi::OsStrExt;
use std::path::{Path, PathBuf};

/// Capacity for assembled filesystem paths.
pub const PATH_MAX: usize = 4096;

pub const SEPARATOR: u8 = b'/';

/// An owned byte string that never grows past `capacity - 1` bytes, keeping
/// room for the NUL terminator needed when it is handed to the OS.
#[derive(Clone, PartialEq, Eq)]
pub struct BoundedPath {
    buf: Vec<u8>,
    capacity: usize,
}

impl BoundedPath {
    pub fn new(capacity: usize) -> Self {
        Self {
            buf: Vec::new(),
            capacity,
        }
    }

    /// Copy `src` into a fresh buffer of the given capacity.
    pub fn copy_from(src: impl AsRef<[u8]>, capacity: usize) -> Result<Self> {
        let mut path = Self::new(capacity);
        path.push(src)?;
        Ok(path)
    }

    /// Copy `src` into a fresh [`PATH_MAX`] buffer.
    pub fn from_bytes(src: impl AsRef<[u8]>) -> Result<Self> {
        Self::copy_from(src, PATH_MAX)
    }

    pub fn from_os_str(src: &OsStr) -> Result<Self> {
        Self::from_bytes(src.as_bytes())
    }

    /// Append `src`, returning the new length.
    pub fn push(&mut self, src: impl AsRef<[u8]>) -> Result<usize> {
        let src = src.as_ref();
        if self.buf.len() + src.len() >= self.capacity {
            let mut attempted = self.buf.clone();
            attempted.extend_from_slice(src);
            return Err(LaunchError::too_long(&attempted, self.capacity));
        }
        self.buf.extend_from_slice(src);
        Ok(self.buf.len())
    }

    /// Replace the contents with `prefix` followed by the old contents.
    pub fn prepend(&mut self, prefix: impl AsRef<[u8]>) -> Result<()> {
        let mut joined = Self::copy_from(prefix, self.capacity)?;
        joined.push(&self.buf)?;
        *self = joined;
        Ok(())
    }

    /// `self + "/" + name`, in a new buffer of the same capacity.
    pub fn join(&self, name: impl AsRef<[u8]>) -> Result<Self> {
        let mut joined = self.clone();
        joined.push([SEPARATOR])?;
        joined.push(name)?;
        Ok(joined)
    }

    /// `self + suffix`, in a new buffer of the same capacity.
    pub fn with_suffix(&self, suffix: &str) -> Result<Self> {
        let mut extended = self.clone();
        extended.push(suffix)?;
        Ok(extended)
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.buf
    }

    pub fn as_path(&self) -> &Path {
        Path::new(OsStr::from_bytes(&self.buf))
    }

    pub fn to_path_buf(&self) -> PathBuf {
        self.as_path().to_path_buf()
    }

    pub fn len(&self) -> usize {
        self.buf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn is_absolute(&self) -> bool {
        self.buf.first() == Some(&SEPARATOR)
    }

    pub fn has_separator(&self) -> bool {
        self.buf.contains(&SEPARATOR)
    }

    /// Directory part of the path, `None` when there is no separator.
    pub fn dir(&self) -> Option<&[u8]> {
        split_path(&self.buf).0
    }

    pub fn to_cstring(&self) -> Result<CString> {
        CString::new(self.buf.clone())
            .map_err(|_| LaunchError::Invariant("interior NUL byte in path"))
    }
}

impl AsRef<[u8]> for BoundedPath {
    fn as_ref(&self) -> &[u8] {
        &self.buf
    }
}

impl fmt::Display for BoundedPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", String::from_utf8_lossy(&self.buf))
    }
}

impl fmt::Debug for BoundedPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", String::from_utf8_lossy(&self.buf))
    }
}

/// Split at the last separator into `(dir, base)`.
///
/// With no separator the whole path is the base and there is no directory.
/// A root-level entry such as `/bin` yields an empty directory, so joining it
/// back with `/` reproduces the original path.
pub fn split_path(path: &[u8]) -> (Option<&[u8]>, &[u8]) {
    match path.iter().rposition(|&b| b == SEPARATOR) {
        Some(i) => (Some(&path[..i]), &path[i + 1..]),
        None => (None, path),
    }
}

/// Segments of a `:`-separated search list. An empty list has no segments;
/// an empty segment inside a list is kept and denotes the current directory.
pub fn path_segments(search: &[u8]) -> impl Iterator<Item = &[u8]> {
    let mut segments = search.split(|&b| b == b':');
    if search.is_empty() {
        // `split` on an empty slice yields one empty item
        segments.next();
    }
    segments
}

/// A regular file this process may execute, as `access(X_OK)` reports it.
pub fn is_executable(path: &Path) -> bool {
    match std::fs::metadata(path) {
        Ok(metadata) if metadata.is_file() => {
            nix::unistd::access(path, nix::unistd::AccessFlags::X_OK).is_ok()
        }
        _ => false,
    }
}

/// Readable by this process, as `access(R_OK)` reports it.
pub fn is_readable(path: &Path) -> bool {
    nix::unistd::access(path, nix::unistd::AccessFlags::R_OK).is_ok()
}

/// The first line of a file, read through a bounded buffer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FirstLine {
    /// Line contents without the trailing newline.
    pub content: Vec<u8>,
    /// False when the line did not end within `capacity` bytes.
    pub complete: bool,
}

/// Read the first line of `path` the way `fgets` into a `capacity` buffer
/// would, except that an overlong line is reported instead of cut.
///
/// The file handle is closed before returning.
pub fn read_first_line(path: &Path, capacity: usize) -> io::Result<FirstLine> {
    let file = File::open(path)?;
    let mut reader = BufReader::new(file.take(capacity as u64));
    let mut content = Vec::new();
    reader.read_until(b'\n', &mut content)?;

    let complete = if content.last() == Some(&b'\n') {
        content.pop();
        true
    } else {
        content.len() < capacity
    };
    Ok(FirstLine { content, complete })
}

/// Remove trailing newline, space and tab bytes.
pub fn trim_end_whitespace(s: &[u8]) -> &[u8] {
    let end = s
        .iter()
        .rposition(|&b| !matches!(b, b'\n' | b' ' | b'\t'))
        .map_or(0, |i| i + 1);
    &s[..end]
}

/// Remove leading space and tab bytes.
pub fn trim_start_blanks(s: &[u8]) -> &[u8] {
    let start = s
        .iter()
        .position(|&b| !matches!(b, b' ' | b'\t'))
        .unwrap_or(s.len());
    &s[start..]
}

//! Symlink chain walking.
//!
//! The launcher is reached through one or more symlinks. The last link before
//! the launcher binary names the program to run, and a directory somewhere on
//! the chain may be flagged as the profile `bin` directory by a marker file.

use crate::bounded::{is_readable, split_path, BoundedPath, SEPARATOR};
use crate::error::{LaunchError, Result};
use std::fs;
use std::io;
use std::os::unix::ffi::OsStrExt;

/// Sentinel whose presence flags a chain directory as `PROFILE_BIN_DIR`.
pub const MARKER_FILE: &str = "is-profile-bin";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkChain {
    /// The last symlink before the first non-link entry; `None` when the
    /// starting path was not a symlink at all.
    pub final_link: Option<BoundedPath>,
    /// First directory along the chain, shallow to deep, holding [`MARKER_FILE`].
    pub marker_dir: Option<BoundedPath>,
}

/// Walk the symlink chain starting at `start`, which must contain a separator.
pub fn follow_links(start: &BoundedPath) -> Result<LinkChain> {
    let mut final_link = None;
    let mut marker_dir = None;
    let mut current = start.clone();

    loop {
        if marker_dir.is_none() {
            marker_dir = marker_dir_of(&current)?;
        }
        match resolve_link(&current)? {
            Some(next) => {
                final_link = Some(current);
                current = next;
            }
            None => break,
        }
    }

    Ok(LinkChain {
        final_link,
        marker_dir,
    })
}

/// Read `path` as a symlink, returning the target as a usable path.
///
/// Relative targets are resolved against the directory of the link itself.
/// `Ok(None)` means `path` is not a symlink, which ends the walk.
pub fn resolve_link(path: &BoundedPath) -> Result<Option<BoundedPath>> {
    let target = match fs::read_link(path.as_path()) {
        Ok(target) => target,
        Err(e) if is_not_a_link(&e) => return Ok(None),
        Err(e) => {
            return Err(LaunchError::io(format!("readlink {path}"), e));
        }
    };
    let target = target.as_os_str();
    tracing::debug!("readlink={} -> {}", path, target.to_string_lossy());

    let target = BoundedPath::copy_from(target.as_bytes(), path.capacity())?;
    if target.is_absolute() {
        return Ok(Some(target));
    }

    let dir = path
        .dir()
        .ok_or(LaunchError::Invariant("relative symlink with no directory component"))?;
    let mut resolved = BoundedPath::copy_from(dir, path.capacity())?;
    resolved.push([SEPARATOR])?;
    resolved.push(&target)?;
    Ok(Some(resolved))
}

fn is_not_a_link(err: &io::Error) -> bool {
    err.raw_os_error() == Some(nix::errno::Errno::EINVAL as i32)
}

/// The directory of `path` when it holds [`MARKER_FILE`]. A root-level entry
/// has an empty directory, which never counts, so the walk keeps looking.
fn marker_dir_of(path: &BoundedPath) -> Result<Option<BoundedPath>> {
    let dir = match split_path(path.as_bytes()) {
        (Some(dir), _) if !dir.is_empty() => dir,
        _ => return Ok(None),
    };
    let dir = BoundedPath::copy_from(dir, path.capacity())?;
    let marker = dir.join(MARKER_FILE)?;
    if is_readable(marker.as_path()) {
        Ok(Some(dir))
    } else {
        Ok(None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use std::os::unix::fs::symlink;
    use std::path::Path;
    use tempfile::TempDir;

    fn bp(path: &Path) -> BoundedPath {
        BoundedPath::from_os_str(path.as_os_str()).unwrap()
    }

    #[test]
    fn plain_file_has_no_final_link() {
        let temp = TempDir::new().unwrap();
        let file = temp.path().join("launcher");
        fs::write(&file, "binary").unwrap();

        let chain = follow_links(&bp(&file)).unwrap();
        assert_eq!(chain.final_link, None);
        assert_eq!(chain.marker_dir, None);
    }

    #[test]
    fn returns_link_preceding_the_final_file() {
        let temp = TempDir::new().unwrap();
        let d = temp.path();
        let launcher = d.join("launcher");
        fs::write(&launcher, "binary").unwrap();

        symlink(&launcher, d.join("foo0")).unwrap();
        symlink("foo0", d.join("foo1")).unwrap();
        symlink(d.join("foo1"), d.join("foo2")).unwrap();
        symlink("./foo2", d.join("foo3")).unwrap();

        let start = bp(&d.join("foo3"));
        let chain = follow_links(&start).unwrap();
        assert_eq!(chain.final_link, Some(bp(&d.join("foo0"))));

        let again = follow_links(&start).unwrap();
        assert_eq!(chain, again, "walk is idempotent on a static filesystem");
    }

    #[test]
    fn single_link_chain() {
        let temp = TempDir::new().unwrap();
        let launcher = temp.path().join("launcher");
        fs::write(&launcher, "binary").unwrap();
        symlink(&launcher, temp.path().join("tool")).unwrap();

        let chain = follow_links(&bp(&temp.path().join("tool"))).unwrap();
        assert_eq!(chain.final_link, Some(bp(&temp.path().join("tool"))));
    }

    #[test]
    fn relative_targets_resolve_against_link_directory() {
        let temp = TempDir::new().unwrap();
        let bin = temp.path().join("bin");
        let lib = temp.path().join("lib");
        fs::create_dir(&bin).unwrap();
        fs::create_dir(&lib).unwrap();
        fs::write(lib.join("launcher"), "binary").unwrap();
        symlink("../lib/launcher", bin.join("tool")).unwrap();

        let resolved = resolve_link(&bp(&bin.join("tool"))).unwrap().unwrap();
        let expected = format!("{}/../lib/launcher", bin.display());
        assert_eq!(resolved.as_bytes(), expected.as_bytes());
    }

    #[test]
    fn shallowest_marker_directory_wins() {
        let temp = TempDir::new().unwrap();
        let profile = temp.path().join("profile").join("bin");
        let deep = temp.path().join("store").join("bin");
        fs::create_dir_all(&profile).unwrap();
        fs::create_dir_all(&deep).unwrap();
        fs::write(profile.join(MARKER_FILE), "").unwrap();
        fs::write(deep.join(MARKER_FILE), "").unwrap();

        fs::write(deep.join("launcher"), "binary").unwrap();
        symlink(deep.join("launcher"), deep.join("python")).unwrap();
        symlink(deep.join("python"), profile.join("python")).unwrap();

        let chain = follow_links(&bp(&profile.join("python"))).unwrap();
        assert_eq!(chain.marker_dir, Some(bp(&profile)));
        assert_eq!(chain.final_link, Some(bp(&deep.join("python"))));
    }

    #[test]
    fn marker_found_deeper_in_chain() {
        let temp = TempDir::new().unwrap();
        let user = temp.path().join("user");
        let profile = temp.path().join("profile");
        fs::create_dir_all(&user).unwrap();
        fs::create_dir_all(&profile).unwrap();
        fs::write(profile.join(MARKER_FILE), "").unwrap();
        fs::write(profile.join("launcher"), "binary").unwrap();
        symlink(profile.join("launcher"), profile.join("tool")).unwrap();
        symlink(profile.join("tool"), user.join("tool")).unwrap();

        let chain = follow_links(&bp(&user.join("tool"))).unwrap();
        assert_eq!(chain.marker_dir, Some(bp(&profile)));
    }

    #[test]
    fn root_level_entries_never_mark_a_directory() {
        // Whether or not `/is-profile-bin` exists, the empty directory is skipped.
        let root_entry = BoundedPath::from_bytes("/tool").unwrap();
        assert_eq!(marker_dir_of(&root_entry).unwrap(), None);

        let bare = BoundedPath::from_bytes("tool").unwrap();
        assert_eq!(marker_dir_of(&bare).unwrap(), None);
    }

    #[test]
    fn dangling_link_is_a_hard_error() {
        let temp = TempDir::new().unwrap();
        symlink(temp.path().join("missing"), temp.path().join("tool")).unwrap();

        let err = follow_links(&bp(&temp.path().join("tool"))).unwrap_err();
        match err {
            LaunchError::Io { source, .. } => {
                assert_eq!(source.kind(), io::ErrorKind::NotFound)
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    #[serial]
    fn relative_link_without_directory_violates_invariant() {
        let temp = TempDir::new().unwrap();
        fs::write(temp.path().join("launcher"), "binary").unwrap();
        symlink("launcher", temp.path().join("tool")).unwrap();

        // A bare name cannot be resolved link-relative; the orchestrator
        // anchors bare names before walking.
        let _cwd = CwdGuard::enter(temp.path());
        let err = resolve_link(&BoundedPath::from_bytes("tool").unwrap()).unwrap_err();
        assert!(matches!(err, LaunchError::Invariant(_)));
    }

    struct CwdGuard(std::path::PathBuf);

    impl CwdGuard {
        fn enter(dir: &Path) -> Self {
            let previous = std::env::current_dir().unwrap();
            std::env::set_current_dir(dir).unwrap();
            Self(previous)
        }
    }

    impl Drop for CwdGuard {
        fn drop(&mut self) {
            let _ = std::env::set_current_dir(&self.0);
        }
    }
}

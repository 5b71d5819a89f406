mod replace;

pub use self::replace::{interpreter_argv, launch_interpreted, launch_plain, Execv, ProcessImage};

use crate::bounded::BoundedPath;
use crate::chain::follow_links;
use crate::context::LaunchContext;
use crate::error::{Failure, Locate};
use crate::indirection::resolve_indirection;
use crate::logger::{self, LINE_PREFIX};
use crate::shebang::{self, origin_of, Variables, NOT_APPLICABLE};
use std::process::ExitCode;

/// Exit status for every resolution or launch failure.
pub const FAILURE_EXIT_CODE: u8 = 127;

pub const LAUNCHER_VERSION: &str = env!("LAUNCHER_VERSION");

/// Help shown when the launcher is run directly instead of through a link.
pub fn usage() -> String {
    format!(
        "hdist-launcher {LAUNCHER_VERSION}\n\
         Usage: You should set up symlinks to launcher.\n\n\
         See README on http://github.com/hashdist/hdist-launcher\n"
    )
}

/// Process entry point: run the launcher and map the outcome to an exit code.
pub fn main_entry() -> ExitCode {
    match run_launcher() {
        Ok(()) => ExitCode::SUCCESS,
        Err(failure) => {
            eprintln!("{LINE_PREFIX}{failure}");
            ExitCode::from(FAILURE_EXIT_CODE)
        }
    }
}

/// Main launcher function
///
/// Only returns `Ok` when the launcher was invoked directly, after printing
/// the usage text. A successful launch replaces the process.
pub fn run_launcher() -> Result<(), Failure> {
    let ctx = LaunchContext::from_env();
    logger::init(ctx.debug);

    run_with(&ctx, &Execv)?;
    eprint!("{}", usage());
    Ok(())
}

/// Resolve the program behind `ctx` and hand it to `image`.
///
/// `Ok(())` means the invocation path was not a symlink, so there is nothing
/// to launch.
pub fn run_with(ctx: &LaunchContext, image: &impl ProcessImage) -> Result<(), Failure> {
    let start = ctx.invocation_path().located()?;
    tracing::debug!("start='{start}'");

    let chain = follow_links(&start).located()?;
    let Some(caller) = chain.final_link else {
        return Ok(());
    };
    let marker_dir = chain.marker_dir.as_ref().map(BoundedPath::as_bytes);
    tracing::debug!("caller={caller}");
    tracing::debug!(
        "PROFILE_BIN_DIR={}",
        String::from_utf8_lossy(marker_dir.unwrap_or_default())
    );

    let indirection = resolve_indirection(&caller).located()?;
    tracing::debug!("indirection={}", indirection.source);
    let program = indirection.program;
    let origin = origin_of(program.as_path()).located()?;
    tracing::debug!("ORIGIN={origin}");
    tracing::debug!("program={program}");

    let vars = Variables {
        origin: origin.as_bytes(),
        profile_bin_dir: marker_dir.unwrap_or(NOT_APPLICABLE.as_bytes()),
    };

    let never = match shebang::load(&program, &vars).located()? {
        Some(shebang) => launch_interpreted(image, &shebang, &program, &ctx.args),
        None => launch_plain(image, &program, &ctx.args),
    }
    .located()?;
    match never {}
}

#[cfg(test)]
mod tests {
    use super::replace::tests::RecordingImage;
    use super::*;
    use crate::chain::MARKER_FILE;
    use crate::error::{LaunchError, ShebangError};
    use nix::errno::Errno;
    use std::ffi::OsString;
    use std::fs;
    use std::os::unix::fs::{symlink, PermissionsExt};
    use std::path::Path;
    use tempfile::TempDir;

    /// A stand-in launcher binary and a link `name` to it inside `dir`.
    fn link_to_launcher(root: &Path, dir: &Path, name: &str) {
        let launcher = root.join("launcher");
        if !launcher.exists() {
            fs::write(&launcher, "").unwrap();
            fs::set_permissions(&launcher, fs::Permissions::from_mode(0o755)).unwrap();
        }
        symlink(&launcher, dir.join(name)).unwrap();
    }

    fn context(args: &[&str]) -> LaunchContext {
        LaunchContext {
            args: args.iter().map(OsString::from).collect(),
            search_path: None,
            debug: false,
        }
    }

    fn attempts(image: &RecordingImage) -> Vec<(String, Vec<String>)> {
        image
            .attempts
            .borrow()
            .iter()
            .map(|(exe, argv)| {
                (
                    String::from_utf8_lossy(exe).into_owned(),
                    argv.iter()
                        .map(|a| String::from_utf8_lossy(a).into_owned())
                        .collect(),
                )
            })
            .collect()
    }

    #[test]
    fn direct_invocation_launches_nothing() {
        let temp = TempDir::new().unwrap();
        link_to_launcher(temp.path(), temp.path(), "unused");
        let launcher = temp.path().join("launcher");

        let image = RecordingImage::default();
        run_with(&context(&[launcher.to_str().unwrap()]), &image).unwrap();
        assert!(image.attempts.borrow().is_empty());
        assert!(usage().contains("You should set up symlinks to launcher."));
    }

    #[test]
    fn shebang_program_runs_through_interpreter() {
        let temp = TempDir::new().unwrap();
        link_to_launcher(temp.path(), temp.path(), "tool");
        fs::write(temp.path().join("tool.real"), "#!/bin/sh -e\necho hi\n").unwrap();
        let tool = temp.path().join("tool");

        let image = RecordingImage::default();
        let failure = run_with(&context(&[tool.to_str().unwrap(), "x", "y"]), &image).unwrap_err();

        let real = format!("{}.real", tool.display());
        assert_eq!(
            attempts(&image),
            vec![(
                "/bin/sh".to_string(),
                vec!["/bin/sh".into(), "-e".into(), real, "x".into(), "y".into()]
            )]
        );
        assert!(matches!(failure.error, LaunchError::Exec { errno: Errno::ENOENT, .. }));
        assert!(failure.location.file().ends_with("mod.rs"));
    }

    #[test]
    fn plain_program_keeps_argv() {
        let temp = TempDir::new().unwrap();
        link_to_launcher(temp.path(), temp.path(), "tool");
        fs::write(temp.path().join("tool.real"), "\x7fELF").unwrap();
        let tool = temp.path().join("tool");

        let image = RecordingImage::default();
        let _ = run_with(&context(&[tool.to_str().unwrap(), "-v"]), &image);

        let recorded = attempts(&image);
        assert_eq!(recorded[0].0, format!("{}.real", tool.display()));
        assert_eq!(recorded[0].1, vec![tool.to_str().unwrap().to_string(), "-v".into()]);
    }

    #[test]
    fn variables_expand_from_chain_and_program() {
        let temp = TempDir::new().unwrap();
        let bin = temp.path().join("bin");
        let libexec = temp.path().join("libexec");
        fs::create_dir(&bin).unwrap();
        fs::create_dir(&libexec).unwrap();
        fs::write(bin.join(MARKER_FILE), "").unwrap();
        link_to_launcher(temp.path(), &bin, "tool");
        fs::write(bin.join("tool.link"), "../libexec/tool").unwrap();
        fs::write(
            libexec.join("tool"),
            "#!${PROFILE_BIN_DIR}/python ${ORIGIN}\n",
        )
        .unwrap();

        let image = RecordingImage::default();
        let tool = bin.join("tool");
        let _ = run_with(&context(&[tool.to_str().unwrap()]), &image);

        let origin = fs::canonicalize(&libexec).unwrap();
        let recorded = attempts(&image);
        assert_eq!(recorded[0].0, format!("{}/python", bin.display()));
        assert_eq!(recorded[0].1[1], origin.to_str().unwrap());
        assert_eq!(recorded[0].1[2], format!("{}/../libexec/tool", bin.display()));
    }

    #[test]
    fn missing_marker_expands_to_not_applicable() {
        let temp = TempDir::new().unwrap();
        link_to_launcher(temp.path(), temp.path(), "tool");
        fs::write(temp.path().join("tool.real"), "#!${PROFILE_BIN_DIR}/sh\n").unwrap();
        let tool = temp.path().join("tool");

        let image = RecordingImage::default();
        let _ = run_with(&context(&[tool.to_str().unwrap()]), &image);
        assert_eq!(attempts(&image)[0].0, "__NA__/sh");
    }

    #[test]
    fn missing_program_is_unlaunchable() {
        let temp = TempDir::new().unwrap();
        link_to_launcher(temp.path(), temp.path(), "tool");
        let tool = temp.path().join("tool");

        let image = RecordingImage::default();
        let failure = run_with(&context(&[tool.to_str().unwrap()]), &image).unwrap_err();
        assert!(image.attempts.borrow().is_empty());
        assert!(failure.to_string().starts_with(&format!(
            "Unable to launch '{}.real' (No such file or directory",
            tool.display()
        )));
    }

    #[test]
    fn bad_shebang_stops_before_exec() {
        let temp = TempDir::new().unwrap();
        link_to_launcher(temp.path(), temp.path(), "tool");
        fs::write(temp.path().join("tool.real"), "#!${HOME}/sh\n").unwrap();
        let tool = temp.path().join("tool");

        let image = RecordingImage::default();
        let failure = run_with(&context(&[tool.to_str().unwrap()]), &image).unwrap_err();
        assert!(image.attempts.borrow().is_empty());
        assert!(matches!(
            failure.error,
            LaunchError::InvalidShebang(ShebangError::UnknownVariable(ref name)) if name == "HOME"
        ));
    }
}

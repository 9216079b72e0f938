use std::env;
use std::ffi::OsString;
use std::path::{Path, PathBuf};

use anyhow::bail;
use anyhow::Context;

use crate::types::StampedeResult;

/// Environment variable to override the path to the worker program.
pub const STAMPEDE_WORKER_PATH_ENV: &str = "STAMPEDE_WORKER_PATH";

/// Get the path to the worker program.
///
/// If the [`STAMPEDE_WORKER_PATH_ENV`] environment variable is set, its value is used in place of
/// `program`. A program given as a path must exist, a bare name is looked up in the user's `PATH`.
pub fn worker_path(program: &str) -> StampedeResult<PathBuf> {
    resolve_worker_path(
        program,
        env::var(STAMPEDE_WORKER_PATH_ENV).ok().as_deref(),
        env::var_os("PATH"),
    )
}

fn resolve_worker_path(
    program: &str,
    override_path: Option<&str>,
    search_path: Option<OsString>,
) -> StampedeResult<PathBuf> {
    let program = match override_path {
        Some("") => {
            bail!("'{STAMPEDE_WORKER_PATH_ENV}' set to empty string");
        }
        Some(path) => {
            log::debug!("Worker program overridden with '{STAMPEDE_WORKER_PATH_ENV}={path}'");
            path
        }
        None => program,
    };

    if program.is_empty() {
        bail!("No worker program given");
    }

    let as_path = Path::new(program);
    if as_path.components().count() > 1 || as_path.is_absolute() {
        if !as_path.exists() {
            bail!(
                "Worker program '{path}' doesn't exist",
                path = as_path.display()
            );
        }
        return Ok(as_path.to_path_buf());
    }

    let cwd = env::current_dir().context("Failed to get the current directory")?;
    which::which_in(program, search_path, cwd).with_context(|| {
        format!(
            "Worker program '{program}' not found in PATH. Install it or set '{STAMPEDE_WORKER_PATH_ENV}' to the correct path."
        )
    })
}

#[cfg(test)]
mod tests {
    #[cfg(unix)]
    use std::os::unix::fs::PermissionsExt as _;

    use tempfile::{NamedTempFile, TempDir};

    use super::*;

    #[test]
    fn test_should_not_get_worker_path_if_not_exist() {
        let result = resolve_worker_path("node", Some("/non/existent/path/to/worker"), None);
        assert!(result.is_err());
    }

    #[test]
    fn test_should_reject_empty_override() {
        let result = resolve_worker_path("node", Some(""), None);
        assert!(result.is_err());
    }

    #[test]
    fn test_should_get_worker_path_from_override() {
        let temp = NamedTempFile::new().expect("failed to create temp file");
        let test_path = temp.path().to_str().expect("failed to get temp file path");
        let result =
            resolve_worker_path("node", Some(test_path), None).expect("failed to get worker path");
        assert_eq!(result, PathBuf::from(test_path));
    }

    #[cfg(unix)]
    #[test]
    fn test_should_find_worker_in_search_path() {
        let temp = TempDir::new().expect("failed to create temp dir");
        let worker_file_path = temp.path().join("my-worker");
        std::fs::write(&worker_file_path, "#!/bin/sh\n").expect("failed to create worker file");
        let mut perms = std::fs::metadata(&worker_file_path)
            .unwrap()
            .permissions();
        perms.set_mode(0o755);
        std::fs::set_permissions(&worker_file_path, perms).unwrap();

        let result = resolve_worker_path("my-worker", None, Some(temp.path().into()))
            .expect("failed to get worker path");
        assert_eq!(result, worker_file_path);
    }

    #[test]
    fn test_should_not_find_worker_without_search_path() {
        let temp = TempDir::new().expect("failed to create temp dir");
        let result = resolve_worker_path("stampede-missing-worker", None, Some(temp.path().into()));
        assert!(result.is_err());
    }
}

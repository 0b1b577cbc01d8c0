//! Removal of the output tree.

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

/// Errors that can occur while cleaning.
#[derive(Debug, thiserror::Error)]
pub enum CleanError {
    #[error("Refusing to delete {}: it contains the working directory or is a filesystem root", .0.display())]
    Unsafe(PathBuf),

    #[error("Failed to delete {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Recursively delete `output`.
///
/// A missing directory is not an error.
pub fn clean(output: &Path) -> Result<(), CleanError> {
    let resolved = match fs::canonicalize(output) {
        Ok(path) => path,
        Err(e) if e.kind() == ErrorKind::NotFound => {
            tracing::debug!("Nothing to clean at {}", output.display());
            return Ok(());
        }
        Err(source) => {
            return Err(CleanError::Io {
                path: output.to_path_buf(),
                source,
            })
        }
    };

    if is_protected(&resolved) {
        return Err(CleanError::Unsafe(output.to_path_buf()));
    }

    let result = if resolved.is_dir() {
        fs::remove_dir_all(&resolved)
    } else {
        fs::remove_file(&resolved)
    };

    match result {
        Ok(()) => {
            tracing::info!("Cleaned {}", output.display());
            Ok(())
        }
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
        Err(source) => Err(CleanError::Io {
            path: output.to_path_buf(),
            source,
        }),
    }
}

/// Filesystem roots and ancestors of the working directory.
fn is_protected(resolved: &Path) -> bool {
    if resolved.parent().is_none() {
        return true;
    }
    std::env::current_dir()
        .and_then(fs::canonicalize)
        .map(|cwd| cwd.starts_with(resolved))
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn removes_nested_tree() {
        let temp = tempdir().unwrap();
        let dist = temp.path().join("dist");
        fs::create_dir_all(dist.join("css/deep")).unwrap();
        fs::write(dist.join("css/deep/a.css"), "a{}").unwrap();
        fs::write(dist.join("index.html"), "<p>").unwrap();

        clean(&dist).unwrap();

        assert!(!dist.exists());
        assert!(temp.path().exists());
    }

    #[test]
    fn cleaning_twice_succeeds() {
        let temp = tempdir().unwrap();
        let dist = temp.path().join("dist");
        fs::create_dir_all(&dist).unwrap();

        clean(&dist).unwrap();
        clean(&dist).unwrap();

        assert!(!dist.exists());
    }

    #[test]
    fn refuses_filesystem_root() {
        let err = clean(Path::new("/")).unwrap_err();
        assert!(matches!(err, CleanError::Unsafe(_)));
    }

    #[test]
    fn refuses_working_directory() {
        let err = clean(Path::new(".")).unwrap_err();
        assert!(matches!(err, CleanError::Unsafe(_)));
    }
}

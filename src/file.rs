//! Filesystem side of the create-or-load flow.
//!
//! - [`resolve_location`] turns a [`Location`] into a directory.
//! - [`ensure_file`] creates the configuration file (and its parent directories)
//!   if it does not exist yet, seeding it from a [`DefaultSource`]. The content
//!   is written to a temporary file first, so the file appears complete or not
//!   at all.
//! - [`read_file`] reads the current content; a missing file reads as empty.
//! - [`write_atomic`] replaces the file by writing a sibling temporary file and
//!   renaming it into place, so readers never observe a half-written document.

use std::fs;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

use tempfile::NamedTempFile;

use crate::error::AnnofigError;
use crate::types::{DefaultSource, Location};

/// Resolve a [`Location`] to a concrete directory.
///
/// `app_name` is used by `Location::Platform` to build the platform config
/// directory (e.g. `~/.config/{app_name}/` on Linux).
///
/// Returns `None` if the directory cannot be determined (e.g. no home directory).
pub fn resolve_location(location: &Location, app_name: &str) -> Option<PathBuf> {
    match location {
        Location::Platform => {
            let proj = directories::ProjectDirs::from("", "", app_name)?;
            Some(proj.config_dir().to_path_buf())
        }
        Location::Home(subdir) => {
            let user = directories::UserDirs::new()?;
            Some(user.home_dir().join(subdir))
        }
        Location::Cwd => std::env::current_dir().ok(),
        Location::Path(p) => Some(p.clone()),
    }
}

/// Create `path` if it is missing. Returns `true` if the file was created.
///
/// The default source is only read and copied when the file is created; an
/// existing file is never touched.
pub fn ensure_file(path: &Path, default: Option<&DefaultSource>) -> Result<bool, AnnofigError> {
    if path.exists() {
        return Ok(false);
    }

    let initial = match default {
        Some(source) => Some(read_default(source)?),
        None => None,
    };

    let dir = parent_dir(path).unwrap_or_else(|| Path::new("."));
    fs::create_dir_all(dir).map_err(|e| AnnofigError::FileCreation {
        path: dir.to_path_buf(),
        source: e,
    })?;

    let created = install_new(path, dir, initial.as_deref().unwrap_or_default())?;
    if created {
        tracing::info!(path = %path.display(), "created configuration file");
        if let Some(bytes) = &initial {
            tracing::info!(path = %path.display(), bytes = bytes.len(), "copied default content");
        }
    }
    Ok(created)
}

/// Write `bytes` to a temporary file in `dir` and move it to `path` unless
/// something is already there. A failed write leaves no file behind.
fn install_new(path: &Path, dir: &Path, bytes: &[u8]) -> Result<bool, AnnofigError> {
    let creation_error = |source| AnnofigError::FileCreation {
        path: path.to_path_buf(),
        source,
    };

    let mut tmp = NamedTempFile::new_in(dir).map_err(creation_error)?;
    tmp.write_all(bytes).map_err(|e| AnnofigError::DefaultCopy {
        path: path.to_path_buf(),
        source: e,
    })?;
    tmp.as_file().sync_all().map_err(creation_error)?;
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        tmp.as_file()
            .set_permissions(fs::Permissions::from_mode(0o644))
            .map_err(creation_error)?;
    }

    match tmp.persist_noclobber(path) {
        Ok(_) => Ok(true),
        Err(e) if e.error.kind() == ErrorKind::AlreadyExists => Ok(false),
        Err(e) => Err(creation_error(e.error)),
    }
}

fn read_default(source: &DefaultSource) -> Result<Vec<u8>, AnnofigError> {
    match source {
        DefaultSource::Bytes(bytes) => Ok(bytes.to_vec()),
        DefaultSource::Path(p) => fs::read(p).map_err(|e| AnnofigError::DefaultCopy {
            path: p.clone(),
            source: e,
        }),
    }
}

/// Read the file at `path`. A missing file reads as an empty document.
pub fn read_file(path: &Path) -> Result<String, AnnofigError> {
    match fs::read_to_string(path) {
        Ok(content) => Ok(content),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(String::new()),
        Err(e) => Err(AnnofigError::IoError {
            path: path.to_path_buf(),
            source: e,
        }),
    }
}

/// Replace the content of `path` with `contents` atomically.
///
/// Parent directories are created as needed. The permissions of an existing file
/// are carried over to the replacement.
pub fn write_atomic(path: &Path, contents: &str) -> Result<(), AnnofigError> {
    let dir = parent_dir(path).unwrap_or_else(|| Path::new("."));
    let io_error = |source| AnnofigError::IoError {
        path: path.to_path_buf(),
        source,
    };

    fs::create_dir_all(dir).map_err(|e| AnnofigError::IoError {
        path: dir.to_path_buf(),
        source: e,
    })?;

    let mut tmp = NamedTempFile::new_in(dir).map_err(io_error)?;
    tmp.write_all(contents.as_bytes()).map_err(io_error)?;
    tmp.as_file().sync_all().map_err(io_error)?;
    if let Ok(meta) = fs::metadata(path) {
        tmp.as_file()
            .set_permissions(meta.permissions())
            .map_err(io_error)?;
    }
    tmp.persist(path).map_err(|e| io_error(e.error))?;
    Ok(())
}

fn parent_dir(path: &Path) -> Option<&Path> {
    path.parent().filter(|p| !p.as_os_str().is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::borrow::Cow;
    use tempfile::TempDir;

    #[test]
    fn resolve_explicit_path() {
        let p = PathBuf::from("/tmp/myapp");
        let resolved = resolve_location(&Location::Path(p.clone()), "ignored");
        assert_eq!(resolved, Some(p));
    }

    #[test]
    fn resolve_platform_mentions_app() {
        if let Some(dir) = resolve_location(&Location::Platform, "annofig-test-app") {
            assert!(dir.to_string_lossy().contains("annofig-test-app"));
        }
    }

    #[test]
    fn ensure_creates_empty_file_and_parents() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("sub").join("dir").join("app.toml");
        assert!(ensure_file(&path, None).unwrap());
        assert_eq!(fs::read_to_string(&path).unwrap(), "");
    }

    #[test]
    fn ensure_copies_default_bytes_verbatim() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("app.toml");
        let source = DefaultSource::bytes(b"# seeded\ncount = 3\n");
        assert!(ensure_file(&path, Some(&source)).unwrap());
        assert_eq!(fs::read_to_string(&path).unwrap(), "# seeded\ncount = 3\n");
    }

    #[test]
    fn ensure_copies_default_file() {
        let dir = TempDir::new().unwrap();
        let seed = dir.path().join("seed.toml");
        fs::write(&seed, "count = 9\n").unwrap();
        let path = dir.path().join("app.toml");
        ensure_file(&path, Some(&DefaultSource::Path(seed))).unwrap();
        assert_eq!(fs::read_to_string(&path).unwrap(), "count = 9\n");
    }

    #[test]
    fn ensure_leaves_existing_file_alone() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("app.toml");
        fs::write(&path, "count = 1\n").unwrap();
        let source = DefaultSource::Bytes(Cow::Owned(b"count = 2\n".to_vec()));
        assert!(!ensure_file(&path, Some(&source)).unwrap());
        assert_eq!(fs::read_to_string(&path).unwrap(), "count = 1\n");
    }

    #[test]
    fn missing_default_source_is_copy_error() {
        let dir = TempDir::new().unwrap();
        let missing = dir.path().join("nope.toml");
        let path = dir.path().join("app.toml");
        let err = ensure_file(&path, Some(&DefaultSource::Path(missing.clone()))).unwrap_err();
        match err {
            AnnofigError::DefaultCopy { path: p, .. } => assert_eq!(p, missing),
            other => panic!("Expected DefaultCopy, got {other:?}"),
        }
        assert!(!path.exists());
    }

    #[cfg(unix)]
    #[test]
    fn uncreatable_parent_is_creation_error() {
        let dir = TempDir::new().unwrap();
        let blocker = dir.path().join("file");
        fs::write(&blocker, "").unwrap();
        let path = blocker.join("app.toml");
        let err = ensure_file(&path, None).unwrap_err();
        assert!(matches!(err, AnnofigError::FileCreation { .. }));
        assert!(err.to_string().contains("file"));
    }

    #[test]
    fn install_never_replaces_existing_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("app.toml");
        fs::write(&path, "count = 1\n").unwrap();
        assert!(!install_new(&path, dir.path(), b"count = 2\n").unwrap());
        assert_eq!(fs::read_to_string(&path).unwrap(), "count = 1\n");
        assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 1);
    }

    #[test]
    fn created_file_has_no_temporary_siblings() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("app.toml");
        assert!(ensure_file(&path, Some(&DefaultSource::bytes(b"count = 2\n"))).unwrap());
        assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 1);
    }

    #[cfg(unix)]
    #[test]
    fn failed_create_leaves_nothing_behind() {
        use std::os::unix::fs::PermissionsExt;

        let dir = TempDir::new().unwrap();
        let locked = dir.path().join("locked");
        fs::create_dir(&locked).unwrap();
        fs::set_permissions(&locked, fs::Permissions::from_mode(0o555)).unwrap();
        let path = locked.join("app.toml");

        let result = ensure_file(&path, Some(&DefaultSource::bytes(b"count = 2\n")));
        // Root can write anywhere; only assert the failure when it happens.
        match result {
            Err(err) => {
                assert!(matches!(err, AnnofigError::FileCreation { .. }));
                assert!(!path.exists());
                assert_eq!(fs::read_dir(&locked).unwrap().count(), 0);
            }
            Ok(created) => {
                assert!(created);
                assert_eq!(fs::read_to_string(&path).unwrap(), "count = 2\n");
            }
        }

        fs::set_permissions(&locked, fs::Permissions::from_mode(0o755)).unwrap();
    }

    #[test]
    fn read_missing_file_is_empty() {
        let dir = TempDir::new().unwrap();
        assert_eq!(read_file(&dir.path().join("absent.toml")).unwrap(), "");
    }

    #[cfg(unix)]
    #[test]
    fn unreadable_file_returns_io_error() {
        use std::os::unix::fs::PermissionsExt;

        let dir = TempDir::new().unwrap();
        let path = dir.path().join("app.toml");
        fs::write(&path, "count = 1\n").unwrap();
        fs::set_permissions(&path, fs::Permissions::from_mode(0o000)).unwrap();

        // Root can read anything; only assert when the read actually fails.
        if fs::read_to_string(&path).is_err() {
            assert!(matches!(read_file(&path), Err(AnnofigError::IoError { .. })));
        }

        fs::set_permissions(&path, fs::Permissions::from_mode(0o644)).unwrap();
    }

    #[test]
    fn write_atomic_replaces_content() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("app.toml");
        fs::write(&path, "old = true\n").unwrap();
        write_atomic(&path, "new = true\n").unwrap();
        assert_eq!(fs::read_to_string(&path).unwrap(), "new = true\n");
        let leftovers = fs::read_dir(dir.path()).unwrap().count();
        assert_eq!(leftovers, 1);
    }

    #[test]
    fn write_atomic_creates_parent_dirs() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("a").join("b").join("app.toml");
        write_atomic(&path, "x = 1\n").unwrap();
        assert!(path.exists());
    }

    #[cfg(unix)]
    #[test]
    fn write_atomic_keeps_permissions() {
        use std::os::unix::fs::PermissionsExt;

        let dir = TempDir::new().unwrap();
        let path = dir.path().join("app.toml");
        fs::write(&path, "x = 1\n").unwrap();
        fs::set_permissions(&path, fs::Permissions::from_mode(0o644)).unwrap();
        write_atomic(&path, "x = 2\n").unwrap();
        let mode = fs::metadata(&path).unwrap().permissions().mode() & 0o777;
        assert_eq!(mode, 0o644);
    }
}

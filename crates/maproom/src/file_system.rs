//! Filesystem adapter
//!
//! An OS-independent view of files and directories with the failure semantics
//! the project layer depends on: absence reported as a value from `file_info`,
//! idempotent deletes, move-with-rename falling back to copy-then-delete, and
//! a directory stack with a RAII scoped guard so "current directory" changes
//! are restored on every exit path.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use thiserror::Error;
use tracing::error;

/// Errors raised by filesystem operations
///
/// Not-found and wrong-type are distinct kinds so callers can pick a recovery
/// path ("create it" vs "fail"); everything else is an I/O failure carrying
/// the operation context in its message.
#[derive(Debug, Error)]
pub enum FileError {
    /// The source of the operation does not exist
    #[error("file not found: {0}")]
    NotFound(String),
    /// The path exists but is the wrong kind (file vs directory)
    #[error("wrong file type: {0}")]
    WrongType(String),
    /// The underlying OS operation failed
    #[error("{0}")]
    Io(String),
}

fn io_err(context: String, err: io::Error) -> FileError {
    if err.kind() == io::ErrorKind::NotFound {
        FileError::NotFound(format!("{context}: {err}"))
    } else {
        FileError::Io(format!("{context}: {err}"))
    }
}

/// Kind of filesystem object a path resolves to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FileType {
    /// The path does not exist
    #[default]
    NotFound,
    /// A regular file
    RegularFile,
    /// A directory
    Directory,
}

/// Snapshot of a path's filesystem state
///
/// Produced by [`FileSystem::file_info`], which never fails: a missing path
/// yields `FileType::NotFound` with zeroed metadata.
#[derive(Debug, Clone, Default)]
pub struct FileInfo {
    /// What the path resolves to, if anything
    pub file_type: FileType,
    /// The queried path
    pub path: PathBuf,
    /// Last path component
    pub file_name: String,
    /// Parent directory portion of the path
    pub directory: PathBuf,
    /// Size in bytes (0 for directories and missing paths)
    pub size: u64,
    /// Last modification time, when the OS reports one
    pub modified: Option<SystemTime>,
}

impl FileInfo {
    /// Whether the path exists at all
    pub fn exists(&self) -> bool {
        self.file_type != FileType::NotFound
    }

    /// Whether the path is a directory
    pub fn is_directory(&self) -> bool {
        self.file_type == FileType::Directory
    }

    /// Whether the path is a regular file
    pub fn is_regular_file(&self) -> bool {
        self.file_type == FileType::RegularFile
    }
}

/// RAII guard restoring the previous working directory on drop
///
/// Created by [`FileSystem::scoped`]. Restoration failures are logged, never
/// panicked on, so the guard is safe on unwind paths.
#[derive(Debug)]
pub struct ScopedDir {
    previous: PathBuf,
}

impl Drop for ScopedDir {
    fn drop(&mut self) {
        if let Err(err) = std::env::set_current_dir(&self.previous) {
            error!(
                "failed to restore working directory to {}: {err}",
                self.previous.display()
            );
        }
    }
}

/// Filesystem operations plus a LIFO stack of working-directory save points
#[derive(Debug, Default)]
pub struct FileSystem {
    dir_stack: Vec<PathBuf>,
}

impl FileSystem {
    /// Create an adapter with an empty directory stack
    pub fn new() -> Self {
        Self::default()
    }

    /// Inspect a path; absence is a normal outcome, never an error
    pub fn file_info(&self, path: impl AsRef<Path>) -> FileInfo {
        let path = path.as_ref();
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.to_string_lossy().into_owned());
        let directory = path.parent().map(Path::to_path_buf).unwrap_or_default();

        match fs::metadata(path) {
            Ok(meta) => FileInfo {
                file_type: if meta.is_dir() {
                    FileType::Directory
                } else {
                    FileType::RegularFile
                },
                path: path.to_path_buf(),
                file_name,
                directory,
                size: if meta.is_dir() { 0 } else { meta.len() },
                modified: meta.modified().ok(),
            },
            Err(_) => FileInfo {
                file_type: FileType::NotFound,
                path: path.to_path_buf(),
                file_name,
                directory,
                size: 0,
                modified: None,
            },
        }
    }

    /// Whether the path exists as a directory
    pub fn dir_exists(&self, path: impl AsRef<Path>) -> bool {
        self.file_info(path).is_directory()
    }

    /// Whether the path exists as a regular file
    pub fn file_exists(&self, path: impl AsRef<Path>) -> bool {
        self.file_info(path).is_regular_file()
    }

    /// Create a single directory; idempotent if it already exists
    ///
    /// Fails with `WrongType` if the path exists as a non-directory and with
    /// `NotFound` if the parent directory is missing.
    pub fn make_directory(&self, path: impl AsRef<Path>) -> Result<(), FileError> {
        let path = path.as_ref();
        match self.file_info(path).file_type {
            FileType::Directory => Ok(()),
            FileType::RegularFile => Err(FileError::WrongType(format!(
                "cannot create directory {}: a file with that name exists",
                path.display()
            ))),
            FileType::NotFound => fs::create_dir(path)
                .map_err(|e| io_err(format!("creating directory {}", path.display()), e)),
        }
    }

    /// Create a directory and any missing parents; idempotent
    pub fn make_directories(&self, path: impl AsRef<Path>) -> Result<(), FileError> {
        let path = path.as_ref();
        match self.file_info(path).file_type {
            FileType::Directory => Ok(()),
            FileType::RegularFile => Err(FileError::WrongType(format!(
                "cannot create directory {}: a file with that name exists",
                path.display()
            ))),
            FileType::NotFound => fs::create_dir_all(path)
                .map_err(|e| io_err(format!("creating directory {}", path.display()), e)),
        }
    }

    /// Copy a regular file
    ///
    /// A destination that is a directory receives the source's file name under
    /// it; copying a file onto itself is a no-op; an existing destination is
    /// only replaced when `overwrite` is set.
    pub fn copy_file(
        &self,
        src: impl AsRef<Path>,
        dest: impl AsRef<Path>,
        overwrite: bool,
    ) -> Result<(), FileError> {
        let src = src.as_ref();
        let dest = self.resolve_file_destination(src, dest.as_ref())?;

        if self.is_same_file(src, &dest) {
            return Ok(());
        }
        let dest_info = self.file_info(&dest);
        if dest_info.is_directory() {
            return Err(FileError::WrongType(format!(
                "cannot copy {} over directory {}",
                src.display(),
                dest.display()
            )));
        }
        if dest_info.is_regular_file() && !overwrite {
            return Err(FileError::Io(format!(
                "cannot copy {} to {}: destination exists and overwrite was not requested",
                src.display(),
                dest.display()
            )));
        }
        fs::copy(src, &dest)
            .map(|_| ())
            .map_err(|e| io_err(format!("copying {} to {}", src.display(), dest.display()), e))
    }

    /// Move a regular file, atomically when the OS allows it
    ///
    /// A plain rename is attempted first. If that fails (typically a
    /// cross-device move), the file is copied and the source deleted; a copy
    /// that succeeds but leaves the source undeletable fails with a message
    /// stating that the destination now holds a good copy.
    pub fn move_file(
        &self,
        src: impl AsRef<Path>,
        dest: impl AsRef<Path>,
        overwrite: bool,
    ) -> Result<(), FileError> {
        let src = src.as_ref();
        let dest = self.resolve_file_destination(src, dest.as_ref())?;

        if self.is_same_file(src, &dest) {
            return Ok(());
        }
        let dest_info = self.file_info(&dest);
        if dest_info.is_directory() {
            return Err(FileError::WrongType(format!(
                "cannot move {} over directory {}",
                src.display(),
                dest.display()
            )));
        }
        if dest_info.is_regular_file() && !overwrite {
            return Err(FileError::Io(format!(
                "cannot move {} to {}: destination exists and overwrite was not requested",
                src.display(),
                dest.display()
            )));
        }

        if fs::rename(src, &dest).is_ok() {
            return Ok(());
        }

        // Rename can fail across devices; fall back to copy + delete-source.
        self.copy_file(src, &dest, true)?;
        fs::remove_file(src).map_err(|e| {
            FileError::Io(format!(
                "moved {} to {} but the source could not be deleted: {e}; \
                 the copy succeeded and the source file remains",
                src.display(),
                dest.display()
            ))
        })
    }

    /// Delete a regular file; deleting an already-absent path succeeds
    pub fn delete_file(&self, path: impl AsRef<Path>) -> Result<(), FileError> {
        let path = path.as_ref();
        match self.file_info(path).file_type {
            FileType::NotFound => Ok(()),
            FileType::Directory => Err(FileError::WrongType(format!(
                "cannot delete {}: it is a directory",
                path.display()
            ))),
            FileType::RegularFile => fs::remove_file(path)
                .map_err(|e| io_err(format!("deleting {}", path.display()), e)),
        }
    }

    /// Delete a directory; an already-absent path succeeds
    ///
    /// Returns `Ok(false)` without deleting anything when the directory is
    /// non-empty and `recursive` is not set.
    pub fn delete_dir(&self, path: impl AsRef<Path>, recursive: bool) -> Result<bool, FileError> {
        let path = path.as_ref();
        match self.file_info(path).file_type {
            FileType::NotFound => Ok(true),
            FileType::RegularFile => Err(FileError::WrongType(format!(
                "cannot delete directory {}: it is a regular file",
                path.display()
            ))),
            FileType::Directory => {
                if recursive {
                    fs::remove_dir_all(path)
                        .map(|_| true)
                        .map_err(|e| io_err(format!("deleting directory {}", path.display()), e))
                } else {
                    let mut entries = fs::read_dir(path)
                        .map_err(|e| io_err(format!("reading directory {}", path.display()), e))?;
                    if entries.next().is_some() {
                        return Ok(false);
                    }
                    fs::remove_dir(path)
                        .map(|_| true)
                        .map_err(|e| io_err(format!("deleting directory {}", path.display()), e))
                }
            }
        }
    }

    /// Recursively copy a directory
    ///
    /// With `contents_only` the children of `src` land directly in `dest`;
    /// otherwise a directory named after `src` is created under `dest`.
    /// Refuses to copy a directory into itself.
    pub fn copy_dir(
        &self,
        src: impl AsRef<Path>,
        dest: impl AsRef<Path>,
        overwrite: bool,
        contents_only: bool,
    ) -> Result<(), FileError> {
        let src = src.as_ref();
        let dest = dest.as_ref();
        let src_info = self.file_info(src);
        if !src_info.exists() {
            return Err(FileError::NotFound(format!(
                "cannot copy directory {}: it does not exist",
                src.display()
            )));
        }
        if !src_info.is_directory() {
            return Err(FileError::WrongType(format!(
                "cannot copy directory {}: it is a regular file",
                src.display()
            )));
        }

        let target = if contents_only || !self.dir_exists(dest) {
            dest.to_path_buf()
        } else {
            dest.join(&src_info.file_name)
        };

        let src_canon = fs::canonicalize(src)
            .map_err(|e| io_err(format!("resolving {}", src.display()), e))?;
        if canonicalize_lenient(&target).starts_with(&src_canon) {
            return Err(FileError::Io(format!(
                "cannot copy directory {} into itself ({})",
                src.display(),
                target.display()
            )));
        }

        self.make_directories(&target)?;
        self.copy_dir_children(src, &target, overwrite)
    }

    fn copy_dir_children(
        &self,
        src: &Path,
        dest: &Path,
        overwrite: bool,
    ) -> Result<(), FileError> {
        for name in self.dir_files(src, &[])? {
            let child_src = src.join(&name);
            let child_dest = dest.join(&name);
            if self.dir_exists(&child_src) {
                self.make_directory(&child_dest)?;
                self.copy_dir_children(&child_src, &child_dest, overwrite)?;
            } else {
                self.copy_file(&child_src, &child_dest, overwrite)?;
            }
        }
        Ok(())
    }

    /// List the direct children of a directory, sorted by name
    ///
    /// `extensions` filters by file extension (no dot, case-insensitive); an
    /// empty slice lists everything. Not recursive.
    pub fn dir_files(
        &self,
        path: impl AsRef<Path>,
        extensions: &[&str],
    ) -> Result<Vec<String>, FileError> {
        let path = path.as_ref();
        let info = self.file_info(path);
        if !info.exists() {
            return Err(FileError::NotFound(format!(
                "cannot list {}: it does not exist",
                path.display()
            )));
        }
        if !info.is_directory() {
            return Err(FileError::WrongType(format!(
                "cannot list {}: it is not a directory",
                path.display()
            )));
        }

        let entries = fs::read_dir(path)
            .map_err(|e| io_err(format!("reading directory {}", path.display()), e))?;
        let mut names = Vec::new();
        for entry in entries {
            let entry =
                entry.map_err(|e| io_err(format!("reading directory {}", path.display()), e))?;
            let name = entry.file_name().to_string_lossy().into_owned();
            if extensions.is_empty() || matches_extension(&name, extensions) {
                names.push(name);
            }
        }
        names.sort();
        Ok(names)
    }

    /// Report the process working directory
    pub fn current_directory(&self) -> Result<PathBuf, FileError> {
        std::env::current_dir()
            .map_err(|e| io_err("reading the current working directory".to_string(), e))
    }

    /// Change into `path`, saving the previous working directory on the stack
    pub fn push_directory(&mut self, path: impl AsRef<Path>) -> Result<(), FileError> {
        let path = path.as_ref();
        let previous = self.current_directory()?;
        self.enter_directory(path)?;
        self.dir_stack.push(previous);
        Ok(())
    }

    /// Return to the most recently pushed directory; no-op on an empty stack
    pub fn pop_directory(&mut self) -> Result<(), FileError> {
        let Some(previous) = self.dir_stack.pop() else {
            return Ok(());
        };
        std::env::set_current_dir(&previous).map_err(|e| {
            io_err(format!("returning to directory {}", previous.display()), e)
        })
    }

    /// Change the working directory and clear the stack (hard reset)
    pub fn change_directory(&mut self, path: impl AsRef<Path>) -> Result<(), FileError> {
        self.enter_directory(path.as_ref())?;
        self.dir_stack.clear();
        Ok(())
    }

    /// Depth of the directory stack
    pub fn stack_depth(&self) -> usize {
        self.dir_stack.len()
    }

    /// Change into `path`, returning a guard that restores the previous
    /// working directory when dropped
    pub fn scoped(&self, path: impl AsRef<Path>) -> Result<ScopedDir, FileError> {
        let previous = self.current_directory()?;
        self.enter_directory(path.as_ref())?;
        Ok(ScopedDir { previous })
    }

    fn enter_directory(&self, path: &Path) -> Result<(), FileError> {
        match self.file_info(path).file_type {
            FileType::NotFound => Err(FileError::NotFound(format!(
                "cannot change into {}: it does not exist",
                path.display()
            ))),
            FileType::RegularFile => Err(FileError::WrongType(format!(
                "cannot change into {}: it is not a directory",
                path.display()
            ))),
            FileType::Directory => std::env::set_current_dir(path)
                .map_err(|e| io_err(format!("changing into {}", path.display()), e)),
        }
    }

    /// Whether two paths resolve to the same filesystem object
    pub fn is_same_file(&self, a: impl AsRef<Path>, b: impl AsRef<Path>) -> bool {
        same_file(a.as_ref(), b.as_ref())
    }

    fn resolve_file_destination(&self, src: &Path, dest: &Path) -> Result<PathBuf, FileError> {
        let src_info = self.file_info(src);
        if !src_info.exists() {
            return Err(FileError::NotFound(format!(
                "source file {} does not exist",
                src.display()
            )));
        }
        if !src_info.is_regular_file() {
            return Err(FileError::WrongType(format!(
                "source {} is not a regular file",
                src.display()
            )));
        }
        if self.dir_exists(dest) {
            Ok(dest.join(&src_info.file_name))
        } else {
            Ok(dest.to_path_buf())
        }
    }
}

#[cfg(unix)]
fn same_file(a: &Path, b: &Path) -> bool {
    use std::os::unix::fs::MetadataExt;
    match (fs::metadata(a), fs::metadata(b)) {
        (Ok(ma), Ok(mb)) => ma.dev() == mb.dev() && ma.ino() == mb.ino(),
        _ => false,
    }
}

#[cfg(not(unix))]
fn same_file(a: &Path, b: &Path) -> bool {
    match (fs::canonicalize(a), fs::canonicalize(b)) {
        (Ok(ca), Ok(cb)) => ca == cb,
        _ => false,
    }
}

/// Canonicalize the longest existing ancestor and re-append the rest, so
/// paths that do not exist yet can still be compared for containment
fn canonicalize_lenient(path: &Path) -> PathBuf {
    let mut existing = path;
    let mut rest = Vec::new();
    loop {
        if let Ok(canon) = fs::canonicalize(existing) {
            let mut result = canon;
            for component in rest.iter().rev() {
                result.push(component);
            }
            return result;
        }
        match (existing.parent(), existing.file_name()) {
            (Some(parent), Some(name)) => {
                rest.push(name.to_os_string());
                existing = parent;
            }
            _ => return path.to_path_buf(),
        }
    }
}

fn matches_extension(name: &str, extensions: &[&str]) -> bool {
    let Some(ext) = Path::new(name).extension() else {
        return false;
    };
    let ext = ext.to_string_lossy().to_lowercase();
    extensions.iter().any(|e| e.to_lowercase() == ext)
}

/// Collapse duplicate separators, convert backslashes, and strip trailing
/// separators (keeping a lone root)
pub fn normalize_path(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut last_was_sep = false;
    for ch in raw.chars() {
        let is_sep = ch == '/' || ch == '\\';
        if is_sep {
            if !last_was_sep {
                out.push('/');
            }
        } else {
            out.push(ch);
        }
        last_was_sep = is_sep;
    }
    while out.len() > 1 && out.ends_with('/') && !out.ends_with(":/") {
        out.pop();
    }
    out
}

/// Whether a path string is absolute in POSIX (`/...`) or drive-letter
/// (`C:...`) form
pub fn is_absolute_path(raw: &str) -> bool {
    if raw.starts_with('/') || raw.starts_with('\\') {
        return true;
    }
    let mut chars = raw.chars();
    matches!(
        (chars.next(), chars.next()),
        (Some(c), Some(':')) if c.is_ascii_alphabetic()
    )
}

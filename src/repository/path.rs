//! repository::path
//!
//! Versioned handle on one location inside a [`Repository`].
//!
//! A [`RepoPath`] pairs a borrowed repository with a normalized relative
//! path: slash separated, no leading slash, the root being `""`. File
//! operations act on the working tree; history operations go through the
//! repository's queries.

use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use thiserror::Error;

use super::{RepoError, Repository};
use crate::core::types::{
    normalize_relative_path, relative_basename, relative_dirname, FileListingItem, InvalidReason,
    Meta, Revision,
};

/// How many commits [`RepoPath::revisions`] lists.
pub const REVISION_LIMIT: usize = 100;

/// Extensions treated as binary without looking at the content.
const BINARY_EXTENSIONS: &[&str] = &[
    "png", "jpg", "jpeg", "gif", "bmp", "ico", "tif", "tiff", "webp", "psd", "pdf", "zip", "gz",
    "tgz", "bz2", "xz", "7z", "rar", "tar", "jar", "exe", "dll", "so", "dylib", "o", "a", "class",
    "mp3", "mp4", "m4a", "wav", "ogg", "flac", "avi", "mov", "mkv", "ttf", "otf", "woff", "woff2",
    "doc", "docx", "xls", "xlsx", "ppt", "pptx", "odt", "sqlite", "db",
];

/// Bytes inspected when sniffing for binary content.
const SNIFF_LEN: usize = 8000;

/// Errors from path operations.
#[derive(Debug, Error)]
pub enum PathError {
    #[error("repository is not valid: {0}")]
    InvalidRepository(InvalidReason),

    #[error("i/o error at {path}: {source}")]
    Io { path: PathBuf, source: io::Error },

    /// A file occupies the location of a requested directory.
    #[error("file exists: {path}")]
    AlreadyExists { path: PathBuf },

    /// The path was never committed.
    #[error("no commit history for '{path}'")]
    NoHistory { path: String },

    #[error(transparent)]
    Repository(#[from] RepoError),
}

fn io_error(path: &Path) -> impl FnOnce(io::Error) -> PathError + '_ {
    move |source| PathError::Io {
        path: path.to_path_buf(),
        source,
    }
}

/// A relative location inside a repository.
#[derive(Debug, Clone)]
pub struct RepoPath<'a> {
    repository: &'a Repository,
    relative_path: String,
}

impl<'a> RepoPath<'a> {
    pub fn new(repository: &'a Repository, relative_path: &str) -> Self {
        Self {
            repository,
            relative_path: normalize_relative_path(relative_path),
        }
    }

    pub fn repository(&self) -> &'a Repository {
        self.repository
    }

    pub fn relative_path(&self) -> &str {
        &self.relative_path
    }

    /// Parent of this path; `""` at and directly below the root.
    pub fn relative_dirname(&self) -> &str {
        relative_dirname(&self.relative_path)
    }

    pub fn join(&self, component: &str) -> RepoPath<'a> {
        Self::new(
            self.repository,
            &format!("{}/{}", self.relative_path, component),
        )
    }

    fn full_path(&self) -> Result<PathBuf, PathError> {
        let Some(root) = self.repository.root() else {
            return Err(PathError::InvalidRepository(
                self.repository
                    .invalid_reason()
                    .unwrap_or(InvalidReason::NoRepository),
            ));
        };

        if self.relative_path.is_empty() {
            Ok(root.to_path_buf())
        } else {
            Ok(root.join(&self.relative_path))
        }
    }

    /// Live location in the working tree.
    pub fn absolute_path(&self) -> Option<PathBuf> {
        self.full_path().ok()
    }

    // =========================================================================
    // Mutation
    // =========================================================================

    /// Replace the file's content. The file always ends with exactly one
    /// newline added to `content` less any trailing newline it had.
    pub fn write(&self, content: impl AsRef<[u8]>) -> Result<(), PathError> {
        let path = self.full_path()?;
        create_parent(&path)?;
        fs::write(&path, newline_terminated(content.as_ref())).map_err(io_error(&path))
    }

    /// Create an empty file unless one exists.
    pub fn touch(&self) -> Result<(), PathError> {
        let path = self.full_path()?;
        create_parent(&path)?;
        OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .map_err(io_error(&path))?;
        Ok(())
    }

    /// Create this directory and its parents.
    ///
    /// # Errors
    ///
    /// [`PathError::AlreadyExists`] if a file is in the way.
    pub fn mkdir(&self) -> Result<(), PathError> {
        let path = self.full_path()?;
        if path.exists() && !path.is_dir() {
            return Err(PathError::AlreadyExists { path });
        }
        fs::create_dir_all(&path).map_err(io_error(&path))
    }

    /// Move an outside file here, replacing whatever is present.
    pub fn mv(&self, source: &Path) -> Result<(), PathError> {
        let path = self.full_path()?;
        create_parent(&path)?;

        if fs::rename(source, &path).is_ok() {
            return Ok(());
        }

        // Different filesystems.
        fs::copy(source, &path).map_err(io_error(source))?;
        fs::remove_file(source).map_err(io_error(source))
    }

    /// Delete the file or directory tree; absent paths are fine.
    pub fn remove(&self) -> Result<(), PathError> {
        let path = self.full_path()?;
        let result = match fs::symlink_metadata(&path) {
            Ok(meta) if meta.is_dir() => fs::remove_dir_all(&path),
            Ok(_) => fs::remove_file(&path),
            Err(e) => Err(e),
        };

        match result {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(io_error(&path)(e)),
        }
    }

    /// Restore the content committed at `reference`.
    ///
    /// Returns `false` without touching anything when the path did not
    /// exist at that commit.
    pub fn revert(&self, reference: &str) -> Result<bool, PathError> {
        match self.repository.blob_at(&self.relative_path, reference)? {
            Some(content) => {
                self.write(content)?;
                tracing::info!(path = %self.relative_path, reference, "reverted");
                Ok(true)
            }
            None => Ok(false),
        }
    }

    // =========================================================================
    // Queries
    // =========================================================================

    pub fn exists(&self) -> bool {
        self.full_path().is_ok_and(|path| path.exists())
    }

    pub fn is_dir(&self) -> bool {
        self.full_path().is_ok_and(|path| path.is_dir())
    }

    /// Whether this is a file with textual content. Empty files are text.
    pub fn is_text(&self) -> bool {
        let Ok(path) = self.full_path() else {
            return false;
        };
        if !path.is_file() {
            return false;
        }

        let binary_extension = path
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| BINARY_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()));
        if binary_extension {
            return false;
        }

        match fs::read(&path) {
            Ok(bytes) => !bytes.iter().take(SNIFF_LEN).any(|b| *b == 0),
            Err(_) => false,
        }
    }

    /// Author and date of the last commit touching this path, with its
    /// size on disk (-1 when zero).
    ///
    /// # Errors
    ///
    /// [`PathError::NoHistory`] if the path was never committed.
    pub fn meta(&self) -> Result<Meta, PathError> {
        let path = self.full_path()?;
        let commit = self
            .repository
            .last_commit_for(&self.relative_path)?
            .ok_or_else(|| PathError::NoHistory {
                path: self.relative_path.clone(),
            })?;

        let size = disk_size(&path);
        Ok(Meta {
            author: commit.author.name,
            size: if size == 0 { -1 } else { size as i64 },
            modified: commit.author.time,
        })
    }

    /// Content as of commit `reference`, written to a fresh temporary file.
    ///
    /// The file holds empty content when the path did not exist at that
    /// commit, and always ends with a newline. Every call creates a new
    /// file; removing it is up to the caller.
    pub fn absolute_path_at(&self, reference: &str) -> Result<PathBuf, PathError> {
        self.full_path()?;
        let content = self
            .repository
            .blob_at(&self.relative_path, reference)?
            .unwrap_or_default();

        let basename = match relative_basename(&self.relative_path) {
            "" => "root",
            name => name,
        };
        let tag: String = reference
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
            .collect();

        let mut file = tempfile::Builder::new()
            .prefix(&format!("docsync-{tag}-"))
            .suffix(&format!("-{basename}"))
            .tempfile()
            .map_err(io_error(&std::env::temp_dir()))?;
        let path = file.path().to_path_buf();
        file.write_all(&newline_terminated(&content))
            .map_err(io_error(&path))?;
        file.keep().map_err(|e| PathError::Io {
            path: path.clone(),
            source: e.error,
        })?;
        Ok(path)
    }

    /// A README file directly inside this directory, any case and
    /// extension.
    pub fn readme_path(&self) -> Option<PathBuf> {
        let path = self.full_path().ok()?;
        let entries = fs::read_dir(&path).ok()?;

        let mut candidates: Vec<PathBuf> = entries
            .flatten()
            .filter(|entry| {
                let name = entry.file_name();
                let name = name.to_string_lossy();
                name.split('.')
                    .next()
                    .is_some_and(|stem| stem.eq_ignore_ascii_case("readme"))
            })
            .map(|entry| entry.path())
            .filter(|candidate| candidate.is_file())
            .collect();
        candidates.sort();
        candidates.into_iter().next()
    }

    /// Children of this directory, directories first. Within each group
    /// visible names precede dotfiles, both sorted by name. Git control
    /// files and `~` backups are left out.
    pub fn file_listing(&self) -> Result<Option<Vec<FileListingItem>>, PathError> {
        let path = self.full_path()?;
        if !path.is_dir() {
            return Ok(None);
        }

        let mut directories = Vec::new();
        let mut files = Vec::new();
        for entry in fs::read_dir(&path).map_err(io_error(&path))? {
            let entry = entry.map_err(io_error(&path))?;
            let name = entry.file_name().to_string_lossy().into_owned();
            if is_hidden_from_listing(&name) {
                continue;
            }

            if entry.path().is_dir() {
                directories.push(name);
            } else {
                files.push(name);
            }
        }

        for group in [&mut directories, &mut files] {
            group.sort_by(|a, b| (a.starts_with('.'), a).cmp(&(b.starts_with('.'), b)));
        }

        let listing = directories
            .into_iter()
            .map(|name| FileListingItem {
                name,
                is_directory: true,
            })
            .chain(files.into_iter().map(|name| FileListingItem {
                name,
                is_directory: false,
            }))
            .collect();
        Ok(Some(listing))
    }

    /// Raw file content; `None` for directories and missing paths.
    pub fn content(&self) -> Result<Option<Vec<u8>>, PathError> {
        let path = self.full_path()?;
        if !path.is_file() {
            return Ok(None);
        }
        fs::read(&path).map(Some).map_err(io_error(&path))
    }

    /// Commits touching this path, newest first.
    pub fn revisions(&self) -> Result<Vec<Revision>, PathError> {
        let commits = self
            .repository
            .commits_for(&self.relative_path, REVISION_LIMIT)?;
        Ok(commits.iter().map(Revision::from).collect())
    }
}

fn is_hidden_from_listing(name: &str) -> bool {
    name == ".git"
        || name == Repository::DIRECTORY_PLACEHOLDER
        || name == Repository::COMMIT_MESSAGE_FILE
        || name.ends_with('~')
}

fn newline_terminated(content: &[u8]) -> Vec<u8> {
    let body = content.strip_suffix(b"\n").unwrap_or(content);
    let mut data = Vec::with_capacity(body.len() + 1);
    data.extend_from_slice(body);
    data.push(b'\n');
    data
}

fn create_parent(path: &Path) -> Result<(), PathError> {
    match path.parent() {
        Some(parent) => fs::create_dir_all(parent).map_err(io_error(parent)),
        None => Ok(()),
    }
}

/// Bytes in a file, or in all regular files below a directory.
fn disk_size(path: &Path) -> u64 {
    let Ok(meta) = fs::symlink_metadata(path) else {
        return 0;
    };
    if !meta.is_dir() {
        return if meta.is_file() { meta.len() } else { 0 };
    }

    fs::read_dir(path)
        .map(|entries| {
            entries
                .flatten()
                .map(|entry| disk_size(&entry.path()))
                .sum::<u64>()
        })
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn setup() -> (TempDir, Repository) {
        let dir = TempDir::new().unwrap();
        let repository = Repository::init(dir.path()).unwrap();
        (dir, repository)
    }

    #[test]
    fn relative_dirname_at_each_depth() {
        let (_dir, repository) = setup();

        assert_eq!(repository.path("").relative_dirname(), "");
        assert_eq!(repository.path("/directory").relative_dirname(), "");
        assert_eq!(
            repository
                .path("/directory1/directory2/file")
                .relative_dirname(),
            "directory1/directory2"
        );
    }

    #[test]
    fn join_extends_relative_and_absolute_paths() {
        let (dir, repository) = setup();
        let joined = repository.path("/directory/file").join("new_file");

        assert_eq!(joined.relative_path(), "directory/file/new_file");
        assert_eq!(
            joined.absolute_path().unwrap(),
            std::path::absolute(dir.path())
                .unwrap()
                .join("directory/file/new_file")
        );
    }

    #[test]
    fn newline_termination() {
        assert_eq!(newline_terminated(b"foobar"), b"foobar\n");
        assert_eq!(newline_terminated(b"foobar\n"), b"foobar\n");
        assert_eq!(newline_terminated(b""), b"\n");
    }

    #[test]
    fn touch_keeps_existing_content() {
        let (dir, repository) = setup();
        let path = repository.path("directory/file");

        path.touch().unwrap();
        assert_eq!(fs::read(dir.path().join("directory/file")).unwrap(), b"");

        fs::write(dir.path().join("directory/file"), "test").unwrap();
        path.touch().unwrap();
        assert_eq!(fs::read(dir.path().join("directory/file")).unwrap(), b"test");
    }

    #[test]
    fn mkdir_over_file_fails() {
        let (_dir, repository) = setup();
        let path = repository.path("directory/file");
        path.write("foobar").unwrap();

        assert!(matches!(path.mkdir(), Err(PathError::AlreadyExists { .. })));
    }

    #[test]
    fn mkdir_is_idempotent() {
        let (_dir, repository) = setup();
        let path = repository.path("directory/sub");
        path.mkdir().unwrap();
        path.mkdir().unwrap();
        assert!(path.is_dir());
    }

    #[test]
    fn remove_missing_is_noop() {
        let (_dir, repository) = setup();
        repository.path("nothing/here").remove().unwrap();
    }

    #[test]
    fn binary_sniffing() {
        let (dir, repository) = setup();
        fs::write(dir.path().join("blob.dat"), [0x89, b'P', 0, 0]).unwrap();
        fs::write(dir.path().join("image.png"), "not really").unwrap();
        fs::write(dir.path().join("notes.md"), "# notes").unwrap();

        assert!(!repository.path("blob.dat").is_text());
        assert!(!repository.path("image.png").is_text());
        assert!(repository.path("notes.md").is_text());
    }

    #[test]
    fn meta_without_history_fails() {
        let (_dir, repository) = setup();
        let path = repository.path("directory/file");
        path.write("foo").unwrap();

        assert!(matches!(path.meta(), Err(PathError::NoHistory { .. })));
    }

    #[test]
    fn invalid_repository_paths() {
        let dir = TempDir::new().unwrap();
        let repository = Repository::open(dir.path().join("missing"));
        let path = repository.path("file");

        assert!(!path.exists());
        assert!(!path.is_text());
        assert_eq!(path.absolute_path(), None);
        assert!(matches!(
            path.write("x"),
            Err(PathError::InvalidRepository(InvalidReason::DirectoryMissing))
        ));
    }

    #[test]
    fn listing_hides_control_files() {
        assert!(is_hidden_from_listing(".git"));
        assert!(is_hidden_from_listing(".gitignore"));
        assert!(is_hidden_from_listing(".gitmessage~"));
        assert!(is_hidden_from_listing("draft.txt~"));
        assert!(!is_hidden_from_listing(".hidden"));
    }
}

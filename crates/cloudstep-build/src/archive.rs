use std::fs::File;
use std::io::{Seek, Write};
use std::path::{Component, Path, PathBuf};

use walkdir::WalkDir;
use zip::write::FileOptions;
use zip::{CompressionMethod, ZipWriter};

/// Counts of what went into an archive.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ArchiveSummary {
    pub files: usize,
    pub directories: usize,
    /// Symlinks, sockets, devices and other non-regular entries left out
    pub skipped: usize,
    /// Uncompressed bytes of regular files
    pub bytes: u64,
}

/// Zips every regular file and directory under `root` into `writer`.
///
/// Entry names are relative to `root` and always use `/`. Directories become
/// zero-length entries ending in `/`; files are deflated. Entries appear in
/// walk order. Anything that is neither a regular file nor a directory is
/// skipped. Any walk or I/O error aborts the archive.
pub fn archive_dir<W: Write + Seek>(root: &Path, writer: W) -> Result<ArchiveSummary, ArchiveError> {
    let mut zip = ZipWriter::new(writer);
    let file_options = FileOptions::default().compression_method(CompressionMethod::Deflated);
    let dir_options = FileOptions::default().compression_method(CompressionMethod::Stored);
    let mut summary = ArchiveSummary::default();

    for entry in WalkDir::new(root).follow_links(false) {
        let entry = entry.map_err(|e| ArchiveError::Walk {
            root: root.to_path_buf(),
            source: e,
        })?;

        // The root itself has no entry.
        if entry.depth() == 0 {
            if !entry.file_type().is_dir() {
                return Err(ArchiveError::NotADirectory(root.to_path_buf()));
            }
            continue;
        }

        let name = entry_name(root, entry.path())?;
        let file_type = entry.file_type();

        if file_type.is_dir() {
            zip.add_directory(format!("{name}/"), dir_options)
                .map_err(|e| ArchiveError::Zip { name, source: e })?;
            summary.directories += 1;
        } else if file_type.is_file() {
            let options = with_permissions(file_options, &entry)?;
            zip.start_file(name.clone(), options)
                .map_err(|e| ArchiveError::Zip {
                    name: name.clone(),
                    source: e,
                })?;
            let mut file = File::open(entry.path()).map_err(|e| ArchiveError::Read {
                path: entry.path().to_path_buf(),
                source: e,
            })?;
            summary.bytes += std::io::copy(&mut file, &mut zip).map_err(|e| ArchiveError::Read {
                path: entry.path().to_path_buf(),
                source: e,
            })?;
            summary.files += 1;
        } else {
            tracing::debug!(path = %entry.path().display(), "skipping non-regular file");
            summary.skipped += 1;
        }
    }

    let mut writer = zip.finish().map_err(|e| ArchiveError::Zip {
        name: "central directory".to_owned(),
        source: e,
    })?;
    writer.flush().map_err(|e| ArchiveError::Write { source: e })?;

    tracing::debug!(
        root = %root.display(),
        files = summary.files,
        directories = summary.directories,
        skipped = summary.skipped,
        "archived source tree"
    );
    Ok(summary)
}

/// An archive in a temporary file, removed when dropped.
#[derive(Debug)]
pub struct TempArchive {
    file: tempfile::NamedTempFile,
    summary: ArchiveSummary,
}

impl TempArchive {
    pub fn path(&self) -> &Path {
        self.file.path()
    }

    pub fn summary(&self) -> ArchiveSummary {
        self.summary
    }

    /// Compressed size on disk.
    pub fn len(&self) -> Result<u64, ArchiveError> {
        self.file
            .as_file()
            .metadata()
            .map(|m| m.len())
            .map_err(|e| ArchiveError::Write { source: e })
    }

    pub fn is_empty(&self) -> Result<bool, ArchiveError> {
        self.len().map(|len| len == 0)
    }
}

/// Archives `root` into a fresh temporary `.zip` file.
pub fn archive_to_temp(root: &Path) -> Result<TempArchive, ArchiveError> {
    let mut file = tempfile::Builder::new()
        .prefix("cloudstep-")
        .suffix(".zip")
        .tempfile()
        .map_err(|e| ArchiveError::Write { source: e })?;

    let summary = archive_dir(root, file.as_file_mut())?;
    Ok(TempArchive { file, summary })
}

/// Archives `root` to `destination`, which only appears once the archive is complete.
pub fn archive_to_file(root: &Path, destination: &Path) -> Result<ArchiveSummary, ArchiveError> {
    let parent = match destination.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    let mut file = tempfile::NamedTempFile::new_in(parent).map_err(|e| ArchiveError::Write { source: e })?;

    let summary = archive_dir(root, file.as_file_mut())?;
    file.persist(destination).map_err(|e| ArchiveError::Persist {
        path: destination.to_path_buf(),
        source: e.error,
    })?;
    Ok(summary)
}

/// `/`-joined path of `path` relative to `root`.
fn entry_name(root: &Path, path: &Path) -> Result<String, ArchiveError> {
    let relative = path
        .strip_prefix(root)
        .map_err(|_| ArchiveError::OutsideRoot(path.to_path_buf()))?;

    let mut parts = Vec::new();
    for component in relative.components() {
        match component {
            Component::Normal(part) => parts.push(
                part.to_str()
                    .ok_or_else(|| ArchiveError::NonUtf8Path(path.to_path_buf()))?,
            ),
            _ => return Err(ArchiveError::OutsideRoot(path.to_path_buf())),
        }
    }
    Ok(parts.join("/"))
}

#[cfg(unix)]
fn with_permissions(options: FileOptions, entry: &walkdir::DirEntry) -> Result<FileOptions, ArchiveError> {
    use std::os::unix::fs::PermissionsExt;

    let metadata = entry.metadata().map_err(|e| ArchiveError::Walk {
        root: entry.path().to_path_buf(),
        source: e,
    })?;
    Ok(options.unix_permissions(metadata.permissions().mode() & 0o777))
}

#[cfg(not(unix))]
fn with_permissions(options: FileOptions, _entry: &walkdir::DirEntry) -> Result<FileOptions, ArchiveError> {
    Ok(options)
}

#[derive(Debug, thiserror::Error)]
pub enum ArchiveError {
    #[error("failed to walk source tree {root}")]
    Walk {
        root: PathBuf,
        source: walkdir::Error,
    },
    #[error("source {0} is not a directory")]
    NotADirectory(PathBuf),
    #[error("path {0} is not valid UTF-8")]
    NonUtf8Path(PathBuf),
    #[error("path {0} is outside the archive root")]
    OutsideRoot(PathBuf),
    #[error("failed to read {path}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to write zip entry {name}")]
    Zip {
        name: String,
        source: zip::result::ZipError,
    },
    #[error("failed to write archive")]
    Write { source: std::io::Error },
    #[error("failed to move archive into place at {path}")]
    Persist {
        path: PathBuf,
        source: std::io::Error,
    },
}

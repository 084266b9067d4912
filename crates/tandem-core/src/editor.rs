//! File mutation engine behind the `text_editor` tool.
//!
//! Every mutating operation records the file's prior content the first time
//! it touches a path. Later mutations to the same path keep that first
//! backup, so `undo` restores the state before the first tracked edit, not
//! the most recent one. Backups live in memory only and belong to a single
//! `FileEditor`: two editors rooted at the same directory do not see each
//! other's backups.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;
use walkdir::WalkDir;

use crate::error::EditError;

/// Whether `create` may replace an existing file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CreateMode {
    /// Fail with `AlreadyExists` if the file is present
    Strict,
    /// Replace existing content, backing it up first
    Overwrite,
}

pub type EditResult<T> = std::result::Result<T, EditError>;

#[derive(Debug)]
pub struct FileEditor {
    root: PathBuf,
    backups: HashMap<PathBuf, String>,
}

impl FileEditor {
    /// Relative paths passed to the editor resolve against `root`.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            backups: HashMap::new(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn resolve(&self, path: &str) -> PathBuf {
        let path = Path::new(path);
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.root.join(path)
        }
    }

    pub fn has_backup(&self, path: &str) -> bool {
        self.backups.contains_key(&self.resolve(path))
    }

    pub fn view(&self, path: &str) -> EditResult<String> {
        let full = self.resolve(path);
        if !full.is_file() {
            return Err(EditError::NotFound(full));
        }
        fs::read_to_string(&full).map_err(|e| EditError::io(&full, e))
    }

    pub fn create(&mut self, path: &str, content: &str, mode: CreateMode) -> EditResult<()> {
        let full = self.resolve(path);

        if full.exists() {
            match mode {
                CreateMode::Strict => return Err(EditError::AlreadyExists(full)),
                CreateMode::Overwrite => {
                    if full.is_dir() {
                        return Err(EditError::Io {
                            source: std::io::Error::new(
                                std::io::ErrorKind::Other,
                                "path is a directory",
                            ),
                            path: full,
                        });
                    }
                    let previous = fs::read_to_string(&full).map_err(|e| EditError::io(&full, e))?;
                    self.record_backup(&full, previous);
                }
            }
        }

        if let Some(parent) = full.parent() {
            fs::create_dir_all(parent).map_err(|e| EditError::io(parent, e))?;
        }
        fs::write(&full, content).map_err(|e| EditError::io(&full, e))?;
        debug!("Wrote {} bytes to {}", content.len(), full.display());
        Ok(())
    }

    /// Replace the single occurrence of `old_str`. Zero or several matches
    /// leave the file untouched.
    pub fn str_replace(&mut self, path: &str, old_str: &str, new_str: &str) -> EditResult<()> {
        let full = self.resolve(path);
        let content = self.view(path)?;

        let count = if old_str.is_empty() {
            0
        } else {
            content.matches(old_str).count()
        };
        if count != 1 {
            return Err(EditError::AmbiguousMatch { path: full, count });
        }

        let updated = content.replacen(old_str, new_str, 1);
        self.record_backup(&full, content);
        fs::write(&full, updated).map_err(|e| EditError::io(&full, e))
    }

    /// Insert `text` before 1-indexed `line`. `line_count + 1` appends.
    pub fn insert(&mut self, path: &str, line: usize, text: &str) -> EditResult<()> {
        let full = self.resolve(path);
        let content = self.view(path)?;

        let mut lines: Vec<String> = content.split_inclusive('\n').map(str::to_string).collect();
        let line_count = lines.len();
        if line == 0 || line > line_count + 1 {
            return Err(EditError::OutOfRange {
                path: full,
                line,
                line_count,
            });
        }

        let mut new_line = text.to_string();
        if !new_line.ends_with('\n') {
            new_line.push('\n');
        }

        if line == line_count + 1 {
            if let Some(last) = lines.last_mut() {
                if !last.ends_with('\n') {
                    last.push('\n');
                }
            }
        }
        lines.insert(line - 1, new_line);

        self.record_backup(&full, content);
        fs::write(&full, lines.concat()).map_err(|e| EditError::io(&full, e))
    }

    /// Restore the retained backup for `path` and forget it. A failed
    /// restore keeps the backup so the undo can be retried.
    pub fn undo(&mut self, path: &str) -> EditResult<()> {
        let full = self.resolve(path);
        let Some(previous) = self.backups.get(&full) else {
            return Err(EditError::NoBackup(full));
        };

        if let Some(parent) = full.parent() {
            fs::create_dir_all(parent).map_err(|e| EditError::io(parent, e))?;
        }
        fs::write(&full, previous).map_err(|e| EditError::io(&full, e))?;
        self.backups.remove(&full);
        debug!("Restored backup of {}", full.display());
        Ok(())
    }

    pub fn delete_file(&mut self, path: &str) -> EditResult<()> {
        let full = self.resolve(path);
        let content = self.view(path)?;
        self.record_backup(&full, content);
        fs::remove_file(&full).map_err(|e| EditError::io(&full, e))
    }

    /// Remove an empty directory.
    pub fn delete_directory(&mut self, path: &str) -> EditResult<()> {
        let full = self.resolve(path);
        if !full.exists() {
            return Err(EditError::NotFound(full));
        }
        if !full.is_dir() {
            return Err(EditError::NotADirectory(full));
        }

        let mut entries = fs::read_dir(&full).map_err(|e| EditError::io(&full, e))?;
        if entries.next().is_some() {
            return Err(EditError::NotEmpty(full));
        }
        fs::remove_dir(&full).map_err(|e| EditError::io(&full, e))
    }

    /// Paths relative to `path`, in traversal order.
    ///
    /// Non-recursive listings return the immediate entries with directories
    /// suffixed by `/`. Recursive listings return every file below `path`.
    pub fn list_files(&self, path: &str, recursive: bool) -> EditResult<Vec<String>> {
        let full = self.resolve(path);
        if !full.exists() {
            return Err(EditError::NotFound(full));
        }
        if !full.is_dir() {
            return Err(EditError::NotADirectory(full));
        }

        let walker = if recursive {
            WalkDir::new(&full).min_depth(1)
        } else {
            WalkDir::new(&full).min_depth(1).max_depth(1)
        };

        let mut entries = Vec::new();
        for entry in walker {
            let entry = entry.map_err(|e| {
                let path = e.path().map(Path::to_path_buf).unwrap_or_else(|| full.clone());
                match e.into_io_error() {
                    Some(io) => EditError::io(path, io),
                    None => EditError::Io {
                        path,
                        source: std::io::Error::new(std::io::ErrorKind::Other, "filesystem loop"),
                    },
                }
            })?;

            let is_dir = entry.file_type().is_dir();
            if recursive && is_dir {
                continue;
            }

            let relative = entry
                .path()
                .strip_prefix(&full)
                .unwrap_or(entry.path())
                .to_string_lossy()
                .to_string();
            entries.push(if is_dir { format!("{}/", relative) } else { relative });
        }

        Ok(entries)
    }

    /// No-op if the directory already exists.
    pub fn create_directory(&mut self, path: &str) -> EditResult<()> {
        let full = self.resolve(path);
        if full.exists() && !full.is_dir() {
            return Err(EditError::NotADirectory(full));
        }
        fs::create_dir_all(&full).map_err(|e| EditError::io(&full, e))
    }

    /// First mutation wins: an existing backup is never replaced.
    fn record_backup(&mut self, full: &Path, content: String) {
        if self.backups.contains_key(full) {
            debug!("Keeping earlier backup of {}", full.display());
            return;
        }
        debug!("Backing up {} ({} bytes)", full.display(), content.len());
        self.backups.insert(full.to_path_buf(), content);
    }
}

//! Clip and caption discovery
//!
//! Recursive traversal with symlink loop detection and system-file
//! filtering. Audio candidates are confirmed by their RIFF/WAVE header so a
//! stray `.wav` text file never reaches the decoder.

use std::collections::HashSet;
use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};
use thiserror::Error;
use walkdir::{DirEntry, WalkDir};

/// Extension of speech clips
pub const CLIP_EXTENSION: &str = "wav";
/// Extension of caption sidecars
pub const CAPTION_EXTENSION: &str = "lab";

/// Scanner errors
#[derive(Debug, Error)]
pub enum ScanError {
    /// Specified path does not exist
    #[error("Path not found: {0}")]
    PathNotFound(PathBuf),

    /// Path exists but is not a directory
    #[error("Not a directory: {0}")]
    NotADirectory(PathBuf),

    /// Cannot access file
    #[error("File access error {0}: {1}")]
    FileAccessError(PathBuf, String),
}

/// Recursive file scanner for one extension
pub struct FileScanner {
    extension: String,
    verify_wave_header: bool,
    ignore_patterns: Vec<String>,
}

impl FileScanner {
    /// Scanner for `.wav` clips (header-verified)
    pub fn clips() -> Self {
        Self::with_extension(CLIP_EXTENSION, true)
    }

    /// Scanner for `.lab` caption sidecars
    pub fn captions() -> Self {
        Self::with_extension(CAPTION_EXTENSION, false)
    }

    fn with_extension(extension: &str, verify_wave_header: bool) -> Self {
        Self {
            extension: extension.to_lowercase(),
            verify_wave_header,
            ignore_patterns: vec![
                ".DS_Store".to_string(),
                "Thumbs.db".to_string(),
                ".git".to_string(),
                ".svn".to_string(),
                "__MACOSX".to_string(),
            ],
        }
    }

    /// Scan directory, returning matching files in sorted order
    ///
    /// Unreadable entries are logged and skipped; only a missing or
    /// non-directory root is an error.
    pub fn scan(&self, root_path: &Path) -> Result<Vec<PathBuf>, ScanError> {
        if !root_path.exists() {
            return Err(ScanError::PathNotFound(root_path.to_path_buf()));
        }

        if !root_path.is_dir() {
            return Err(ScanError::NotADirectory(root_path.to_path_buf()));
        }

        let mut symlink_visited = HashSet::new();
        let mut files = Vec::new();

        let walker = WalkDir::new(root_path)
            .follow_links(false)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(|e| self.should_process_entry(e, &mut symlink_visited));

        for entry in walker {
            match entry {
                Ok(entry) if entry.file_type().is_file() => {
                    let path = entry.path();
                    match self.matches(path) {
                        Ok(true) => files.push(path.to_path_buf()),
                        Ok(false) => {}
                        Err(e) => tracing::warn!("Error verifying {}: {}", path.display(), e),
                    }
                }
                Ok(_) => {}
                Err(e) => {
                    tracing::warn!("Error accessing entry: {}", e);
                }
            }
        }

        tracing::debug!(
            root = %root_path.display(),
            extension = %self.extension,
            count = files.len(),
            "Scan complete"
        );

        Ok(files)
    }

    fn should_process_entry(
        &self,
        entry: &DirEntry,
        symlink_visited: &mut HashSet<PathBuf>,
    ) -> bool {
        let file_name = entry.file_name().to_string_lossy();

        // The root is always walked; ignore entries match whole names only
        if entry.depth() > 0
            && self
                .ignore_patterns
                .iter()
                .any(|pattern| file_name == pattern.as_str())
        {
            return false;
        }

        if entry.file_type().is_symlink() {
            if let Ok(canonical) = entry.path().canonicalize() {
                if !symlink_visited.insert(canonical) {
                    tracing::warn!("Symlink loop detected: {}", entry.path().display());
                    return false;
                }
            }
        }

        true
    }

    fn matches(&self, path: &Path) -> Result<bool, ScanError> {
        if !has_extension(path, &self.extension) {
            return Ok(false);
        }
        if self.verify_wave_header {
            return is_wave_file(path);
        }
        Ok(true)
    }
}

/// Case-insensitive extension check
pub fn has_extension(path: &Path, extension: &str) -> bool {
    path.extension()
        .map(|ext| ext.to_string_lossy().eq_ignore_ascii_case(extension))
        .unwrap_or(false)
}

/// Check the RIFF/WAVE magic bytes
pub fn is_wave_file(path: &Path) -> Result<bool, ScanError> {
    let mut file = File::open(path)
        .map_err(|e| ScanError::FileAccessError(path.to_path_buf(), e.to_string()))?;

    let mut buffer = [0u8; 12];
    let bytes_read = file
        .read(&mut buffer)
        .map_err(|e| ScanError::FileAccessError(path.to_path_buf(), e.to_string()))?;

    Ok(matches!(
        &buffer[..bytes_read],
        [b'R', b'I', b'F', b'F', _, _, _, _, b'W', b'A', b'V', b'E']
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn fake_wave(path: &Path) {
        let mut bytes = b"RIFF\x24\x00\x00\x00WAVE".to_vec();
        bytes.extend_from_slice(&[0u8; 32]);
        fs::write(path, bytes).unwrap();
    }

    #[test]
    fn test_scan_nonexistent_path() {
        let result = FileScanner::clips().scan(Path::new("/nonexistent/path"));
        assert!(matches!(result, Err(ScanError::PathNotFound(_))));
    }

    #[test]
    fn test_scan_file_as_directory() {
        let temp_dir = TempDir::new().unwrap();
        let file = temp_dir.path().join("a.wav");
        fake_wave(&file);
        let result = FileScanner::clips().scan(&file);
        assert!(matches!(result, Err(ScanError::NotADirectory(_))));
    }

    #[test]
    fn test_scan_recurses_and_verifies_header() {
        let temp_dir = TempDir::new().unwrap();
        let nested = temp_dir.path().join("角色").join("sub");
        fs::create_dir_all(&nested).unwrap();

        fake_wave(&temp_dir.path().join("b.wav"));
        fake_wave(&nested.join("a.WAV"));
        fs::write(temp_dir.path().join("fake.wav"), b"text pretending to be audio").unwrap();
        fs::write(temp_dir.path().join("b.lab"), "caption").unwrap();

        let clips = FileScanner::clips().scan(temp_dir.path()).unwrap();
        assert_eq!(clips.len(), 2);
        assert!(clips.iter().any(|p| p.ends_with("b.wav")));
        assert!(clips.iter().any(|p| p.ends_with("a.WAV")));

        let captions = FileScanner::captions().scan(temp_dir.path()).unwrap();
        assert_eq!(captions, vec![temp_dir.path().join("b.lab")]);
    }

    #[test]
    fn test_scan_skips_ignored_entries() {
        let temp_dir = TempDir::new().unwrap();
        let git = temp_dir.path().join(".git");
        fs::create_dir_all(&git).unwrap();
        fake_wave(&git.join("hidden.wav"));

        let clips = FileScanner::clips().scan(temp_dir.path()).unwrap();
        assert!(clips.is_empty());
    }

    #[test]
    fn test_ignore_list_matches_whole_names() {
        let temp_dir = TempDir::new().unwrap();
        let folder = temp_dir.path().join("c");
        fs::create_dir_all(folder.join("notes.svn_backup")).unwrap();
        fake_wave(&folder.join("my.github_intro.wav"));
        fake_wave(&folder.join("plain.wav"));
        fake_wave(&folder.join("notes.svn_backup").join("kept.wav"));

        let clips = FileScanner::clips().scan(temp_dir.path()).unwrap();
        assert_eq!(
            clips,
            vec![
                folder.join("my.github_intro.wav"),
                folder.join("notes.svn_backup").join("kept.wav"),
                folder.join("plain.wav"),
            ]
        );
    }

    #[test]
    fn test_root_named_like_ignored_entry_is_scanned() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path().join(".git");
        fs::create_dir_all(&root).unwrap();
        fake_wave(&root.join("a.wav"));

        let clips = FileScanner::clips().scan(&root).unwrap();
        assert_eq!(clips, vec![root.join("a.wav")]);
    }
}

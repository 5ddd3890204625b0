use std::fs::{self, OpenOptions};
use std::io;
use std::path::{Path, PathBuf};

#[derive(Debug, PartialEq)]
pub enum DirEntryCategory {
    DoesNotExist,
    RegularFile,
    Directory,
    Unknown,
}

/// Classifies `path`, following symbolic links.
pub fn classify_file(path: &Path) -> DirEntryCategory {
    match fs::metadata(path) {
        Ok(metadata) => {
            if metadata.is_file() {
                DirEntryCategory::RegularFile
            } else if metadata.is_dir() {
                DirEntryCategory::Directory
            } else {
                DirEntryCategory::Unknown
            }
        },
        Err(_) => DirEntryCategory::DoesNotExist,
    }
}

/// Key used to detect the same file selected twice under different spellings.
pub fn normalize(path: &Path) -> PathBuf {
    let absolute = std::path::absolute(path).unwrap_or_else(|_| PathBuf::from(path));
    if cfg!(windows) {
        PathBuf::from(absolute.to_string_lossy().to_lowercase())
    } else {
        absolute
    }
}

/// Creates `dir` if needed and proves that files can be created inside it.
pub fn ensure_writable_dir(dir: &Path) -> io::Result<()> {
    fs::create_dir_all(dir)?;
    let probe = dir.join(format!(".pip-media-{}.tmp", std::process::id()));
    OpenOptions::new().write(true).create_new(true).open(&probe)?;
    fs::remove_file(&probe)
}

/// Deletes a half-written output. A missing file is not an error.
pub fn remove_partial(path: &Path) -> io::Result<()> {
    match fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(err) => Err(err),
    }
}

pub fn file_size(path: &Path) -> Option<u64> {
    fs::metadata(path).ok().map(|m| m.len())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_file() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("song.mp3");
        fs::write(&file, b"id3").unwrap();
        assert_eq!(classify_file(&file), DirEntryCategory::RegularFile);
        assert_eq!(classify_file(dir.path()), DirEntryCategory::Directory);
        assert_eq!(classify_file(&dir.path().join("nope.mp3")), DirEntryCategory::DoesNotExist);
    }

    #[test]
    fn test_ensure_writable_dir_creates_missing_dirs() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("a").join("b");
        ensure_writable_dir(&out).unwrap();
        assert!(out.is_dir());
        assert_eq!(fs::read_dir(&out).unwrap().count(), 0);
    }

    #[test]
    fn test_normalize_relative_paths() {
        let a = normalize(Path::new("song.mp3"));
        let b = normalize(&std::env::current_dir().unwrap().join("song.mp3"));
        assert_eq!(a, b);
    }

    #[test]
    fn test_remove_partial_ignores_missing() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("half.avi");
        assert!(remove_partial(&file).is_ok());
        fs::write(&file, b"RIFF").unwrap();
        remove_partial(&file).unwrap();
        assert!(!file.exists());
    }
}

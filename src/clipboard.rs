// src/clipboard.rs

use std::fs;
use std::path::PathBuf;

use tracing::warn;

use crate::error::{PlaygroundError, Result};

pub trait Clipboard: Send + Sync {
    fn write_text(&self, text: &str) -> Result<()>;
}

/// The desktop clipboard.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClipboard;

#[cfg(feature = "clipboard")]
impl Clipboard for SystemClipboard {
    fn write_text(&self, text: &str) -> Result<()> {
        let mut clipboard =
            arboard::Clipboard::new().map_err(|e| PlaygroundError::Clipboard(e.to_string()))?;
        clipboard
            .set_text(text.to_string())
            .map_err(|e| PlaygroundError::Clipboard(e.to_string()))
    }
}

#[cfg(not(feature = "clipboard"))]
impl Clipboard for SystemClipboard {
    fn write_text(&self, _text: &str) -> Result<()> {
        Err(PlaygroundError::Clipboard(
            "clipboard support is disabled".to_string(),
        ))
    }
}

/// Fallback for hosts without clipboard access: the text lands in a file.
#[derive(Debug, Clone)]
pub struct FileClipboard {
    path: PathBuf,
}

impl FileClipboard {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// `clipboard.txt` in the data directory, if one can be determined.
    pub fn in_data_dir() -> Option<Self> {
        crate::settings::data_dir_path().map(|dir| Self::new(dir.join("clipboard.txt")))
    }

    pub fn path(&self) -> &PathBuf {
        &self.path
    }
}

impl Clipboard for FileClipboard {
    fn write_text(&self, text: &str) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&self.path, text)?;
        Ok(())
    }
}

/// Tries `primary`, then `fallback`. The error of the fallback is returned
/// when both fail.
pub fn copy_with_fallback(primary: &dyn Clipboard, fallback: &dyn Clipboard, text: &str) -> Result<()> {
    match primary.write_text(text) {
        Ok(()) => Ok(()),
        Err(e) => {
            warn!(error = %e, "clipboard write failed, trying fallback");
            fallback.write_text(text)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    struct Broken;

    impl Clipboard for Broken {
        fn write_text(&self, _text: &str) -> Result<()> {
            Err(PlaygroundError::Clipboard("no display".to_string()))
        }
    }

    #[test]
    fn falls_back_to_file() {
        let dir = TempDir::new().unwrap();
        let fallback = FileClipboard::new(dir.path().join("clip.txt"));
        copy_with_fallback(&Broken, &fallback, "copied").unwrap();
        assert_eq!(fs::read_to_string(fallback.path()).unwrap(), "copied");
    }

    #[test]
    fn reports_error_when_both_fail() {
        let err = copy_with_fallback(&Broken, &Broken, "x").unwrap_err();
        assert!(matches!(err, PlaygroundError::Clipboard(_)));
    }
}

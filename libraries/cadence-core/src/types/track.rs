/// Track references
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};

/// Key identifying one audio asset
///
/// A track reference is the file path of the asset. It keys the sample cache,
/// every queue and the playback session, so two distinct assets never share one.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TrackRef(PathBuf);

impl TrackRef {
    /// Create a track reference from a file path
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self(path.into())
    }

    /// File path backing this reference
    pub fn path(&self) -> &Path {
        &self.0
    }

    /// Lowercased file extension, if any
    pub fn extension(&self) -> Option<String> {
        self.0
            .extension()
            .and_then(|ext| ext.to_str())
            .map(str::to_ascii_lowercase)
    }

    /// Whether the extension matches one of `extensions` (case-insensitive)
    pub fn has_extension<S: AsRef<str>>(&self, extensions: &[S]) -> bool {
        self.extension().is_some_and(|ext| {
            extensions
                .iter()
                .any(|candidate| candidate.as_ref().eq_ignore_ascii_case(&ext))
        })
    }

    /// Final path component, for display
    pub fn file_name(&self) -> String {
        self.0
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| self.0.display().to_string())
    }
}

impl fmt::Display for TrackRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.display())
    }
}

impl From<PathBuf> for TrackRef {
    fn from(path: PathBuf) -> Self {
        Self(path)
    }
}

impl From<&Path> for TrackRef {
    fn from(path: &Path) -> Self {
        Self(path.to_path_buf())
    }
}

impl From<&str> for TrackRef {
    fn from(path: &str) -> Self {
        Self(PathBuf::from(path))
    }
}

impl AsRef<Path> for TrackRef {
    fn as_ref(&self) -> &Path {
        &self.0
    }
}

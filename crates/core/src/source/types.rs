//! Types for source resolution.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use url::Url;

use super::error::ResolutionError;

/// Opaque handle to a media item, as supplied by the caller.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SourceReference(String);

/// What a [`SourceReference`] points at.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceKind {
    /// Already a local filesystem path.
    LocalPath(PathBuf),
    /// Needs a lookup in the content index registered for `authority`.
    Indexed { authority: String, id: String },
}

impl SourceReference {
    pub fn new(reference: impl Into<String>) -> Self {
        Self(reference.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Classifies the reference.
    ///
    /// Strings that do not parse as an absolute URL are treated as local paths,
    /// which covers both `/abs/path.mp4` and `relative/clip.mov`.
    pub fn kind(&self) -> Result<SourceKind, ResolutionError> {
        let url = match Url::parse(&self.0) {
            Ok(url) => url,
            Err(_) => return Ok(SourceKind::LocalPath(PathBuf::from(&self.0))),
        };

        match url.scheme() {
            "file" => url
                .to_file_path()
                .map(SourceKind::LocalPath)
                .map_err(|_| ResolutionError::no_local_path(&self.0, "malformed file URL")),
            "content" => {
                let authority = url
                    .host_str()
                    .filter(|h| !h.is_empty())
                    .ok_or_else(|| ResolutionError::no_local_path(&self.0, "missing authority"))?;
                let id = url.path().trim_matches('/');
                if id.is_empty() {
                    return Err(ResolutionError::no_local_path(&self.0, "missing item id"));
                }
                Ok(SourceKind::Indexed {
                    authority: authority.to_string(),
                    id: id.to_string(),
                })
            }
            // Single-letter schemes are Windows drive letters, not URLs.
            scheme if scheme.len() == 1 => Ok(SourceKind::LocalPath(PathBuf::from(&self.0))),
            scheme => Err(ResolutionError::UnsupportedScheme {
                scheme: scheme.to_string(),
            }),
        }
    }
}

impl fmt::Display for SourceReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for SourceReference {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<PathBuf> for SourceReference {
    fn from(value: PathBuf) -> Self {
        Self::new(value.to_string_lossy().into_owned())
    }
}

/// A validated, locally readable input file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolvedInput {
    /// Local path to the source media.
    pub path: PathBuf,
    /// Size of the file when it was resolved.
    pub size_bytes: u64,
}

//! The transform contract shared by every asset class.

use std::path::{Path, PathBuf};

use crate::class::AssetClass;

/// Errors a transform can report for a single file.
///
/// None of these abort a pipeline: the file is reported and skipped.
#[derive(Debug, thiserror::Error)]
pub enum TransformError {
    #[error("Compile error in {}: {message}", .path.display())]
    Compile { path: PathBuf, message: String },

    #[error("Syntax error in {}: {message}", .path.display())]
    Syntax { path: PathBuf, message: String },

    #[error("Image error in {}: {message}", .path.display())]
    Image { path: PathBuf, message: String },

    #[error("{} is not valid UTF-8", .0.display())]
    Encoding(PathBuf),
}

impl TransformError {
    /// Path of the file that failed.
    pub fn path(&self) -> &Path {
        match self {
            TransformError::Compile { path, .. }
            | TransformError::Syntax { path, .. }
            | TransformError::Image { path, .. } => path,
            TransformError::Encoding(path) => path,
        }
    }
}

/// A pure conversion from source bytes to deployable bytes.
pub trait Transform: Send + Sync {
    /// Asset class this transform serves.
    fn class(&self) -> AssetClass;

    /// Transform one file.
    ///
    /// # Arguments
    /// * `content` - The raw source bytes (after include expansion, if any)
    /// * `path` - Source path, used for diagnostics and relative resolution
    fn transform(&self, content: &[u8], path: &Path) -> Result<Vec<u8>, TransformError>;
}

/// Decode `content` as UTF-8 or report an [`TransformError::Encoding`].
pub(crate) fn utf8<'a>(content: &'a [u8], path: &Path) -> Result<&'a str, TransformError> {
    std::str::from_utf8(content).map_err(|_| TransformError::Encoding(path.to_path_buf()))
}

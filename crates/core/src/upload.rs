//! Client-side validation of the images selected for a job.
//!
//! Mirrors the upload form: non-image files are dropped with a warning,
//! and a batch that would push the selection past [`MAX_IMAGES`] is
//! rejected as a whole.

use std::path::Path;

use crate::types::MAX_IMAGES;

/// Extensions accepted when scanning a directory for images.
pub const IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "webp"];

/// One file selected for upload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadFile {
    pub file_name: String,
    pub content_type: String,
    pub bytes: Vec<u8>,
}

impl UploadFile {
    pub fn new(
        file_name: impl Into<String>,
        content_type: impl Into<String>,
        bytes: Vec<u8>,
    ) -> Self {
        Self {
            file_name: file_name.into(),
            content_type: content_type.into(),
            bytes,
        }
    }

    pub fn is_image(&self) -> bool {
        self.content_type.starts_with("image/")
    }
}

/// Why (part of) a batch was not added to the selection.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum UploadRejection {
    #[error("Solo se permiten archivos de imagen.")]
    NonImage { file_names: Vec<String> },

    #[error("Máximo 8 imágenes permitidas.")]
    TooMany { attempted: usize },
}

/// The set of images the user has picked so far.
#[derive(Debug, Clone, Default)]
pub struct UploadSelection {
    files: Vec<UploadFile>,
}

impl UploadSelection {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a batch of files, returning every rejection that applied.
    ///
    /// Non-image files are filtered out first. If the remaining files
    /// would exceed [`MAX_IMAGES`], none of them are added.
    pub fn add(&mut self, batch: Vec<UploadFile>) -> Vec<UploadRejection> {
        let mut rejections = Vec::new();

        let (valid, invalid): (Vec<_>, Vec<_>) = batch.into_iter().partition(UploadFile::is_image);
        if !invalid.is_empty() {
            rejections.push(UploadRejection::NonImage {
                file_names: invalid.into_iter().map(|f| f.file_name).collect(),
            });
        }

        let attempted = self.files.len() + valid.len();
        if attempted > MAX_IMAGES {
            rejections.push(UploadRejection::TooMany { attempted });
            return rejections;
        }

        self.files.extend(valid);
        rejections
    }

    /// Remove the file at `index`, if any.
    pub fn remove(&mut self, index: usize) -> Option<UploadFile> {
        (index < self.files.len()).then(|| self.files.remove(index))
    }

    pub fn files(&self) -> &[UploadFile] {
        &self.files
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    pub fn into_files(self) -> Vec<UploadFile> {
        self.files
    }
}

/// Guess a MIME type from a file name's extension.
///
/// Falls back to `application/octet-stream`, which the selection then
/// rejects as a non-image.
pub fn content_type_for(path: &Path) -> &'static str {
    image::ImageFormat::from_path(path)
        .map(|format| format.to_mime_type())
        .unwrap_or("application/octet-stream")
}

/// Whether `path` has one of the [`IMAGE_EXTENSIONS`] (case-insensitive).
pub fn has_image_extension(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| {
            IMAGE_EXTENSIONS
                .iter()
                .any(|known| known.eq_ignore_ascii_case(ext))
        })
        .unwrap_or(false)
}

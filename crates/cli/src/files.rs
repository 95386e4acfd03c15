//! Turning paths on disk into an upload selection.

use std::path::{Path, PathBuf};

use panel_core::upload::{
    content_type_for, has_image_extension, UploadFile, UploadRejection, UploadSelection,
};

#[derive(Debug, thiserror::Error)]
pub enum FileError {
    #[error("Failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("No images found in {0}")]
    EmptyDirectory(PathBuf),

    #[error("{}", join_rejections(.0))]
    Rejected(Vec<UploadRejection>),
}

fn join_rejections(rejections: &[UploadRejection]) -> String {
    rejections
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(" ")
}

/// Supported images directly inside `dir`, sorted by file name.
pub fn images_in_dir(dir: &Path) -> Result<Vec<PathBuf>, FileError> {
    let read_err = |source| FileError::Read {
        path: dir.to_path_buf(),
        source,
    };

    let mut paths = Vec::new();
    for entry in std::fs::read_dir(dir).map_err(read_err)? {
        let path = entry.map_err(read_err)?.path();
        if path.is_file() && has_image_extension(&path) {
            paths.push(path);
        }
    }

    if paths.is_empty() {
        return Err(FileError::EmptyDirectory(dir.to_path_buf()));
    }
    paths.sort_by(|a, b| a.file_name().cmp(&b.file_name()));
    Ok(paths)
}

/// Read one file, typing it from its extension.
pub async fn load_file(path: &Path) -> Result<UploadFile, FileError> {
    let bytes = tokio::fs::read(path).await.map_err(|source| FileError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string());
    Ok(UploadFile::new(file_name, content_type_for(path), bytes))
}

/// Read `paths` and validate them as one batch.
///
/// Any rejection fails the whole selection; nothing is uploaded.
pub async fn load_selection(paths: &[PathBuf]) -> Result<UploadSelection, FileError> {
    let mut batch = Vec::with_capacity(paths.len());
    for path in paths {
        batch.push(load_file(path).await?);
    }

    let mut selection = UploadSelection::new();
    let rejections = selection.add(batch);
    if !rejections.is_empty() {
        return Err(FileError::Rejected(rejections));
    }
    tracing::debug!(count = selection.len(), "Images selected");
    Ok(selection)
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    fn touch(dir: &Path, name: &str) -> PathBuf {
        let path = dir.join(name);
        std::fs::write(&path, [0u8; 4]).unwrap();
        path
    }

    #[test]
    fn dir_listing_keeps_images_sorted() {
        let dir = tempfile::tempdir().unwrap();
        touch(dir.path(), "b.png");
        touch(dir.path(), "a.JPG");
        touch(dir.path(), "notes.txt");
        touch(dir.path(), "c.webp");

        let names: Vec<_> = images_in_dir(dir.path())
            .unwrap()
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
            .collect();

        assert_eq!(names, vec!["a.JPG", "b.png", "c.webp"]);
    }

    #[test]
    fn dir_without_images_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        touch(dir.path(), "notes.txt");
        assert_matches!(images_in_dir(dir.path()), Err(FileError::EmptyDirectory(_)));
    }

    #[tokio::test]
    async fn load_file_infers_content_type() {
        let dir = tempfile::tempdir().unwrap();
        let path = touch(dir.path(), "photo.jpeg");

        let file = load_file(&path).await.unwrap();

        assert_eq!(file.file_name, "photo.jpeg");
        assert_eq!(file.content_type, "image/jpeg");
        assert_eq!(file.bytes.len(), 4);
    }

    #[tokio::test]
    async fn non_image_rejects_the_selection() {
        let dir = tempfile::tempdir().unwrap();
        let paths = vec![touch(dir.path(), "a.png"), touch(dir.path(), "doc.pdf")];

        let err = load_selection(&paths).await.unwrap_err();

        assert_eq!(err.to_string(), "Solo se permiten archivos de imagen.");
    }

    #[tokio::test]
    async fn nine_images_are_too_many() {
        let dir = tempfile::tempdir().unwrap();
        let paths: Vec<_> = (0..9)
            .map(|i| touch(dir.path(), &format!("{i}.png")))
            .collect();

        let err = load_selection(&paths).await.unwrap_err();

        assert_matches!(err, FileError::Rejected(ref r) if r.len() == 1);
        assert_eq!(err.to_string(), "Máximo 8 imágenes permitidas.");
    }

    #[tokio::test]
    async fn missing_file_is_a_read_error() {
        let err = load_selection(&[PathBuf::from("/nonexistent/a.png")])
            .await
            .unwrap_err();
        assert_matches!(err, FileError::Read { .. });
    }
}
